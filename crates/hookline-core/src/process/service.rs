//! One vendor's driver running on the shared process manager.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::{AgentDriver, AgentOperation, AgentOutput, AgentType, SessionRef};
use crate::error::{AgentError, AgentResult};
use crate::session::SessionProvider;
use crate::workspace;

use super::manager::{ChunkCallback, ProcessManager};
use super::shell::SpawnOptions;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct AgentService {
    driver: Arc<dyn AgentDriver>,
    processes: Arc<ProcessManager>,
    options: SpawnOptions,
    timeout: Duration,
}

impl AgentService {
    pub fn new(driver: Arc<dyn AgentDriver>, processes: Arc<ProcessManager>) -> Self {
        Self {
            driver,
            processes,
            options: SpawnOptions::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base spawn options; the workspace env is merged over these per run.
    pub fn with_options(mut self, options: SpawnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn agent_type(&self) -> AgentType {
        self.driver.agent_type()
    }

    pub fn processes(&self) -> &Arc<ProcessManager> {
        &self.processes
    }

    pub async fn is_available(&self) -> bool {
        self.processes
            .is_available(self.driver.as_ref(), &self.options)
            .await
    }

    /// Run one operation to completion.
    pub async fn run(&self, op: &AgentOperation, workspace: Option<&Path>) -> AgentResult<AgentOutput> {
        self.execute(op, workspace, None).await
    }

    /// Run one operation, passing stdout chunks to `on_chunk` as they arrive.
    pub async fn run_streaming(
        &self,
        op: &AgentOperation,
        workspace: Option<&Path>,
        on_chunk: ChunkCallback<'_>,
    ) -> AgentResult<AgentOutput> {
        self.execute(op, workspace, Some(on_chunk)).await
    }

    pub async fn generate(&self, prompt: &str, workspace: Option<&Path>) -> AgentResult<AgentOutput> {
        let op = AgentOperation::Generate {
            prompt: prompt.to_string(),
        };
        self.run(&op, workspace).await
    }

    pub async fn resume(
        &self,
        session: SessionRef,
        prompt: &str,
        workspace: Option<&Path>,
    ) -> AgentResult<AgentOutput> {
        let op = AgentOperation::Resume {
            session,
            prompt: prompt.to_string(),
        };
        self.run(&op, workspace).await
    }

    pub async fn fork(
        &self,
        from: SessionRef,
        prompt: &str,
        workspace: Option<&Path>,
    ) -> AgentResult<AgentOutput> {
        let op = AgentOperation::Fork {
            from,
            prompt: prompt.to_string(),
        };
        self.run(&op, workspace).await
    }

    /// Fork whatever session this agent currently has open in `workspace`.
    pub async fn fork_active(
        &self,
        sessions: &SessionProvider,
        workspace: &Path,
        prompt: &str,
    ) -> AgentResult<AgentOutput> {
        let key = workspace.display().to_string();
        let active = sessions
            .get_active_session(self.agent_type(), &key)
            .ok_or_else(|| {
                AgentError::session_not_found(format!(
                    "No active {} session in {key}",
                    self.agent_type()
                ))
            })?;
        self.fork(SessionRef::id(active.session_id), prompt, Some(workspace))
            .await
    }

    async fn execute(
        &self,
        op: &AgentOperation,
        workspace: Option<&Path>,
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> AgentResult<AgentOutput> {
        // Invalid session references fail before anything is spawned.
        let args = self.driver.build_args(op)?;

        if !self.is_available().await {
            return Err(AgentError::not_available(format!(
                "{} CLI ({}) is not available",
                self.agent_type(),
                self.driver.binary()
            )));
        }

        let mut opts = self.options.clone();
        if let Some(dir) = workspace {
            opts = opts.cwd(dir).envs(workspace::workspace_env(dir).await);
        }

        let handle = self.processes.spawn(self.driver.as_ref(), &args, &opts)?;
        match on_chunk {
            Some(cb) => {
                self.processes
                    .stream_output(self.driver.as_ref(), &handle, self.timeout, cb)
                    .await
            }
            None => {
                self.processes
                    .collect_output(self.driver.as_ref(), &handle, self.timeout)
                    .await
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::events::{AgentEvent, EventPayload, EventRegistry, SessionStartPayload};
    use crate::process::testing::ShellDriver;
    use std::sync::Mutex;

    fn service(driver: ShellDriver) -> AgentService {
        AgentService::new(Arc::new(driver), Arc::new(ProcessManager::new()))
            .with_options(SpawnOptions::default().direct())
            .with_timeout(Duration::from_secs(10))
    }

    mod run {
        use super::*;

        #[tokio::test]
        async fn generate_returns_parsed_output() {
            let svc = service(ShellDriver::new(AgentType::Claude));
            let out = svc.generate("echo hello", None).await.unwrap();
            assert_eq!(out.text, "hello");
            assert_eq!(svc.processes().active_count(), 0);
        }

        #[tokio::test]
        async fn missing_binary_is_not_available() {
            let mut driver = ShellDriver::new(AgentType::Codex);
            driver.binary = "/nonexistent/hookline-agent".to_string();
            let svc = service(driver);

            assert!(!svc.is_available().await);
            let err = svc.generate("echo hi", None).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::AgentNotAvailable);
        }

        #[tokio::test]
        async fn fork_from_latest_fails_before_probing() {
            // The binary doesn't exist, so reaching the probe would give a
            // different error.
            let mut driver = ShellDriver::new(AgentType::Claude);
            driver.binary = "/nonexistent/hookline-agent".to_string();
            let svc = service(driver);

            let err = svc.fork(SessionRef::Latest, "hi", None).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::SessionInvalid);
            assert_eq!(svc.processes().active_count(), 0);
        }

        #[tokio::test]
        async fn workspace_sets_cwd_and_env() {
            let dir = tempfile::tempdir().unwrap();
            let svc = service(ShellDriver::new(AgentType::Gemini));
            let out = svc
                .generate("echo \"$HOOKLINE_WORKSPACE|$(pwd)\"", Some(dir.path()))
                .await
                .unwrap();

            let (env, cwd) = out.text.split_once('|').unwrap();
            assert_eq!(env, dir.path().display().to_string());
            let cwd = std::fs::canonicalize(cwd).unwrap();
            assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
        }

        #[tokio::test]
        async fn streaming_sees_chunks() {
            let svc = service(ShellDriver::new(AgentType::Claude));
            let seen = Mutex::new(String::new());
            let cb = |chunk: &str| seen.lock().unwrap().push_str(chunk);
            let out = svc
                .run_streaming(
                    &AgentOperation::Generate {
                        prompt: "echo one; echo two".to_string(),
                    },
                    None,
                    &cb,
                )
                .await
                .unwrap();
            assert_eq!(out.text, "one\ntwo");
            assert_eq!(seen.lock().unwrap().as_str(), "one\ntwo\n");
        }
    }

    mod fork_active {
        use super::*;

        #[tokio::test]
        async fn without_a_session_is_not_found() {
            let registry = EventRegistry::new();
            let sessions = SessionProvider::new(&registry);
            let svc = service(ShellDriver::new(AgentType::Claude));

            let err = svc
                .fork_active(&sessions, Path::new("/tmp"), "echo hi")
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::SessionNotFound);
        }

        #[tokio::test]
        async fn forks_the_recorded_session() {
            let dir = tempfile::tempdir().unwrap();
            let registry = EventRegistry::new();
            let sessions = SessionProvider::new(&registry);
            registry
                .emit(
                    &AgentEvent::new(
                        AgentType::Claude,
                        EventPayload::SessionStart(SessionStartPayload::default()),
                    )
                    .with_session(Some("sess-9".to_string()))
                    .with_workspace(Some(dir.path().display().to_string())),
                )
                .await;

            let svc = service(ShellDriver::new(AgentType::Claude));
            let out = svc
                .fork_active(&sessions, dir.path(), "echo forked")
                .await
                .unwrap();
            assert_eq!(out.text, "forked");
        }
    }
}
