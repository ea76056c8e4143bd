//! Tracking, collecting and cancelling agent subprocesses.
//!
//! [`ProcessManager::spawn`] registers a process and starts a watcher task
//! that owns the child and its output streams. The watcher deregisters the
//! process the moment it closes, whether or not anyone is collecting. A
//! collector claims the watcher's result; an exit nobody has claimed yet is
//! kept until [`ProcessManager::collect_output`] asks for it.
//!
//! Every process has its own timeout and cancel signal; timing out one never
//! touches another's handle or buffers. Deregistration is idempotent, so a
//! late exit after a timeout is harmless.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, Notify};
use uuid::Uuid;

use super::shell::{build_command, SpawnOptions};
use super::Utf8Buffer;
use crate::agents::{AgentDriver, AgentOutput, AgentType};
use crate::error::{AgentError, AgentResult};
use crate::logging::{self, Direction, LogHandle};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const READ_BUF_SIZE: usize = 8192;

/// Public view of a running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHandle {
    pub id: String,
    pub pid: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub agent_type: AgentType,
}

/// How the watcher saw the process end.
enum Exit {
    Exited {
        status: std::io::Result<ExitStatus>,
        stdout: String,
        stderr: String,
    },
    Killed,
}

struct Tracked {
    /// Tells the watcher to kill the child.
    kill: Arc<Notify>,
    /// Wakes a collector when `cancel_all` drops the process.
    cancel: Arc<Notify>,
    /// `None` once a collector has claimed the result.
    settled: Option<oneshot::Receiver<Exit>>,
    chunks: Option<mpsc::UnboundedReceiver<String>>,
}

/// What a collector found when it looked a process up.
enum Claim {
    Running {
        settled: oneshot::Receiver<Exit>,
        chunks: mpsc::UnboundedReceiver<String>,
        kill: Arc<Notify>,
        cancel: Arc<Notify>,
    },
    Finished(Exit),
}

enum Waited {
    Settled(Exit),
    TimedOut,
    Cancelled,
}

#[derive(Default)]
struct Shared {
    processes: Mutex<HashMap<String, Tracked>>,
    /// Exits that happened before anyone collected them.
    unclaimed: Mutex<HashMap<String, Exit>>,
}

impl Shared {
    /// Called once by the watcher when the child is gone.
    fn settle(&self, id: &str, exit: Exit, tx: oneshot::Sender<Exit>) {
        let mut processes = self.processes.lock().unwrap();
        // Absent after a timeout or cancel_all: nothing left to report to.
        let Some(tracked) = processes.remove(id) else {
            return;
        };
        if tracked.settled.is_some() {
            self.unclaimed.lock().unwrap().insert(id.to_string(), exit);
        } else {
            drop(processes);
            let _ = tx.send(exit);
        }
    }

    fn claim(&self, id: &str) -> AgentResult<Claim> {
        let mut processes = self.processes.lock().unwrap();
        let Some(tracked) = processes.get_mut(id) else {
            return self
                .unclaimed
                .lock()
                .unwrap()
                .remove(id)
                .map(Claim::Finished)
                .ok_or_else(|| AgentError::spawn_failed(format!("Process {id} is not running")));
        };
        let (Some(settled), Some(chunks)) = (tracked.settled.take(), tracked.chunks.take()) else {
            return Err(AgentError::spawn_failed(format!(
                "Process {id} is already being collected"
            )));
        };
        Ok(Claim::Running {
            settled,
            chunks,
            kill: tracked.kill.clone(),
            cancel: tracked.cancel.clone(),
        })
    }
}

/// Callback for streamed stdout chunks.
pub type ChunkCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

pub struct ProcessManager {
    shared: Arc<Shared>,
    probe_timeout: Duration,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Run the driver's version probe. Exit 0 within the probe timeout means
    /// the agent is usable.
    pub async fn is_available(&self, driver: &dyn AgentDriver, opts: &SpawnOptions) -> bool {
        let mut cmd = match build_command(driver.binary(), &driver.version_args(), opts) {
            Ok(cmd) => cmd,
            Err(e) => {
                log::warn!("Cannot build probe for {}: {e}", driver.agent_type());
                return false;
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.probe_timeout, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                log::debug!("{} probe failed to start: {e}", driver.agent_type());
                false
            }
            Err(_) => {
                log::warn!(
                    "{} probe timed out after {:?}",
                    driver.agent_type(),
                    self.probe_timeout
                );
                false
            }
        }
    }

    /// Launch `driver.binary()` with `args`, register it, and start watching
    /// it. Must be called inside a Tokio runtime.
    pub fn spawn(
        &self,
        driver: &dyn AgentDriver,
        args: &[String],
        opts: &SpawnOptions,
    ) -> AgentResult<ProcessHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            AgentError::spawn_failed("Agent processes can only be spawned inside a Tokio runtime")
        })?;

        let mut cmd = build_command(driver.binary(), args, opts)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            AgentError::spawn_failed(format!("Failed to spawn {}: {e}", driver.binary()))
                .with_details(json!({ "binary": driver.binary() }))
        })?;

        let id = Uuid::new_v4().to_string();
        let pid = child.id();
        let log = logging::open_log_file(opts.log_dir.as_deref(), &id);
        logging::log_line(&log, Direction::Stdin, &args.join(" "));

        let kill = Arc::new(Notify::new());
        let (settled_tx, settled_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        self.shared.processes.lock().unwrap().insert(
            id.clone(),
            Tracked {
                kill: kill.clone(),
                cancel: Arc::new(Notify::new()),
                settled: Some(settled_rx),
                chunks: Some(chunk_rx),
            },
        );

        runtime.spawn(watch_process(Watcher {
            id: id.clone(),
            child,
            log,
            chunks: chunk_tx,
            settled: settled_tx,
            kill,
            shared: self.shared.clone(),
        }));
        log::info!("Spawned {} process {id} (pid {pid:?})", driver.agent_type());

        Ok(ProcessHandle {
            id,
            pid,
            start_time: Utc::now(),
            agent_type: driver.agent_type(),
        })
    }

    /// Wait for the process and parse its buffered stdout.
    pub async fn collect_output(
        &self,
        driver: &dyn AgentDriver,
        handle: &ProcessHandle,
        timeout: Duration,
    ) -> AgentResult<AgentOutput> {
        self.drive(driver, handle, timeout, None).await
    }

    /// Like [`collect_output`](Self::collect_output), also calling `on_chunk`
    /// for each piece of stdout as it arrives.
    pub async fn stream_output(
        &self,
        driver: &dyn AgentDriver,
        handle: &ProcessHandle,
        timeout: Duration,
        on_chunk: ChunkCallback<'_>,
    ) -> AgentResult<AgentOutput> {
        self.drive(driver, handle, timeout, Some(on_chunk)).await
    }

    async fn drive(
        &self,
        driver: &dyn AgentDriver,
        handle: &ProcessHandle,
        timeout: Duration,
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> AgentResult<AgentOutput> {
        let exit = match self.shared.claim(&handle.id)? {
            Claim::Finished(exit) => exit,
            Claim::Running {
                settled,
                chunks,
                kill,
                cancel,
            } => match wait_settled(settled, chunks, on_chunk, timeout, &cancel).await {
                Waited::Settled(exit) => exit,
                Waited::TimedOut => {
                    kill.notify_one();
                    self.deregister(&handle.id);
                    log::warn!("Process {} timed out after {timeout:?}; killed", handle.id);
                    return Err(AgentError::timeout(format!(
                        "{} did not finish within {}ms",
                        driver.agent_type(),
                        timeout.as_millis()
                    )));
                }
                Waited::Cancelled => {
                    return Err(AgentError::spawn_failed(format!(
                        "Process {} was cancelled",
                        handle.id
                    )));
                }
            },
        };

        match exit {
            Exit::Exited {
                status: Ok(status),
                stdout,
                stderr,
            } => {
                if status.success() {
                    driver.parse_output(&stdout)
                } else {
                    let code = status.code();
                    Err(AgentError::spawn_failed(format!(
                        "{} exited with {}: {}",
                        driver.agent_type(),
                        code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")),
                        stderr.trim()
                    ))
                    .with_details(json!({ "exitCode": code, "stderr": stderr })))
                }
            }
            Exit::Exited { status: Err(e), .. } => {
                Err(AgentError::spawn_failed(format!("Failed waiting for process: {e}")))
            }
            Exit::Killed => Err(AgentError::spawn_failed(format!(
                "Process {} was killed",
                handle.id
            ))),
        }
    }

    /// Forget a process (and any unclaimed exit). Returns whether it was
    /// still running.
    pub fn deregister(&self, id: &str) -> bool {
        self.shared.unclaimed.lock().unwrap().remove(id);
        self.shared.processes.lock().unwrap().remove(id).is_some()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.shared.processes.lock().unwrap().contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.shared.processes.lock().unwrap().len()
    }

    /// Kill and forget every tracked process. Pending collections settle with
    /// `PROCESS_SPAWN_FAILED`. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, Tracked)> =
            self.shared.processes.lock().unwrap().drain().collect();
        self.shared.unclaimed.lock().unwrap().clear();
        let count = drained.len();
        for (_, tracked) in drained {
            tracked.kill.notify_one();
            tracked.cancel.notify_one();
        }
        if count > 0 {
            log::info!("Cancelled {count} agent process(es)");
        }
        count
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the watcher task owns.
struct Watcher {
    id: String,
    child: Child,
    log: LogHandle,
    chunks: mpsc::UnboundedSender<String>,
    settled: oneshot::Sender<Exit>,
    kill: Arc<Notify>,
    shared: Arc<Shared>,
}

async fn watch_process(watcher: Watcher) {
    let Watcher {
        id,
        mut child,
        log,
        chunks,
        settled,
        kill,
        shared,
    } = watcher;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let run = async {
        let (stdout, stderr, status) = tokio::join!(
            read_stream(stdout, Direction::Stdout, &log, Some(&chunks)),
            read_stream(stderr, Direction::Stderr, &log, None),
            child.wait(),
        );
        Exit::Exited {
            status,
            stdout,
            stderr,
        }
    };
    let exited = tokio::select! {
        exit = run => Some(exit),
        _ = kill.notified() => None,
    };
    let exit = match exited {
        Some(exit) => exit,
        None => {
            if let Err(e) = child.start_kill() {
                log::debug!("start_kill: {e}");
            }
            let _ = child.wait().await;
            Exit::Killed
        }
    };
    drop(chunks);

    log::debug!("Process {id} closed");
    shared.settle(&id, exit, settled);
}

/// Forward chunks until the watcher settles, then drain what is left.
async fn wait_settled(
    mut settled: oneshot::Receiver<Exit>,
    mut chunks: mpsc::UnboundedReceiver<String>,
    on_chunk: Option<ChunkCallback<'_>>,
    timeout: Duration,
    cancel: &Notify,
) -> Waited {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut streaming = on_chunk.is_some();

    let waited = loop {
        tokio::select! {
            chunk = chunks.recv(), if streaming => match (chunk, on_chunk) {
                (Some(chunk), Some(cb)) => cb(&chunk),
                _ => streaming = false,
            },
            exit = &mut settled => break match exit {
                Ok(exit) => Waited::Settled(exit),
                // The watcher is gone without reporting.
                Err(_) => Waited::Settled(Exit::Killed),
            },
            _ = &mut deadline => break Waited::TimedOut,
            _ = cancel.notified() => break Waited::Cancelled,
        }
    };

    if let (Waited::Settled(_), Some(cb)) = (&waited, on_chunk) {
        while let Ok(chunk) = chunks.try_recv() {
            cb(&chunk);
        }
    }
    waited
}

async fn read_stream<R: AsyncRead + Unpin>(
    stream: Option<R>,
    direction: Direction,
    log: &LogHandle,
    chunks: Option<&mpsc::UnboundedSender<String>>,
) -> String {
    let Some(mut stream) = stream else {
        return String::new();
    };
    let mut decoder = Utf8Buffer::default();
    let mut collected = String::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::debug!("{} read error: {e}", direction.as_str());
                break;
            }
        };
        let text = decoder.push(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        logging::log_line(log, direction, &text);
        if let Some(tx) = chunks {
            let _ = tx.send(text.clone());
        }
        collected.push_str(&text);
    }
    let rest = decoder.flush();
    if !rest.is_empty() {
        if let Some(tx) = chunks {
            let _ = tx.send(rest.clone());
        }
        collected.push_str(&rest);
    }
    collected
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agents::AgentOperation;
    use crate::error::ErrorCode;
    use crate::process::testing::ShellDriver;

    fn script(driver: &ShellDriver, body: &str) -> Vec<String> {
        driver
            .build_args(&AgentOperation::Generate {
                prompt: body.to_string(),
            })
            .unwrap()
    }

    fn direct() -> SpawnOptions {
        SpawnOptions::default().direct()
    }

    mod collect {
        use super::*;

        #[tokio::test]
        async fn exit_zero_is_parsed() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            let handle = manager
                .spawn(&driver, &script(&driver, "echo hello"), &direct())
                .unwrap();
            assert!(manager.is_running(&handle.id));

            let output = manager
                .collect_output(&driver, &handle, Duration::from_secs(10))
                .await
                .unwrap();
            assert_eq!(output.text, "hello");
            assert!(!manager.is_running(&handle.id));
            assert_eq!(manager.active_count(), 0);
        }

        #[tokio::test]
        async fn non_zero_exit_reports_stderr_and_code() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Codex);
            let handle = manager
                .spawn(&driver, &script(&driver, "echo broken >&2; exit 3"), &direct())
                .unwrap();

            let err = manager
                .collect_output(&driver, &handle, Duration::from_secs(10))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessSpawnFailed);
            let details = err.details.unwrap();
            assert_eq!(details["exitCode"], 3);
            assert!(details["stderr"].as_str().unwrap().contains("broken"));
            assert!(!manager.is_running(&handle.id));
        }

        #[tokio::test]
        async fn parse_failure_is_reported() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Gemini);
            let handle = manager
                .spawn(&driver, &script(&driver, "echo not json"), &direct())
                .unwrap();
            let err = manager
                .collect_output(&driver, &handle, Duration::from_secs(10))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessOutputParseError);
        }

        #[tokio::test]
        async fn missing_binary_fails_to_spawn() {
            let manager = ProcessManager::new();
            let mut driver = ShellDriver::new(AgentType::Claude);
            driver.binary = "/nonexistent/hookline-agent".to_string();
            let err = manager.spawn(&driver, &[], &direct()).unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessSpawnFailed);
            assert_eq!(manager.active_count(), 0);
        }

        #[tokio::test]
        async fn hanging_process_times_out_once() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            let handle = manager
                .spawn(&driver, &script(&driver, "exec sleep 30"), &direct())
                .unwrap();

            let started = std::time::Instant::now();
            let err = manager
                .collect_output(&driver, &handle, Duration::from_millis(100))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessTimeout);
            assert!(started.elapsed() < Duration::from_secs(10));
            assert!(!manager.is_running(&handle.id));

            // A late close path finds nothing to remove and nothing to settle.
            assert!(!manager.deregister(&handle.id));
            let again = manager
                .collect_output(&driver, &handle, Duration::from_millis(100))
                .await
                .unwrap_err();
            assert_eq!(again.code, ErrorCode::ProcessSpawnFailed);
        }

        #[tokio::test]
        async fn one_timeout_does_not_affect_another_process() {
            let manager = Arc::new(ProcessManager::new());
            let driver = Arc::new(ShellDriver::new(AgentType::Claude));
            let slow = manager
                .spawn(&*driver, &script(&driver, "exec sleep 30"), &direct())
                .unwrap();
            let fast = manager
                .spawn(&*driver, &script(&driver, "sleep 0.3; echo ok"), &direct())
                .unwrap();

            let (slow_result, fast_result) = tokio::join!(
                manager.collect_output(&*driver, &slow, Duration::from_millis(100)),
                manager.collect_output(&*driver, &fast, Duration::from_secs(10)),
            );
            assert_eq!(slow_result.unwrap_err().code, ErrorCode::ProcessTimeout);
            assert_eq!(fast_result.unwrap().text, "ok");
            assert_eq!(manager.active_count(), 0);
        }
    }

    mod lifecycle {
        use super::*;

        #[tokio::test]
        async fn exited_process_leaves_the_active_set_uncollected() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            let handle = manager
                .spawn(&driver, &script(&driver, "echo done"), &direct())
                .unwrap();

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert!(!manager.is_running(&handle.id));
            assert_eq!(manager.active_count(), 0);

            // The exit is still there for a late collector, exactly once.
            let output = manager
                .collect_output(&driver, &handle, Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(output.text, "done");
            let again = manager
                .collect_output(&driver, &handle, Duration::from_secs(1))
                .await
                .unwrap_err();
            assert_eq!(again.code, ErrorCode::ProcessSpawnFailed);
        }

        #[tokio::test]
        async fn second_collector_is_rejected() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            let handle = manager
                .spawn(&driver, &script(&driver, "sleep 0.2; echo ok"), &direct())
                .unwrap();

            let (first, second) = tokio::join!(
                manager.collect_output(&driver, &handle, Duration::from_secs(10)),
                manager.collect_output(&driver, &handle, Duration::from_secs(10)),
            );
            assert_eq!(first.unwrap().text, "ok");
            assert_eq!(second.unwrap_err().code, ErrorCode::ProcessSpawnFailed);
        }

        #[test]
        fn spawn_outside_a_runtime_fails() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            let err = manager
                .spawn(&driver, &script(&driver, "true"), &direct())
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessSpawnFailed);
            assert_eq!(manager.active_count(), 0);
        }
    }

    mod stream {
        use super::*;

        #[tokio::test]
        async fn chunks_arrive_before_the_result() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Codex);
            let handle = manager
                .spawn(&driver, &script(&driver, "echo one; sleep 0.1; echo two"), &direct())
                .unwrap();

            let chunks = Mutex::new(Vec::new());
            let on_chunk = |chunk: &str| chunks.lock().unwrap().push(chunk.to_string());
            let output = manager
                .stream_output(&driver, &handle, Duration::from_secs(10), &on_chunk)
                .await
                .unwrap();

            assert_eq!(output.text, "one\ntwo");
            let joined: String = chunks.lock().unwrap().concat();
            assert_eq!(joined, "one\ntwo\n");
        }
    }

    mod cancel {
        use super::*;

        #[tokio::test]
        async fn cancel_all_settles_pending_collections() {
            let manager = Arc::new(ProcessManager::new());
            let driver = Arc::new(ShellDriver::new(AgentType::Claude));
            let handle = manager
                .spawn(&*driver, &script(&driver, "exec sleep 30"), &direct())
                .unwrap();

            let collector = {
                let manager = manager.clone();
                let driver = driver.clone();
                let handle = handle.clone();
                tokio::spawn(async move {
                    manager
                        .collect_output(&*driver, &handle, Duration::from_secs(30))
                        .await
                })
            };
            tokio::time::sleep(Duration::from_millis(50)).await;

            assert_eq!(manager.cancel_all(), 1);
            let err = collector.await.unwrap().unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessSpawnFailed);
            assert_eq!(manager.active_count(), 0);
            assert_eq!(manager.cancel_all(), 0);
        }

        #[tokio::test]
        async fn cancel_before_collect_kills_the_child() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            let handle = manager
                .spawn(&driver, &script(&driver, "exec sleep 30"), &direct())
                .unwrap();
            assert_eq!(manager.cancel_all(), 1);
            let err = manager
                .collect_output(&driver, &handle, Duration::from_secs(1))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ProcessSpawnFailed);
        }
    }

    mod availability {
        use super::*;

        #[tokio::test]
        async fn available_when_probe_exits_zero() {
            let manager = ProcessManager::new();
            let driver = ShellDriver::new(AgentType::Claude);
            assert!(manager.is_available(&driver, &direct()).await);
        }

        #[tokio::test]
        async fn unavailable_when_binary_is_missing() {
            let manager = ProcessManager::new();
            let mut driver = ShellDriver::new(AgentType::Claude);
            driver.binary = "/nonexistent/hookline-agent".to_string();
            assert!(!manager.is_available(&driver, &direct()).await);
        }
    }

    #[tokio::test]
    async fn transcript_is_written_when_log_dir_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ProcessManager::new();
        let driver = ShellDriver::new(AgentType::Claude);
        let opts = direct().log_dir(dir.path().to_str().unwrap());
        let handle = manager
            .spawn(&driver, &script(&driver, "echo logged"), &opts)
            .unwrap();
        manager
            .collect_output(&driver, &handle, Duration::from_secs(10))
            .await
            .unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join(format!("{}.log", handle.id))).unwrap();
        assert!(contents.contains("STDOUT: logged"));
        assert!(contents.contains("STDIN: -c echo logged"));
    }
}
