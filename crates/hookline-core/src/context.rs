//! HooklineContext - every shared service, built once at startup.
//!
//! Front ends (the CLI, a desktop shell, tests) construct one context and
//! pass it by reference. Nothing in the core is a global.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │      HooklineContext     │
//!                 ├──────────────────────────┤
//!   hook input ──▶│ HookBridge ─┐            │
//!                 │             ▼            │
//!   PTY output ──▶│ TerminalBridge ─▶ EventRegistry ─▶ gate, sessions, ...
//!                 │      │                   │
//!                 │      ▼                   │
//!   UI replies ──▶│ ActionBridge ─▶ EventBus ├──▶ UI surfaces
//!                 │                          │
//!                 │ AgentService per vendor ─┼──▶ child processes
//!                 └──────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agents::claude::{ClaudeDriver, HookBridge};
use crate::agents::codex::CodexDriver;
use crate::agents::gemini::GeminiDriver;
use crate::agents::{AdapterRegistry, AgentDriver, AgentType};
use crate::config::{default_config_dir, CoreConfig};
use crate::error::{AgentError, AgentResult};
use crate::event_bus::EventBus;
use crate::events::EventRegistry;
use crate::permission::{PermissionGate, PolicyStore};
use crate::process::{AgentService, ProcessManager};
use crate::session::SessionProvider;
use crate::terminal::{ActionBridge, ActionResponse, PtyManager, RespondResult, TerminalBridge};
use crate::tools::ToolRegistry;

#[derive(Default)]
pub struct HooklineContextBuilder {
    config_dir: Option<PathBuf>,
    config: Option<CoreConfig>,
    event_bus: Option<Arc<EventBus>>,
    adapters: Option<Arc<AdapterRegistry>>,
    drivers: Vec<Arc<dyn AgentDriver>>,
    default_agents: bool,
    permission_gate: bool,
}

impl HooklineContextBuilder {
    pub fn new() -> Self {
        Self {
            permission_gate: true,
            ..Self::default()
        }
    }

    /// Where `policies/` lives. Defaults to `~/.config/hookline`.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing EventBus (for tests or a host that owns one).
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn adapters(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    /// Add an agent service for `driver`. A later driver for the same
    /// agent replaces an earlier one.
    pub fn driver(mut self, driver: Arc<dyn AgentDriver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Add the built-in Claude, Codex and Gemini drivers, using the
    /// configured binaries.
    pub fn default_agents(mut self) -> Self {
        self.default_agents = true;
        self
    }

    /// Skip installing the policy gate on the registry.
    pub fn without_permission_gate(mut self) -> Self {
        self.permission_gate = false;
        self
    }

    pub fn build(self) -> HooklineContext {
        let config = self.config.unwrap_or_default();
        let config_dir = self.config_dir.unwrap_or_else(default_config_dir);

        let event_bus = self.event_bus.unwrap_or_else(|| Arc::new(EventBus::new()));
        let registry = EventRegistry::new();
        let adapters = self
            .adapters
            .unwrap_or_else(|| Arc::new(AdapterRegistry::with_defaults()));
        let actions = ActionBridge::new(event_bus.clone());
        let policies = Arc::new(PolicyStore::new(&config_dir, config.default_policy));
        let gate = self
            .permission_gate
            .then(|| PermissionGate::install(&registry, policies.clone()));
        let sessions = SessionProvider::new(&registry);
        let terminals = TerminalBridge::new(
            registry.clone(),
            adapters.clone(),
            actions.clone(),
            policies.clone(),
        );
        let ptys = Arc::new(PtyManager::new(event_bus.clone(), terminals.clone()));
        let hooks = HookBridge::new(registry.clone());
        let processes = Arc::new(ProcessManager::new().with_probe_timeout(config.probe_timeout()));

        let mut drivers: Vec<Arc<dyn AgentDriver>> = Vec::new();
        if self.default_agents {
            drivers.push(Arc::new(
                ClaudeDriver::new().with_binary(config.binary_for(AgentType::Claude)),
            ));
            drivers.push(Arc::new(
                CodexDriver::new().with_binary(config.binary_for(AgentType::Codex)),
            ));
            drivers.push(Arc::new(
                GeminiDriver::new().with_binary(config.binary_for(AgentType::Gemini)),
            ));
        }
        drivers.extend(self.drivers);

        let services = drivers
            .into_iter()
            .map(|driver| {
                let agent = driver.agent_type();
                let service = AgentService::new(driver, processes.clone())
                    .with_timeout(config.default_timeout())
                    .with_options(config.spawn_options());
                (agent, Arc::new(service))
            })
            .collect();

        HooklineContext {
            config: Arc::new(config),
            config_dir,
            event_bus,
            registry,
            adapters,
            actions,
            policies,
            gate,
            sessions,
            terminals,
            ptys,
            hooks,
            tools: Arc::new(ToolRegistry::new()),
            processes,
            services: Arc::new(services),
        }
    }
}

/// Central shared state. Cloning clones the pointers, not the services.
#[derive(Clone)]
pub struct HooklineContext {
    pub config: Arc<CoreConfig>,
    config_dir: PathBuf,
    pub event_bus: Arc<EventBus>,
    pub registry: EventRegistry,
    pub adapters: Arc<AdapterRegistry>,
    pub actions: ActionBridge,
    pub policies: Arc<PolicyStore>,
    pub gate: Option<Arc<PermissionGate>>,
    pub sessions: SessionProvider,
    pub terminals: TerminalBridge,
    pub ptys: Arc<PtyManager>,
    pub hooks: HookBridge,
    pub tools: Arc<ToolRegistry>,
    pub processes: Arc<ProcessManager>,
    services: Arc<HashMap<AgentType, Arc<AgentService>>>,
}

impl HooklineContext {
    pub fn builder() -> HooklineContextBuilder {
        HooklineContextBuilder::new()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// The service for `agent`, or `AGENT_NOT_INITIALIZED` when none was
    /// configured.
    pub fn service(&self, agent: AgentType) -> AgentResult<Arc<AgentService>> {
        self.services.get(&agent).cloned().ok_or_else(|| {
            AgentError::not_initialized(format!("No {agent} agent service is configured"))
        })
    }

    pub fn agents(&self) -> Vec<AgentType> {
        let mut agents: Vec<AgentType> = self.services.keys().copied().collect();
        agents.sort();
        agents
    }

    /// Inbound half of the UI round trip.
    pub fn respond_to_action(&self, response: ActionResponse) -> RespondResult {
        self.actions.respond(response)
    }

    /// Kill every child and PTY, cancel pending actions, and stop session
    /// tracking. Safe to call more than once.
    pub fn shutdown(&self) {
        let processes = self.processes.cancel_all();
        let ptys = self.ptys.kill_all();
        let actions = self.actions.cancel_all();
        self.sessions.dispose();
        if let Some(ref gate) = self.gate {
            gate.uninstall();
        }
        log::info!("Shut down: {processes} process(es), {ptys} PTY(s), {actions} pending action(s)");
    }
}

impl Default for HooklineContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::permission::PolicyPreset;

    fn context() -> (HooklineContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = HooklineContext::builder().config_dir(dir.path()).build();
        (ctx, dir)
    }

    #[test]
    fn unconfigured_agent_is_not_initialized() {
        let (ctx, _dir) = context();
        let err = ctx.service(AgentType::Claude).err().unwrap();
        assert_eq!(err.code, ErrorCode::AgentNotInitialized);
        assert!(ctx.agents().is_empty());
    }

    #[test]
    fn default_agents_use_configured_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CoreConfig::default();
        config.binaries.insert(AgentType::Codex, "/opt/codex".to_string());
        let ctx = HooklineContext::builder()
            .config_dir(dir.path())
            .config(config)
            .default_agents()
            .build();

        assert_eq!(ctx.agents(), AgentType::ALL.to_vec());
        assert_eq!(ctx.service(AgentType::Codex).unwrap().agent_type(), AgentType::Codex);
    }

    #[test]
    fn gate_and_sessions_are_registered() {
        let (ctx, _dir) = context();
        // Two for the gate, two for the session provider.
        assert_eq!(ctx.registry.handler_count(), 4);

        let dir = tempfile::tempdir().unwrap();
        let bare = HooklineContext::builder()
            .config_dir(dir.path())
            .without_permission_gate()
            .build();
        assert_eq!(bare.registry.handler_count(), 2);
        assert!(bare.gate.is_none());
    }

    #[test]
    fn policy_store_uses_the_configured_preset() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig {
            default_policy: PolicyPreset::Autonomous,
            ..Default::default()
        };
        let ctx = HooklineContext::builder()
            .config_dir(dir.path())
            .config(config)
            .build();
        assert_eq!(ctx.config_dir(), dir.path());
        assert_eq!(
            ctx.policies.get("any").default_decision(),
            crate::permission::Decision::Allow
        );
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (ctx, _dir) = context();
        let _pending = ctx.actions.register("a1", None);
        ctx.shutdown();
        ctx.shutdown();
        assert_eq!(ctx.registry.handler_count(), 0);
        assert_eq!(ctx.actions.pending_count(), 0);
        assert!(!ctx.respond_to_action(ActionResponse::allow("a1")).success);
    }
}
