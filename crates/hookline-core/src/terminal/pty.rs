//! Agent CLIs running in pseudo-terminals.
//!
//! Each PTY gets a reader thread (portable-pty readers are blocking) that
//! decodes output and hands it to an async pump. The pump forwards raw text
//! to UI surfaces and queues it for a detector task that feeds the
//! [`TerminalBridge`], which may answer permission prompts through the PTY's
//! writer. A prompt waiting on a human never holds up the pump: at EOF the
//! terminal is detached, which cancels the wait, and the exit is reported.

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::{
    collections::HashMap,
    io::{Read, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
};
use tokio::sync::mpsc;

use crate::agents::AgentType;
use crate::error::{AgentError, AgentResult};
use crate::event_bus::{EventBus, UiMessage};
use crate::process::Utf8Buffer;

use super::detector::{TerminalBridge, TerminalWriter};

/// Keeps the master alive; dropping it closes the PTY.
struct PtyEntry {
    master: Box<dyn portable_pty::MasterPty + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    token: u64,
}

/// How to launch an agent in a PTY.
#[derive(Debug, Clone)]
pub struct PtySpawnConfig {
    pub id: String,
    pub agent: AgentType,
    pub binary: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub cols: u16,
    pub rows: u16,
}

impl PtySpawnConfig {
    pub fn new(id: impl Into<String>, agent: AgentType, binary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent,
            binary: binary.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            cols: 120,
            rows: 40,
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn envs(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }
}

/// Owns interactive agent terminals and wires them to the bridge.
pub struct PtyManager {
    ptys: Arc<Mutex<HashMap<String, PtyEntry>>>,
    bus: Arc<EventBus>,
    bridge: TerminalBridge,
    next_token: AtomicU64,
}

impl PtyManager {
    pub fn new(bus: Arc<EventBus>, bridge: TerminalBridge) -> Self {
        Self {
            ptys: Arc::new(Mutex::new(HashMap::new())),
            bus,
            bridge,
            next_token: AtomicU64::new(1),
        }
    }

    /// Spawn `config.binary` in a new PTY and attach it to the bridge.
    ///
    /// An existing PTY with the same id is killed first. Must be called
    /// inside a tokio runtime.
    pub fn spawn(&self, config: PtySpawnConfig) -> AgentResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AgentError::spawn_failed("PTY output needs a tokio runtime"))?;

        self.kill(&config.id);

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| AgentError::spawn_failed(format!("Failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&config.binary);
        cmd.args(&config.args);
        if let Some(ref cwd) = config.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            AgentError::spawn_failed(format!("Failed to spawn {} in PTY: {e}", config.binary))
        })?;
        // Only the master side is needed from here on.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| AgentError::spawn_failed(format!("Failed to clone PTY reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| AgentError::spawn_failed(format!("Failed to take PTY writer: {e}")))?;
        let writer = Arc::new(Mutex::new(writer));

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.ptys.lock().unwrap().insert(
            config.id.clone(),
            PtyEntry {
                master: pair.master,
                child,
                writer: Arc::clone(&writer),
                token,
            },
        );
        let workspace = config.cwd.as_ref().map(|cwd| cwd.to_string_lossy());
        self.bridge.attach(
            &config.id,
            config.agent,
            workspace.as_deref(),
            keystroke_writer(&config.id, writer),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let (detect_tx, detect_rx) = mpsc::unbounded_channel();
        spawn_reader(&config.id, reader, tx);
        runtime.spawn(detect(config.id.clone(), detect_rx, self.bridge.clone()));
        runtime.spawn(pump(
            config.id.clone(),
            token,
            rx,
            detect_tx,
            Arc::clone(&self.ptys),
            Arc::clone(&self.bus),
            self.bridge.clone(),
        ));

        log::info!("Spawned {} in PTY {}", config.agent, config.id);
        Ok(())
    }

    pub fn write(&self, id: &str, data: &[u8]) -> AgentResult<()> {
        let map = self.ptys.lock().unwrap();
        let entry = map
            .get(id)
            .ok_or_else(|| AgentError::unknown(format!("No PTY with id {id}")))?;

        let mut writer = entry.writer.lock().unwrap();
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| AgentError::unknown(format!("PTY write failed: {e}")))
    }

    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> AgentResult<()> {
        let map = self.ptys.lock().unwrap();
        let entry = map
            .get(id)
            .ok_or_else(|| AgentError::unknown(format!("No PTY with id {id}")))?;

        entry
            .master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| AgentError::unknown(format!("PTY resize failed: {e}")))
    }

    /// Kill a PTY's child and detach it. Unknown ids are ignored.
    pub fn kill(&self, id: &str) {
        let removed = self.ptys.lock().unwrap().remove(id);
        if let Some(mut entry) = removed {
            if let Err(e) = entry.child.kill() {
                log::debug!("Killing PTY {id}: {e}");
            }
            self.bridge.detach(id);
        }
    }

    pub fn kill_all(&self) -> usize {
        let ids: Vec<String> = self.ptys.lock().unwrap().keys().cloned().collect();
        for id in &ids {
            self.kill(id);
        }
        ids.len()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.ptys.lock().unwrap().contains_key(id)
    }
}

fn keystroke_writer(id: &str, writer: Arc<Mutex<Box<dyn Write + Send>>>) -> TerminalWriter {
    let id = id.to_string();
    Arc::new(move |keys: &str| {
        let mut w = writer.lock().unwrap();
        if let Err(e) = w.write_all(keys.as_bytes()).and_then(|_| w.flush()) {
            log::warn!("Failed to write to PTY {id}: {e}");
        }
    })
}

/// Blocking reads on a plain thread; decoded text goes to the pump.
fn spawn_reader(id: &str, mut reader: Box<dyn Read + Send>, tx: mpsc::UnboundedSender<String>) {
    let id = id.to_string();
    thread::spawn(move || {
        let mut decoder = Utf8Buffer::default();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let text = decoder.push(&buf[..n]);
                    if !text.is_empty() && tx.send(text).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("PTY {id} read ended: {e}");
                    break;
                }
            }
        }
        let rest = decoder.flush();
        if !rest.is_empty() {
            let _ = tx.send(rest);
        }
    });
}

/// Chunks are scanned one at a time, in order. A prompt awaiting a human
/// holds up later chunks of the same terminal only.
async fn detect(id: String, mut rx: mpsc::UnboundedReceiver<String>, bridge: TerminalBridge) {
    while let Some(text) = rx.recv().await {
        bridge.process_output(&id, &text).await;
    }
}

async fn pump(
    id: String,
    token: u64,
    mut rx: mpsc::UnboundedReceiver<String>,
    detect_tx: mpsc::UnboundedSender<String>,
    ptys: Arc<Mutex<HashMap<String, PtyEntry>>>,
    bus: Arc<EventBus>,
    bridge: TerminalBridge,
) {
    while let Some(text) = rx.recv().await {
        bus.emit(UiMessage::TerminalData {
            terminal_id: id.clone(),
            data: text.clone(),
        });
        let _ = detect_tx.send(text);
    }
    drop(detect_tx);

    // Only clean up if the id wasn't reused by a newer spawn.
    let entry = {
        let mut map = ptys.lock().unwrap();
        match map.get(&id) {
            Some(e) if e.token == token => map.remove(&id),
            _ => None,
        }
    };
    let code = match entry {
        Some(mut entry) => {
            // Cancels a prompt still waiting on a human.
            bridge.detach(&id);
            entry
                .child
                .try_wait()
                .ok()
                .flatten()
                .map(|status| status.exit_code())
        }
        None => None,
    };
    log::info!("PTY {id} exited (code {code:?})");
    bus.emit(UiMessage::TerminalExit {
        terminal_id: id,
        code,
    });
}
