//! Building the child command line.
//!
//! Agents are normally launched through the user's login shell so they see
//! the same PATH (node, nvm shims, ...) as an interactive terminal:
//!
//! ```text
//! $SHELL -l -c '<binary> <quoted args...>'
//! ```
//!
//! A configured prefix (`/bin/zsh -l -c`, `bash -c`) replaces the default;
//! an empty prefix disables the wrapper and runs the binary directly.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AgentError, AgentResult};

/// Shells that don't accept `-l -c`.
const NON_POSIX_SHELLS: [&str; 6] = ["fish", "nu", "nushell", "elvish", "xonsh", "ion"];

/// How a child is launched.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub cwd: Option<PathBuf>,
    /// Merged over the parent environment.
    pub env: HashMap<String, String>,
    /// `None` = login shell from `$SHELL`, `Some("")` = no shell.
    pub shell_prefix: Option<String>,
    /// Directory for per-process transcripts.
    pub log_dir: Option<String>,
}

impl SpawnOptions {
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: HashMap<String, String>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn shell_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shell_prefix = Some(prefix.into());
        self
    }

    /// Run the binary directly instead of through a login shell.
    pub fn direct(self) -> Self {
        self.shell_prefix("")
    }

    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    fn uses_shell(&self) -> bool {
        cfg!(unix) && self.shell_prefix.as_deref() != Some("")
    }
}

/// Program and argv for launching `binary args...` under `opts`.
pub fn command_line(
    binary: &str,
    args: &[String],
    opts: &SpawnOptions,
) -> AgentResult<(String, Vec<String>)> {
    if !opts.uses_shell() {
        return Ok((binary.to_string(), args.to_vec()));
    }

    let prefix = shell_prefix(opts.shell_prefix.as_deref());
    let mut parts = prefix.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| AgentError::spawn_failed("Empty shell prefix"))?
        .to_string();
    let mut argv: Vec<String> = parts.map(str::to_string).collect();

    let mut quoted = Vec::with_capacity(args.len() + 1);
    for word in std::iter::once(binary).chain(args.iter().map(String::as_str)) {
        let q = shlex::try_quote(word)
            .map_err(|_| AgentError::spawn_failed(format!("Cannot quote argument: {word:?}")))?;
        quoted.push(q.into_owned());
    }
    argv.push(quoted.join(" "));
    Ok((program, argv))
}

/// Build a ready-to-spawn command. Stdio is left to the caller.
pub fn build_command(
    binary: &str,
    args: &[String],
    opts: &SpawnOptions,
) -> AgentResult<tokio::process::Command> {
    let (program, argv) = command_line(binary, args, opts)?;
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(argv);
    if let Some(ref dir) = opts.cwd {
        cmd.current_dir(dir);
    }
    if let Some(path) = path_with_binary_dir(binary) {
        cmd.env("PATH", path);
    }
    cmd.envs(&opts.env);
    Ok(cmd)
}

/// PATH with the binary's own directory prepended, so a node-based CLI finds
/// the node next to it.
pub fn path_with_binary_dir(binary: &str) -> Option<String> {
    if !binary.contains('/') {
        return None;
    }
    let dir = std::path::Path::new(binary).parent()?.to_str()?;
    if dir.is_empty() {
        return None;
    }
    let existing = std::env::var("PATH").unwrap_or_default();
    Some(if existing.is_empty() {
        dir.to_string()
    } else {
        format!("{dir}:{existing}")
    })
}

fn shell_prefix(custom: Option<&str>) -> String {
    if let Some(prefix) = custom.filter(|p| !p.trim().is_empty()) {
        return prefix.to_string();
    }

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let name = std::path::Path::new(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let effective = if NON_POSIX_SHELLS.contains(&name) {
        if std::path::Path::new("/bin/bash").exists() {
            "/bin/bash"
        } else {
            "/bin/sh"
        }
    } else {
        shell.as_str()
    };
    format!("{effective} -l -c")
}
