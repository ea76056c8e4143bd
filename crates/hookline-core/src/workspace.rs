//! Workspace context injected into agent environments.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

pub const WORKSPACE_ENV: &str = "HOOKLINE_WORKSPACE";
pub const BRANCH_ENV: &str = "HOOKLINE_BRANCH";

/// Current git branch of `path`, or `None` outside a repository, on a
/// detached HEAD, or when git isn't installed.
pub async fn current_branch(path: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty() && branch != "HEAD").then_some(branch)
}

/// Environment variables describing the workspace an agent runs in.
pub async fn workspace_env(path: &Path) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(WORKSPACE_ENV.to_string(), path.display().to_string());
    match current_branch(path).await {
        Some(branch) => {
            env.insert(BRANCH_ENV.to_string(), branch);
        }
        None => log::debug!("No git branch for {}", path.display()),
    }
    env
}
