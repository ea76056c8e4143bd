//! Per-project policy persistence.
//!
//! # File Format
//!
//! One JSON file per project under the config directory:
//!
//! ```text
//! {config_dir}/policies/{project}.json
//! ```
//!
//! ```json
//! {
//!   "rules": [
//!     { "tool": "Bash", "command": "^git push", "decision": "deny" },
//!     { "tool": "*", "readOnly": true, "decision": "allow" }
//!   ],
//!   "default": "ask"
//! }
//! ```
//!
//! Projects without a file (or with a broken one) use the store's preset.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::policy::{PermissionPolicy, PolicyConfig, PolicyPreset};

pub struct PolicyStore {
    dir: PathBuf,
    fallback: Arc<PermissionPolicy>,
    cache: Mutex<HashMap<String, Arc<PermissionPolicy>>>,
}

impl PolicyStore {
    /// Policies live in `{config_dir}/policies`.
    pub fn new(config_dir: impl AsRef<Path>, fallback: PolicyPreset) -> Self {
        Self {
            dir: config_dir.as_ref().join("policies"),
            fallback: Arc::new(fallback.policy()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy_path(&self, project: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(project)))
    }

    pub fn fallback(&self) -> Arc<PermissionPolicy> {
        self.fallback.clone()
    }

    /// The policy for `project`, loaded on first use.
    pub fn get(&self, project: &str) -> Arc<PermissionPolicy> {
        if let Some(policy) = self.cache.lock().unwrap().get(project) {
            return policy.clone();
        }
        let policy = self.load(project);
        self.cache
            .lock()
            .unwrap()
            .insert(project.to_string(), policy.clone());
        policy
    }

    /// The policy for a workspace path; the project is its last component.
    pub fn for_workspace(&self, workspace_path: Option<&str>) -> Arc<PermissionPolicy> {
        match workspace_path.and_then(project_name) {
            Some(project) => self.get(project),
            None => self.fallback(),
        }
    }

    /// Validate, write atomically, and replace the cached policy.
    ///
    /// # Errors
    ///
    /// `InvalidData` if a command pattern doesn't compile; otherwise any
    /// filesystem error.
    pub fn save(&self, project: &str, config: PolicyConfig) -> Result<(), std::io::Error> {
        let policy = PermissionPolicy::compile(config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::create_dir_all(&self.dir)?;
        let file_path = self.policy_path(project);
        let temp_path = file_path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(policy.config())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &file_path)?;

        self.cache
            .lock()
            .unwrap()
            .insert(project.to_string(), Arc::new(policy));
        log::info!("Saved permission policy for {project}");
        Ok(())
    }

    /// Remove the project's file; it falls back to the preset afterwards.
    pub fn delete(&self, project: &str) -> Result<(), std::io::Error> {
        self.cache.lock().unwrap().remove(project);
        let file_path = self.policy_path(project);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
        }
        Ok(())
    }

    /// Drop cached policies so the next lookup rereads disk.
    pub fn invalidate(&self) {
        self.cache.lock().unwrap().clear();
    }

    fn load(&self, project: &str) -> Arc<PermissionPolicy> {
        let file_path = self.policy_path(project);
        if !file_path.exists() {
            return self.fallback();
        }
        let loaded = fs::read_to_string(&file_path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<PolicyConfig>(&s).map_err(|e| e.to_string()))
            .and_then(|c| PermissionPolicy::compile(c).map_err(|e| e.to_string()));
        match loaded {
            Ok(policy) => {
                log::debug!("Loaded permission policy for {project}");
                Arc::new(policy)
            }
            Err(e) => {
                log::warn!("Ignoring policy {}: {e}", file_path.display());
                self.fallback()
            }
        }
    }
}

fn project_name(workspace_path: &str) -> Option<&str> {
    Path::new(workspace_path)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}

fn sanitize(project: &str) -> String {
    project
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::policy::{Decision, PermissionRule};
    use tempfile::tempdir;

    fn deny_push() -> PolicyConfig {
        PolicyConfig {
            rules: vec![PermissionRule::new("Bash", Decision::Deny).command("^git push")],
            default: Decision::Allow,
        }
    }

    #[test]
    fn missing_file_uses_the_preset() {
        let dir = tempdir().unwrap();
        let store = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        assert_eq!(store.get("app").evaluate("Bash", Some("ls"), None), Decision::Ask);
    }

    #[test]
    fn save_then_load_from_a_fresh_store() {
        let dir = tempdir().unwrap();
        let store = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        store.save("app", deny_push()).unwrap();

        assert!(dir.path().join("policies/app.json").exists());
        assert!(!dir.path().join("policies/app.json.tmp").exists());

        let fresh = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        let policy = fresh.get("app");
        assert_eq!(policy.evaluate("Bash", Some("git push"), None), Decision::Deny);
        assert_eq!(policy.evaluate("Bash", Some("ls"), None), Decision::Allow);
    }

    #[test]
    fn invalid_pattern_is_not_saved() {
        let dir = tempdir().unwrap();
        let store = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        let config = PolicyConfig {
            rules: vec![PermissionRule::new("*", Decision::Deny).command("(")],
            default: Decision::Allow,
        };
        let err = store.save("app", config).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(!store.policy_path("app").exists());
    }

    #[test]
    fn corrupt_file_falls_back() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("policies")).unwrap();
        fs::write(dir.path().join("policies/app.json"), "{ not json").unwrap();

        let store = PolicyStore::new(dir.path(), PolicyPreset::Autonomous);
        assert_eq!(store.get("app").evaluate("Bash", Some("sudo ls"), None), Decision::Deny);
    }

    #[test]
    fn delete_reverts_to_the_preset() {
        let dir = tempdir().unwrap();
        let store = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        store.save("app", deny_push()).unwrap();
        store.delete("app").unwrap();
        store.delete("app").unwrap();
        assert_eq!(store.get("app").default_decision(), Decision::Ask);
    }

    #[test]
    fn workspace_paths_map_to_projects() {
        let dir = tempdir().unwrap();
        let store = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        store.save("app", deny_push()).unwrap();

        let policy = store.for_workspace(Some("/home/me/code/app"));
        assert_eq!(policy.evaluate("Bash", Some("git push"), None), Decision::Deny);
        assert_eq!(store.for_workspace(None).default_decision(), Decision::Ask);
    }

    #[test]
    fn project_names_cannot_escape_the_directory() {
        let dir = tempdir().unwrap();
        let store = PolicyStore::new(dir.path(), PolicyPreset::Interactive);
        let path = store.policy_path("../etc/passwd");
        assert_eq!(path.parent().unwrap(), dir.path().join("policies"));
    }
}
