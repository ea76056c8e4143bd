//! Custom tools agents can call by name.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;

use crate::error::{AgentError, AgentResult, ErrorCode};

pub type ToolHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, String>> + Send + Sync>;

/// What an agent is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

struct Tool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names are unique.
    pub fn register<F, Fut>(&self, definition: ToolDefinition, handler: F) -> AgentResult<()>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        let mut tools = self.tools.write().unwrap();
        if tools.contains_key(&definition.name) {
            return Err(AgentError::new(
                ErrorCode::ToolAlreadyRegistered,
                format!("Tool {} is already registered", definition.name),
            ));
        }
        let handler: ToolHandler = Arc::new(move |input| handler(input).boxed());
        tools.insert(
            definition.name.clone(),
            Tool {
                definition,
                handler,
            },
        );
        Ok(())
    }

    /// Returns whether the tool existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools.write().unwrap().remove(name).is_some()
    }

    pub async fn execute(&self, name: &str, input: serde_json::Value) -> AgentResult<serde_json::Value> {
        let handler = self
            .tools
            .read()
            .unwrap()
            .get(name)
            .map(|t| t.handler.clone())
            .ok_or_else(|| AgentError::new(ErrorCode::ToolNotFound, format!("No tool named {name}")))?;

        log::debug!("Executing tool {name}");
        handler(input).await.map_err(|e| {
            AgentError::new(ErrorCode::ToolExecutionFailed, format!("Tool {name} failed: {e}"))
                .with_details(serde_json::json!({ "tool": name }))
        })
    }

    /// Definitions sorted by name.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .unwrap()
            .values()
            .map(|t| t.definition.clone())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.read().unwrap().contains_key(name)
    }
}
