//! Heuristic scanning of interactive terminal output.
//!
//! CLI-only vendors print permission prompts, tool announcements and
//! end-of-turn markers as plain text. Each vendor supplies a fixed set of
//! regular expressions ([`TerminalPatterns`]); this module strips terminal
//! escapes and turns matches into events.
//!
//! This is a classifier, not a protocol parser. A permission prompt is only
//! reported once its confirmation line has been seen, so a prompt split
//! across chunks produces nothing until it is complete (see
//! [`TerminalPatterns::partial_prompt_start`]).

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::json;

use super::AgentType;
use crate::events::{
    AgentEvent, EventPayload, OutputCompletePayload, PermissionRequestPayload, ToolBeginPayload,
};

/// CSI, OSC and two-byte escape sequences.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").unwrap()
});

/// Remove escape sequences and carriage returns.
pub fn clean_terminal_text(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").replace('\r', "")
}

/// How a vendor renders a permission prompt.
pub struct PromptPattern {
    /// Start of the prompt. May capture `tool`.
    pub header: Regex,
    /// Tool name used when `header` has no `tool` group.
    pub default_tool: &'static str,
    /// A detail line between header and confirmation. Captures `value` and
    /// optionally `label` (`Command`, `File`, `URL`, `$`, ...).
    pub detail: Regex,
    /// The line asking for a decision. Its presence completes the prompt.
    pub confirm: Regex,
}

/// The fixed, ordered pattern set for one vendor.
pub struct TerminalPatterns {
    pub prompt: PromptPattern,
    /// Tool announcement. Captures `args` and optionally `tool`.
    pub tool_begin: Regex,
    pub tool_begin_default: &'static str,
    pub turn_complete: Regex,
}

impl TerminalPatterns {
    /// Scan already-received text for events, in text order.
    pub fn scan(&self, agent: AgentType, text: &str) -> Vec<AgentEvent> {
        let text = clean_terminal_text(text);
        let mut found: Vec<(usize, usize, EventPayload, String)> = Vec::new();

        let headers: Vec<Captures> = self.prompt.header.captures_iter(&text).collect();
        for (i, caps) in headers.iter().enumerate() {
            let Some(whole) = caps.get(0) else { continue };
            let window_end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            let window = &text[whole.end()..window_end];
            let Some(confirm) = self.prompt.confirm.find(window) else {
                continue;
            };

            let details = &window[..confirm.start()];
            let prompt_end = whole.end() + confirm.end();
            let tool_name = caps
                .name("tool")
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| self.prompt.default_tool.to_string());
            let (command, tool_input) = self.extract_details(details);

            let matched = text[whole.start()..prompt_end].trim().to_string();
            found.push((
                whole.start(),
                0,
                EventPayload::PermissionRequest(PermissionRequestPayload {
                    tool_name,
                    command,
                    tool_input,
                    prompt: Some(matched.clone()),
                    action_id: None,
                }),
                matched,
            ));
        }

        for caps in self.tool_begin.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            let tool_name = caps
                .name("tool")
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| self.tool_begin_default.to_string());
            let tool_input = caps
                .name("args")
                .map(|m| json!({ "args": m.as_str().trim() }))
                .unwrap_or(serde_json::Value::Null);
            found.push((
                whole.start(),
                1,
                EventPayload::ToolBegin(ToolBeginPayload {
                    tool_name,
                    tool_input,
                    tool_use_id: None,
                }),
                whole.as_str().trim().to_string(),
            ));
        }

        for whole in self.turn_complete.find_iter(&text) {
            found.push((
                whole.start(),
                2,
                EventPayload::AgentOutputComplete(OutputCompletePayload::default()),
                whole.as_str().trim().to_string(),
            ));
        }

        found.sort_by_key(|(offset, order, _, _)| (*offset, *order));
        found
            .into_iter()
            .map(|(_, _, payload, matched)| {
                AgentEvent::new(agent, payload).with_raw(json!({ "text": matched }))
            })
            .collect()
    }

    /// Byte offset of a prompt header that has not been confirmed yet.
    ///
    /// Only the last header can be unterminated; earlier ones were closed off
    /// by the header that follows them.
    pub fn partial_prompt_start(&self, text: &str) -> Option<usize> {
        let last = self.prompt.header.find_iter(text).last()?;
        if self.prompt.confirm.is_match(&text[last.end()..]) {
            None
        } else {
            Some(last.start())
        }
    }

    fn extract_details(&self, details: &str) -> (Option<String>, Option<serde_json::Value>) {
        let mut command = None;
        let mut fields = serde_json::Map::new();
        for caps in self.prompt.detail.captures_iter(details) {
            let Some(value) = caps.name("value") else { continue };
            let value = value.as_str().trim().to_string();
            let label = caps.name("label").map(|m| m.as_str().to_ascii_lowercase());
            match label.as_deref() {
                None | Some("command") | Some("$") => {
                    if command.is_none() {
                        command = Some(value);
                    }
                }
                Some("file") | Some("path") => {
                    fields.insert("file_path".to_string(), json!(value));
                }
                Some(other) => {
                    fields.insert(other.to_string(), json!(value));
                }
            }
        }
        if let Some(ref cmd) = command {
            fields.insert("command".to_string(), json!(cmd));
        }
        let input = if fields.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(fields))
        };
        (command, input)
    }
}
