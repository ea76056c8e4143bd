//! Agent subprocess lifecycle.
//!
//! - [`shell`] - command line and environment for a child
//! - [`manager`] - spawn, collect, stream, cancel
//! - [`service`] - one vendor's driver on top of the manager

pub mod manager;
pub mod service;
pub mod shell;

pub use manager::{ProcessHandle, ProcessManager};
pub use service::AgentService;
pub use shell::SpawnOptions;

/// Accumulates raw bytes and hands back only complete UTF-8 text, holding
/// a split multi-byte sequence until the rest arrives.
#[derive(Debug, Default)]
pub(crate) struct Utf8Buffer {
    pending: Vec<u8>,
}

impl Utf8Buffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // An incomplete sequence at the end: keep it for next time.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Genuinely invalid bytes: give up on exactness.
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                return text;
            }
        };
        let rest = self.pending.split_off(valid);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    pub(crate) fn flush(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A stand-in driver that runs `sh -c <prompt>`.

    use crate::agents::{AgentDriver, AgentOperation, AgentOutput, AgentType};
    use crate::error::{AgentError, AgentResult};

    pub struct ShellDriver {
        pub agent: AgentType,
        pub binary: String,
    }

    impl ShellDriver {
        pub fn new(agent: AgentType) -> Self {
            Self {
                agent,
                binary: "sh".to_string(),
            }
        }
    }

    impl AgentDriver for ShellDriver {
        fn agent_type(&self) -> AgentType {
            self.agent
        }

        fn binary(&self) -> &str {
            &self.binary
        }

        fn version_args(&self) -> Vec<String> {
            vec!["-c".to_string(), "exit 0".to_string()]
        }

        fn build_args(&self, op: &AgentOperation) -> AgentResult<Vec<String>> {
            if let AgentOperation::Fork { from, .. } = op {
                from.require_concrete()?;
            }
            Ok(vec!["-c".to_string(), op.prompt().to_string()])
        }

        fn parse_output(&self, stdout: &str) -> AgentResult<AgentOutput> {
            let text = stdout.trim();
            if text == "not json" {
                return Err(AgentError::parse_error("unparseable"));
            }
            Ok(AgentOutput {
                text: text.to_string(),
                session_id: None,
                raw: serde_json::Value::Null,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_buffer_holds_split_sequences() {
        let bytes = "héllo ⏺".as_bytes();
        let mut buf = Utf8Buffer::default();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&buf.push(std::slice::from_ref(b)));
        }
        out.push_str(&buf.flush());
        assert_eq!(out, "héllo ⏺");
    }

    #[test]
    fn utf8_buffer_passes_invalid_bytes_lossily() {
        let mut buf = Utf8Buffer::default();
        let out = buf.push(&[b'a', 0xff, b'b']);
        assert_eq!(out, "a\u{fffd}b");
    }
}
