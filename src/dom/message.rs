//! Build diagnostics returned alongside the built tree.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Info,
    Warning,
    Error,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Dotted key-path of the node that produced the message.
    pub from: String,
    pub content: String,
}

impl Message {
    pub fn new(kind: MessageType, from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            content: content.into(),
        }
    }

    pub fn info(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageType::Info, from, content)
    }

    pub fn warning(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageType::Warning, from, content)
    }

    pub fn error(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageType::Error, from, content)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from.is_empty() {
            write!(f, "[{}] {}", self.kind, self.content)
        } else {
            write!(f, "[{}] {}: {}", self.kind, self.from, self.content)
        }
    }
}

/// Per-type message counts, for pass/fail reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSummary {
    pub info: usize,
    pub warning: usize,
    pub error: usize,
}

impl MessageSummary {
    pub fn from_messages(messages: &[Message]) -> Self {
        messages.iter().fold(Self::default(), |mut summary, msg| {
            match msg.kind {
                MessageType::Info => summary.info += 1,
                MessageType::Warning => summary.warning += 1,
                MessageType::Error => summary.error += 1,
            }
            summary
        })
    }

    #[inline]
    pub fn passed(&self) -> bool {
        self.error == 0
    }
}

impl fmt::Display for MessageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error{}, {} warning{}, {} info",
            self.error,
            plural_s(self.error),
            self.warning,
            plural_s(self.warning),
            self.info
        )
    }
}

#[inline]
fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
