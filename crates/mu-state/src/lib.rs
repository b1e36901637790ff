mod sink;
mod stats;

pub use sink::{BotEvent, EventSink, RuntimeState, LOG_RING_CAP};
pub use stats::{format_title, parse_title, CharacterStats};

use serde::{Deserialize, Serialize};

/// Operator-facing log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Important,
    Attention,
}

/// One entry of the operator-facing log ring. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Info,
        }
    }

    pub fn important(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Important,
        }
    }

    pub fn attention(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Attention,
        }
    }
}
