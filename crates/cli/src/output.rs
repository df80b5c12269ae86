use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

/// JSON envelope printed to stdout for every command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Default, Serialize)]
pub struct ResponseMeta {
    pub command: &'static str,
    pub duration_ms: u64,
}

impl CommandResponse {
    pub fn ok(command: &'static str, started: Instant, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => return Self::error(command, started, format!("serialize: {err}")),
        };
        Self {
            status: CommandStatus::Ok,
            message: None,
            data,
            meta: ResponseMeta::since(command, started),
        }
    }

    pub fn error(command: &'static str, started: Instant, message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            message: Some(message.into()),
            data: Value::Null,
            meta: ResponseMeta::since(command, started),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}

impl ResponseMeta {
    fn since(command: &'static str, started: Instant) -> Self {
        Self {
            command,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}
