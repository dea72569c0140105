pub mod field;

pub use field::{FieldDecodeError, FieldKind, FieldSnapshot, FieldSpec, FieldValue};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Identifier of a test session.
pub type TestId = String;

/// Test id used when a request does not name one.
pub const DEFAULT_TEST_ID: &str = "001";

/// Largest inbound text message accepted by the control socket.
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Lifecycle action carried by an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Pause,
    Stop,
    Status,
    Ping,
    /// Free-form payload forwarded verbatim to the hardware bridge.
    Command(String),
    /// Legacy single-session rename. Sessions are now addressed by `test`,
    /// so this only selects the named session.
    ChangeTest,
    Unknown(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Start => "start",
            Action::Pause => "pause",
            Action::Stop => "stop",
            Action::Status => "status",
            Action::Ping => "ping",
            Action::Command(_) => "command",
            Action::ChangeTest => "changeTest",
            Action::Unknown(name) => name,
        }
    }
}

/// Validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target session; `None` when absent, empty or not a string.
    pub test: Option<TestId>,
    pub action: Action,
}

/// Why an inbound message was dropped. None of these are reported to the
/// client; the protocol has no error frame.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("message unmarshalling error: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message is not an object: {0}")]
    NotAnObject(&'static str),

    #[error("invalid key type: {0}")]
    InvalidKey(&'static str),

    #[error("key mismatch")]
    KeyMismatch,

    #[error("invalid action type: {0}")]
    InvalidAction(&'static str),

    #[error("invalid command type: {0}")]
    InvalidCommand(&'static str),
}

impl Request {
    /// Decode and validate one inbound message.
    ///
    /// Checks run in order: JSON object, key type, key equality, action
    /// type, command payload. The first failure rejects the whole message.
    pub fn decode(text: &str, expected_key: &str) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_str(text)?;
        let obj = match value {
            Value::Object(obj) => obj,
            other => return Err(RequestError::NotAnObject(json_type_name(Some(&other)))),
        };

        let key = match obj.get("key") {
            Some(Value::String(key)) => key,
            other => return Err(RequestError::InvalidKey(json_type_name(other))),
        };
        if key != expected_key {
            return Err(RequestError::KeyMismatch);
        }

        let action = match obj.get("action") {
            Some(Value::String(action)) => action.as_str(),
            other => return Err(RequestError::InvalidAction(json_type_name(other))),
        };

        let action = match action {
            "start" => Action::Start,
            "pause" => Action::Pause,
            "stop" => Action::Stop,
            "status" => Action::Status,
            "ping" => Action::Ping,
            "changeTest" => Action::ChangeTest,
            "command" => Action::Command(
                non_empty_string(&obj, "command").map_err(RequestError::InvalidCommand)?,
            ),
            other => Action::Unknown(other.to_string()),
        };

        Ok(Self {
            test: non_empty_string(&obj, "test").ok(),
            action,
        })
    }
}

fn non_empty_string(obj: &Map<String, Value>, field: &str) -> Result<String, &'static str> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err("empty string"),
        other => Err(json_type_name(other)),
    }
}

fn json_type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// State echoed to the client after every accepted request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub running: bool,
    pub paused: bool,
    pub name: String,
    pub test: TestId,
    pub fields: Vec<FieldSnapshot>,
    /// RFC 3339 UTC start instant; only present while a run is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}
