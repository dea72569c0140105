use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Value kind of a telemetry field, as named by the `type` key in config.
///
/// Kinds outside the closed set are kept verbatim so they can be echoed
/// back to clients; their values are always [`FieldValue::Absent`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Other(String),
}

impl FieldKind {
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Integer => "int",
            FieldKind::Real => "float",
            FieldKind::Other(raw) => raw,
        }
    }

    /// Zero value for this kind. Unknown kinds degrade to `Absent`.
    pub fn default_value(&self) -> FieldValue {
        match self {
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Real => FieldValue::Real(0.0),
            FieldKind::Other(_) => FieldValue::Absent,
        }
    }
}

impl From<String> for FieldKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "string" => FieldKind::Text,
            "int" => FieldKind::Integer,
            "float" => FieldKind::Real,
            _ => FieldKind::Other(raw),
        }
    }
}

impl From<&str> for FieldKind {
    fn from(raw: &str) -> Self {
        FieldKind::from(raw.to_string())
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// One entry of the configured field schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Current value of a telemetry field.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Absent,
}

impl FieldValue {
    /// Whether this value may be stored in a field of `kind`.
    /// `Absent` fits every kind.
    pub fn fits(&self, kind: &FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Absent, _)
                | (FieldValue::Text(_), FieldKind::Text)
                | (FieldValue::Integer(_), FieldKind::Integer)
                | (FieldValue::Real(_), FieldKind::Real)
        )
    }

    /// Decode a JSON value using `kind` as the discriminant.
    pub fn from_json(kind: &FieldKind, value: Value) -> Option<Self> {
        match (kind, value) {
            (_, Value::Null) => Some(FieldValue::Absent),
            (FieldKind::Text, Value::String(s)) => Some(FieldValue::Text(s)),
            (FieldKind::Integer, Value::Number(n)) => n.as_i64().map(FieldValue::Integer),
            (FieldKind::Real, Value::Number(n)) => n.as_f64().map(FieldValue::Real),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("value of field {id} does not match its type {kind}")]
pub struct FieldDecodeError {
    pub id: String,
    pub kind: String,
}

/// A field as it appears in a snapshot: schema entry plus current value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawField")]
pub struct FieldSnapshot {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub value: FieldValue,
}

impl FieldSnapshot {
    /// Snapshot of `spec` holding the zero value for its kind.
    pub fn zeroed(spec: &FieldSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            value: spec.kind.default_value(),
        }
    }
}

#[derive(Deserialize)]
struct RawField {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: FieldKind,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawField> for FieldSnapshot {
    type Error = FieldDecodeError;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let value = FieldValue::from_json(&raw.kind, raw.value).ok_or_else(|| FieldDecodeError {
            id: raw.id.clone(),
            kind: raw.kind.as_str().to_string(),
        })?;
        Ok(Self {
            id: raw.id,
            name: raw.name,
            kind: raw.kind,
            value,
        })
    }
}
