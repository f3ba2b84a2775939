pub mod sampler;
pub mod scalar;
pub mod status;

pub use sampler::Sampler;

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Non-fatal, per-source failure. Reported next to the snapshot fields,
/// never instead of them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("failed to read {path}: {cause}")]
    Io { path: String, cause: String },
    #[error("failed to parse {raw:?} from {path} as an integer")]
    Parse { path: String, raw: String },
    #[error("malformed status line {line:?} in {path}: {reason}")]
    Malformed {
        path: String,
        line: String,
        reason: String,
    },
}

impl Fault {
    pub fn io(path: &str, err: &std::io::Error) -> Self {
        Fault::Io {
            path: path.to_string(),
            cause: err.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Io { .. } => "io",
            Fault::Parse { .. } => "parse",
            Fault::Malformed { .. } => "malformed",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Fault::Io { path, .. } | Fault::Parse { path, .. } | Fault::Malformed { path, .. } => {
                path
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Absent, FieldValue::Int)
    }
}

impl From<status::StatusValue> for FieldValue {
    fn from(value: status::StatusValue) -> Self {
        match value {
            status::StatusValue::Int(v) => FieldValue::Int(v),
            status::StatusValue::Raw(s) => FieldValue::Text(s),
        }
    }
}

/// Output of one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub fields: BTreeMap<String, FieldValue>,
    pub faults: Vec<Fault>,
}

impl Snapshot {
    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }
}

#[cfg(test)]
impl Snapshot {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}
