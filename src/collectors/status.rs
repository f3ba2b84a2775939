//! Parser for status lines of the form `<label with spaces> <total> <used>`.
//!
//! The label may contain any number of spaces, so the two data fields are
//! always taken from the tail of the line.

use crate::collectors::scalar::read_first_line;
use crate::collectors::Fault;
use serde::{Deserialize, Serialize};

/// How the two trailing fields of a status line are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericMode {
    /// Both fields must be integers, otherwise the record is rejected.
    #[default]
    Integer,
    /// Fields are passed through as text.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Int(i64),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub label: String,
    pub used: StatusValue,
    pub total: StatusValue,
}

pub fn read_status_line(path: &str, mode: NumericMode) -> Result<StatusRecord, Fault> {
    let line = read_first_line(path)?;
    parse_status_line(path, &line, mode)
}

pub fn parse_status_line(
    path: &str,
    line: &str,
    mode: NumericMode,
) -> Result<StatusRecord, Fault> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(Fault::Malformed {
            path: path.to_string(),
            line: line.to_string(),
            reason: "insufficient fields".to_string(),
        });
    }

    let (label, tail) = tokens.split_at(tokens.len() - 2);
    let total = coerce(path, tail[0], mode)?;
    let used = coerce(path, tail[1], mode)?;

    Ok(StatusRecord {
        label: label.join(" "),
        used,
        total,
    })
}

fn coerce(path: &str, token: &str, mode: NumericMode) -> Result<StatusValue, Fault> {
    match mode {
        NumericMode::Raw => Ok(StatusValue::Raw(token.to_string())),
        NumericMode::Integer => token
            .parse::<i64>()
            .map(StatusValue::Int)
            .map_err(|_| Fault::Parse {
                path: path.to_string(),
                raw: token.to_string(),
            }),
    }
}
