//! Request and response bodies exchanged with the controller.
//!
//! Response decoding never fails loudly: invalid JSON, a missing field, or a
//! field of the wrong type all decode to "absent", and callers branch on that.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::types::Program;

/// Controller endpoints consumed by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Liveness check. The only endpoint that can carry the terminate signal.
    Ping,
    /// Initial code generation.
    Gen,
    /// Repair request.
    Fix,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Ping => "/ping",
            Endpoint::Gen => "/gen",
            Endpoint::Fix => "/fix",
        }
    }
}

/// Status code the controller returns on `/ping` to order self-destruction.
pub const TERMINATE_STATUS: u16 = 418;

/// `status` value in a fix response meaning "no retry needed".
pub const STATUS_OK: &str = "ok";

/// Body of `POST /gen`.
#[derive(Debug, Clone, Serialize)]
pub struct GenRequest<'a> {
    pub master_prompt: &'a str,
}

/// Body of `POST /fix`.
#[derive(Debug, Clone, Serialize)]
pub struct FixRequest<'a> {
    pub code: &'a str,
    pub error: &'a str,
    pub master_prompt: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenResponse {
    #[serde(deserialize_with = "string_or_absent")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixResponse {
    #[serde(deserialize_with = "string_or_absent")]
    pub status: Option<String>,
    #[serde(deserialize_with = "string_or_absent")]
    pub code: Option<String>,
}

/// What the loop should do with a fix response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixVerdict {
    /// The server considers the failure resolved; stop without re-executing.
    Resolved,
    /// Replace the current program and run again.
    Replace(Program),
    /// Nothing usable came back.
    NoFix,
}

impl GenResponse {
    /// The generated program, if the response carried non-empty code.
    pub fn into_program(self) -> Option<Program> {
        self.code.filter(|code| !code.is_empty()).map(Program::new)
    }
}

impl FixResponse {
    /// `status: "ok"` wins over any code in the same response.
    pub fn verdict(self) -> FixVerdict {
        if self.status.as_deref() == Some(STATUS_OK) {
            return FixVerdict::Resolved;
        }
        match self.code {
            Some(code) if !code.is_empty() => FixVerdict::Replace(Program::new(code)),
            _ => FixVerdict::NoFix,
        }
    }
}

/// Decode a response body, returning `None` when it is not valid JSON.
pub fn decode<T: DeserializeOwned>(body: &str) -> Option<T> {
    serde_json::from_str(body).ok()
}

/// Decode a `/gen` body into a program, if there is one.
pub fn decode_program(body: &str) -> Option<Program> {
    decode::<GenResponse>(body).and_then(GenResponse::into_program)
}

/// Decode a `/fix` body. An undecodable body yields [`FixVerdict::NoFix`].
pub fn decode_fix(body: &str) -> FixVerdict {
    decode::<FixResponse>(body)
        .map(FixResponse::verdict)
        .unwrap_or(FixVerdict::NoFix)
}

fn string_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}
