use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Value echoed in every `Response::id`. It marks the protocol session and
/// is never the node id.
pub const SESSION_MARKER: i64 = 1;

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_FAILURE: i32 = 1;

/// Request parameter carrying the host-facts blob on `register`.
pub const PARAM_SYSINFO: &str = "sysinfo";
/// Request parameter carrying the display name on `register`.
pub const PARAM_NAME: &str = "name";
/// Request/response key naming a single job.
pub const PARAM_JOB: &str = "job";
/// Request parameter carrying base64 job output on `jobresult`.
pub const PARAM_DATA: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Checkin,
    Register,
    GetJobs,
    DeleteJob,
    JobResult,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Checkin => "checkin",
            Action::Register => "register",
            Action::GetJobs => "getjobs",
            Action::DeleteJob => "deletejob",
            Action::JobResult => "jobresult",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkin" => Ok(Action::Checkin),
            "register" => Ok(Action::Register),
            "getjobs" => Ok(Action::GetJobs),
            "deletejob" => Ok(Action::DeleteJob),
            "jobresult" => Ok(Action::JobResult),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// Client to coordinator request.
///
/// `action` stays a plain string on the wire so that events carrying an
/// unrecognised action still decode; dispatch decides what to do with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(default)]
    pub id: i64,
    /// Missing timestamps decode as the Unix epoch.
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: String,
}

impl Event {
    pub fn new(id: i64, action: Action, auth: impl Into<String>) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            action: action.as_str().to_string(),
            parameters: BTreeMap::new(),
            auth: auth.into(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Parsed action, or `None` when the wire value is not a known action.
    pub fn action(&self) -> Option<Action> {
        self.action.parse().ok()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Coordinator to client reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub id: i64,
    pub response_code: i32,
    pub response_message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub response_data: BTreeMap<String, String>,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self::with_code(CODE_SUCCESS, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_code(CODE_FAILURE, message)
    }

    fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            id: SESSION_MARKER,
            response_code: code,
            response_message: message.into(),
            response_data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_data.insert(key.into(), value.into());
        self
    }

    pub fn with_data_map(mut self, data: BTreeMap<String, String>) -> Self {
        self.response_data = data;
        self
    }

    pub fn is_success(&self) -> bool {
        self.response_code == CODE_SUCCESS
    }

    /// True when the reply carries the session marker, i.e. it came from a
    /// coordinator rather than being synthesised locally.
    pub fn is_session_reply(&self) -> bool {
        self.id == SESSION_MARKER
    }
}

// Peers written in languages with nullable maps send `null` for empty maps.
fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}
