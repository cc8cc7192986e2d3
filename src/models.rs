use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CheckKind {
    Ping,
    Http,
    Https,
    Ssh,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Ping => "ping",
            CheckKind::Http => "http",
            CheckKind::Https => "https",
            CheckKind::Ssh => "ssh",
        }
    }
}

impl FromStr for CheckKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ping" => Ok(CheckKind::Ping),
            "http" => Ok(CheckKind::Http),
            "https" => Ok(CheckKind::Https),
            "ssh" => Ok(CheckKind::Ssh),
            _ => Err(()),
        }
    }
}

impl TryFrom<String> for CheckKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map_err(|_| format!("unknown check type: {s}"))
    }
}

impl From<CheckKind> for String {
    fn from(kind: CheckKind) -> String {
        kind.as_str().to_string()
    }
}

/// A configured endpoint to be health-checked. `name` is the stable key for
/// state tracking and must be unique within the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Outcome of probing one target at one instant. Produced fresh each pass.
/// `error` is set only when the probe failed with a diagnosable error, not on
/// a clean unreachable verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub host: Option<String>,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub online: bool,
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
}

/// Emitted exactly once per online/offline transition, never on steady state
/// and never on a target's first observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub name: String,
    pub previous: bool,
    pub current: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub results: Vec<CheckResult>,
    pub checked_at: DateTime<Utc>,
}
