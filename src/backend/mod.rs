use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::BackendError;
use crate::timeexpr::EpochSeconds;

pub mod datadog;

pub use datadog::DatadogClient;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Narrow fetch capability the tool layer needs from a monitoring backend.
///
/// Implementations are shared across concurrent tool calls and must not carry
/// per-request state. Single-monitor and history fetches return the record as
/// the backend sent it; callers that need fields decode a [`Monitor`] view.
#[async_trait::async_trait]
pub trait MonitoringBackend: Send + Sync {
    async fn search_monitors(&self, search: &MonitorSearch) -> BackendResult<MonitorSearchResponse>;

    async fn get_monitor(&self, id: &str) -> BackendResult<Value>;

    /// `{ "history": [...] }` payload, forwarded untouched.
    async fn get_monitor_state_history(
        &self,
        id: &str,
        from: EpochSeconds,
        to: EpochSeconds,
    ) -> BackendResult<Value>;

    /// Raw time-series payload; the shape is forwarded untouched.
    async fn query_metrics(
        &self,
        query: &str,
        from: EpochSeconds,
        to: EpochSeconds,
    ) -> BackendResult<Value>;

    async fn search_logs(&self, search: &LogSearch) -> BackendResult<LogSearchResponse>;
}

/// Current severity classification of a monitor. States this crate does not
/// name are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MonitorState {
    Ok,
    Alert,
    Warn,
    NoData,
    Ignored,
    Skipped,
    Other(String),
}

impl MonitorState {
    pub fn as_str(&self) -> &str {
        match self {
            MonitorState::Ok => "OK",
            MonitorState::Alert => "Alert",
            MonitorState::Warn => "Warn",
            MonitorState::NoData => "No Data",
            MonitorState::Ignored => "Ignored",
            MonitorState::Skipped => "Skipped",
            MonitorState::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for MonitorState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "OK" => MonitorState::Ok,
            "Alert" => MonitorState::Alert,
            "Warn" => MonitorState::Warn,
            "No Data" => MonitorState::NoData,
            "Ignored" => MonitorState::Ignored,
            "Skipped" => MonitorState::Skipped,
            _ => MonitorState::Other(raw),
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MonitorState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MonitorState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(MonitorState::from)
    }
}

/// Monitor priority, `P1` (highest) through `P5`.
///
/// The API reports priority as an integer; tool arguments use the `Pn` form.
/// Both are accepted, `Pn` is always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    P5,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::P1,
        Priority::P2,
        Priority::P3,
        Priority::P4,
        Priority::P5,
    ];

    pub fn from_level(level: u64) -> Option<Self> {
        match level {
            1 => Some(Priority::P1),
            2 => Some(Priority::P2),
            3 => Some(Priority::P3),
            4 => Some(Priority::P4),
            5 => Some(Priority::P5),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
            Priority::P4 => "P4",
            Priority::P5 => "P5",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = s
            .strip_prefix(['P', 'p'])
            .unwrap_or(s)
            .parse::<u64>()
            .map_err(|_| format!("invalid priority {s:?}"))?;
        Priority::from_level(level).ok_or_else(|| format!("invalid priority {s:?}"))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Level(u64),
            Label(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Level(level) => Priority::from_level(level)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid priority {level}"))),
            Raw::Label(label) => label.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Null or absent fields decode as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Priorities outside `P1..P5`, or of an unexpected type, read as unset.
fn lenient_priority<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Priority>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| Priority::deserialize(value).ok()))
}

/// Typed view of the monitor fields the tool layer interprets.
///
/// Decoding is lenient so one odd record never fails a whole page: null
/// strings and lists become empty, an unusable priority becomes `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_state: Option<MonitorState>,
    #[serde(
        default,
        deserialize_with = "lenient_priority",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl Monitor {
    /// Decode the typed view of a raw monitor record.
    pub fn from_record(record: &Value) -> BackendResult<Self> {
        Ok(Monitor::deserialize(record)?)
    }

    pub fn has_all_tags(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|tag| self.tags.contains(tag))
    }
}

/// Query parameters for a monitor search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSearch {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSearchResponse {
    #[serde(default)]
    pub monitors: Vec<Monitor>,
}

/// Log search window and filter. `from`/`to` are ISO 8601 timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSearch {
    pub query: String,
    pub from: String,
    pub to: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSearchResponse {
    #[serde(default)]
    pub data: Vec<Value>,
}
