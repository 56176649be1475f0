#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ddmon::AppContext;
use ddmon::backend::{
    BackendResult, LogSearch, LogSearchResponse, Monitor, MonitorSearch, MonitorSearchResponse,
    MonitoringBackend,
};
use ddmon::config::AppConfig;
use ddmon::error::BackendError;
use serde_json::{Value, json};

pub const NOW: i64 = 1_700_000_000;

/// Backend call as observed by [`FixtureBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SearchMonitors(MonitorSearch),
    GetMonitor(String),
    StateHistory { id: String, from: i64, to: i64 },
    QueryMetrics { query: String, from: i64, to: i64 },
    SearchLogs(LogSearch),
}

/// In-memory backend returning fixed fixtures and recording every call.
#[derive(Default)]
pub struct FixtureBackend {
    pub monitors: Vec<Monitor>,
    /// Raw record served by `get_monitor`.
    pub monitor: Option<Value>,
    pub history: Value,
    pub metrics: Value,
    pub logs: Vec<Value>,
    /// Operation names that fail: "search", "monitor", "history", "metrics", "logs".
    pub failing: HashSet<&'static str>,
    pub(crate) calls: Mutex<Vec<Call>>,
}

impl FixtureBackend {
    pub fn with_monitor(monitor: Value) -> Self {
        Self {
            monitor: Some(monitor),
            history: json!({"history": []}),
            metrics: json!({"series": []}),
            ..Default::default()
        }
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, call: Call) -> BackendResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(op) {
            Err(BackendError::Http {
                path: format!("/{op}"),
                status: 500,
                body: "internal error".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl MonitoringBackend for FixtureBackend {
    async fn search_monitors(&self, search: &MonitorSearch) -> BackendResult<MonitorSearchResponse> {
        self.record("search", Call::SearchMonitors(search.clone()))?;
        Ok(MonitorSearchResponse {
            monitors: self.monitors.clone(),
        })
    }

    async fn get_monitor(&self, id: &str) -> BackendResult<Value> {
        self.record("monitor", Call::GetMonitor(id.to_string()))?;
        self.monitor
            .clone()
            .ok_or_else(|| BackendError::Http {
                path: format!("/monitor/{id}"),
                status: 404,
                body: "not found".into(),
            })
    }

    async fn get_monitor_state_history(
        &self,
        id: &str,
        from: i64,
        to: i64,
    ) -> BackendResult<Value> {
        self.record(
            "history",
            Call::StateHistory {
                id: id.to_string(),
                from,
                to,
            },
        )?;
        Ok(self.history.clone())
    }

    async fn query_metrics(&self, query: &str, from: i64, to: i64) -> BackendResult<Value> {
        self.record(
            "metrics",
            Call::QueryMetrics {
                query: query.to_string(),
                from,
                to,
            },
        )?;
        Ok(self.metrics.clone())
    }

    async fn search_logs(&self, search: &LogSearch) -> BackendResult<LogSearchResponse> {
        self.record("logs", Call::SearchLogs(search.clone()))?;
        Ok(LogSearchResponse {
            data: self.logs.clone(),
        })
    }
}

/// Typed monitor as carried in a search page.
pub fn monitor(value: Value) -> Monitor {
    Monitor::from_record(&value).expect("valid monitor fixture")
}

pub fn cpu_monitor() -> Value {
    json!({
        "id": 1,
        "name": "High CPU Alert",
        "overall_state": "Alert",
        "message": "CPU usage is too high",
        "query": "avg(last_5m):avg:system.cpu.user{host:server1} > 90",
        "tags": ["env:prod"],
    })
}

pub fn two_transitions() -> Value {
    json!({
        "history": [
            { "timestamp": 1234567890, "state": "Alert" },
            { "timestamp": 1234567880, "state": "OK" },
        ]
    })
}

pub fn context(backend: Arc<FixtureBackend>) -> AppContext {
    AppContext::new(AppConfig::default(), backend)
}

/// Parse the JSON payload carried by a successful tool response.
pub fn payload(response: &ddmon::ToolResponse) -> Value {
    let text = response.first_text().expect("one content block");
    assert!(!text.starts_with("Error: "), "unexpected error: {text}");
    serde_json::from_str(text).expect("pretty-printed JSON payload")
}
