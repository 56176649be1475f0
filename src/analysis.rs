use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::backend::{LogSearch, LogSearchResponse, Monitor, MonitorState, MonitoringBackend};
use crate::diagnosis;
use crate::error::{Result, ToolError};
use crate::timeexpr::{self, DAY, EpochSeconds};

/// Trailing window of state transitions attached to an alert.
pub const HISTORY_WINDOW: EpochSeconds = DAY;
/// Lookback used for the metrics and logs attached to an analysis.
pub const ENRICHMENT_WINDOW: &str = "-1h";
pub const DEFAULT_ANALYSIS_LOG_LIMIT: u32 = 50;

static SCOPE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").expect("scope segment pattern"));

/// A monitor together with its recent state transitions, both exactly as the
/// backend returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDetail {
    pub monitor: Value,
    pub state_history: Value,
}

/// Fetch a monitor and its last 24h of state history. Both fetches must
/// succeed; there is no partial result.
pub async fn aggregate(
    backend: &dyn MonitoringBackend,
    alert_id: &str,
    now: EpochSeconds,
) -> Result<AlertDetail> {
    let monitor = backend.get_monitor(alert_id).await?;
    let state_history = backend
        .get_monitor_state_history(alert_id, now - HISTORY_WINDOW, now)
        .await?;
    debug!(alert_id, "fetched alert detail");
    Ok(AlertDetail {
        monitor,
        state_history,
    })
}

/// Page of log events as returned to tool callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsPage {
    pub count: usize,
    pub logs: Vec<Value>,
}

impl From<LogSearchResponse> for LogsPage {
    fn from(response: LogSearchResponse) -> Self {
        Self {
            count: response.data.len(),
            logs: response.data,
        }
    }
}

/// Fields of the monitor repeated at the top of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MonitorState>,
    pub message: String,
    pub query: String,
}

impl From<&Monitor> for AlertSummary {
    fn from(monitor: &Monitor) -> Self {
        Self {
            id: monitor.id,
            name: monitor.name.clone(),
            status: monitor.overall_state.clone(),
            message: monitor.message.clone(),
            query: monitor.query.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub alert: AlertSummary,
    pub state_history: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_metrics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_logs: Option<LogsPage>,
    pub potential_causes: Vec<String>,
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub alert_id: String,
    pub include_metrics: bool,
    pub include_logs: bool,
    pub log_limit: u32,
}

impl AnalysisRequest {
    pub fn new(alert_id: impl Into<String>) -> Self {
        Self {
            alert_id: alert_id.into(),
            include_metrics: true,
            include_logs: true,
            log_limit: DEFAULT_ANALYSIS_LOG_LIMIT,
        }
    }
}

/// First `{...}` scope segment of a monitor query, braces included.
pub fn extract_metric_scope(query: &str) -> Option<&str> {
    SCOPE_SEGMENT.find(query).map(|m| m.as_str())
}

/// Turn `key:value` tags into an `@key:value OR ...` log filter.
///
/// Tags without a `:` have no facet form and are skipped. Returns `None` when
/// no tag yields a term.
pub fn log_query_from_tags(tags: &[String]) -> Option<String> {
    let terms: Vec<String> = tags
        .iter()
        .filter_map(|tag| tag.split_once(':'))
        .map(|(key, value)| format!("@{key}:{value}"))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Build the composite analysis for one alert.
///
/// Enrichment failures abort the whole analysis.
#[instrument(skip_all, fields(alert_id = %request.alert_id))]
pub async fn analyze(
    backend: &dyn MonitoringBackend,
    request: &AnalysisRequest,
    now: EpochSeconds,
) -> Result<AnalysisResult> {
    let detail = aggregate(backend, &request.alert_id, now)
        .await
        .map_err(|err| err.during("get alert details"))?;
    let monitor = Monitor::from_record(&detail.monitor)
        .map_err(|err| ToolError::from(err).during("get alert details"))?;

    let mut related_metrics = None;
    if request.include_metrics {
        match extract_metric_scope(&monitor.query) {
            Some(scope) => {
                let from = timeexpr::resolve(ENRICHMENT_WINDOW, now)?;
                let payload = backend
                    .query_metrics(scope, from, now)
                    .await
                    .map_err(|err| ToolError::from(err).during("get metrics"))?;
                related_metrics = Some(payload);
            }
            None => debug!("monitor query has no scope segment; skipping metrics"),
        }
    }

    let mut related_logs = None;
    if request.include_logs {
        match log_query_from_tags(&monitor.tags) {
            Some(query) => {
                let from = timeexpr::resolve(ENRICHMENT_WINDOW, now)?;
                let search = LogSearch {
                    query,
                    from: timeexpr::to_iso8601(from)?,
                    to: timeexpr::to_iso8601(now)?,
                    limit: request.log_limit,
                };
                let response = backend
                    .search_logs(&search)
                    .await
                    .map_err(|err| ToolError::from(err).during("get logs"))?;
                related_logs = Some(LogsPage::from(response));
            }
            None => debug!("monitor has no tags; skipping logs"),
        }
    }

    let diagnosis = diagnosis::diagnose_query(&monitor.query);
    info!(
        causes = diagnosis.causes.len(),
        metrics = related_metrics.is_some(),
        logs = related_logs.is_some(),
        "alert analysis complete"
    );

    Ok(AnalysisResult {
        alert: AlertSummary::from(&monitor),
        state_history: detail.state_history,
        related_metrics,
        related_logs,
        potential_causes: diagnosis.causes,
        suggested_actions: diagnosis.actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_is_first_brace_segment_verbatim() {
        assert_eq!(
            extract_metric_scope("avg(last_5m):avg:system.cpu.user{host:server1} > 90"),
            Some("{host:server1}")
        );
        assert_eq!(
            extract_metric_scope("avg:a{env:prod,role:db} / avg:b{env:dev}"),
            Some("{env:prod,role:db}")
        );
        assert_eq!(extract_metric_scope("avg:a{} > 1"), None);
        assert_eq!(extract_metric_scope("logs(\"status:error\").rollup(\"count\") > 5"), None);
    }

    #[test]
    fn tags_become_facet_terms() {
        let tags = vec!["env:prod".to_string(), "service:api".to_string()];
        assert_eq!(
            log_query_from_tags(&tags).as_deref(),
            Some("@env:prod OR @service:api")
        );
    }

    #[test]
    fn tag_values_keep_embedded_colons() {
        let tags = vec!["url:http://x".to_string()];
        assert_eq!(log_query_from_tags(&tags).as_deref(), Some("@url:http://x"));
    }

    #[test]
    fn no_usable_tags_means_no_log_query() {
        assert_eq!(log_query_from_tags(&[]), None);
        assert_eq!(log_query_from_tags(&["standalone".to_string()]), None);
    }
}
