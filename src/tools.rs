use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::analysis::{self, AlertDetail, AnalysisRequest, AnalysisResult, LogsPage};
use crate::app::AppContext;
use crate::backend::{LogSearch, Monitor, MonitorSearch, MonitorState, Priority};
use crate::error::{Result, ToolError};
use crate::timeexpr::{self, EpochSeconds, HOUR};

/// Monitor search selecting everything that is not healthy.
pub const ACTIVE_ALERTS_QUERY: &str = r#"status:("Alert" OR "Warn" OR "No Data")"#;
pub const ACTIVE_ALERTS_SORT: &str = "-status,name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
}

/// Uniform tool response: one text block carrying pretty-printed JSON, or an
/// `Error: ...` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: ContentKind::Text,
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn json<T: Serialize>(payload: &T) -> Result<Self> {
        let text = serde_json::to_string_pretty(payload).map_err(ToolError::Encode)?;
        Ok(Self::text(text))
    }

    pub fn error(err: &ToolError) -> Self {
        Self {
            is_error: true,
            ..Self::text(format!("Error: {err}"))
        }
    }

    /// Text of the first content block.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|block| block.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    GetAlerts,
    GetAlertDetails,
    GetMetrics,
    GetLogs,
    GetMonitors,
    GetMonitorDetails,
    AnalyzeAlert,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::GetAlerts,
        Tool::GetAlertDetails,
        Tool::GetMetrics,
        Tool::GetLogs,
        Tool::GetMonitors,
        Tool::GetMonitorDetails,
        Tool::AnalyzeAlert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::GetAlerts => "get_alerts",
            Tool::GetAlertDetails => "get_alert_details",
            Tool::GetMetrics => "get_metrics",
            Tool::GetLogs => "get_logs",
            Tool::GetMonitors => "get_monitors",
            Tool::GetMonitorDetails => "get_monitor_details",
            Tool::AnalyzeAlert => "analyze_alert",
        }
    }

    /// Verb phrase used in `Failed to ...` error prefixes.
    pub fn operation(self) -> &'static str {
        match self {
            Tool::GetAlerts => "get alerts",
            Tool::GetAlertDetails => "get alert details",
            Tool::GetMetrics => "get metrics",
            Tool::GetLogs => "get logs",
            Tool::GetMonitors => "get monitors",
            Tool::GetMonitorDetails => "get monitor details",
            Tool::AnalyzeAlert => "analyze alert",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::GetAlerts => "Get active alerts from Datadog",
            Tool::GetAlertDetails => "Get detailed information about a specific alert",
            Tool::GetMetrics => "Query Datadog metrics",
            Tool::GetLogs => "Query Datadog logs",
            Tool::GetMonitors => "List Datadog monitors",
            Tool::GetMonitorDetails => "Get details of a specific monitor",
            Tool::AnalyzeAlert => "Analyze an alert and provide potential root causes and solutions",
        }
    }

    pub fn input_schema(self) -> Value {
        let time = |what: &str| {
            json!({
                "type": "string",
                "description": format!("{what} time (ISO 8601 or relative time)"),
            })
        };
        let string_list = |description: &str| {
            json!({
                "type": "array",
                "items": { "type": "string" },
                "description": description,
            })
        };

        match self {
            Tool::GetAlerts => json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "number",
                        "description": "Number of alerts to retrieve",
                        "default": 10,
                    },
                    "priority": {
                        "type": "string",
                        "description": "Filter by priority (P1, P2, P3, P4, P5)",
                        "enum": Priority::ALL.map(Priority::as_str),
                    },
                    "tags": string_list("Filter by tags"),
                },
            }),
            Tool::GetAlertDetails => json!({
                "type": "object",
                "properties": {
                    "alertId": { "type": "string", "description": "The ID of the alert" },
                },
                "required": ["alertId"],
            }),
            Tool::GetMetrics => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Datadog metric query" },
                    "from": time("Start"),
                    "to": time("End"),
                },
                "required": ["query"],
            }),
            Tool::GetLogs => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Log search query" },
                    "from": time("Start"),
                    "to": time("End"),
                    "limit": {
                        "type": "number",
                        "description": "Number of logs to retrieve",
                        "default": 100,
                    },
                },
                "required": ["query"],
            }),
            Tool::GetMonitors => json!({
                "type": "object",
                "properties": {
                    "tags": string_list("Filter by tags"),
                    "monitorTags": string_list("Filter by monitor tags"),
                    "name": { "type": "string", "description": "Filter by monitor name" },
                },
            }),
            Tool::GetMonitorDetails => json!({
                "type": "object",
                "properties": {
                    "monitorId": { "type": "string", "description": "The ID of the monitor" },
                },
                "required": ["monitorId"],
            }),
            Tool::AnalyzeAlert => json!({
                "type": "object",
                "properties": {
                    "alertId": { "type": "string", "description": "The ID of the alert to analyze" },
                    "includeMetrics": {
                        "type": "boolean",
                        "description": "Include related metrics in analysis",
                        "default": true,
                    },
                    "includeLogs": {
                        "type": "boolean",
                        "description": "Include related logs in analysis",
                        "default": true,
                    },
                },
                "required": ["alertId"],
            }),
        }
    }
}

impl FromStr for Tool {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| ToolError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entry of the `tools/list` catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn catalog() -> Vec<ToolDefinition> {
    Tool::ALL
        .into_iter()
        .map(|tool| ToolDefinition {
            name: tool.name(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        })
        .collect()
}

/// Ids may arrive as JSON strings or numbers.
fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAlertsArgs {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDetailsArgs {
    #[serde(deserialize_with = "deserialize_id")]
    pub alert_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetMetricsArgs {
    pub query: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetLogsArgs {
    pub query: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMonitorsArgs {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub monitor_tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorDetailsArgs {
    #[serde(deserialize_with = "deserialize_id")]
    pub monitor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeAlertArgs {
    #[serde(deserialize_with = "deserialize_id")]
    pub alert_id: String,
    #[serde(default = "default_true")]
    pub include_metrics: bool,
    #[serde(default = "default_true")]
    pub include_logs: bool,
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    Ok(serde_json::from_value(arguments)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MonitorState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl From<Monitor> for AlertRecord {
    fn from(monitor: Monitor) -> Self {
        Self {
            id: monitor.id,
            name: monitor.name,
            status: monitor.overall_state,
            priority: monitor.priority,
            tags: monitor.tags,
            message: monitor.message,
            created: monitor.created,
            modified: monitor.modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsPage {
    pub count: usize,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MonitorState>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl From<Monitor> for MonitorRecord {
    fn from(monitor: Monitor) -> Self {
        Self {
            id: monitor.id,
            name: monitor.name,
            kind: monitor.kind,
            status: monitor.overall_state,
            tags: monitor.tags,
            created: monitor.created,
            modified: monitor.modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorsPage {
    pub count: usize,
    pub monitors: Vec<MonitorRecord>,
}

/// Active alerts, filtered client-side by exact priority and "all tags present".
pub async fn get_alerts(ctx: &AppContext, args: GetAlertsArgs) -> Result<AlertsPage> {
    let search = MonitorSearch {
        query: ACTIVE_ALERTS_QUERY.to_string(),
        page_size: Some(args.limit.unwrap_or(ctx.config.limits.alerts)),
        sort: Some(ACTIVE_ALERTS_SORT.to_string()),
    };
    let response = ctx.backend.search_monitors(&search).await?;

    let alerts: Vec<AlertRecord> = response
        .monitors
        .into_iter()
        .filter(|monitor| args.priority.is_none_or(|wanted| monitor.priority == Some(wanted)))
        .filter(|monitor| monitor.has_all_tags(&args.tags))
        .map(AlertRecord::from)
        .collect();

    Ok(AlertsPage {
        count: alerts.len(),
        alerts,
    })
}

pub async fn get_alert_details(
    ctx: &AppContext,
    args: AlertDetailsArgs,
    now: EpochSeconds,
) -> Result<AlertDetail> {
    analysis::aggregate(ctx.backend.as_ref(), &args.alert_id, now).await
}

/// Raw metrics payload; the window defaults to the last hour.
pub async fn get_metrics(ctx: &AppContext, args: GetMetricsArgs, now: EpochSeconds) -> Result<Value> {
    let from = timeexpr::resolve_or(args.from.as_deref(), now - HOUR, now)?;
    let to = timeexpr::resolve_or(args.to.as_deref(), now, now)?;
    Ok(ctx.backend.query_metrics(&args.query, from, to).await?)
}

pub async fn get_logs(ctx: &AppContext, args: GetLogsArgs, now: EpochSeconds) -> Result<LogsPage> {
    let from = timeexpr::resolve_or(args.from.as_deref(), now - HOUR, now)?;
    let to = timeexpr::resolve_or(args.to.as_deref(), now, now)?;
    let search = LogSearch {
        query: args.query,
        from: timeexpr::to_iso8601(from)?,
        to: timeexpr::to_iso8601(to)?,
        limit: args.limit.unwrap_or(ctx.config.limits.logs),
    };
    let response = ctx.backend.search_logs(&search).await?;
    Ok(LogsPage::from(response))
}

/// Conjunctive monitor search text: `name:"..." tag:"..." monitor_tag:"..."`.
pub fn monitor_search_query(args: &GetMonitorsArgs) -> String {
    let mut parts = Vec::new();
    if let Some(name) = args.name.as_deref().filter(|name| !name.is_empty()) {
        parts.push(format!("name:\"{name}\""));
    }
    parts.extend(args.tags.iter().map(|tag| format!("tag:\"{tag}\"")));
    parts.extend(args.monitor_tags.iter().map(|tag| format!("monitor_tag:\"{tag}\"")));
    parts.join(" ")
}

pub async fn get_monitors(ctx: &AppContext, args: GetMonitorsArgs) -> Result<MonitorsPage> {
    let search = MonitorSearch {
        query: monitor_search_query(&args),
        ..Default::default()
    };
    let response = ctx.backend.search_monitors(&search).await?;
    let monitors: Vec<MonitorRecord> = response
        .monitors
        .into_iter()
        .map(MonitorRecord::from)
        .collect();
    Ok(MonitorsPage {
        count: monitors.len(),
        monitors,
    })
}

/// The monitor record exactly as the backend returned it.
pub async fn get_monitor_details(ctx: &AppContext, args: MonitorDetailsArgs) -> Result<Value> {
    Ok(ctx.backend.get_monitor(&args.monitor_id).await?)
}

pub async fn analyze_alert(
    ctx: &AppContext,
    args: AnalyzeAlertArgs,
    now: EpochSeconds,
) -> Result<AnalysisResult> {
    let request = AnalysisRequest {
        alert_id: args.alert_id,
        include_metrics: args.include_metrics,
        include_logs: args.include_logs,
        log_limit: ctx.config.limits.analysis_logs,
    };
    analysis::analyze(ctx.backend.as_ref(), &request, now).await
}

async fn run(ctx: &AppContext, tool: Tool, arguments: Value, now: EpochSeconds) -> Result<ToolResponse> {
    match tool {
        Tool::GetAlerts => ToolResponse::json(&get_alerts(ctx, parse_args(arguments)?).await?),
        Tool::GetAlertDetails => {
            ToolResponse::json(&get_alert_details(ctx, parse_args(arguments)?, now).await?)
        }
        Tool::GetMetrics => ToolResponse::json(&get_metrics(ctx, parse_args(arguments)?, now).await?),
        Tool::GetLogs => ToolResponse::json(&get_logs(ctx, parse_args(arguments)?, now).await?),
        Tool::GetMonitors => ToolResponse::json(&get_monitors(ctx, parse_args(arguments)?).await?),
        Tool::GetMonitorDetails => {
            ToolResponse::json(&get_monitor_details(ctx, parse_args(arguments)?).await?)
        }
        Tool::AnalyzeAlert => {
            ToolResponse::json(&analyze_alert(ctx, parse_args(arguments)?, now).await?)
        }
    }
}

/// Dispatch one tool call. `now` anchors every relative time in the call.
///
/// Never fails: errors become a single `Error: ...` text block.
#[instrument(skip(ctx, arguments, now))]
pub async fn call_tool(ctx: &AppContext, name: &str, arguments: Value, now: EpochSeconds) -> ToolResponse {
    let outcome = match name.parse::<Tool>() {
        Ok(tool) => run(ctx, tool, arguments, now)
            .await
            .map_err(|err| err.during(tool.operation())),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(response) => {
            info!("tool call succeeded");
            response
        }
        Err(err) => {
            warn!(error = %err, "tool call failed");
            ToolResponse::error(&err)
        }
    }
}
