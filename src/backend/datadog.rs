use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    BackendResult, LogSearch, LogSearchResponse, MonitorSearch, MonitorSearchResponse,
    MonitoringBackend,
};
use crate::error::BackendError;
use crate::timeexpr::EpochSeconds;

const DEFAULT_SITE: &str = "datadoghq.com";
// Header names are case-insensitive; the static form must be lowercase.
const API_KEY_HEADER: &str = "dd-api-key";
const APP_KEY_HEADER: &str = "dd-application-key";

/// Connection settings for [`DatadogClient`].
#[derive(Debug, Clone)]
pub struct DatadogSettings {
    pub api_key: String,
    pub app_key: String,
    pub site: String,
    /// Overrides the `https://api.{site}` origin.
    pub api_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl DatadogSettings {
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_key: app_key.into(),
            site: DEFAULT_SITE.to_string(),
            api_url: None,
            timeout: None,
        }
    }

    fn origin(&self) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site),
        }
    }
}

/// Monitoring backend speaking the Datadog REST API.
///
/// Headers and base URLs are fixed at construction; the client is cheap to
/// share between concurrent tool calls.
#[derive(Debug, Clone)]
pub struct DatadogClient {
    client: Client,
    v1: String,
    v2: String,
}

impl DatadogClient {
    pub fn new(settings: &DatadogSettings) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, header_value(API_KEY_HEADER, &settings.api_key)?);
        headers.insert(APP_KEY_HEADER, header_value(APP_KEY_HEADER, &settings.app_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let origin = settings.origin();
        Ok(Self {
            client,
            v1: format!("{origin}/api/v1"),
            v2: format!("{origin}/api/v2"),
        })
    }

    pub fn v1_base(&self) -> &str {
        &self.v1
    }

    pub fn v2_base(&self) -> &str {
        &self.v2
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(path, status = status.as_u16(), "backend request failed");
            return Err(BackendError::Http {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(path, status = status.as_u16(), bytes = body.len(), "backend request ok");
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_v1<T: DeserializeOwned, Q: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> BackendResult<T> {
        let request = self.client.get(format!("{}{path}", self.v1)).query(query);
        self.send(path, request).await
    }
}

#[async_trait::async_trait]
impl MonitoringBackend for DatadogClient {
    async fn search_monitors(&self, search: &MonitorSearch) -> BackendResult<MonitorSearchResponse> {
        self.get_v1("/monitor/search", search).await
    }

    async fn get_monitor(&self, id: &str) -> BackendResult<Value> {
        let path = format!("/monitor/{id}");
        let request = self.client.get(format!("{}{path}", self.v1));
        self.send(&path, request).await
    }

    async fn get_monitor_state_history(
        &self,
        id: &str,
        from: EpochSeconds,
        to: EpochSeconds,
    ) -> BackendResult<Value> {
        let path = format!("/monitor/{id}/state/history");
        self.get_v1(&path, &[("from_ts", from), ("to_ts", to)]).await
    }

    async fn query_metrics(
        &self,
        query: &str,
        from: EpochSeconds,
        to: EpochSeconds,
    ) -> BackendResult<Value> {
        let from = from.to_string();
        let to = to.to_string();
        self.get_v1(
            "/query",
            &[("query", query), ("from", from.as_str()), ("to", to.as_str())],
        )
        .await
    }

    async fn search_logs(&self, search: &LogSearch) -> BackendResult<LogSearchResponse> {
        let path = "/logs/events/search";
        let body = json!({
            "filter": {
                "query": search.query,
                "from": search.from,
                "to": search.to,
            },
            "page": {
                "limit": search.limit,
            },
        });
        let request = self.client.post(format!("{}{path}", self.v2)).json(&body);
        self.send(path, request).await
    }
}

fn header_value(name: &str, value: &str) -> BackendResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        BackendError::Config(format!("{name} contains characters not allowed in a header"))
    })
}
