use ddmon::backend::datadog::{DatadogClient, DatadogSettings};
use ddmon::backend::{LogSearch, MonitorSearch, MonitoringBackend};
use ddmon::{BackendError, MonitorState, Priority};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

fn client_for(server: &ServerGuard) -> DatadogClient {
    let mut settings = DatadogSettings::new("api-key", "app-key");
    settings.api_url = Some(server.url());
    DatadogClient::new(&settings).expect("client builds")
}

#[tokio::test]
async fn monitor_search_sends_keys_and_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/monitor/search")
        .match_header("dd-api-key", "api-key")
        .match_header("dd-application-key", "app-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), r#"status:("Alert" OR "Warn" OR "No Data")"#.into()),
            Matcher::UrlEncoded("page_size".into(), "5".into()),
            Matcher::UrlEncoded("sort".into(), "-status,name".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "monitors": [
                    {"id": 1, "name": "cpu", "overall_state": "Alert", "priority": 1, "tags": ["env:prod"]},
                ],
                "metadata": {"page": 0},
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let response = client
        .search_monitors(&MonitorSearch {
            query: r#"status:("Alert" OR "Warn" OR "No Data")"#.into(),
            page_size: Some(5),
            sort: Some("-status,name".into()),
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.monitors.len(), 1);
    assert_eq!(response.monitors[0].overall_state, Some(MonitorState::Alert));
    assert_eq!(response.monitors[0].priority, Some(Priority::P1));
}

#[tokio::test]
async fn state_history_uses_epoch_window() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/monitor/42/state/history")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("from_ts".into(), "1699913600".into()),
            Matcher::UrlEncoded("to_ts".into(), "1700000000".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"history":[{"timestamp":1699999000,"state":"Warn"}]}"#)
        .create_async()
        .await;

    let history = client_for(&server)
        .get_monitor_state_history("42", 1_699_913_600, 1_700_000_000)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(history["history"][0]["state"], "Warn");
}

#[tokio::test]
async fn monitor_record_is_returned_as_sent() {
    let raw = json!({
        "id": 7,
        "name": "queue depth",
        "overall_state": "Paused",
        "priority": 4,
        "message": null,
        "options": {"thresholds": {"critical": 100}},
    });
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/monitor/7")
        .with_status(200)
        .with_body(raw.to_string())
        .create_async()
        .await;

    let record = client_for(&server).get_monitor("7").await.unwrap();

    mock.assert_async().await;
    assert_eq!(record, raw);
}

#[tokio::test]
async fn metrics_query_passes_scope_and_window() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "{host:server1}".into()),
            Matcher::UrlEncoded("from".into(), "1699996400".into()),
            Matcher::UrlEncoded("to".into(), "1700000000".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"status":"ok","series":[]}"#)
        .create_async()
        .await;

    let payload = client_for(&server)
        .query_metrics("{host:server1}", 1_699_996_400, 1_700_000_000)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(payload, json!({"status": "ok", "series": []}));
}

#[tokio::test]
async fn log_search_posts_filter_to_v2() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/logs/events/search")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "filter": {
                "query": "@env:prod",
                "from": "2023-11-14T21:13:20.000Z",
                "to": "2023-11-14T22:13:20.000Z",
            },
            "page": {"limit": 50},
        })))
        .with_status(200)
        .with_body(r#"{"data":[{"id":"AAA"},{"id":"BBB"}],"meta":{}}"#)
        .create_async()
        .await;

    let response = client_for(&server)
        .search_logs(&LogSearch {
            query: "@env:prod".into(),
            from: "2023-11-14T21:13:20.000Z".into(),
            to: "2023-11-14T22:13:20.000Z".into(),
            limit: 50,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.data.len(), 2);
}

#[tokio::test]
async fn non_success_status_is_an_http_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/monitor/7")
        .with_status(403)
        .with_body(r#"{"errors":["Forbidden"]}"#)
        .create_async()
        .await;

    let err = client_for(&server).get_monitor("7").await.unwrap_err();

    mock.assert_async().await;
    match err {
        BackendError::Http { path, status, body } => {
            assert_eq!(path, "/monitor/7");
            assert_eq!(status, 403);
            assert!(body.contains("Forbidden"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_reported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/monitor/7")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let err = client_for(&server).get_monitor("7").await.unwrap_err();
    assert!(matches!(err, BackendError::Json(_)));
}
