use alert_registry::{AlertDto, AlertSeverity};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use keep_server::{router, AppState, Instances};
use provider_core::ProviderConfig;
use serde_json::{json, Value};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tower::ServiceExt;

fn app(configs: Value) -> (Router, Receiver<AlertDto>) {
    let configs: Vec<ProviderConfig> = serde_json::from_value(configs).expect("configs");
    let instances = Instances::load("tenant-a", &configs).expect("instances");
    let (tx, rx) = mpsc::channel::<AlertDto>();
    (router(AppState::new("tenant-a", Arc::new(instances), tx)), rx)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, value)
}

#[tokio::test]
async fn healthz_answers_ok() {
    let (app, _rx) = app(json!([]));
    let (status, body) = send(app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));
}

#[tokio::test]
async fn kapacitor_webhook_reaches_the_collector() {
    let (app, rx) = app(json!([]));
    let (status, body) = send(
        app,
        Method::POST,
        "/alerts/event/kapacitor",
        Some(json!({
            "id": "a1",
            "message": "disk full",
            "level": "CRITICAL",
            "time": "2024-01-15T10:30:00Z"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"accepted": 1}));
    let alert = rx.try_recv().expect("collected alert");
    assert_eq!(alert.name, "disk full");
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(alert.last_received, "2024-01-15T10:30:00+00:00");
}

#[tokio::test]
async fn unknown_type_is_not_found_and_bad_payload_is_rejected() {
    let (app, rx) = app(json!([]));
    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/alerts/event/pagerduty",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "unknown provider type `pagerduty`"}));

    let (status, _) = send(
        app,
        Method::POST,
        "/alerts/event/keep",
        Some(json!("just a string")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn configured_instance_stamps_its_context() {
    let (app, rx) = app(json!([{"id": "keep-1", "type": "keep", "name": "inbound"}]));
    let (status, body) = send(
        app,
        Method::POST,
        "/alerts/event/keep?provider_id=keep-1",
        Some(json!([{"name": "a"}, {"name": "b"}])),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"accepted": 2}));
    let alerts: Vec<AlertDto> = rx.try_iter().collect();
    assert_eq!(alerts.len(), 2);
    assert!(alerts
        .iter()
        .all(|a| a.provider_id.as_deref() == Some("keep-1")));
    assert_eq!(
        alerts[0].labels.get("provider_name").map(String::as_str),
        Some("inbound")
    );
}

#[tokio::test]
async fn catalog_lists_every_provider_type() {
    let (app, _rx) = app(json!([]));
    let (status, body) = send(app, Method::GET, "/providers", None).await;
    assert_eq!(status, StatusCode::OK);

    let types: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|kind| kind["type"].as_str())
        .collect();
    for expected in ["kapacitor", "prometheus", "servicenow", "slack", "keep"] {
        assert!(types.contains(&expected), "missing {expected}");
    }
}

#[tokio::test]
async fn instance_calls_map_errors_to_statuses() {
    let (app, _rx) = app(json!([{"id": "keep-1", "type": "keep"}]));

    let (status, body) = send(app.clone(), Method::GET, "/providers/keep-1/scopes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, _) = send(app.clone(), Method::GET, "/providers/keep-1/alerts", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/providers/keep-1/notify",
        Some(json!({"message": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, json!({"error": "keep does not support notify"}));

    let (status, _) = send(
        app.clone(),
        Method::POST,
        "/providers/keep-1/query",
        Some(json!([1, 2])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app, Method::GET, "/providers/nope/scopes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
