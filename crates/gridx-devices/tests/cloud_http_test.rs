//! Cloud directory, device routes and mail relay against a local mock HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use gridx_devices::{
    device_routes, CloudDeviceDirectory, DeviceDirectory, DevicesError, HttpMailNotifier,
    Notifier, NotifierConfig, NotifyOutcome, SwitchState,
};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn list_things(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).as_deref() != Some("Bearer token-123") {
        return (
            StatusCode::OK,
            Json(json!({"error": 401, "msg": "token invalid"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "error": 0,
            "msg": "",
            "data": {
                "thingList": [{
                    "itemType": 1,
                    "itemData": {
                        "deviceid": "1000a1",
                        "name": "Porch light",
                        "online": true,
                        "params": {"switch": "off", "power": "7.5"}
                    }
                }],
                "total": 1
            }
        })),
    )
}

async fn set_status(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    recorded.requests.lock().push((bearer(&headers), body));
    Json(json!({"error": 0, "msg": "", "data": {}}))
}

async fn send_mail(State(recorded): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
    recorded.requests.lock().push((None, body));
    StatusCode::ACCEPTED
}

async fn start_mock() -> (SocketAddr, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/v2/device/thing", get(list_things))
        .route("/v2/device/thing/status", post(set_status))
        .route("/mail/send", post(send_mail))
        .route("/mail/broken", post(|| async { StatusCode::BAD_GATEWAY }))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, recorded)
}

#[tokio::test]
async fn test_list_devices_parses_cloud_response() {
    let (addr, _) = start_mock().await;
    let directory = CloudDeviceDirectory::new(format!("http://{addr}"), "token-123").unwrap();

    let devices = directory.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Porch light");
    assert_eq!(devices[0].switch, Some(SwitchState::Off));
    assert_eq!(devices[0].power, Some(7.5));
}

#[tokio::test]
async fn test_api_error_code_is_surfaced() {
    let (addr, _) = start_mock().await;
    let directory = CloudDeviceDirectory::new(format!("http://{addr}"), "wrong").unwrap();

    let err = directory.list_devices().await.unwrap_err();
    match err {
        DevicesError::Api(msg) => assert!(msg.contains("401")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_set_switch_posts_status() {
    let (addr, recorded) = start_mock().await;
    let directory = CloudDeviceDirectory::new(format!("http://{addr}/"), "token-123").unwrap();

    directory.set_switch("1000a1", SwitchState::On).await.unwrap();

    let requests = recorded.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_deref(), Some("Bearer token-123"));
    assert_eq!(
        requests[0].1,
        json!({"type": 1, "id": "1000a1", "params": {"switch": "on"}})
    );
}

#[tokio::test]
async fn test_mail_notifier_posts_to_relay() {
    let (addr, recorded) = start_mock().await;
    let notifier = HttpMailNotifier::new(NotifierConfig {
        relay_url: format!("http://{addr}/mail/send"),
        sender: "alerts@example.com".to_string(),
        ..Default::default()
    })
    .unwrap();

    let outcome = notifier
        .send("ops@example.com", "Device alert", "<p>hot</p>")
        .await;
    assert_eq!(outcome, NotifyOutcome::Sent);

    let requests = recorded.requests.lock().clone();
    assert_eq!(
        requests[0].1,
        json!({
            "from": "Gridx Alerts <alerts@example.com>",
            "to": "ops@example.com",
            "subject": "Device alert",
            "html": "<p>hot</p>"
        })
    );
}

#[tokio::test]
async fn test_mail_relay_failure_is_reported_not_raised() {
    let (addr, _) = start_mock().await;
    let notifier = HttpMailNotifier::new(NotifierConfig {
        relay_url: format!("http://{addr}/mail/broken"),
        sender: "alerts@example.com".to_string(),
        ..Default::default()
    })
    .unwrap();

    let outcome = notifier.send("ops@example.com", "s", "b").await;
    assert!(matches!(outcome, NotifyOutcome::Failed(_)));
}

#[tokio::test]
async fn test_device_routes_list_through_cloud() {
    let (addr, _) = start_mock().await;
    let directory = CloudDeviceDirectory::new(format!("http://{addr}"), "token-123").unwrap();
    let app = device_routes(Arc::new(directory));

    let response = app
        .oneshot(Request::builder().uri("/api/devices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let devices: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(devices[0]["id"], "1000a1");
    assert_eq!(devices[0]["switch"], "off");
}

#[tokio::test]
async fn test_device_routes_switch_through_cloud() {
    let (addr, recorded) = start_mock().await;
    let directory = CloudDeviceDirectory::new(format!("http://{addr}"), "token-123").unwrap();
    let app = device_routes(Arc::new(directory));

    let request = Request::builder()
        .method("POST")
        .uri("/api/devices/1000a1/status")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"params": {"switch": "on"}}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = recorded.requests.lock().clone();
    assert_eq!(
        requests[0].1,
        json!({"type": 1, "id": "1000a1", "params": {"switch": "on"}})
    );
}

#[tokio::test]
async fn test_device_routes_cloud_error_is_500() {
    let (addr, _) = start_mock().await;
    let directory = CloudDeviceDirectory::new(format!("http://{addr}"), "wrong").unwrap();
    let app = device_routes(Arc::new(directory));

    let response = app
        .oneshot(Request::builder().uri("/api/devices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
