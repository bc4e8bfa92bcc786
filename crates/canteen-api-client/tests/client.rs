//! End-to-end client behavior against scripted transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_test::assert_ok;

use canteen_api_client::transport::{
    Transport, TransportFailure, WireRequest, WireResponse,
};
use canteen_api_client::{
    ApiClient, ApiError, ClientConfig, Method, RequestDescriptor, SessionStore, TransportKind,
};

/// Replays a fixed script of attempt outcomes; the last entry repeats.
/// Records call count and the headers of every outgoing request.
struct ScriptedTransport {
    script: Vec<Result<WireResponse, TransportFailure>>,
    calls: AtomicUsize,
    seen_headers: Mutex<Vec<Vec<(String, String)>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<WireResponse, TransportFailure>>) -> Arc<Self> {
        assert!(!script.is_empty());
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            seen_headers: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn headers_of_call(&self, index: usize) -> Vec<(String, String)> {
        self.seen_headers.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_headers.lock().unwrap().push(request.headers);
        self.script[call.min(self.script.len() - 1)].clone()
    }
}

/// Never completes; requests through it stay in flight until cancelled.
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: WireRequest) -> Result<WireResponse, TransportFailure> {
        std::future::pending().await
    }
}

fn ok_envelope(json: &str) -> Result<WireResponse, TransportFailure> {
    Ok(WireResponse {
        status: 200,
        body: Bytes::copy_from_slice(json.as_bytes()),
    })
}

fn http_status(status: u16) -> Result<WireResponse, TransportFailure> {
    Ok(WireResponse {
        status,
        body: Bytes::new(),
    })
}

fn network_error() -> Result<WireResponse, TransportFailure> {
    Err(TransportFailure::Network("connection reset".to_string()))
}

fn test_client(transport: Arc<dyn Transport>, config: ClientConfig) -> ApiClient {
    ApiClient::with_transport(config, SessionStore::new(), transport)
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        retry_delay: Duration::from_millis(10),
        ..ClientConfig::new("https://api.canteen.test")
    }
}

#[tokio::test]
async fn success_envelope_resolves_with_payload() {
    let transport = ScriptedTransport::new(vec![ok_envelope(
        r#"{"code": 200, "message": "", "data": {"x": 1}}"#,
    )]);
    let client = test_client(transport.clone(), fast_config());

    let payload: serde_json::Value = tokio_test::assert_ok!(client.get("/v1/stats", &[]).await);
    assert_eq!(payload, serde_json::json!({"x": 1}));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.pending_len(), 0);
}

#[tokio::test]
async fn business_error_carries_message_and_is_not_retried() {
    let transport = ScriptedTransport::new(vec![ok_envelope(
        r#"{"code": 400, "message": "invalid", "data": null}"#,
    )]);
    let client = test_client(transport.clone(), fast_config());

    let error = client
        .get::<serde_json::Value>("/v1/members", &[])
        .await
        .unwrap_err();

    assert_eq!(error.business_message(), Some("invalid"));
    assert_eq!(transport.calls(), 1, "business errors must not retry");
    assert_eq!(client.pending_len(), 0);
}

#[tokio::test]
async fn string_code_envelope_is_business_successful() {
    let transport = ScriptedTransport::new(vec![ok_envelope(
        r#"{"code": "200", "message": "", "data": {"total": 5}}"#,
    )]);
    let client = test_client(transport, fast_config());

    let payload: serde_json::Value = client.get("/v1/finance/summary", &[]).await.unwrap();
    assert_eq!(payload["total"], 5);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_budget() {
    let transport = ScriptedTransport::new(vec![
        network_error(),
        network_error(),
        ok_envelope(r#"{"code": 200, "message": "", "data": {"ok": true}}"#),
    ]);
    let config = ClientConfig {
        retry: 3,
        retry_delay: Duration::from_millis(1000),
        ..ClientConfig::new("https://api.canteen.test")
    };
    let client = test_client(transport.clone(), config);

    let started = tokio::time::Instant::now();
    let payload: serde_json::Value = client.get("/v1/orders", &[]).await.unwrap();

    assert_eq!(payload["ok"], true);
    assert_eq!(transport.calls(), 3);
    // two retries, each preceded by the fixed delay
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(client.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_surfaces_transport_error() {
    let transport = ScriptedTransport::new(vec![network_error()]);
    let config = ClientConfig {
        retry: 2,
        retry_delay: Duration::from_millis(1000),
        ..ClientConfig::new("https://api.canteen.test")
    };
    let client = test_client(transport.clone(), config);

    let error = client
        .get::<serde_json::Value>("/v1/orders", &[])
        .await
        .unwrap_err();

    assert_eq!(error.transport_kind(), Some(TransportKind::Network));
    assert_eq!(transport.calls(), 3, "1 initial + 2 retries");
    assert_eq!(client.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn http_status_is_classified_after_retries() {
    let transport = ScriptedTransport::new(vec![http_status(401)]);
    let config = ClientConfig {
        retry: 1,
        retry_delay: Duration::from_millis(10),
        ..ClientConfig::new("https://api.canteen.test")
    };
    let client = test_client(transport.clone(), config);

    let error = client
        .get::<serde_json::Value>("/v1/me", &[])
        .await
        .unwrap_err();

    match error {
        ApiError::Transport { kind, status, .. } => {
            assert_eq!(kind, TransportKind::Unauthorized);
            assert_eq!(status, Some(401));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_errors_classify_as_server() {
    let transport = ScriptedTransport::new(vec![http_status(500)]);
    let config = ClientConfig {
        retry: 0,
        ..ClientConfig::new("https://api.canteen.test")
    };
    let client = test_client(transport, config);

    let error = client
        .get::<serde_json::Value>("/v1/orders", &[])
        .await
        .unwrap_err();
    assert_eq!(error.transport_kind(), Some(TransportKind::Server));
}

#[tokio::test]
async fn per_call_retry_override_wins_over_config() {
    let transport = ScriptedTransport::new(vec![network_error()]);
    let config = ClientConfig {
        retry: 5,
        retry_delay: Duration::from_millis(1),
        ..ClientConfig::new("https://api.canteen.test")
    };
    let client = test_client(transport.clone(), config);

    let descriptor = RequestDescriptor::new(Method::Get, "/v1/orders").retry(0);
    let error = client
        .request::<serde_json::Value>(descriptor)
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert_eq!(transport.calls(), 1, "per-call retry(0) means one attempt");
}

#[tokio::test(start_paused = true)]
async fn cancel_all_rejects_every_in_flight_request() {
    let client = Arc::new(test_client(Arc::new(HangingTransport), fast_config()));

    let mut handles = Vec::new();
    for path in ["/v1/orders", "/v1/staff", "/v1/members"] {
        let client = Arc::clone(&client);
        let path = path.to_string();
        handles.push(tokio::spawn(async move {
            client.get::<serde_json::Value>(&path, &[]).await
        }));
    }

    // let all three reach their transport call and register
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.pending_len(), 3);

    client.cancel_all();
    assert_eq!(client.pending_len(), 0, "registry clears immediately");

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, Err(ApiError::Cancelled)));
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_duplicates_policy_aborts_previous_dispatch() {
    let config = ClientConfig {
        cancel_duplicates: true,
        ..fast_config()
    };
    let client = Arc::new(test_client(Arc::new(HangingTransport), config));

    let first = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.get::<serde_json::Value>("/v1/orders", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.get::<serde_json::Value>("/v1/orders", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let outcome = first.await.unwrap();
    assert!(matches!(outcome, Err(ApiError::Cancelled)));

    client.cancel_all();
    let outcome = second.await.unwrap();
    assert!(matches!(outcome, Err(ApiError::Cancelled)));
}

#[tokio::test]
async fn bearer_token_is_injected_when_present() {
    let transport = ScriptedTransport::new(vec![ok_envelope(
        r#"{"code": 200, "message": "", "data": null}"#,
    )]);
    let client = test_client(transport.clone(), fast_config());
    client.session().set_token("tok-42");

    let _: Option<serde_json::Value> = client.get("/v1/me", &[]).await.unwrap();

    let headers = transport.headers_of_call(0);
    assert!(headers.contains(&("authorization".to_string(), "Bearer tok-42".to_string())));
}

#[tokio::test]
async fn no_token_means_no_authorization_header() {
    let transport = ScriptedTransport::new(vec![ok_envelope(
        r#"{"code": 200, "message": "", "data": null}"#,
    )]);
    let client = test_client(transport.clone(), fast_config());

    let _: Option<serde_json::Value> = client.get("/v1/menu", &[]).await.unwrap();

    let headers = transport.headers_of_call(0);
    assert!(!headers.iter().any(|(name, _)| name == "authorization"));
}

#[tokio::test]
async fn cleared_session_stops_sending_the_header() {
    let transport = ScriptedTransport::new(vec![ok_envelope(
        r#"{"code": 200, "message": "", "data": null}"#,
    )]);
    let client = test_client(transport.clone(), fast_config());

    client.session().set_token("tok-42");
    let _: Option<serde_json::Value> = client.get("/v1/me", &[]).await.unwrap();
    client.session().clear();
    let _: Option<serde_json::Value> = client.get("/v1/me", &[]).await.unwrap();

    assert!(transport
        .headers_of_call(0)
        .iter()
        .any(|(name, _)| name == "authorization"));
    assert!(!transport
        .headers_of_call(1)
        .iter()
        .any(|(name, _)| name == "authorization"));
}

#[tokio::test]
async fn get_bytes_returns_raw_body_without_envelope() {
    let transport = ScriptedTransport::new(vec![Ok(WireResponse {
        status: 200,
        body: Bytes::from_static(b"id,name\n1,espresso\n"),
    })]);
    let client = test_client(transport, fast_config());

    let bytes = tokio_test::assert_ok!(
        client
            .get_bytes("/v1/finance/export", &[("month", "2026-08")])
            .await
    );
    assert_eq!(&bytes[..], b"id,name\n1,espresso\n");
    assert_eq!(client.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn get_bytes_non_2xx_is_a_transport_error() {
    let transport = ScriptedTransport::new(vec![http_status(404)]);
    let config = ClientConfig {
        retry: 0,
        ..ClientConfig::new("https://api.canteen.test")
    };
    let client = test_client(transport, config);

    let error = client.get_bytes("/v1/finance/export", &[]).await.unwrap_err();
    assert_eq!(error.transport_kind(), Some(TransportKind::NotFound));
}

#[tokio::test]
async fn unparseable_success_body_is_a_decode_error_without_retry() {
    let transport = ScriptedTransport::new(vec![Ok(WireResponse {
        status: 200,
        body: Bytes::from_static(b"<html>proxy page</html>"),
    })]);
    let client = test_client(transport.clone(), fast_config());

    let error = client
        .get::<serde_json::Value>("/v1/orders", &[])
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::Decode { .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn independent_clients_do_not_share_pending_state() {
    let hanging = Arc::new(test_client(Arc::new(HangingTransport), fast_config()));
    let idle = test_client(
        ScriptedTransport::new(vec![ok_envelope(r#"{"code": 200, "data": null}"#)]),
        fast_config(),
    );

    let task = {
        let hanging = Arc::clone(&hanging);
        tokio::spawn(async move { hanging.get::<serde_json::Value>("/v1/orders", &[]).await })
    };
    tokio::task::yield_now().await;

    // cancelling the idle client must not touch the other instance
    idle.cancel_all();
    assert_eq!(idle.pending_len(), 0);
    assert_eq!(hanging.pending_len(), 1);

    hanging.cancel_all();
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, Err(ApiError::Cancelled)));
}
