//! Gateway recovery behavior: refresh coalescing, retry limits, logout
//! cascades and failure classification, exercised over a scripted transport.

mod common;

use common::{FakeTransport, RecordingNavigator, RecordingNotifier};
use gardisto::gateway::transport::TransportError;
use gardisto::{Gateway, GatewayConfig, GatewayError, SessionContext};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    transport: Arc<FakeTransport>,
    navigator: Arc<RecordingNavigator>,
    notifier: Arc<RecordingNotifier>,
    context: SessionContext,
    gateway: Arc<Gateway>,
}

fn fixture() -> Fixture {
    common::init_tracing();
    let config = GatewayConfig::new("https://console.example.com/api").unwrap();
    let context = SessionContext::in_memory();
    context.credentials.set_auth("tok-0", "subject-1");

    let transport = Arc::new(FakeTransport::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let gateway = Arc::new(Gateway::new(
        config,
        &context,
        transport.clone(),
        navigator.clone(),
        notifier.clone(),
    ));

    Fixture {
        transport,
        navigator,
        notifier,
        context,
        gateway,
    }
}

#[tokio::test]
async fn concurrent_401s_issue_exactly_one_refresh() {
    let fx = fixture();

    for _ in 0..4 {
        fx.transport.enqueue("/Grp", 401, json!({"message": "expired"}));
    }
    // Hold the refresh open long enough for every request to pile up.
    fx.transport.enqueue_delayed(
        "/Auth/refresh",
        200,
        json!({"Token": "tok-1"}),
        Duration::from_millis(200),
    );

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let gateway = fx.gateway.clone();
        tasks.push(tokio::spawn(async move { gateway.get("/Grp").await }));
    }

    for task in tasks {
        task.await.unwrap().expect("request should settle ok");
    }

    assert_eq!(fx.transport.calls_to("/Auth/refresh"), 1);
    // Four originals plus four retries.
    assert_eq!(fx.transport.calls_to("/Grp"), 8);
    assert_eq!(
        fx.transport.last_bearer_for("/Grp").as_deref(),
        Some("tok-1")
    );
    assert_eq!(fx.context.credentials.token().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn retried_request_never_reenters_the_refresh_flow() {
    let fx = fixture();

    fx.transport.enqueue("/Grp", 401, json!({"message": "expired"}));
    fx.transport.enqueue("/Grp", 401, json!({"message": "still expired"}));
    fx.transport
        .enqueue("/Auth/refresh", 200, json!({"Token": "tok-1"}));

    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated { .. }));
    assert_eq!(fx.transport.calls_to("/Auth/refresh"), 1);
    assert_eq!(fx.transport.calls_to("/Grp"), 2);
}

#[tokio::test]
async fn missing_refresh_token_is_soft_and_keeps_the_session() {
    let fx = fixture();

    fx.transport.enqueue("/Grp", 401, json!({"message": "expired"}));
    fx.transport.enqueue(
        "/Auth/refresh",
        401,
        json!({"message": "Refresh Token not found"}),
    );

    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::RefreshUnavailable { .. }));
    assert!(fx.context.credentials.is_authenticated());
    assert_eq!(fx.navigator.login_count(), 0);
    assert_eq!(fx.transport.calls_to("/Auth/logout"), 0);
}

#[tokio::test]
async fn hard_refresh_failure_clears_and_navigates_exactly_once() {
    let fx = fixture();

    for _ in 0..3 {
        fx.transport.enqueue("/Grp", 401, json!({"message": "expired"}));
    }
    fx.transport.enqueue_delayed(
        "/Auth/refresh",
        401,
        json!({"message": "session expired"}),
        Duration::from_millis(200),
    );

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let gateway = fx.gateway.clone();
        tasks.push(tokio::spawn(async move { gateway.get("/Grp").await }));
    }

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated { .. }));
    }

    assert_eq!(fx.transport.calls_to("/Auth/refresh"), 1);
    assert_eq!(fx.transport.calls_to("/Auth/logout"), 1);
    assert_eq!(fx.navigator.login_count(), 1);
    assert!(!fx.context.credentials.is_authenticated());
}

#[tokio::test]
async fn password_changed_signal_bypasses_refresh() {
    let fx = fixture();
    fx.context.credentials.mark_password_changed();

    fx.transport.enqueue("/Grp", 401, json!({"message": "expired"}));

    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated { .. }));
    assert_eq!(fx.transport.calls_to("/Auth/refresh"), 0);
    assert_eq!(fx.navigator.login_count(), 1);
    assert!(!fx.context.credentials.is_authenticated());
}

#[tokio::test]
async fn failed_login_takes_no_session_action() {
    let fx = fixture();

    fx.transport
        .enqueue("/Auth/login", 401, json!({"message": "invalid credentials"}));

    let err = fx.gateway.post("/Auth/login", None).await.unwrap_err();
    match err {
        GatewayError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid credentials");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fx.transport.calls_to("/Auth/refresh"), 0);
    assert_eq!(fx.navigator.login_count(), 0);
    assert!(fx.context.credentials.is_authenticated());
    assert!(fx.notifier.messages().is_empty());
}

#[tokio::test]
async fn session_limit_denial_opens_the_dialog_and_keeps_the_session() {
    let fx = fixture();

    for _ in 0..2 {
        fx.transport.enqueue(
            "/Grp",
            403,
            json!({"message": "too many sessions", "denialCode": "MAX_SESSIONS_REACHED"}),
        );
    }

    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::SessionLimit));
    assert!(fx.context.session_limit.is_open());

    // A second denial while the dialog is open just fails the request.
    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::SessionLimit));

    assert!(fx.context.credentials.is_authenticated());
    assert_eq!(fx.navigator.login_count(), 0);
}

#[tokio::test]
async fn forbidden_user_endpoint_forces_logout() {
    let fx = fixture();

    fx.transport
        .enqueue("/Users/42", 403, json!({"message": "forbidden"}));

    let err = fx.gateway.get("/Users/42").await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden { .. }));
    assert_eq!(fx.navigator.login_count(), 1);
    assert!(!fx.context.credentials.is_authenticated());
}

#[tokio::test]
async fn plain_forbidden_notifies_and_keeps_the_session() {
    let fx = fixture();

    fx.transport
        .enqueue("/Grp/9", 403, json!({"message": "no access to this group"}));

    let err = fx.gateway.get("/Grp/9").await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden { .. }));
    assert!(fx.context.credentials.is_authenticated());
    assert_eq!(fx.navigator.login_count(), 0);
    assert!(fx
        .notifier
        .messages()
        .contains(&"no access to this group".to_string()));
}

#[tokio::test]
async fn transport_failure_produces_connectivity_notice() {
    let fx = fixture();

    fx.transport
        .enqueue_failure("/Grp", TransportError::Connect("connection refused".into()));

    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
    assert!(err.is_transport());
    assert!(fx
        .notifier
        .messages()
        .iter()
        .any(|message| message.contains("Unable to reach the server")));
    assert!(fx.context.credentials.is_authenticated());
}

#[tokio::test]
async fn timeout_is_classified_as_transport_failure() {
    let fx = fixture();

    fx.transport
        .enqueue_failure("/Grp", TransportError::Timeout);

    let err = fx.gateway.get("/Grp").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout));
    assert!(err.is_transport());
}

#[tokio::test]
async fn server_error_surfaces_the_server_message() {
    let fx = fixture();

    fx.transport
        .enqueue("/AuditLog", 500, json!({"message": "internal failure"}));

    let err = fx.gateway.get("/AuditLog").await.unwrap_err();
    match err {
        GatewayError::Api { status, .. } => assert_eq!(status, 500),
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx
        .notifier
        .messages()
        .contains(&"internal failure".to_string()));
    assert!(fx.context.credentials.is_authenticated());
}

#[tokio::test]
async fn refresh_sends_the_previous_credential() {
    let fx = fixture();

    fx.transport.enqueue("/Grp", 401, json!({"message": "expired"}));
    fx.transport
        .enqueue("/Auth/refresh", 200, json!({"Token": "tok-1"}));

    fx.gateway.get("/Grp").await.expect("retry should succeed");

    assert_eq!(
        fx.transport.last_bearer_for("/Auth/refresh").as_deref(),
        Some("tok-0")
    );
    assert_eq!(fx.context.credentials.token().as_deref(), Some("tok-1"));
    assert_eq!(
        fx.context.credentials.subject_id().as_deref(),
        Some("subject-1")
    );
}
