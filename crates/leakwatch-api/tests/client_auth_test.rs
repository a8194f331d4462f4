#![allow(clippy::unwrap_used)]
// Integration tests for bearer injection and the refresh-on-401 policy.

use std::sync::Arc;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leakwatch_api::{
    ApiClient, AuthState, Error, EspRegistration, MemorySessionStore, Session, SessionStore,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(session: Option<Session>) -> (MockServer, ApiClient, Arc<MemorySessionStore>) {
    let server = MockServer::start().await;
    let store = Arc::new(match session {
        Some(session) => MemorySessionStore::with_session(session),
        None => MemorySessionStore::new(),
    });
    let base_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = ApiClient::with_client(reqwest::Client::new(), base_url, store.clone());
    (server, client, store)
}

fn signed_in(access: &str, refresh: Option<&str>) -> Session {
    Session::new(access, refresh.map(String::from))
}

fn leak_json(id: u32) -> serde_json::Value {
    json!({
        "id": id,
        "occurred_at": "2026-05-04T06:30:00Z",
        "location": "Musanze",
        "water_lost_litres": 310.0,
        "status": "investigating",
        "severity": "high"
    })
}

// ── Bearer injection ────────────────────────────────────────────────

#[tokio::test]
async fn test_access_token_is_attached() {
    let (server, client, _store) = setup(Some(signed_in("access-1", Some("refresh-1")))).await;

    Mock::given(method("GET"))
        .and(path("/api/leaks/history/"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([leak_json(1)])))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.leak_history(None).await.unwrap();
    assert_eq!(page.results.len(), 1);
}

// ── Refresh and replay ──────────────────────────────────────────────

#[tokio::test]
async fn test_401_refreshes_once_and_replays_once() {
    let (server, client, store) = setup(Some(signed_in("stale", Some("refresh-1")))).await;

    Mock::given(method("GET"))
        .and(path("/api/leaks/investigating/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({ "refresh": "refresh-1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "fresh", "refresh": "refresh-2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/leaks/investigating/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1, "next": null, "previous": null, "results": [leak_json(7)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.investigating_leaks(None).await.unwrap();
    assert_eq!(page.results[0].id.as_str(), "7");

    let session = store.load().unwrap().unwrap();
    assert_eq!(session.access_token(), Some("fresh"));
    assert_eq!(session.refresh_token(), Some("refresh-2"));
    assert_eq!(client.auth_state(), AuthState::SignedIn);
}

#[tokio::test]
async fn test_refresh_without_new_refresh_token_keeps_old_one() {
    let (server, client, store) = setup(Some(signed_in("stale", Some("refresh-1")))).await;

    Mock::given(method("GET"))
        .and(path("/api/readings/critical/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/readings/critical/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    client.critical_readings().await.unwrap();

    let session = store.load().unwrap().unwrap();
    assert_eq!(session.access_token(), Some("fresh"));
    assert_eq!(session.refresh_token(), Some("refresh-1"));
}

#[tokio::test]
async fn test_401_without_refresh_token_clears_session() {
    let (server, client, store) = setup(Some(signed_in("access-only", None))).await;

    Mock::given(method("GET"))
        .and(path("/api/leaks/history/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "x" })))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.leak_history(None).await;

    assert!(matches!(result, Err(Error::Unauthorized)), "got: {result:?}");
    assert!(store.load().unwrap().is_none());
    assert_eq!(client.auth_state(), AuthState::SignedOut);
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_expires() {
    let (server, client, store) = setup(Some(signed_in("stale", Some("revoked")))).await;

    Mock::given(method("GET"))
        .and(path("/api/leaks/history/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token is invalid or expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client.leak_history(None).await;

    match result {
        Err(Error::RefreshFailed { ref message }) => {
            assert!(message.contains("Token is invalid"), "unexpected message: {message}");
        }
        other => panic!("expected RefreshFailed, got: {other:?}"),
    }
    assert!(store.load().unwrap().is_none());
    assert_eq!(
        client.auth_state(),
        AuthState::Expired {
            redirect_to: "/login".into()
        }
    );
}

#[tokio::test]
async fn test_replay_is_never_retried_twice() {
    let (server, client, _store) = setup(Some(signed_in("stale", Some("refresh-1")))).await;

    Mock::given(method("GET"))
        .and(path("/api/leaks/history/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.leak_history(None).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let (server, client, _store) = setup(Some(signed_in("stale", Some("refresh-1")))).await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let (history, critical) = tokio::join!(client.leak_history(None), client.critical_readings());
    history.unwrap();
    critical.unwrap();
}

#[tokio::test]
async fn test_concurrent_401s_with_failed_refresh_keep_expired_state() {
    let (server, client, store) = setup(Some(signed_in("stale", Some("revoked")))).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token is invalid or expired" }))
                .set_delay(std::time::Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (history, critical) = tokio::join!(client.leak_history(None), client.critical_readings());
    assert!(
        matches!(history, Err(Error::RefreshFailed { .. })),
        "got: {history:?}"
    );
    assert!(
        matches!(critical, Err(Error::RefreshFailed { .. })),
        "got: {critical:?}"
    );
    assert!(store.load().unwrap().is_none());
    assert_eq!(
        client.auth_state(),
        AuthState::Expired {
            redirect_to: "/login".into()
        }
    );
}

#[tokio::test]
async fn test_failed_refresh_redirects_to_custom_login_route() {
    let (server, client, _store) = setup(Some(signed_in("stale", Some("revoked")))).await;
    let client = client.with_login_route("/auth/sign-in");

    Mock::given(method("GET"))
        .and(path("/api/leaks/history/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.leak_history(None).await;
    assert!(result.as_ref().is_err_and(Error::is_auth_expired), "got: {result:?}");
    assert_eq!(
        client.auth_state(),
        AuthState::Expired {
            redirect_to: "/auth/sign-in".into()
        }
    );
}

#[tokio::test]
async fn test_explicit_refresh_requires_refresh_token() {
    let (_server, client, _store) = setup(None).await;
    let result = client.refresh().await;
    assert!(matches!(result, Err(Error::Unauthorized)), "got: {result:?}");
}

// ── Login / logout ──────────────────────────────────────────────────

#[tokio::test]
async fn test_login_populates_session() {
    let (server, client, store) = setup(None).await;
    assert_eq!(client.auth_state(), AuthState::SignedOut);

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({ "email": "ops@wasac.rw", "password": "correct-horse" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "access-1",
            "refresh": "refresh-1",
            "user": { "id": 3, "email": "ops@wasac.rw", "username": "ops", "role": "operator" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let password: secrecy::SecretString = "correct-horse".to_string().into();
    let session = client.login("ops@wasac.rw", &password).await.unwrap();

    assert_eq!(session.access_token(), Some("access-1"));
    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.refresh_token(), Some("refresh-1"));
    assert_eq!(stored.user.unwrap().role.as_deref(), Some("operator"));
    assert_eq!(client.auth_state(), AuthState::SignedIn);
}

#[tokio::test]
async fn test_login_rejected_does_not_refresh() {
    let (server, client, store) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "No active account found" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let password: secrecy::SecretString = "wrong-password".to_string().into();
    let result = client.login("ops@wasac.rw", &password).await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(message.contains("No active account"), "unexpected message: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_logout_revokes_and_clears() {
    let (server, client, store) = setup(Some(signed_in("access-1", Some("refresh-1")))).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({ "refresh": "refresh-1" })))
        .respond_with(ResponseTemplate::new(205))
        .expect(1)
        .mount(&server)
        .await;

    client.logout().await.unwrap();

    assert!(store.load().unwrap().is_none());
    assert_eq!(client.auth_state(), AuthState::SignedOut);
}

#[tokio::test]
async fn test_logout_clears_even_when_backend_fails() {
    let (server, client, store) = setup(Some(signed_in("access-1", Some("refresh-1")))).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    client.logout().await.unwrap();
    assert!(store.load().unwrap().is_none());
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_form_never_reaches_backend() {
    let (server, client, _store) = setup(Some(signed_in("access-1", Some("refresh-1")))).await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let form = EspRegistration {
        device_id: "esp-9".into(),
        name: None,
        province: "Northern".into(),
        district: "Musanze".into(),
        latitude: 123.0,
        longitude: 29.6,
    };
    let result = client.register_esp(&form).await;

    assert!(
        matches!(result, Err(Error::Validation { field: "latitude", .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_backend_error_message_is_surfaced() {
    let (server, client, _store) = setup(Some(signed_in("access-1", Some("refresh-1")))).await;

    Mock::given(method("GET"))
        .and(path("/api/control/schedules/404/status/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." })))
        .mount(&server)
        .await;

    let err = client.schedule_status("404").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Not found."), "unexpected: {err}");
}
