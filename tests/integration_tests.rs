//! End-to-end tests against a mock administration API

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use session_client::auth::{
    CodeData, DeactivateAccountData, ForgotPasswordData, LoginCredentials, RegisterData, Secret,
    UpdateCompanyData, UpdateProfileData,
};
use session_client::config::{Config, SessionMode};
use session_client::guard::Navigator;
use session_client::session::{Credential, Identity};
use session_client::{ClientError, SessionClient};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl Navigator for Recorder {
    fn redirect(&self, to: &str) {
        self.events.lock().push(format!("redirect:{to}"));
    }

    fn forced_sign_out(&self, login_path: &str) {
        self.events.lock().push(format!("signed-out:{login_path}"));
    }
}

fn user_json(id: &str, tenant_id: &str) -> Value {
    json!({
        "id": id,
        "first_name": "Awa",
        "last_name": "Diop",
        "email": format!("{id}@example.com"),
        "phone": "+221700000000",
        "email_verified_at": null,
        "phone_verified_at": null,
        "is_active": true,
        "tenant_id": tenant_id
    })
}

fn tenant_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Tenant {id}"),
        "type": "SARL",
        "sector": "retail",
        "country": "SN",
        "is_active": true
    })
}

fn client(server: &MockServer, mode: SessionMode) -> (SessionClient, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let config = Config::new(server.uri(), mode);
    let client = SessionClient::new(config, recorder.clone()).unwrap();
    (client, recorder)
}

async fn mount_xsrf_cookie(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/sanctum/csrf-cookie"))
        .respond_with(
            ResponseTemplate::new(204).insert_header("Set-Cookie", "XSRF-TOKEN=abc%3D; Path=/"),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}

async fn mount_login(server: &MockServer, token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json("u1", "t1"),
            "tenant": tenant_json("t1"),
            "token": token,
            "expires_in": expires_in
        })))
        .mount(server)
        .await;
}

fn signed_in_bearer(client: &SessionClient, token: &str) {
    let identity = Identity::new(
        serde_json::from_value(user_json("u1", "t1")).unwrap(),
        Some(serde_json::from_value(tenant_json("t1")).unwrap()),
    );
    client
        .store
        .set_session(identity, Some(Credential::bearer(token)))
        .unwrap();
}

// ============================================================================
// Login / logout
// ============================================================================

#[tokio::test]
async fn test_bearer_login_and_logout() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"credential": "u1@example.com", "password": "hunter22"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json("u1", "t1"),
            "tenant": tenant_json("t1"),
            "token": "tok-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(header("X-Tenant-ID", "t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let identity = client
        .auth
        .login(LoginCredentials::new(" u1@example.com ", "hunter22"))
        .await
        .unwrap();
    assert_eq!(identity.user.id, "u1");

    let state = client.store.get_state();
    assert!(state.is_authenticated);
    assert_eq!(state.tenant_id.as_deref(), Some("t1"));
    assert_eq!(state.credential, Some(Credential::bearer("tok-1")));
    assert!(client.auth.refresh_scheduled());

    client.auth.logout().await.unwrap();
    assert_eq!(client.store.get_state(), Default::default());
    assert!(!client.auth.refresh_scheduled());
}

#[tokio::test]
async fn test_rejected_login_keeps_existing_session() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "tok-1");

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Identifiants invalides"})),
        )
        .mount(&server)
        .await;

    let err = client
        .auth
        .login(LoginCredentials::new("u1@example.com", "wrong"))
        .await
        .unwrap_err();
    match err {
        ClientError::Auth { message, status } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Identifiants invalides");
        }
        other => panic!("expected auth error, got {other:?}"),
    }

    assert!(client.store.is_authenticated());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_logout_clears_session_on_network_error() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "tok-1");

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.auth.logout().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(!client.store.is_authenticated());
}

#[tokio::test]
async fn test_registration_validation_errors_keep_server_order() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "The given data was invalid.",
            "errors": {
                "email": ["Email invalide"],
                "password": ["Trop court"]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = RegisterData {
        company_country: "SN".to_string(),
        company_name: "Teranga SARL".to_string(),
        company_sector: "retail".to_string(),
        company_type: "SARL".to_string(),
        email: "awa@example.com".to_string(),
        first_name: "Awa".to_string(),
        last_name: "Diop".to_string(),
        password: Secret::new("s3cret!"),
        password_confirmation: Secret::new("s3cret!"),
        phone: "+221700000000".to_string(),
        ..Default::default()
    };
    let err = client.auth.register(data).await.unwrap_err();

    let errors = err.validation_errors().expect("validation error");
    assert_eq!(errors.message(), "Email invalide");
    let fields: Vec<&str> = errors.fields().map(|(name, _)| name).collect();
    assert_eq!(fields, ["email", "password"]);
    assert_eq!(errors.field("password").unwrap(), ["Trop court"]);
    assert!(!client.store.is_authenticated());
}

// ============================================================================
// Bearer refresh
// ============================================================================

#[tokio::test]
async fn test_single_refresh_and_retry() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "old");

    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "new"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("Authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let orders: Value = client.http.get("/orders").await.unwrap();
    assert_eq!(orders, json!([{"id": 1}]));
    assert_eq!(client.store.credential(), Some(Credential::bearer("new")));
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_second_rejection_signs_out_without_second_refresh() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "old");

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.http.get::<Value>("/orders").await.unwrap_err();
    assert!(err.is_forced_sign_out());
    assert_eq!(client.store.get_state(), Default::default());
    assert_eq!(recorder.events(), ["signed-out:/login"]);
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "old");

    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "new"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;

    let (a, b) = tokio::join!(
        client.http.get::<Value>("/orders"),
        client.http.get::<Value>("/invoices")
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn test_failed_refresh_signs_out() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "old");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.auth.refresh_credential().await.unwrap_err();
    assert!(err.is_forced_sign_out());
    assert!(!client.store.is_authenticated());
    assert_eq!(recorder.events(), ["signed-out:/login"]);
}

#[tokio::test]
async fn test_password_change_request_recovers_expired_credential() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "expired");

    Mock::given(method("POST"))
        .and(path("/auth/password/request-change"))
        .and(header("Authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthenticated."})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/password/request-change"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Code sent"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client.auth.request_password_change().await.unwrap();
    assert_eq!(response.message, "Code sent");
    assert_eq!(client.store.credential(), Some(Credential::bearer("fresh")));
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_scheduled_refresh_fires_and_rearms() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);

    // A 2s lifetime is shorter than the 60s margin, so renewal fires after 1s.
    mount_login(&server, "tok-1", 2).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "tok-2", "expires_in": 2})),
        )
        .mount(&server)
        .await;

    client
        .auth
        .login(LoginCredentials::new("u1@example.com", "hunter22"))
        .await
        .unwrap();
    assert_eq!(requests_to(&server, "/auth/refresh").await, 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(requests_to(&server, "/auth/refresh").await, 1);
    assert_eq!(client.store.credential(), Some(Credential::bearer("tok-2")));
    assert!(client.auth.refresh_scheduled());

    client.auth.logout().await.ok();
    assert!(!client.auth.refresh_scheduled());
}

#[tokio::test]
async fn test_zero_lifetime_does_not_refresh_in_a_loop() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);

    mount_login(&server, "tok-1", 0).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "tok-2", "expires_in": 0})),
        )
        .mount(&server)
        .await;

    client
        .auth
        .login(LoginCredentials::new("u1@example.com", "hunter22"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(requests_to(&server, "/auth/refresh").await, 0);
    assert!(client.auth.refresh_scheduled());
}

// ============================================================================
// Cookie sessions
// ============================================================================

#[tokio::test]
async fn test_xsrf_fetch_is_shared_by_concurrent_requests() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Cookie);

    mount_xsrf_cookie(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("X-XSRF-TOKEN", "abc="))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(2)
        .mount(&server)
        .await;

    let body = json!({"name": "widget"});
    let (a, b) = tokio::join!(
        client.http.post::<_, Value>("/items", &body),
        client.http.post::<_, Value>("/items", &body)
    );
    assert_eq!(a.unwrap(), json!({"id": 7}));
    assert_eq!(b.unwrap(), json!({"id": 7}));
}

#[tokio::test]
async fn test_cookie_rejection_signs_out() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Cookie);
    client
        .store
        .set_session(
            Identity::new(serde_json::from_value(user_json("u1", "t1")).unwrap(), None),
            None,
        )
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.http.get::<Value>("/orders").await.unwrap_err();
    assert!(err.is_forced_sign_out());
    assert!(!client.store.is_authenticated());
    assert_eq!(recorder.events(), ["signed-out:/login"]);
}

#[tokio::test]
async fn test_rejection_without_session_is_not_a_sign_out() {
    let server = MockServer::start().await;
    let (client, recorder) = client(&server, SessionMode::Cookie);

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.http.get::<Value>("/orders").await.unwrap_err();
    assert!(!err.is_forced_sign_out());
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_cookie_login_sends_xsrf_token() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Cookie);

    mount_xsrf_cookie(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(header("X-XSRF-TOKEN", "abc="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json("u1", "t1"),
            "tenant": tenant_json("t1")
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .auth
        .login(LoginCredentials::new("u1@example.com", "hunter22"))
        .await
        .unwrap();

    let state = client.store.get_state();
    assert!(state.is_authenticated);
    assert!(state.credential.is_none());
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_profile_updates_are_mirrored_into_the_store() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "tok-1");

    let mut updated_user = user_json("u1", "t1");
    updated_user["first_name"] = json!("Fatou");
    Mock::given(method("PUT"))
        .and(path("/auth/profile/update"))
        .and(header("X-Tenant-ID", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated_user))
        .expect(1)
        .mount(&server)
        .await;

    let mut moved_tenant = tenant_json("t2");
    moved_tenant["name"] = json!("Teranga SARL");
    Mock::given(method("PUT"))
        .and(path("/auth/profile/company"))
        .respond_with(ResponseTemplate::new(200).set_body_json(moved_tenant))
        .expect(1)
        .mount(&server)
        .await;

    client
        .profile
        .update_profile(UpdateProfileData {
            first_name: Some("Fatou".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(client.store.get_state().user.unwrap().first_name, "Fatou");

    client
        .profile
        .update_company(UpdateCompanyData {
            name: Some("Teranga SARL".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let state = client.store.get_state();
    assert_eq!(state.tenant_id.as_deref(), Some("t2"));
    assert_eq!(state.user.unwrap().tenant_id.as_deref(), Some("t2"));
    assert_eq!(state.tenant.unwrap().name, "Teranga SARL");
}

#[tokio::test]
async fn test_deactivation_ends_session_and_forgets_xsrf_token() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Cookie);
    client
        .store
        .set_session(
            Identity::new(serde_json::from_value(user_json("u1", "t1")).unwrap(), None),
            None,
        )
        .unwrap();

    // One fetch before deactivating, another for the first request after it.
    mount_xsrf_cookie(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/auth/profile/deactivate"))
        .and(header("X-XSRF-TOKEN", "abc="))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "XSRF-TOKEN=; Max-Age=0; Path=/")
                .set_body_json(json!({"message": "Account deactivated"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(header("X-XSRF-TOKEN", "abc="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Sent"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client
        .profile
        .deactivate_account(DeactivateAccountData {
            password: Secret::new("hunter22"),
            reason: None,
        })
        .await
        .unwrap();
    assert_eq!(response.message, "Account deactivated");
    assert_eq!(client.store.get_state(), Default::default());

    client
        .auth
        .forgot_password(ForgotPasswordData {
            email: "u1@example.com".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_contact_verification_marks_the_user() {
    let server = MockServer::start().await;
    let (client, _) = client(&server, SessionMode::Bearer);
    signed_in_bearer(&client, "tok-1");

    Mock::given(method("POST"))
        .and(path("/auth/verify-email"))
        .and(body_json(json!({"code": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Email verified",
            "email_verified_at": "2024-03-01T10:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-phone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Phone verified"})))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let response = client
        .profile
        .verify_email(CodeData {
            code: "123456".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(response.message, "Email verified");
    client
        .profile
        .verify_phone(CodeData {
            code: "654321".to_string(),
        })
        .await
        .unwrap();

    let user = client.store.get_state().user.unwrap();
    assert_eq!(
        user.email_verified_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
    );
    assert!(user.phone_verified_at.is_some_and(|at| at >= before));
}
