//! Integration tests for the user API
//!
//! Drives the full router (registration, token obtain/refresh, profile)
//! through tower's oneshot against a throwaway SQLite database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cavemap_backend::auth::{AuthState, RefreshTokenStore, TokenService, UserStore};
use cavemap_backend::location::{LocationState, LocationStore};
use cavemap_backend::routes::create_router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

const TEST_SECRET: &str = "test-secret-key-not-for-production-123";

struct TestApp {
    app: Router,
    db: NamedTempFile,
}

impl TestApp {
    fn new() -> Self {
        Self::with_token_service(TokenService::new(TEST_SECRET.to_string()))
    }

    /// Build an app around a specific token service (used for expiry tests)
    fn with_token_service(tokens: TokenService) -> Self {
        let db = NamedTempFile::new().unwrap();
        let path = db.path().to_str().unwrap();

        let users = Arc::new(UserStore::new(path).unwrap());
        let consumed = Arc::new(RefreshTokenStore::new(path).unwrap());
        let auth_state = AuthState::new(users, consumed, Arc::new(tokens));
        let location_state = LocationState {
            store: Arc::new(LocationStore::new(path).unwrap()),
        };

        Self {
            app: create_router(auth_state, location_state),
            db,
        }
    }

    /// Direct store handle for assertions against persisted state
    fn user_store(&self) -> UserStore {
        UserStore::new(self.db.path().to_str().unwrap()).unwrap()
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    async fn register(&self, email: &str, password: &str, name: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/user/create",
            None,
            Some(json!({"email": email, "password": password, "name": name})),
        )
        .await
    }

    async fn obtain_token(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/user/token",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await
    }

    async fn refresh(&self, refresh: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/user/token/refresh",
            None,
            Some(json!({"refresh": refresh})),
        )
        .await
    }
}

#[tokio::test]
async fn test_create_user_success() {
    let app = TestApp::new();

    let (status, body) = app
        .register("test@example.com", "testpass123", "Test Name")
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({"email": "test@example.com", "name": "Test Name"})
    );
    assert!(body.get("password").is_none());

    // Persisted hash never equals the plaintext, and verifies
    let user = app
        .user_store()
        .get_by_email("test@example.com")
        .unwrap()
        .unwrap();
    assert_ne!(user.password_hash, "testpass123");
    assert!(bcrypt::verify("testpass123", &user.password_hash).unwrap());
}

#[tokio::test]
async fn test_create_user_duplicate_email() {
    let app = TestApp::new();

    let (status, _) = app
        .register("test@example.com", "testpass123", "Test Name")
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .register("test@example.com", "otherpass123", "Other Name")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_create_user_short_password() {
    let app = TestApp::new();

    let (status, _) = app.register("test@example.com", "pw", "Test Name").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No user record was created
    assert!(app
        .user_store()
        .get_by_email("test@example.com")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_user_malformed_email() {
    let app = TestApp::new();

    let (status, _) = app.register("not-an-email", "testpass123", "Test Name").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_obtain_token_success() {
    let app = TestApp::new();
    app.register("test@example.com", "test-user-password123", "Test Name")
        .await;

    let (status, body) = app
        .obtain_token("test@example.com", "test-user-password123")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());
}

#[tokio::test]
async fn test_obtain_token_bad_credentials() {
    let app = TestApp::new();
    app.register("test@example.com", "goodpass123", "Test Name")
        .await;

    let (status, body) = app.obtain_token("test@example.com", "badpass123").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("access").is_none());
    assert!(body.get("refresh").is_none());
}

#[tokio::test]
async fn test_obtain_token_blank_password() {
    let app = TestApp::new();

    let (status, body) = app.obtain_token("test@example.com", "").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("access").is_none());
    assert!(body.get("refresh").is_none());
}

#[tokio::test]
async fn test_me_requires_auth() {
    let app = TestApp::new();

    let (status, _) = app.request(Method::GET, "/user/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_profile() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let access = tokens["access"].as_str().unwrap();

    let (status, body) = app.request(Method::GET, "/user/me", Some(access), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"name": "Test Name", "email": "test@example.com"})
    );
}

#[tokio::test]
async fn test_me_post_not_allowed() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let access = tokens["access"].as_str().unwrap();

    let (status, _) = app
        .request(Method::POST, "/user/me", Some(access), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_me_rejects_expired_access_token() {
    // Access TTL two hours in the past, well beyond validation leeway
    let app = TestApp::with_token_service(
        TokenService::new(TEST_SECRET.to_string()).with_ttls(-120, 7),
    );
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let access = tokens["access"].as_str().unwrap();

    let (status, _) = app.request(Method::GET, "/user/me", Some(access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_refresh_token_as_bearer() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let refresh = tokens["refresh"].as_str().unwrap();

    let (status, _) = app
        .request(Method::GET, "/user/me", Some(refresh), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patch_me_updates_profile() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let access = tokens["access"].as_str().unwrap();

    let (status, body) = app
        .request(
            Method::PATCH,
            "/user/me",
            Some(access),
            Some(json!({"name": "Updated name", "password": "newpassword123"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Updated name");

    let store = app.user_store();
    assert!(store
        .verify_credentials("test@example.com", "newpassword123")
        .unwrap()
        .is_some());
    assert!(store
        .verify_credentials("test@example.com", "testpass123")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_patch_me_short_password_rejected() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let access = tokens["access"].as_str().unwrap();

    let (status, _) = app
        .request(
            Method::PATCH,
            "/user/me",
            Some(access),
            Some(json!({"password": "pw"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Stored credentials unchanged
    assert!(app
        .user_store()
        .verify_credentials("test@example.com", "testpass123")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_refresh_rotates_pair() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, first) = app.obtain_token("test@example.com", "testpass123").await;
    let refresh_one = first["refresh"].as_str().unwrap();
    let access_one = first["access"].as_str().unwrap();

    let (status, second) = app.refresh(refresh_one).await;

    assert_eq!(status, StatusCode::OK);
    let refresh_two = second["refresh"].as_str().unwrap();
    let access_two = second["access"].as_str().unwrap();
    assert_ne!(refresh_one, refresh_two);
    assert_ne!(access_one, access_two);
}

#[tokio::test]
async fn test_refresh_reuse_rejected() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let refresh = tokens["refresh"].as_str().unwrap();

    let (first_status, _) = app.refresh(refresh).await;
    assert_eq!(first_status, StatusCode::OK);

    // Immediate reuse of the same refresh token is always rejected
    let (second_status, body) = app.refresh(refresh).await;
    assert_eq!(second_status, StatusCode::UNAUTHORIZED);
    assert!(body.get("access").is_none());
}

#[tokio::test]
async fn test_refresh_invalid_token() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;

    let (status, _) = app.refresh("invalid").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.refresh("").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_expired_token() {
    // Refresh TTL one day in the past
    let app = TestApp::with_token_service(
        TokenService::new(TEST_SECRET.to_string()).with_ttls(30, -1),
    );
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let refresh = tokens["refresh"].as_str().unwrap();

    let (status, _) = app.refresh(refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let access = tokens["access"].as_str().unwrap();

    let (status, _) = app.refresh(access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_token_lifecycle() {
    let app = TestApp::new();

    let (status, _) = app
        .register("test@example.com", "testpass123", "Test Name")
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    assert_eq!(status, StatusCode::OK);
    assert!(tokens["access"].is_string());
    assert!(tokens["refresh"].is_string());
    let refresh = tokens["refresh"].as_str().unwrap();

    let (status, rotated) = app.refresh(refresh).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh"], tokens["refresh"]);
    assert_ne!(rotated["access"], tokens["access"]);

    let (status, _) = app.refresh(refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The rotated pair still works
    let (status, _) = app
        .request(
            Method::GET,
            "/user/me",
            Some(rotated["access"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_trailing_slash_routes_served() {
    // The published paths carry trailing slashes; both forms must resolve
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;

    let (status, tokens) = app
        .request(
            Method::POST,
            "/user/token/",
            None,
            Some(json!({"email": "test@example.com", "password": "testpass123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = tokens["access"].as_str().unwrap();
    let refresh = tokens["refresh"].as_str().unwrap();

    let (status, body) = app
        .request(Method::GET, "/user/me/", Some(access), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "test@example.com");

    let (status, rotated) = app
        .request(
            Method::POST,
            "/user/token/refresh/",
            None,
            Some(json!({"refresh": refresh})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["access"].is_string());
}

#[tokio::test]
async fn test_concurrent_refresh_single_success() {
    let app = TestApp::new();
    app.register("test@example.com", "testpass123", "Test Name")
        .await;
    let (_, tokens) = app.obtain_token("test@example.com", "testpass123").await;
    let refresh = tokens["refresh"].as_str().unwrap();

    // Race the same refresh token; rotation must succeed for exactly one
    let (a, b, c, d) = tokio::join!(
        app.refresh(refresh),
        app.refresh(refresh),
        app.refresh(refresh),
        app.refresh(refresh),
    );

    let statuses = [a.0, b.0, c.0, d.0];
    let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let rejected = statuses
        .iter()
        .filter(|s| **s == StatusCode::UNAUTHORIZED)
        .count();
    assert_eq!(ok, 1);
    assert_eq!(rejected, 3);
}
