#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use nelonshift::{
    config::Config,
    repositories::memory::{
        InMemoryLoginAttemptStore, InMemoryRefreshTokenStore, InMemoryUserRepository,
    },
    routes,
    state::AppState,
};

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub router: Router,
    pub config: Config,
    pub refresh_tokens: InMemoryRefreshTokenStore,
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://localhost/nelonshift_test"),
        ("JWT_SECRET", JWT_SECRET),
        ("ARGON2_MEMORY_KIB", "1024"),
        ("ARGON2_ITERATIONS", "1"),
        ("ARGON2_PARALLELISM", "1"),
        ("LOGIN_MAX_ATTEMPTS", "3"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(&[])
}

pub fn build_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let config = test_config(overrides);
    let refresh_tokens = InMemoryRefreshTokenStore::new();

    let state = AppState::from_parts(
        &config,
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(refresh_tokens.clone()),
        Arc::new(InMemoryLoginAttemptStore::new()),
    )
    .unwrap();

    TestApp {
        router: routes::router(state),
        config,
        refresh_tokens,
    }
}

/// The cookies a client would hold between requests.
#[derive(Default, Clone, Debug)]
pub struct CookieJar {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl CookieJar {
    pub fn header(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(access) = &self.access {
            parts.push(format!("accessToken={}", access));
        }
        if let Some(refresh) = &self.refresh {
            parts.push(format!("refreshToken={}", refresh));
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }

    /// Applies the `Set-Cookie` headers of a response, dropping cleared cookies.
    pub fn update(&mut self, response: &Response<Body>) {
        if let Some(value) = cookie_value(response, "accessToken") {
            self.access = (!value.is_empty()).then_some(value);
        }
        if let Some(value) = cookie_value(response, "refreshToken") {
            self.refresh = (!value.is_empty()).then_some(value);
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value, jar: Option<&CookieJar>) -> Response<Body> {
        self.send(request("POST", uri, Some(body), jar)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value, jar: Option<&CookieJar>) -> Response<Body> {
        self.send(request("PUT", uri, Some(body), jar)).await
    }

    pub async fn get(&self, uri: &str, jar: Option<&CookieJar>) -> Response<Body> {
        self.send(request("GET", uri, None, jar)).await
    }

    pub async fn delete(&self, uri: &str, jar: Option<&CookieJar>) -> Response<Body> {
        self.send(request("DELETE", uri, None, jar)).await
    }

    pub async fn signup(&self, email: &str, name: &str, password: &str) -> Response<Body> {
        self.post_json(
            "/api/auth/signup",
            serde_json::json!({ "email": email, "name": name, "password": password }),
            None,
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        self.post_json(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Signs up and logs in, returning the session cookies.
    pub async fn signup_and_login(&self, email: &str, name: &str, password: &str) -> CookieJar {
        let response = self.signup(email, name, password).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self.login(email, password).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut jar = CookieJar::default();
        jar.update(&response);
        assert!(jar.access.is_some() && jar.refresh.is_some());
        jar
    }
}

pub fn request(method: &str, uri: &str, body: Option<Value>, jar: Option<&CookieJar>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(cookie) = jar.and_then(|jar| jar.header()) {
        builder = builder.header(header::COOKIE, cookie);
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// All `Set-Cookie` headers for the given cookie name.
pub fn set_cookie_headers(response: &Response<Body>, name: &str) -> Vec<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

/// The value the response sets for a cookie, if any.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let header = set_cookie_headers(response, name).pop()?;
    let pair = header.split(';').next()?;
    pair.split_once('=').map(|(_, value)| value.trim_matches('"').to_string())
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
