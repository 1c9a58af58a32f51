use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    config::Config,
    error::Result,
    middleware_layer::auth::AuthUser,
    models::user::UserDto,
    services::auth::IssuedSession,
    state::AppState,
    validation::auth::validate_payload,
};

/// Name of the cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Name of the cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// The request payload for user registration.
#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 2, max = 50))]
    pub name: String,
    #[garde(length(min = 6, max = 40))]
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[garde(length(min = 1))]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

/// The request payload for changing a user's password.
#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[garde(length(min = 1))]
    pub old_password: String,
    #[garde(length(min = 6, max = 40))]
    pub new_password: String,
}

/// A plain acknowledgement.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// The body of a successful login. Tokens travel only in cookies.
#[derive(Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// The body of a logout-everywhere response.
#[derive(Serialize)]
pub struct RevokedResponse {
    pub message: String,
    pub revoked: usize,
}

/// Creates an HTTP-only token cookie with the given name, value, and max age.
fn create_token_cookie(
    config: &Config,
    name: &'static str,
    value: String,
    max_age_secs: i64,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    cookie.set_http_only(true);
    cookie.set_secure(config.cookie_secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");

    if !config.cookie_domain.is_empty() {
        cookie.set_domain(config.cookie_domain.clone());
    }

    cookie
}

/// Sets both token cookies for a freshly issued session.
fn set_session_cookies(state: &AppState, cookies: &Cookies, session: &IssuedSession) {
    cookies.add(create_token_cookie(
        &state.config,
        ACCESS_TOKEN_COOKIE,
        session.access_token.clone(),
        state.sessions.access_ttl_secs(),
    ));
    cookies.add(create_token_cookie(
        &state.config,
        REFRESH_TOKEN_COOKIE,
        session.refresh_token.clone(),
        state.sessions.refresh_ttl_secs(),
    ));
}

/// Expires both token cookies on the client.
pub(crate) fn clear_session_cookies(state: &AppState, cookies: &Cookies) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        cookies.add(create_token_cookie(&state.config, name, String::new(), 0));
    }
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Response> {
    tracing::info!("📝 Signup attempt for: {}", payload.email);
    validate_payload(&payload)?;

    let user = state
        .sessions
        .register(&payload.email, &payload.name, &payload.password)
        .await?;

    tracing::info!("✅ User registered: {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    )
        .into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.email);
    validate_payload(&payload)?;

    let session = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;

    set_session_cookies(&state, &cookies, &session);
    tracing::info!("✅ User logged in: {}", session.user.id);

    let response = AuthResponse {
        id: session.user.id,
        email: session.user.email,
        name: session.user.name,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles refresh-token rotation.
#[axum::debug_handler]
pub async fn refresh(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    tracing::info!("🔄 Token refresh request");

    let refresh_token = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(crate::error::AppError::TokenRefresh)?;

    let session = state.sessions.refresh(&refresh_token).await?;
    set_session_cookies(&state, &cookies, &session);

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Token refreshed successfully")),
    )
        .into_response())
}

/// Handles user logout. Succeeds even when no session exists.
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let refresh_token = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|token| !token.is_empty());

    state.sessions.logout(refresh_token.as_deref()).await?;
    clear_session_cookies(&state, &cookies);

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Logged out successfully")),
    )
        .into_response())
}

/// Revokes every session of the caller.
#[axum::debug_handler]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    cookies: Cookies,
) -> Result<Response> {
    let revoked = state.sessions.logout_everywhere(auth.user_id).await?;
    clear_session_cookies(&state, &cookies);

    let response = RevokedResponse {
        message: "Logged out from all devices".to_string(),
        revoked,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the current user's profile.
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserDto>> {
    let user = state.sessions.current_user(auth.user_id).await?;
    Ok(Json(UserDto::from(&user)))
}

/// Handles changing a user's password.
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response> {
    tracing::info!("🔑 Change password for user: {}", auth.user_id);
    validate_payload(&payload)?;

    state
        .sessions
        .change_password(auth.user_id, &payload.old_password, &payload.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Password changed successfully")),
    )
        .into_response())
}
