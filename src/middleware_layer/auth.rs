use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    crypto::jwt::TokenError,
    error::AppError,
    handlers::auth::ACCESS_TOKEN_COOKIE,
    state::AppState,
};

/// The verified identity of the caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

/// A middleware that requires a valid access token cookie.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or `AppError::Unauthenticated`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = cookies
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| {
            tracing::debug!("❌ No access token cookie found");
            AppError::Unauthenticated
        })?;

    let identity = state
        .sessions
        .signer()
        .verify_access_token(&token)
        .map_err(|e| {
            match e {
                TokenError::Expired => tracing::debug!("❌ Access token rejected: {}", e),
                TokenError::InvalidSignature | TokenError::Malformed => {
                    tracing::warn!("❌ Access token rejected: {}", e)
                }
            }
            AppError::Unauthenticated
        })?;

    tracing::debug!("✅ User authenticated: {}", identity.user_id);

    request.extensions_mut().insert(AuthUser {
        user_id: identity.user_id,
        email: identity.email,
        display_name: identity.display_name,
    });

    Ok(next.run(request).await)
}
