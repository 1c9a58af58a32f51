use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sonic_rs::JsonValueTrait;

use crate::{error::AppError, state::AppState, validation::auth::normalize_email};

/// Largest login body the throttle is willing to buffer.
const MAX_LOGIN_BODY_BYTES: usize = 16 * 1024;

fn extract_email_from_body(body_bytes: &[u8]) -> Option<String> {
    sonic_rs::from_slice::<sonic_rs::Value>(body_bytes)
        .ok()?
        .get("email")
        .and_then(|v| v.as_str())
        .map(normalize_email)
}

/// A middleware that rate limits failed login attempts per email.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The login response, or `RateLimitExceeded` while the email is locked out.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_LOGIN_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Validation("Request body too large".to_string()).into_response();
        }
    };

    let Some(email) = extract_email_from_body(&body_bytes) else {
        // Let the handler produce the proper rejection for malformed input.
        return next.run(Request::from_parts(parts, Body::from(body_bytes))).await;
    };

    let key = format!("rate_limit:login:{}", email);
    let max_attempts = state.config.login_max_attempts;

    match state.login_attempts.attempts(&key).await {
        Ok(Some((attempts, ttl))) if attempts >= max_attempts => {
            return AppError::RateLimitExceeded(format!(
                "Too many failed login attempts. Try again in {} minutes",
                ttl.div_ceil(60)
            ))
            .into_response();
        }
        Ok(_) => {}
        Err(e) => return e.into_response(),
    }

    let response = next.run(Request::from_parts(parts, Body::from(body_bytes))).await;

    let outcome = if response.status() == StatusCode::UNAUTHORIZED {
        state
            .login_attempts
            .record_failure(&key, state.config.login_lockout_secs)
            .await
    } else if response.status().is_success() {
        state.login_attempts.reset(&key).await
    } else {
        Ok(())
    };

    if let Err(e) = outcome {
        tracing::error!("❌ Failed to update login attempts for {}: {}", email, e);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_read_and_normalized() {
        let body = br#"{"email":" Alice@X.com ","password":"secret1"}"#;
        assert_eq!(extract_email_from_body(body).as_deref(), Some("alice@x.com"));
    }

    #[test]
    fn missing_or_invalid_email_yields_none() {
        assert_eq!(extract_email_from_body(br#"{"password":"x"}"#), None);
        assert_eq!(extract_email_from_body(br#"{"email":42}"#), None);
        assert_eq!(extract_email_from_body(b"not json"), None);
    }
}
