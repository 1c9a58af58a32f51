use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use garde::Validate;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    error::Result,
    handlers::auth::{clear_session_cookies, MessageResponse},
    middleware_layer::auth::AuthUser,
    models::user::UserDto,
    services::users,
    state::AppState,
    validation::auth::validate_payload,
};

/// The request payload for a profile update.
#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[garde(length(min = 2, max = 50))]
    pub name: String,
}

/// Returns the caller's profile.
#[axum::debug_handler]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserDto>> {
    let user = state.sessions.current_user(auth.user_id).await?;
    Ok(Json(UserDto::from(&user)))
}

/// Updates the caller's display name.
#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserDto>> {
    validate_payload(&payload)?;

    let user = users::update_profile(&state, auth.user_id, &payload.name).await?;
    Ok(Json(UserDto::from(&user)))
}

/// Deletes the caller's account and ends the current session.
#[axum::debug_handler]
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    cookies: Cookies,
) -> Result<Response> {
    users::delete_account(&state, auth.user_id).await?;
    clear_session_cookies(&state, &cookies);

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Account deleted successfully")),
    )
        .into_response())
}
