use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::state::AppState;
use crate::validation::auth::validate_display_name;

/// Changes the display name of a user.
///
/// The next access token minted by a refresh carries the new name.
pub async fn update_profile(state: &AppState, user_id: Uuid, name: &str) -> Result<User> {
    let name = name.trim();
    validate_display_name(name)?;

    let user = state
        .users
        .update_name(user_id, name)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!("✅ Profile updated for user: {}", user_id);
    Ok(user)
}

/// Deletes an account after revoking all of its refresh tokens.
///
/// Access tokens already issued stay verifiable until they expire, but they
/// resolve to `NotFound` from then on.
pub async fn delete_account(state: &AppState, user_id: Uuid) -> Result<()> {
    tracing::info!("🗑️ Deleting account: {}", user_id);

    state.sessions.logout_everywhere(user_id).await?;

    if !state.users.delete(user_id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!("✅ Account deleted: {}", user_id);
    Ok(())
}
