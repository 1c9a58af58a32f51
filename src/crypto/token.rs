use rand::RngCore;
use rand::rngs::OsRng;
use base64::{Engine as _, engine::general_purpose};

/// The size of an opaque refresh token in bytes.
pub const REFRESH_TOKEN_SIZE: usize = 32;

/// Generates a new random refresh token.
///
/// # Returns
///
/// A URL-safe base64-encoded token carrying 256 bits of OS randomness.
pub fn generate_refresh_token() -> String {
    let mut token = [0u8; REFRESH_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);

    general_purpose::URL_SAFE_NO_PAD.encode(token)
}
