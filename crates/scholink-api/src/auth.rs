//! HTTP Basic-auth extractor guarding the write and status endpoints.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use scholink_core::{graph::GraphStore, index::SearchIndex};

use crate::{AppState, error::ApiError};

/// Credentials accepted for event submission.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Present in a handler's arguments when the request carried valid
/// credentials. Holds the authenticated username.
pub struct Authenticated(pub String);

/// Check the `Authorization` header against `config`, returning the
/// username on success.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, ApiError> {
  let encoded = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(username.to_owned())
}

impl<G, I> FromRequestParts<AppState<G, I>> for Authenticated
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<G, I>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(Authenticated)
  }
}
