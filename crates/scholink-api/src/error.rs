//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::QueryRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request body was well-formed HTTP but failed payload validation.
  #[error("unprocessable payload: {message}")]
  Unprocessable { path: Option<String>, message: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Store(Box::new(e))
  }
}

impl From<scholink_scholix::Error> for ApiError {
  fn from(e: scholink_scholix::Error) -> Self {
    let path = e.path().map(str::to_owned);
    let message = match &e {
      scholink_scholix::Error::Invalid { message, .. } => message.clone(),
      other => other.to_string(),
    };
    ApiError::Unprocessable { path, message }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"scholink\""),
        );
        res
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response(),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Unprocessable { path, message } => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message, "path": path })),
      )
        .into_response(),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure while serving request");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
      }
    }
  }
}
