//! Caller identification.
//!
//! Requests identify their user with `Authorization: Bearer <uuid>` or an
//! `x-user-id` header. Verification of the token against an identity
//! provider is out of scope here; the extractor only requires a
//! well-formed user id.

use axum::{
    Json,
    extract::FromRequestParts,
    response::{IntoResponse, Response},
};
use http::{StatusCode, header, request::Parts};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,

    #[error("user id is not a valid UUID")]
    Invalid,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": "unauthorized", "message": self.to_string() }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = bearer_token(parts)
            .or_else(|| header_value(parts, "x-user-id"))
            .ok_or(AuthError::Missing)?;

        Uuid::parse_str(raw.trim())
            .map(UserId)
            .map_err(|_| AuthError::Invalid)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    header_value(parts, header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<UserId, AuthError> {
        let (mut parts, _) = request.into_parts();
        UserId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn accepts_bearer_uuid() {
        let user = Uuid::new_v4();
        let request = Request::builder()
            .header("authorization", format!("Bearer {}", user))
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), UserId(user));
    }

    #[tokio::test]
    async fn accepts_user_id_header() {
        let user = Uuid::new_v4();
        let request = Request::builder()
            .header("x-user-id", user.to_string())
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), UserId(user));
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AuthError::Missing)));

        let request = Request::builder()
            .header("x-user-id", "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(AuthError::Invalid)));
    }
}
