//! Verified-identity extraction.
//!
//! Token verification lives in the gateway in front of this service; by the
//! time a request arrives here the JWT has been validated and the identity
//! is forwarded as trusted headers. The core never parses tokens.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use uuid::Uuid;
use worker::Submitter;

/// Header carrying the verified user ID (UUID).
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the verified VIP flag (`true` / `false`).
pub const USER_VIP_HEADER: &str = "x-user-vip";

/// The authenticated caller, extracted from the gateway-injected headers.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: UserId,
    pub is_vip: bool,
}

impl AuthUser {
    /// Converts to the intake's submitter type.
    pub fn submitter(&self) -> Submitter {
        Submitter {
            id: self.id,
            is_vip: self.is_vip,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(UserId::from_uuid)
            .ok_or_else(|| {
                crate::error::ApiError::Unauthorized("Missing or invalid user identity".to_string())
            })?;

        let is_vip = parts
            .headers
            .get(USER_VIP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(AuthUser {
            id: user_id,
            is_vip,
        })
    }
}
