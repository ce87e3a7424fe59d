//! Caller identity taken from request headers.
//!
//! Authentication happens in front of this service; it forwards the
//! authenticated user's id and role as `x-user-id` and `x-user-role`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Role, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    /// Rejects callers whose role is not `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "This action requires the {} role",
                role.as_str()
            )))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<UserId>()
            .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER}: {e}")))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ROLE_HEADER}: {e}")))?;

        Ok(Caller { user_id, role })
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {name} header")))
}
