use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// The acting user. Authentication happens upstream; the identity proxy
/// forwards the verified subject in the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let user_id = header.parse::<Uuid>().map_err(|_| AppError::Unauthorized)?;
        Ok(CurrentUser(user_id))
    }
}
