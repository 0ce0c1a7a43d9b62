//! Request identity extraction.
//!
//! Token issuance and validation live in the authentication collaborator;
//! by the time a request reaches the gateway its user identity is carried
//! in the `x-user-id` header. The extractor rejects requests without one.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::GatewayError;

/// Header carrying the pre-validated user identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(GatewayError::Unauthorized)?;
        Ok(Self(UserId::from(user_id)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<CurrentUser, GatewayError> {
        let (mut parts, ()) = request.into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_user_from_header() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "u1")
            .body(())
            .ok();
        let Some(request) = request else {
            panic!("request build failed");
        };
        let extracted = extract(request).await;
        let Ok(CurrentUser(user_id)) = extracted else {
            panic!("expected an identity");
        };
        assert_eq!(user_id, UserId::from("u1"));
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let request = Request::builder().body(()).ok();
        let Some(request) = request else {
            panic!("request build failed");
        };
        let extracted = extract(request).await;
        assert!(matches!(extracted, Err(GatewayError::Unauthorized)));
    }

    #[tokio::test]
    async fn blank_header_is_rejected() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "   ")
            .body(())
            .ok();
        let Some(request) = request else {
            panic!("request build failed");
        };
        let extracted = extract(request).await;
        assert!(matches!(extracted, Err(GatewayError::Unauthorized)));
    }
}
