use axum::{extract::FromRequestParts, http::request::Parts};
use services::services::principal::{Principal, Role};

use crate::error::ApiError;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// Caller identity, as forwarded by the authenticating proxy.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, PRINCIPAL_ID_HEADER)?;
        let role = header(parts, PRINCIPAL_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
        Ok(Caller(Principal::new(id, role)))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new().route(
            "/whoami",
            get(|Caller(principal): Caller| async move {
                format!("{}:{}", principal.id, principal.role)
            }),
        )
    }

    #[tokio::test]
    async fn headers_become_a_principal() {
        let request = Request::builder()
            .uri("/whoami")
            .header(PRINCIPAL_ID_HEADER, "ada")
            .header(PRINCIPAL_ROLE_HEADER, "speaker")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ada:speaker");
    }

    #[tokio::test]
    async fn missing_or_unknown_identity_is_unauthorized() {
        let anonymous = Request::builder()
            .uri("/whoami")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            app().oneshot(anonymous).await.unwrap().status(),
            StatusCode::UNAUTHORIZED
        );

        let unknown_role = Request::builder()
            .uri("/whoami")
            .header(PRINCIPAL_ID_HEADER, "ada")
            .header(PRINCIPAL_ROLE_HEADER, "root")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            app().oneshot(unknown_role).await.unwrap().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
