//! Request identity checks.
//!
//! Authentication policy lives upstream. This module only checks the
//! ingestion `Origin` against the configured allowlist and extracts the
//! acting user from the `x-user-id` header for CRM mutations.

use crate::api::errors::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const ACTOR_HEADER: &str = "x-user-id";

/// Whether an ingestion request's `Origin` is on the allowlist.
///
/// An empty allowlist accepts everything, as does a request without an
/// `Origin` header (server-to-server calls). A listed host also admits its
/// subdomains.
pub fn validate_origin(origin: Option<&str>, allowed_origins: &[String]) -> bool {
    if allowed_origins.is_empty() {
        return true;
    }

    origin.is_none_or(|origin| {
        let host = origin
            .strip_prefix("https://")
            .or_else(|| origin.strip_prefix("http://"))
            .unwrap_or(origin);
        let host = host.split(['/', ':']).next().unwrap_or(host);
        allowed_origins.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    })
}

/// The user performing a CRM mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_validate_origin_no_restrictions() {
        assert!(validate_origin(Some("https://anything.com"), &[]));
    }

    #[test]
    fn test_validate_origin_allowed() {
        let sites = vec!["example.com".to_string()];
        assert!(validate_origin(Some("https://example.com"), &sites));
        assert!(validate_origin(Some("http://example.com:8080"), &sites));
        assert!(validate_origin(Some("https://www.example.com"), &sites));
    }

    #[test]
    fn test_validate_origin_not_allowed() {
        let sites = vec!["example.com".to_string()];
        assert!(!validate_origin(Some("https://evil.com"), &sites));
        assert!(!validate_origin(Some("https://example.com.evil.com"), &sites));
        assert!(!validate_origin(Some("https://notexample.com"), &sites));
    }

    #[test]
    fn test_validate_origin_no_header() {
        let sites = vec!["example.com".to_string()];
        assert!(validate_origin(None, &sites));
    }

    async fn actor_from(header: Option<&str>) -> Result<Actor, ApiError> {
        let mut builder = Request::builder().uri("/api/leads");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_extracted() {
        assert_eq!(
            actor_from(Some(" manager-7 ")).await.unwrap(),
            Actor("manager-7".to_string())
        );
    }

    #[tokio::test]
    async fn test_actor_missing_or_blank() {
        assert!(matches!(actor_from(None).await, Err(ApiError::Unauthorized)));
        assert!(matches!(actor_from(Some("  ")).await, Err(ApiError::Unauthorized)));
    }
}
