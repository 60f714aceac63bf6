//! Access boundary: who is calling, and whether they may call at all.
//!
//! The middleware asks the configured [`AccessBoundary`] for a [`Caller`],
//! rejects the request before the handler runs when authentication is
//! required and missing, and otherwise hands the caller to the handler
//! through request extensions.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::Config;
use crate::error::ApiError;
use crate::server::AppState;

/// Owner recorded for entries saved without authentication
pub const ANONYMOUS_OWNER: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub authenticated: bool,
    pub owner_id: String,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            owner_id: ANONYMOUS_OWNER.to_string(),
        }
    }

    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            owner_id: owner_id.into(),
        }
    }

    /// Owner to filter reads and deletes by. `None` for anonymous callers,
    /// who see the whole store.
    pub fn scope(&self) -> Option<&str> {
        self.authenticated.then_some(self.owner_id.as_str())
    }
}

pub trait AccessBoundary: Send + Sync {
    /// Identify the caller from request headers
    fn identify(&self, headers: &HeaderMap) -> Caller;

    /// Whether unauthenticated callers are turned away
    fn requires_auth(&self) -> bool;
}

/// Everyone is the anonymous owner; nothing is scoped
#[derive(Debug, Default)]
pub struct OpenAccess;

impl AccessBoundary for OpenAccess {
    fn identify(&self, _headers: &HeaderMap) -> Caller {
        Caller::anonymous()
    }

    fn requires_auth(&self) -> bool {
        false
    }
}

/// Static bearer tokens, each mapped to an owner id
#[derive(Debug)]
pub struct BearerTokenAccess {
    tokens: Vec<(String, String)>,
}

impl BearerTokenAccess {
    pub fn new(tokens: Vec<(String, String)>) -> Self {
        Self { tokens }
    }
}

impl AccessBoundary for BearerTokenAccess {
    fn identify(&self, headers: &HeaderMap) -> Caller {
        let Some(presented) = bearer_token(headers) else {
            return Caller::anonymous();
        };

        self.tokens
            .iter()
            .find(|(token, _)| constant_time_compare(token, presented))
            .map(|(_, owner)| Caller::owner(owner.clone()))
            .unwrap_or_else(Caller::anonymous)
    }

    fn requires_auth(&self) -> bool {
        true
    }
}

/// Pick the boundary the configuration asks for
pub fn boundary_from_config(config: &Config) -> Arc<dyn AccessBoundary> {
    if config.auth_enabled() {
        Arc::new(BearerTokenAccess::new(config.auth_tokens.clone()))
    } else {
        Arc::new(OpenAccess)
    }
}

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware: resolve the caller, short-circuit with 401 when required
pub async fn require_caller(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let caller = state.access.identify(req.headers());

    if state.access.requires_auth() && !caller.authenticated {
        warn!("Rejected unauthenticated request to {}", req.uri().path());
        return ApiError::Unauthorized.into_response();
    }

    req.extensions_mut().insert(caller);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(value).expect("valid header"),
        );
        headers
    }

    fn token_boundary() -> BearerTokenAccess {
        BearerTokenAccess::new(vec![
            ("alice-token".to_string(), "alice".to_string()),
            ("bob-token".to_string(), "bob".to_string()),
        ])
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret123", "secret123"));
        assert!(!constant_time_compare("secret123", "secret124"));
        assert!(!constant_time_compare("secret123", "secret12"));
        assert!(!constant_time_compare("", "secret"));
    }

    #[test]
    fn test_caller_scope() {
        assert_eq!(Caller::anonymous().scope(), None);
        assert_eq!(Caller::owner("alice").scope(), Some("alice"));
    }

    #[test]
    fn test_open_access_is_anonymous() {
        let caller = OpenAccess.identify(&headers_with("Bearer whatever"));
        assert_eq!(caller, Caller::anonymous());
        assert!(!OpenAccess.requires_auth());
    }

    #[test]
    fn test_bearer_token_maps_owner() {
        let boundary = token_boundary();

        assert_eq!(
            boundary.identify(&headers_with("Bearer bob-token")),
            Caller::owner("bob")
        );
        assert!(boundary.requires_auth());
    }

    #[test]
    fn test_bearer_token_unknown_or_missing() {
        let boundary = token_boundary();

        assert!(!boundary.identify(&headers_with("Bearer nope")).authenticated);
        assert!(!boundary.identify(&headers_with("alice-token")).authenticated);
        assert!(!boundary.identify(&headers_with("Bearer ")).authenticated);
        assert!(!boundary.identify(&HeaderMap::new()).authenticated);
    }
}
