use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::ApiError;

// =============================================================================
// Authorization
// =============================================================================

/// The authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub groups: Vec<String>,
}

impl Principal {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Resolves bearer tokens to principals and checks group membership.
#[derive(Debug, Default)]
pub struct Authorizer {
    enabled: bool,
    required_group: String,
    tokens: HashMap<String, Principal>,
}

impl Authorizer {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        let tokens = cfg
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Principal {
                        subject: t.subject.clone(),
                        groups: t.groups.clone(),
                    },
                )
            })
            .collect();
        Self {
            enabled: cfg.enabled,
            required_group: cfg.required_group.clone(),
            tokens,
        }
    }

    /// Admits the caller or explains why not.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<Principal, ApiError> {
        if !self.enabled {
            return Ok(Principal {
                subject: "anonymous".into(),
                groups: vec![self.required_group.clone()],
            });
        }

        let token = match authorization.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(t) if !t.is_empty() => t,
            Some(_) | None => {
                return Err(ApiError::Unauthorized("Authentication required".into()));
            }
        };

        let principal = self
            .tokens
            .get(token)
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".into()))?;

        if !principal.in_group(&self.required_group) {
            return Err(ApiError::Forbidden(format!(
                "{} group required",
                capitalize(&self.required_group)
            )));
        }
        Ok(principal.clone())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Requires a bearer token whose principal is in the configured group.
///
/// OPTIONS requests pass through unauthenticated.
pub async fn require_group(
    State(authorizer): State<Arc<Authorizer>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match authorizer.authorize(header) {
        Ok(principal) => {
            tracing::debug!(subject = %principal.subject, "Caller authorized");
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "Caller rejected");
            e.into_response()
        }
    }
}

// =============================================================================
// Request IDs
// =============================================================================

pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;

    fn authorizer() -> Authorizer {
        Authorizer::from_config(&AuthConfig {
            enabled: true,
            required_group: "admin".into(),
            tokens: vec![
                TokenConfig {
                    token: "admin-token".into(),
                    subject: "ops".into(),
                    groups: vec!["admin".into(), "staff".into()],
                },
                TokenConfig {
                    token: "user-token".into(),
                    subject: "viewer".into(),
                    groups: vec!["staff".into()],
                },
            ],
        })
    }

    #[test]
    fn test_admin_token_is_admitted() {
        let principal = authorizer().authorize(Some("Bearer admin-token")).unwrap();
        assert_eq!(principal.subject, "ops");
    }

    #[test]
    fn test_missing_or_unknown_token_is_unauthorized() {
        let auth = authorizer();
        assert!(matches!(auth.authorize(None), Err(ApiError::Unauthorized(_))));
        assert!(matches!(
            auth.authorize(Some("Bearer ")),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.authorize(Some("Basic abc")),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.authorize(Some("Bearer nope")),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_group_is_forbidden() {
        let err = authorizer().authorize(Some("Bearer user-token")).unwrap_err();
        assert_eq!(err.to_string(), "Admin group required");
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_disabled_auth_admits_everyone() {
        let auth = Authorizer::from_config(&AuthConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(auth.authorize(None).is_ok());
    }
}
