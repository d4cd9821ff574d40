use crate::error::AppError;
use crate::router::AppState;

use axum::extract::{Request, State};
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Exact-match origin allow-list. `*` admits any origin; matching ignores
/// case and a trailing slash.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Arc<Vec<String>>,
    allow_any: bool,
}

impl CorsPolicy {
    pub fn new(origins: Vec<String>) -> Self {
        let allow_any = origins.iter().any(|o| o == "*");
        let origins = origins
            .into_iter()
            .filter(|o| o != "*")
            .map(|o| normalize(&o))
            .collect();
        Self {
            origins: Arc::new(origins),
            allow_any,
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.allow_any {
            return true;
        }
        let origin = normalize(origin);
        self.origins.iter().any(|o| *o == origin)
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Response-header side of CORS: echoes allowed origins and answers
/// preflight. Disallowed origins simply get no grant here; the hard
/// rejection happens in [`enforce_origin`].
pub fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let policy = policy.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin.to_str().map(|o| policy.is_allowed(o)).unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Reject any request carrying a disallowed `Origin` header with a 403
/// error body instead of silently serving it without CORS headers.
pub async fn enforce_origin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN).and_then(|v| v.to_str().ok())
        && !state.cors.is_allowed(origin)
    {
        return AppError::OriginRejected(origin.to_string()).into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_origins_match_case_insensitively() {
        let policy = CorsPolicy::new(vec!["http://localhost:5173".to_string()]);
        assert!(policy.is_allowed("http://localhost:5173"));
        assert!(policy.is_allowed("HTTP://LOCALHOST:5173"));
        assert!(policy.is_allowed("http://localhost:5173/"));
        assert!(!policy.is_allowed("http://localhost:5174"));
        assert!(!policy.is_allowed("https://localhost:5173"));
    }

    #[test]
    fn wildcard_admits_everything() {
        let policy = CorsPolicy::new(vec!["*".to_string()]);
        assert!(policy.is_allowed("https://anything.example"));
    }

    #[test]
    fn empty_list_admits_nothing() {
        let policy = CorsPolicy::new(Vec::new());
        assert!(!policy.is_allowed("http://localhost:3000"));
    }
}
