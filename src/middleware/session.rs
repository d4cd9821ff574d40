use crate::auth::SessionData;
use crate::error::AppError;
use crate::handlers::auth::SESSION_COOKIE;
use crate::router::AppState;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};

/// Extractor for routes that demand an authenticated caller. Resolves the
/// session cookie through the auth service and rejects with the standard
/// 401 envelope otherwise.
#[derive(Debug, Clone)]
pub struct RequireSession(pub SessionData);

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = match PrivateCookieJar::<Key>::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(err) => match err {},
        };

        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
            return Err(AppError::Unauthorized.into_response());
        };

        match state.auth.get_session(&token).await {
            Ok(Some(data)) => Ok(Self(data)),
            Ok(None) => Err(AppError::Unauthorized.into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}
