use crate::auth::{ClientMeta, SessionData};
use crate::error::AppError;
use crate::middleware::RequireSession;
use crate::router::AppState;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::Deserialize;
use serde_json::{Value, json};
use time::Duration;
use tracing::info;

pub const SESSION_COOKIE: &str = "authgate.session_token";

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/sign-up/email -> creates the user and opens a session.
pub async fn sign_up_email(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
    Json(body): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .auth
        .sign_up_email(&body.name, &body.email, &body.password, client_meta(&headers))
        .await?;
    Ok(respond_with_session(&state, jar, data))
}

/// POST /api/auth/sign-in/email -> verifies credentials and opens a session.
pub async fn sign_in_email(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
    Json(body): Json<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .auth
        .sign_in_email(&body.email, &body.password, client_meta(&headers))
        .await?;
    Ok(respond_with_session(&state, jar, data))
}

/// GET /api/auth/get-session -> the caller's session and user, or JSON null.
pub async fn get_session(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .unwrap_or_default();
    let data = state.auth.get_session(&token).await?;
    Ok(Json(data))
}

/// POST /api/auth/sign-out -> invalidates the caller's session and clears
/// the cookie. Requires an authenticated caller.
pub async fn sign_out(
    State(state): State<AppState>,
    RequireSession(data): RequireSession,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.auth.sign_out(&data.session.token).await?;
    info!(session_id = %data.session.id, "session signed out");
    let jar = jar.remove(clear_session_cookie(state.cookie_secure));
    Ok((jar, Json(json!({ "success": true }))))
}

fn respond_with_session(
    state: &AppState,
    jar: PrivateCookieJar,
    data: SessionData,
) -> (PrivateCookieJar, Json<Value>) {
    let max_age = Duration::seconds(state.auth.session_ttl().as_secs() as i64);
    let jar = jar.add(session_cookie(
        data.session.token.clone(),
        max_age,
        state.cookie_secure,
    ));
    let body = json!({
        "token": data.session.token,
        "user": data.user,
    });
    (jar, Json(body))
}

fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ClientMeta {
        ip_address,
        user_agent,
    }
}

fn session_cookie(token: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE.to_string(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}
