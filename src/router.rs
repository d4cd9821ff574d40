use crate::auth::AuthService;
use crate::handlers;
use crate::middleware::CorsPolicy;
use crate::middleware::cors;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;

/// Shared state for the HTTP surface: the auth service, the private cookie
/// key, and the cookie/CORS policy knobs from configuration.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub cookie_secure: bool,
    pub cors: CorsPolicy,
    key: Key,
}

impl AppState {
    pub fn new(auth: AuthService, key: Key, cookie_secure: bool, cors: CorsPolicy) -> Self {
        Self {
            auth,
            cookie_secure,
            cors,
            key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.key.clone()
    }
}

/// Build the application router: liveness endpoint, the auth route group
/// under its fixed prefix, and CORS enforcement around everything.
pub fn app_router(state: AppState) -> Router {
    let cors_layer = cors::cors_layer(&state.cors);

    let auth_routes = Router::new()
        .route("/sign-up/email", post(handlers::auth::sign_up_email))
        .route("/sign-in/email", post(handlers::auth::sign_in_email))
        .route("/sign-out", post(handlers::auth::sign_out))
        .route("/get-session", get(handlers::auth::get_session));

    // Origin enforcement sits outside the CORS layer so a disallowed
    // origin gets its 403 even on preflights, which tower-http otherwise
    // answers itself.
    Router::new()
        .route("/api/health", get(handlers::health::health))
        .nest("/api/auth", auth_routes)
        .layer(cors_layer)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            cors::enforce_origin,
        ))
        .with_state(state)
}
