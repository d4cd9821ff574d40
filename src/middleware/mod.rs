pub mod cors;
pub mod session;

pub use cors::CorsPolicy;
pub use session::RequireSession;
