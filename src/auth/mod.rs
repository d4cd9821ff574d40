//! Email/password authentication: hashing, tokens, the session cache actor,
//! and the service tying them to storage.

pub mod password;
pub mod service;
pub mod session_cache;
pub mod token;

pub use service::{AuthService, ClientMeta, SessionData};
pub use session_cache::SessionCacheHandle;
