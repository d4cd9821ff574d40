use crate::auth::session_cache::SessionCacheHandle;
use crate::auth::{password, token};
use crate::db::{AuthStorage, DbAccount, DbSession, DbUser};
use crate::error::AppError;

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use validator::ValidateEmail;

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

/// Provider id for email/password accounts.
const CREDENTIAL_PROVIDER: &str = "credential";

/// A resolved session together with its user, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub session: DbSession,
    pub user: DbUser,
}

/// Request metadata recorded on the session row.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Email/password authentication over `AuthStorage`, with a read-through
/// session cache in front of the sessions table.
#[derive(Clone)]
pub struct AuthService {
    storage: AuthStorage,
    cache: SessionCacheHandle,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(storage: AuthStorage, cache: SessionCacheHandle, session_ttl: Duration) -> Self {
        Self {
            storage,
            cache,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Register a new user with an email/password credential and open a
    /// session for them.
    pub async fn sign_up_email(
        &self,
        name: &str,
        email: &str,
        plain_password: &str,
        meta: ClientMeta,
    ) -> Result<SessionData, AppError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(plain_password)?;

        if self.storage.user_by_email(&email).await?.is_some() {
            return Err(AppError::UserAlreadyExists);
        }

        let hash = password::hash_password(plain_password)?;
        let now = Utc::now();
        let user = DbUser {
            id: token::generate_id(),
            name: name.trim().to_string(),
            email: email.clone(),
            email_verified: false,
            image: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.create_user(&user).await?;

        let account = DbAccount {
            id: token::generate_id(),
            user_id: user.id.clone(),
            provider_id: CREDENTIAL_PROVIDER.to_string(),
            account_id: user.id.clone(),
            password: Some(hash),
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_account(&account).await?;

        info!(user_id = %user.id, "user signed up");
        self.open_session(user, meta).await
    }

    /// Verify an email/password pair and open a session. Unknown emails and
    /// wrong passwords are indistinguishable to the caller.
    pub async fn sign_in_email(
        &self,
        email: &str,
        plain_password: &str,
        meta: ClientMeta,
    ) -> Result<SessionData, AppError> {
        let email = normalize_email(email);

        let Some(user) = self.storage.user_by_email(&email).await? else {
            return Err(AppError::InvalidCredentials);
        };
        let Some(account) = self.storage.credential_account(&user.id).await? else {
            return Err(AppError::InvalidCredentials);
        };
        let Some(stored_hash) = account.password.as_deref() else {
            return Err(AppError::InvalidCredentials);
        };
        if !password::verify_password(plain_password, stored_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        info!(user_id = %user.id, "user signed in");
        self.open_session(user, meta).await
    }

    /// Resolve a bearer token, cache first. Expired sessions are removed and
    /// report as absent; sessions past half their lifetime get their expiry
    /// slid forward.
    pub async fn get_session(&self, session_token: &str) -> Result<Option<SessionData>, AppError> {
        if session_token.is_empty() {
            return Ok(None);
        }

        if let Some(cached) = self.cache.get(session_token).await? {
            debug!(session_id = %cached.session.id, "session cache hit");
            return Ok(Some(cached));
        }

        let Some((mut session, user)) = self.storage.session_with_user(session_token).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.expires_at <= now {
            self.storage.delete_session(session_token).await?;
            self.cache.invalidate(session_token).await;
            debug!(session_id = %session.id, "expired session removed");
            return Ok(None);
        }

        let ttl = ChronoDuration::seconds(self.session_ttl.as_secs() as i64);
        if session.expires_at - now < ttl / 2 {
            session.expires_at = now + ttl;
            session.updated_at = now;
            self.storage
                .touch_session(&session.id, session.expires_at, now)
                .await?;
            debug!(session_id = %session.id, "session expiry refreshed");
        }

        let data = SessionData { session, user };
        self.cache.put(session_token, data.clone()).await;
        Ok(Some(data))
    }

    /// Invalidate a session everywhere. Unknown tokens are a no-op.
    pub async fn sign_out(&self, session_token: &str) -> Result<(), AppError> {
        self.storage.delete_session(session_token).await?;
        self.cache.invalidate(session_token).await;
        Ok(())
    }

    async fn open_session(&self, user: DbUser, meta: ClientMeta) -> Result<SessionData, AppError> {
        let now = Utc::now();
        let ttl = ChronoDuration::seconds(self.session_ttl.as_secs() as i64);
        let session = DbSession {
            id: token::generate_id(),
            user_id: user.id.clone(),
            token: token::generate_session_token(),
            expires_at: now + ttl,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_session(&session).await?;

        let data = SessionData { session, user };
        self.cache.put(data.session.token.clone(), data.clone()).await;
        Ok(data)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

// validator treats an empty string as valid (emptiness is a `required`
// concern there), so guard it explicitly.
fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() || !email.validate_email() {
        return Err(AppError::InvalidEmail);
    }
    Ok(())
}

fn validate_password(plain: &str) -> Result<(), AppError> {
    if plain.len() < PASSWORD_MIN || plain.len() > PASSWORD_MAX {
        return Err(AppError::InvalidPasswordLength {
            min: PASSWORD_MIN,
            max: PASSWORD_MAX,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user+tag@sub.example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user name@example.com").is_err());
        // empty domain labels
        assert!(validate_email("user@.c").is_err());
        assert!(validate_email("a@b..c").is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password(&"x".repeat(128)).is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn email_normalization_lowercases_and_trims() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }
}
