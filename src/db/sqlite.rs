use crate::db::models::{DbAccount, DbSession, DbUser};
use crate::db::schema::SQLITE_INIT;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

/// Open the pool and run the bundled DDL. On schema failure the partially
/// opened pool is closed before the error is returned.
pub async fn connect(database_url: &str) -> Result<AuthStorage, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)
        .map_err(AppError::Database)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    let storage = AuthStorage::new(pool);
    if let Err(e) = storage.init_schema().await {
        storage.pool().close().await;
        return Err(e);
    }
    Ok(storage)
}

#[derive(Clone)]
pub struct AuthStorage {
    pool: SqlitePool,
}

impl AuthStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), AppError> {
        // execute statement by statement (sqlx::query rejects multi-commands)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn create_user(&self, user: &DbUser) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, email_verified, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(if user.email_verified { 1 } else { 0 })
        .bind(&user.image)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<DbUser>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, name, email, email_verified, image, created_at, updated_at
               FROM users WHERE email = ?"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn insert_account(&self, account: &DbAccount) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, provider_id, account_id, password, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.provider_id)
        .bind(&account.account_id)
        .bind(&account.password)
        .bind(account.created_at.to_rfc3339())
        .bind(account.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The email/password account for a user, if one exists.
    pub async fn credential_account(&self, user_id: &str) -> Result<Option<DbAccount>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, provider_id, account_id, password, created_at, updated_at
               FROM accounts WHERE user_id = ? AND provider_id = 'credential'"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_account).transpose()
    }

    pub async fn insert_session(&self, session: &DbSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token, expires_at, ip_address, user_agent, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.token)
        .bind(session.expires_at.to_rfc3339())
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Session row joined with its user, looked up by bearer token.
    pub async fn session_with_user(
        &self,
        token: &str,
    ) -> Result<Option<(DbSession, DbUser)>, AppError> {
        let row = sqlx::query(
            r#"SELECT s.id, s.user_id, s.token, s.expires_at, s.ip_address, s.user_agent,
                      s.created_at, s.updated_at,
                      u.id AS u_id, u.name AS u_name, u.email AS u_email,
                      u.email_verified AS u_email_verified, u.image AS u_image,
                      u.created_at AS u_created_at, u.updated_at AS u_updated_at
               FROM sessions s
               JOIN users u ON u.id = s.user_id
               WHERE s.token = ?"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<(DbSession, DbUser), AppError> {
            let session = DbSession {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                token: row.try_get("token")?,
                expires_at: Self::parse_ts(row.try_get("expires_at")?)?,
                ip_address: row.try_get("ip_address")?,
                user_agent: row.try_get("user_agent")?,
                created_at: Self::parse_ts(row.try_get("created_at")?)?,
                updated_at: Self::parse_ts(row.try_get("updated_at")?)?,
            };
            let user = DbUser {
                id: row.try_get("u_id")?,
                name: row.try_get("u_name")?,
                email: row.try_get("u_email")?,
                email_verified: row.try_get::<i64, _>("u_email_verified")? != 0,
                image: row.try_get("u_image")?,
                created_at: Self::parse_ts(row.try_get("u_created_at")?)?,
                updated_at: Self::parse_ts(row.try_get("u_updated_at")?)?,
            };
            Ok((session, user))
        })
        .transpose()
    }

    /// Slide a session's expiry forward.
    pub async fn touch_session(
        &self,
        id: &str,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET expires_at = ?, updated_at = ? WHERE id = ?")
            .bind(expires_at.to_rfc3339())
            .bind(updated_at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every session that expired before `now`. Returns the count.
    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn row_to_user(row: SqliteRow) -> Result<DbUser, AppError> {
        Ok(DbUser {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            email_verified: row.try_get::<i64, _>("email_verified")? != 0,
            image: row.try_get("image")?,
            created_at: Self::parse_ts(row.try_get("created_at")?)?,
            updated_at: Self::parse_ts(row.try_get("updated_at")?)?,
        })
    }

    fn row_to_account(row: SqliteRow) -> Result<DbAccount, AppError> {
        Ok(DbAccount {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            provider_id: row.try_get("provider_id")?,
            account_id: row.try_get("account_id")?,
            password: row.try_get("password")?,
            created_at: Self::parse_ts(row.try_get("created_at")?)?,
            updated_at: Self::parse_ts(row.try_get("updated_at")?)?,
        })
    }

    fn parse_ts(raw: String) -> Result<DateTime<Utc>, AppError> {
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);
        Ok(parsed)
    }
}
