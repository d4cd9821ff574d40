use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Development-only cookie secret. Rejected when ENVIRONMENT=production.
const DEV_SECRET: &str = "authgate-development-secret-change-me-before-deploying";

/// Runtime configuration, sourced from the environment.
///
/// Plain variable names (`DATABASE_URL`, `AUTH_SECRET`, `AUTH_BASE_URL`,
/// `PORT`, `ENVIRONMENT`, `LOGLEVEL`) are honored directly; every field can
/// also be set with an `AUTHGATE_` prefix (e.g. `AUTHGATE_CORS_ORIGINS`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub auth_secret: String,
    pub auth_base_url: Url,
    pub port: u16,
    pub environment: String,
    /// Comma-separated CORS allow-list. Empty means "base URL origin only".
    pub cors_origins: String,
    pub loglevel: String,
    pub session_ttl_secs: u64,
    pub session_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:authgate.sqlite".to_string(),
            auth_secret: DEV_SECRET.to_string(),
            auth_base_url: Url::parse("http://localhost:3000")
                .expect("default base url must parse"),
            port: 3000,
            environment: "development".to_string(),
            cors_origins: String::new(),
            loglevel: "info".to_string(),
            session_ttl_secs: 7 * 24 * 60 * 60,
            session_cache_ttl_secs: 5 * 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, figment::Error> {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(&[
                "DATABASE_URL",
                "AUTH_SECRET",
                "AUTH_BASE_URL",
                "PORT",
                "ENVIRONMENT",
                "LOGLEVEL",
            ]))
            .merge(Env::prefixed("AUTHGATE_"))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), figment::Error> {
        if self.auth_secret.len() < 32 {
            return Err(figment::Error::from(
                "AUTH_SECRET must be at least 32 bytes".to_string(),
            ));
        }
        if self.is_production() && self.auth_secret == DEV_SECRET {
            return Err(figment::Error::from(
                "AUTH_SECRET must be set explicitly when ENVIRONMENT=production".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// CORS allow-list: the configured comma-separated origins, or the base
    /// URL origin when none are configured.
    pub fn origins(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if configured.is_empty() {
            vec![self.auth_base_url.origin().ascii_serialization()]
        } else {
            configured
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.session_cache_ttl_secs)
    }
}

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| match Config::load() {
    Ok(cfg) => cfg,
    Err(e) => panic!("invalid configuration: {e}"),
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_in_development() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.port, 3000);
        assert!(!cfg.is_production());
        assert_eq!(cfg.origins(), vec!["http://localhost:3000".to_string()]);
    }

    #[test]
    fn dev_secret_rejected_in_production() {
        let mut cfg = Config::default();
        cfg.environment = "production".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn short_secret_rejected() {
        let mut cfg = Config::default();
        cfg.auth_secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn origins_split_and_trimmed() {
        let mut cfg = Config::default();
        cfg.cors_origins = "http://localhost:5173, https://app.example.com".to_string();
        assert_eq!(
            cfg.origins(),
            vec![
                "http://localhost:5173".to_string(),
                "https://app.example.com".to_string()
            ]
        );
    }
}
