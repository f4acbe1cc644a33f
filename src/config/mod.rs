//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `NEOCARE` prefix and
//! `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use neocare::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod email;
mod error;
mod retry;
mod server;
mod store;

pub use auth::AuthConfig;
pub use email::EmailConfig;
pub use error::{ConfigError, ValidationError};
pub use retry::RetryConfig;
pub use server::{Environment, ServerConfig};
pub use store::StoreConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer-token validation
    pub auth: AuthConfig,

    /// Notification email (Resend)
    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `NEOCARE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `NEOCARE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `NEOCARE__AUTH__JWT_SECRET=...` -> `auth.jwt_secret = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("NEOCARE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.email.validate()?;
        self.store.validate()?;
        self.retry.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("NEOCARE__AUTH__JWT_SECRET", "test-secret-at-least-32-bytes-long!!");
    }

    fn clear_env() {
        env::remove_var("NEOCARE__AUTH__JWT_SECRET");
        env::remove_var("NEOCARE__SERVER__PORT");
        env::remove_var("NEOCARE__SERVER__ENVIRONMENT");
        env::remove_var("NEOCARE__RETRY__MAX_ATTEMPTS");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.auth.issuer, "neocare");
        assert!(!config.email.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("NEOCARE__SERVER__PORT", "3000");
        env::set_var("NEOCARE__SERVER__ENVIRONMENT", "production");
        env::set_var("NEOCARE__RETRY__MAX_ATTEMPTS", "5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.retry.max_attempts, 5);
    }
}
