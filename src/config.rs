use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    /// Superuser created at startup when none exists yet.
    #[serde(default)]
    pub admin: Option<AdminBootstrapConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Defaults to localhost dev ports.
    /// Set ACCOUNTD__API__CORS_ALLOWED_ORIGINS in production.
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to digest bearer tokens before they are stored.
    pub token_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    #[serde(default = "default_max_login_failures")]
    pub max_login_failures: u32,
    #[serde(default = "default_login_failure_window")]
    pub login_failure_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrapConfig {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_api_port() -> u16 { 8000 }
fn default_db_path() -> String { "./accountd.db".to_string() }
fn default_connect_retries() -> u32 { 30 }
fn default_connect_retry_delay_ms() -> u64 { 1000 }
fn default_token_expiry() -> u64 { 24 }
fn default_password_min_length() -> usize { 5 }
fn default_max_login_failures() -> u32 { 5 }
fn default_login_failure_window() -> u64 { 300 }
fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

const DEFAULT_TOKEN_SECRET: &str = "change-me-in-production";
/// One year.
pub const MAX_TOKEN_EXPIRY_HOURS: u64 = 8760;

pub fn validate(cfg: &Config) -> Result<()> {
    if cfg.auth.token_secret == DEFAULT_TOKEN_SECRET {
        anyhow::bail!(
            "SECURITY ERROR: token secret must be changed from default value '{}'. \
            Set ACCOUNTD__AUTH__TOKEN_SECRET environment variable with a strong random value.",
            DEFAULT_TOKEN_SECRET
        );
    }

    if cfg.auth.token_secret.len() < 32 {
        anyhow::bail!(
            "CONFIG ERROR: token secret must be at least 32 characters (current: {})",
            cfg.auth.token_secret.len()
        );
    }

    if cfg.auth.password_min_length == 0 {
        anyhow::bail!("CONFIG ERROR: auth.password_min_length must be at least 1");
    }

    if cfg.auth.token_expiry_hours == 0 || cfg.auth.token_expiry_hours > MAX_TOKEN_EXPIRY_HOURS {
        anyhow::bail!(
            "CONFIG ERROR: auth.token_expiry_hours must be between 1 and {} (current: {})",
            MAX_TOKEN_EXPIRY_HOURS,
            cfg.auth.token_expiry_hours
        );
    }

    if let Some(admin) = &cfg.admin {
        if admin.password.chars().count() < cfg.auth.password_min_length {
            anyhow::bail!(
                "CONFIG ERROR: bootstrap admin password must be at least {} characters",
                cfg.auth.password_min_length
            );
        }
    }

    if cfg.database.path != ":memory:" {
        if let Some(parent) = std::path::Path::new(&cfg.database.path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                anyhow::bail!(
                    "CONFIG ERROR: Database directory does not exist: {}",
                    parent.display()
                );
            }
        }
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

pub fn load() -> Result<Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("ACCOUNTD").separator("__"))
        .set_default("api.bind", "0.0.0.0")?
        .set_default("api.port", 8000)?
        .set_default("database.path", "./accountd.db")?
        .set_default("database.connect_retries", 30)?
        .set_default("database.connect_retry_delay_ms", 1000)?
        .set_default("auth.token_secret", DEFAULT_TOKEN_SECRET)?
        .set_default("auth.token_expiry_hours", 24)?
        .set_default("auth.password_min_length", 5)?
        .set_default("auth.max_login_failures", 5)?
        .set_default("auth.login_failure_window_secs", 300)?
        .build()?
        .try_deserialize()?;

    validate(&cfg)?;

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api: ApiConfig {
                port: 8000,
                bind: "127.0.0.1".to_string(),
                cors_allowed_origins: vec![],
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
                connect_retries: 1,
                connect_retry_delay_ms: 0,
            },
            auth: AuthConfig {
                token_secret: "a-sufficiently-long-token-secret-for-tests".to_string(),
                token_expiry_hours: 1,
                password_min_length: 5,
                max_login_failures: 5,
                login_failure_window_secs: 300,
            },
            admin: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_default_secret_rejected() {
        let mut cfg = valid_config();
        cfg.auth.token_secret = DEFAULT_TOKEN_SECRET.to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut cfg = valid_config();
        cfg.auth.token_secret = "too-short".to_string();
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("at least 32 characters"), "got: {}", err);
    }

    #[test]
    fn test_zero_password_min_length_rejected() {
        let mut cfg = valid_config();
        cfg.auth.password_min_length = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_token_expiry_bounds() {
        let mut cfg = valid_config();
        cfg.auth.token_expiry_hours = 0;
        assert!(validate(&cfg).is_err());

        cfg.auth.token_expiry_hours = MAX_TOKEN_EXPIRY_HOURS;
        assert!(validate(&cfg).is_ok());

        cfg.auth.token_expiry_hours = u64::MAX;
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("token_expiry_hours"), "got: {}", err);
    }

    #[test]
    fn test_weak_bootstrap_admin_password_rejected() {
        let mut cfg = valid_config();
        cfg.admin = Some(AdminBootstrapConfig {
            email: "admin@example.com".to_string(),
            password: "abc".to_string(),
            name: String::new(),
        });
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_missing_database_directory_rejected() {
        let mut cfg = valid_config();
        cfg.database.path = "/definitely/not/a/real/dir/accountd.db".to_string();
        assert!(validate(&cfg).is_err());
    }
}
