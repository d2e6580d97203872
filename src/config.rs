use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEV_SECRET: &str = "huddle-dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub secret_key: String,
    pub upload_dir: PathBuf,
    pub upload_size_limit_mb: u64,
    pub public_base_url: Option<String>,
    pub retention_interval: Duration,
    pub message_max_age: Duration,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret_key = match std::env::var("SECRET_KEY") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                tracing::warn!("SECRET_KEY is not set, using the development secret");
                DEV_SECRET.to_string()
            }
        };

        let retention_hours: u64 = parse_var("RETENTION_INTERVAL_HOURS", 24)?;
        let max_age_days: u64 = parse_var("MESSAGE_MAX_AGE_DAYS", 30)?;

        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite://huddle.db?mode=rwc"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:5000").parse()?,
            secret_key,
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "./wwwroot/uploads")),
            upload_size_limit_mb: parse_var("UPLOAD_SIZE_LIMIT_MB", 50)?,
            public_base_url: optional_var("PUBLIC_BASE_URL"),
            retention_interval: Duration::from_secs(retention_hours * 3600),
            message_max_age: Duration::from_secs(max_age_days * 24 * 3600),
            admin_username: optional_var("ADMIN_USERNAME"),
            admin_password: optional_var("ADMIN_PASSWORD"),
        })
    }

    /// In-memory database, temp upload dir. Used by tests and local tooling.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            secret_key: DEV_SECRET.to_string(),
            upload_dir: std::env::temp_dir().join(format!("huddle-uploads-{}", uuid::Uuid::new_v4())),
            upload_size_limit_mb: 50,
            public_base_url: None,
            retention_interval: Duration::from_secs(24 * 3600),
            message_max_age: Duration::from_secs(30 * 24 * 3600),
            admin_username: None,
            admin_password: None,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}
