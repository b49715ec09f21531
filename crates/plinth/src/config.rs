use crate::telemetry::LogFormat;
use std::time::Duration;

// Config is the central place for runtime configuration.
// Values come from the environment (a `.env` file is loaded first).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub queue_workers: usize,
    pub poll_interval: Duration,
    pub admin_addr: Option<String>,
    pub migrate_on_startup: bool,
    pub log_format: LogFormat,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&get)?,
        };

        let queue_workers = get("QUEUE_WORKERS")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(5)
            .clamp(1, 256);

        let poll_interval = get("QUEUE_POLL_INTERVAL_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(|ms| Duration::from_millis(ms.clamp(10, 60_000)))
            .unwrap_or(Duration::from_secs(1));

        let admin_addr = match get("ADMIN_ADDR") {
            Some(v) => normalize_optional_addr(&v),
            None => Some("127.0.0.1:8080".to_string()),
        };

        let migrate_on_startup = get("MIGRATE_ON_STARTUP")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let log_format = match get("LOG_FORMAT") {
            Some(v) => LogFormat::parse(&v)
                .ok_or_else(|| anyhow::anyhow!("LOG_FORMAT must be 'json' or 'pretty', got '{v}'"))?,
            None => LogFormat::Json,
        };

        let db_max_connections = get("DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10)
            .clamp(1, 64);

        let db_acquire_timeout = get("DB_ACQUIRE_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10)
            .clamp(1, 60);

        Ok(Self {
            database_url,
            queue_workers,
            poll_interval,
            admin_addr,
            migrate_on_startup,
            log_format,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(db_acquire_timeout),
        })
    }
}

/// Builds a Postgres URL from the `DB_*` variables when `DATABASE_URL` is unset.
fn database_url_from_parts(get: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let connection = get("DB_CONNECTION")
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is missing (and DB_CONNECTION is not set)"))?;

    match connection.trim().to_lowercase().as_str() {
        "postgres" | "postgresql" => {}
        other => anyhow::bail!("unsupported database driver: {other}"),
    }

    let host = get("DB_HOST");
    let port = get("DB_PORT");
    let database = get("DB_DATABASE");
    let (Some(host), Some(port), Some(database)) = (host, port, database) else {
        anyhow::bail!("missing database configuration: DB_HOST, DB_PORT and DB_DATABASE are required");
    };

    let username = get("DB_USERNAME").unwrap_or_default();
    let password = get("DB_PASSWORD").unwrap_or_default();
    let credentials = match (username.is_empty(), password.is_empty()) {
        (true, _) => String::new(),
        (false, true) => format!("{username}@"),
        (false, false) => format!("{username}:{password}@"),
    };

    Ok(format!(
        "postgres://{credentials}{host}:{port}/{database}?sslmode=disable"
    ))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let cfg = config_from(&[("DATABASE_URL", "postgres://localhost/app")]).unwrap();

        assert_eq!(cfg.database_url, "postgres://localhost/app");
        assert_eq!(cfg.queue_workers, 5);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.admin_addr.as_deref(), Some("127.0.0.1:8080"));
        assert!(!cfg.migrate_on_startup);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.db_max_connections, 10);
    }

    #[test]
    fn url_is_built_from_db_parts() {
        let cfg = config_from(&[
            ("DB_CONNECTION", "postgres"),
            ("DB_HOST", "db"),
            ("DB_PORT", "5432"),
            ("DB_DATABASE", "app"),
            ("DB_USERNAME", "app"),
            ("DB_PASSWORD", "secret"),
        ])
        .unwrap();

        assert_eq!(
            cfg.database_url,
            "postgres://app:secret@db:5432/app?sslmode=disable"
        );
    }

    #[test]
    fn mysql_is_rejected() {
        let err = config_from(&[
            ("DB_CONNECTION", "mysql"),
            ("DB_HOST", "db"),
            ("DB_PORT", "3306"),
            ("DB_DATABASE", "app"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("unsupported database driver"));
    }

    #[test]
    fn missing_database_settings_fail() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("DB_CONNECTION", "postgres"), ("DB_HOST", "db")]).is_err());
    }

    #[test]
    fn admin_addr_can_be_disabled_and_numbers_clamped() {
        let cfg = config_from(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("ADMIN_ADDR", "off"),
            ("MIGRATE_ON_STARTUP", "yes"),
            ("QUEUE_WORKERS", "2"),
            ("QUEUE_POLL_INTERVAL_MS", "250"),
            ("DB_MAX_CONNECTIONS", "1000"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.admin_addr, None);
        assert!(cfg.migrate_on_startup);
        assert_eq!(cfg.queue_workers, 2);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.db_max_connections, 64);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn queue_settings_are_clamped() {
        let cfg = config_from(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("QUEUE_WORKERS", "0"),
            ("QUEUE_POLL_INTERVAL_MS", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.queue_workers, 1);
        assert_eq!(cfg.poll_interval, Duration::from_millis(10));

        let cfg = config_from(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("QUEUE_WORKERS", "100000"),
            ("QUEUE_POLL_INTERVAL_MS", "86400000"),
        ])
        .unwrap();
        assert_eq!(cfg.queue_workers, 256);
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
    }
}
