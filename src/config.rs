use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MySql,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,
    pub reader_token_ttl: usize,

    // Rate limiting
    pub rate_toggle_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Flat statutory deduction applied to generated payroll, in percent.
    pub payroll_deduction_percent: f64,
    pub tag_cache_ttl_secs: u64,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("STORAGE").as_deref() {
            None | Some("mysql") => StorageBackend::MySql,
            Some("memory") => StorageBackend::Memory,
            Some(other) => return Err(anyhow!("STORAGE must be `mysql` or `memory`, got `{other}`")),
        };

        let database_url = match (storage, lookup("DATABASE_URL")) {
            (_, Some(url)) => url,
            (StorageBackend::Memory, None) => String::new(),
            (StorageBackend::MySql, None) => return Err(anyhow!("DATABASE_URL must be set")),
        };

        let payroll_deduction_percent: f64 = parse_or(&lookup, "PAYROLL_DEDUCTION_PERCENT", 10.0)?;
        if !(0.0..=100.0).contains(&payroll_deduction_percent) {
            return Err(anyhow!("PAYROLL_DEDUCTION_PERCENT must be between 0 and 100"));
        }

        let log_level = match lookup("LOG_LEVEL") {
            Some(level) => level
                .parse::<tracing::Level>()
                .map_err(|_| anyhow!("LOG_LEVEL `{level}` is not a tracing level"))?,
            None => tracing::Level::DEBUG,
        };

        Ok(Self {
            storage,
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: lookup("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?,
            server_addr: lookup("SERVER_ADDR").ok_or_else(|| anyhow!("SERVER_ADDR must be set"))?,
            reader_token_ttl: parse_or(&lookup, "READER_TOKEN_TTL", 31_536_000)?, // default 365 days
            rate_toggle_per_min: parse_or(&lookup, "RATE_TOGGLE_PER_MIN", 120)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            payroll_deduction_percent,
            tag_cache_ttl_secs: parse_or(&lookup, "TAG_CACHE_TTL_SECS", 60)?,
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_keys_are_missing() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://localhost/hrm"),
            ("JWT_SECRET", "secret"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();

        assert_eq!(config.storage, StorageBackend::MySql);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.rate_toggle_per_min, 120);
        assert_eq!(config.payroll_deduction_percent, 10.0);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn mysql_backend_requires_database_url() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn memory_backend_runs_without_database_url() {
        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE", "memory"),
            ("JWT_SECRET", "secret"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.database_url.is_empty());
    }

    #[test]
    fn rejects_unparsable_numbers_and_out_of_range_percent() {
        let base = [("STORAGE", "memory"), ("JWT_SECRET", "s"), ("SERVER_ADDR", "a")];

        let mut bad_rate = base.to_vec();
        bad_rate.push(("RATE_TOGGLE_PER_MIN", "lots"));
        assert!(Config::from_lookup(lookup_from(&bad_rate)).is_err());

        let mut bad_percent = base.to_vec();
        bad_percent.push(("PAYROLL_DEDUCTION_PERCENT", "150"));
        assert!(Config::from_lookup(lookup_from(&bad_percent)).is_err());
    }
}
