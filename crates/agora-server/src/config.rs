use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Runtime settings, read from `AGORA_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    /// Zero disables the background session reaper.
    pub session_reap_interval_secs: u64,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_ttl_hours: i64 = parse_or(&lookup, "AGORA_SESSION_TTL_HOURS", 24)?;
        if session_ttl_hours <= 0 {
            anyhow::bail!("AGORA_SESSION_TTL_HOURS must be positive, got {}", session_ttl_hours);
        }

        Ok(Config {
            db_path: lookup("AGORA_DB_PATH")
                .unwrap_or_else(|| "agora.db".into())
                .into(),
            host: lookup("AGORA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "AGORA_PORT", 8080)?,
            session_ttl_hours,
            session_reap_interval_secs: parse_or(&lookup, "AGORA_SESSION_REAP_INTERVAL_SECS", 0)?,
            cookie_secure: parse_or(&lookup, "AGORA_COOKIE_SECURE", false)?,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn reap_interval(&self) -> Option<Duration> {
        (self.session_reap_interval_secs > 0)
            .then(|| Duration::from_secs(self.session_reap_interval_secs))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
