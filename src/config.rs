use std::path::PathBuf;

use chrono::Duration;

use crate::error::AppError;

const APP_DIR_NAME: &str = "hub-authority";
const DB_FILE_NAME: &str = "hub.sqlite3";
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Lifetimes applied when minting or rotating a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl SessionTtl {
    pub fn new(access: Duration, refresh: Duration) -> Result<Self, AppError> {
        if access <= Duration::zero() || refresh <= Duration::zero() {
            return Err(AppError::Config("token TTLs must be positive".into()));
        }
        if access >= refresh {
            return Err(AppError::Config(format!(
                "access token TTL ({}s) must be shorter than refresh token TTL ({}s)",
                access.num_seconds(),
                refresh.num_seconds()
            )));
        }
        Ok(Self { access, refresh })
    }
}

impl Default for SessionTtl {
    fn default() -> Self {
        Self {
            access: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub session_ttl: SessionTtl,
}

impl StoreConfig {
    /// Load from the process environment, reading `.env` first when present.
    ///
    /// - `HUB_DB_PATH`: sqlite file (default `<config dir>/hub-authority/hub.sqlite3`)
    /// - `HUB_ACCESS_TOKEN_TTL_SECS`: access token lifetime (default 3600)
    /// - `HUB_REFRESH_TOKEN_TTL_SECS`: refresh token lifetime (default 86400)
    pub fn from_env() -> Result<Self, AppError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("HUB_DB_PATH")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let access = read_secs(&lookup, "HUB_ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS)?;
        let refresh = read_secs(&lookup, "HUB_REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TOKEN_TTL_SECS)?;
        let session_ttl = SessionTtl::new(Duration::seconds(access), Duration::seconds(refresh))?;

        Ok(Self { db_path, session_ttl })
    }

    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            session_ttl: SessionTtl::default(),
        }
    }
}

fn read_secs<F>(lookup: &F, key: &str, default: i64) -> Result<i64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::Config(format!("{key} must be an integer number of seconds, got {raw:?}"))),
    }
}

pub fn default_db_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(APP_DIR_NAME).join(DB_FILE_NAME),
        None => PathBuf::from(DB_FILE_NAME),
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
    fn defaults_apply_when_unset() {
        let config = StoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.session_ttl, SessionTtl::default());
        assert!(config.db_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn reads_overrides() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            ("HUB_DB_PATH", " /tmp/hub-test.sqlite3 "),
            ("HUB_ACCESS_TOKEN_TTL_SECS", "60"),
            ("HUB_REFRESH_TOKEN_TTL_SECS", "600"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/hub-test.sqlite3"));
        assert_eq!(config.session_ttl.access, Duration::seconds(60));
        assert_eq!(config.session_ttl.refresh, Duration::seconds(600));
    }

    #[test]
    fn rejects_access_ttl_not_shorter_than_refresh() {
        let err = StoreConfig::from_lookup(lookup_from(&[
            ("HUB_ACCESS_TOKEN_TTL_SECS", "600"),
            ("HUB_REFRESH_TOKEN_TTL_SECS", "600"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn rejects_garbage_ttl() {
        let err = StoreConfig::from_lookup(lookup_from(&[("HUB_ACCESS_TOKEN_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
