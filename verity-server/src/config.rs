use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Longest session lifetime accepted from `TOKEN_TTL_DAYS`, ten years.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Where records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("unknown storage backend {:?}, expected sqlite or memory", other),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// HMAC secret for signing session tokens.
    pub jwt_secret: String,
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub storage_backend: StorageBackend,
    /// Root of the uploaded media tree, served under `/uploads`.
    pub upload_dir: PathBuf,
    pub token_ttl: chrono::Duration,
    pub story_sweep_interval: Duration,
    /// Optional bearer token for /status endpoint authentication.
    /// If not set, /status endpoint is disabled (returns 403 Forbidden).
    pub status_auth_token: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"<redacted>")
            .field("port", &self.port)
            .field("state_dir", &self.state_dir)
            .field("storage_backend", &self.storage_backend)
            .field("upload_dir", &self.upload_dir)
            .field("token_ttl", &self.token_ttl)
            .field("story_sweep_interval", &self.story_sweep_interval)
            .field("status_auth_token", &self.status_auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .context("JWT_SECRET environment variable is required")?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = lookup("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let storage_backend = lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .parse::<StorageBackend>()
            .context("STORAGE_BACKEND must be sqlite or memory")?;

        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let token_ttl_days = lookup("TOKEN_TTL_DAYS")
            .unwrap_or_else(|| "30".to_string())
            .parse::<i64>()
            .context("TOKEN_TTL_DAYS must be a valid number")?;
        if token_ttl_days <= 0 {
            bail!("TOKEN_TTL_DAYS must be positive");
        }
        if token_ttl_days > MAX_TOKEN_TTL_DAYS {
            bail!("TOKEN_TTL_DAYS must be at most {}", MAX_TOKEN_TTL_DAYS);
        }

        let sweep_secs = lookup("STORY_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse::<u64>()
            .context("STORY_SWEEP_INTERVAL_SECS must be a valid number")?;
        if sweep_secs == 0 {
            bail!("STORY_SWEEP_INTERVAL_SECS must be positive");
        }

        let status_auth_token = parse_status_auth_token(lookup("STATUS_AUTH_TOKEN"));

        Ok(Config {
            jwt_secret,
            port,
            state_dir,
            storage_backend,
            upload_dir,
            token_ttl: chrono::Duration::days(token_ttl_days),
            story_sweep_interval: Duration::from_secs(sweep_secs),
            status_auth_token,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("verity.db")
    }
}

/// Parse STATUS_AUTH_TOKEN from an optional string value.
///
/// Returns None if the value is missing, empty, or contains only whitespace,
/// so an empty token can never grant access.
pub fn parse_status_auth_token(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.state_dir, PathBuf::from("."));
        assert_eq!(config.database_path(), PathBuf::from("./verity.db"));
        assert_eq!(config.storage_backend, StorageBackend::Sqlite);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.token_ttl, chrono::Duration::days(30));
        assert_eq!(config.story_sweep_interval, Duration::from_secs(60));
        assert_eq!(config.status_auth_token, None);
    }

    #[test]
    fn test_secret_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("JWT_SECRET", "   ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("JWT_SECRET", "k"),
            ("PORT", "8080"),
            ("STORAGE_BACKEND", "Memory"),
            ("TOKEN_TTL_DAYS", "7"),
            ("STATUS_AUTH_TOKEN", "tok"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.token_ttl, chrono::Duration::days(7));
        assert_eq!(config.status_auth_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("JWT_SECRET", "k"), ("PORT", "http")]).is_err());
        assert!(config(&[("JWT_SECRET", "k"), ("STORAGE_BACKEND", "mongo")]).is_err());
        assert!(config(&[("JWT_SECRET", "k"), ("TOKEN_TTL_DAYS", "0")]).is_err());
        assert!(config(&[("JWT_SECRET", "k"), ("STORY_SWEEP_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_token_ttl_upper_bound() {
        let max = MAX_TOKEN_TTL_DAYS.to_string();
        let config_at_max = config(&[("JWT_SECRET", "k"), ("TOKEN_TTL_DAYS", max.as_str())]).unwrap();
        assert_eq!(config_at_max.token_ttl, chrono::Duration::days(MAX_TOKEN_TTL_DAYS));

        let err = config(&[("JWT_SECRET", "k"), ("TOKEN_TTL_DAYS", "3651")]).unwrap_err();
        assert!(err.to_string().contains("at most 3650"), "{}", err);
        assert!(config(&[("JWT_SECRET", "k"), ("TOKEN_TTL_DAYS", "9223372036854775807")]).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config(&[("JWT_SECRET", "topsecret"), ("STATUS_AUTH_TOKEN", "tok")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("\"tok\""));
    }

    #[test]
    fn test_parse_status_auth_token_whitespace_only() {
        assert_eq!(parse_status_auth_token(None), None);
        assert_eq!(parse_status_auth_token(Some("".to_string())), None);
        assert_eq!(parse_status_auth_token(Some(" \t\n".to_string())), None);
        assert_eq!(
            parse_status_auth_token(Some("  token  ".to_string())),
            Some("  token  ".to_string())
        );
    }
}
