use std::env;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::teams::{StrategyKind, DEFAULT_TEAM_SIZE};

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub admin_password: String,
    pub data_path: PathBuf,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub team_size: usize,
    pub strategy: StrategyKind,
    pub balance_seed: Option<u64>,
    pub max_upload_bytes: usize,
    pub session_key: Option<Vec<u8>>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_password = match lookup("ADMIN_PASSWORD") {
            Some(password) if !password.is_empty() => password,
            _ => {
                tracing::warn!("ADMIN_PASSWORD is not set; using the default password. Change it!");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        let team_size = parse_or(&lookup, "TEAM_SIZE", DEFAULT_TEAM_SIZE)?;
        if team_size == 0 {
            return Err(AppError::Config("TEAM_SIZE must be at least 1".to_string()));
        }

        let strategy = match lookup("BALANCE_STRATEGY") {
            Some(name) => name
                .parse::<StrategyKind>()
                .map_err(AppError::Config)?,
            None => StrategyKind::default(),
        };

        let balance_seed = match lookup("BALANCE_SEED") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                AppError::Config(format!("BALANCE_SEED must be an unsigned integer, got {:?}", raw))
            })?),
            None => None,
        };

        let session_key = match lookup("SESSION_KEY") {
            Some(key) if key.len() < 64 => {
                return Err(AppError::Config(
                    "SESSION_KEY must be at least 64 bytes long".to_string(),
                ))
            }
            Some(key) => Some(key.into_bytes()),
            None => None,
        };

        Ok(Self {
            host: lookup("CLUB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "CLUB_PORT", 8080)?,
            admin_password,
            data_path: lookup("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/club.json")),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/uploads")),
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            team_size,
            strategy,
            balance_seed,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            session_key,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.team_size, 6);
        assert_eq!(config.strategy, StrategyKind::Greedy);
        assert_eq!(config.admin_password, DEFAULT_ADMIN_PASSWORD);
        assert!(config.balance_seed.is_none());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CLUB_PORT", "9000"),
            ("TEAM_SIZE", "4"),
            ("BALANCE_STRATEGY", "exact"),
            ("BALANCE_SEED", "42"),
            ("ADMIN_PASSWORD", "hunter2"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.team_size, 4);
        assert_eq!(config.strategy, StrategyKind::Exact);
        assert_eq!(config.balance_seed, Some(42));
        assert_eq!(config.admin_password, "hunter2");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(config_from(&[("TEAM_SIZE", "0")]), Err(AppError::Config(_))));
        assert!(matches!(config_from(&[("CLUB_PORT", "http")]), Err(AppError::Config(_))));
        assert!(matches!(
            config_from(&[("BALANCE_STRATEGY", "random")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(config_from(&[("SESSION_KEY", "short")]), Err(AppError::Config(_))));
    }
}
