//! Configuration utilities (port, database path, id width, retention).

use std::{env, net::{Ipv4Addr, SocketAddr}};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::util::id::{IdSpace, MAX_DIGITS};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Longest accepted retention horizon (ten years).
pub const MAX_RETENTION_DAYS: u64 = 3650;
/// Longest accepted pause between two sweeps (one year).
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * SECS_PER_DAY);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

/// Settings shared by the registry, allocator and sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub id_space: IdSpace,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub max_alloc_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8001,
            db_path: PathBuf::from("conferencemapper.db"),
            id_space: IdSpace::default(),
            retention: Duration::from_secs(365 * SECS_PER_DAY),
            sweep_interval: Duration::from_secs(SECS_PER_DAY),
            max_alloc_attempts: 128,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// Recognized variables: `PORT`, `CONFMAPPER_DB_PATH`,
    /// `CONFMAPPER_ID_DIGITS`, `CONFMAPPER_RETENTION_DAYS`,
    /// `CONFMAPPER_SWEEP_INTERVAL_SECS`, `CONFMAPPER_MAX_ALLOC_ATTEMPTS`.
    /// Unset or empty variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let db_path = lookup("CONFMAPPER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let digits = parse_or(&lookup, "CONFMAPPER_ID_DIGITS", defaults.id_space.digits())?;
        let id_space = IdSpace::new(digits).ok_or_else(|| ConfigError::Invalid {
            key: "CONFMAPPER_ID_DIGITS",
            value: digits.to_string(),
            reason: format!("must be between 1 and {MAX_DIGITS}"),
        })?;

        let retention_days =
            in_range(&lookup, "CONFMAPPER_RETENTION_DAYS", 365, MAX_RETENTION_DAYS)?;
        let sweep_secs = in_range(
            &lookup,
            "CONFMAPPER_SWEEP_INTERVAL_SECS",
            defaults.sweep_interval.as_secs(),
            MAX_SWEEP_INTERVAL.as_secs(),
        )?;
        let max_alloc_attempts = in_range(
            &lookup,
            "CONFMAPPER_MAX_ALLOC_ATTEMPTS",
            u64::from(defaults.max_alloc_attempts),
            u64::from(u32::MAX),
        )?;

        Ok(Self {
            port,
            db_path,
            id_space,
            retention: Duration::from_secs(retention_days * SECS_PER_DAY),
            sweep_interval: Duration::from_secs(sweep_secs),
            max_alloc_attempts: max_alloc_attempts as u32,
        })
    }

    /// Socket address to bind the server to (all interfaces).
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: err.to_string(),
        }),
    }
}

fn in_range<F>(lookup: &F, key: &'static str, default: u64, max: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if (1..=max).contains(&value) {
        return Ok(value);
    }
    Err(ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: format!("must be between 1 and {max}"),
    })
}
