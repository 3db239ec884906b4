//! services/checkin/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use attendance_core::{Coordinates, Role};
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Tuning for the live decode loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScannerSettings {
    /// Frames pulled per second while scanning.
    pub fps: u32,
    /// Side of the centred square handed to the decoder.
    pub qr_box: u32,
    /// Pause before live scanning resumes after a still-image scan.
    pub resume_delay: Duration,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            fps: 10,
            qr_box: 250,
            resume_delay: Duration::from_millis(800),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub database_url: String,
    pub log_level: Level,
    pub default_role: Role,
    pub default_centre: String,
    pub scanner: ScannerSettings,
    pub geolocation_timeout: Duration,
    pub fixed_position: Option<Coordinates>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend and Storage ---
        let api_base_url = lookup("CHECKIN_API_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "CHECKIN_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://checkin.db".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Identity ---
        let default_role = match lookup("CHECKIN_ROLE") {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| ConfigError::InvalidValue("CHECKIN_ROLE".to_string(), e.to_string()))?,
            None => Role::Student,
        };
        let default_centre =
            lookup("CHECKIN_CENTRE").unwrap_or_else(|| "Main Campus".to_string());

        // --- Scanner ---
        let defaults = ScannerSettings::default();
        let scanner = ScannerSettings {
            fps: parse_positive(&lookup, "SCANNER_FPS", defaults.fps)?,
            qr_box: parse_positive(&lookup, "SCANNER_QR_BOX", defaults.qr_box)?,
            resume_delay: defaults.resume_delay,
        };

        // --- Location ---
        let geolocation_timeout = Duration::from_secs(u64::from(parse_positive(
            &lookup,
            "GEOLOCATION_TIMEOUT_SECS",
            8,
        )?));

        let fixed_position = match (lookup("CHECKIN_LATITUDE"), lookup("CHECKIN_LONGITUDE")) {
            (Some(lat), Some(lon)) => Some(Coordinates {
                latitude: parse_float("CHECKIN_LATITUDE", &lat)?,
                longitude: parse_float("CHECKIN_LONGITUDE", &lon)?,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar("CHECKIN_LONGITUDE".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingVar("CHECKIN_LATITUDE".to_string())),
        };

        Ok(Self {
            api_base_url,
            database_url,
            log_level,
            default_role,
            default_centre,
            scanner,
            geolocation_timeout,
            fixed_position,
        })
    }
}

fn parse_positive<F>(lookup: &F, key: &str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive integer", raw),
            )),
        },
    }
}

fn parse_float(key: &str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
