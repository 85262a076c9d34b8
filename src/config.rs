use std::env;

use crate::error::AppError;

const DEV_JWT_SECRET: &str = "parcel-tracker-dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub jwt_secret: String,
    pub tracking_prefix: String,
    pub booking_max_attempts: u32,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Ok(raw) if raw.is_empty() || raw.eq_ignore_ascii_case("compact") => LogFormat::Compact,
            Ok(raw) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {raw}, expected compact or json"
                )));
            }
            Err(_) => LogFormat::Compact,
        };

        let tracking_prefix = env::var("TRACKING_PREFIX").unwrap_or_else(|_| "TRK".to_string());
        if tracking_prefix.trim().is_empty() {
            return Err(AppError::Internal("TRACKING_PREFIX cannot be empty".to_string()));
        }

        let booking_max_attempts: u32 = parse_or_default("BOOKING_MAX_ATTEMPTS", 8)?;
        if booking_max_attempts == 0 {
            return Err(AppError::Internal("BOOKING_MAX_ATTEMPTS must be > 0".to_string()));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string()),
            tracking_prefix: tracking_prefix.trim().to_string(),
            booking_max_attempts,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
