use super::models::{BackoffKind, Config};
use reqwest::Url;
use thiserror::Error;

const MAX_BACKOFF_FACTOR: f64 = 100.0;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("No API key configured (set api.api_key, CXY_EXPORT__API__API_KEY or CXY_API_KEY)")]
    MissingApiKey,

    #[error("Invalid base URL '{url}', expected an http:// or https:// URL")]
    InvalidBaseUrl { url: String },

    #[error("export.cache_time_hours must be a non-negative number, got {value}")]
    InvalidCacheTime { value: f64 },

    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("polling.backoff_factor must be between 1 and 100, got {value}")]
    InvalidBackoffFactor { value: f64 },

    #[error("polling.max_attempts must be at least 1 when set")]
    ZeroMaxAttempts,

    #[error("export.concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_api(config)?;
    validate_export(config)?;
    validate_polling(config)?;
    Ok(())
}

fn validate_api(config: &Config) -> Result<(), ValidationError> {
    let has_key = config
        .api
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    if !has_key {
        return Err(ValidationError::MissingApiKey);
    }

    let valid_url = Url::parse(&config.api.base_url)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false);
    if !valid_url {
        return Err(ValidationError::InvalidBaseUrl {
            url: config.api.base_url.clone(),
        });
    }

    if config.api.connect_timeout.is_zero() {
        return Err(ValidationError::ZeroInterval {
            field: "api.connect_timeout",
        });
    }
    if config.api.request_timeout.is_zero() {
        return Err(ValidationError::ZeroInterval {
            field: "api.request_timeout",
        });
    }

    Ok(())
}

fn validate_export(config: &Config) -> Result<(), ValidationError> {
    let hours = config.export.cache_time_hours;
    if !hours.is_finite() || hours < 0.0 {
        return Err(ValidationError::InvalidCacheTime { value: hours });
    }

    if config.export.check_interval.is_zero() {
        return Err(ValidationError::ZeroInterval {
            field: "export.check_interval",
        });
    }
    if config.reports.check_interval.is_zero() {
        return Err(ValidationError::ZeroInterval {
            field: "reports.check_interval",
        });
    }
    if config.export.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }

    Ok(())
}

fn validate_polling(config: &Config) -> Result<(), ValidationError> {
    if config.polling.max_attempts == Some(0) {
        return Err(ValidationError::ZeroMaxAttempts);
    }

    if config.polling.backoff == BackoffKind::Exponential {
        let factor = config.polling.backoff_factor;
        if !(1.0..=MAX_BACKOFF_FACTOR).contains(&factor) {
            return Err(ValidationError::InvalidBackoffFactor { value: factor });
        }
        if config.polling.max_interval.is_zero() {
            return Err(ValidationError::ZeroInterval {
                field: "polling.max_interval",
            });
        }
    }

    Ok(())
}
