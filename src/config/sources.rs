use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CXY_EXPORT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/cxy-export.toml";
const ENV_PREFIX: &str = "CXY_EXPORT";
const ENV_SEPARATOR: &str = "__";
const API_KEY_ENV_VAR: &str = "CXY_API_KEY";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (explicit path, `CXY_EXPORT_CONFIG`, or the default path)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = explicit_path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config, env::var(API_KEY_ENV_VAR).ok());

    Ok(config)
}

/// The bare `CXY_API_KEY` only fills in a key nothing else provided
fn load_secrets(config: &mut Config, api_key: Option<String>) {
    let missing = config
        .api
        .api_key
        .as_deref()
        .is_none_or(|key| key.trim().is_empty());
    if missing {
        if let Some(key) = api_key {
            config.api.api_key = Some(key);
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // CXY_EXPORT__API__BASE_URL -> api.base_url
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.api.base_url, "https://location.chainxy.com/api");
        assert_eq!(config.export.cache_time_hours, 24.0);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[api]
base_url = "http://localhost:9000/api"
api_key = "from-file"
request_timeout = "2m"

[export]
cache_time_hours = 6
check_interval = "500ms"
format = "ZIP_CSV"

[polling]
max_attempts = 10
backoff = "exponential"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9000/api");
        assert_eq!(config.api.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.api.request_timeout.as_duration(), Duration::from_secs(120));
        assert_eq!(config.export.cache_time_hours, 6.0);
        assert_eq!(config.export.check_interval.as_duration(), Duration::from_millis(500));
        assert_eq!(config.export.format, crate::registry::ExportFormat::ZipCsv);
        assert_eq!(config.polling.max_attempts, Some(10));
        assert_eq!(config.reports.check_interval.as_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_bare_api_key_fills_only_a_gap() {
        let mut config = Config::default();
        load_secrets(&mut config, Some("from-env".to_string()));
        assert_eq!(config.api.api_key.as_deref(), Some("from-env"));

        config.api.api_key = Some("from-file".to_string());
        load_secrets(&mut config, Some("from-env".to_string()));
        assert_eq!(config.api.api_key.as_deref(), Some("from-file"));

        config.api.api_key = Some("  ".to_string());
        load_secrets(&mut config, Some("from-env".to_string()));
        assert_eq!(config.api.api_key.as_deref(), Some("from-env"));
    }
}
