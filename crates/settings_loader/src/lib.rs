//! # Settings Loader
//!
//! Centralized settings loading for the import and reporting tools. Settings
//! live in a `settings.json` file (data directory, default currency, logging,
//! optional webhook and analysis endpoints) and can be overridden through
//! environment variables, including ones read from a `.env` file.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/settings.json")?;
//!
//! // Explicit path (must exist), else ./settings.json, else built-in defaults; env applied last
//! let path = Some(PathBuf::from("settings.json"));
//! let settings = settings_loader::load_runtime_settings(path.as_ref())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use models::{AnalysisSettings, Settings, WebhookSettings};
use tracing::{debug, warn};

pub const ENV_DATA_DIR: &str = "ADS_DATA_DIR";
pub const ENV_DEFAULT_CURRENCY: &str = "ADS_DEFAULT_CURRENCY";
pub const ENV_LOG_LEVEL: &str = "ADS_LOG_LEVEL";
pub const ENV_WEBHOOK_URL: &str = "ADS_WEBHOOK_URL";
pub const ENV_ANALYSIS_BASE_URL: &str = "ADS_ANALYSIS_BASE_URL";
pub const ENV_ANALYSIS_MODEL: &str = "ADS_ANALYSIS_MODEL";

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads settings from a default location (settings.json in the current directory)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("settings.json")
}

/// Loads the provided path, or else the default location. Returns None only
/// when no path is given and no default file exists. A path that is given but
/// missing, or a file that fails to parse, is an error.
pub fn load_settings_with_fallback(path: Option<&PathBuf>) -> Result<Option<Settings>> {
    if let Some(settings_path) = path {
        if !settings_file_exists(settings_path) {
            return Err(anyhow!("Settings file not found: {}", settings_path.display()));
        }
        return load_settings(settings_path).map(Some);
    }

    if default_settings_exist() {
        return load_default_settings().map(Some);
    }

    Ok(None)
}

/// Settings as the binaries use them: file (or defaults) with `.env` and
/// environment overrides applied.
pub fn load_runtime_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), ".env loaded"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, ".env could not be loaded"),
    }

    let mut settings = load_settings_with_fallback(path)?.unwrap_or_default();
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Applies overrides from `lookup` (normally the process environment).
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = get(ENV_DATA_DIR) {
        settings.data_dir = PathBuf::from(dir);
    }
    if let Some(currency) = get(ENV_DEFAULT_CURRENCY) {
        settings.default_currency = currency.trim().to_uppercase();
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        settings.log.level = level;
    }
    if let Some(url) = get(ENV_WEBHOOK_URL) {
        settings.webhook = Some(WebhookSettings { url, enabled: true });
    }
    if let Some(base_url) = get(ENV_ANALYSIS_BASE_URL) {
        let model = get(ENV_ANALYSIS_MODEL)
            .or_else(|| settings.analysis.as_ref().map(|a| a.model.clone()))
            .unwrap_or_else(|| "llama3.2".to_string());
        settings.analysis = Some(AnalysisSettings { base_url, model });
    } else if let (Some(model), Some(analysis)) = (get(ENV_ANALYSIS_MODEL), settings.analysis.as_mut()) {
        analysis.model = model;
    }
}

/// Checks if a settings file exists at the given path
pub fn settings_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists() && path.as_ref().is_file()
}

/// Checks if the default settings file (settings.json) exists
pub fn default_settings_exist() -> bool {
    settings_file_exists("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"data_dir": "/tmp/ads", "default_currency": "MXN", "webhook": {"url": "http://localhost:5678/hook"}}"#,
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/ads"));
        assert_eq!(settings.default_currency, "MXN");
        let webhook = settings.webhook.unwrap();
        assert!(webhook.enabled);
        assert_eq!(webhook.url, "http://localhost:5678/hook");
    }

    #[test]
    fn test_malformed_settings_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(load_settings(&path).is_err());
        assert!(load_settings_with_fallback(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let err = load_settings_with_fallback(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Settings file not found"));
        assert!(load_runtime_settings(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATA_DIR, "/srv/ads"),
            (ENV_DEFAULT_CURRENCY, "usd"),
            (ENV_ANALYSIS_BASE_URL, "http://localhost:11434"),
            (ENV_LOG_LEVEL, ""),
        ]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.data_dir, PathBuf::from("/srv/ads"));
        assert_eq!(settings.default_currency, "USD");
        assert_eq!(settings.log.level, "info");
        let analysis = settings.analysis.unwrap();
        assert_eq!(analysis.base_url, "http://localhost:11434");
        assert_eq!(analysis.model, "llama3.2");
        assert!(settings.webhook.is_none());
    }
}
