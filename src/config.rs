//! Application settings.
//!
//! Settings come from environment variables, with an optional TOML overlay
//! file (`STEAMSENSE_CONFIG`) for deployments that prefer a config file.
//! Precedence: defaults < TOML file < environment.

use std::env;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::parse_timestamp;

/// Runtime configuration for the server and the upstream client.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deployment environment label reported by /health.
    pub env: String,
    /// API key for the upstream price source; sync and search are disabled
    /// without it.
    pub itad_api_key: Option<String>,
    pub itad_base_url: String,
    pub itad_country: String,
    /// Lower bound passed to upstream history fetches.
    pub itad_history_since: Option<DateTime<Utc>>,
    /// Popularity ranking endpoint used by the top-N bulk sync.
    pub ranking_url: String,
    /// Append-only journal file; in-memory only when unset.
    pub journal_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Games per batch during a top-N bulk sync.
    pub sync_batch_size: usize,
    /// Pause between bulk sync batches, in milliseconds.
    pub sync_batch_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            itad_api_key: None,
            itad_base_url: "https://api.isthereanydeal.com".to_string(),
            itad_country: "US".to_string(),
            itad_history_since: None,
            ranking_url: "https://steamspy.com/api.php".to_string(),
            journal_path: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            sync_batch_size: 10,
            sync_batch_delay_ms: 1000,
        }
    }
}

/// Optional TOML overlay; every field defaults to "keep the current value".
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    env: Option<String>,
    itad_api_key: Option<String>,
    itad_base_url: Option<String>,
    itad_country: Option<String>,
    itad_history_since: Option<String>,
    ranking_url: Option<String>,
    journal_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    sync_batch_size: Option<usize>,
    sync_batch_delay_ms: Option<u64>,
}

impl Settings {
    /// Load settings: defaults, then the TOML file named by
    /// `STEAMSENSE_CONFIG` (if any), then environment variables.
    ///
    /// # Environment Variables
    /// - `APP_ENV`: environment label (default: development)
    /// - `ITAD_API_KEY`: upstream API key
    /// - `ITAD_BASE_URL`, `ITAD_COUNTRY`: upstream endpoint tuning
    /// - `ITAD_HISTORY_SINCE`: RFC 3339 or YYYY-MM-DD lower bound for history
    /// - `RANKING_URL`: popularity ranking endpoint
    /// - `STEAMSENSE_JOURNAL`: journal file path (enables durability)
    /// - `REQUEST_TIMEOUT_SECS`, `CONNECT_TIMEOUT_SECS`
    /// - `SYNC_BATCH_SIZE`, `SYNC_BATCH_DELAY_MS`
    ///
    /// # Errors
    /// Returns an error for an unreadable/unparsable config file or a
    /// malformed `ITAD_HISTORY_SINCE`.
    pub fn load() -> Result<Self, String> {
        let mut settings = Settings::default();

        if let Ok(path) = env::var("STEAMSENSE_CONFIG") {
            let raw = fs::read_to_string(&path)
                .map_err(|e| format!("could not read config file {path}: {e}"))?;
            let file: SettingsFile =
                toml::from_str(&raw).map_err(|e| format!("invalid config file {path}: {e}"))?;
            settings.apply_file(file)?;
        }

        settings.apply_env()?;
        Ok(settings)
    }

    fn apply_file(&mut self, file: SettingsFile) -> Result<(), String> {
        if let Some(env) = file.env {
            self.env = env;
        }
        if file.itad_api_key.is_some() {
            self.itad_api_key = file.itad_api_key;
        }
        if let Some(url) = file.itad_base_url {
            self.itad_base_url = url;
        }
        if let Some(country) = file.itad_country {
            self.itad_country = country;
        }
        if let Some(raw) = file.itad_history_since {
            self.itad_history_since = Some(parse_timestamp(&raw)?);
        }
        if let Some(url) = file.ranking_url {
            self.ranking_url = url;
        }
        if file.journal_path.is_some() {
            self.journal_path = file.journal_path;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(size) = file.sync_batch_size {
            self.sync_batch_size = size;
        }
        if let Some(ms) = file.sync_batch_delay_ms {
            self.sync_batch_delay_ms = ms;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), String> {
        if let Ok(env_label) = env::var("APP_ENV") {
            self.env = env_label;
        }
        if let Ok(key) = env::var("ITAD_API_KEY") {
            if !key.is_empty() {
                self.itad_api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("ITAD_BASE_URL") {
            self.itad_base_url = url;
        }
        if let Ok(country) = env::var("ITAD_COUNTRY") {
            self.itad_country = country;
        }
        if let Ok(raw) = env::var("ITAD_HISTORY_SINCE") {
            self.itad_history_since = Some(parse_timestamp(&raw)?);
        }
        if let Ok(url) = env::var("RANKING_URL") {
            self.ranking_url = url;
        }
        if let Ok(path) = env::var("STEAMSENSE_JOURNAL") {
            if !path.is_empty() {
                self.journal_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(raw) = env::var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = raw
                .parse()
                .map_err(|_| "REQUEST_TIMEOUT_SECS must be an integer".to_string())?;
        }
        if let Ok(raw) = env::var("CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs = raw
                .parse()
                .map_err(|_| "CONNECT_TIMEOUT_SECS must be an integer".to_string())?;
        }
        if let Ok(raw) = env::var("SYNC_BATCH_SIZE") {
            self.sync_batch_size = raw
                .parse()
                .map_err(|_| "SYNC_BATCH_SIZE must be an integer".to_string())?;
        }
        if let Ok(raw) = env::var("SYNC_BATCH_DELAY_MS") {
            self.sync_batch_delay_ms = raw
                .parse()
                .map_err(|_| "SYNC_BATCH_DELAY_MS must be an integer".to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.itad_country, "US");
        assert!(settings.itad_api_key.is_none());
        assert!(settings.journal_path.is_none());
    }

    #[test]
    fn test_toml_overlay() {
        let raw = r#"
            env = "production"
            itad_api_key = "k-123"
            sync_batch_size = 25
        "#;
        let file: SettingsFile = toml::from_str(raw).unwrap();
        let mut settings = Settings::default();
        settings.apply_file(file).unwrap();
        assert_eq!(settings.env, "production");
        assert_eq!(settings.itad_api_key.as_deref(), Some("k-123"));
        assert_eq!(settings.sync_batch_size, 25);
        // Untouched fields keep their defaults.
        assert_eq!(settings.itad_country, "US");
    }

    #[test]
    fn test_bad_history_since_rejected() {
        let file = SettingsFile {
            itad_history_since: Some("not a date".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        assert!(settings.apply_file(file).is_err());
    }
}
