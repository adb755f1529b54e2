//! Configuration management for scansync using the prefer crate.
//!
//! Values come from (lowest to highest priority) built-in defaults, a
//! discovered or explicit config file, and command line flags/environment.
//! [`Settings`] holds the effective values; the orchestrators and clients
//! receive validated values built from it, never the settings themselves.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_THRESHOLD;
use crate::clients::HttpClientConfig;
use crate::selector::SelectionPolicy;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default pause after a failed record, in milliseconds.
pub const DEFAULT_RECORD_FAILURE_DELAY_MS: u64 = 5_000;

/// Configuration errors. Any of these aborts a run before work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting '{0}' is not configured")]
    Missing(&'static str),

    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// An output type the run should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, prefer::FromValue)]
pub struct OutputTypeConfig {
    pub name: String,
    pub mimetype: String,
}

impl OutputTypeConfig {
    pub fn new(name: &str, mimetype: &str) -> Self {
        Self {
            name: name.to_string(),
            mimetype: mimetype.to_string(),
        }
    }
}

fn default_output_types() -> Vec<OutputTypeConfig> {
    vec![
        OutputTypeConfig::new("pagexml", "application/vnd.prima.page+xml"),
        OutputTypeConfig::new("hocr", "text/html"),
    ]
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Transcription cache database filename.
    pub cache_filename: String,
    /// Base URL of the image/transcription service.
    pub source_url: Option<String>,
    /// Bearer token for the image/transcription service.
    pub source_token: Option<String>,
    /// Base URL of the text repository.
    pub target_url: Option<String>,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Pause after a failed record in milliseconds.
    pub record_failure_delay_ms: u64,
    /// Number of cached images above which the cache is purged.
    pub cache_threshold: usize,
    /// Output types to import.
    pub output_types: Vec<OutputTypeConfig>,
    /// Which transcriber feeds which output type.
    pub selection: SelectionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scansync");

        Self {
            data_dir,
            cache_filename: "transcriptions.db".to_string(),
            source_url: None,
            source_token: None,
            target_url: None,
            user_agent: concat!("scansync/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            record_failure_delay_ms: DEFAULT_RECORD_FAILURE_DELAY_MS,
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            output_types: default_output_types(),
            selection: SelectionPolicy::default(),
        }
    }
}

impl Settings {
    /// Full path to the transcription cache database.
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_filename)
    }

    /// Validated values for the orchestrators.
    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        if self.output_types.is_empty() {
            return Err(ConfigError::Missing("output_types"));
        }
        if let Some(bad) = self
            .output_types
            .iter()
            .find(|t| t.name.trim().is_empty() || t.mimetype.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                key: "output_types",
                reason: format!("type {:?} needs both a name and a mimetype", bad.name),
            });
        }
        if self.selection.rules.is_empty() {
            return Err(ConfigError::Missing("selection.rules"));
        }

        Ok(SyncConfig {
            output_types: self.output_types.clone(),
            selection: self.selection.clone(),
            record_failure_delay: Duration::from_millis(self.record_failure_delay_ms),
        })
    }

    /// Connection settings for the image/transcription service.
    pub fn source_client_config(&self) -> Result<HttpClientConfig, ConfigError> {
        let base_url = required_url("source_url", self.source_url.as_deref())?;
        Ok(self.client_config(base_url, self.source_token.clone()))
    }

    /// Connection settings for the text repository.
    pub fn target_client_config(&self) -> Result<HttpClientConfig, ConfigError> {
        let base_url = required_url("target_url", self.target_url.as_deref())?;
        Ok(self.client_config(base_url, None))
    }

    fn client_config(&self, base_url: String, token: Option<String>) -> HttpClientConfig {
        HttpClientConfig {
            base_url,
            timeout: Duration::from_secs(self.request_timeout),
            user_agent: self.user_agent.clone(),
            token,
        }
    }
}

fn required_url(key: &'static str, value: Option<&str>) -> Result<String, ConfigError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))?;
    url::Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    Ok(value.to_string())
}

/// Values injected into the import and deletion orchestrators.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub output_types: Vec<OutputTypeConfig>,
    pub selection: SelectionPolicy,
    /// Pause after a record fails before the next one starts.
    pub record_failure_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            output_types: default_output_types(),
            selection: SelectionPolicy::default(),
            record_failure_delay: Duration::from_millis(DEFAULT_RECORD_FAILURE_DELAY_MS),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Cache database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Pause after a failed record in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_failure_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_threshold: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_types: Option<Vec<OutputTypeConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionPolicy>,

    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers scansync config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("scansync").await {
            Ok(pref_config) => Self::from_prefer(&pref_config),
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Extract the known keys from a prefer config. Missing or mistyped
    /// keys are left unset.
    pub fn from_prefer(pref_config: &prefer::Config) -> Self {
        Config {
            target: pref_config.get("target").ok(),
            cache: pref_config.get("cache").ok(),
            source_url: pref_config.get("source_url").ok(),
            source_token: pref_config.get("source_token").ok(),
            target_url: pref_config.get("target_url").ok(),
            user_agent: pref_config.get("user_agent").ok(),
            request_timeout: pref_config.get("request_timeout").ok(),
            record_failure_delay_ms: pref_config.get("record_failure_delay_ms").ok(),
            cache_threshold: pref_config.get("cache_threshold").ok(),
            output_types: pref_config.get("output_types").ok(),
            selection: pref_config.get("selection").ok(),
            source_path: pref_config.source_path().cloned(),
        }
    }

    /// Load configuration from a specific TOML or JSON file.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed: Result<Config, String> = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(&contents).map_err(|e| e.to_string())
        };

        let mut config = parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref target) = self.target {
            settings.data_dir = self.resolve_path(target, base_dir);
        }
        if let Some(ref cache) = self.cache {
            settings.cache_filename = cache.clone();
        }
        if let Some(ref url) = self.source_url {
            settings.source_url = Some(url.clone());
        }
        if let Some(ref token) = self.source_token {
            settings.source_token = Some(token.clone());
        }
        if let Some(ref url) = self.target_url {
            settings.target_url = Some(url.clone());
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.record_failure_delay_ms {
            settings.record_failure_delay_ms = delay;
        }
        if let Some(threshold) = self.cache_threshold {
            settings.cache_threshold = threshold;
        }
        if let Some(ref types) = self.output_types {
            settings.output_types = types.clone();
        }
        if let Some(ref selection) = self.selection {
            settings.selection = selection.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Override data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
    pub source_url: Option<String>,
    pub source_token: Option<String>,
    pub target_url: Option<String>,
}

/// Load settings with explicit options.
///
/// An explicit config file that cannot be read or parsed is an error;
/// a missing auto-discovered one is not.
pub async fn load_settings_with_options(options: LoadOptions) -> Result<Settings, ConfigError> {
    let config = match &options.config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    // Config file directory, falling back to CWD
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }
    if options.source_url.is_some() {
        settings.source_url = options.source_url;
    }
    if options.source_token.is_some() {
        settings.source_token = options.source_token;
    }
    if options.target_url.is_some() {
        settings.target_url = options.target_url;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::TranscriberRule;

    #[tokio::test]
    async fn test_load_toml_resolves_relative_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scansync.toml");
        std::fs::write(
            &path,
            r#"
target = "data"
source_url = "https://scans.example.org/api/"
target_url = "https://textrepo.example.org/"
request_timeout = 15
record_failure_delay_ms = 0

[[output_types]]
name = "hocr"
mimetype = "text/html"

[selection]
rules = [{ transcriber = "Tesseract4", output_type = "hocr" }]
"#,
        )
        .unwrap();

        let settings = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.request_timeout, 15);
        assert_eq!(settings.output_types, vec![OutputTypeConfig::new("hocr", "text/html")]);
        assert_eq!(
            settings.selection.rules,
            vec![TranscriberRule::new("Tesseract4", "hocr")]
        );
        assert_eq!(settings.selection.status_filtered_transcriber, "Transkribus");

        let sync = settings.sync_config().unwrap();
        assert_eq!(sync.record_failure_delay, Duration::ZERO);

        let source = settings.source_client_config().unwrap();
        assert_eq!(source.timeout, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_discovered_config_reads_types_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scansync.toml");
        std::fs::write(
            &path,
            r#"
target_url = "https://textrepo.example.org/"
request_timeout = 20

[[output_types]]
name = "alto"
mimetype = "application/xml"

[selection]
rules = [{ transcriber = "Kraken", output_type = "alto" }]
"#,
        )
        .unwrap();

        let pref_config = prefer::Config::load_from_path(&path).await.unwrap();
        let config = Config::from_prefer(&pref_config);

        assert_eq!(config.target_url.as_deref(), Some("https://textrepo.example.org/"));
        assert_eq!(config.request_timeout, Some(20));
        assert_eq!(
            config.output_types,
            Some(vec![OutputTypeConfig::new("alto", "application/xml")])
        );
        let selection = config.selection.as_ref().unwrap();
        assert_eq!(selection.rules, vec![TranscriberRule::new("Kraken", "alto")]);
        assert_eq!(selection.status_filtered_transcriber, "Transkribus");
        assert_eq!(selection.allowed_statuses.len(), 3);
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scansync.json");
        std::fs::write(&path, r#"{"target_url": "https://file.example.org/"}"#).unwrap();

        let settings = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            target_url: Some("https://flag.example.org/".to_string()),
            data_dir: Some(dir.path().join("elsewhere")),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(settings.target_url.as_deref(), Some("https://flag.example.org/"));
        assert_eq!(settings.cache_path(), dir.path().join("elsewhere").join("transcriptions.db"));
    }

    #[tokio::test]
    async fn test_unparseable_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scansync.toml");
        std::fs::write(&path, "request_timeout = \"soon\"").unwrap();

        let err = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_urls_abort() {
        let settings = Settings::default();
        assert!(matches!(
            settings.source_client_config(),
            Err(ConfigError::Missing("source_url"))
        ));
        assert!(matches!(
            settings.target_client_config(),
            Err(ConfigError::Missing("target_url"))
        ));

        let settings = Settings {
            target_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            settings.target_client_config(),
            Err(ConfigError::Invalid { key: "target_url", .. })
        ));
    }

    #[test]
    fn test_empty_output_types_abort() {
        let settings = Settings {
            output_types: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            settings.sync_config(),
            Err(ConfigError::Missing("output_types"))
        ));
    }
}
