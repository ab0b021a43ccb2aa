use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::{SessionStore, WatchSession};
use crate::error::{ConverterError, Result};

/// Default location of the persisted configuration record
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Persisted application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory watched for new captures
    #[serde(default)]
    pub input_dir: String,

    /// Directory converted images are written to
    #[serde(default)]
    pub output_dir: String,

    /// Remove the source file after a successful conversion
    #[serde(default)]
    pub delete_original: bool,

    /// Kept for the desktop front-end, unused by the pipeline
    #[serde(default)]
    pub minimize_to_tray: bool,

    /// Write the log to `<output_dir>/z_log.txt` instead of stderr
    #[serde(default)]
    pub output_to_log: bool,

    /// Conversion tool and timing settings
    #[serde(default)]
    pub conversion: ConversionSettings,
}

/// External tool, naming and timing settings for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    /// Conversion executable, resolved through `PATH`
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Arguments placed before `<source> <output>`
    #[serde(default)]
    pub tool_args: Vec<String>,

    /// Extension (without dot) of files eligible for conversion
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Appended to the source stem when naming the output
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Extension (without dot) of the converted file
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Wait after a creation event before probing
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Interval between readiness probes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up on a file that stays unreadable this long
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
}

// Default value functions
fn default_tool() -> String { "hdrfix".to_string() }
fn default_source_extension() -> String { "jxr".to_string() }
fn default_output_suffix() -> String { "-sdr".to_string() }
fn default_output_extension() -> String { "jpg".to_string() }
fn default_settle_delay_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_readiness_timeout_ms() -> u64 { 10_000 }

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            tool_args: Vec::new(),
            source_extension: default_source_extension(),
            output_suffix: default_output_suffix(),
            output_extension: default_output_extension(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
        }
    }
}

impl ConversionSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: String::new(),
            output_dir: String::new(),
            delete_original: false,
            minimize_to_tray: false,
            output_to_log: false,
            conversion: ConversionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration, falling back to defaults when the file is
    /// missing or cannot be parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::read(path) {
            Ok(config) => {
                info!("Configuration loaded from: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Error loading config: {}", e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConverterError::ConfigStore {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConverterError::ConfigStore {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConverterError::ConfigStore {
            path: path.to_path_buf(),
            reason: format!("Serialization error: {}", e),
        })?;

        fs::write(path, content).map_err(|e| ConverterError::ConfigStore {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Session parameters read by the watcher at start time
    pub fn session(&self) -> WatchSession {
        WatchSession {
            input_dir: PathBuf::from(&self.input_dir),
            output_dir: PathBuf::from(&self.output_dir),
            delete_original: self.delete_original,
        }
    }

    /// Copy session parameters back into the record
    pub fn apply_session(&mut self, session: &WatchSession) {
        self.input_dir = session.input_dir.to_string_lossy().into_owned();
        self.output_dir = session.output_dir.to_string_lossy().into_owned();
        self.delete_original = session.delete_original;
    }
}

/// Persists session parameters into the JSON configuration file
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonConfigStore {
    fn persist(&self, session: &WatchSession) -> Result<()> {
        let mut config = AppConfig::load(&self.path);
        config.apply_session(session);
        config.save(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.conversion.tool, "hdrfix");
        assert_eq!(config.conversion.settle_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_file_resets_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn test_flat_record_without_conversion_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "input_dir": "C:/Captures",
                "output_dir": "C:/Converted",
                "delete_original": true,
                "minimize_to_tray": true,
                "output_to_log": false
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.input_dir, "C:/Captures");
        assert!(config.delete_original);
        assert!(config.minimize_to_tray);
        assert_eq!(config.conversion, ConversionSettings::default());
    }

    #[test]
    fn test_store_preserves_other_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.minimize_to_tray = true;
        config.conversion.tool = "custom-tool".to_string();
        config.save(&path).unwrap();

        let store = JsonConfigStore::new(&path);
        store
            .persist(&WatchSession {
                input_dir: PathBuf::from("in"),
                output_dir: PathBuf::from("out"),
                delete_original: true,
            })
            .unwrap();

        let reloaded = AppConfig::load(&path);
        assert_eq!(reloaded.input_dir, "in");
        assert_eq!(reloaded.output_dir, "out");
        assert!(reloaded.delete_original);
        assert!(reloaded.minimize_to_tray);
        assert_eq!(reloaded.conversion.tool, "custom-tool");
    }
}
