//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ClipmergeError, ClipmergeResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Merge planning defaults.
    #[serde(default)]
    pub merge: MergeDefaults,

    /// Export settings handed to the export driver.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults used when building a merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeDefaults {
    /// Canvas width used until a first clip provides its own size.
    pub canvas_width: u32,

    /// Canvas height used until a first clip provides its own size.
    pub canvas_height: u32,

    /// Output frame rate.
    pub frame_rate: u32,

    /// File name proposed for the merged output.
    pub default_output_name: String,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Quality preset name (`highest_quality`, `medium_quality`, `low_quality`).
    pub preset: String,

    /// Output container (`mov`).
    pub container: String,

    /// Move the index to the front of the file for progressive playback.
    pub optimize_for_network: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipmerge=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            merge: MergeDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MergeDefaults {
    fn default() -> Self {
        Self {
            canvas_width: 640,
            canvas_height: 480,
            frame_rate: 30,
            default_output_name: "mergeVideo.mov".to_string(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            preset: "highest_quality".to_string(),
            container: "mov".to_string(),
            optimize_for_network: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> ClipmergeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no merge could be built from.
    pub fn validate(&self) -> ClipmergeResult<()> {
        if self.merge.canvas_width == 0 || self.merge.canvas_height == 0 {
            return Err(ClipmergeError::config("canvas dimensions must be non-zero"));
        }
        if self.merge.frame_rate == 0 {
            return Err(ClipmergeError::config("frame rate must be non-zero"));
        }
        Ok(())
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipmerge").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_merge_screen() {
        let config = AppConfig::default();
        assert_eq!(config.merge.canvas_width, 640);
        assert_eq!(config.merge.canvas_height, 480);
        assert_eq!(config.merge.frame_rate, 30);
        assert_eq!(config.merge.default_output_name, "mergeVideo.mov");
        assert_eq!(config.export.preset, "highest_quality");
        assert!(config.export.optimize_for_network);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"merge":{"frame_rate":25},"logging":{"level":"debug"}}"#)
                .unwrap();
        assert_eq!(config.merge.frame_rate, 25);
        assert_eq!(config.merge.canvas_width, 640);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.export.container, "mov");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("clipmerge_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.merge.default_output_name = "joined.mov".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.merge.default_output_name, "joined.mov");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_frame_rate_rejected() {
        let mut config = AppConfig::default();
        config.merge.frame_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ClipmergeError::Config { .. })
        ));
    }
}
