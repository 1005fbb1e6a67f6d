//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory under which each render job gets its own working directory.
    pub work_dir: PathBuf,

    /// Default rendering parameters.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Canonical output frame rate every clip is re-stamped to.
    pub fps: u32,

    /// Number of render jobs allowed to run concurrently in a batch.
    pub pool_size: usize,

    /// Number of effect clips one job may encode in parallel.
    pub clip_concurrency: usize,

    /// Relative mismatch between scheduled and narration duration above
    /// which group durations are rescaled.
    pub rescale_tolerance: f64,

    /// Shortest clip the effect renderer will encode (seconds).
    pub min_clip_secs: f64,

    /// x264 constant rate factor.
    pub crf: u32,

    /// x264 preset.
    pub preset: String,

    /// AAC bitrate for mixed audio and final output.
    pub audio_bitrate_kbps: u32,

    /// ffmpeg executable name or path.
    pub ffmpeg_bin: String,

    /// ffprobe executable name or path.
    pub ffprobe_bin: String,

    /// Keep per-job intermediate files after a successful render.
    pub keep_intermediates: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelsmith_render_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            render: RenderDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            fps: 25,
            pool_size: 2,
            clip_concurrency: 2,
            rescale_tolerance: 0.1,
            min_clip_secs: 0.5,
            crf: 23,
            preset: "fast".to_string(),
            audio_bitrate_kbps: 192,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            keep_intermediates: false,
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
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

impl RenderDefaults {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), crate::error::ReelError> {
        if self.fps == 0 {
            return Err(crate::error::ReelError::config("fps must be positive"));
        }
        if self.pool_size == 0 || self.clip_concurrency == 0 {
            return Err(crate::error::ReelError::config(
                "pool_size and clip_concurrency must be at least 1",
            ));
        }
        if !self.rescale_tolerance.is_finite() || self.rescale_tolerance < 0.0 {
            return Err(crate::error::ReelError::config(
                "rescale_tolerance must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelsmith").join("config.json")
}

/// Default root for per-job working directories.
fn default_work_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("reelsmith").join("jobs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_defaults() {
        let defaults = RenderDefaults::default();
        assert_eq!(defaults.fps, 25);
        assert!((defaults.rescale_tolerance - 0.1).abs() < 1e-12);
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"render":{"pool_size":4}}"#).unwrap();
        assert_eq!(parsed.render.pool_size, 4);
        assert_eq!(parsed.render.fps, 25);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let defaults = RenderDefaults {
            pool_size: 0,
            ..RenderDefaults::default()
        };
        assert!(defaults.validate().is_err());
    }
}
