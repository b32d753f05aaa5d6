//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$TNEFSHELL_CONFIG` (environment variable)
//! 2. `~/.config/tnefshell/config.toml` (Linux/macOS)
//!    `%APPDATA%\tnefshell\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default prefix for synthesized body-part file names.
pub const DEFAULT_BODY_PART_PREFIX: &str = "body_part_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Options passed to the decoder for every stream.
    pub decoder: DecoderOptions,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Default output directory when `-o` is not given.
    pub output_dir: Option<PathBuf>,
}

/// Decoder options.
///
/// These are the only knobs the decoder reads. Everything else in [`Config`]
/// belongs to the command-line front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Also emit a plain-text dump of every decoded MAPI property table.
    pub attach_raw_mapi: bool,
    /// Use attachment file names verbatim instead of re-decoding them
    /// with the stream's OEM code page.
    pub disable_filename_character_set: bool,
    /// `Some(false)` suppresses calendar synthesis. `None` and `Some(true)`
    /// both synthesize; downstream consumers decide what to do with it.
    pub direct_to_calendar: Option<bool>,
    /// Prefix for body-part artifact names.
    pub body_part_prefix: String,
    /// Verbosity of internal diagnostics (0 = quiet, 1+ = per-attribute dumps).
    pub debug_level: u8,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Size of each chunk fed to the decoder when streaming a file (default: 65536 = 64 KB).
    pub read_buffer_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            output_dir: None,
        }
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            attach_raw_mapi: false,
            disable_filename_character_set: false,
            direct_to_calendar: None,
            body_part_prefix: DEFAULT_BODY_PART_PREFIX.to_string(),
            debug_level: 0,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 64 * 1024, // 64 KB
        }
    }
}

impl DecoderOptions {
    /// Whether calendar artifacts should be synthesized at all.
    pub fn calendar_enabled(&self) -> bool {
        self.direct_to_calendar != Some(false)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("TNEFSHELL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("tnefshell").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tnefshell")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("tnefshell.log")
}
