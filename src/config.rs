//! Parser tuning configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSIFT_CONFIG` (environment variable)
//! 2. `~/.config/mailsift/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsift\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Byte-level parser tuning.
    pub parser: ParserConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Byte-level parser tuning.
///
/// The defaults match the archive sizes the library is built for: Gmail
/// Takeout spools of tens of gigabytes read in 100 MiB slices, in-memory
/// buffers sliced at 5 MiB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Chunk size for path-mode sources (default: 100 MiB).
    pub file_chunk_size: usize,
    /// Chunk size for buffer-mode sources (default: 5 MiB).
    pub buffer_chunk_size: usize,
    /// Buffers larger than this are re-chunked at `file_chunk_size` to avoid
    /// whole-buffer string conversion (default: 500 MiB).
    pub large_buffer_threshold: usize,
    /// Maximum size of a single message before it is emitted early
    /// (default: 100 MiB).
    pub max_message_size: usize,
    /// Fraction of non-printable ASCII in a body prefix that triggers the
    /// binary-content guard (default: 0.30).
    pub binary_guard_threshold: f64,
    /// Emit a yield-to-host checkpoint every this many records (default: 100).
    pub yield_interval: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            file_chunk_size: 100 * 1024 * 1024,
            buffer_chunk_size: 5 * 1024 * 1024,
            large_buffer_threshold: 500 * 1024 * 1024,
            max_message_size: 100 * 1024 * 1024,
            binary_guard_threshold: 0.30,
            yield_interval: 100,
        }
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

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSIFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailsift").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsift")
}
