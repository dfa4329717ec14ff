//! CLI argument definitions for the Glide simulator.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Glide — gesture-types text on a simulated QWERTY keyboard.
#[derive(Parser, Debug)]
#[command(name = "glide", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Word list files, one `word [frequency]` per line. Repeatable.
    #[arg(short = 'w', long = "words")]
    pub words: Vec<PathBuf>,

    /// Text to gesture-type, one swipe per word.
    #[arg(short = 't', long = "text", default_value = "hello world")]
    pub text: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Simulate power-saving mode, which turns gesture typing off.
    #[arg(long = "power-saving")]
    pub power_saving: bool,

    /// Type with caps lock on.
    #[arg(long = "caps")]
    pub caps: bool,

    /// How long to wait for the dictionaries to load, in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    pub timeout_ms: u64,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > GLIDE_CONFIG env var > ~/.glide/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("GLIDE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve the power-saving state.
    ///
    /// Priority: --power-saving flag > config file value.
    pub fn resolve_power_saving(&self, config_power_saving: bool) -> bool {
        self.power_saving || config_power_saving
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".glide").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".glide").join("config.toml");
    }
    PathBuf::from("config.toml")
}
