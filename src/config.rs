//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// External tool settings
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Which backend drives archives: "cli" (external zip/unzip) or
    /// "snapshot" (JSON snapshot files, no external tools)
    pub backend: String,
    /// Entries with this suffix are treated as nested archives
    pub nested_suffix: String,
    /// Reserved entry name of the per-archive manifest
    pub manifest_entry: String,
    /// How long a listing may take before the tool is killed
    pub list_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            backend: "cli".to_string(),
            nested_suffix: ".vfsarc".to_string(),
            manifest_entry: ".manifest.json".to_string(),
            list_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Program used for listing and extraction
    pub unzip: String,
    /// Program used for adding and removing entries
    pub zip: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            unzip: "unzip".to_string(),
            zip: "zip".to_string(),
        }
    }
}

/// Get the configuration directory (XDG on Unix, APPDATA on Windows)
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        return std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("varc"));
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|p| PathBuf::from(p).join(".config"))
            })
            .map(|p| p.join("varc"))
    }
}

pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Default config file contents with comments
fn default_config() -> String {
    r##"# varc configuration file

[general]
# Archive backend: "cli" (external zip/unzip) or "snapshot" (JSON files)
backend = "cli"
# Entries ending with this suffix open as nested archives
nested_suffix = ".vfsarc"
# Reserved entry name holding the archive manifest
manifest_entry = ".manifest.json"
# Seconds a listing may take before the tool is killed
list_timeout_secs = 3

[tools]
# External programs driving the archives
unzip = "unzip"
zip = "zip"
"##
    .to_string()
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Self {
        let Some(config_path) = config_file() else {
            eprintln!("Warning: Could not determine config directory");
            return Config::default();
        };

        if let Some(config_dir) = config_path.parent()
            && !config_dir.exists()
            && let Err(e) = fs::create_dir_all(config_dir)
        {
            eprintln!("Warning: Could not create config directory: {}", e);
            return Config::default();
        }

        if !config_path.exists()
            && let Err(e) = fs::write(&config_path, default_config())
        {
            eprintln!("Warning: Could not create config file: {}", e);
            return Config::default();
        }

        match fs::read_to_string(&config_path) {
            Ok(content) => match toml_edit::de::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Could not parse config file: {}", e);
                    eprintln!("Using default configuration");
                    Config::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Could not read config file: {}", e);
                Config::default()
            }
        }
    }

    /// Save configuration to file
    #[allow(dead_code)]
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = config_file().ok_or("Could not determine config path")?;
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir)?;
        }
        fs::write(&config_path, toml_edit::ser::to_string_pretty(self)?)?;
        Ok(())
    }
}
