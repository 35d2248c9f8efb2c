//! Configuration management for dfjit
//!
//! Settings come from defaults, an optional TOML or YAML configuration file
//! and environment variables, applied in that order.

use std::fs;
use std::path::{Path, PathBuf};

use dfjit_shared::constants::DEFAULT_SCOPE_PREFIX;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Code generation settings
    pub jit: JitConfig,
    /// Event loop settings
    pub execution: ExecutionConfig,
}

/// Code generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Prefix of the scopes synthesized for text expressions
    pub scope_prefix: String,
    /// Log generated fragments at `info` instead of `debug`
    pub log_generated_code: bool,
}

/// Event loop settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Number of parallel slots; 0 uses the rayon thread count
    pub slots: usize,
    /// Columns used by operations that are given none
    pub default_columns: Vec<String>,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_string(),
            log_generated_code: false,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        Ok(config)
    }

    /// Load configuration from the first config file found and the environment
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::find_config_file(None) {
            config.merge_file(&config_path)?;
        }
        config.merge_env()?;

        Ok(config)
    }

    /// Find a configuration file in the current directory, then in `$HOME`
    pub fn find_config_file(current_dir: Option<&Path>) -> Option<PathBuf> {
        let current_dir = match current_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let config_names = ["dfjit.toml", ".dfjit.toml", "dfjit.yaml", ".dfjit.yaml"];

        for name in &config_names {
            let path = current_dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(home) = std::env::var("HOME") {
            for name in &config_names {
                let path = Path::new(&home).join(".config").join("dfjit").join(name);
                if path.exists() {
                    return Some(path);
                }
            }
        }

        None
    }

    /// Merge configuration from file
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid YAML config: {}", e)))?,
            _ => return Err(Error::config("Unsupported config file format")),
        };
        self.merge(file_config);
        log::debug!("Loaded configuration from {}", path.display());

        Ok(())
    }

    /// Merge configuration from environment variables
    pub fn merge_env(&mut self) -> Result<()> {
        self.merge_env_with_reader(|key| std::env::var(key).ok())
    }

    /// Merge configuration from environment variables with a custom reader
    pub fn merge_env_with_reader<F>(&mut self, env_reader: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = env_reader("DFJIT_SLOTS") {
            match val.parse() {
                Ok(slots) => self.execution.slots = slots,
                Err(_) => {
                    log::warn!("Ignoring invalid DFJIT_SLOTS value '{}'", val);
                    self.execution.slots = ExecutionConfig::default().slots;
                }
            }
        }

        if let Some(val) = env_reader("DFJIT_SCOPE_PREFIX") {
            if val.is_empty() {
                self.jit.scope_prefix = JitConfig::default().scope_prefix;
            } else {
                self.jit.scope_prefix = val;
            }
        }

        if let Some(val) = env_reader("DFJIT_LOG_CODE") {
            self.jit.log_generated_code = val != "0" && val.to_lowercase() != "false";
        }

        Ok(())
    }

    /// Merge another config into this one; only non-default values override
    pub fn merge(&mut self, other: Config) {
        let jit_defaults = JitConfig::default();
        if other.jit.scope_prefix != jit_defaults.scope_prefix {
            self.jit.scope_prefix = other.jit.scope_prefix;
        }
        if other.jit.log_generated_code {
            self.jit.log_generated_code = true;
        }

        if other.execution.slots != 0 {
            self.execution.slots = other.execution.slots;
        }
        if !other.execution.default_columns.is_empty() {
            self.execution.default_columns = other.execution.default_columns;
        }
    }

    /// Number of slots to run with
    pub fn slot_count(&self) -> usize {
        if self.execution.slots == 0 {
            rayon::current_num_threads()
        } else {
            self.execution.slots
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("toml");

        let content = match extension {
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?,
            _ => return Err(Error::config("Unsupported config file format")),
        };

        fs::write(path, content)
            .map_err(|e| Error::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let prefix = &config.jit.scope_prefix;
    let valid_prefix = prefix
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_prefix {
        return Err(Error::config(format!(
            "Scope prefix '{}' is not a valid identifier",
            prefix
        )));
    }

    if config.execution.slots > 1024 {
        return Err(Error::config("Slot count seems unreasonably high"));
    }

    for (i, column) in config.execution.default_columns.iter().enumerate() {
        if config.execution.default_columns[..i].contains(column) {
            return Err(Error::config(format!(
                "Default column '{}' is listed twice",
                column
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.jit.scope_prefix, "__dfjit_");
        assert!(!config.jit.log_generated_code);
        assert_eq!(config.execution.slots, 0);
        assert!(config.execution.default_columns.is_empty());
        assert!(config.slot_count() >= 1);
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_find_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path();

        fs::write(temp_path.join("dfjit.yaml"), "jit: {}").unwrap();
        assert_eq!(
            Config::find_config_file(Some(temp_path)).unwrap(),
            temp_path.join("dfjit.yaml")
        );

        fs::write(temp_path.join(".dfjit.toml"), "").unwrap();
        assert_eq!(
            Config::find_config_file(Some(temp_path)).unwrap(),
            temp_path.join(".dfjit.toml")
        );

        fs::write(temp_path.join("dfjit.toml"), "").unwrap();
        assert_eq!(
            Config::find_config_file(Some(temp_path)).unwrap(),
            temp_path.join("dfjit.toml")
        );
    }

    #[test]
    fn test_merge_file_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dfjit.toml");

        let toml_content = r#"
[jit]
scope_prefix = "__gen_"
log_generated_code = true

[execution]
slots = 4
default_columns = ["pt", "eta"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.jit.scope_prefix, "__gen_");
        assert!(config.jit.log_generated_code);
        assert_eq!(config.execution.slots, 4);
        assert_eq!(config.slot_count(), 4);
        assert_eq!(config.execution.default_columns, vec!["pt", "eta"]);
    }

    #[test]
    fn test_merge_file_yaml_keeps_unset_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dfjit.yml");

        fs::write(&config_path, "execution:\n  slots: 2\n").unwrap();

        let mut config = Config::default();
        config.jit.scope_prefix = "__mine_".to_string();
        config.merge_file(&config_path).unwrap();
        assert_eq!(config.jit.scope_prefix, "__mine_");
        assert_eq!(config.execution.slots, 2);
    }

    #[test]
    fn test_merge_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();

        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [").unwrap();
        assert!(config.merge_file(&config_path).is_err());

        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();
        let err = config.merge_file(&config_path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unsupported config file format"
        );

        let config_path = temp_dir.path().join("nonexistent.toml");
        assert!(config.merge_file(&config_path).is_err());
    }

    #[test]
    fn test_merge_env() {
        let mut config = Config::default();

        let env_reader = |key: &str| match key {
            "DFJIT_SLOTS" => Some("8".to_string()),
            "DFJIT_SCOPE_PREFIX" => Some("__env_".to_string()),
            "DFJIT_LOG_CODE" => Some("true".to_string()),
            _ => None,
        };
        config.merge_env_with_reader(env_reader).unwrap();

        assert_eq!(config.execution.slots, 8);
        assert_eq!(config.jit.scope_prefix, "__env_");
        assert!(config.jit.log_generated_code);
    }

    #[test]
    fn test_merge_env_invalid_values() {
        let mut config = Config::default();
        config.execution.slots = 3;

        let env_reader = |key: &str| match key {
            "DFJIT_SLOTS" => Some("many".to_string()),
            "DFJIT_SCOPE_PREFIX" => Some(String::new()),
            "DFJIT_LOG_CODE" => Some("0".to_string()),
            _ => None,
        };
        config.merge_env_with_reader(env_reader).unwrap();

        assert_eq!(config.execution.slots, 0);
        assert_eq!(config.jit.scope_prefix, "__dfjit_");
        assert!(!config.jit.log_generated_code);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.execution.slots = 6;
        config.execution.default_columns = vec!["x".to_string()];

        for name in ["saved.toml", "saved.yaml"] {
            let path = temp_dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(Config::load_from_file(&path).unwrap(), config);
        }

        assert!(config.save(&temp_dir.path().join("saved.ini")).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.jit.scope_prefix = "9lives".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.execution.slots = 4096;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.execution.default_columns = vec!["x".to_string(), "x".to_string()];
        assert!(validate_config(&config).is_err());
    }
}
