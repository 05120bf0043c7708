//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Bootstrap configuration loaded from a module's TOML file
/// (`~/.config/pictor/<module>.toml`)
///
/// These settings cannot change while the service is running; runtime
/// settings live in the database `settings` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder override (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LLM API key (lowest-priority source; database and ENV override)
    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// Chat-completions endpoint base URL override
    #[serde(default)]
    pub llm_base_url: Option<String>,

    /// LLM model name override
    #[serde(default)]
    pub llm_model: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file_key: Option<&str>,
) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Some(key) = config_file_key {
        if let Ok(config_path) = load_config_file() {
            if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
                if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                    if let Some(root_folder) = config.get(key).and_then(|v| v.as_str()) {
                        return Ok(PathBuf::from(root_folder));
                    }
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(get_default_root_folder())
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    let config_dir = if cfg!(target_os = "linux") {
        // Try ~/.config/pictor/config.toml first, then /etc/pictor/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("pictor").join("config.toml"));
        let system_config = PathBuf::from("/etc/pictor/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        dirs::config_dir()
            .map(|d| d.join("pictor").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    } else {
        return Err(Error::Config("Unsupported platform".to_string()));
    };

    if config_dir.exists() {
        Ok(config_dir)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {:?}",
            config_dir
        )))
    }
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/pictor (or /var/lib/pictor for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("pictor"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/pictor"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/pictor
        dirs::data_dir()
            .map(|d| d.join("pictor"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/pictor"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\pictor
        dirs::data_local_dir()
            .map(|d| d.join("pictor"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\pictor"))
    } else {
        PathBuf::from("./pictor_data")
    }
}

/// Resolves the root folder for a service module at startup
pub struct RootFolderResolver {
    module_name: String,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Resolve the root folder via ENV → TOML → OS default.
    ///
    /// Infallible: the compiled default always exists as the final tier.
    pub fn resolve(&self) -> PathBuf {
        let root = resolve_root_folder(None, "PICTOR_ROOT_FOLDER", Some("root_folder"))
            .unwrap_or_else(|_| get_default_root_folder());
        info!(
            "Root folder for {}: {}",
            self.module_name,
            root.display()
        );
        root
    }
}

/// Prepares the resolved root folder on disk
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    /// Path of the shared SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("pictor.db")
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// Per-module bootstrap TOML path (`~/.config/pictor/<module>.toml`)
pub fn module_toml_path(module_name: &str) -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("pictor").join(format!("{}.toml", module_name)))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load a module's bootstrap TOML, falling back to defaults when the file
/// does not exist
pub fn load_module_toml(module_name: &str) -> Result<TomlConfig> {
    let path = module_toml_path(module_name)?;
    if !path.exists() {
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a bootstrap TOML config (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_cli_arg_takes_priority() {
        let root = resolve_root_folder(Some("/tmp/cli-root"), "PICTOR_TEST_UNSET", None).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/cli-root"));
    }

    #[test]
    #[serial]
    fn test_env_var_overrides_default() {
        std::env::set_var("PICTOR_TEST_ROOT", "/tmp/env-root");
        let root = resolve_root_folder(None, "PICTOR_TEST_ROOT", None).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/env-root"));
        std::env::remove_var("PICTOR_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn test_default_when_nothing_configured() {
        std::env::remove_var("PICTOR_TEST_ROOT");
        // Falls through to the OS default, never errors
        let root = resolve_root_folder(None, "PICTOR_TEST_ROOT", None).unwrap();
        assert!(!root.as_os_str().is_empty());
    }

    #[test]
    fn test_toml_config_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.root_folder.is_none());
        assert!(config.llm_api_key.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pictor-at.toml");

        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/assets")),
            logging: LoggingConfig::default(),
            llm_api_key: Some("key-123".to_string()),
            llm_base_url: None,
            llm_model: Some("gpt-4o-mini".to_string()),
        };
        write_toml_config(&config, &path).unwrap();

        let parsed: TomlConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.root_folder, Some(PathBuf::from("/assets")));
        assert_eq!(parsed.llm_api_key, Some("key-123".to_string()));
        assert_eq!(parsed.llm_model, Some("gpt-4o-mini".to_string()));
    }

    #[test]
    fn test_initializer_creates_directory_and_db_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("root");

        let initializer = RootFolderInitializer::new(root.clone());
        initializer.ensure_directory_exists().unwrap();

        assert!(root.is_dir());
        assert_eq!(initializer.database_path(), root.join("pictor.db"));
    }
}
