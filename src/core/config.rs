/*
 * Small per-user settings that are not part of the library itself. Currently this is the root
 * directory the user last browsed, so the browser can re-open it on startup.
 */
use crate::core::path_utils;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const LAST_ROOT_PATH_FILENAME: &str = "last_root_path.txt";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    NoConfigDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine the configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub trait ConfigManagerOperations: Send + Sync {
    fn load_last_root_path(&self, app_name: &str) -> Result<Option<PathBuf>>;
    // `None` clears the stored value.
    fn save_last_root_path(&self, app_name: &str, root: Option<&Path>) -> Result<()>;
}

pub struct CoreConfigManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    // Stores settings in `config_dir` instead of the per-user configuration directory.
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        CoreConfigManager {
            config_dir_override: Some(config_dir),
        }
    }

    fn config_dir(&self, app_name: &str) -> Result<PathBuf> {
        match &self.config_dir_override {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoConfigDirectory),
        }
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_last_root_path(&self, app_name: &str) -> Result<Option<PathBuf>> {
        let file_path = self.config_dir(app_name)?.join(LAST_ROOT_PATH_FILENAME);
        let contents = match fs::read_to_string(&file_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("CoreConfigManager: No last root file at {file_path:?}.");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let path_text = contents.trim();
        if path_text.is_empty() {
            return Ok(None);
        }
        log::debug!("CoreConfigManager: Loaded last root '{path_text}' from {file_path:?}.");
        Ok(Some(PathBuf::from(path_text)))
    }

    fn save_last_root_path(&self, app_name: &str, root: Option<&Path>) -> Result<()> {
        let file_path = self.config_dir(app_name)?.join(LAST_ROOT_PATH_FILENAME);
        let contents = root
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::write(&file_path, contents)?;
        log::debug!("CoreConfigManager: Saved last root {root:?} to {file_path:?}.");
        Ok(())
    }
}
