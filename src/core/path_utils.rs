/*
 * Locates the per-user directories the application stores its data in and makes sure they
 * exist. `AppPaths` names every file inside the data directory so the rest of the code never
 * builds these paths by hand.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const LIBRARY_FILENAME: &str = "games.json";
pub const TAGS_FILENAME: &str = "tags.json";
pub const THUMBNAILS_DIRNAME: &str = "thumbnails";
pub const LOG_FILENAME: &str = "gamedb.log";

fn ensure_dir(kind: &str, path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            log::error!("PathUtils: Failed to create {kind} directory {path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created {kind} directory: {path:?}");
    }
    Some(path.to_path_buf())
}

/*
 * Per-user local data directory for `app_name` (e.g. AppData/Local/<app>/data on Windows,
 * ~/.local/share/<app> on Linux), created if missing. `None` when no home directory can be
 * determined or the directory cannot be created.
 */
pub fn get_base_app_data_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving app data dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|dirs| ensure_dir("app data", dirs.data_local_dir()))
}

// Per-user local configuration directory for `app_name`, created if missing.
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving app config dir for '{app_name}'");
    ProjectDirs::from("", "", app_name)
        .and_then(|dirs| ensure_dir("app config", dirs.config_local_dir()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub base_dir: PathBuf,
    pub library_file: PathBuf,
    pub tags_file: PathBuf,
    pub thumbnails_dir: PathBuf,
    pub log_file: PathBuf,
}

impl AppPaths {
    pub fn from_base_dir(base_dir: &Path) -> Self {
        AppPaths {
            base_dir: base_dir.to_path_buf(),
            library_file: base_dir.join(LIBRARY_FILENAME),
            tags_file: base_dir.join(TAGS_FILENAME),
            thumbnails_dir: base_dir.join(THUMBNAILS_DIRNAME),
            log_file: base_dir.join(LOG_FILENAME),
        }
    }

    pub fn for_current_user(app_name: &str) -> Option<Self> {
        get_base_app_data_dir(app_name).map(|dir| Self::from_base_dir(&dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remove_quietly(path: &Path) {
        if path.exists()
            && let Err(e) = fs::remove_dir_all(path)
        {
            eprintln!("Test cleanup failed for {}: {e}", path.display());
        }
    }

    #[test]
    fn test_get_base_app_data_dir_creates_if_not_exists() {
        // Arrange
        let unique_app_name = format!("TestApp_PathUtils_Data_{}", rand::random::<u128>());

        // Act
        let path = get_base_app_data_dir(&unique_app_name).expect("data dir resolves");

        // Assert
        assert!(path.is_dir(), "Directory should have been created at {path:?}");
        assert!(
            path.to_string_lossy()
                .to_lowercase()
                .contains(&unique_app_name.to_lowercase())
        );
        assert_eq!(get_base_app_data_dir(&unique_app_name), Some(path.clone()));

        remove_quietly(&path);
    }

    #[test]
    fn test_get_base_app_config_local_dir_creates_if_not_exists() {
        let unique_app_name = format!("TestApp_PathUtils_Config_{}", rand::random::<u128>());

        let path = get_base_app_config_local_dir(&unique_app_name).expect("config dir resolves");

        assert!(path.is_dir());
        remove_quietly(&path);
    }

    #[test]
    fn test_app_paths_layout() {
        let paths = AppPaths::from_base_dir(Path::new("/data/gamedb"));

        assert_eq!(paths.library_file, PathBuf::from("/data/gamedb/games.json"));
        assert_eq!(paths.tags_file, PathBuf::from("/data/gamedb/tags.json"));
        assert_eq!(paths.thumbnails_dir, PathBuf::from("/data/gamedb/thumbnails"));
        assert_eq!(paths.log_file, PathBuf::from("/data/gamedb/gamedb.log"));
    }
}
