use crate::core::models::{GameType, ScanEntry};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

/*
 * This module classifies the direct children of a directory into game candidates.
 * It never recurses: the browse UI expands folders lazily and asks for one level at a time.
 * Folders are always reported; files are reported only when their extension marks them as a
 * known archive or disc image. Symbolic links are skipped entirely.
 */

// Bracketed and parenthesised release annotations such as "[JP]" or "(2020)".
static ANNOTATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[.*?\]|\(.*?\)").expect("annotation pattern is a valid regex")
});

pub trait ScannerOperations: Send + Sync {
    /*
     * Reports each classified direct child of `directory` to `on_entry`, in the order the
     * filesystem enumerates them. A directory that does not exist produces no entries and no
     * error; unreadable children are logged and skipped.
     */
    fn scan_directory(&self, directory: &Path, on_entry: &mut dyn FnMut(ScanEntry));
}

pub struct CoreScanner {}

impl CoreScanner {
    pub fn new() -> Self {
        CoreScanner {}
    }
}

impl Default for CoreScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerOperations for CoreScanner {
    fn scan_directory(&self, directory: &Path, on_entry: &mut dyn FnMut(ScanEntry)) {
        if !directory.is_dir() {
            log::debug!("Scanner: {directory:?} does not exist or is not a directory; nothing to scan.");
            return;
        }
        log::debug!("Scanner: Scanning {directory:?}.");

        let walker = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        let mut emitted = 0usize;
        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Scanner: Skipping unreadable entry in {directory:?}: {e}");
                    continue;
                }
            };
            if entry.path_is_symlink() {
                log::trace!("Scanner: Skipping symbolic link {:?}.", entry.path());
                continue;
            }

            let is_dir = entry.file_type().is_dir();
            let original_name = entry.file_name().to_string_lossy().into_owned();
            let kind = determine_type(entry.path(), is_dir);
            if kind == GameType::Unknown {
                continue;
            }

            let display_name = clean_game_name(&original_name);
            on_entry(ScanEntry {
                absolute_path: entry.path().to_path_buf(),
                original_name,
                display_name,
                kind,
            });
            emitted += 1;
        }
        log::debug!("Scanner: Found {emitted} candidates in {directory:?}.");
    }
}

pub fn determine_type(path: &Path, is_dir: bool) -> GameType {
    if is_dir {
        return GameType::Folder;
    }
    path.extension()
        .map(|ext| GameType::from_extension(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(GameType::Unknown)
}

/*
 * Derives a display name from a raw entry name: drops everything after the last dot unless the
 * dot is the first character, removes "[...]" and "(...)" groups, turns underscores into spaces
 * and collapses runs of whitespace. Folders are treated like files, so "Game.v2" becomes "Game".
 */
pub fn clean_game_name(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };

    let without_annotations = ANNOTATION_PATTERN.replace_all(stem, "");
    let spaced = without_annotations.replace('_', " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
