use super::handler::*;
use crate::core::clock::test_support::FixedClock;
use crate::core::config::{ConfigError, Result as ConfigResult};
use crate::core::launcher::{LaunchError, Result as LaunchResult};
use crate::core::persistence::test_support::MemoryFileStore;
use crate::core::{
    AppPaths, CaptureOutcome, ConfigManagerOperations, GameLauncherOperations, GameRecord,
    GameType, ScanEntry, ScannerOperations, ThumbnailCaptureOperations,
};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use time::macros::datetime;

const SCAN_TIMEOUT: Duration = Duration::from_secs(5);

// Mock for ConfigManagerOperations
struct MockConfigManager {
    last_root: Mutex<Option<PathBuf>>,
    fail_saves: Mutex<bool>,
    saved: Mutex<Vec<Option<PathBuf>>>,
}

impl MockConfigManager {
    fn new() -> Self {
        MockConfigManager {
            last_root: Mutex::new(None),
            fail_saves: Mutex::new(false),
            saved: Mutex::new(Vec::new()),
        }
    }

    fn set_last_root(&self, root: Option<PathBuf>) {
        *self.last_root.lock().unwrap() = root;
    }

    fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    fn get_saved(&self) -> Vec<Option<PathBuf>> {
        self.saved.lock().unwrap().clone()
    }
}

impl ConfigManagerOperations for MockConfigManager {
    fn load_last_root_path(&self, _app_name: &str) -> ConfigResult<Option<PathBuf>> {
        Ok(self.last_root.lock().unwrap().clone())
    }

    fn save_last_root_path(&self, app_name: &str, root: Option<&Path>) -> ConfigResult<()> {
        assert_eq!(app_name, APP_NAME);
        if *self.fail_saves.lock().unwrap() {
            return Err(ConfigError::NoConfigDirectory);
        }
        self.saved.lock().unwrap().push(root.map(Path::to_path_buf));
        Ok(())
    }
}

// Mock for ScannerOperations: serves preset entries per directory and records requests.
struct MockScanner {
    entries: Mutex<HashMap<PathBuf, Vec<ScanEntry>>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockScanner {
    fn new() -> Self {
        MockScanner {
            entries: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn set_entries(&self, directory: &Path, entries: Vec<ScanEntry>) {
        self.entries
            .lock()
            .unwrap()
            .insert(directory.to_path_buf(), entries);
    }

    fn get_calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScannerOperations for MockScanner {
    fn scan_directory(&self, directory: &Path, on_entry: &mut dyn FnMut(ScanEntry)) {
        self.calls.lock().unwrap().push(directory.to_path_buf());
        let entries = self
            .entries
            .lock()
            .unwrap()
            .get(directory)
            .cloned()
            .unwrap_or_default();
        for entry in entries {
            on_entry(entry);
        }
    }
}

// Mock for GameLauncherOperations
struct MockLauncher {
    fail_with: Mutex<Option<String>>,
    launched: Mutex<Vec<PathBuf>>,
}

impl MockLauncher {
    fn new() -> Self {
        MockLauncher {
            fail_with: Mutex::new(None),
            launched: Mutex::new(Vec::new()),
        }
    }

    fn set_failure(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    fn get_launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }
}

impl GameLauncherOperations for MockLauncher {
    fn launch(&self, game: &GameRecord) -> LaunchResult<u32> {
        if !game.has_launch_executable() {
            return Err(LaunchError::NoExecutable(game.file_path.clone()));
        }
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(LaunchError::Io(
                PathBuf::from(&game.launch_executable_path),
                io::Error::new(io::ErrorKind::NotFound, message),
            ));
        }
        self.launched.lock().unwrap().push(game.file_path.clone());
        Ok(4242)
    }
}

// Mock for ThumbnailCaptureOperations: answers every request with the preset outcome.
struct MockThumbnailCapture {
    outcome: Mutex<Option<CaptureOutcome>>,
    requests: Mutex<Vec<(PathBuf, Duration)>>,
}

impl MockThumbnailCapture {
    fn new() -> Self {
        MockThumbnailCapture {
            outcome: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn set_outcome(&self, outcome: CaptureOutcome) {
        *self.outcome.lock().unwrap() = Some(outcome);
    }

    fn get_requests(&self) -> Vec<(PathBuf, Duration)> {
        self.requests.lock().unwrap().clone()
    }
}

impl ThumbnailCaptureOperations for MockThumbnailCapture {
    fn start_capture(&self, executable: &Path, delay: Duration) -> Receiver<CaptureOutcome> {
        self.requests
            .lock()
            .unwrap()
            .push((executable.to_path_buf(), delay));
        let (outcome_tx, outcome_rx) = mpsc::channel();
        if let Some(outcome) = self.outcome.lock().unwrap().clone() {
            outcome_tx.send(outcome).unwrap();
        }
        outcome_rx
    }
}

struct Fixture {
    controller: LibraryController,
    storage: Arc<MemoryFileStore>,
    config: Arc<MockConfigManager>,
    scanner: Arc<MockScanner>,
    launcher: Arc<MockLauncher>,
    capture: Arc<MockThumbnailCapture>,
    paths: AppPaths,
    dir: TempDir,
}

fn setup_controller_with(storage: MemoryFileStore, config: MockConfigManager) -> Fixture {
    let dir = tempdir().unwrap();
    let paths = AppPaths::from_base_dir(Path::new("/data/gamedb"));
    let storage = Arc::new(storage);
    let config = Arc::new(config);
    let scanner = Arc::new(MockScanner::new());
    let launcher = Arc::new(MockLauncher::new());
    let capture = Arc::new(MockThumbnailCapture::new());
    let services = LibraryServices {
        storage: storage.clone(),
        clock: Arc::new(FixedClock(datetime!(2024-03-01 18:00 UTC))),
        scanner: scanner.clone(),
        config_manager: config.clone(),
        launcher: launcher.clone(),
        thumbnail_capture: capture.clone(),
    };
    let controller = LibraryController::new(&paths, services).unwrap();
    Fixture {
        controller,
        storage,
        config,
        scanner,
        launcher,
        capture,
        paths,
        dir,
    }
}

fn setup_controller() -> Fixture {
    setup_controller_with(MemoryFileStore::new(), MockConfigManager::new())
}

fn entry(path: &Path, kind: GameType) -> ScanEntry {
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    ScanEntry {
        absolute_path: path.to_path_buf(),
        original_name: name.clone(),
        display_name: name,
        kind,
    }
}

fn playable(path: &Path, name: &str) -> GameRecord {
    let mut record = GameRecord::new(path.to_path_buf(), name.to_string(), GameType::Folder);
    record.launch_executable_path = path.join("game.exe").to_string_lossy().into_owned();
    record
}

#[test]
fn test_startup_reopens_last_root_and_scans_it() {
    // Arrange
    let root = tempdir().unwrap();
    let config = MockConfigManager::new();
    config.set_last_root(Some(root.path().to_path_buf()));
    let mut fx = setup_controller_with(MemoryFileStore::new(), config);
    fx.scanner.set_entries(
        root.path(),
        vec![
            entry(&root.path().join("Series"), GameType::Folder),
            entry(&root.path().join("game.zip"), GameType::Zip),
        ],
    );

    // Act
    let notices = fx.controller.on_startup();
    let finished = fx.controller.wait_for_scans(SCAN_TIMEOUT);

    // Assert
    assert!(notices.is_empty());
    assert!(finished);
    assert!(!fx.controller.is_scanning());
    assert_eq!(fx.scanner.get_calls(), vec![root.path().to_path_buf()]);
    assert_eq!(fx.controller.browse().top_level().len(), 2);
    assert_eq!(fx.config.get_saved(), vec![Some(root.path().to_path_buf())]);
}

#[test]
fn test_startup_without_last_root_does_nothing() {
    let mut fx = setup_controller();

    let notices = fx.controller.on_startup();

    assert!(notices.is_empty());
    assert!(!fx.controller.is_scanning());
    assert!(fx.controller.browse().is_empty());
}

#[test]
fn test_open_root_rejects_missing_directory() {
    let mut fx = setup_controller();
    let missing = fx.dir.path().join("missing");

    let notices = fx.controller.open_root(&missing);

    assert!(matches!(notices.as_slice(), [AppNotice::Warning(_)]));
    assert!(fx.scanner.get_calls().is_empty());
    assert!(fx.config.get_saved().is_empty());
}

#[test]
fn test_open_root_reports_unsaved_config_but_still_scans() {
    let mut fx = setup_controller();
    fx.config.set_fail_saves(true);
    let root = fx.dir.path().to_path_buf();

    let notices = fx.controller.open_root(&root);
    fx.controller.wait_for_scans(SCAN_TIMEOUT);

    assert!(matches!(notices.as_slice(), [AppNotice::Warning(_)]));
    assert_eq!(fx.scanner.get_calls(), vec![root]);
}

#[test]
fn test_reopening_root_drops_results_for_previous_root() {
    // Arrange
    let mut fx = setup_controller();
    let old_root = fx.dir.path().join("old");
    let new_root = fx.dir.path().join("new");
    fs::create_dir(&old_root).unwrap();
    fs::create_dir(&new_root).unwrap();
    fx.scanner
        .set_entries(&old_root, vec![entry(&old_root.join("old.zip"), GameType::Zip)]);
    fx.scanner
        .set_entries(&new_root, vec![entry(&new_root.join("new.zip"), GameType::Zip)]);

    // Act
    fx.controller.open_root(&old_root);
    fx.controller.open_root(&new_root);
    let finished = fx.controller.wait_for_scans(SCAN_TIMEOUT);

    // Assert
    assert!(finished);
    let browse = fx.controller.browse();
    assert_eq!(browse.root(), Some(new_root.as_path()));
    let names: Vec<&str> = browse
        .top_level()
        .iter()
        .map(|id| browse.node(*id).unwrap().entry.original_name.as_str())
        .collect();
    assert_eq!(names, vec!["new.zip"]);
    assert!(browse.node_for_path(&old_root.join("old.zip")).is_none());
}

#[test]
fn test_expanding_a_folder_attaches_children_under_it_once() {
    // Arrange
    let mut fx = setup_controller();
    let root = fx.dir.path().to_path_buf();
    let series = root.join("Series");
    fx.scanner
        .set_entries(&root, vec![entry(&series, GameType::Folder)]);
    fx.scanner.set_entries(
        &series,
        vec![
            entry(&series.join("part1.zip"), GameType::Zip),
            entry(&series.join("part2.rar"), GameType::Rar),
        ],
    );
    fx.controller.open_root(&root);
    fx.controller.wait_for_scans(SCAN_TIMEOUT);
    let series_id = fx.controller.browse().folder_for_path(&series).unwrap();

    // Act
    assert!(fx.controller.expand_folder(series_id));
    assert!(!fx.controller.expand_folder(series_id));
    fx.controller.wait_for_scans(SCAN_TIMEOUT);

    // Assert
    assert_eq!(fx.scanner.get_calls(), vec![root, series.clone()]);
    let children = fx.controller.browse().children(series_id);
    assert_eq!(children.len(), 2);
    for child in children {
        let node = fx.controller.browse().node(*child).unwrap();
        assert_eq!(node.parent, Some(series_id));
    }
}

#[test]
fn test_pump_scan_events_drains_without_blocking() {
    let mut fx = setup_controller();
    let root = fx.dir.path().to_path_buf();
    fx.scanner
        .set_entries(&root, vec![entry(&root.join("a.zip"), GameType::Zip)]);
    fx.controller.open_root(&root);

    let mut handled = 0;
    for _ in 0..500 {
        handled += fx.controller.pump_scan_events();
        if !fx.controller.is_scanning() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(handled, 2, "one entry plus the finished marker");
    assert_eq!(fx.controller.browse().len(), 1);
}

#[test]
fn test_accepting_an_entry_highlights_it_and_ignores_duplicates() {
    // Arrange
    let mut fx = setup_controller();
    let root = fx.dir.path().to_path_buf();
    let game_path = root.join("Cool_Game [JP].zip");
    fx.scanner.set_entries(&root, vec![entry(&game_path, GameType::Zip)]);
    fx.controller.open_root(&root);
    fx.controller.wait_for_scans(SCAN_TIMEOUT);
    let node = fx.controller.browse().node_for_path(&game_path).unwrap();
    let record = fx.controller.record_for_node(node).unwrap();
    assert!(!fx.controller.is_in_library(&game_path));

    // Act
    let first = fx.controller.add_game(record.clone());
    let second = fx.controller.add_game(record);

    // Assert
    assert!(fx.controller.is_in_library(&game_path));
    assert!(first[0].message().starts_with("Saved"));
    assert!(second[0].message().contains("already in the library"));
    assert_eq!(fx.controller.library().borrow().len(), 1);
    assert_eq!(fx.controller.view().borrow().len(), 1);
    assert_eq!(fx.storage.write_count(&fx.paths.library_file), 1);
}

#[test]
fn test_record_for_saved_node_returns_stored_record() {
    let mut fx = setup_controller();
    let root = fx.dir.path().to_path_buf();
    let game_path = root.join("Saved");
    fx.scanner.set_entries(&root, vec![entry(&game_path, GameType::Folder)]);
    let mut stored = GameRecord::new(game_path.clone(), "Edited Name".to_string(), GameType::Folder);
    stored.source = "Shop".to_string();
    fx.controller.add_game(stored.clone());
    fx.controller.open_root(&root);
    fx.controller.wait_for_scans(SCAN_TIMEOUT);
    let node = fx.controller.browse().node_for_path(&game_path).unwrap();

    let record = fx.controller.record_for_node(node).unwrap();

    assert_eq!(record, stored);
    assert!(fx.controller.is_in_library(&game_path));
}

#[test]
fn test_save_game_updates_existing_record() {
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/A");
    fx.controller
        .save_game(GameRecord::new(path.clone(), "A".to_string(), GameType::Folder));
    let mut edited = GameRecord::new(path.clone(), "A edited".to_string(), GameType::Folder);
    edited.korean_support = true;

    let notices = fx.controller.save_game(edited.clone());

    assert!(notices[0].message().starts_with("Updated"));
    assert_eq!(
        fx.controller.library().borrow().get_game_by_path(&path),
        Some(edited)
    );
}

#[test]
fn test_remove_game_clears_highlight_and_view() {
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/A");
    fx.controller
        .add_game(GameRecord::new(path.clone(), "A".to_string(), GameType::Folder));

    let removed = fx.controller.remove_game(&path);
    let again = fx.controller.remove_game(&path);

    assert!(removed[0].message().starts_with("Removed"));
    assert!(again[0].message().contains("not in the library"));
    assert!(!fx.controller.is_in_library(&path));
    assert!(fx.controller.view().borrow().is_empty());
}

#[test]
fn test_tag_rename_cascades_into_library_and_view() {
    // Arrange
    let mut fx = setup_controller();
    let mut r1 = GameRecord::new(PathBuf::from("/games/R1"), "R1".to_string(), GameType::Folder);
    r1.tags = ["RPG".to_string(), "Action".to_string()].into();
    let mut r2 = GameRecord::new(PathBuf::from("/games/R2"), "R2".to_string(), GameType::Zip);
    r2.tags = ["Action".to_string()].into();
    fx.controller.add_game(r1);
    fx.controller.add_game(r2);
    let writes_before = fx.storage.write_count(&fx.paths.library_file);

    // Act
    let notices = fx.controller.rename_tag("Action", "ARPG");

    // Assert
    assert_eq!(
        notices,
        vec![AppNotice::Info("Renamed tag 'Action' to 'ARPG'.".to_string())]
    );
    assert_eq!(fx.storage.write_count(&fx.paths.library_file), writes_before + 1);
    let view = fx.controller.view().borrow();
    let tags: Vec<String> = view.rows().iter().map(|g| g.tags_joined()).collect();
    assert_eq!(tags, vec!["ARPG, RPG", "ARPG"]);
    assert!(fx.controller.tags().borrow().contains("ARPG"));
}

#[test]
fn test_tag_edits_report_duplicates_and_missing_tags() {
    let mut fx = setup_controller();

    let added = fx.controller.add_tag("Visual Novel");
    let duplicate = fx.controller.add_tag("Visual Novel");
    let missing = fx.controller.remove_tag("Nope");
    let taken = fx.controller.rename_tag("Action", "RPG");
    let empty = fx.controller.rename_tag("Action", "");

    assert_eq!(added, vec![AppNotice::Info("Added tag 'Visual Novel'.".to_string())]);
    assert_eq!(
        duplicate,
        vec![AppNotice::Info("Tag 'Visual Novel' already exists.".to_string())]
    );
    assert_eq!(missing, vec![AppNotice::Info("Tag 'Nope' does not exist.".to_string())]);
    assert_eq!(taken, vec![AppNotice::Info("Tag 'RPG' already exists.".to_string())]);
    assert!(matches!(empty.as_slice(), [AppNotice::Warning(_)]));
}

#[test]
fn test_tag_removal_keeps_records() {
    let mut fx = setup_controller();
    let mut record = GameRecord::new(PathBuf::from("/games/R"), "R".to_string(), GameType::Folder);
    record.tags = ["Action".to_string()].into();
    fx.controller.add_game(record);

    fx.controller.remove_tag("Action");

    let library = fx.controller.library().borrow();
    assert_eq!(library.len(), 1);
    assert!(library.get_games()[0].tags.is_empty());
}

#[test]
fn test_launch_updates_last_played() {
    // Arrange
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/Playable");
    fx.controller.add_game(playable(&path, "Playable"));

    // Act
    let notices = fx.controller.launch_game(&path);

    // Assert
    assert_eq!(notices, vec![AppNotice::Info("Started 'Playable'.".to_string())]);
    assert_eq!(fx.launcher.get_launched(), vec![path.clone()]);
    let game = fx.controller.library().borrow().get_game_by_path(&path).unwrap();
    assert_eq!(game.last_played_at, Some(datetime!(2024-03-01 18:00 UTC)));
}

#[test]
fn test_failed_launch_leaves_last_played_untouched() {
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/Broken");
    fx.controller.add_game(playable(&path, "Broken"));
    fx.launcher.set_failure("gone");
    let no_exe = PathBuf::from("/games/NoExe");
    fx.controller
        .add_game(GameRecord::new(no_exe.clone(), "NoExe".to_string(), GameType::Folder));

    let failed = fx.controller.launch_game(&path);
    let missing_exe = fx.controller.launch_game(&no_exe);
    let unknown = fx.controller.launch_game(Path::new("/games/Unknown"));

    assert!(matches!(failed.as_slice(), [AppNotice::Warning(_)]));
    assert!(matches!(missing_exe.as_slice(), [AppNotice::Warning(_)]));
    assert!(matches!(unknown.as_slice(), [AppNotice::Info(_)]));
    let library = fx.controller.library().borrow();
    assert!(library.get_game_by_path(&path).unwrap().last_played_at.is_none());
}

#[test]
fn test_finished_capture_stores_thumbnail_on_record() {
    // Arrange
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/Pretty");
    fx.controller.add_game(playable(&path, "Pretty"));
    let image = fx.paths.thumbnails_dir.join("thumb_1.png");
    fx.capture.set_outcome(CaptureOutcome::Finished(image.clone()));

    // Act
    fx.controller
        .start_thumbnail_capture(&path, Duration::from_secs(3));
    let notices = fx.controller.pump_capture_results();

    // Assert
    assert_eq!(
        fx.capture.get_requests(),
        vec![(path.join("game.exe"), Duration::from_secs(3))]
    );
    assert!(notices[0].message().starts_with("Saved thumbnail"));
    assert!(!fx.controller.has_pending_captures());
    let game = fx.controller.library().borrow().get_game_by_path(&path).unwrap();
    assert_eq!(PathBuf::from(game.thumbnail_path), image);
}

#[test]
fn test_failed_capture_is_reported_as_warning() {
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/Ugly");
    fx.controller.add_game(playable(&path, "Ugly"));
    fx.capture
        .set_outcome(CaptureOutcome::Failed("Process exited before capture.".to_string()));

    fx.controller.start_thumbnail_capture(&path, Duration::ZERO);
    let notices = fx.controller.pump_capture_results();

    assert_eq!(
        notices,
        vec![AppNotice::Warning(
            "Thumbnail capture failed: Process exited before capture.".to_string()
        )]
    );
    let game = fx.controller.library().borrow().get_game_by_path(&path).unwrap();
    assert!(!game.has_thumbnail());
}

#[test]
fn test_capture_requires_an_executable() {
    let mut fx = setup_controller();
    let path = PathBuf::from("/games/NoExe");
    fx.controller
        .add_game(GameRecord::new(path.clone(), "NoExe".to_string(), GameType::Folder));

    let notices = fx.controller.start_thumbnail_capture(&path, Duration::ZERO);

    assert!(matches!(notices.as_slice(), [AppNotice::Warning(_)]));
    assert!(fx.capture.get_requests().is_empty());
    assert!(!fx.controller.has_pending_captures());
}

#[test]
fn test_rename_folder_moves_it_on_disk() -> io::Result<()> {
    // Arrange
    let mut fx = setup_controller();
    let root = fx.dir.path().to_path_buf();
    let folder = root.join("Raw_Name [v1]");
    fs::create_dir(&folder)?;
    fx.scanner.set_entries(&root, vec![entry(&folder, GameType::Folder)]);
    fx.controller.open_root(&root);
    fx.controller.wait_for_scans(SCAN_TIMEOUT);
    let node = fx.controller.browse().folder_for_path(&folder).unwrap();

    // Act
    let notices = fx.controller.rename_folder(node, "Raw Name");
    let rejected = fx.controller.rename_folder(node, "Raw Name");

    // Assert
    assert!(notices[0].message().starts_with("Renamed folder"));
    assert!(root.join("Raw Name").is_dir());
    assert!(!folder.exists());
    assert!(matches!(rejected.as_slice(), [AppNotice::Warning(_)]));
    Ok(())
}

#[test]
fn test_controller_loads_existing_library_into_highlight_set() {
    let storage = MemoryFileStore::with_file(
        Path::new("/data/gamedb/games.json"),
        r#"{ "games": [ { "filePath": "/games/Stored", "cleanName": "Stored", "type": 0 } ] }"#,
    );

    let fx = setup_controller_with(storage, MockConfigManager::new());

    assert!(fx.controller.is_in_library(Path::new("/games/Stored")));
    assert_eq!(fx.controller.view().borrow().len(), 1);
    assert_eq!(fx.controller.tags().borrow().len(), 8);
}
