use crate::core::{
    AddOutcome, AppPaths, CaptureOutcome, ClockOperations, ConfigManagerOperations,
    DirectoryIndex, FileStoreOperations, FilterSortView, GameLauncherOperations, GameRecord,
    LibraryEvent, LibraryStore, NodeId, RemoveOutcome, ScanEvent, ScanWorker, ScannerOperations,
    TagOutcome, TagRegistry, ThumbnailCaptureOperations, UpdateOutcome,
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

pub(crate) const APP_NAME: &str = "GameDb";

/*
 * Informational results for the presentation layer. None of these are fatal; duplicate and
 * not-found conditions surface here instead of as errors.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppNotice {
    Info(String),
    Warning(String),
}

impl AppNotice {
    pub fn message(&self) -> &str {
        match self {
            AppNotice::Info(message) | AppNotice::Warning(message) => message,
        }
    }
}

// The collaborators the controller is built from.
pub struct LibraryServices {
    pub storage: Arc<dyn FileStoreOperations>,
    pub clock: Arc<dyn ClockOperations>,
    pub scanner: Arc<dyn ScannerOperations>,
    pub config_manager: Arc<dyn ConfigManagerOperations>,
    pub launcher: Arc<dyn GameLauncherOperations>,
    pub thumbnail_capture: Arc<dyn ThumbnailCaptureOperations>,
}

struct PendingCapture {
    game_path: PathBuf,
    outcome_rx: Receiver<CaptureOutcome>,
}

/*
 * Owns every piece of single-threaded application state: the library, the tag registry, the
 * filtered view, the current browse session and the set of library paths used to highlight
 * saved entries in the browser. Scan results and capture outcomes produced on other threads
 * only reach this state through `pump_scan_events` and `pump_capture_results`.
 */
pub struct LibraryController {
    pub(crate) library: Rc<RefCell<LibraryStore>>,
    pub(crate) tags: Rc<RefCell<TagRegistry>>,
    pub(crate) view: Rc<RefCell<FilterSortView>>,
    pub(crate) browse: DirectoryIndex,
    pub(crate) saved_paths: Rc<RefCell<HashSet<PathBuf>>>,
    pub(crate) pending_scans: usize,
    scan_worker: ScanWorker,
    pending_captures: Vec<PendingCapture>,
    config_manager: Arc<dyn ConfigManagerOperations>,
    launcher: Arc<dyn GameLauncherOperations>,
    thumbnail_capture: Arc<dyn ThumbnailCaptureOperations>,
}

impl LibraryController {
    /*
     * Loads the library and tag files named by `paths`, wires the tag cascade, the view and the
     * highlight set to their upstream broadcasts, and starts the scan worker thread.
     */
    pub fn new(paths: &AppPaths, services: LibraryServices) -> io::Result<Self> {
        let library = Rc::new(RefCell::new(LibraryStore::load(
            Arc::clone(&services.storage),
            services.clock,
            paths.library_file.clone(),
        )));
        let tags = Rc::new(RefCell::new(TagRegistry::load(
            services.storage,
            paths.tags_file.clone(),
        )));
        LibraryStore::connect_tag_cascade(&library, &mut tags.borrow_mut());

        let snapshot = library.borrow().get_games();
        let saved_paths: Rc<RefCell<HashSet<PathBuf>>> = Rc::new(RefCell::new(
            snapshot.iter().map(|g| g.file_path.clone()).collect(),
        ));
        let view = Rc::new(RefCell::new(FilterSortView::new(snapshot)));
        FilterSortView::connect_library(&view, &mut library.borrow_mut());

        let highlight = Rc::clone(&saved_paths);
        library.borrow_mut().subscribe(move |event| match event {
            LibraryEvent::GameAdded(path) => {
                highlight.borrow_mut().insert(path.clone());
            }
            LibraryEvent::GameRemoved(path) => {
                highlight.borrow_mut().remove(path);
            }
            LibraryEvent::GameUpdated(_) | LibraryEvent::LibraryChanged(_) => {}
        });

        let scan_worker = ScanWorker::spawn(services.scanner)?;
        log::debug!(
            "LibraryController: Ready with {} games and {} tags.",
            library.borrow().len(),
            tags.borrow().len()
        );

        Ok(LibraryController {
            library,
            tags,
            view,
            browse: DirectoryIndex::new(),
            saved_paths,
            pending_scans: 0,
            scan_worker,
            pending_captures: Vec::new(),
            config_manager: services.config_manager,
            launcher: services.launcher,
            thumbnail_capture: services.thumbnail_capture,
        })
    }

    pub fn library(&self) -> &Rc<RefCell<LibraryStore>> {
        &self.library
    }

    pub fn tags(&self) -> &Rc<RefCell<TagRegistry>> {
        &self.tags
    }

    pub fn view(&self) -> &Rc<RefCell<FilterSortView>> {
        &self.view
    }

    pub fn browse(&self) -> &DirectoryIndex {
        &self.browse
    }

    pub fn is_scanning(&self) -> bool {
        self.pending_scans > 0
    }

    // Re-opens the root directory browsed in the previous session, if it still exists.
    pub fn on_startup(&mut self) -> Vec<AppNotice> {
        match self.config_manager.load_last_root_path(APP_NAME) {
            Ok(Some(root)) if root.is_dir() => self.open_root(&root),
            Ok(Some(root)) => {
                log::info!("LibraryController: Last root {root:?} no longer exists.");
                Vec::new()
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("LibraryController: Could not load last root path: {e}");
                Vec::new()
            }
        }
    }

    /*
     * Starts a new browse session at `root`: the previous tree is discarded, a scan of the
     * root's direct children is queued, and `root` is remembered for the next startup.
     */
    pub fn open_root(&mut self, root: &Path) -> Vec<AppNotice> {
        if !root.is_dir() {
            return vec![AppNotice::Warning(format!(
                "{} is not a directory.",
                root.display()
            ))];
        }
        self.browse.reset(root);
        self.request_scan(root.to_path_buf());

        let mut notices = Vec::new();
        if let Err(e) = self
            .config_manager
            .save_last_root_path(APP_NAME, Some(root))
        {
            log::warn!("LibraryController: Could not remember root {root:?}: {e}");
            notices.push(AppNotice::Warning(format!(
                "Could not remember {}: {e}",
                root.display()
            )));
        }
        notices
    }

    pub fn clear_browser(&mut self) {
        self.browse.clear();
    }

    // Requests the children of a folder node the first time it is expanded.
    pub fn expand_folder(&mut self, node: NodeId) -> bool {
        match self.browse.begin_expand(node) {
            Some(path) => self.request_scan(path),
            None => false,
        }
    }

    fn request_scan(&mut self, directory: PathBuf) -> bool {
        let queued = self.scan_worker.request_scan(directory);
        if queued {
            self.pending_scans += 1;
        }
        queued
    }

    // Applies every scan result that has arrived so far. Returns the number of events handled.
    pub fn pump_scan_events(&mut self) -> usize {
        let events = self.scan_worker.try_recv_events();
        let handled = events.len();
        for event in events {
            self.handle_scan_event(event);
        }
        handled
    }

    /*
     * Blocks until every queued scan has finished, or until no event arrives within `timeout`.
     * Returns false on timeout.
     */
    pub fn wait_for_scans(&mut self, timeout: Duration) -> bool {
        while self.pending_scans > 0 {
            match self.scan_worker.recv_timeout(timeout) {
                Some(event) => self.handle_scan_event(event),
                None => {
                    log::warn!(
                        "LibraryController: Timed out with {} scans outstanding.",
                        self.pending_scans
                    );
                    return false;
                }
            }
        }
        true
    }

    fn handle_scan_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::EntryFound(entry) => {
                self.browse.attach(entry);
            }
            ScanEvent::Finished { directory } => {
                self.pending_scans = self.pending_scans.saturating_sub(1);
                log::debug!("LibraryController: Scan of {directory:?} finished.");
            }
        }
    }

    pub fn is_in_library(&self, path: &Path) -> bool {
        self.saved_paths.borrow().contains(path)
    }

    /*
     * Starting point for the "add to library" edit: the stored record when the entry is already
     * saved, otherwise a record pre-filled from the scanned entry.
     */
    pub fn record_for_node(&self, node: NodeId) -> Option<GameRecord> {
        let entry = &self.browse.node(node)?.entry;
        Some(
            self.library
                .borrow()
                .get_game_by_path(&entry.absolute_path)
                .unwrap_or_else(|| GameRecord::from_scan_entry(entry)),
        )
    }

    pub fn add_game(&mut self, record: GameRecord) -> Vec<AppNotice> {
        let name = record.clean_name.clone();
        match self.library.borrow_mut().add_game(record) {
            AddOutcome::Added => vec![AppNotice::Info(format!("Saved '{name}' to the library."))],
            AddOutcome::DuplicateIgnored => vec![AppNotice::Info(format!(
                "'{name}' is already in the library."
            ))],
        }
    }

    // Adds a new record or replaces the stored one with the same path.
    pub fn save_game(&mut self, record: GameRecord) -> Vec<AppNotice> {
        if self.is_in_library(&record.file_path) {
            self.update_game(record)
        } else {
            self.add_game(record)
        }
    }

    pub fn update_game(&mut self, record: GameRecord) -> Vec<AppNotice> {
        let name = record.clean_name.clone();
        match self.library.borrow_mut().update_game(record) {
            UpdateOutcome::Updated => vec![AppNotice::Info(format!("Updated '{name}'."))],
            UpdateOutcome::NotFound => vec![AppNotice::Info(format!(
                "'{name}' is not in the library."
            ))],
        }
    }

    pub fn remove_game(&mut self, path: &Path) -> Vec<AppNotice> {
        match self.library.borrow_mut().remove_game_by_path(path) {
            RemoveOutcome::Removed => vec![AppNotice::Info(format!(
                "Removed {} from the library.",
                path.display()
            ))],
            RemoveOutcome::NotFound => vec![AppNotice::Info(format!(
                "{} is not in the library.",
                path.display()
            ))],
        }
    }

    pub fn add_tag(&mut self, name: &str) -> Vec<AppNotice> {
        let outcome = self.tags.borrow_mut().add_tag(name);
        tag_notice(outcome, &format!("Added tag '{name}'."), name)
    }

    pub fn remove_tag(&mut self, name: &str) -> Vec<AppNotice> {
        let outcome = self.tags.borrow_mut().remove_tag(name);
        tag_notice(outcome, &format!("Removed tag '{name}'."), name)
    }

    pub fn rename_tag(&mut self, old: &str, new: &str) -> Vec<AppNotice> {
        let outcome = self.tags.borrow_mut().rename_tag(old, new);
        let subject = match outcome {
            TagOutcome::AlreadyExists => new,
            _ => old,
        };
        tag_notice(outcome, &format!("Renamed tag '{old}' to '{new}'."), subject)
    }

    /*
     * Renames a browsed folder on disk to `new_name`. A library record keyed by the old path is
     * not moved; the browser highlight follows the path, so the renamed folder shows as unsaved.
     */
    pub fn rename_folder(&mut self, node: NodeId, new_name: &str) -> Vec<AppNotice> {
        match self.browse.rename_folder(node, new_name) {
            Ok(new_path) => vec![AppNotice::Info(format!(
                "Renamed folder to {}.",
                new_path.display()
            ))],
            Err(e) => {
                log::warn!("LibraryController: Folder rename failed: {e}");
                vec![AppNotice::Warning(e.to_string())]
            }
        }
    }

    pub fn launch_game(&mut self, path: &Path) -> Vec<AppNotice> {
        let Some(game) = self.library.borrow().get_game_by_path(path) else {
            return vec![AppNotice::Info(format!(
                "{} is not in the library.",
                path.display()
            ))];
        };
        match self.launcher.launch(&game) {
            Ok(pid) => {
                log::debug!("LibraryController: '{}' running as pid {pid}.", game.clean_name);
                self.library.borrow_mut().update_last_played(path);
                vec![AppNotice::Info(format!("Started '{}'.", game.clean_name))]
            }
            Err(e) => {
                log::warn!("LibraryController: Launch of {path:?} failed: {e}");
                vec![AppNotice::Warning(e.to_string())]
            }
        }
    }

    pub fn start_thumbnail_capture(&mut self, path: &Path, delay: Duration) -> Vec<AppNotice> {
        let Some(game) = self.library.borrow().get_game_by_path(path) else {
            return vec![AppNotice::Info(format!(
                "{} is not in the library.",
                path.display()
            ))];
        };
        if !game.has_launch_executable() {
            return vec![AppNotice::Warning(format!(
                "No executable is set for '{}'.",
                game.clean_name
            ))];
        }
        let outcome_rx = self
            .thumbnail_capture
            .start_capture(Path::new(&game.launch_executable_path), delay);
        self.pending_captures.push(PendingCapture {
            game_path: path.to_path_buf(),
            outcome_rx,
        });
        vec![AppNotice::Info(format!(
            "Capturing a thumbnail for '{}'.",
            game.clean_name
        ))]
    }

    pub fn has_pending_captures(&self) -> bool {
        !self.pending_captures.is_empty()
    }

    // Stores the thumbnail of every finished capture on its record.
    pub fn pump_capture_results(&mut self) -> Vec<AppNotice> {
        let mut notices = Vec::new();
        let mut still_pending = Vec::new();
        for capture in std::mem::take(&mut self.pending_captures) {
            match capture.outcome_rx.try_recv() {
                Ok(CaptureOutcome::Finished(image)) => {
                    notices.extend(self.store_thumbnail(&capture.game_path, &image));
                }
                Ok(CaptureOutcome::Failed(reason)) => {
                    notices.push(AppNotice::Warning(format!("Thumbnail capture failed: {reason}")));
                }
                Err(TryRecvError::Empty) => still_pending.push(capture),
                Err(TryRecvError::Disconnected) => {
                    notices.push(AppNotice::Warning(
                        "Thumbnail capture stopped without a result.".to_string(),
                    ));
                }
            }
        }
        self.pending_captures = still_pending;
        notices
    }

    fn store_thumbnail(&mut self, game_path: &Path, image: &Path) -> Vec<AppNotice> {
        let Some(mut game) = self.library.borrow().get_game_by_path(game_path) else {
            return vec![AppNotice::Info(format!(
                "{} left the library before its thumbnail was ready.",
                game_path.display()
            ))];
        };
        game.thumbnail_path = image.to_string_lossy().into_owned();
        self.library.borrow_mut().update_game(game);
        vec![AppNotice::Info(format!(
            "Saved thumbnail {}.",
            image.display()
        ))]
    }
}

fn tag_notice(outcome: TagOutcome, applied: &str, subject: &str) -> Vec<AppNotice> {
    let notice = match outcome {
        TagOutcome::Applied => AppNotice::Info(applied.to_string()),
        TagOutcome::AlreadyExists => AppNotice::Info(format!("Tag '{subject}' already exists.")),
        TagOutcome::NotFound => AppNotice::Info(format!("Tag '{subject}' does not exist.")),
        TagOutcome::InvalidName => AppNotice::Warning("Tag names cannot be empty.".to_string()),
    };
    vec![notice]
}
