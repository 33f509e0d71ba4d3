/*
 * This module owns the game library: the canonical, path-keyed collection of `GameRecord`s.
 * It is the only writer of the library file. Every successful mutation is written through to
 * disk immediately and then broadcast synchronously to observers, so an observer always sees
 * a library that already contains the change it is being told about.
 *
 * Missing or malformed library files are treated as an empty library. Not-found and duplicate
 * conditions are reported through outcome values, never as errors.
 *
 * Tag edits reach the library through `connect_tag_cascade`, the single place where the
 * library subscribes to the tag registry.
 */
use crate::core::clock::ClockOperations;
use crate::core::events::{LibraryEvent, LibrarySnapshot, SubscriptionId, Subscribers, TagEvent};
use crate::core::models::GameRecord;
use crate::core::persistence::FileStoreOperations;
use crate::core::tag_registry::TagRegistry;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    DuplicateIgnored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

#[derive(Serialize)]
struct LibraryDocument<'a> {
    games: &'a [GameRecord],
}

pub struct LibraryStore {
    storage: Arc<dyn FileStoreOperations>,
    clock: Arc<dyn ClockOperations>,
    library_file: PathBuf,
    games: LibrarySnapshot,
    subscribers: Subscribers<LibraryEvent>,
}

impl LibraryStore {
    /*
     * Loads the library document from `library_file`.
     * Records that fail to parse are skipped individually, and a second record with an
     * already-seen path is dropped so the one-record-per-path invariant holds from the start.
     */
    pub fn load(
        storage: Arc<dyn FileStoreOperations>,
        clock: Arc<dyn ClockOperations>,
        library_file: PathBuf,
    ) -> Self {
        let games = match storage.read_text(&library_file) {
            Ok(Some(contents)) => parse_library_document(&contents, &library_file),
            Ok(None) => {
                log::info!("LibraryStore: No library file at {library_file:?}; starting empty.");
                Vec::new()
            }
            Err(e) => {
                log::error!(
                    "LibraryStore: Failed to read {library_file:?}: {e}. Starting with an empty library."
                );
                Vec::new()
            }
        };
        log::debug!("LibraryStore: Loaded {} games.", games.len());

        LibraryStore {
            storage,
            clock,
            library_file,
            games: Arc::new(games),
            subscribers: Subscribers::new(),
        }
    }

    pub fn library_file(&self) -> &Path {
        &self.library_file
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&LibraryEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // Immutable snapshot; later mutations never show through it.
    pub fn get_games(&self) -> LibrarySnapshot {
        Arc::clone(&self.games)
    }

    pub fn get_game_by_path(&self, path: &Path) -> Option<GameRecord> {
        self.games.iter().find(|g| g.file_path == path).cloned()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.games.iter().any(|g| g.file_path == path)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn add_game(&mut self, record: GameRecord) -> AddOutcome {
        if self.contains_path(&record.file_path) {
            log::debug!(
                "LibraryStore: {:?} is already in the library; add ignored.",
                record.file_path
            );
            return AddOutcome::DuplicateIgnored;
        }
        let path = record.file_path.clone();
        Arc::make_mut(&mut self.games).push(record);
        self.save();
        log::info!("LibraryStore: Added {path:?}.");
        self.subscribers.emit(&LibraryEvent::GameAdded(path));
        self.broadcast_changed();
        AddOutcome::Added
    }

    // Full replacement of the record sharing `record.file_path`.
    pub fn update_game(&mut self, record: GameRecord) -> UpdateOutcome {
        let Some(index) = self.index_of(&record.file_path) else {
            log::debug!(
                "LibraryStore: {:?} not in library; update ignored.",
                record.file_path
            );
            return UpdateOutcome::NotFound;
        };
        let path = record.file_path.clone();
        Arc::make_mut(&mut self.games)[index] = record;
        self.save();
        log::debug!("LibraryStore: Updated {path:?}.");
        self.subscribers.emit(&LibraryEvent::GameUpdated(path));
        self.broadcast_changed();
        UpdateOutcome::Updated
    }

    pub fn update_last_played(&mut self, path: &Path) -> UpdateOutcome {
        let Some(index) = self.index_of(path) else {
            log::debug!("LibraryStore: {path:?} not in library; last-played update ignored.");
            return UpdateOutcome::NotFound;
        };
        let now = self.clock.now();
        Arc::make_mut(&mut self.games)[index].last_played_at = Some(now);
        self.save();
        self.subscribers
            .emit(&LibraryEvent::GameUpdated(path.to_path_buf()));
        self.broadcast_changed();
        UpdateOutcome::Updated
    }

    // Removes by position in the current snapshot.
    pub fn remove_game(&mut self, index: usize) -> RemoveOutcome {
        if index >= self.games.len() {
            return RemoveOutcome::NotFound;
        }
        let removed = Arc::make_mut(&mut self.games).remove(index);
        self.save();
        log::info!("LibraryStore: Removed {:?}.", removed.file_path);
        self.subscribers
            .emit(&LibraryEvent::GameRemoved(removed.file_path));
        self.broadcast_changed();
        RemoveOutcome::Removed
    }

    pub fn remove_game_by_path(&mut self, path: &Path) -> RemoveOutcome {
        match self.index_of(path) {
            Some(index) => self.remove_game(index),
            None => {
                log::debug!("LibraryStore: {path:?} not in library; remove ignored.");
                RemoveOutcome::NotFound
            }
        }
    }

    /*
     * Applies a tag registry change to every stored record.
     * Renames replace the old tag with the new one, removals strip the tag; records themselves
     * are never deleted. The library is saved and `LibraryChanged` broadcast once, and only when
     * at least one record actually changed. Returns the number of records touched.
     */
    pub fn apply_tag_event(&mut self, event: &TagEvent) -> usize {
        let (old_tag, new_tag) = match event {
            TagEvent::Added(_) => return 0,
            TagEvent::Removed(tag) => (tag.as_str(), None),
            TagEvent::Renamed { old, new } => (old.as_str(), Some(new.as_str())),
        };

        if !self.games.iter().any(|g| g.has_tag(old_tag)) {
            return 0;
        }

        let mut changed = 0;
        for game in Arc::make_mut(&mut self.games).iter_mut() {
            if game.tags.remove(old_tag) {
                if let Some(new_tag) = new_tag {
                    game.tags.insert(new_tag.to_string());
                }
                changed += 1;
            }
        }

        self.save();
        log::info!("LibraryStore: Tag change {event:?} applied to {changed} games.");
        self.broadcast_changed();
        changed
    }

    /*
     * Subscribes `library` to `tags` so every rename or removal cascades into the stored
     * records. The subscription holds only a weak reference; once the store is dropped the
     * callback does nothing.
     */
    pub fn connect_tag_cascade(
        library: &Rc<RefCell<LibraryStore>>,
        tags: &mut TagRegistry,
    ) -> SubscriptionId {
        let weak: Weak<RefCell<LibraryStore>> = Rc::downgrade(library);
        tags.subscribe(move |event| {
            let Some(library) = weak.upgrade() else {
                return;
            };
            match library.try_borrow_mut() {
                Ok(mut store) => {
                    store.apply_tag_event(event);
                }
                Err(_) => {
                    log::error!(
                        "LibraryStore: Tag change {event:?} arrived while the library was busy; cascade skipped."
                    );
                }
            }
        })
    }

    pub fn save(&self) {
        let document = LibraryDocument {
            games: self.games.as_slice(),
        };
        let contents = match serde_json::to_string_pretty(&document) {
            Ok(contents) => contents,
            Err(e) => {
                log::error!("LibraryStore: Failed to serialize library: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.write_text(&self.library_file, &contents) {
            log::error!(
                "LibraryStore: Failed to save games to {:?}: {e}",
                self.library_file
            );
        }
    }

    fn index_of(&self, path: &Path) -> Option<usize> {
        self.games.iter().position(|g| g.file_path == path)
    }

    fn broadcast_changed(&mut self) {
        let snapshot = Arc::clone(&self.games);
        self.subscribers
            .emit(&LibraryEvent::LibraryChanged(snapshot));
    }
}

fn parse_library_document(contents: &str, library_file: &Path) -> Vec<GameRecord> {
    let root: serde_json::Value = match serde_json::from_str(contents) {
        Ok(root) => root,
        Err(e) => {
            log::warn!(
                "LibraryStore: Failed to parse {library_file:?}: {e}. Starting with an empty library."
            );
            return Vec::new();
        }
    };
    let Some(entries) = root.get("games").and_then(|g| g.as_array()) else {
        log::warn!("LibraryStore: {library_file:?} has no 'games' array; starting empty.");
        return Vec::new();
    };

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut games = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let Some(record) = GameRecord::from_json_value(entry) else {
            log::warn!(
                "LibraryStore: Skipping game at position {position}: not an object with a filePath."
            );
            continue;
        };
        if seen.insert(record.file_path.clone()) {
            games.push(record);
        } else {
            log::warn!(
                "LibraryStore: Duplicate entry for {:?} at position {position}; keeping the first.",
                record.file_path
            );
        }
    }
    games
}
