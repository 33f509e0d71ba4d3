/*
 * This module owns the set of user-defined tags. Tags are kept sorted and unique (exact,
 * case-sensitive match), persisted as a flat JSON array, and every successful mutation is
 * written through immediately and then broadcast as a `TagEvent`.
 *
 * The registry knows nothing about the library. The library store subscribes to the
 * registry's events to cascade renames and removals into stored records.
 */
use crate::core::events::{SubscriptionId, Subscribers, TagEvent};
use crate::core::persistence::FileStoreOperations;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Seeded on first run when no tag file exists yet.
pub const DEFAULT_TAGS: [&str; 8] = [
    "Action",
    "Adventure",
    "RPG",
    "Simulation",
    "Strategy",
    "Sports",
    "FPS",
    "Puzzle",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Applied,
    AlreadyExists,
    NotFound,
    InvalidName,
}

impl TagOutcome {
    pub fn is_applied(self) -> bool {
        self == TagOutcome::Applied
    }
}

pub struct TagRegistry {
    storage: Arc<dyn FileStoreOperations>,
    tags_file: PathBuf,
    tags: Vec<String>,
    subscribers: Subscribers<TagEvent>,
}

impl TagRegistry {
    /*
     * Loads the registry from `tags_file`.
     * A missing file seeds `DEFAULT_TAGS` and persists them right away. A file that cannot be
     * read or parsed leaves the registry empty and untouched on disk; non-string elements are
     * skipped and duplicates collapse.
     */
    pub fn load(storage: Arc<dyn FileStoreOperations>, tags_file: PathBuf) -> Self {
        let mut registry = TagRegistry {
            storage,
            tags_file,
            tags: Vec::new(),
            subscribers: Subscribers::new(),
        };

        match registry.storage.read_text(&registry.tags_file) {
            Ok(None) => {
                log::info!(
                    "TagRegistry: No tag file at {:?}; seeding default tags.",
                    registry.tags_file
                );
                registry.tags = DEFAULT_TAGS.iter().map(|t| t.to_string()).collect();
                registry.normalize();
                registry.save();
            }
            Ok(Some(contents)) => match serde_json::from_str::<serde_json::Value>(&contents) {
                Ok(serde_json::Value::Array(values)) => {
                    registry.tags = values
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                    registry.normalize();
                    log::debug!(
                        "TagRegistry: Loaded {} tags from {:?}.",
                        registry.tags.len(),
                        registry.tags_file
                    );
                }
                Ok(_) => {
                    log::warn!(
                        "TagRegistry: {:?} does not contain a JSON array; starting with no tags.",
                        registry.tags_file
                    );
                }
                Err(e) => {
                    log::warn!(
                        "TagRegistry: Failed to parse {:?}: {e}. Starting with no tags.",
                        registry.tags_file
                    );
                }
            },
            Err(e) => {
                log::error!(
                    "TagRegistry: Failed to read {:?}: {e}. Starting with no tags.",
                    registry.tags_file
                );
            }
        }
        registry
    }

    pub fn tags_file(&self) -> &Path {
        &self.tags_file
    }

    // Sorted copy of the current tags.
    pub fn get_tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.binary_search_by(|t| t.as_str().cmp(tag)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&TagEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn add_tag(&mut self, name: &str) -> TagOutcome {
        if name.is_empty() {
            return TagOutcome::InvalidName;
        }
        if self.contains(name) {
            log::debug!("TagRegistry: Tag '{name}' already exists; add ignored.");
            return TagOutcome::AlreadyExists;
        }
        self.tags.push(name.to_string());
        self.normalize();
        self.save();
        log::info!("TagRegistry: Added tag '{name}'.");
        self.subscribers.emit(&TagEvent::Added(name.to_string()));
        TagOutcome::Applied
    }

    pub fn remove_tag(&mut self, name: &str) -> TagOutcome {
        let Some(index) = self.tags.iter().position(|t| t == name) else {
            log::debug!("TagRegistry: Tag '{name}' not found; remove ignored.");
            return TagOutcome::NotFound;
        };
        self.tags.remove(index);
        self.save();
        log::info!("TagRegistry: Removed tag '{name}'.");
        self.subscribers.emit(&TagEvent::Removed(name.to_string()));
        TagOutcome::Applied
    }

    /*
     * Renames `old` to `new`. Nothing changes (and nothing is broadcast) when `old` is absent or
     * `new` is already taken, which also covers renaming a tag to itself.
     */
    pub fn rename_tag(&mut self, old: &str, new: &str) -> TagOutcome {
        if new.is_empty() {
            return TagOutcome::InvalidName;
        }
        let Some(index) = self.tags.iter().position(|t| t == old) else {
            log::debug!("TagRegistry: Tag '{old}' not found; rename ignored.");
            return TagOutcome::NotFound;
        };
        if self.contains(new) {
            log::debug!("TagRegistry: Tag '{new}' already exists; rename of '{old}' ignored.");
            return TagOutcome::AlreadyExists;
        }
        self.tags[index] = new.to_string();
        self.normalize();
        self.save();
        log::info!("TagRegistry: Renamed tag '{old}' to '{new}'.");
        self.subscribers.emit(&TagEvent::Renamed {
            old: old.to_string(),
            new: new.to_string(),
        });
        TagOutcome::Applied
    }

    fn normalize(&mut self) {
        self.tags.sort();
        self.tags.dedup();
    }

    fn save(&self) {
        let contents = match serde_json::to_string_pretty(&self.tags) {
            Ok(contents) => contents,
            Err(e) => {
                log::error!("TagRegistry: Failed to serialize tags: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.write_text(&self.tags_file, &contents) {
            log::error!("TagRegistry: Failed to save tags to {:?}: {e}", self.tags_file);
        }
    }
}
