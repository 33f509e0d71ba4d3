/*
 * Typed observer lists used by the single-threaded services (library store, tag registry,
 * filter/sort view) to broadcast state changes. Callbacks run synchronously inside `emit`,
 * in subscription order, after the emitting service has already applied its change.
 *
 * The event payloads defined here are the only data that crosses from a service to its
 * observers, so observers never need to call back into the emitting service.
 */
use crate::core::models::{GameRecord, ScanEntry};
use std::path::PathBuf;
use std::sync::Arc;

/*
 * Immutable copy of the library contents at the time it was taken.
 * Holders keep their snapshot even while the store continues to change.
 */
pub type LibrarySnapshot = Arc<Vec<GameRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub struct Subscribers<E> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Subscribers {
            next_id: 1,
            callbacks: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    // Returns false when the id was never registered or already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEvent {
    GameAdded(PathBuf),
    GameUpdated(PathBuf),
    GameRemoved(PathBuf),
    LibraryChanged(LibrarySnapshot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Added(String),
    Removed(String),
    Renamed { old: String, new: String },
}

/*
 * Messages produced by the scan worker thread. Each `scan_directory` request yields its entries
 * in enumeration order followed by exactly one `Finished` for the requested directory.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    EntryFound(ScanEntry),
    Finished { directory: PathBuf },
}
