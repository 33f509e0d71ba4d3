/*
 * The platform-agnostic core of the game library: data model, persistence, the library and tag
 * services with their change broadcasts, directory scanning, the transient browse index, the
 * filtered/sorted projection, and the launch and thumbnail boundaries. Filesystem, clock and
 * process access sit behind `XxxOperations` traits so each service can be driven from tests.
 */
pub mod clock;
pub mod config;
pub mod directory_index;
pub mod events;
pub mod filter_sort;
pub mod launcher;
pub mod library_store;
pub mod models;
pub mod path_utils;
pub mod persistence;
pub mod scan_worker;
pub mod scanner;
pub mod tag_registry;
pub mod thumbnail;

pub use clock::{ClockOperations, SystemClock};
pub use config::{ConfigManagerOperations, CoreConfigManager};
pub use directory_index::{BrowseNode, DirectoryIndex, DirectoryIndexError, Expansion, NodeId};
pub use events::{LibraryEvent, LibrarySnapshot, ScanEvent, SubscriptionId, TagEvent};
pub use filter_sort::{
    FilterCriteria, FilterSortView, SortDirection, SortKey, SortOrder, TagMatchMode,
};
pub use launcher::{CoreGameLauncher, GameLauncherOperations, LaunchError};
pub use library_store::{AddOutcome, LibraryStore, RemoveOutcome, UpdateOutcome};
pub use models::{GameRecord, GameType, ScanEntry};
pub use path_utils::AppPaths;
pub use persistence::{CoreFileStore, FileStoreOperations};
pub use scan_worker::ScanWorker;
pub use scanner::{CoreScanner, ScannerOperations};
pub use tag_registry::{TagOutcome, TagRegistry};
pub use thumbnail::{
    CaptureOutcome, ProcessThumbnailCapture, ThumbnailCaptureOperations, UnsupportedWindowGrabber,
    WindowGrabberOperations,
};
