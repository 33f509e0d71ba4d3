/*
 * This module holds the state of one browse session: the tree of scanned entries shown in the
 * file browser and the lookup from absolute folder path to the folder's node. The lookup is what
 * lets lazily-scanned children find the already-displayed parent they belong under without
 * rescanning the tree.
 *
 * The index is rebuilt from scratch whenever the root directory changes or the view is cleared,
 * and is never persisted. Nodes live in an arena and are addressed by `NodeId`.
 *
 * Renaming a folder updates that folder's own path and lookup key only. Descendants that were
 * already displayed keep the path they were scanned under, so expanding one of them afterwards
 * asks for a scan of a path that no longer exists.
 */
use crate::core::models::ScanEntry;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    // Files never expand.
    NotExpandable,
    // A folder whose children have not been requested yet.
    Pending,
    // A scan has been requested (or completed) for this folder.
    Requested,
}

#[derive(Debug, Clone)]
pub struct BrowseNode {
    pub entry: ScanEntry,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub expansion: Expansion,
}

#[derive(Debug)]
pub enum DirectoryIndexError {
    Io(io::Error),
    UnknownNode(NodeId),
    NotAFolder(PathBuf),
    InvalidName(String),
    AlreadyNamed(String),
    TargetExists(PathBuf),
}

impl From<io::Error> for DirectoryIndexError {
    fn from(err: io::Error) -> Self {
        DirectoryIndexError::Io(err)
    }
}

impl std::fmt::Display for DirectoryIndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryIndexError::Io(e) => write!(f, "I/O error: {e}"),
            DirectoryIndexError::UnknownNode(id) => write!(f, "Unknown browse node {id:?}"),
            DirectoryIndexError::NotAFolder(p) => {
                write!(f, "Renaming is supported for folders only: {p:?}")
            }
            DirectoryIndexError::InvalidName(name) => write!(f, "Invalid folder name '{name}'"),
            DirectoryIndexError::AlreadyNamed(name) => {
                write!(f, "Folder is already named '{name}'")
            }
            DirectoryIndexError::TargetExists(p) => write!(f, "{p:?} already exists"),
        }
    }
}

impl std::error::Error for DirectoryIndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectoryIndexError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryIndexError>;

#[derive(Debug, Default)]
pub struct DirectoryIndex {
    root: Option<PathBuf>,
    nodes: Vec<BrowseNode>,
    top_level: Vec<NodeId>,
    folders_by_path: HashMap<PathBuf, NodeId>,
    nodes_by_path: HashMap<PathBuf, NodeId>,
}

impl DirectoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // Starts a fresh session rooted at `root`.
    pub fn reset(&mut self, root: &Path) {
        self.clear();
        self.root = Some(normalize_path(root));
        log::debug!("DirectoryIndex: New browse session rooted at {root:?}.");
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.nodes.clear();
        self.top_level.clear();
        self.folders_by_path.clear();
        self.nodes_by_path.clear();
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&BrowseNode> {
        self.nodes.get(id.0)
    }

    pub fn top_level(&self) -> &[NodeId] {
        &self.top_level
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn folder_for_path(&self, path: &Path) -> Option<NodeId> {
        self.folders_by_path.get(&normalize_path(path)).copied()
    }

    pub fn node_for_path(&self, path: &Path) -> Option<NodeId> {
        self.nodes_by_path.get(&normalize_path(path)).copied()
    }

    /*
     * Places a scanned entry in the tree: at the top level when its parent is the session root,
     * under the known folder matching its parent path otherwise. Folders are registered for later
     * lookups and start out pending expansion. Returns `None`, attaching nothing, when an entry
     * with the same path is already attached or when the entry does not belong to this session
     * (for instance a late result for a previous root).
     */
    pub fn attach(&mut self, entry: ScanEntry) -> Option<NodeId> {
        let key = normalize_path(&entry.absolute_path);
        if self.nodes_by_path.contains_key(&key) {
            log::trace!("DirectoryIndex: {key:?} already attached; ignored.");
            return None;
        }

        let Some(parent_key) = entry.parent_path().map(normalize_path) else {
            log::debug!("DirectoryIndex: {key:?} has no parent; dropped.");
            return None;
        };
        let parent = if self.root.as_deref() == Some(parent_key.as_path()) {
            None
        } else if let Some(&parent_id) = self.folders_by_path.get(&parent_key) {
            Some(parent_id)
        } else {
            log::debug!("DirectoryIndex: {key:?} is outside the current browse session; dropped.");
            return None;
        };
        let id = NodeId(self.nodes.len());
        let expansion = if entry.is_folder() {
            self.folders_by_path.insert(key.clone(), id);
            Expansion::Pending
        } else {
            Expansion::NotExpandable
        };
        self.nodes.push(BrowseNode {
            entry,
            parent,
            children: Vec::new(),
            expansion,
        });
        self.nodes_by_path.insert(key, id);

        match parent {
            Some(parent_id) => self.nodes[parent_id.0].children.push(id),
            None => self.top_level.push(id),
        }
        Some(id)
    }

    /*
     * Marks a pending folder as requested and returns the path that should be scanned to fill
     * in its children. Subsequent calls for the same folder return `None`, mirroring a
     * placeholder child that is removed on first expansion.
     */
    pub fn begin_expand(&mut self, id: NodeId) -> Option<PathBuf> {
        let node = self.nodes.get_mut(id.0)?;
        if node.expansion != Expansion::Pending {
            return None;
        }
        node.expansion = Expansion::Requested;
        Some(node.entry.absolute_path.clone())
    }

    /*
     * Renames a displayed folder on disk to `new_name` (within the same parent directory) and
     * re-keys that folder in the lookup. Returns the new absolute path.
     *
     * Only the renamed node is updated. Descendants already in the tree keep their old paths.
     */
    pub fn rename_folder(&mut self, id: NodeId, new_name: &str) -> Result<PathBuf> {
        let node = self
            .nodes
            .get(id.0)
            .ok_or(DirectoryIndexError::UnknownNode(id))?;
        let current_path = node.entry.absolute_path.clone();
        if !node.entry.is_folder() || !current_path.is_dir() {
            return Err(DirectoryIndexError::NotAFolder(current_path));
        }
        if new_name.trim().is_empty()
            || new_name.contains(['/', '\\'])
            || new_name == "."
            || new_name == ".."
        {
            return Err(DirectoryIndexError::InvalidName(new_name.to_string()));
        }
        if node.entry.original_name == new_name {
            return Err(DirectoryIndexError::AlreadyNamed(new_name.to_string()));
        }

        let new_path = current_path.with_file_name(new_name);
        let new_key = normalize_path(&new_path);
        if fs::symlink_metadata(&new_path).is_ok() || self.nodes_by_path.contains_key(&new_key) {
            return Err(DirectoryIndexError::TargetExists(new_path));
        }
        fs::rename(&current_path, &new_path)?;
        log::info!("DirectoryIndex: Renamed {current_path:?} to {new_path:?}.");

        let old_key = normalize_path(&current_path);
        self.folders_by_path.remove(&old_key);
        self.folders_by_path.insert(new_key.clone(), id);
        self.nodes_by_path.remove(&old_key);
        self.nodes_by_path.insert(new_key, id);

        let node = &mut self.nodes[id.0];
        node.entry.absolute_path = new_path.clone();
        node.entry.original_name = new_name.to_string();
        Ok(new_path)
    }
}

/*
 * Lexically normalises a path for use as a lookup key: drops `.` components and trailing
 * separators. Does not touch the filesystem, so it works for paths that no longer exist.
 */
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
