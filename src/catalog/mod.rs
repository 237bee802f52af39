//! Concurrent content catalog: a flat map of entries plus the container tree
//! expressed through per-container child lists.
//!
//! The catalog is read and written from request handlers, the conversion
//! worker, and population concurrently; all locking lives inside `Catalog`,
//! callers never take a lock themselves. Child lists are only ever mutated
//! under the catalog's write lock, so a reader can never observe a container
//! whose children disagree with its child count (the count is derived from
//! the list, not cached).

pub mod id;
pub mod populate;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Media kind of a catalog entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Container,
    Image,
    Video,
}

/// One addressable unit of the media tree: a container or a leaf item.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Process-unique, stable for the process lifetime.
    pub id: String,
    pub kind: EntryKind,
    /// Display title without extension or player suffixes.
    pub title: String,
    /// Filesystem location of the currently servable bytes. Empty for
    /// containers and for items that are only reachable on the camera.
    pub local_path: PathBuf,
    /// Reference into the camera's own listing; used for thumbnails and as
    /// the conversion source. Empty for containers.
    pub source_uri: String,
    /// `""` for containers.
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
    /// Advertised byte length. For pending-correction placeholders this is a
    /// placeholder asset length, not the real file's.
    pub size: u64,
    /// Parent entry id; `"-1"` for the root.
    pub parent: String,
    /// Ordered child ids. Leaves keep this empty.
    pub children: Vec<String>,
}

impl CatalogEntry {
    pub fn container(id: &str, parent: &str, title: &str) -> Self {
        CatalogEntry {
            id: id.to_string(),
            kind: EntryKind::Container,
            title: title.to_string(),
            local_path: PathBuf::new(),
            source_uri: String::new(),
            mime: "",
            width: 0,
            height: 0,
            size: 0,
            parent: parent.to_string(),
            children: Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Thread-safe entry map. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl Catalog {
    /// An empty catalog containing only the root container.
    pub fn new() -> Self {
        let catalog = Catalog {
            entries: RwLock::new(HashMap::new()),
        };
        catalog.put(CatalogEntry::container(id::ROOT_ID, "-1", "root"));
        catalog
    }

    /// Look up an entry by id. Absence is a normal outcome for stale or
    /// malformed ids, not an error.
    pub fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.entries
            .read()
            .expect("catalog lock poisoned")
            .get(id)
            .cloned()
    }

    /// Insert-if-absent. Re-inserting an existing id is a no-op so that
    /// population can run idempotently.
    pub fn put(&self, entry: CatalogEntry) {
        self.entries
            .write()
            .expect("catalog lock poisoned")
            .entry(entry.id.clone())
            .or_insert(entry);
    }

    pub fn remove(&self, id: &str) {
        self.entries
            .write()
            .expect("catalog lock poisoned")
            .remove(id);
    }

    /// The root container. A missing root is a programming error, not a
    /// runtime condition.
    pub fn root(&self) -> CatalogEntry {
        self.get(id::ROOT_ID).expect("catalog root entry missing")
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `child` (if absent) and link it under `parent_id`, in one
    /// critical section. Returns false when the parent does not exist; the
    /// child is not inserted in that case.
    pub fn add_child(&self, parent_id: &str, child: CatalogEntry) -> bool {
        let mut entries = self.entries.write().expect("catalog lock poisoned");
        if !entries.contains_key(parent_id) {
            return false;
        }
        let child_id = child.id.clone();
        entries.entry(child_id.clone()).or_insert(child);
        let parent = entries
            .get_mut(parent_id)
            .expect("parent entry vanished under write lock");
        if !parent.children.iter().any(|c| c == &child_id) {
            parent.children.push(child_id);
        }
        true
    }

    /// Unlink `child_id` from `parent_id` by swapping in a freshly built
    /// child list. The child entry itself is not removed.
    pub fn remove_child(&self, parent_id: &str, child_id: &str) {
        let mut entries = self.entries.write().expect("catalog lock poisoned");
        if let Some(parent) = entries.get_mut(parent_id) {
            let remaining: Vec<String> = parent
                .children
                .iter()
                .filter(|c| c.as_str() != child_id)
                .cloned()
                .collect();
            parent.children = remaining;
        }
    }

    /// Atomically empty a container's child list and return the ids that
    /// were in it, for the caller to remove one by one.
    pub fn take_children(&self, id: &str) -> Vec<String> {
        let mut entries = self.entries.write().expect("catalog lock poisoned");
        match entries.get_mut(id) {
            Some(entry) => std::mem::take(&mut entry.children),
            None => Vec::new(),
        }
    }

    /// Snapshot of a container's children, in insertion order. Ids whose
    /// entries have been removed are skipped.
    pub fn children_of(&self, id: &str) -> Vec<CatalogEntry> {
        let entries = self.entries.read().expect("catalog lock poisoned");
        let Some(parent) = entries.get(id) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|child_id| entries.get(child_id).cloned())
            .collect()
    }

    /// Update an entry's advertised byte length.
    pub fn set_size(&self, id: &str, size: u64) {
        let mut entries = self.entries.write().expect("catalog lock poisoned");
        if let Some(entry) = entries.get_mut(id) {
            entry.size = size;
        }
    }
}
