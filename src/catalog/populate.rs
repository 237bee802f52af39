//! Catalog population and maintenance.
//!
//! The catalog is rebuilt from the camera's file listing on every startup.
//! Videos go under the Video container; when correction is enabled every
//! video additionally appears under the correction-originals container as a
//! placeholder entry, and any corrected output already on disk is published
//! immediately. Stills go under the Image container (JPEG only).

use std::io;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::camera::{FileEntry, FileFormat, Projection};
use crate::catalog::{id, Catalog, CatalogEntry, EntryKind};
use crate::config::{Placeholders, Storage};
use crate::convert::ConvertLedger;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_MP4: &str = "video/mp4";

const VIDEO_DIR_NAME: &str = "Video";
const IMAGE_DIR_NAME: &str = "Image";
const CORRECTION_DIR_NAME: &str = "Orientation Correction";
const ORIGINAL_VIDEO_DIR_NAME: &str = "Original Video";
const CORRECTED_VIDEO_DIR_NAME: &str = "Corrected Video";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("catalog entry not found: {0}")]
    MissingEntry(String),
    #[error("required container missing: {0}")]
    MissingContainer(&'static str),
    #[error("cannot stat corrected file: {0}")]
    Io(#[from] io::Error),
}

/// Owns catalog mutation: population at startup, publication of finished
/// corrections, and the correction-mode subtree swap.
pub struct CatalogManager {
    catalog: Arc<Catalog>,
    ledger: Arc<ConvertLedger>,
    storage: Storage,
    placeholders: Placeholders,
    /// The listing the catalog was built from; kept so the correction
    /// subtree can be rebuilt when the feature is re-enabled.
    listing: RwLock<Vec<FileEntry>>,
}

impl CatalogManager {
    pub fn new(
        catalog: Arc<Catalog>,
        ledger: Arc<ConvertLedger>,
        storage: Storage,
        placeholders: Placeholders,
    ) -> Self {
        CatalogManager {
            catalog,
            ledger,
            storage,
            placeholders,
            listing: RwLock::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Build the container hierarchy and one entry per usable listed file.
    /// Idempotent: entry insertion is insert-if-absent throughout.
    pub fn populate(&self, listing: Vec<FileEntry>, correction: bool) {
        self.create_container(id::VIDEO_ID, id::ROOT_ID, VIDEO_DIR_NAME);
        self.create_container(id::IMAGE_ID, id::ROOT_ID, IMAGE_DIR_NAME);
        if correction {
            self.create_correction_containers();
        }

        for file in &listing {
            match file.file_format {
                FileFormat::Mpeg => {
                    self.create_video(file);
                    if correction {
                        self.create_pending_original(file);
                    }
                }
                FileFormat::Jpeg => self.create_image(file),
                FileFormat::Other => {}
            }
        }

        *self.listing.write().expect("listing lock poisoned") = listing;
        tracing::info!("catalog populated: {} entries", self.catalog.len());
    }

    /// Administrative entry point for the correction feature. Enabling
    /// rebuilds the corrected-root subtree from the stored listing;
    /// disabling tears the subtree down and deletes the corrected files
    /// on disk.
    pub fn set_correction_mode(&self, enabled: bool) {
        if enabled {
            self.create_correction_containers();
            let listing = self.listing.read().expect("listing lock poisoned").clone();
            for file in listing.iter().filter(|f| f.file_format == FileFormat::Mpeg) {
                self.create_pending_original(file);
            }
        } else {
            self.remove_correction_subtree();
            self.ledger.clear();
            match std::fs::remove_dir_all(&self.storage.corrected_dir) {
                Ok(()) => tracing::debug!("deleted {}", self.storage.corrected_dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "failed to delete {}: {e}",
                    self.storage.corrected_dir.display()
                ),
            }
        }
        tracing::info!("correction mode: {enabled}");
    }

    /// Materialize the catalog entry for a finished correction: a new video
    /// under the corrected-results container, carrying the original's title,
    /// uri, and dimensions and the real file's size. The original
    /// placeholder then advertises the "done" clip's length.
    pub fn publish_corrected(&self, source: &str, corrected_path: &Path) -> Result<(), PublishError> {
        let original_id = id::original_id(source);
        let original = self
            .catalog
            .get(&original_id)
            .ok_or_else(|| PublishError::MissingEntry(original_id.clone()))?;
        let size = std::fs::metadata(corrected_path)?.len();

        let corrected = CatalogEntry {
            id: id::corrected_id(source),
            kind: EntryKind::Video,
            title: original.title.clone(),
            local_path: corrected_path.to_owned(),
            source_uri: original.source_uri.clone(),
            mime: MIME_MP4,
            width: original.width,
            height: original.height,
            size,
            parent: id::CORRECTED_VIDEO_ID.to_string(),
            children: Vec::new(),
        };
        let corrected_id = corrected.id.clone();
        if !self.catalog.add_child(id::CORRECTED_VIDEO_ID, corrected) {
            return Err(PublishError::MissingContainer(id::CORRECTED_VIDEO_ID));
        }

        self.catalog.set_size(&original_id, self.placeholders.done_len);
        self.ledger.mark_done(source);
        tracing::debug!("published corrected entry: {corrected_id}");
        Ok(())
    }

    fn create_correction_containers(&self) {
        self.create_container(id::CORRECTION_ID, id::ROOT_ID, CORRECTION_DIR_NAME);
        self.create_container(
            id::ORIGINAL_VIDEO_ID,
            id::CORRECTION_ID,
            ORIGINAL_VIDEO_DIR_NAME,
        );
        self.create_container(
            id::CORRECTED_VIDEO_ID,
            id::CORRECTION_ID,
            CORRECTED_VIDEO_DIR_NAME,
        );
    }

    fn create_container(&self, container_id: &str, parent: &str, title: &str) {
        let entry = CatalogEntry::container(container_id, parent, title);
        if !self.catalog.add_child(parent, entry) {
            tracing::error!("cannot create container {container_id}: parent {parent} missing");
        }
    }

    /// A playable video entry under the Video container. Dual-fisheye
    /// videos are not playable as-is and are listed only under the
    /// correction originals.
    fn create_video(&self, file: &FileEntry) {
        if file.projection_type == Projection::DualFisheye {
            return;
        }
        let entry_id = id::item_id(&file.file_url);
        let entry = CatalogEntry {
            id: entry_id,
            kind: EntryKind::Video,
            title: id::title_of(&file.name).to_string(),
            local_path: self.local_path_of(file),
            source_uri: file.file_url.clone(),
            mime: MIME_MP4,
            width: file.width,
            height: file.height,
            size: file.size,
            parent: id::VIDEO_ID.to_string(),
            children: Vec::new(),
        };
        self.attach(id::VIDEO_ID, entry);
    }

    fn create_image(&self, file: &FileEntry) {
        // Only plain JPEGs; raw companions and other stills are skipped.
        if !file.name.to_ascii_lowercase().ends_with(".jpg") {
            return;
        }
        // Image ids keep an extension: some players refuse extension-less
        // photo downloads.
        let entry_id = format!("{}.JPG", id::item_id(&file.file_url));
        let entry = CatalogEntry {
            id: entry_id,
            kind: EntryKind::Image,
            title: id::title_of(&file.name).to_string(),
            local_path: self.local_path_of(file),
            source_uri: file.file_url.clone(),
            mime: MIME_JPEG,
            width: file.width,
            height: file.height,
            size: file.size,
            parent: id::IMAGE_ID.to_string(),
            children: Vec::new(),
        };
        self.attach(id::IMAGE_ID, entry);
    }

    /// The pending-correction placeholder for a video: an original-marker
    /// entry advertising the "processing" clip's length. When a corrected
    /// output already exists on disk, the finished entry is published right
    /// away and the placeholder flips to the "done" length.
    fn create_pending_original(&self, file: &FileEntry) {
        let source = id::item_id(&file.file_url);
        let entry = CatalogEntry {
            id: id::original_id(&source),
            kind: EntryKind::Video,
            title: id::title_of(&file.name).to_string(),
            local_path: self.local_path_of(file),
            source_uri: file.file_url.clone(),
            mime: MIME_MP4,
            width: file.width,
            height: file.height,
            size: self.placeholders.processing_len,
            parent: id::ORIGINAL_VIDEO_ID.to_string(),
            children: Vec::new(),
        };
        self.attach(id::ORIGINAL_VIDEO_ID, entry);

        let corrected_path = self.storage.corrected_output(&source);
        if corrected_path.exists() {
            if let Err(e) = self.publish_corrected(&source, &corrected_path) {
                tracing::error!("failed to publish existing correction for {source}: {e}");
            }
        }
    }

    fn attach(&self, parent: &str, entry: CatalogEntry) {
        let entry_id = entry.id.clone();
        if !self.catalog.add_child(parent, entry) {
            tracing::error!("cannot attach {entry_id}: container {parent} missing");
        } else {
            tracing::debug!("created entry: {entry_id}");
        }
    }

    fn local_path_of(&self, file: &FileEntry) -> std::path::PathBuf {
        match id::dcf_tail(&file.file_url) {
            Some((dir, name)) => self.storage.local_media_path(dir, name),
            None => std::path::PathBuf::new(),
        }
    }

    /// Tear down the corrected-root subtree: children first, then the
    /// containers, then the root's link to it.
    fn remove_correction_subtree(&self) {
        self.clear_container(id::CORRECTED_VIDEO_ID);
        self.clear_container(id::ORIGINAL_VIDEO_ID);
        self.clear_container(id::CORRECTION_ID);
        self.catalog.remove(id::CORRECTION_ID);
        self.catalog.remove_child(id::ROOT_ID, id::CORRECTION_ID);
    }

    fn clear_container(&self, container_id: &str) {
        tracing::debug!("clearing container {container_id}");
        for child in self.catalog.take_children(container_id) {
            self.catalog.remove(&child);
        }
    }
}
