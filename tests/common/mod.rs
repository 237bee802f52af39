//! Shared fixtures: a scriptable mock camera, a counting notifier, and a
//! fully wired gateway (catalog + ledger + converter + router) backed by a
//! temporary directory tree.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use spherecast::camera::{
    CameraClient, CameraError, CommandState, ConvertHandle, ConvertParams, ConvertStatus,
    FileEntry, FileFormat, Projection,
};
use spherecast::catalog::populate::CatalogManager;
use spherecast::catalog::Catalog;
use spherecast::config::{Placeholders, Storage};
use spherecast::convert::{ConvertEvent, ConvertLedger, Converter, ConverterHandle};
use spherecast::http::state::AppState;
use spherecast::notify::HostNotifier;
use spherecast::status::{StatusChecker, StorageHealth};

pub const TEST_UUID: &str = "550e8400-e29b-41d4-a716-446655440000";
pub const TEST_NAME: &str = "Test Gateway";

pub const PROCESSING_BYTES: &[u8] = b"processing-placeholder-clip-bytes";
pub const DONE_BYTES: &[u8] = b"done-placeholder";

pub const GIB: u64 = 1 << 30;

/// Scriptable camera: configure fields before wrapping in Arc, read the
/// atomic counters afterwards.
pub struct MockCamera {
    pub space: AtomicU64,
    pub battery: f64,
    pub fail_space: AtomicBool,
    /// `Some(url)` makes command_status report Done with this result;
    /// `None` keeps the job inProgress forever.
    pub result_url: Mutex<Option<String>>,
    /// Written when convert_video is called, standing in for the camera
    /// staging its output during the conversion.
    pub staged_file: Mutex<Option<(PathBuf, Vec<u8>)>>,
    pub thumb: Vec<u8>,
    pub convert_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl MockCamera {
    pub fn new() -> Self {
        MockCamera {
            space: AtomicU64::new(100 * GIB),
            battery: 1.0,
            fail_space: AtomicBool::new(false),
            result_url: Mutex::new(None),
            staged_file: Mutex::new(None),
            thumb: vec![0xFF, 0xD8, 0xFF, 0xE0, b't', b'e', b's', b't'],
            convert_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CameraClient for MockCamera {
    async fn list_files(&self) -> Result<Vec<FileEntry>, CameraError> {
        Ok(Vec::new())
    }

    async fn remaining_space(&self) -> Result<u64, CameraError> {
        if self.fail_space.load(Ordering::SeqCst) {
            return Err(CameraError::Malformed("no remainingSpace".into()));
        }
        Ok(self.space.load(Ordering::SeqCst))
    }

    async fn battery_level(&self) -> Result<f64, CameraError> {
        Ok(self.battery)
    }

    async fn get_thumbnail(&self, _file_url: &str) -> Result<Vec<u8>, CameraError> {
        Ok(self.thumb.clone())
    }

    async fn convert_video(&self, _params: &ConvertParams) -> Result<ConvertHandle, CameraError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((path, bytes)) = &*self.staged_file.lock().unwrap() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, bytes).unwrap();
        }
        Ok(ConvertHandle { id: "job-1".into() })
    }

    async fn command_status(&self, _handle: &ConvertHandle) -> Result<ConvertStatus, CameraError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.result_url.lock().unwrap() {
            Some(url) => Ok(ConvertStatus {
                state: CommandState::Done,
                completion: 1.0,
                result_url: Some(url.clone()),
            }),
            None => Ok(ConvertStatus {
                state: CommandState::InProgress,
                completion: 0.25,
                result_url: None,
            }),
        }
    }

    async fn cancel_convert(&self) -> Result<(), CameraError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    pub error_cues: AtomicUsize,
    pub done_cues: AtomicUsize,
    pub health_signals: AtomicUsize,
    pub registered: Mutex<Vec<PathBuf>>,
}

impl HostNotifier for CountingNotifier {
    fn error_cue(&self) {
        self.error_cues.fetch_add(1, Ordering::SeqCst);
    }

    fn conversion_done_cue(&self) {
        self.done_cues.fetch_add(1, Ordering::SeqCst);
    }

    fn storage_health(&self, _health: StorageHealth) {
        self.health_signals.fetch_add(1, Ordering::SeqCst);
    }

    fn media_registered(&self, path: &std::path::Path) {
        self.registered.lock().unwrap().push(path.to_owned());
    }
}

pub fn video_file(dcf_dir: &str, stem: &str, width: u32, projection: Projection) -> FileEntry {
    FileEntry {
        file_url: format!("http://127.0.0.1:8080/files/abc/{dcf_dir}/{stem}.MP4"),
        name: format!("{stem}.MP4"),
        size: 64 * 1024 * 1024,
        width,
        height: width / 2,
        file_format: FileFormat::Mpeg,
        projection_type: projection,
    }
}

pub fn image_file(dcf_dir: &str, stem: &str) -> FileEntry {
    FileEntry {
        file_url: format!("http://127.0.0.1:8080/files/abc/{dcf_dir}/{stem}.JPG"),
        name: format!("{stem}.JPG"),
        size: 4 * 1024 * 1024,
        width: 5376,
        height: 2688,
        file_format: FileFormat::Jpeg,
        projection_type: Projection::Other,
    }
}

/// A fully wired gateway over a temporary directory tree, with the
/// conversion worker running.
pub struct Gateway {
    pub tmp: TempDir,
    pub storage: Storage,
    pub placeholders: Placeholders,
    pub catalog: Arc<Catalog>,
    pub ledger: Arc<ConvertLedger>,
    pub manager: Arc<CatalogManager>,
    pub camera: Arc<MockCamera>,
    pub notifier: Arc<CountingNotifier>,
    pub converter: ConverterHandle,
}

impl Gateway {
    /// Must run on a tokio runtime (the converter worker is spawned).
    pub fn start(camera: MockCamera, listing: Vec<FileEntry>, correction: bool) -> Gateway {
        let tmp = TempDir::new().unwrap();
        let assets_dir = tmp.path().join("assets");
        std::fs::create_dir_all(&assets_dir).unwrap();
        std::fs::write(assets_dir.join("processing.mp4"), PROCESSING_BYTES).unwrap();
        std::fs::write(assets_dir.join("done.mp4"), DONE_BYTES).unwrap();

        let storage = Storage {
            dcim_dir: tmp.path().join("DCIM"),
            staging_dir: tmp.path().join("Converted"),
            corrected_dir: tmp.path().join("Corrected"),
        };
        std::fs::create_dir_all(&storage.dcim_dir).unwrap();

        let placeholders = Placeholders::load(&assets_dir).unwrap();
        let catalog = Arc::new(Catalog::new());
        let ledger = Arc::new(ConvertLedger::new());
        let manager = Arc::new(CatalogManager::new(
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            storage.clone(),
            placeholders.clone(),
        ));
        manager.populate(listing, correction);

        let camera = Arc::new(camera);
        let notifier = Arc::new(CountingNotifier::default());
        let status = StatusChecker::new(camera.clone() as Arc<dyn CameraClient>);
        let converter = Converter::start(
            camera.clone() as Arc<dyn CameraClient>,
            status,
            notifier.clone() as Arc<dyn HostNotifier>,
            Arc::clone(&manager),
            storage.clone(),
            Arc::clone(&ledger),
        );

        Gateway {
            tmp,
            storage,
            placeholders,
            catalog,
            ledger,
            manager,
            camera,
            notifier,
            converter,
        }
    }

    pub fn app(&self) -> axum::Router {
        spherecast::http::build_router(AppState {
            catalog: Arc::clone(&self.catalog),
            converter: self.converter.clone(),
            ledger: Arc::clone(&self.ledger),
            camera: self.camera.clone() as Arc<dyn CameraClient>,
            placeholders: self.placeholders.clone(),
            server_uuid: TEST_UUID.to_string(),
            server_name: TEST_NAME.to_string(),
        })
    }

    /// Create a DCIM-resident media file so plain items are servable.
    pub fn write_dcim_file(&self, dcf_dir: &str, file_name: &str, bytes: &[u8]) {
        let dir = self.storage.dcim_dir.join(dcf_dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file_name), bytes).unwrap();
    }
}

/// Wait up to five seconds for a converter event matching the predicate.
pub async fn await_event<F>(rx: &mut broadcast::Receiver<ConvertEvent>, pred: F) -> ConvertEvent
where
    F: Fn(&ConvertEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("converter event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for converter event")
}
