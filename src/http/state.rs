use std::sync::Arc;

use crate::camera::CameraClient;
use crate::catalog::Catalog;
use crate::config::Placeholders;
use crate::convert::{ConvertLedger, ConverterHandle};

/// Shared application state injected into all route handlers via
/// axum::extract::State. Everything inside is either immutable or does its
/// own locking, so handlers never coordinate with each other.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub converter: ConverterHandle,
    pub ledger: Arc<ConvertLedger>,
    pub camera: Arc<dyn CameraClient>,
    pub placeholders: Placeholders,
    pub server_uuid: String,
    pub server_name: String,
}
