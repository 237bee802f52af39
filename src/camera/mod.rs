//! The camera's own web API, as seen by this gateway: file listing, status
//! options, thumbnails, and the long-running video conversion command.

pub mod osc;

use async_trait::async_trait;
use serde::Deserialize;

pub use osc::OscClient;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("camera command error {code}: {message}")]
    Api { code: String, message: String },
    #[error("unexpected camera response: {0}")]
    Malformed(String),
}

/// Still-image vs. video format code in the camera's listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Jpeg,
    Mpeg,
    #[serde(other)]
    Other,
}

/// Spherical projection the file was recorded in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum Projection {
    Equirectangular,
    #[serde(rename = "Dual-Fisheye")]
    DualFisheye,
    #[serde(other)]
    Other,
}

/// One record of the camera's file listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub file_url: String,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub file_format: FileFormat,
    #[serde(default = "Projection::default_listing")]
    pub projection_type: Projection,
}

impl Projection {
    // Listings omit projectionType for stills.
    fn default_listing() -> Self {
        Projection::Other
    }
}

/// Output frame size of a conversion, selected by the source width.
/// The camera supports exactly these two classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConvertSize {
    S3840x1920,
    S1920x960,
}

impl ConvertSize {
    pub fn for_width(width: u32) -> Self {
        if width == 3840 {
            ConvertSize::S3840x1920
        } else {
            ConvertSize::S1920x960
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConvertSize::S3840x1920 => "3840x1920",
            ConvertSize::S1920x960 => "1920x960",
        }
    }
}

/// Parameters of the corrective conversion. Projection, codec, and blending
/// are fixed; only the source and the size class vary.
#[derive(Debug, Clone)]
pub struct ConvertParams {
    pub file_url: String,
    pub size: ConvertSize,
}

impl ConvertParams {
    pub const PROJECTION: &'static str = "Equirectangular";
    pub const CODEC: &'static str = "H.264/MPEG-4 AVC";
    pub const TOP_BOTTOM_CORRECTION: &'static str = "Apply";

    pub fn for_source(file_url: &str, width: u32) -> Self {
        ConvertParams {
            file_url: file_url.to_string(),
            size: ConvertSize::for_width(width),
        }
    }
}

/// Handle of a submitted conversion command.
#[derive(Debug, Clone)]
pub struct ConvertHandle {
    pub id: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandState {
    InProgress,
    Done,
    Error,
}

/// Progress report of a conversion command.
#[derive(Debug, Clone)]
pub struct ConvertStatus {
    pub state: CommandState,
    /// Fractional completion in [0.0, 1.0].
    pub completion: f64,
    /// Set once `state` is `Done`.
    pub result_url: Option<String>,
}

/// Client for the camera's web API. The gateway treats the conversion as an
/// opaque long-running remote job.
#[async_trait]
pub trait CameraClient: Send + Sync {
    async fn list_files(&self) -> Result<Vec<FileEntry>, CameraError>;

    /// Remaining storage on the camera, in bytes.
    async fn remaining_space(&self) -> Result<u64, CameraError>;

    /// Battery charge as a fraction in [0.0, 1.0].
    async fn battery_level(&self) -> Result<f64, CameraError>;

    /// JPEG thumbnail bytes for a listed file.
    async fn get_thumbnail(&self, file_url: &str) -> Result<Vec<u8>, CameraError>;

    async fn convert_video(&self, params: &ConvertParams) -> Result<ConvertHandle, CameraError>;

    async fn command_status(&self, handle: &ConvertHandle) -> Result<ConvertStatus, CameraError>;

    /// Cancel the conversion currently running on the camera.
    async fn cancel_convert(&self) -> Result<(), CameraError>;
}
