use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 8888;
const DEFAULT_CAMERA_ENDPOINT: &str = "http://127.0.0.1:8080";
const DEFAULT_DCIM_DIR: &str = "/sdcard/DCIM";
const DEFAULT_STAGING_DIR: &str = "/sdcard/Converted";
const DEFAULT_ASSETS_DIR: &str = "assets";
/// Directory under DCIM where corrected videos are placed.
const CORRECTED_DIR_NAME: &str = "Spherecast";

/// Suffix appended to a corrected video's file name, before the extension.
pub const CORRECTED_SUFFIX: &str = "_corrected";

pub const PROCESSING_ASSET: &str = "processing.mp4";
pub const DONE_ASSET: &str = "done.mp4";

fn default_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|os| os.into_string().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or_default();
    if host.is_empty() {
        "spherecast".to_string()
    } else {
        format!("spherecast@{}", host)
    }
}

#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub name: Option<String>,
    pub camera: Option<String>,
    pub localhost: Option<bool>,
    pub correction: Option<bool>,
    pub dcim_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub corrected_dir: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
}

/// On-disk layout shared by population, the HTTP server, and the converter.
#[derive(Debug, Clone)]
pub struct Storage {
    /// Where the camera stores captured files, mirrored by the listing.
    pub dcim_dir: PathBuf,
    /// Where the camera's conversion command stages its raw output.
    pub staging_dir: PathBuf,
    /// Permanent home of corrected videos.
    pub corrected_dir: PathBuf,
}

impl Storage {
    /// Local path of a listed camera file, from its id (`/NNNxxxxx/stem`
    /// form) plus the original file name for the extension.
    pub fn local_media_path(&self, dcf_dir: &str, file_name: &str) -> PathBuf {
        self.dcim_dir.join(dcf_dir).join(file_name)
    }

    /// The fixed output path of a correction, computed purely from the
    /// source item id.
    pub fn corrected_output(&self, source_id: &str) -> PathBuf {
        let rel = source_id.trim_start_matches('/');
        self.corrected_dir
            .join(format!("{rel}{CORRECTED_SUFFIX}.MP4"))
    }
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub name: String,
    /// Base URL of the camera's web API.
    pub camera: String,
    pub localhost: bool,
    /// Whether the correction feature (and its catalog subtree) is enabled.
    pub correction: bool,
    pub storage: Storage,
    pub assets_dir: PathBuf,
}

impl Config {
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        let dcim_dir = file
            .dcim_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DCIM_DIR));
        let corrected_dir = file
            .corrected_dir
            .unwrap_or_else(|| dcim_dir.join(CORRECTED_DIR_NAME));
        Config {
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            name: args.name.clone().or(file.name).unwrap_or_else(default_name),
            camera: args
                .camera
                .clone()
                .or(file.camera)
                .unwrap_or_else(|| DEFAULT_CAMERA_ENDPOINT.to_string()),
            localhost: args.localhost || file.localhost.unwrap_or(false),
            correction: if args.no_correction {
                false
            } else {
                file.correction.unwrap_or(true)
            },
            storage: Storage {
                dcim_dir,
                staging_dir: file
                    .staging_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
                corrected_dir,
            },
            assets_dir: file
                .assets_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
        }
    }
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("spherecast.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let xdg_config = config_dir.join("spherecast").join("config.toml");
        if xdg_config.exists() {
            return Some(xdg_config);
        }
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("placeholder asset unreadable: {path}: {source}")]
    Asset {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    Ok(config)
}

/// The two fixed placeholder clips substituted for not-yet-real content.
/// Their byte lengths are read once, at startup, and advertised as the
/// length of pending ("processing") and finished ("done") corrections.
#[derive(Debug, Clone)]
pub struct Placeholders {
    pub processing: PathBuf,
    pub processing_len: u64,
    pub done: PathBuf,
    pub done_len: u64,
}

impl Placeholders {
    pub fn load(assets_dir: &Path) -> Result<Self, ConfigError> {
        let processing = assets_dir.join(PROCESSING_ASSET);
        let done = assets_dir.join(DONE_ASSET);
        let processing_len = asset_len(&processing)?;
        let done_len = asset_len(&done)?;
        Ok(Placeholders {
            processing,
            processing_len,
            done,
            done_len,
        })
    }
}

fn asset_len(path: &Path) -> Result<u64, ConfigError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| ConfigError::Asset {
            path: path.to_owned(),
            source,
        })
}
