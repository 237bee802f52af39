//! Device status oracle: remaining storage and battery, read from the
//! camera's option channel. Pure reads, no state.

use std::sync::Arc;
use std::time::Duration;

use crate::camera::{CameraClient, CameraError};

/// A conversion is refused unless at least this much storage remains after
/// subtracting the source file's size.
pub const REJECT_PROCESS_THRESHOLD: u64 = 1 << 30; // 1 GiB
pub const CRITICAL_STORAGE_THRESHOLD: u64 = 2 << 30; // 2 GiB
pub const LOW_STORAGE_THRESHOLD: u64 = 5 << 30; // 5 GiB
pub const LOW_BATTERY_LEVEL: f64 = 0.10;

/// Camera option queries must not hang the caller; a bounded wait with a
/// definite failure is required.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StorageHealth {
    Healthy,
    Low,
    Critical,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("device status query timed out")]
    Timeout,
    #[error(transparent)]
    Camera(#[from] CameraError),
}

#[derive(Clone)]
pub struct StatusChecker {
    camera: Arc<dyn CameraClient>,
}

impl StatusChecker {
    pub fn new(camera: Arc<dyn CameraClient>) -> Self {
        StatusChecker { camera }
    }

    /// Remaining storage in bytes. Failure surfaces as an error, never as a
    /// silent zero.
    pub async fn remaining_storage(&self) -> Result<u64, StatusError> {
        tokio::time::timeout(QUERY_TIMEOUT, self.camera.remaining_space())
            .await
            .map_err(|_| StatusError::Timeout)?
            .map_err(StatusError::Camera)
    }

    pub async fn storage_health(&self) -> Result<StorageHealth, StatusError> {
        let remaining = self.remaining_storage().await?;
        let health = Self::classify(remaining);
        match health {
            StorageHealth::Critical => tracing::info!("remaining storage is critical"),
            StorageHealth::Low => tracing::info!("remaining storage is low"),
            StorageHealth::Healthy => {}
        }
        Ok(health)
    }

    /// Pure tiering of a remaining-storage reading.
    pub fn classify(remaining: u64) -> StorageHealth {
        if remaining <= CRITICAL_STORAGE_THRESHOLD {
            StorageHealth::Critical
        } else if remaining <= LOW_STORAGE_THRESHOLD {
            StorageHealth::Low
        } else {
            StorageHealth::Healthy
        }
    }

    /// Admission gate: true iff `remaining - candidate_size` still clears the
    /// reject threshold. Stricter than, and independent from, the tiering.
    pub async fn has_enough_storage(&self, candidate_size: u64) -> Result<bool, StatusError> {
        let remaining = self.remaining_storage().await?;
        let headroom = remaining.saturating_sub(candidate_size);
        tracing::debug!(
            "remaining - candidate = {remaining} - {candidate_size} = {headroom}"
        );
        Ok(headroom >= REJECT_PROCESS_THRESHOLD)
    }

    /// True iff the battery charge fraction is above the low-battery level.
    pub async fn has_enough_battery(&self) -> Result<bool, StatusError> {
        let level = tokio::time::timeout(QUERY_TIMEOUT, self.camera.battery_level())
            .await
            .map_err(|_| StatusError::Timeout)?
            .map_err(StatusError::Camera)?;
        tracing::debug!("battery level: {level}");
        if level <= LOW_BATTERY_LEVEL {
            tracing::info!("battery level is low");
            return Ok(false);
        }
        Ok(true)
    }
}
