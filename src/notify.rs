//! Operator-visible signals. The core decides which signal to emit; how it
//! is rendered (LEDs, sounds, a media index) belongs to the host.

use std::path::Path;

use crate::status::StorageHealth;

pub trait HostNotifier: Send + Sync {
    /// An error cue: failed admission, remote job failure, I/O failure.
    fn error_cue(&self);

    /// A conversion finished and its output is playable.
    fn conversion_done_cue(&self);

    /// The three-tier storage indicator.
    fn storage_health(&self, health: StorageHealth);

    /// A new file should be picked up by the host's media index.
    fn media_registered(&self, path: &Path);
}

/// Default notifier: logs every signal.
pub struct LogNotifier;

impl HostNotifier for LogNotifier {
    fn error_cue(&self) {
        tracing::warn!("signal: error");
    }

    fn conversion_done_cue(&self) {
        tracing::info!("signal: conversion done");
    }

    fn storage_health(&self, health: StorageHealth) {
        tracing::info!("signal: storage {:?}", health);
    }

    fn media_registered(&self, path: &Path) {
        tracing::info!("signal: media registered: {}", path.display());
    }
}
