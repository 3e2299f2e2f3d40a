// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the annotation store and its I/O.

use crate::models::clip::{ClipId, Frame, Label};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by annotation operations.
///
/// None of these leave a store partially mutated: the failing call is
/// rejected as a whole and the previous state stays both in memory and on
/// disk.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("frame {frame} is outside [{start}, {end})")]
    OutOfRange { frame: Frame, start: Frame, end: Frame },

    #[error("reason {reason:?} is not a valid {label} reason")]
    InvalidReason { reason: String, label: Label },

    #[error(
        "video {} changed since it was annotated (recorded SHA-256 {recorded}, current {current})",
        .path.display()
    )]
    Integrity {
        path: PathBuf,
        recorded: String,
        current: String,
    },

    #[error("clip {0} does not exist")]
    UnknownClip(ClipId),

    #[error("invalid annotation record for {checksum}: {reason}")]
    InvalidRecord { checksum: String, reason: String },

    #[error("motion data has {got} values, clip needs {needed}")]
    InvalidMotionData { needed: usize, got: usize },

    #[error("media probe failed: {0}")]
    Probe(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl AnnotationError {
    /// Whether the caller can resolve this error by choosing how to proceed
    /// (start over or override) rather than by fixing its input.
    pub fn is_integrity(&self) -> bool {
        matches!(self, AnnotationError::Integrity { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
