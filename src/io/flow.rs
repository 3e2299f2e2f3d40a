// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Per-frame motion scores.
//!
//! Motion data is a flat series of `f64`, one value per frame transition
//! (value `i` is the motion between frame `i` and `i + 1`). On disk it is a
//! little-endian `i32` count followed by that many little-endian `f64`s.

use crate::error::{AnnotationError, Result};
use std::path::Path;

/// Write a motion series.
pub fn save(path: &Path, data: &[f64]) -> Result<()> {
    let len = i32::try_from(data.len()).map_err(|_| AnnotationError::InvalidMotionData {
        needed: i32::MAX as usize,
        got: data.len(),
    })?;
    let mut bytes = Vec::with_capacity(4 + data.len() * 8);
    bytes.extend_from_slice(&len.to_le_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a motion series written by [`save`]. The body must hold exactly the
/// announced number of values.
pub fn load(path: &Path) -> Result<Vec<f64>> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 4 {
        return Err(AnnotationError::InvalidMotionData {
            needed: 4,
            got: bytes.len(),
        });
    }
    let (head, body) = bytes.split_at(4);

    let len = i32::from_le_bytes([head[0], head[1], head[2], head[3]]).max(0) as usize;
    if body.len() != len * 8 {
        return Err(AnnotationError::InvalidMotionData {
            needed: len,
            got: body.len() / 8,
        });
    }

    let data: Vec<f64> = body
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    log::debug!("Loaded motion data from {}, length={}", path.display(), data.len());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.flow");
        let data = vec![0.0, 0.125, 3.5, -1.0];

        save(&path, &data).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 + 4 * 8);
        assert_eq!(load(&path).unwrap(), data);
    }

    #[test]
    fn test_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.flow");
        let mut bytes = 3i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            load(&path),
            Err(AnnotationError::InvalidMotionData { needed: 3, got: 1 })
        ));

        std::fs::write(&path, [1u8, 0]).unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("long.flow");
        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        bytes.extend_from_slice(&2.0f64.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load(&path),
            Err(AnnotationError::InvalidMotionData { needed: 1, got: 2 })
        ));

        bytes.truncate(4 + 8 + 3);
        std::fs::write(&path, &bytes).unwrap();
        assert!(load(&path).is_err());
    }
}
