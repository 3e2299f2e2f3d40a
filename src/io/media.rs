// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Media file identity.
//!
//! Annotations only need three facts about a video: how many frames it has,
//! its frame rate, and a checksum of its bytes. Decoding is left to whatever
//! player the UI embeds; here the frame facts come from `ffprobe`.

use crate::error::{AnnotationError, Result};
use crate::models::clip::Frame;
use crate::models::record::VideoIdentity;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

/// Read size used while hashing.
const CHECKSUM_BLOCK: usize = 1 << 16;

/// Compute the lower-case hex SHA-256 of a file, reading it in blocks.
pub fn checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHECKSUM_BLOCK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Frame facts of a video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub frame_count: Frame,
    pub fps: f64,
}

/// Source of frame counts and rates for video files.
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> Result<StreamInfo>;
}

/// Probe that always reports the same stream, for callers that already know
/// the frame count.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub StreamInfo);

impl MediaProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> Result<StreamInfo> {
        Ok(self.0)
    }
}

/// Probe backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self {
            program: "ffprobe".to_string(),
        }
    }
}

impl FfprobeProbe {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<StreamInfo> {
        if !path.exists() {
            return Err(AnnotationError::Probe(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let output = Command::new(&self.program)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .map_err(|e| AnnotationError::Probe(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnnotationError::Probe(format!("ffprobe failed: {}", stderr)));
        }

        parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    streams: Option<Vec<FFprobeStream>>,
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    codec_type: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
}

/// Extract frame count and rate from `ffprobe -print_format json` output.
///
/// Containers that do not record `nb_frames` get a count derived from the
/// duration and the average frame rate.
fn parse_ffprobe_output(json: &str) -> Result<StreamInfo> {
    let output: FFprobeOutput = serde_json::from_str(json)?;

    let stream = output
        .streams
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| AnnotationError::Probe("no video stream".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| AnnotationError::Probe("unknown frame rate".to_string()))?;

    let counted = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<Frame>().ok())
        .filter(|&n| n > 0);

    let frame_count = match counted {
        Some(n) => n,
        None => {
            let duration = stream
                .duration
                .as_deref()
                .or(output.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .ok_or_else(|| AnnotationError::Probe("unknown frame count".to_string()))?;
            (duration * fps).round() as Frame
        }
    };

    Ok(StreamInfo { frame_count, fps })
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

impl VideoIdentity {
    /// Probe and hash a video file. The identity carries the canonical path
    /// so that any spelling of the same file finds its record.
    pub fn from_file(path: &Path, probe: &dyn MediaProbe) -> Result<Self> {
        let info = probe.probe(path)?;
        let path = std::fs::canonicalize(path)?;
        let checksum = checksum(&path)?;
        log::info!(
            "Identified {}: {} frames @ {:.3} fps, SHA-256:{}",
            path.display(),
            info.frame_count,
            info.fps,
            checksum
        );
        Ok(Self {
            path,
            frame_count: info.frame_count,
            fps: info.fps,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_known_values() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.bin");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(
            checksum(&empty).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        // Larger than one block.
        let big = dir.path().join("big.bin");
        let data = vec![7u8; CHECKSUM_BLOCK * 2 + 5];
        std::fs::write(&big, &data).unwrap();
        assert_eq!(checksum(&big).unwrap(), format!("{:x}", Sha256::digest(&data)));
    }

    #[test]
    fn test_parse_ffprobe_with_frame_count() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "r_frame_rate": "0/0"},
                {"codec_type": "video", "r_frame_rate": "30000/1001",
                 "avg_frame_rate": "30000/1001", "nb_frames": "1798"}
            ],
            "format": {"duration": "60.0"}
        }"#;
        let info = parse_ffprobe_output(json).unwrap();
        assert_eq!(info.frame_count, 1798);
        assert!((info.fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_ffprobe_from_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "r_frame_rate": "25/1", "avg_frame_rate": "0/0"}],
            "format": {"duration": "4.0"}
        }"#;
        let info = parse_ffprobe_output(json).unwrap();
        assert_eq!(info.frame_count, 100);
        assert_eq!(info.fps, 25.0);
    }

    #[test]
    fn test_parse_ffprobe_without_video() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(parse_ffprobe_output(json), Err(AnnotationError::Probe(_))));
    }

    #[test]
    fn test_identity_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        let probe = FixedProbe(StreamInfo { frame_count: 100, fps: 25.0 });

        let identity = VideoIdentity::from_file(&path, &probe).unwrap();
        assert_eq!(identity.frame_count, 100);
        assert_eq!(identity.checksum.len(), 64);
        assert_eq!(identity.path, std::fs::canonicalize(&path).unwrap());

        let dotted = dir.path().join(".").join("clip.mp4");
        let same = VideoIdentity::from_file(&dotted, &probe).unwrap();
        assert_eq!(same.path, identity.path);
        assert_eq!(same.checksum, identity.checksum);
    }
}
