// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation file serialization and deserialization.
//!
//! One annotation file holds the records of many videos, keyed by content
//! checksum, preceded by a meta-info entry describing the program that wrote
//! it. JSON is the native format; YAML is used when the file extension asks
//! for it.

use crate::config::ApplicationInfo;
use crate::error::{AnnotationError, Result};
use crate::models::record::VideoRecord;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Key of the entry holding program metadata.
pub const METAINFO_KEY: &str = "<application:meta-info>";

/// Files written before this version are keyed by video path instead of
/// checksum.
const CHECKSUM_KEYED_SINCE: (u32, u32, u32) = (0, 1, 1);

/// On-disk encoding, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

/// Every record of an annotation file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationFile {
    pub meta: Option<ApplicationInfo>,
    pub records: IndexMap<String, VideoRecord>,
}

impl AnnotationFile {
    /// Find the record of a video by checksum.
    pub fn by_checksum(&self, checksum: &str) -> Option<&VideoRecord> {
        self.records.get(checksum)
    }

    /// Find the most recently added record annotated under a path, with
    /// the key it is stored under. Paths naming the same file match even
    /// when spelled differently.
    pub fn by_filepath(&self, filepath: &str) -> Option<(&str, &VideoRecord)> {
        self.records
            .iter()
            .rev()
            .find(|(_, r)| same_file(&r.filepath, filepath))
            .map(|(key, r)| (key.as_str(), r))
    }
}

/// Whether two recorded paths refer to the same file. Paths that cannot be
/// resolved (the file is gone) only match verbatim.
fn same_file(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Read an annotation file. A missing file reads as empty.
pub fn read(path: &Path) -> Result<AnnotationFile> {
    if !path.exists() {
        return Ok(AnnotationFile::default());
    }

    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(AnnotationFile::default());
    }
    let value: Value = match Format::from_path(path) {
        Format::Json => serde_json::from_str(&text)?,
        Format::Yaml => serde_yaml::from_str(&text)?,
    };
    let file = decode(value)?;
    log::info!(
        "Loaded annotations from {}, len={}",
        path.display(),
        file.records.len()
    );
    Ok(file)
}

/// Write an annotation file, replacing any previous contents atomically.
pub fn write(path: &Path, file: &AnnotationFile) -> Result<()> {
    let value = encode(file)?;
    let bytes = match Format::from_path(path) {
        Format::Json => serde_json::to_vec_pretty(&value)?,
        Format::Yaml => serde_yaml::to_string(&value)?.into_bytes(),
    };
    atomic_write_bytes(path, &bytes)?;
    log::debug!(
        "Saved annotations to {}, len={}",
        path.display(),
        file.records.len()
    );
    Ok(())
}

fn decode(value: Value) -> Result<AnnotationFile> {
    let Value::Object(mut entries) = value else {
        return Err(invalid("<file>", "top level is not a map"));
    };

    let meta = match entries.shift_remove(METAINFO_KEY) {
        Some(Value::Null) | None => None,
        Some(meta) => Some(serde_json::from_value::<ApplicationInfo>(meta)?),
    };
    let legacy = meta
        .as_ref()
        .map(|m| parse_version(&m.version) < CHECKSUM_KEYED_SINCE)
        .unwrap_or(false);

    let mut records = IndexMap::with_capacity(entries.len());
    for (key, mut value) in entries {
        if legacy {
            // Older files are keyed by path and may lack the filepath field.
            if let Value::Object(fields) = &mut value {
                fields
                    .entry("filepath")
                    .or_insert_with(|| Value::String(key.clone()));
            }
        }
        let record: VideoRecord = serde_json::from_value(value)?;
        let key = if legacy { record.checksum.clone() } else { key };
        records.insert(key, record);
    }

    if legacy {
        log::info!(
            "Converted {} annotation records to checksum keys",
            records.len()
        );
    }

    Ok(AnnotationFile { meta, records })
}

fn encode(file: &AnnotationFile) -> Result<Value> {
    let mut map = Map::new();
    if let Some(meta) = &file.meta {
        map.insert(METAINFO_KEY.to_string(), serde_json::to_value(meta)?);
    }
    for (key, record) in &file.records {
        map.insert(key.clone(), serde_json::to_value(record)?);
    }
    Ok(Value::Object(map))
}

/// Parse `major.minor.patch`, treating missing or malformed parts as zero.
fn parse_version(version: &str) -> (u32, u32, u32) {
    let mut parts = version
        .split('.')
        .map(|p| p.trim().parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

fn invalid(checksum: &str, reason: &str) -> AnnotationError {
    AnnotationError::InvalidRecord {
        checksum: checksum.to_string(),
        reason: reason.to_string(),
    }
}

/// Write bytes to a sibling temporary file, sync it, then rename it over
/// `path`.
fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "annotations".to_string());
    tmp.set_file_name(format!("{file_name}.tmp"));
    tmp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::clip::{ClipAnnotation, ClipId, Label};
    use tempfile::TempDir;

    fn sample_file() -> AnnotationFile {
        let mut record = VideoRecord::new("videos/a.mp4".to_string(), "aaa".to_string());
        record.break_points.insert(40);
        record.clips.insert(
            ClipId::new(0, 40),
            ClipAnnotation {
                label: Some(Label::Accept),
                reasons: vec!["固定拍摄".to_string()],
                keyframes: [20].into_iter().collect(),
            },
        );
        let other = VideoRecord::new("videos/b.mp4".to_string(), "bbb".to_string());

        let mut records = IndexMap::new();
        records.insert("aaa".to_string(), record);
        records.insert("bbb".to_string(), other);
        AnnotationFile {
            meta: Some(ApplicationInfo::default()),
            records,
        }
    }

    #[test]
    fn test_json_roundtrip_keeps_order_and_meta() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.json");
        let file = sample_file();

        write(&path, &file).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_start().starts_with("{\n  \"<application:meta-info>\""));
        assert!(!dir.path().join("annotations.json.tmp").exists());

        let loaded = read(&path).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.records.keys().collect::<Vec<_>>(), vec!["aaa", "bbb"]);
    }

    #[test]
    fn test_yaml_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.yaml");
        let file = sample_file();

        write(&path, &file).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("break_points:"));
        assert_eq!(read(&path).unwrap(), file);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = read(&dir.path().join("none.json")).unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.meta.is_none());
    }

    #[test]
    fn test_legacy_path_keyed_file_is_rekeyed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.json");
        std::fs::write(
            &path,
            r#"{
              "<application:meta-info>": {"name": "Video Annotation Tool", "version": "0.1.0"},
              "videos/a.mp4": {
                "checksum": "aaa",
                "clips": [{"start_frame": 0, "end_frame": 100, "label": "Reject",
                           "reasons": ["1"], "keyframes": []}],
                "break_points": []
              }
            }"#,
        )
        .unwrap();

        let loaded = read(&path).unwrap();
        let record = loaded.by_checksum("aaa").unwrap();
        assert_eq!(record.filepath, "videos/a.mp4");
        assert_eq!(record.clips[&ClipId::new(0, 100)].label, Some(Label::Reject));
        assert_eq!(loaded.by_filepath("videos/a.mp4").map(|(key, _)| key), Some("aaa"));
        assert!(loaded.records.get("videos/a.mp4").is_none());
    }

    #[test]
    fn test_by_filepath_matches_other_spellings() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"frames").unwrap();
        let plain = video.to_string_lossy().to_string();
        let dotted = dir.path().join(".").join("a.mp4").to_string_lossy().to_string();

        let mut file = AnnotationFile::default();
        file.records
            .insert("aaa".to_string(), VideoRecord::new(plain.clone(), "aaa".to_string()));
        file.records
            .insert("bbb".to_string(), VideoRecord::new("elsewhere.mp4".to_string(), "bbb".to_string()));

        assert_eq!(file.by_filepath(&dotted).map(|(key, _)| key), Some("aaa"));
        assert_eq!(file.by_filepath(&plain).map(|(key, _)| key), Some("aaa"));
        assert!(file.by_filepath(&dir.path().join("b.mp4").to_string_lossy()).is_none());
    }

    #[test]
    fn test_non_map_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(read(&path), Err(AnnotationError::InvalidRecord { .. })));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("0.1.1"), (0, 1, 1));
        assert_eq!(parse_version("1.2"), (1, 2, 0));
        assert_eq!(parse_version("x.y.z"), (0, 0, 0));
        assert!(parse_version("0.0.9") < CHECKSUM_KEYED_SINCE);
    }
}
