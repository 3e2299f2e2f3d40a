// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Per-video annotation record.
//!
//! A record stores break points and the annotations of clips that carry any
//! data. The clip list itself is never stored: it is derived from the break
//! points and the video's frame count whenever it is needed.

use super::clip::{ClipAnnotation, ClipId, Frame, Label};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// What identifies a video file: where it is, how long it is, and what its
/// bytes hash to.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoIdentity {
    pub path: PathBuf,
    pub frame_count: Frame,
    pub fps: f64,
    /// Lower-case hex SHA-256 of the file contents.
    pub checksum: String,
}

/// Annotation data for one video, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub filepath: String,
    pub checksum: String,
    #[serde(default)]
    pub break_points: BTreeSet<Frame>,
    #[serde(default, with = "clip_entries")]
    pub clips: BTreeMap<ClipId, ClipAnnotation>,
}

impl VideoRecord {
    /// Create an empty record for the given video.
    pub fn new(filepath: String, checksum: String) -> Self {
        Self {
            filepath,
            checksum,
            break_points: BTreeSet::new(),
            clips: BTreeMap::new(),
        }
    }

    /// Derive the clips tiling `[0, frame_count)`.
    pub fn clip_ids(&self, frame_count: Frame) -> Vec<ClipId> {
        derive_clips(&self.break_points, frame_count)
    }

    /// Check the record against a video's frame count.
    ///
    /// Break points must lie strictly inside the video, every stored clip
    /// annotation must belong to a derived clip, and keyframes must lie
    /// inside their clip.
    pub fn validate(&self, frame_count: Frame) -> Result<(), String> {
        if let Some(bp) = self
            .break_points
            .iter()
            .find(|&&bp| bp == 0 || bp >= frame_count)
        {
            return Err(format!(
                "break point {bp} is outside (0, {frame_count})"
            ));
        }

        let derived: BTreeSet<ClipId> = self.clip_ids(frame_count).into_iter().collect();
        for (clip, annotation) in &self.clips {
            if !derived.contains(clip) {
                return Err(format!("clip {clip} does not match the break points"));
            }
            if let Some(kf) = annotation.keyframes.iter().find(|&&kf| !clip.contains(kf)) {
                return Err(format!("keyframe {kf} lies outside clip {clip}"));
            }
        }

        Ok(())
    }

    /// Drop annotations that carry no data.
    pub fn prune(&mut self) {
        self.clips.retain(|_, annotation| !annotation.is_empty());
    }
}

/// Clips tiling `[0, frame_count)` given the interior break points.
pub fn derive_clips(break_points: &BTreeSet<Frame>, frame_count: Frame) -> Vec<ClipId> {
    if frame_count == 0 {
        return Vec::new();
    }
    let mut clips = Vec::with_capacity(break_points.len() + 1);
    let mut last = 0;
    for &bp in break_points.range(1..frame_count) {
        clips.push(ClipId::new(last, bp));
        last = bp;
    }
    if last < frame_count {
        clips.push(ClipId::new(last, frame_count));
    }
    clips
}

/// Serialized form of one clip annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClipEntry {
    start_frame: Frame,
    end_frame: Frame,
    label: Option<Label>,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    keyframes: BTreeSet<Frame>,
}

/// Clip annotations are written as a list of entries carrying their
/// boundaries, which keeps the file readable and diffable.
mod clip_entries {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        clips: &BTreeMap<ClipId, ClipAnnotation>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries: Vec<ClipEntry> = clips
            .iter()
            .filter(|(_, annotation)| !annotation.is_empty())
            .map(|(clip, annotation)| ClipEntry {
                start_frame: clip.start,
                end_frame: clip.end,
                label: annotation.label,
                reasons: annotation.reasons.clone(),
                keyframes: annotation.keyframes.clone(),
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<ClipId, ClipAnnotation>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<ClipEntry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                (
                    ClipId::new(entry.start_frame, entry.end_frame),
                    ClipAnnotation {
                        label: entry.label,
                        reasons: entry.reasons,
                        keyframes: entry.keyframes,
                    },
                )
            })
            .filter(|(_, annotation)| !annotation.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_clips_tiles_range() {
        assert_eq!(derive_clips(&BTreeSet::new(), 100), vec![ClipId::new(0, 100)]);

        let bps: BTreeSet<Frame> = [40, 70].into_iter().collect();
        assert_eq!(
            derive_clips(&bps, 100),
            vec![ClipId::new(0, 40), ClipId::new(40, 70), ClipId::new(70, 100)]
        );

        assert!(derive_clips(&BTreeSet::new(), 0).is_empty());
    }

    #[test]
    fn test_reads_clip_entry_layout() {
        // Every clip listed, unlabelled ones included, as older files do.
        let json = r#"{
            "filepath": "videos/a.mp4",
            "checksum": "abc",
            "clips": [
                {"start_frame": 0, "end_frame": 40, "label": "Accept",
                 "reasons": ["1"], "keyframes": [20, 10]},
                {"start_frame": 40, "end_frame": 100, "label": null,
                 "reasons": [], "keyframes": []}
            ],
            "break_points": [40]
        }"#;
        let record: VideoRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.break_points.iter().copied().collect::<Vec<_>>(), vec![40]);
        assert_eq!(record.clips.len(), 1);
        let annotation = &record.clips[&ClipId::new(0, 40)];
        assert_eq!(annotation.label, Some(Label::Accept));
        assert_eq!(annotation.keyframes.iter().copied().collect::<Vec<_>>(), vec![10, 20]);
        assert!(record.validate(100).is_ok());
    }

    #[test]
    fn test_validate_rejects_stale_data() {
        let mut record = VideoRecord::new("a.mp4".into(), "abc".into());
        record.break_points.insert(120);
        assert!(record.validate(100).is_err());

        let mut record = VideoRecord::new("a.mp4".into(), "abc".into());
        record.break_points.insert(40);
        record.clips.insert(
            ClipId::new(0, 50),
            ClipAnnotation {
                label: Some(Label::Reject),
                ..Default::default()
            },
        );
        assert!(record.validate(100).is_err());

        let mut record = VideoRecord::new("a.mp4".into(), "abc".into());
        record.clips.insert(
            ClipId::new(0, 100),
            ClipAnnotation {
                keyframes: [100].into_iter().collect(),
                ..Default::default()
            },
        );
        assert!(record.validate(100).is_err());
    }

    #[test]
    fn test_empty_annotations_are_not_written() {
        let mut record = VideoRecord::new("a.mp4".into(), "abc".into());
        record.clips.insert(ClipId::new(0, 100), ClipAnnotation::default());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["clips"], serde_json::json!([]));
    }
}
