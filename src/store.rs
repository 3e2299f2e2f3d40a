// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation state store.
//!
//! The store owns the annotation record of one video and is the only place
//! that mutates it. Clips are never stored on their own: they are derived
//! from the break points and the frame count, and clip annotations are keyed
//! by the boundary pair of the clip they belong to.
//!
//! Every mutation is computed on a copy of the record, written to the
//! annotation file, and only then made current. A failed write therefore
//! leaves both memory and disk exactly as they were.
//!
//! When a break point is removed the two clips around it merge. If exactly
//! one of them is labelled, the merged clip keeps that label and its reasons;
//! otherwise the merged clip is unlabelled. Keyframes of both sides are kept,
//! since they already lie inside the merged range. Inserting a break point
//! splits a clip into two unlabelled clips without keyframes.

use crate::config::ApplicationInfo;
use crate::error::{AnnotationError, Result};
use crate::io::serialization::{self, AnnotationFile};
use crate::models::clip::{Clip, ClipAnnotation, ClipId, Frame, Label};
use crate::models::record::{derive_clips, VideoIdentity, VideoRecord};
use crate::models::taxonomy::ReasonCatalog;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a toggle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Inserted,
    Removed,
    /// Nothing to toggle (the implicit start boundary).
    Unchanged,
}

/// What [`AnnotationStore::navigate`] looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    BreakPoint,
    Keyframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// How an existing record is matched to the video being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Refuse records whose recorded checksum differs from the video's.
    pub validate_checksum: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            validate_checksum: true,
        }
    }
}

/// Annotation state of one open video, written through to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStore {
    path: PathBuf,
    identity: VideoIdentity,
    catalog: Arc<ReasonCatalog>,
    meta: ApplicationInfo,
    /// The annotation file as last written (or read).
    file: AnnotationFile,
    record: VideoRecord,
    /// Key of a record adopted from older contents of this video, removed
    /// from the file by the next commit.
    adopted_from: Option<String>,
}

impl AnnotationStore {
    /// Open the annotation state of a video from an annotation file.
    ///
    /// The record is looked up by checksum. A record stored under the same
    /// video path with a different checksum means the video changed since
    /// it was annotated: with validation enabled this fails with
    /// [`AnnotationError::Integrity`] and nothing is applied; without it the
    /// old annotations are adopted for the new contents. A video with no
    /// record starts empty. An adopted record moves to the new checksum on
    /// the next write.
    pub fn open(
        path: &Path,
        identity: VideoIdentity,
        catalog: Arc<ReasonCatalog>,
        meta: ApplicationInfo,
        options: LoadOptions,
    ) -> Result<Self> {
        let file = serialization::read(path)?;
        let filepath = identity.path.to_string_lossy().to_string();

        let mut adopted_from = None;
        let found = if let Some(record) = file.by_checksum(&identity.checksum) {
            if record.checksum != identity.checksum {
                check_integrity(&identity, &record.checksum, options)?;
            }
            Some(record.clone())
        } else if let Some((key, record)) = file.by_filepath(&filepath) {
            check_integrity(&identity, &record.checksum, options)?;
            adopted_from = Some(key.to_string());
            Some(record.clone())
        } else {
            None
        };

        let record = match found {
            Some(mut record) => {
                record
                    .validate(identity.frame_count)
                    .map_err(|reason| AnnotationError::InvalidRecord {
                        checksum: identity.checksum.clone(),
                        reason,
                    })?;
                record.checksum = identity.checksum.clone();
                record.filepath = filepath;
                log::debug!("Loading saved state for {}", identity.path.display());
                record
            }
            None => {
                log::debug!("Creating new state for {}", identity.path.display());
                VideoRecord::new(filepath, identity.checksum.clone())
            }
        };

        let store = Self {
            path: path.to_path_buf(),
            identity,
            catalog,
            meta,
            file,
            record,
            adopted_from,
        };
        for (clip, reason) in store.orphaned_reasons() {
            log::warn!("Clip {} keeps reason {:?} missing from the taxonomy", clip, reason);
        }
        Ok(store)
    }

    /// Open a video with an empty record, ignoring whatever was stored for
    /// it. Records of other videos, including a stale record of this video
    /// under its old checksum, are kept.
    pub fn open_fresh(
        path: &Path,
        identity: VideoIdentity,
        catalog: Arc<ReasonCatalog>,
        meta: ApplicationInfo,
    ) -> Result<Self> {
        let file = serialization::read(path)?;
        let record = VideoRecord::new(
            identity.path.to_string_lossy().to_string(),
            identity.checksum.clone(),
        );
        log::info!("Starting over on {}", identity.path.display());
        Ok(Self {
            path: path.to_path_buf(),
            identity,
            catalog,
            meta,
            file,
            record,
            adopted_from: None,
        })
    }

    pub fn identity(&self) -> &VideoIdentity {
        &self.identity
    }

    pub fn record(&self) -> &VideoRecord {
        &self.record
    }

    /// Path of the annotation file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &ReasonCatalog {
        &self.catalog
    }

    pub fn frame_count(&self) -> Frame {
        self.identity.frame_count
    }

    pub fn break_points(&self) -> &BTreeSet<Frame> {
        &self.record.break_points
    }

    /// Current clips, in frame order.
    pub fn clip_ids(&self) -> Vec<ClipId> {
        self.record.clip_ids(self.frame_count())
    }

    /// Current clips with their annotations, in frame order.
    pub fn clips(&self) -> Vec<Clip> {
        self.clip_ids()
            .into_iter()
            .map(|id| Clip {
                id,
                annotation: self.record.clips.get(&id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// The clip containing a frame.
    pub fn clip_at(&self, frame: Frame) -> Option<ClipId> {
        if frame >= self.frame_count() {
            return None;
        }
        let start = self
            .record
            .break_points
            .range(..=frame)
            .next_back()
            .copied()
            .unwrap_or(0);
        let end = self
            .record
            .break_points
            .range((Bound::Excluded(frame), Bound::Unbounded))
            .next()
            .copied()
            .unwrap_or(self.frame_count());
        Some(ClipId::new(start, end))
    }

    /// Whether `clip` is one of the current clips.
    pub fn has_clip(&self, clip: ClipId) -> bool {
        self.clip_at(clip.start) == Some(clip)
    }

    /// Annotation of a current clip; `None` if the clip does not exist.
    pub fn annotation(&self, clip: ClipId) -> Option<ClipAnnotation> {
        self.has_clip(clip)
            .then(|| self.record.clips.get(&clip).cloned().unwrap_or_default())
    }

    /// Insert a break point, or remove it if present.
    ///
    /// Frame 0 is the implicit start of the video and is left alone.
    pub fn toggle_break_point(&mut self, frame: Frame) -> Result<Toggled> {
        let frame_count = self.frame_count();
        if frame >= frame_count {
            return Err(AnnotationError::OutOfRange {
                frame,
                start: 0,
                end: frame_count,
            });
        }
        if frame == 0 {
            log::debug!("Ignoring break point at the first frame");
            return Ok(Toggled::Unchanged);
        }

        let mut next = self.record.clone();
        let toggled = if next.break_points.contains(&frame) {
            merge_at(&mut next, frame, frame_count);
            Toggled::Removed
        } else {
            split_at(&mut next, frame, frame_count);
            Toggled::Inserted
        };
        self.commit(next)?;

        match toggled {
            Toggled::Removed => log::debug!("Removed break point at frame {}", frame),
            _ => log::debug!("Added break point at frame {}", frame),
        }
        Ok(toggled)
    }

    /// Delete a clip by removing its boundary break points, merging it with
    /// its neighbours. Returns `false` if the clip does not exist.
    pub fn delete_clip(&mut self, clip: ClipId) -> Result<bool> {
        Ok(self.delete_clips(&[clip])? == 1)
    }

    /// Delete several clips at once. Clips that do not exist are skipped.
    /// Returns how many clips were deleted.
    pub fn delete_clips(&mut self, clips: &[ClipId]) -> Result<usize> {
        let frame_count = self.frame_count();
        let existing: BTreeSet<ClipId> = clips.iter().copied().filter(|c| self.has_clip(*c)).collect();

        let points: BTreeSet<Frame> = existing
            .iter()
            .flat_map(|c| [c.start, c.end])
            .filter(|&p| p > 0 && p < frame_count)
            .collect();

        if points.is_empty() {
            return Ok(0);
        }

        let mut next = self.record.clone();
        for &point in &points {
            merge_at(&mut next, point, frame_count);
        }
        self.commit(next)?;

        log::info!(
            "Deleted {} clip(s), removed break points {:?}",
            existing.len(),
            points
        );
        Ok(existing.len())
    }

    /// Label clips, all or none.
    ///
    /// Reasons must come from the taxonomy of `label`; duplicates are
    /// dropped and the given order is kept.
    pub fn set_label(&mut self, clips: &[ClipId], label: Label, reasons: &[String]) -> Result<()> {
        let mut unique: Vec<String> = Vec::with_capacity(reasons.len());
        for reason in reasons {
            if !unique.contains(reason) {
                unique.push(reason.clone());
            }
        }

        self.catalog
            .for_label(label)
            .validate(&unique)
            .map_err(|reason| AnnotationError::InvalidReason {
                reason: reason.to_string(),
                label,
            })?;
        self.ensure_clips(clips)?;
        if clips.is_empty() {
            return Ok(());
        }

        let mut next = self.record.clone();
        for clip in clips {
            let annotation = next.clips.entry(*clip).or_default();
            annotation.label = Some(label);
            annotation.reasons = unique.clone();
        }
        self.commit(next)?;

        log::info!(
            "Set label of {} clip(s) to {} with reasons: {:?}",
            clips.len(),
            label,
            unique
        );
        Ok(())
    }

    /// Reset label and reasons of clips, all or none. Keyframes stay.
    pub fn clear_label(&mut self, clips: &[ClipId]) -> Result<()> {
        self.ensure_clips(clips)?;
        if clips.is_empty() {
            return Ok(());
        }

        let mut next = self.record.clone();
        for clip in clips {
            if let Some(annotation) = next.clips.get_mut(clip) {
                annotation.clear_label();
            }
        }
        self.commit(next)?;

        log::info!("Cleared label of {} clip(s)", clips.len());
        Ok(())
    }

    /// Add a keyframe to a clip, or remove it if present.
    pub fn toggle_keyframe(&mut self, clip: ClipId, frame: Frame) -> Result<Toggled> {
        self.ensure_clips(&[clip])?;
        if !clip.contains(frame) {
            return Err(AnnotationError::OutOfRange {
                frame,
                start: clip.start,
                end: clip.end,
            });
        }

        let mut next = self.record.clone();
        let keyframes = &mut next.clips.entry(clip).or_default().keyframes;
        let toggled = if keyframes.remove(&frame) {
            Toggled::Removed
        } else {
            keyframes.insert(frame);
            Toggled::Inserted
        };
        self.commit(next)?;

        log::debug!("{:?} keyframe at frame {} in clip {}", toggled, frame, clip);
        Ok(toggled)
    }

    /// Remove every keyframe of a clip. Returns how many were removed.
    pub fn clear_keyframes(&mut self, clip: ClipId) -> Result<usize> {
        self.ensure_clips(&[clip])?;
        let count = self
            .record
            .clips
            .get(&clip)
            .map(|a| a.keyframes.len())
            .unwrap_or(0);
        if count == 0 {
            return Ok(0);
        }

        let mut next = self.record.clone();
        if let Some(annotation) = next.clips.get_mut(&clip) {
            annotation.keyframes.clear();
        }
        self.commit(next)?;

        log::debug!("Cleared {} keyframe(s) of clip {}", count, clip);
        Ok(count)
    }

    /// Replace a clip's keyframes with ones picked from per-frame motion.
    ///
    /// The clip start is always picked. Motion into each following frame is
    /// accumulated and a frame is picked once the sum exceeds `threshold`,
    /// which resets the sum. `motion[i]` is the motion from frame `i` to
    /// `i + 1`. Returns the number of keyframes picked.
    pub fn suggest_keyframes(&mut self, clip: ClipId, motion: &[f64], threshold: f64) -> Result<usize> {
        self.ensure_clips(&[clip])?;
        let needed = usize::try_from(clip.end.saturating_sub(1)).unwrap_or(usize::MAX);
        if clip.len() > 1 && motion.len() < needed {
            return Err(AnnotationError::InvalidMotionData {
                needed,
                got: motion.len(),
            });
        }

        let mut picked = BTreeSet::from([clip.start]);
        let mut accumulated = 0.0;
        for frame in clip.start + 1..clip.end {
            accumulated += motion[(frame - 1) as usize];
            if accumulated > threshold {
                picked.insert(frame);
                accumulated = 0.0;
            }
        }
        let count = picked.len();

        let mut next = self.record.clone();
        next.clips.entry(clip).or_default().keyframes = picked;
        self.commit(next)?;

        log::debug!("Generated keyframes for clip {}: count:{}", clip, count);
        Ok(count)
    }

    /// Nearest break point or keyframe strictly before or after `from`.
    pub fn navigate(&self, target: Target, direction: Direction, from: Frame) -> Option<Frame> {
        let keyframes: BTreeSet<Frame>;
        let points = match target {
            Target::BreakPoint => &self.record.break_points,
            Target::Keyframe => {
                keyframes = self
                    .record
                    .clips
                    .values()
                    .flat_map(|a| a.keyframes.iter().copied())
                    .collect();
                &keyframes
            }
        };

        match direction {
            Direction::Previous => points.range(..from).next_back().copied(),
            Direction::Next => points
                .range((Bound::Excluded(from), Bound::Unbounded))
                .next()
                .copied(),
        }
    }

    /// Reasons stored on labelled clips that the current taxonomy does not
    /// offer. They are kept as they are; this only reports them.
    pub fn orphaned_reasons(&self) -> Vec<(ClipId, String)> {
        self.record
            .clips
            .iter()
            .filter_map(|(clip, annotation)| annotation.label.map(|label| (clip, annotation, label)))
            .flat_map(|(clip, annotation, label)| {
                let taxonomy = self.catalog.for_label(label);
                annotation
                    .reasons
                    .iter()
                    .filter(|r| !taxonomy.contains(r))
                    .map(|r| (*clip, r.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Write the current state to the annotation file.
    pub fn persist(&mut self) -> Result<()> {
        self.commit(self.record.clone())
    }

    fn ensure_clips(&self, clips: &[ClipId]) -> Result<()> {
        match clips.iter().find(|c| !self.has_clip(**c)) {
            Some(missing) => Err(AnnotationError::UnknownClip(*missing)),
            None => Ok(()),
        }
    }

    /// Write `next` to disk and make it current. On failure nothing changes.
    fn commit(&mut self, mut next: VideoRecord) -> Result<()> {
        next.prune();
        let mut file = self.file.clone();
        if let Some(stale) = &self.adopted_from {
            file.records.shift_remove(stale);
        }
        file.records.insert(self.identity.checksum.clone(), next.clone());
        file.meta = Some(self.meta.clone());

        if let Err(e) = serialization::write(&self.path, &file) {
            log::error!("Error saving annotations to {}: {}", self.path.display(), e);
            return Err(e);
        }

        if let Some(stale) = self.adopted_from.take() {
            log::info!("Moved annotations from {} to {}", stale, self.identity.checksum);
        }
        self.file = file;
        self.record = next;
        Ok(())
    }
}

fn check_integrity(identity: &VideoIdentity, recorded: &str, options: LoadOptions) -> Result<()> {
    log::warn!(
        "Video file has changed! Old SHA-256: {}, New SHA-256: {}",
        recorded,
        identity.checksum
    );
    if options.validate_checksum {
        return Err(AnnotationError::Integrity {
            path: identity.path.clone(),
            recorded: recorded.to_string(),
            current: identity.checksum.clone(),
        });
    }
    log::warn!("Checksum validation disabled, keeping old annotations");
    Ok(())
}

/// Insert a break point, splitting the clip around it into two empty clips.
fn split_at(record: &mut VideoRecord, frame: Frame, frame_count: Frame) {
    if let Some(clip) = derive_clips(&record.break_points, frame_count)
        .into_iter()
        .find(|c| c.contains(frame))
    {
        record.clips.remove(&clip);
    }
    record.break_points.insert(frame);
}

/// Remove a break point, merging the clips on either side of it.
fn merge_at(record: &mut VideoRecord, frame: Frame, frame_count: Frame) {
    let start = record.break_points.range(..frame).next_back().copied().unwrap_or(0);
    let end = record
        .break_points
        .range((Bound::Excluded(frame), Bound::Unbounded))
        .next()
        .copied()
        .unwrap_or(frame_count);

    let left = record.clips.remove(&ClipId::new(start, frame)).unwrap_or_default();
    let right = record.clips.remove(&ClipId::new(frame, end)).unwrap_or_default();
    record.break_points.remove(&frame);

    let merged = merge_annotations(left, right);
    if !merged.is_empty() {
        record.clips.insert(ClipId::new(start, end), merged);
    }
}

/// A single labelled side wins; two labelled or two unlabelled sides give an
/// unlabelled clip. Keyframes are always kept.
fn merge_annotations(left: ClipAnnotation, right: ClipAnnotation) -> ClipAnnotation {
    let mut keyframes = left.keyframes;
    keyframes.extend(right.keyframes);

    let (label, reasons) = match (left.label, right.label) {
        (Some(label), None) => (Some(label), left.reasons),
        (None, Some(label)) => (Some(label), right.reasons),
        _ => (None, Vec::new()),
    };

    ClipAnnotation {
        label,
        reasons,
        keyframes,
    }
}
