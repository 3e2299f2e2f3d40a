// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Clip data structures.
//!
//! A clip is identified by its boundary frames only. Everything a reviewer
//! attaches to a clip (label, reasons, keyframes) lives in a
//! [`ClipAnnotation`] keyed by that boundary pair.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Zero-based frame index.
pub type Frame = u64;

/// Half-open frame interval `[start, end)` between two adjacent boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId {
    pub start: Frame,
    pub end: Frame,
}

impl ClipId {
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    /// Check if the clip contains the given frame.
    pub fn contains(&self, frame: Frame) -> bool {
        self.start <= frame && frame < self.end
    }

    /// Number of frames in the clip.
    pub fn len(&self) -> Frame {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

impl FromStr for ClipId {
    type Err = String;

    /// Parse `START:END`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(':')
            .ok_or_else(|| format!("expected START:END, got {s:?}"))?;
        let start = start
            .trim()
            .parse()
            .map_err(|e| format!("bad start frame {start:?}: {e}"))?;
        let end = end
            .trim()
            .parse()
            .map_err(|e| format!("bad end frame {end:?}: {e}"))?;
        if start >= end {
            return Err(format!("clip start {start} must be before end {end}"));
        }
        Ok(Self { start, end })
    }
}

/// Review verdict for a clip. An unlabelled clip has no `Label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Accept,
    Reject,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Accept => f.write_str("Accept"),
            Label::Reject => f.write_str("Reject"),
        }
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accept" | "a" => Ok(Label::Accept),
            "reject" | "r" => Ok(Label::Reject),
            _ => Err(format!("unknown label {s:?} (expected accept or reject)")),
        }
    }
}

/// Reviewer data attached to one clip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipAnnotation {
    pub label: Option<Label>,
    pub reasons: Vec<String>,
    pub keyframes: BTreeSet<Frame>,
}

impl ClipAnnotation {
    /// True when there is nothing worth persisting for the clip.
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.reasons.is_empty() && self.keyframes.is_empty()
    }

    /// Reset label and reasons, keeping keyframes.
    pub fn clear_label(&mut self) {
        self.label = None;
        self.reasons.clear();
    }
}

/// A derived clip together with its annotation, as shown in clip listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub id: ClipId,
    pub annotation: ClipAnnotation,
}

impl Clip {
    pub fn label(&self) -> Option<Label> {
        self.annotation.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_contains_is_half_open() {
        let clip = ClipId::new(10, 20);
        assert!(!clip.contains(9));
        assert!(clip.contains(10));
        assert!(clip.contains(19));
        assert!(!clip.contains(20));
        assert_eq!(clip.len(), 10);
    }

    #[test]
    fn test_clip_id_parse() {
        assert_eq!("0:40".parse::<ClipId>().unwrap(), ClipId::new(0, 40));
        assert_eq!(" 40 : 100 ".parse::<ClipId>().unwrap(), ClipId::new(40, 100));
        assert!("40".parse::<ClipId>().is_err());
        assert!("40:40".parse::<ClipId>().is_err());
        assert!("a:b".parse::<ClipId>().is_err());
        assert_eq!(ClipId::new(0, 40).to_string(), "[0,40)");
    }

    #[test]
    fn test_label_parse_and_serde() {
        assert_eq!("Accept".parse::<Label>().unwrap(), Label::Accept);
        assert_eq!("r".parse::<Label>().unwrap(), Label::Reject);
        assert!("maybe".parse::<Label>().is_err());
        assert_eq!(serde_json::to_string(&Label::Reject).unwrap(), "\"Reject\"");
    }

    #[test]
    fn test_clear_label_keeps_keyframes() {
        let mut annotation = ClipAnnotation {
            label: Some(Label::Accept),
            reasons: vec!["1".to_string()],
            keyframes: [3, 5].into_iter().collect(),
        };
        annotation.clear_label();
        assert_eq!(annotation.label, None);
        assert!(annotation.reasons.is_empty());
        assert_eq!(annotation.keyframes.len(), 2);
        assert!(!annotation.is_empty());
    }
}
