// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Frame/time conversions.
//!
//! Utilities for converting between frame indices and wall-clock time, used
//! when presenting clips to a reviewer.

use crate::models::clip::Frame;

/// Time in seconds at which a frame starts.
pub fn frame_to_seconds(frame: Frame, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    frame as f64 / fps
}

/// Format a frame as `HH:MM:SS.mmm`.
pub fn format_timecode(frame: Frame, fps: f64) -> String {
    let total_ms = (frame_to_seconds(frame, fps) * 1000.0).round() as u64;
    let (hours, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1000, rest % 1000);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_to_seconds() {
        assert_eq!(frame_to_seconds(50, 25.0), 2.0);
        assert_eq!(frame_to_seconds(10, 0.0), 0.0);
        let ntsc = frame_to_seconds(30_000, 30000.0 / 1001.0);
        assert!((ntsc - 1001.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_timecode() {
        assert_eq!(format_timecode(0, 25.0), "00:00:00.000");
        assert_eq!(format_timecode(25, 25.0), "00:00:01.000");
        assert_eq!(format_timecode(90_010, 25.0), "01:00:00.400");
        assert_eq!(format_timecode(10, 0.0), "00:00:00.000");
    }
}
