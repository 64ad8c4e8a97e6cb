//! Time & Frame Arithmetic
//!
//! Integer-millisecond conversions shared by the timeline, the subtitle
//! model, and the exporter. All public functions take and return `i64`
//! milliseconds; frame math rounds through integer arithmetic so that
//! repeated conversions stay within one frame of the input.

use crate::error::{CoreError, CoreResult};

/// Time in integer milliseconds
pub type TimeMs = i64;

/// Formats accepted by [`parse_flexible_timecode`], used in error messages.
const TIMECODE_FORMATS: &str = "MM:SS.mmm, HH:MM:SS.mmm, HH:MM:SS:FF, or F:<n>";

// =============================================================================
// Display Formatting
// =============================================================================

/// Converts milliseconds to a display string `MM:SS.mmm`.
///
/// Negative input clamps to zero. Minutes grow past two digits as needed.
pub fn ms_to_display(ms: TimeMs) -> String {
    let ms = ms.max(0);
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}

/// Converts milliseconds to SRT time format `HH:MM:SS,mmm`.
pub fn ms_to_srt_time(ms: TimeMs) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let remainder = ms % 3_600_000;
    let minutes = remainder / 60_000;
    let remainder = remainder % 60_000;
    let seconds = remainder / 1000;
    let millis = remainder % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

// =============================================================================
// Frame Conversions
// =============================================================================

/// Converts milliseconds to a frame number using round-to-nearest.
pub fn ms_to_frame(ms: TimeMs, fps: u32) -> i64 {
    if fps == 0 {
        return 0;
    }
    let fps = fps as i64;
    // round(ms * fps / 1000) in integer math
    (ms * fps + 500) / 1000
}

/// Converts a frame number to milliseconds using round-to-nearest.
pub fn frame_to_ms(frame: i64, fps: u32) -> TimeMs {
    if fps == 0 {
        return 0;
    }
    let fps = fps as i64;
    (frame * 1000 + fps / 2) / fps
}

/// Snaps a millisecond position to the nearest frame boundary.
///
/// Identity when `fps == 0` (frame rate unknown).
pub fn snap_to_frame(ms: TimeMs, fps: u32) -> TimeMs {
    if fps == 0 {
        return ms;
    }
    frame_to_ms(ms_to_frame(ms, fps), fps)
}

// =============================================================================
// Flexible Timecode Parsing
// =============================================================================

/// Parses a user-entered timecode into milliseconds.
///
/// Accepted forms:
/// - `MM:SS.mmm` (milliseconds optional)
/// - `HH:MM:SS.mmm` (milliseconds optional)
/// - `HH:MM:SS:FF` (frames, converted via `fps`)
/// - `F:<n>` or `frame:<n>` (direct frame number)
///
/// Fails with [`CoreError::InvalidTimecode`] on malformed input, carrying
/// the offending token and the expected formats.
pub fn parse_flexible_timecode(text: &str, fps: u32) -> CoreResult<TimeMs> {
    let text = text.trim();
    if text.is_empty() {
        return Err(invalid(text));
    }

    // Direct frame number: "F:90" or "frame:90"
    let lower = text.to_ascii_lowercase();
    for prefix in ["frame:", "f:"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let frame: i64 = rest.trim().parse().map_err(|_| invalid(text))?;
            if frame < 0 || fps == 0 {
                return Err(invalid(text));
            }
            return Ok(frame_to_ms(frame, fps));
        }
    }

    let parts: Vec<&str> = text.split(':').collect();
    match parts.len() {
        // MM:SS.mmm
        2 => {
            let minutes = parse_component(parts[0], text)?;
            let (seconds, millis) = parse_seconds(parts[1], text)?;
            if seconds >= 60 {
                return Err(invalid(text));
            }
            Ok(minutes * 60_000 + seconds * 1000 + millis)
        }
        // HH:MM:SS.mmm
        3 => {
            let hours = parse_component(parts[0], text)?;
            let minutes = parse_component(parts[1], text)?;
            let (seconds, millis) = parse_seconds(parts[2], text)?;
            if minutes >= 60 || seconds >= 60 {
                return Err(invalid(text));
            }
            Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
        }
        // HH:MM:SS:FF
        4 => {
            if fps == 0 {
                return Err(invalid(text));
            }
            let hours = parse_component(parts[0], text)?;
            let minutes = parse_component(parts[1], text)?;
            let seconds = parse_component(parts[2], text)?;
            let frames = parse_component(parts[3], text)?;
            if minutes >= 60 || seconds >= 60 || frames >= fps as i64 {
                return Err(invalid(text));
            }
            Ok(hours * 3_600_000
                + minutes * 60_000
                + seconds * 1000
                + frame_to_ms(frames, fps))
        }
        _ => Err(invalid(text)),
    }
}

fn invalid(input: &str) -> CoreError {
    CoreError::InvalidTimecode {
        input: input.to_string(),
        expected: TIMECODE_FORMATS.to_string(),
    }
}

fn parse_component(part: &str, full: &str) -> CoreResult<i64> {
    let value: i64 = part.trim().parse().map_err(|_| invalid(full))?;
    if value < 0 {
        return Err(invalid(full));
    }
    Ok(value)
}

/// Parses `SS` or `SS.mmm` (1-3 fractional digits, right-padded to ms).
fn parse_seconds(part: &str, full: &str) -> CoreResult<(i64, i64)> {
    let part = part.trim();
    match part.split_once('.') {
        None => Ok((parse_component(part, full)?, 0)),
        Some((secs, frac)) => {
            if frac.is_empty() || frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(full));
            }
            let seconds = parse_component(secs, full)?;
            let mut millis: i64 = frac.parse().map_err(|_| invalid(full))?;
            for _ in frac.len()..3 {
                millis *= 10;
            }
            Ok((seconds, millis))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_display() {
        assert_eq!(ms_to_display(0), "00:00.000");
        assert_eq!(ms_to_display(1500), "00:01.500");
        assert_eq!(ms_to_display(61_001), "01:01.001");
        assert_eq!(ms_to_display(3_600_000), "60:00.000");
        assert_eq!(ms_to_display(-5), "00:00.000");
    }

    #[test]
    fn test_ms_to_srt_time() {
        assert_eq!(ms_to_srt_time(0), "00:00:00,000");
        assert_eq!(ms_to_srt_time(3_825_500), "01:03:45,500");
        assert_eq!(ms_to_srt_time(59_999), "00:00:59,999");
    }

    #[test]
    fn test_frame_conversions() {
        assert_eq!(ms_to_frame(1000, 30), 30);
        assert_eq!(ms_to_frame(1017, 30), 31); // 30.51 rounds up
        assert_eq!(frame_to_ms(30, 30), 1000);
        assert_eq!(frame_to_ms(1, 30), 33);
        assert_eq!(frame_to_ms(90, 30), 3000);
    }

    #[test]
    fn test_frame_round_trip_within_one_frame() {
        for fps in [24u32, 25, 30, 60, 120] {
            let frame_ms = 1000 / fps as i64 + 1;
            for x in [0i64, 1, 999, 1000, 1001, 33_333, 3_600_000, 86_399_999] {
                let round = frame_to_ms(ms_to_frame(x, fps), fps);
                assert!(
                    (round - x).abs() <= frame_ms,
                    "fps={} x={} round={}",
                    fps,
                    x,
                    round
                );
            }
        }
    }

    #[test]
    fn test_snap_to_frame() {
        assert_eq!(snap_to_frame(1017, 30), 1033);
        assert_eq!(snap_to_frame(1000, 30), 1000);
        // fps == 0 is identity
        assert_eq!(snap_to_frame(1017, 0), 1017);
    }

    #[test]
    fn test_parse_minutes_seconds() {
        assert_eq!(parse_flexible_timecode("01:30.500", 30).unwrap(), 90_500);
        assert_eq!(parse_flexible_timecode("00:05", 30).unwrap(), 5000);
        assert_eq!(parse_flexible_timecode("12:00.5", 30).unwrap(), 720_500);
    }

    #[test]
    fn test_parse_hours_minutes_seconds() {
        assert_eq!(
            parse_flexible_timecode("01:03:45.500", 30).unwrap(),
            3_825_500
        );
        assert_eq!(parse_flexible_timecode("00:00:01", 30).unwrap(), 1000);
    }

    #[test]
    fn test_parse_with_frames() {
        // 1h 3m 45s + 15 frames at 30fps = 3_825_000 + 500
        assert_eq!(
            parse_flexible_timecode("01:03:45:15", 30).unwrap(),
            3_825_500
        );
    }

    #[test]
    fn test_parse_direct_frame() {
        assert_eq!(parse_flexible_timecode("F:90", 30).unwrap(), 3000);
        assert_eq!(parse_flexible_timecode("frame:90", 30).unwrap(), 3000);
        assert_eq!(parse_flexible_timecode("f:0", 30).unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["bad", "", "1:2:3:4:5", "01:61.000", "00:00:61", "F:-1", "F:abc"] {
            let err = parse_flexible_timecode(bad, 30).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidTimecode { .. }),
                "input {:?} should fail",
                bad
            );
        }
    }

    #[test]
    fn test_parse_frames_requires_fps() {
        assert!(parse_flexible_timecode("00:00:01:10", 0).is_err());
        assert!(parse_flexible_timecode("F:10", 0).is_err());
    }

    #[test]
    fn test_invalid_timecode_carries_token() {
        let err = parse_flexible_timecode("nonsense", 30).unwrap_err();
        match err {
            CoreError::InvalidTimecode { input, expected } => {
                assert_eq!(input, "nonsense");
                assert!(expected.contains("HH:MM:SS:FF"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
