//! Subtitle Interchange
//!
//! SRT export/import, basic SMI import, and ASS override-tag generation
//! for per-segment styles that diverge from the track default.

use std::fs;
use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::model::{StylePosition, SubtitleSegment, SubtitleStyle, SubtitleTrack};
use crate::time::{ms_to_srt_time, TimeMs};

// =============================================================================
// SRT Export
// =============================================================================

/// Renders a track as SRT text
/// (`NN\nHH:MM:SS,mmm --> HH:MM:SS,mmm\ntext\n\n` blocks).
pub fn to_srt(track: &SubtitleTrack) -> String {
    let mut out = String::new();
    for (i, seg) in track.segments.iter().enumerate() {
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            ms_to_srt_time(seg.start_ms),
            ms_to_srt_time(seg.end_ms)
        ));
        out.push_str(&seg.text);
        out.push_str("\n\n");
    }
    out
}

/// Renders a track as SRT with ASS override tags prepended to segments
/// whose style diverges from `default_style`. Players that honor ASS
/// tags pick up the per-segment color/outline/position; others show the
/// tags-stripped text.
pub fn to_srt_with_styles(track: &SubtitleTrack, default_style: &SubtitleStyle) -> String {
    let mut out = String::new();
    for (i, seg) in track.segments.iter().enumerate() {
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            ms_to_srt_time(seg.start_ms),
            ms_to_srt_time(seg.end_ms)
        ));
        match &seg.style {
            Some(style) if style != default_style => {
                out.push_str(&ass_override_tags(style, default_style));
                out.push_str(&seg.text);
            }
            _ => out.push_str(&seg.text),
        }
        out.push_str("\n\n");
    }
    out
}

/// Writes a track to an SRT file.
pub fn write_srt(track: &SubtitleTrack, path: &Path) -> CoreResult<()> {
    fs::write(path, to_srt(track))?;
    Ok(())
}

/// Builds the ASS override block for the attributes of `style` that
/// differ from `default`.
fn ass_override_tags(style: &SubtitleStyle, default: &SubtitleStyle) -> String {
    let mut tags = String::new();
    if style.font_color != default.font_color {
        if let Some(bgr) = hex_to_ass_bgr(&style.font_color) {
            tags.push_str(&format!("\\c&H{}&", bgr));
        }
    }
    if style.outline_color != default.outline_color {
        if let Some(bgr) = hex_to_ass_bgr(&style.outline_color) {
            tags.push_str(&format!("\\3c&H{}&", bgr));
        }
    }
    if style.outline_width != default.outline_width {
        tags.push_str(&format!("\\bord{}", style.outline_width));
    }
    if style.font_bold != default.font_bold {
        tags.push_str(if style.font_bold { "\\b1" } else { "\\b0" });
    }
    if style.font_italic != default.font_italic {
        tags.push_str(if style.font_italic { "\\i1" } else { "\\i0" });
    }
    if style.position != default.position {
        tags.push_str(&format!("\\an{}", ass_alignment(style.position)));
    }
    if tags.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", tags)
    }
}

/// Numpad alignment code for an anchor position.
fn ass_alignment(position: StylePosition) -> u8 {
    match position {
        StylePosition::BottomCenter => 2,
        StylePosition::TopCenter => 8,
        StylePosition::BottomLeft => 1,
        StylePosition::BottomRight => 3,
        StylePosition::Custom => 5,
    }
}

/// `#RRGGBB` to the ASS `BBGGRR` hex order.
fn hex_to_ass_bgr(hex: &str) -> Option<String> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2]).to_uppercase())
}

// =============================================================================
// SRT Import
// =============================================================================

/// Parses SRT text into a track. Blocks without a valid time line are
/// skipped; overlapping cues are dropped with a warning rather than
/// failing the whole import.
pub fn from_srt(text: &str) -> SubtitleTrack {
    let text = text.trim_start_matches('\u{feff}');
    let mut track = SubtitleTrack::new("Imported");

    for block in text.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() < 2 {
            continue;
        }

        // The time line is usually line 1 (after the counter) but some
        // files omit counters.
        let time_line = lines
            .iter()
            .find(|l| l.contains("-->"))
            .copied();
        let Some(time_line) = time_line else { continue };
        let Some((start, end)) = parse_srt_time_line(time_line) else {
            continue;
        };

        let text_start = lines
            .iter()
            .position(|l| *l == time_line)
            .map(|i| i + 1)
            .unwrap_or(lines.len());
        let content = lines[text_start..].join("\n");
        if content.is_empty() {
            continue;
        }

        if track
            .add_segment(SubtitleSegment::new(start, end, content))
            .is_err()
        {
            tracing::warn!("skipping overlapping SRT cue at {}ms", start);
        }
    }
    track
}

/// Reads an SRT file into a track.
pub fn read_srt(path: &Path) -> CoreResult<SubtitleTrack> {
    let text = fs::read_to_string(path)?;
    Ok(from_srt(&text))
}

fn parse_srt_time_line(line: &str) -> Option<(TimeMs, TimeMs)> {
    let (start, end) = line.split_once("-->")?;
    Some((srt_time_to_ms(start.trim())?, srt_time_to_ms(end.trim())?))
}

/// Parses `HH:MM:SS,mmm` (comma or dot separator) into milliseconds.
pub fn srt_time_to_ms(text: &str) -> Option<TimeMs> {
    let normalized = text.replace(',', ".");
    let mut parts = normalized.split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    let seconds_part = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }

    let (seconds, millis) = match seconds_part.split_once('.') {
        Some((s, frac)) => {
            let seconds: i64 = s.parse().ok()?;
            let mut millis: i64 = frac.parse().ok()?;
            for _ in frac.len()..3 {
                millis *= 10;
            }
            (seconds, millis)
        }
        None => (seconds_part.parse().ok()?, 0),
    };

    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
}

// =============================================================================
// SMI Import
// =============================================================================

/// Parses SAMI subtitle text (basic `<SYNC Start=...>` blocks).
///
/// Each sync block runs until the next one; `&nbsp;` blocks end the
/// previous cue without starting a new one.
pub fn from_smi(text: &str) -> SubtitleTrack {
    let mut track = SubtitleTrack::new("Imported");
    let mut pending: Option<(TimeMs, String)> = None;

    let lower = text.to_ascii_lowercase();
    let mut search = 0;
    let mut syncs: Vec<(TimeMs, String)> = Vec::new();

    while let Some(rel) = lower[search..].find("<sync") {
        let tag_start = search + rel;
        let Some(tag_end_rel) = lower[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_end_rel;

        let tag = &lower[tag_start..tag_end];
        let start_ms = tag
            .find("start=")
            .and_then(|p| {
                let digits: String = tag[p + 6..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse::<TimeMs>().ok()
            })
            .unwrap_or(-1);

        let body_end = lower[tag_end..]
            .find("<sync")
            .map(|p| tag_end + p)
            .unwrap_or(text.len());
        let body = &text[tag_end + 1..body_end];
        if start_ms >= 0 {
            syncs.push((start_ms, strip_markup(body)));
        }
        search = body_end;
    }

    for (start_ms, content) in syncs {
        // Close the previous cue at this sync point.
        if let Some((prev_start, prev_text)) = pending.take() {
            if !prev_text.is_empty() && start_ms > prev_start {
                if track
                    .add_segment(SubtitleSegment::new(prev_start, start_ms, prev_text))
                    .is_err()
                {
                    tracing::warn!("skipping overlapping SMI cue at {}ms", prev_start);
                }
            }
        }
        if !content.is_empty() {
            pending = Some((start_ms, content));
        }
    }

    // A trailing cue with no closing sync gets a nominal 3 s duration.
    if let Some((start, text)) = pending {
        if !text.is_empty() {
            let _ = track.add_segment(SubtitleSegment::new(start, start + 3000, text));
        }
    }

    track
}

/// Reads an SMI file into a track.
pub fn read_smi(path: &Path) -> CoreResult<SubtitleTrack> {
    let text = fs::read_to_string(path)?;
    Ok(from_smi(&text))
}

/// Strips HTML-ish markup from an SMI body, mapping `<br>` to newlines
/// and `&nbsp;` to nothing.
fn strip_markup(body: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    let lower = body.to_ascii_lowercase();
    let mut skip_until = 0;

    for (i, ch) in body.char_indices() {
        if i < skip_until {
            continue;
        }
        if ch == '<' {
            if lower[i..].starts_with("<br") {
                out.push('\n');
            }
            in_tag = true;
            continue;
        }
        if ch == '>' {
            in_tag = false;
            continue;
        }
        if in_tag {
            continue;
        }
        if lower[i..].starts_with("&nbsp;") {
            skip_until = i + 6;
            continue;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(segments: &[(TimeMs, TimeMs, &str)]) -> SubtitleTrack {
        let mut track = SubtitleTrack::new("Default");
        for &(s, e, t) in segments {
            track.add_segment(SubtitleSegment::new(s, e, t)).unwrap();
        }
        track
    }

    #[test]
    fn test_srt_export_format() {
        let track = track_with(&[(0, 1500, "hello"), (2000, 3500, "multi\nline")]);
        let srt = to_srt(&track);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nhello\n\n\
             2\n00:00:02,000 --> 00:00:03,500\nmulti\nline\n\n"
        );
    }

    #[test]
    fn test_srt_round_trip() {
        let track = track_with(&[(0, 1500, "hello"), (2000, 3500, "world")]);
        let parsed = from_srt(&to_srt(&track));
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].text, "hello");
        assert_eq!(parsed.segments[1].start_ms, 2000);
        assert_eq!(parsed.segments[1].end_ms, 3500);
    }

    #[test]
    fn test_srt_import_tolerates_dot_separator_and_no_counter() {
        let srt = "00:00:00.250 --> 00:00:01.750\nhi there\n\n";
        let track = from_srt(srt);
        assert_eq!(track.segments.len(), 1);
        assert_eq!(track.segments[0].start_ms, 250);
        assert_eq!(track.segments[0].end_ms, 1750);
    }

    #[test]
    fn test_srt_import_skips_garbage_blocks() {
        let srt = "1\nnot a time line\ntext\n\n2\n00:00:05,000 --> 00:00:06,000\nok\n\n";
        let track = from_srt(srt);
        assert_eq!(track.segments.len(), 1);
        assert_eq!(track.segments[0].text, "ok");
    }

    #[test]
    fn test_srt_time_parse() {
        assert_eq!(srt_time_to_ms("00:00:01,500"), Some(1500));
        assert_eq!(srt_time_to_ms("01:03:45,500"), Some(3_825_500));
        assert_eq!(srt_time_to_ms("00:01:02.05"), Some(62_050));
        assert_eq!(srt_time_to_ms("junk"), None);
    }

    #[test]
    fn test_ass_tags_only_for_divergent_attributes() {
        let default = SubtitleStyle::default();
        let mut styled = SubtitleStyle::default();
        styled.font_color = "#FF0000".to_string();
        styled.position = StylePosition::TopCenter;

        let tags = ass_override_tags(&styled, &default);
        assert_eq!(tags, "{\\c&H0000FF&\\an8}");

        // Identical style emits nothing
        assert_eq!(ass_override_tags(&default, &default), "");
    }

    #[test]
    fn test_srt_with_styles_embeds_tags() {
        let default = SubtitleStyle::default();
        let mut track = track_with(&[(0, 1000, "plain")]);
        let mut seg = SubtitleSegment::new(2000, 3000, "red");
        let mut style = SubtitleStyle::default();
        style.font_color = "#FF0000".to_string();
        seg.style = Some(style);
        track.add_segment(seg).unwrap();

        let srt = to_srt_with_styles(&track, &default);
        assert!(srt.contains("plain\n"));
        assert!(srt.contains("{\\c&H0000FF&}red"));
    }

    #[test]
    fn test_hex_to_ass_bgr() {
        assert_eq!(hex_to_ass_bgr("#FF8000").as_deref(), Some("0080FF"));
        assert_eq!(hex_to_ass_bgr("FF8000"), None);
        assert_eq!(hex_to_ass_bgr("#XYZ123"), None);
    }

    #[test]
    fn test_smi_import_basic() {
        let smi = r#"<SAMI><BODY>
<SYNC Start=0><P Class=KRCC>first line<br>second
<SYNC Start=2000><P>&nbsp;
<SYNC Start=3000><P>next cue
<SYNC Start=5000><P>&nbsp;
</BODY></SAMI>"#;

        let track = from_smi(smi);
        assert_eq!(track.segments.len(), 2);
        assert_eq!(track.segments[0].start_ms, 0);
        assert_eq!(track.segments[0].end_ms, 2000);
        assert_eq!(track.segments[0].text, "first line\nsecond");
        assert_eq!(track.segments[1].start_ms, 3000);
        assert_eq!(track.segments[1].end_ms, 5000);
        assert_eq!(track.segments[1].text, "next cue");
    }

    #[test]
    fn test_smi_trailing_cue_gets_nominal_duration() {
        let smi = "<SYNC Start=1000><P>never closed";
        let track = from_smi(smi);
        assert_eq!(track.segments.len(), 1);
        assert_eq!(track.segments[0].end_ms, 4000);
    }

    #[test]
    fn test_write_and_read_srt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("subs.srt");
        let track = track_with(&[(0, 900, "file test")]);

        write_srt(&track, &path).unwrap();
        let parsed = read_srt(&path).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].text, "file test");
    }
}
