//! Parser for the plain-text fallback probe.
//!
//! The fallback asks ffprobe for
//! `format=duration,size,bit_rate:stream=codec_type,codec_name,width,height`
//! with `-of default=noprint_wrappers=1:nokey=1`, which prints bare values one
//! per line. Values are read positionally: duration, size, bit rate, then a
//! run of stream records where `video` is followed by codec, width and height
//! and `audio` is followed by codec.

use super::types::{MediaReport, ProbeSource, Resolution};

/// Minimum number of non-empty lines before any field is trusted.
const MIN_LINES: usize = 5;

/// Parse fallback output. Never fails; undeterminable fields stay `None`.
pub fn parse_plain(output: &str) -> MediaReport {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut report = MediaReport {
        source: ProbeSource::Fallback,
        ..Default::default()
    };

    if lines.len() < MIN_LINES {
        return report;
    }

    report.duration = known(lines[0]).and_then(|d| d.parse::<f64>().ok());
    report.bit_rate = known(lines[2]).and_then(|b| b.parse::<u64>().ok());

    for (i, line) in lines.iter().enumerate().skip(3) {
        match *line {
            "video" if report.video_codec.is_none() => {
                report.video_codec = lines.get(i + 1).copied().and_then(known).map(String::from);
                let dim = |offset: usize| {
                    lines
                        .get(i + offset)
                        .copied()
                        .and_then(known)
                        .and_then(|v| v.parse::<u32>().ok())
                };
                if let (Some(width), Some(height)) = (dim(2), dim(3)) {
                    report.resolution = Some(Resolution { width, height });
                }
            }
            "audio" if report.audio_codec.is_none() => {
                report.audio_codec = lines.get(i + 1).copied().and_then(known).map(String::from);
            }
            "subtitle" => report.has_subtitles = true,
            _ => {}
        }
    }

    report
}

fn known(value: &str) -> Option<&str> {
    (value != "N/A").then_some(value)
}
