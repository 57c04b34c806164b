//! Parser for `ffprobe -print_format json -show_format -show_streams` output.

use serde::Deserialize;

use super::types::{MediaReport, ProbeSource, Resolution};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
}

/// Parse ffprobe JSON into a [`MediaReport`].
///
/// # Errors
///
/// Returns [`Error::ParseError`] when the text is not the expected JSON.
pub fn parse_json(json: &str) -> Result<MediaReport> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error("ffprobe", format!("invalid JSON: {e}")))?;

    let mut report = MediaReport {
        source: ProbeSource::Json,
        ..Default::default()
    };

    if let Some(format) = output.format {
        report.format = format.format_name;
        report.bit_rate = format.bit_rate.as_deref().and_then(parse_number);
        report.duration = format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok());
    }

    let of_type = |kind: &'static str| {
        output
            .streams
            .iter()
            .filter(move |s| s.codec_type.as_deref() == Some(kind))
    };

    if let Some(video) = of_type("video").next() {
        report.video_codec = video.codec_name.as_deref().map(str::to_uppercase);
        if let (Some(width), Some(height)) = (video.width, video.height) {
            if width > 0 && height > 0 {
                report.resolution = Some(Resolution { width, height });
            }
        }
        report.frame_rate = video
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate));
    }

    if let Some(audio) = of_type("audio").next() {
        report.audio_codec = audio.codec_name.as_deref().map(str::to_uppercase);
        report.audio_sample_rate = audio
            .sample_rate
            .as_deref()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|hz| *hz > 0);
        report.audio_channels = audio.channels.filter(|c| *c > 0);
        report.audio_bit_rate = audio.bit_rate.as_deref().and_then(parse_number);
    }

    report.has_subtitles = of_type("subtitle").next().is_some();

    Ok(report)
}

/// Parse a fraction like `"24000/1001"`. Zero denominators yield `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: i64 = num.trim().parse().ok()?;
    let den: i64 = den.trim().parse().ok()?;
    if den == 0 {
        return None;
    }
    Some(num as f64 / den as f64)
}

fn parse_number(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "avg_frame_rate": "0/0", "r_frame_rate": "30000/1001"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000",
             "channels": 2, "bit_rate": "192000"},
            {"index": 2, "codec_type": "audio", "codec_name": "ac3", "channels": 6},
            {"index": 3, "codec_type": "subtitle", "codec_name": "subrip"}
        ],
        "format": {"format_name": "matroska,webm", "duration": "3725.480000", "bit_rate": "8500000"}
    }"#;

    #[test]
    fn parses_first_streams() {
        let report = parse_json(SAMPLE).unwrap();
        assert_eq!(report.source, ProbeSource::Json);
        assert_eq!(report.format.as_deref(), Some("matroska,webm"));
        assert_eq!(report.duration_display(), "01:02:05");
        assert_eq!(report.bit_rate_display(), "8.5 Mbps");
        assert_eq!(report.resolution_display(), "1920x1080");
        assert_eq!(report.video_codec.as_deref(), Some("H264"));
        assert_eq!(report.frame_rate_display(), "29.97 fps");
        assert_eq!(report.audio_codec.as_deref(), Some("AAC"));
        assert_eq!(report.audio_sample_rate, Some(48000));
        assert_eq!(report.audio_channels, Some(2));
        assert_eq!(report.audio_bit_rate, Some(192_000));
        assert!(report.has_subtitles);
    }

    #[test]
    fn missing_sections_stay_unknown() {
        let report = parse_json(r#"{"streams": []}"#).unwrap();
        assert!(report.format.is_none());
        assert!(report.video_codec.is_none());
        assert!(!report.has_subtitles);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse_json("{not json").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn frame_rate_fractions() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("30"), None);
    }
}
