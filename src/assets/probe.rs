use std::path::Path;
use std::process::Command;

use crate::assets::media::{MediaAsset, MediaInfo};
use crate::config::Toolchain;
use crate::foundation::error::{MixerError, MixerResult};

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeOutput {
    #[serde(default)]
    pub(crate) streams: Vec<ProbeStream>,
    #[serde(default)]
    pub(crate) format: ProbeFormat,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeStream {
    pub(crate) codec_type: Option<String>,
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
    pub(crate) avg_frame_rate: Option<String>,
    pub(crate) r_frame_rate: Option<String>,
    pub(crate) duration: Option<String>,
    pub(crate) sample_rate: Option<String>,
    pub(crate) channels: Option<u16>,
    #[serde(default)]
    pub(crate) disposition: ProbeDisposition,
    #[serde(default)]
    pub(crate) tags: ProbeTags,
    #[serde(default)]
    pub(crate) side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeTags {
    /// Legacy rotation tag written by older muxers, e.g. `"90"`.
    pub(crate) rotate: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeSideData {
    /// Display-matrix rotation in degrees, counter-clockwise (phone portrait clips are `-90`).
    pub(crate) rotation: Option<f64>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeDisposition {
    #[serde(default)]
    pub(crate) attached_pic: u8,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeFormat {
    pub(crate) format_name: Option<String>,
    pub(crate) duration: Option<String>,
}

impl ProbeStream {
    fn is(&self, codec_type: &str) -> bool {
        self.codec_type.as_deref() == Some(codec_type)
    }

    fn is_attached_picture(&self) -> bool {
        self.disposition.attached_pic != 0
    }

    /// Display rotation normalized to 0, 90, 180 or 270 degrees. The display matrix wins over
    /// the legacy tag; anything that is not a quarter turn counts as unrotated.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(parse_seconds))
            .unwrap_or(0.0);
        match (degrees.round() as i64).rem_euclid(360) {
            r @ (90 | 180 | 270) => r as u32,
            _ => 0,
        }
    }
}

/// Inspect `path` with `ffprobe` and resolve it to audio, video or image.
///
/// The kind comes from the container and streams, never from the file extension.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn probe(path: &Path, tools: &Toolchain) -> MixerResult<MediaAsset> {
    if !path.is_file() {
        return Err(MixerError::unreadable(path, "file does not exist"));
    }

    let out = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| MixerError::unreadable(path, format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(MixerError::unreadable(
            path,
            format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        ));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&out.stdout)
        .map_err(|e| MixerError::unreadable(path, format!("ffprobe json parse failed: {e}")))?;
    let info = classify(path, &parsed)?;
    tracing::debug!(?info, "probed");
    Ok(MediaAsset::new(path, info))
}

/// Resolve parsed `ffprobe` output into [`MediaInfo`].
pub(crate) fn classify(path: &Path, out: &ProbeOutput) -> MixerResult<MediaInfo> {
    let format_name = out.format.format_name.as_deref().unwrap_or("");
    let video = out
        .streams
        .iter()
        .find(|s| s.is("video") && !s.is_attached_picture());

    if is_image_format(format_name) {
        let stream = video.ok_or_else(|| MixerError::unreadable(path, "image has no picture"))?;
        let (width, height) = dimensions(path, stream)?;
        return Ok(MediaInfo::Image { width, height });
    }

    if let Some(stream) = video {
        let (width, height) = dimensions(path, stream)?;
        let frame_rate = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rational)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational))
            .ok_or_else(|| MixerError::unreadable(path, "video has no usable frame rate"))?;
        let duration = positive_duration(path, stream.duration.as_deref(), &out.format)?;
        return Ok(MediaInfo::Video {
            duration,
            width,
            height,
            frame_rate,
            rotation: stream.rotation(),
        });
    }

    if let Some(stream) = out.streams.iter().find(|s| s.is("audio")) {
        let sample_rate = stream
            .sample_rate
            .as_deref()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|&sr| sr > 0)
            .ok_or_else(|| MixerError::unreadable(path, "audio has no sample rate"))?;
        let duration = positive_duration(path, stream.duration.as_deref(), &out.format)?;
        return Ok(MediaInfo::Audio {
            duration,
            sample_rate,
            channels: stream.channels.unwrap_or(2),
        });
    }

    Err(MixerError::unreadable(
        path,
        "no decodable audio or video stream",
    ))
}

fn is_image_format(format_name: &str) -> bool {
    format_name
        .split(',')
        .any(|name| name == "image2" || name.ends_with("_pipe"))
}

fn dimensions(path: &Path, stream: &ProbeStream) -> MixerResult<(u32, u32)> {
    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(MixerError::unreadable(path, "missing picture dimensions")),
    }
}

fn positive_duration(
    path: &Path,
    stream_duration: Option<&str>,
    format: &ProbeFormat,
) -> MixerResult<f64> {
    let duration = stream_duration
        .and_then(parse_seconds)
        .or_else(|| format.duration.as_deref().and_then(parse_seconds))
        .ok_or_else(|| MixerError::unreadable(path, "duration is unknown"))?;
    if duration <= 0.0 {
        return Err(MixerError::unreadable(path, "duration is zero"));
    }
    Ok(duration)
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

/// Parse `ffprobe` rationals such as `30000/1001`; `0/0` yields `None`.
pub(crate) fn parse_rational(s: &str) -> Option<f64> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (s.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    let v = num / den;
    v.is_finite().then_some(v)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/probe.rs"]
mod tests;
