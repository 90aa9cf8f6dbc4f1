use std::path::{Path, PathBuf};

use crate::foundation::error::{MixerError, MixerResult};

/// Closed set of media kinds the probe can resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

/// Kind-specific facts gathered by the probe.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaInfo {
    Audio {
        /// Seconds, always positive.
        duration: f64,
        sample_rate: u32,
        channels: u16,
    },
    Video {
        /// Seconds, always positive.
        duration: f64,
        width: u32,
        height: u32,
        /// Native frames per second.
        frame_rate: f64,
        /// Display rotation in degrees, one of 0, 90, 180 or 270. `width`/`height` are the
        /// coded size, before rotation.
        rotation: u32,
    },
    Image {
        width: u32,
        height: u32,
    },
}

/// A probed input file. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaAsset {
    path: PathBuf,
    info: MediaInfo,
}

impl MediaAsset {
    pub fn new(path: impl Into<PathBuf>, info: MediaInfo) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn kind(&self) -> MediaKind {
        match self.info {
            MediaInfo::Audio { .. } => MediaKind::Audio,
            MediaInfo::Video { .. } => MediaKind::Video,
            MediaInfo::Image { .. } => MediaKind::Image,
        }
    }

    /// Duration in seconds for audio and video; `None` for images.
    pub fn duration(&self) -> Option<f64> {
        match self.info {
            MediaInfo::Audio { duration, .. } | MediaInfo::Video { duration, .. } => {
                Some(duration)
            }
            MediaInfo::Image { .. } => None,
        }
    }

    /// Pixel dimensions for video and images; `None` for audio.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.info {
            MediaInfo::Video { width, height, .. } | MediaInfo::Image { width, height } => {
                Some((width, height))
            }
            MediaInfo::Audio { .. } => None,
        }
    }

    /// Size the picture is shown at: the coded size with width and height swapped for videos
    /// rotated a quarter turn. This is what ffmpeg emits after autorotation.
    pub fn display_dimensions(&self) -> Option<(u32, u32)> {
        match self.info {
            MediaInfo::Video {
                width,
                height,
                rotation: 90 | 270,
                ..
            } => Some((height, width)),
            _ => self.dimensions(),
        }
    }

    pub fn frame_rate(&self) -> Option<f64> {
        match self.info {
            MediaInfo::Video { frame_rate, .. } => Some(frame_rate),
            MediaInfo::Audio { .. } | MediaInfo::Image { .. } => None,
        }
    }

    /// File stem used to name outputs.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_owned())
    }
}

/// Unprobed pair as handed over by a pairing collaborator.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PairRequest {
    pub audio_path: PathBuf,
    pub visual_path: PathBuf,
}

impl PairRequest {
    pub fn new(audio_path: impl Into<PathBuf>, visual_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            visual_path: visual_path.into(),
        }
    }
}

/// One audio asset matched with one visual asset, both probed.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaPair {
    audio: MediaAsset,
    visual: MediaAsset,
}

impl MediaPair {
    /// Pair two probed assets. `audio` must be audio; `visual` must be video or image.
    pub fn new(audio: MediaAsset, visual: MediaAsset) -> MixerResult<Self> {
        if audio.kind() != MediaKind::Audio {
            return Err(MixerError::validation(format!(
                "'{}' is {:?}, expected an audio track",
                audio.path().display(),
                audio.kind()
            )));
        }
        if visual.kind() == MediaKind::Audio {
            return Err(MixerError::validation(format!(
                "'{}' is audio, expected a video or image",
                visual.path().display()
            )));
        }
        Ok(Self { audio, visual })
    }

    pub fn audio(&self) -> &MediaAsset {
        &self.audio
    }

    pub fn visual(&self) -> &MediaAsset {
        &self.visual
    }

    /// Audio length in seconds; the target every plan aligns to.
    pub fn target_duration(&self) -> f64 {
        self.audio.duration().unwrap_or(0.0)
    }

    /// `<audio base name>.mp4`.
    pub fn output_name(&self) -> String {
        format!("{}.mp4", self.audio.base_name())
    }
}
