//! The fixed output profile every merge encodes to.

use crate::foundation::core::{Canvas, Fps};

/// Broad-compatibility MP4 target: H.264 Main@4.0 yuv420p, 1920x1080 at a constant 30 fps,
/// stereo AAC 192 kbps / 44.1 kHz, `moov` atom up front.
///
/// Values are fixed. The only constructor in the public API is [`OutputProfile::standard`];
/// share one instance between merges through an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputProfile {
    canvas: Canvas,
    fps: Fps,
    video_codec: &'static str,
    video_preset: &'static str,
    h264_profile: &'static str,
    h264_level: &'static str,
    codec_tag: &'static str,
    pixel_format: &'static str,
    audio_codec: &'static str,
    audio_bitrate_kbps: u32,
    audio_channels: u16,
    audio_sample_rate: u32,
    faststart: bool,
    pad_rgba: [u8; 4],
}

impl OutputProfile {
    /// The one supported profile.
    pub const fn standard() -> Self {
        Self {
            canvas: Canvas {
                width: 1920,
                height: 1080,
            },
            fps: Fps::integer(30),
            video_codec: "libx264",
            video_preset: "ultrafast",
            h264_profile: "main",
            h264_level: "4.0",
            codec_tag: "avc1",
            pixel_format: "yuv420p",
            audio_codec: "aac",
            audio_bitrate_kbps: 192,
            audio_channels: 2,
            audio_sample_rate: 44_100,
            faststart: true,
            pad_rgba: [0, 0, 0, 255],
        }
    }

    /// Same profile on a smaller canvas, so unit tests do not push 8 MB frames around.
    #[cfg(test)]
    pub(crate) fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas = Canvas { width, height };
        self
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn audio_sample_rate(&self) -> u32 {
        self.audio_sample_rate
    }

    pub fn audio_channels(&self) -> u16 {
        self.audio_channels
    }

    /// Straight-alpha RGBA used for letterbox/pillarbox bars and alpha flattening.
    pub fn pad_rgba(&self) -> [u8; 4] {
        self.pad_rgba
    }

    /// Output-side encoder flags (everything after the inputs, before `-t`/output path).
    ///
    /// `still_image` adds x264's `stillimage` tune for image-backed merges.
    pub fn encoder_args(&self, still_image: bool) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-c:v".into(),
            self.video_codec.into(),
            "-preset".into(),
            self.video_preset.into(),
        ];
        if still_image {
            args.extend(["-tune".into(), "stillimage".into()]);
        }
        args.extend([
            "-profile:v".into(),
            self.h264_profile.into(),
            "-level".into(),
            self.h264_level.into(),
            "-tag:v".into(),
            self.codec_tag.into(),
            "-pix_fmt".into(),
            self.pixel_format.into(),
            "-r".into(),
            self.fps.to_string(),
            "-vsync".into(),
            "cfr".into(),
            "-c:a".into(),
            self.audio_codec.into(),
            "-b:a".into(),
            format!("{}k", self.audio_bitrate_kbps),
            "-ac".into(),
            self.audio_channels.to_string(),
            "-ar".into(),
            self.audio_sample_rate.to_string(),
        ]);
        if self.faststart {
            args.extend(["-movflags".into(), "+faststart".into()]);
        }
        args
    }
}

impl Default for OutputProfile {
    fn default() -> Self {
        Self::standard()
    }
}
