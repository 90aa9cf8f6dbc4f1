//! media-mixer pairs an audio track with a video or still image and encodes one MP4 whose
//! picture lasts exactly as long as the audio.
//!
//! - [`probe`] classifies inputs through `ffprobe`
//! - [`plan`] decides whether the visual is held, looped, or trimmed
//! - [`WaveformFrames`] renders an optional amplitude-bar overlay
//! - [`Compositor`] produces letterboxed 1080p30 frames
//! - [`FfmpegEncoder`] streams them into `ffmpeg` with a fixed compatibility profile
//!
//! [`MergeEngine`] ties the steps together per pair and runs batches with progress events and
//! cancellation.
#![forbid(unsafe_code)]

mod assets;
mod foundation;

pub mod align;
pub mod config;
pub(crate) mod encode;
pub(crate) mod engine;
pub mod pairing;
pub mod profile;
pub(crate) mod render;
pub mod waveform;

pub use crate::align::{AlignMode, AlignmentPlan, plan};
pub use crate::assets::decode::{
    AudioPcm, PreparedImage, VideoFrameReader, decode_audio_mono_f32, decode_image,
    decode_image_bytes,
};
pub use crate::assets::media::{MediaAsset, MediaInfo, MediaKind, MediaPair, PairRequest};
pub use crate::assets::probe::probe;
pub use crate::config::{MixerConfig, Toolchain};
pub use crate::encode::ffmpeg::{FfmpegEncoder, FfmpegEncoderOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::encode::stream::encode_stream;
pub use crate::engine::merge::{BatchHandle, BatchReport, MergeEngine, MergeJob, PairReport};
pub use crate::engine::progress::{PairOutcome, ProgressEvent, ProgressReporter, Stage};
pub use crate::foundation::cancel::CancelToken;
pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8Premul};
pub use crate::foundation::error::{ErrorKind, MixerError, MixerResult};
pub use crate::pairing::scan_for_pairs;
pub use crate::profile::OutputProfile;
pub use crate::render::compositor::Compositor;
pub use crate::render::frame::{FitRect, FrameRGBA, fit_within};
pub use crate::render::source::{FrameSource, MemorySource, StillSource, VideoSource, open_source};
pub use crate::waveform::{
    AmplitudeWindow, OverlayFrame, WaveformEffect, WaveformFailurePolicy, WaveformFrames,
    WaveformSpec,
};
