use std::path::PathBuf;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{MixerError, MixerResult};
use crate::render::frame::FrameRGBA;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Audio file muxed next to the video stream.
    pub audio_path: PathBuf,
    /// Output length in seconds; the encoder cuts both streams here.
    pub duration_secs: f64,
    /// The visual is a still picture.
    pub still_image: bool,
}

impl SinkConfig {
    pub(crate) fn validate(&self) -> MixerResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(MixerError::validation("fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(MixerError::validation("sink width/height must be non-zero"));
        }
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(MixerError::invalid_duration(format!(
                "sink duration must be positive, got {}",
                self.duration_secs
            )));
        }
        Ok(())
    }

    pub(crate) fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Consumer of composited frames in timeline order.
///
/// `push_frame` is called in strictly increasing `FrameIndex` order. After `begin`, exactly one of
/// `end` or `abort` is called.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> MixerResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> MixerResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> MixerResult<()>;
    /// Stop early and discard anything written so far.
    fn abort(&mut self) {}
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Captured frames in timeline order.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> MixerResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> MixerResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MixerError::validation("in-memory sink not started"))?;
        if let Some((last, _)) = self.frames.last()
            && idx.0 <= last.0
        {
            return Err(MixerError::validation("sink received out-of-order frame index"));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(MixerError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> MixerResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.frames.clear();
    }
}
