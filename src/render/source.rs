use crate::assets::decode::{PreparedImage, VideoFrameReader, decode_image};
use crate::assets::media::{MediaAsset, MediaInfo};
use crate::config::Toolchain;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MixerError, MixerResult};
use crate::render::frame::fit_within;

/// Slack for timestamps that land a hair below a frame boundary.
const FRAME_TIME_EPSILON: f64 = 1e-6;

/// Base pictures for the compositor, addressed by source frame index.
pub trait FrameSource: Send {
    /// Size of every frame returned by [`FrameSource::read`].
    fn dimensions(&self) -> (u32, u32);

    /// Source frame shown at source timestamp `secs`.
    fn frame_at(&self, secs: f64) -> u64;

    /// Premultiplied RGBA8 for frame `index`. Past the end, the last frame is held.
    fn read(&mut self, index: u64) -> MixerResult<&[u8]>;
}

/// Open the right source for a probed visual asset.
///
/// Videos are decoded straight to the size they will occupy on `canvas`, resampled to a
/// constant `fps`.
pub fn open_source(
    visual: &MediaAsset,
    canvas: Canvas,
    fps: Fps,
    tools: &Toolchain,
) -> MixerResult<Box<dyn FrameSource>> {
    match visual.info() {
        MediaInfo::Image { .. } => Ok(Box::new(StillSource::new(decode_image(visual.path())?))),
        MediaInfo::Video { .. } => {
            let (width, height) = visual.display_dimensions().ok_or_else(|| {
                MixerError::validation("video asset has no dimensions (unexpected)")
            })?;
            let fit = fit_within(width, height, canvas)?;
            let reader =
                VideoFrameReader::open(visual.path(), tools, fit.width, fit.height, fps)?;
            Ok(Box::new(VideoSource::new(reader)))
        }
        MediaInfo::Audio { .. } => Err(MixerError::validation(format!(
            "'{}' is audio and has no frames",
            visual.path().display()
        ))),
    }
}

/// A still picture: every timestamp maps to frame 0.
pub struct StillSource {
    image: PreparedImage,
}

impl StillSource {
    pub fn new(image: PreparedImage) -> Self {
        Self { image }
    }
}

impl FrameSource for StillSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    fn frame_at(&self, _secs: f64) -> u64 {
        0
    }

    fn read(&mut self, _index: u64) -> MixerResult<&[u8]> {
        Ok(&self.image.rgba8_premul)
    }
}

/// Streams a decoded video forward, restarting the decoder when asked for an earlier frame.
///
/// Frames are indexed at the reader's constant output rate.
pub struct VideoSource {
    reader: VideoFrameReader,
    frame_rate: f64,
    current: Option<u64>,
    exhausted: bool,
    frame: Vec<u8>,
    scratch: Vec<u8>,
}

impl VideoSource {
    pub fn new(reader: VideoFrameReader) -> Self {
        let frame_rate = reader.fps().as_f64();
        Self {
            reader,
            frame_rate,
            current: None,
            exhausted: false,
            frame: Vec::new(),
            scratch: Vec::new(),
        }
    }
}

impl FrameSource for VideoSource {
    fn dimensions(&self) -> (u32, u32) {
        self.reader.dimensions()
    }

    fn frame_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.frame_rate + FRAME_TIME_EPSILON).floor() as u64
    }

    fn read(&mut self, index: u64) -> MixerResult<&[u8]> {
        if self.current.is_some_and(|cur| index < cur) {
            tracing::debug!(index, "restarting video decoder for loop");
            self.reader.restart()?;
            self.current = None;
            self.exhausted = false;
        }

        while !self.exhausted && self.current.is_none_or(|cur| cur < index) {
            if self.reader.read_frame(&mut self.scratch)? {
                std::mem::swap(&mut self.frame, &mut self.scratch);
                self.current = Some(self.reader.frames_read() - 1);
            } else {
                self.exhausted = true;
            }
        }

        if self.current.is_none() {
            return Err(MixerError::validation("video source yielded no frames"));
        }
        Ok(&self.frame)
    }
}

/// Pre-decoded frames held in memory, shown at `frame_rate`.
pub struct MemorySource {
    width: u32,
    height: u32,
    frame_rate: f64,
    frames: Vec<Vec<u8>>,
}

impl MemorySource {
    pub fn new(
        width: u32,
        height: u32,
        frame_rate: f64,
        frames: Vec<Vec<u8>>,
    ) -> MixerResult<Self> {
        let len = width as usize * height as usize * 4;
        if frames.is_empty() {
            return Err(MixerError::validation("memory source needs at least one frame"));
        }
        if frames.iter().any(|f| f.len() != len) {
            return Err(MixerError::validation(
                "memory source frames must be width*height*4 bytes",
            ));
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(MixerError::validation("memory source frame_rate must be > 0"));
        }
        Ok(Self {
            width,
            height,
            frame_rate,
            frames,
        })
    }
}

impl FrameSource for MemorySource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.frame_rate + FRAME_TIME_EPSILON).floor() as u64
    }

    fn read(&mut self, index: u64) -> MixerResult<&[u8]> {
        let last = self.frames.len() - 1;
        let i = usize::try_from(index).unwrap_or(last).min(last);
        Ok(&self.frames[i])
    }
}
