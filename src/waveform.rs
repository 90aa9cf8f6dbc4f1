//! Audio-amplitude bar overlays, one per output frame.

use std::path::Path;

use rayon::prelude::*;

use crate::assets::decode::{AudioPcm, decode_audio_mono_f32};
use crate::config::Toolchain;
use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8Premul};
use crate::foundation::error::{MixerError, MixerResult};

const BAR_GAP_PX: u32 = 2;
const MAX_BAR_FRACTION: f64 = 0.9;
const BAR_ALPHA: u8 = 180;

const CLASSIC_RGB: [u8; 3] = [0, 255, 0];
const GRADIENT_LOW: [u8; 3] = [0, 120, 255];
const GRADIENT_MID: [u8; 3] = [200, 0, 200];
const GRADIENT_HIGH: [u8; 3] = [255, 120, 0];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformEffect {
    /// Solid single-colour bars.
    #[default]
    ClassicBars,
    /// Bars coloured blue to magenta to orange from the strip bottom up.
    GradientBars,
}

/// How the samples of one frame window collapse to a single amplitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplitudeWindow {
    #[default]
    Rms,
    Peak,
}

/// What a merge does when the audio cannot be analysed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformFailurePolicy {
    /// Fail the pair with the analysis error.
    #[default]
    Abort,
    /// Log a warning and encode without an overlay.
    SkipOverlay,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WaveformSpec {
    pub enabled: bool,
    pub effect: WaveformEffect,
    /// Analysis sample rate in Hz.
    pub sample_rate: u32,
    pub amplitude_window: AmplitudeWindow,
    /// Bars across the strip.
    pub bars: u32,
    /// Strip height as a fraction of the output height, in (0, 1].
    pub height_fraction: f64,
    pub on_failure: WaveformFailurePolicy,
}

impl Default for WaveformSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            effect: WaveformEffect::ClassicBars,
            sample_rate: 44_100,
            amplitude_window: AmplitudeWindow::Rms,
            bars: 64,
            height_fraction: 0.15,
            on_failure: WaveformFailurePolicy::Abort,
        }
    }
}

impl WaveformSpec {
    pub fn validate(&self) -> MixerResult<()> {
        if self.sample_rate == 0 {
            return Err(MixerError::validation("waveform sample_rate must be > 0"));
        }
        if self.bars == 0 {
            return Err(MixerError::validation("waveform bars must be > 0"));
        }
        if !(self.height_fraction > 0.0 && self.height_fraction <= 1.0) {
            return Err(MixerError::validation(
                "waveform height_fraction must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// A horizontal overlay strip to be blended onto rows `origin_y..origin_y + height`.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayFrame {
    pub index: FrameIndex,
    pub width: u32,
    pub height: u32,
    pub origin_y: u32,
    /// Premultiplied RGBA8, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

/// Finite, restartable overlay sequence aligned 1:1 with the output frame clock.
///
/// Each frame gets one amplitude over its own sample window. The strip scrolls: bars show the
/// most recent `bars` frame amplitudes, newest on the right. Amplitudes are analysed up front;
/// pixels are drawn only when a frame is requested.
#[derive(Clone, Debug)]
pub struct WaveformFrames {
    frame_count: u64,
    bars: usize,
    /// Per-frame amplitudes in [0, 1], normalized to the clip's global peak, preceded by
    /// `bars - 1` zeros so every frame's history is one contiguous window.
    history: Vec<f32>,
    width: u32,
    strip_height: u32,
    origin_y: u32,
    /// Premultiplied colour per strip row, top row first.
    row_colors: Vec<[u8; 4]>,
}

/// Decode `audio_path` and analyse it for `frame_count` frames at `fps`.
#[tracing::instrument(skip_all, fields(audio = %audio_path.display(), frame_count))]
pub fn analyze(
    audio_path: &Path,
    spec: &WaveformSpec,
    fps: Fps,
    canvas: Canvas,
    frame_count: u64,
    tools: &Toolchain,
) -> MixerResult<WaveformFrames> {
    spec.validate()?;
    let pcm = decode_audio_mono_f32(audio_path, spec.sample_rate, tools)?;
    tracing::debug!(
        samples = pcm.samples.len(),
        secs = pcm.duration_secs(),
        "decoded audio for waveform"
    );
    render(&pcm, spec, fps, canvas, frame_count)
}

/// Build the overlay sequence from decoded samples.
pub fn render(
    pcm: &AudioPcm,
    spec: &WaveformSpec,
    fps: Fps,
    canvas: Canvas,
    frame_count: u64,
) -> MixerResult<WaveformFrames> {
    spec.validate()?;
    if pcm.samples.is_empty() {
        return Err(MixerError::audio_analysis("no audio samples to analyse"));
    }
    if canvas.width == 0 || canvas.height == 0 {
        return Err(MixerError::validation("waveform canvas must be non-empty"));
    }
    let frames = usize::try_from(frame_count)
        .map_err(|_| MixerError::validation("waveform frame_count does not fit in memory"))?;
    let bars = spec.bars as usize;
    let lead = bars - 1;
    let total = frames
        .checked_add(lead)
        .ok_or_else(|| MixerError::validation("waveform level table is too large"))?;

    let mut history = vec![0.0f32; total];
    history[lead..]
        .par_iter_mut()
        .enumerate()
        .for_each(|(f, level)| {
            *level = frame_amplitude(pcm, spec.amplitude_window, fps, f as u64);
        });

    let peak = history.par_iter().copied().reduce(|| 0.0f32, f32::max);
    if peak > 0.0 {
        history.par_iter_mut().for_each(|l| *l /= peak);
    }

    let strip_height = ((spec.height_fraction * f64::from(canvas.height)).round() as u32)
        .clamp(1, canvas.height);

    Ok(WaveformFrames {
        frame_count,
        bars,
        history,
        width: canvas.width,
        strip_height,
        origin_y: canvas.height - strip_height,
        row_colors: row_colors(spec.effect, strip_height),
    })
}

/// Amplitude of the whole `[t, t + 1/fps)` window of output frame `frame`.
fn frame_amplitude(pcm: &AudioPcm, window: AmplitudeWindow, fps: Fps, frame: u64) -> f32 {
    let len = pcm.samples.len() as u64;
    let start = fps.frame_to_sample(frame, pcm.sample_rate).min(len) as usize;
    let end = fps.frame_to_sample(frame + 1, pcm.sample_rate).min(len) as usize;
    aggregate(&pcm.samples[start..end], window)
}

fn aggregate(samples: &[f32], window: AmplitudeWindow) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    match window {
        AmplitudeWindow::Peak => samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max),
        AmplitudeWindow::Rms => {
            let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
            (sum_sq / samples.len() as f64).sqrt() as f32
        }
    }
}

fn row_colors(effect: WaveformEffect, strip_height: u32) -> Vec<[u8; 4]> {
    (0..strip_height)
        .map(|y| {
            let rgb = match effect {
                WaveformEffect::ClassicBars => CLASSIC_RGB,
                WaveformEffect::GradientBars => {
                    let from_bottom = strip_height - 1 - y;
                    let t = if strip_height > 1 {
                        f64::from(from_bottom) / f64::from(strip_height - 1)
                    } else {
                        0.0
                    };
                    gradient(t)
                }
            };
            Rgba8Premul::from_straight_rgba(rgb[0], rgb[1], rgb[2], BAR_ALPHA).to_array()
        })
        .collect()
}

/// Colour at height fraction `t` in [0, 1].
pub(crate) fn gradient(t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let (a, b, local) = if t <= 0.5 {
        (GRADIENT_LOW, GRADIENT_MID, t / 0.5)
    } else {
        (GRADIENT_MID, GRADIENT_HIGH, (t - 0.5) / 0.5)
    };
    let lerp = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * local).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

impl WaveformFrames {
    pub fn len(&self) -> u64 {
        self.frame_count
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn strip_height(&self) -> u32 {
        self.strip_height
    }

    pub fn origin_y(&self) -> u32 {
        self.origin_y
    }

    /// Normalized bar levels for frame `f`, oldest first.
    ///
    /// The rightmost bar is frame `f` itself; bar `i` is frame `f - (bars - 1 - i)`, and bars
    /// before the first frame are zero.
    pub fn levels(&self, f: FrameIndex) -> Option<&[f32]> {
        if f.0 >= self.frame_count {
            return None;
        }
        let start = f.0 as usize;
        Some(&self.history[start..start + self.bars])
    }

    /// Draw overlay frame `f`; `None` past the end.
    pub fn frame(&self, f: FrameIndex) -> Option<OverlayFrame> {
        let levels = self.levels(f)?;
        let mut data = vec![0u8; self.width as usize * self.strip_height as usize * 4];
        self.draw_into(levels, &mut data);
        Some(OverlayFrame {
            index: f,
            width: self.width,
            height: self.strip_height,
            origin_y: self.origin_y,
            data,
        })
    }

    /// Iterate every overlay frame from the first. Can be called any number of times.
    pub fn iter(&self) -> WaveformIter<'_> {
        WaveformIter {
            frames: self,
            next: 0,
        }
    }

    fn draw_into(&self, levels: &[f32], data: &mut [u8]) {
        let bars = self.bars as u32;
        let bar_w = self.width / bars;
        let fill_w = if bar_w > BAR_GAP_PX {
            bar_w - BAR_GAP_PX
        } else {
            bar_w.max(1)
        };
        let x0 = (self.width - (bar_w * bars).min(self.width)) / 2;
        let max_h = f64::from(self.strip_height) * MAX_BAR_FRACTION;
        let stride = self.width as usize * 4;

        for (i, &level) in levels.iter().enumerate() {
            let bar_h = (f64::from(level) * max_h) as u32;
            if bar_h < 1 {
                continue;
            }
            let left = x0 + i as u32 * bar_w;
            let right = (left + fill_w).min(self.width);
            if left >= right {
                continue;
            }
            for y in (self.strip_height - bar_h)..self.strip_height {
                let color = self.row_colors[y as usize];
                let row = &mut data[y as usize * stride..(y as usize + 1) * stride];
                for px in row[left as usize * 4..right as usize * 4].chunks_exact_mut(4) {
                    px.copy_from_slice(&color);
                }
            }
        }
    }
}

pub struct WaveformIter<'a> {
    frames: &'a WaveformFrames,
    next: u64,
}

impl Iterator for WaveformIter<'_> {
    type Item = OverlayFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.frames.frame(FrameIndex(self.next))?;
        self.next += 1;
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.frames.frame_count.saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for WaveformIter<'_> {}

#[cfg(test)]
#[path = "../tests/unit/waveform/render.rs"]
mod tests;
