use crate::align::AlignmentPlan;
use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8Premul};
use crate::foundation::error::{MixerError, MixerResult};
use crate::foundation::math::over_in_place;
use crate::profile::OutputProfile;
use crate::render::frame::{FitRect, FrameRGBA, fit_within, paint_letterboxed, resize_premul};
use crate::render::source::FrameSource;
use crate::waveform::{OverlayFrame, WaveformFrames};

/// Pull-based frame stream at the output profile's canvas and constant rate.
///
/// Each call to [`Compositor::next_frame`] lends out the next frame; frames are not cloned.
pub struct Compositor<'a> {
    canvas: Canvas,
    fps: Fps,
    pad: [u8; 4],
    plan: AlignmentPlan,
    source: Box<dyn FrameSource + 'a>,
    source_dims: (u32, u32),
    fit: FitRect,
    overlay: Option<&'a WaveformFrames>,
    total: u64,
    next: u64,
    cached_source_frame: Option<u64>,
    base: FrameRGBA,
    out: FrameRGBA,
}

impl<'a> Compositor<'a> {
    pub fn new(
        profile: &OutputProfile,
        plan: AlignmentPlan,
        source: Box<dyn FrameSource + 'a>,
        overlay: Option<&'a WaveformFrames>,
    ) -> MixerResult<Self> {
        let canvas = profile.canvas();
        let fps = profile.fps();
        let total = plan.output_frames(fps);
        if let Some(wf) = overlay
            && wf.len() != total
        {
            return Err(MixerError::validation(format!(
                "waveform has {} frames but the output has {total}",
                wf.len()
            )));
        }

        let source_dims = source.dimensions();
        let fit = fit_within(source_dims.0, source_dims.1, canvas)?;
        let [r, g, b, a] = profile.pad_rgba();
        let pad = Rgba8Premul::from_straight_rgba(r, g, b, a).to_array();

        Ok(Self {
            canvas,
            fps,
            pad,
            plan,
            source,
            source_dims,
            fit,
            overlay,
            total,
            next: 0,
            cached_source_frame: None,
            base: FrameRGBA::filled(canvas.width, canvas.height, pad),
            out: FrameRGBA::filled(canvas.width, canvas.height, pad),
        })
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    pub fn fit(&self) -> FitRect {
        self.fit
    }

    /// Next output frame, or `None` once all frames have been produced.
    pub fn next_frame(&mut self) -> MixerResult<Option<(FrameIndex, &FrameRGBA)>> {
        if self.next >= self.total {
            return Ok(None);
        }
        let idx = FrameIndex(self.next);
        let source_time = self.plan.source_time(idx, self.fps);
        let source_frame = self.source.frame_at(source_time);

        if self.cached_source_frame != Some(source_frame) {
            let (sw, sh) = self.source_dims;
            let pixels = self.source.read(source_frame)?;
            if (sw, sh) == (self.fit.width, self.fit.height) {
                paint_letterboxed(&mut self.base, self.pad, self.fit, pixels)?;
            } else {
                let scaled = resize_premul(pixels, sw, sh, self.fit.width, self.fit.height)?;
                paint_letterboxed(&mut self.base, self.pad, self.fit, &scaled)?;
            }
            self.cached_source_frame = Some(source_frame);
        }
        self.next += 1;

        let Some(wf) = self.overlay else {
            return Ok(Some((idx, &self.base)));
        };
        let overlay = wf.frame(idx).ok_or_else(|| {
            MixerError::validation(format!("waveform ended before frame {}", idx.0))
        })?;
        if overlay.index != idx {
            return Err(MixerError::validation(format!(
                "waveform frame {} does not match output frame {}",
                overlay.index.0, idx.0
            )));
        }
        self.out.data.copy_from_slice(&self.base.data);
        blend_overlay(&mut self.out, &overlay, self.canvas)?;
        Ok(Some((idx, &self.out)))
    }
}

fn blend_overlay(dst: &mut FrameRGBA, overlay: &OverlayFrame, canvas: Canvas) -> MixerResult<()> {
    if overlay.width != canvas.width || overlay.origin_y + overlay.height > canvas.height {
        return Err(MixerError::validation("waveform strip does not fit the canvas"));
    }
    let start = overlay.origin_y as usize * canvas.width as usize * 4;
    let end = start + overlay.data.len();
    over_in_place(&mut dst.data[start..end], &overlay.data)
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
