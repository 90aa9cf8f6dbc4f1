use image::imageops::FilterType;

use crate::foundation::core::Canvas;
use crate::foundation::error::{MixerError, MixerResult};
use crate::foundation::math::over_in_place;

/// One composited picture. Pixels are premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// A frame of `width`x`height` filled with one premultiplied colour.
    pub fn filled(width: u32, height: u32, premul: [u8; 4]) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }
}

/// Where a scaled source lands on the output canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest aspect-preserving rectangle for a `src_w`x`src_h` picture inside `canvas`, centred.
///
/// Never crops; the remaining border is padding.
pub fn fit_within(src_w: u32, src_h: u32, canvas: Canvas) -> MixerResult<FitRect> {
    if src_w == 0 || src_h == 0 {
        return Err(MixerError::validation("source dimensions must be non-zero"));
    }
    if canvas.width == 0 || canvas.height == 0 {
        return Err(MixerError::validation("canvas dimensions must be non-zero"));
    }

    let scale = (f64::from(canvas.width) / f64::from(src_w))
        .min(f64::from(canvas.height) / f64::from(src_h));
    let width = ((f64::from(src_w) * scale).round() as u32).clamp(1, canvas.width);
    let height = ((f64::from(src_h) * scale).round() as u32).clamp(1, canvas.height);

    Ok(FitRect {
        x: (canvas.width - width) / 2,
        y: (canvas.height - height) / 2,
        width,
        height,
    })
}

/// Lanczos-resample premultiplied RGBA8 to `dst_w`x`dst_h`.
pub(crate) fn resize_premul(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> MixerResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(src_w, src_h, src.to_vec())
        .ok_or_else(|| MixerError::validation("source buffer does not match its dimensions"))?;
    let mut out = image::imageops::resize(&img, dst_w, dst_h, FilterType::Lanczos3).into_raw();
    // Lanczos ringing can push a channel above its alpha.
    for px in out.chunks_exact_mut(4) {
        let a = px[3];
        px[0] = px[0].min(a);
        px[1] = px[1].min(a);
        px[2] = px[2].min(a);
    }
    Ok(out)
}

/// Fill `dst` with `pad` and draw `src` (already `fit`-sized) over it at the fit offset.
pub(crate) fn paint_letterboxed(
    dst: &mut FrameRGBA,
    pad: [u8; 4],
    fit: FitRect,
    src: &[u8],
) -> MixerResult<()> {
    let src_stride = fit.width as usize * 4;
    if src.len() != src_stride * fit.height as usize {
        return Err(MixerError::validation(
            "scaled source does not match fit rectangle",
        ));
    }
    if fit.x + fit.width > dst.width || fit.y + fit.height > dst.height {
        return Err(MixerError::validation("fit rectangle exceeds the canvas"));
    }

    for px in dst.data.chunks_exact_mut(4) {
        px.copy_from_slice(&pad);
    }
    let x0 = fit.x as usize * 4;
    for (row, src_row) in src.chunks_exact(src_stride).enumerate() {
        let dst_row = dst.row_mut(fit.y + row as u32);
        over_in_place(&mut dst_row[x0..x0 + src_stride], src_row)?;
    }
    Ok(())
}
