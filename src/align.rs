//! Duration alignment: how a visual source is held, looped or trimmed to the audio length.

use crate::assets::media::{MediaAsset, MediaInfo};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{MixerError, MixerResult};

/// Tolerance for `target / source` ratios that land a hair above an integer.
const LOOP_RATIO_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AlignMode {
    Loop,
    Trim,
    StillHold,
}

/// How the visual source maps onto the audio timeline. Computed once per pair.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AlignmentPlan {
    /// Play the source `loop_count + 1` times back to back, then cut at `trim_point`.
    Loop {
        loop_count: u64,
        source_duration: f64,
        trim_point: f64,
    },
    /// Play the source once and cut its tail at `trim_point`.
    Trim { trim_point: f64 },
    /// Show a still picture for `hold_duration` seconds.
    StillHold { hold_duration: f64 },
}

/// Compute the plan that stretches `visual` to exactly `target_duration` seconds.
pub fn plan(visual: &MediaAsset, target_duration: f64) -> MixerResult<AlignmentPlan> {
    if !target_duration.is_finite() || target_duration <= 0.0 {
        return Err(MixerError::invalid_duration(format!(
            "target duration must be positive, got {target_duration}"
        )));
    }

    match visual.info() {
        MediaInfo::Image { .. } => Ok(AlignmentPlan::StillHold {
            hold_duration: target_duration,
        }),
        MediaInfo::Video { duration, .. } => {
            let source_duration = *duration;
            if !source_duration.is_finite() || source_duration <= 0.0 {
                return Err(MixerError::invalid_duration(format!(
                    "video '{}' has unusable duration {source_duration}",
                    visual.path().display()
                )));
            }
            if source_duration >= target_duration {
                return Ok(AlignmentPlan::Trim {
                    trim_point: target_duration,
                });
            }
            let passes = (target_duration / source_duration - LOOP_RATIO_EPSILON).ceil();
            Ok(AlignmentPlan::Loop {
                loop_count: (passes as u64).saturating_sub(1),
                source_duration,
                trim_point: target_duration,
            })
        }
        MediaInfo::Audio { .. } => Err(MixerError::validation(format!(
            "'{}' is audio and cannot be the visual source",
            visual.path().display()
        ))),
    }
}

impl AlignmentPlan {
    pub fn mode(&self) -> AlignMode {
        match self {
            Self::Loop { .. } => AlignMode::Loop,
            Self::Trim { .. } => AlignMode::Trim,
            Self::StillHold { .. } => AlignMode::StillHold,
        }
    }

    /// Length of the aligned visual stream in seconds.
    pub fn target_duration(&self) -> f64 {
        match *self {
            Self::Loop { trim_point, .. } | Self::Trim { trim_point } => trim_point,
            Self::StillHold { hold_duration } => hold_duration,
        }
    }

    /// Number of constant-rate output frames; never less than one.
    pub fn output_frames(&self, fps: Fps) -> u64 {
        fps.secs_to_frames_round(self.target_duration()).max(1)
    }

    /// Duration actually covered by [`AlignmentPlan::output_frames`].
    pub fn output_duration(&self, fps: Fps) -> f64 {
        fps.frames_to_secs(self.output_frames(fps))
    }

    /// Source timestamp shown at output frame `frame`.
    pub fn source_time(&self, frame: FrameIndex, fps: Fps) -> f64 {
        let t = fps.frames_to_secs(frame.0);
        match *self {
            Self::StillHold { .. } => 0.0,
            Self::Trim { trim_point } => t.min(trim_point),
            Self::Loop {
                loop_count,
                source_duration,
                ..
            } => {
                let pass = ((t / source_duration).floor() as u64).min(loop_count);
                let local = t - (pass as f64) * source_duration;
                local.clamp(0.0, source_duration)
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/align/plan.rs"]
mod tests;
