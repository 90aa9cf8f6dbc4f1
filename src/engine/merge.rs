use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::align::{self, AlignMode};
use crate::assets::media::{MediaPair, PairRequest};
use crate::assets::probe::probe;
use crate::config::Toolchain;
use crate::encode::ffmpeg::{FfmpegEncoder, FfmpegEncoderOpts};
use crate::encode::sink::SinkConfig;
use crate::encode::stream::encode_stream;
use crate::engine::progress::{PairOutcome, ProgressEvent, ProgressReporter, Stage};
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{MixerError, MixerResult};
use crate::profile::OutputProfile;
use crate::render::compositor::Compositor;
use crate::render::source::open_source;
use crate::waveform::{self, WaveformFailurePolicy, WaveformFrames, WaveformSpec};

/// An ordered batch of pairs sharing one waveform configuration and output folder.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeJob {
    pub pairs: Vec<PairRequest>,
    pub waveform: WaveformSpec,
    pub results_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PairReport {
    pub request: PairRequest,
    pub outcome: PairOutcome,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    /// One entry per pair that was started, in batch order.
    pub pairs: Vec<PairReport>,
    /// The batch stopped early because its token was cancelled.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.pairs.iter().filter(|p| p.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.pairs.len() - self.succeeded()
    }
}

/// A batch running on its own thread.
pub struct BatchHandle {
    pub events: Receiver<ProgressEvent>,
    pub cancel: CancelToken,
    join: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Wait for the batch thread and return its report.
    pub fn join(self) -> MixerResult<BatchReport> {
        self.join
            .join()
            .map_err(|_| MixerError::Other(anyhow::anyhow!("batch worker thread panicked")))
    }
}

/// Turns pairs into encoded MP4s: probe, align, compose, encode.
#[derive(Clone, Debug)]
pub struct MergeEngine {
    profile: Arc<OutputProfile>,
    tools: Toolchain,
}

impl MergeEngine {
    pub fn new(profile: Arc<OutputProfile>, tools: Toolchain) -> Self {
        Self { profile, tools }
    }

    pub fn profile(&self) -> &OutputProfile {
        &self.profile
    }

    pub fn tools(&self) -> &Toolchain {
        &self.tools
    }

    /// Probe both files of `request`, then merge them into `results_dir`.
    #[tracing::instrument(
        skip_all,
        fields(
            audio = %request.audio_path.display(),
            visual = %request.visual_path.display(),
        )
    )]
    pub fn merge_pair(
        &self,
        request: &PairRequest,
        waveform: &WaveformSpec,
        results_dir: &Path,
        reporter: &ProgressReporter,
        cancel: &CancelToken,
    ) -> MixerResult<PathBuf> {
        cancel.check()?;
        reporter.stage(Stage::Probing, 0.0);
        let audio = probe(&request.audio_path, &self.tools)?;
        cancel.check()?;
        let visual = probe(&request.visual_path, &self.tools)?;
        let pair = MediaPair::new(audio, visual)?;
        reporter.stage(Stage::Probing, 1.0);

        self.merge_probed(&pair, waveform, results_dir, reporter, cancel)
    }

    /// Merge an already probed pair. The output is `<audio base name>.mp4` in `results_dir`,
    /// replacing any previous file only when the encode succeeds.
    pub fn merge_probed(
        &self,
        pair: &MediaPair,
        waveform: &WaveformSpec,
        results_dir: &Path,
        reporter: &ProgressReporter,
        cancel: &CancelToken,
    ) -> MixerResult<PathBuf> {
        cancel.check()?;
        let fps = self.profile.fps();
        let canvas = self.profile.canvas();
        let target = pair.target_duration();

        let plan = align::plan(pair.visual(), target)?;
        let frames = plan.output_frames(fps);
        tracing::info!(?plan, frames, target, "alignment planned");
        reporter.stage(Stage::Aligning, 1.0);

        reporter.stage(Stage::Rendering, 0.0);
        let overlay = self.waveform_overlay(pair, waveform, frames)?;
        cancel.check()?;
        reporter.stage(Stage::Rendering, 0.5);

        let source = open_source(pair.visual(), canvas, fps, &self.tools)?;
        let mut compositor = Compositor::new(&self.profile, plan, source, overlay.as_ref())?;
        reporter.stage(Stage::Rendering, 1.0);

        let out_path = results_dir.join(pair.output_name());
        let mut encoder = FfmpegEncoder::new(FfmpegEncoderOpts {
            out_path: out_path.clone(),
            tools: self.tools.clone(),
            profile: Arc::clone(&self.profile),
            cancel: cancel.clone(),
        });
        let cfg = SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps,
            audio_path: pair.audio().path().to_path_buf(),
            duration_secs: target,
            still_image: plan.mode() == AlignMode::StillHold,
        };

        reporter.stage(Stage::Encoding, 0.0);
        encode_stream(&mut compositor, &mut encoder, cfg, cancel, &mut |fraction| {
            reporter.stage(Stage::Encoding, fraction)
        })?;
        reporter.stage(Stage::Encoding, 1.0);

        tracing::info!(out = %out_path.display(), "merge finished");
        Ok(out_path)
    }

    fn waveform_overlay(
        &self,
        pair: &MediaPair,
        spec: &WaveformSpec,
        frames: u64,
    ) -> MixerResult<Option<WaveformFrames>> {
        if !spec.enabled {
            return Ok(None);
        }
        let analysed = waveform::analyze(
            pair.audio().path(),
            spec,
            self.profile.fps(),
            self.profile.canvas(),
            frames,
            &self.tools,
        );
        match analysed {
            Ok(frames) => Ok(Some(frames)),
            Err(e @ MixerError::AudioAnalysis(_))
                if spec.on_failure == WaveformFailurePolicy::SkipOverlay =>
            {
                tracing::warn!(error = %e, "waveform skipped; encoding without overlay");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run every pair of `job` in order, sending events to `events`.
    ///
    /// A failing pair is reported and the batch moves on; cancellation stops before the next pair.
    pub fn run_batch(
        &self,
        job: &MergeJob,
        events: &Sender<ProgressEvent>,
        cancel: &CancelToken,
    ) -> BatchReport {
        let total = job.pairs.len();
        let mut report = BatchReport::default();
        tracing::info!(total, results = %job.results_dir.display(), "batch started");

        for (index, request) in job.pairs.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let _ = events.send(ProgressEvent::PairStarted {
                index,
                total,
                audio: request.audio_path.clone(),
                visual: request.visual_path.clone(),
            });

            let reporter = ProgressReporter::new(events.clone(), index);
            let result =
                self.merge_pair(request, &job.waveform, &job.results_dir, &reporter, cancel);
            if let Err(e) = &result {
                tracing::warn!(index, error = %e, kind = ?e.kind(), "pair failed");
            }
            let outcome = PairOutcome::from_result(&result);
            let _ = events.send(ProgressEvent::Finished {
                index,
                outcome: outcome.clone(),
            });
            report.pairs.push(PairReport {
                request: request.clone(),
                outcome,
            });

            if matches!(result, Err(MixerError::Cancelled)) {
                report.cancelled = true;
                break;
            }
        }

        let _ = events.send(ProgressEvent::BatchFinished {
            succeeded: report.succeeded(),
            failed: report.failed(),
            cancelled: report.cancelled,
        });
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "batch finished"
        );
        report
    }

    /// Run `job` on a background thread.
    pub fn spawn_batch(&self, job: MergeJob) -> BatchHandle {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        let engine = self.clone();
        let worker_cancel = cancel.clone();
        let join = std::thread::spawn(move || engine.run_batch(&job, &tx, &worker_cancel));
        BatchHandle {
            events: rx,
            cancel,
            join,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/merge.rs"]
mod tests;
