use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use media_mixer::{
    MergeEngine, MergeJob, MixerConfig, OutputProfile, PairOutcome, PairRequest, ProgressEvent,
    Stage, WaveformEffect, WaveformFailurePolicy, scan_for_pairs,
};

#[derive(Parser, Debug)]
#[command(name = "media-mixer", version, about = "Merge audio tracks with videos or images")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pair every audio file in a folder with the video/image sharing its name and merge them.
    Batch(BatchArgs),
    /// Merge one audio file with one video or image.
    Single(SingleArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Folder holding audio and visual files.
    #[arg(long)]
    input_dir: PathBuf,

    /// Where merged MP4s go (default: `<input-dir>/<results_folder>`).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct SingleArgs {
    /// Audio track.
    #[arg(long)]
    audio: PathBuf,

    /// Video or still image.
    #[arg(long)]
    visual: PathBuf,

    /// Folder for the merged MP4.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Draw the audio waveform over the picture.
    #[arg(long)]
    waveform: bool,

    /// Waveform bar style.
    #[arg(long, value_enum)]
    effect: Option<EffectChoice>,

    /// What to do when the audio cannot be analysed for the waveform.
    #[arg(long, value_enum)]
    on_waveform_error: Option<FailureChoice>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EffectChoice {
    Classic,
    Gradient,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailureChoice {
    Abort,
    Skip,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let (job, config) = match cli.cmd {
        Command::Batch(args) => batch_job(args)?,
        Command::Single(args) => single_job(args)?,
    };

    config
        .tools
        .check()
        .context("ffmpeg and ffprobe are required")?;

    if job.pairs.is_empty() {
        tracing::warn!("no audio/visual pairs found; nothing to do");
        return Ok(());
    }

    let engine = MergeEngine::new(Arc::new(OutputProfile::standard()), config.tools.clone());
    let handle = engine.spawn_batch(job);
    for event in handle.events.iter() {
        log_event(&event);
    }
    let report = handle.join()?;

    if report.failed() > 0 || report.cancelled {
        anyhow::bail!(
            "{} of {} pairs failed{}",
            report.failed(),
            report.pairs.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
    }
    Ok(())
}

fn load_config(common: &CommonArgs) -> anyhow::Result<MixerConfig> {
    let mut config = match &common.config {
        Some(path) => MixerConfig::from_path(path)?,
        None => MixerConfig::default(),
    };
    if common.waveform {
        config.waveform.enabled = true;
    }
    if let Some(effect) = common.effect {
        config.waveform.effect = match effect {
            EffectChoice::Classic => WaveformEffect::ClassicBars,
            EffectChoice::Gradient => WaveformEffect::GradientBars,
        };
    }
    if let Some(policy) = common.on_waveform_error {
        config.waveform.on_failure = match policy {
            FailureChoice::Abort => WaveformFailurePolicy::Abort,
            FailureChoice::Skip => WaveformFailurePolicy::SkipOverlay,
        };
    }
    Ok(config)
}

fn batch_job(args: BatchArgs) -> anyhow::Result<(MergeJob, MixerConfig)> {
    let config = load_config(&args.common)?;
    let pairs = scan_for_pairs(&args.input_dir)?;
    let results_dir = args
        .out_dir
        .unwrap_or_else(|| args.input_dir.join(&config.results_folder));
    let job = MergeJob {
        pairs,
        waveform: config.waveform.clone(),
        results_dir,
    };
    Ok((job, config))
}

fn single_job(args: SingleArgs) -> anyhow::Result<(MergeJob, MixerConfig)> {
    let config = load_config(&args.common)?;
    let job = MergeJob {
        pairs: vec![PairRequest::new(args.audio, args.visual)],
        waveform: config.waveform.clone(),
        results_dir: args.out_dir,
    };
    Ok((job, config))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn log_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::PairStarted {
            index,
            total,
            audio,
            visual,
        } => tracing::info!(
            "[{}/{}] {} + {}",
            index + 1,
            total,
            file_name(audio),
            file_name(visual)
        ),
        ProgressEvent::Stage {
            index,
            stage,
            fraction,
        } => {
            // Encoding fires every percent; log it in tenths.
            let percent = (fraction * 100.0).round() as u32;
            if *stage != Stage::Encoding || percent % 10 == 0 {
                tracing::debug!(pair = index + 1, %stage, percent, "progress");
            }
        }
        ProgressEvent::Finished { index, outcome } => match outcome {
            PairOutcome::Success { output_path } => {
                tracing::info!(pair = index + 1, out = %output_path.display(), "done");
            }
            PairOutcome::Failure { kind, message } => {
                tracing::error!(pair = index + 1, ?kind, "{message}");
            }
        },
        ProgressEvent::BatchFinished {
            succeeded,
            failed,
            cancelled,
        } => tracing::info!(succeeded, failed, cancelled, "batch finished"),
    }
}
