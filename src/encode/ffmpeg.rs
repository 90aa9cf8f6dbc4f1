use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tempfile::TempPath;

use crate::config::Toolchain;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MixerError, MixerResult};
use crate::foundation::math::flatten_premul_over_bg_to_opaque_rgba8;
use crate::profile::OutputProfile;
use crate::render::frame::FrameRGBA;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Options for [`FfmpegEncoder`].
#[derive(Clone, Debug)]
pub struct FfmpegEncoderOpts {
    /// Final MP4 path. Replaced only after ffmpeg succeeds.
    pub out_path: PathBuf,
    pub tools: Toolchain,
    pub profile: Arc<OutputProfile>,
    /// Polled while waiting for ffmpeg to finish.
    pub cancel: CancelToken,
}

/// Sink that spawns the system `ffmpeg`, streams raw frames to its stdin and muxes the audio file.
///
/// ffmpeg writes to a temporary file next to `out_path`; the file is renamed into place only on a
/// clean exit and removed on any failure, abort, or drop.
pub struct FfmpegEncoder {
    opts: FfmpegEncoderOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    part: Option<TempPath>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegEncoder {
    pub fn new(opts: FfmpegEncoderOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            part: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    /// Kill ffmpeg if it is still running and collect its exit status and stderr.
    fn reap(&mut self) -> (Option<ExitStatus>, String) {
        drop(self.stdin.take());
        let status = self.child.take().and_then(|mut child| {
            let _ = child.kill();
            child.wait().ok()
        });
        (status, self.drain_stderr())
    }

    fn drain_stderr(&mut self) -> String {
        let bytes = match self.stderr_drain.take() {
            Some(handle) => handle.join().ok().and_then(|r| r.ok()).unwrap_or_default(),
            None => Vec::new(),
        };
        String::from_utf8_lossy(&bytes).trim().to_owned()
    }

    fn wait_for_exit(&mut self) -> MixerResult<ExitStatus> {
        loop {
            if self.opts.cancel.is_cancelled() {
                self.abort();
                return Err(MixerError::Cancelled);
            }
            let child = self
                .child
                .as_mut()
                .ok_or_else(|| MixerError::encoding("ffmpeg encoder not started"))?;
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.child = None;
                    return Ok(status);
                }
                Ok(None) => std::thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => {
                    self.abort();
                    return Err(MixerError::encoding(format!(
                        "failed to wait for ffmpeg to finish: {e}"
                    )));
                }
            }
        }
    }
}

impl FrameSink for FfmpegEncoder {
    fn begin(&mut self, cfg: SinkConfig) -> MixerResult<()> {
        cfg.validate()?;
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(MixerError::validation(
                "encoder width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        let out_dir = ensure_parent_dir(&self.opts.out_path)?;
        let stem = self
            .opts
            .out_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = tempfile::Builder::new()
            .prefix(&format!(".{stem}."))
            .suffix(".part")
            .tempfile_in(&out_dir)
            .map_err(|e| {
                MixerError::encoding(format!(
                    "failed to create temporary output in '{}': {e}",
                    out_dir.display()
                ))
            })?
            .into_temp_path();

        let args = ffmpeg_args(&self.opts.profile, &cfg, &part);
        tracing::debug!(
            ffmpeg = %self.opts.tools.ffmpeg.display(),
            args = ?args,
            "spawning encoder"
        );

        let mut child = Command::new(&self.opts.tools.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MixerError::encoding(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.opts.tools.ffmpeg.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MixerError::encoding("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MixerError::encoding("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; cfg.frame_len()];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.part = Some(part);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> MixerResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MixerError::validation("ffmpeg encoder not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(MixerError::validation(
                "ffmpeg encoder received out-of-order frame index",
            ));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(MixerError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(MixerError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }
        self.last_idx = Some(idx);

        flatten_premul_over_bg_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            self.opts.profile.pad_rgba(),
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MixerError::encoding("ffmpeg encoder is already finalized"));
        };
        if let Err(e) = stdin.write_all(&self.scratch) {
            let (status, stderr) = self.reap();
            self.part = None;
            let status = status.map_or_else(|| "unknown".to_owned(), |s| s.to_string());
            return Err(MixerError::encoding(format!(
                "ffmpeg stopped accepting frames ({e}); exit status {status}: {stderr}"
            )));
        }
        Ok(())
    }

    fn end(&mut self) -> MixerResult<()> {
        drop(self.stdin.take());
        let status = self.wait_for_exit()?;
        let stderr = self.drain_stderr();
        let part = self
            .part
            .take()
            .ok_or_else(|| MixerError::encoding("ffmpeg encoder has no output file"))?;
        self.cfg = None;

        if !status.success() {
            return Err(MixerError::encoding(format!(
                "ffmpeg exited with status {status}: {stderr}"
            )));
        }
        let written = std::fs::metadata(&part).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(MixerError::encoding(format!(
                "ffmpeg exited cleanly but wrote no output: {stderr}"
            )));
        }

        part.persist(&self.opts.out_path).map_err(|e| {
            MixerError::encoding(format!(
                "failed to move encoded file to '{}': {}",
                self.opts.out_path.display(),
                e.error
            ))
        })?;
        tracing::debug!(out = %self.opts.out_path.display(), bytes = written, "encoder finished");
        Ok(())
    }

    fn abort(&mut self) {
        if self.child.is_some() {
            tracing::debug!(out = %self.opts.out_path.display(), "aborting encoder");
        }
        let _ = self.reap();
        self.part = None;
        self.cfg = None;
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Full ffmpeg argument list for one merge writing to `out`.
pub(crate) fn ffmpeg_args(profile: &OutputProfile, cfg: &SinkConfig, out: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-v",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
        &format!("{}x{}", cfg.width, cfg.height),
        "-framerate",
        &cfg.fps.to_string(),
        "-i",
        "pipe:0",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(cfg.audio_path.clone().into_os_string());
    args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(OsString::from));
    args.extend(
        profile
            .encoder_args(cfg.still_image)
            .into_iter()
            .map(OsString::from),
    );
    args.extend(
        [
            "-t".to_owned(),
            format!("{:.6}", cfg.duration_secs),
            "-f".to_owned(),
            "mp4".to_owned(),
        ]
        .map(OsString::from),
    );
    args.push(out.as_os_str().to_owned());
    args
}

/// Create the parent directory of `path` if needed and return it.
pub fn ensure_parent_dir(path: &Path) -> MixerResult<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    use anyhow::Context as _;
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    Ok(parent)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
