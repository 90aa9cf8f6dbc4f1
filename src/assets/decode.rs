use std::ffi::OsString;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::Context as _;

use crate::config::Toolchain;
use crate::foundation::core::Fps;
use crate::foundation::error::{MixerError, MixerResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Decoded still picture.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Vec<u8>,
}

/// Decoded mono floating-point PCM.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Mono `f32` samples in [-1, 1].
    pub samples: Vec<f32>,
}

impl AudioPcm {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate.max(1))
    }
}

pub fn decode_image(path: &Path) -> MixerResult<PreparedImage> {
    let bytes = std::fs::read(path)
        .map_err(|e| MixerError::unreadable(path, format!("failed to read image: {e}")))?;
    decode_image_bytes(&bytes).map_err(|e| MixerError::unreadable(path, e.to_string()))
}

pub fn decode_image_bytes(bytes: &[u8]) -> MixerResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul,
    })
}

/// Decode the first audio stream of `path` to mono `f32` PCM at `sample_rate`.
pub fn decode_audio_mono_f32(
    path: &Path,
    sample_rate: u32,
    tools: &Toolchain,
) -> MixerResult<AudioPcm> {
    if sample_rate == 0 {
        return Err(MixerError::audio_analysis("sample_rate must be non-zero"));
    }

    let out = Command::new(&tools.ffmpeg)
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| {
            MixerError::audio_analysis(format!("failed to run ffmpeg for audio decode: {e}"))
        })?;

    if !out.status.success() {
        return Err(MixerError::audio_analysis(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(MixerError::audio_analysis(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let samples: Vec<f32> = out
        .stdout
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]).clamp(-1.0, 1.0))
        .collect();
    if samples.is_empty() {
        return Err(MixerError::audio_analysis(format!(
            "no audio samples decoded from '{}'",
            path.display()
        )));
    }

    Ok(AudioPcm {
        sample_rate,
        samples,
    })
}

/// Streams a video's frames as RGBA8, scaled by ffmpeg to `width`x`height`.
///
/// ffmpeg resamples the video to a constant `fps` (duplicating or dropping frames), so frame
/// `n` always shows source time `n / fps` whatever the container's own timing.
/// [`VideoFrameReader::restart`] respawns the decoder at the first frame, which is how loops
/// are played.
pub struct VideoFrameReader {
    path: PathBuf,
    ffmpeg: PathBuf,
    width: u32,
    height: u32,
    fps: Fps,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    frames_read: u64,
}

impl VideoFrameReader {
    pub fn open(
        path: &Path,
        tools: &Toolchain,
        width: u32,
        height: u32,
        fps: Fps,
    ) -> MixerResult<Self> {
        if width == 0 || height == 0 {
            return Err(MixerError::validation(
                "video reader width/height must be non-zero",
            ));
        }
        let mut reader = Self {
            path: path.to_path_buf(),
            ffmpeg: tools.ffmpeg.clone(),
            width,
            height,
            fps,
            child: None,
            stdout: None,
            stderr_drain: None,
            frames_read: 0,
        };
        reader.spawn()?;
        Ok(reader)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Constant rate the decoder emits frames at.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Frames delivered since the last (re)start.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn spawn(&mut self) -> MixerResult<()> {
        let args = video_decode_args(&self.path, self.width, self.height, self.fps);
        tracing::debug!(path = %self.path.display(), ?args, "spawning video decoder");

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MixerError::unreadable(&self.path, format!("failed to spawn ffmpeg decoder: {e}"))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MixerError::unreadable(&self.path, "failed to open ffmpeg stdout (unexpected)")
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            MixerError::unreadable(&self.path, "failed to open ffmpeg stderr (unexpected)")
        })?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.stdout = Some(BufReader::with_capacity(self.frame_len() * 2, stdout));
        self.child = Some(child);
        self.stderr_drain = Some(stderr_drain);
        self.frames_read = 0;
        Ok(())
    }

    /// Read the next frame into `buf`. Returns `false` once the stream is exhausted.
    pub fn read_frame(&mut self, buf: &mut Vec<u8>) -> MixerResult<bool> {
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(false);
        };
        buf.resize(frame_len, 0);
        match stdout.read_exact(buf) {
            Ok(()) => {
                premultiply_rgba8_in_place(buf);
                self.frames_read += 1;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish_stream()?;
                Ok(false)
            }
            Err(e) => Err(MixerError::unreadable(
                &self.path,
                format!("failed to read decoded frame: {e}"),
            )),
        }
    }

    /// Kill the current decoder (if any) and start again from the first frame.
    pub fn restart(&mut self) -> MixerResult<()> {
        self.kill();
        self.spawn()
    }

    fn finish_stream(&mut self) -> MixerResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().context("wait for ffmpeg video decoder")?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle.join().ok().and_then(|r| r.ok()).unwrap_or_default(),
            None => Vec::new(),
        };
        if !status.success() && self.frames_read == 0 {
            return Err(MixerError::unreadable(
                &self.path,
                format!(
                    "ffmpeg video decode failed with status {status}: {}",
                    String::from_utf8_lossy(&stderr_bytes).trim()
                ),
            ));
        }
        if self.frames_read == 0 {
            return Err(MixerError::unreadable(&self.path, "video produced no frames"));
        }
        Ok(())
    }

    fn kill(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

/// ffmpeg arguments decoding `path` to raw RGBA at a constant `fps` and `width`x`height`.
pub(crate) fn video_decode_args(path: &Path, width: u32, height: u32, fps: Fps) -> Vec<OsString> {
    let filter = format!("fps={fps},scale={width}:{height}:flags=lanczos,setsar=1");
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    let tail = ["-an", "-sn", "-vf", &filter, "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"];
    args.extend(tail.map(OsString::from));
    args
}

impl Drop for VideoFrameReader {
    fn drop(&mut self) {
        self.kill();
    }
}
