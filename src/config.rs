use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::foundation::error::{MixerError, MixerResult};
use crate::waveform::WaveformSpec;

/// External programs the engine shells out to.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// `ffmpeg` program name or path.
    pub ffmpeg: PathBuf,
    /// `ffprobe` program name or path.
    pub ffprobe: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Toolchain {
    /// Fail unless both `ffmpeg` and `ffprobe` answer `-version`.
    pub fn check(&self) -> MixerResult<()> {
        for program in [&self.ffmpeg, &self.ffprobe] {
            if !runs_version(program) {
                return Err(MixerError::validation(format!(
                    "'{}' is required but could not be run (is it installed and on PATH?)",
                    program.display()
                )));
            }
        }
        Ok(())
    }

    /// Return `true` when both tools can be invoked.
    pub fn is_available(&self) -> bool {
        runs_version(&self.ffmpeg) && runs_version(&self.ffprobe)
    }
}

fn runs_version(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// User-level settings, loadable from a JSON file. Every field has a default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub tools: Toolchain,
    pub waveform: WaveformSpec,
    /// Folder created inside the input directory for batch results.
    pub results_folder: String,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            tools: Toolchain::default(),
            waveform: WaveformSpec::default(),
            results_folder: "__results".to_owned(),
        }
    }
}

impl MixerConfig {
    pub fn from_path(path: &Path) -> MixerResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> MixerResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| MixerError::validation(format!("config parse failed: {e}")))
    }
}
