use std::path::{Path, PathBuf};

pub type MixerResult<T> = Result<T, MixerError>;

#[derive(thiserror::Error, Debug)]
pub enum MixerError {
    #[error("unreadable media '{}': {reason}", path.display())]
    UnreadableMedia { path: PathBuf, reason: String },

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("audio analysis error: {0}")]
    AudioAnalysis(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fieldless mirror of [`MixerError`] carried by failure events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    UnreadableMedia,
    InvalidDuration,
    AudioAnalysis,
    Encoding,
    Cancelled,
    Validation,
    Other,
}

impl MixerError {
    pub fn unreadable(path: &Path, reason: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn invalid_duration(msg: impl Into<String>) -> Self {
        Self::InvalidDuration(msg.into())
    }

    pub fn audio_analysis(msg: impl Into<String>) -> Self {
        Self::AudioAnalysis(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnreadableMedia { .. } => ErrorKind::UnreadableMedia,
            Self::InvalidDuration(_) => ErrorKind::InvalidDuration,
            Self::AudioAnalysis(_) => ErrorKind::AudioAnalysis,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Bad inputs stay bad: re-running a pair that failed probing or planning cannot succeed.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            Self::UnreadableMedia { .. } | Self::InvalidDuration(_) | Self::Validation(_)
        )
    }
}
