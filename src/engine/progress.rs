use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::foundation::error::{ErrorKind, MixerError};

/// Phase of a single merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Probing,
    Aligning,
    Rendering,
    Encoding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Probing => "probing",
            Self::Aligning => "aligning",
            Self::Rendering => "rendering",
            Self::Encoding => "encoding",
        };
        f.write_str(name)
    }
}

/// Terminal result of one pair.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum PairOutcome {
    Success { output_path: PathBuf },
    Failure { kind: ErrorKind, message: String },
}

impl PairOutcome {
    pub fn from_result(result: &Result<PathBuf, MixerError>) -> Self {
        match result {
            Ok(path) => Self::Success {
                output_path: path.clone(),
            },
            Err(e) => Self::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Everything a batch tells its caller, in order.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum ProgressEvent {
    PairStarted {
        index: usize,
        total: usize,
        audio: PathBuf,
        visual: PathBuf,
    },
    Stage {
        index: usize,
        stage: Stage,
        /// In [0, 1].
        fraction: f64,
    },
    Finished {
        index: usize,
        outcome: PairOutcome,
    },
    BatchFinished {
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },
}

/// Sends stage events for one pair. Never blocks; a dropped receiver is ignored.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: Option<Sender<ProgressEvent>>,
    index: usize,
}

impl ProgressReporter {
    pub fn new(tx: Sender<ProgressEvent>, index: usize) -> Self {
        Self {
            tx: Some(tx),
            index,
        }
    }

    /// Reporter that drops every event.
    pub fn silent() -> Self {
        Self { tx: None, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stage(&self, stage: Stage, fraction: f64) {
        self.send(ProgressEvent::Stage {
            index: self.index,
            stage,
            fraction: fraction.clamp(0.0, 1.0),
        });
    }

    pub(crate) fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
