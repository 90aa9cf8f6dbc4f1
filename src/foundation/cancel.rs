use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{MixerError, MixerResult};

/// Cooperative cancellation flag shared between a caller and a running merge.
///
/// Clones observe the same flag. The merge checks it between frames, while waiting on the
/// encoder, and before each queued pair.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(MixerError::Cancelled)` once cancelled.
    pub fn check(&self) -> MixerResult<()> {
        if self.is_cancelled() {
            Err(MixerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
