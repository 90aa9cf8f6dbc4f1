use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::MixerResult;
use crate::render::compositor::Compositor;

/// Drain `compositor` into `sink`, checking `cancel` before every frame.
///
/// `on_progress` receives the streamed fraction whenever it crosses a whole percent; it stays
/// below 1.0 because the sink may still be finishing. On any error the sink is aborted.
pub fn encode_stream(
    compositor: &mut Compositor<'_>,
    sink: &mut dyn FrameSink,
    cfg: SinkConfig,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(f64),
) -> MixerResult<u64> {
    cancel.check()?;
    sink.begin(cfg)?;
    match pump(compositor, sink, cancel, on_progress) {
        Ok(frames) => Ok(frames),
        Err(e) => {
            sink.abort();
            Err(e)
        }
    }
}

fn pump(
    compositor: &mut Compositor<'_>,
    sink: &mut dyn FrameSink,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(f64),
) -> MixerResult<u64> {
    let total = compositor.total_frames().max(1);
    let mut pushed = 0u64;
    let mut last_percent = 0u64;

    loop {
        cancel.check()?;
        let Some((idx, frame)) = compositor.next_frame()? else {
            break;
        };
        sink.push_frame(idx, frame)?;
        pushed += 1;

        let percent = (pushed * 100 / total).min(99);
        if percent > last_percent {
            last_percent = percent;
            on_progress(percent as f64 / 100.0);
        }
    }

    cancel.check()?;
    sink.end()?;
    Ok(pushed)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/stream.rs"]
mod tests;
