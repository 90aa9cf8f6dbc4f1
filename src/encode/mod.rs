//! Frame sinks: the ffmpeg encoder and an in-memory sink, plus the loop that feeds them.

pub(crate) mod ffmpeg;
pub(crate) mod sink;
pub(crate) mod stream;
