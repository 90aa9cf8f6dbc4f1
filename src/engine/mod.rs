pub(crate) mod merge;
pub(crate) mod progress;
