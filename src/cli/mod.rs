pub mod command;
pub mod info;
pub mod select;

/// A frame that stopped a `--strict` run.
#[derive(Debug, thiserror::Error)]
#[error("Frame {index} at offset {offset}: {message}")]
pub struct StrictFailure {
    pub index: usize,
    pub offset: u64,
    pub message: String,
}
