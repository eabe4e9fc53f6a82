use thiserror::Error;

use crate::types::{GeneratorKind, UserId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("context initialization failed: {0}")]
    InitFailed(String),

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("{kind:?} generator is not part of this session")]
    GeneratorUnavailable { kind: GeneratorKind },

    #[error("device update failed: {0}")]
    UpdateFailed(String),

    #[error("device update failed {failures} consecutive times, last: {last}")]
    PersistentFailure { failures: u32, last: String },

    #[error("user {0:?} is not currently tracked")]
    NotTracking(UserId),

    #[error("device reported end of stream")]
    EndOfStream,

    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}
