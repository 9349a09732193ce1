use thiserror::Error;

/// Validation-level errors raised by value-type constructors. I/O and
/// database errors live in `cinesync_core::Error`, one layer up.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid media type: {0}")]
    InvalidMediaType(String),

    #[error("invalid processing status: {0}")]
    InvalidProcessingStatus(String),

    #[error("invalid service type: {0}")]
    InvalidServiceType(String),
}

pub type Result<T> = std::result::Result<T, Error>;
