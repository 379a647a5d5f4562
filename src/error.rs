//! Error kinds shared by every layer of the codec.
//!
//! These map 1:1 onto the error kinds a caller needs to distinguish:
//! a bad syscall, a malformed on-disk structure, a codec that rejected
//! input, a write issued out of the prescribed region order, an invalid
//! module id, or an allocation failure.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed log: {0}")]
    Format(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("region write order violated: wrote region {attempted} after region {current}")]
    Ordering { current: i32, attempted: i32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource allocation failed: {0}")]
    Resource(String),
}

pub type LogResult<T> = Result<T, LogError>;
