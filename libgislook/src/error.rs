use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libgislook` errors
pub enum Error {
    /// Header tokens are absent or malformed. The dispatcher treats this as
    /// "not this format" and moves on to the next candidate.
    #[error("not a {0}")]
    FormatMismatch(&'static str),
    /// The input ended before the payload was complete
    #[error("input is truncated")]
    Truncated,
    /// The file is recognised but uses a variant this crate does not decode
    #[error("unsupported variant: {0}")]
    Unsupported(String),
    /// The caller asked to abort the read
    #[error("read was cancelled")]
    Cancelled,
    /// A sibling path was requested for a path without a three character extension
    #[error("path has no three character extension: {0:?}")]
    NoExtension(PathBuf),
    /// The path exceeds the supported length
    #[error("path is {len} bytes long, the limit is {limit}")]
    PathTooLong {
        /// length of the rejected path in bytes
        len: usize,
        /// maximum accepted length in bytes
        limit: usize,
    },
    /// A text line exceeded the line bound
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// maximum accepted line length in bytes
        limit: usize,
    },
    /// The normalizer was handed a zero dimension or a buffer of the wrong length
    #[error("cannot build a {width}x{height} image from {len} bytes")]
    InvalidImage {
        /// requested width
        width: u32,
        /// requested height
        height: u32,
        /// length of the supplied buffer
        len: usize,
    },
    /// A vector extent is negative or too small to render
    #[error("vector extent is empty")]
    EmptyExtent,
    /// No raster reader accepted the file
    #[error("unknown raster format")]
    UnknownFormat,
    /// Any other I/O failure
    #[error("i/o error")]
    Io(#[source] io::Error),
}

impl Error {
    /// Returns true when the error only signals that the input is not of the probed format
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::FormatMismatch(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(err),
        }
    }
}

impl From<shapefile::Error> for Error {
    fn from(err: shapefile::Error) -> Self {
        match err {
            shapefile::Error::IoError(err) => err.into(),
            other => {
                tracing::debug!("shapefile error: {other}");
                Self::FormatMismatch("shapefile")
            }
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
