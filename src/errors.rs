//! Module for errors.
use std::{error::Error, fmt::Display};

/// Error from the request partitioning and archive resolution interface.
#[derive(Debug)]
pub enum ArgoDataErr {
    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    // Other forwarded errors
    /// Database error from the filter cache.
    Database(::rusqlite::Error),
    /// Error forwarded from the strum crate
    StrumError(strum::ParseError),
    /// Malformed file name pattern.
    GlobPattern(glob::PatternError),

    // My own errors from this crate
    /// Malformed identifier set or box.
    InvalidDomain(String),
    /// Malformed chunk counts or chunk sizes.
    InvalidChunkSpec(String),
    /// No file in the archive for the requested identifier, cycle or index entry.
    FileNotFound(String),
    /// The position index is missing or unreadable.
    IndexUnavailable(String),
    /// The archive root does not look like a GDAC mirror.
    InvalidArchiveRoot(String),
    /// The cache database structure is wrong.
    InvalidSchema,
    /// There was an internal logic error.
    LogicError(&'static str),
}

impl Display for ArgoDataErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::ArgoDataErr::*;

        match self {
            IO(err) => write!(f, "std lib io error: {}", err),

            Database(err) => write!(f, "database error: {}", err),
            StrumError(err) => write!(f, "error forwarded from strum crate: {}", err),
            GlobPattern(err) => write!(f, "invalid file name pattern: {}", err),

            InvalidDomain(msg) => write!(f, "invalid domain: {}", msg),
            InvalidChunkSpec(msg) => write!(f, "invalid chunk specification: {}", msg),
            FileNotFound(what) => write!(f, "no file found in the archive for: {}", what),
            IndexUnavailable(path) => write!(f, "position index unavailable: {}", path),
            InvalidArchiveRoot(path) => write!(f, "not a valid archive root: {}", path),
            InvalidSchema => write!(f, "invalid cache format"),
            LogicError(msg) => write!(f, "internal logic error: {}", msg),
        }
    }
}

impl Error for ArgoDataErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArgoDataErr::IO(err) => Some(err),
            ArgoDataErr::Database(err) => Some(err),
            ArgoDataErr::StrumError(err) => Some(err),
            ArgoDataErr::GlobPattern(err) => Some(err),
            _ => None,
        }
    }
}

impl From<::std::io::Error> for ArgoDataErr {
    fn from(err: ::std::io::Error) -> ArgoDataErr {
        ArgoDataErr::IO(err)
    }
}

impl From<::rusqlite::Error> for ArgoDataErr {
    fn from(err: ::rusqlite::Error) -> ArgoDataErr {
        ArgoDataErr::Database(err)
    }
}

impl From<strum::ParseError> for ArgoDataErr {
    fn from(err: strum::ParseError) -> ArgoDataErr {
        ArgoDataErr::StrumError(err)
    }
}

impl From<glob::PatternError> for ArgoDataErr {
    fn from(err: glob::PatternError) -> ArgoDataErr {
        ArgoDataErr::GlobPattern(err)
    }
}
