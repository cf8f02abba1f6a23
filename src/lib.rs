#![deny(missing_docs)]
//! Package to partition Argo float data requests and resolve them against a local copy of the
//! GDAC archive.
//!
//! A request is either a list of floats, optionally with cycle numbers, or a space/time box. The
//! [`partition`] function splits it into chunks, and a [`Resolver`] finds the files of every
//! chunk: by file name for floats, through the position index for boxes.

//
// Public API
//
pub use archive::{
    disambiguate, rules, FileCandidate, FileStore, LocalFileStore, Marker, PathResolver,
    ProfileTag, RequestShape, Rule,
};
pub use chunker::{partition, Axis, Chunk, ChunkCounts, ChunkSizes};
pub use config::{ArchiveConfig, DatasetKind, ErrorPolicy, ExecutionMode};
pub use domain::{parse_datetime, BoxDomain, Domain, IdentifierDomain, Interval, TimeRange};
pub use errors::ArgoDataErr;
pub use index::{
    CachedIndex, IndexBox, IndexCache, IndexRecord, IndexSource, OpenMax, TextIndex,
};
pub use resolve::{ChunkFiles, Resolver};

//
// Implementation only
//
mod archive;
mod chunker;
mod config;
mod domain;
mod errors;
mod index;
mod resolve;

#[cfg(feature = "pylib")]
mod py_lib;
