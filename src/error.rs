//! Error taxonomy for the indexing and retrieval pipeline.
//!
//! Every failure a caller can hit maps to a distinct variant with a
//! human-readable message, so "bad URL", "no source files found", and
//! "service unavailable" are always discoverable without string matching.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The URL is not a usable repository reference: malformed, wrong
    /// scheme, or the remote reports that no such repository exists.
    #[error("invalid repository URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The repository exists but cannot be cloned without credentials.
    #[error("repository '{url}' requires authentication; only public repositories can be indexed")]
    AuthRequired { url: String },

    /// Network-level failure reaching the remote (DNS, connect, timeout).
    #[error("could not reach repository '{url}': {detail}")]
    Unreachable { url: String, detail: String },

    /// The working tree could not be materialized on disk.
    #[error("failed to write working tree at {path}: {detail}")]
    DiskWrite { path: PathBuf, detail: String },

    /// Selection over the acquired tree produced zero indexable files.
    #[error("no matching source files found under {root} (extensions: {extensions})")]
    NoMatchingFiles { root: PathBuf, extensions: String },

    /// The embedding capability failed after bounded retries.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The generation capability failed after bounded retries.
    #[error("generation service error: {0}")]
    GenerationService(String),

    /// A query was issued against a session whose index was never built,
    /// failed to build, or has been torn down.
    #[error("session '{0}' is not indexed yet")]
    IndexNotReady(String),

    /// The session's store exists but is unusable (dimension mismatch,
    /// missing tables).
    #[error("vector index for session '{session}' is corrupt: {detail}")]
    IndexCorruption { session: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
