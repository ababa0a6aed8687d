//! Core data models used throughout repoquery.
//!
//! These types represent the source files, chunks, and retrieval results
//! that flow through the indexing and answer pipeline.

use serde::Serialize;

/// A selected source file: its path relative to the working-tree root and
/// its full text. Immutable after selection; only the chunker reads it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

/// A bounded, source-path-tagged span of file text: the unit of retrieval.
///
/// `text` is always an exact contiguous substring of the source file, and
/// `start_line`/`end_line` are 1-based inclusive line numbers of that span.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub path: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_line: i64,
    pub end_line: i64,
    pub hash: String,
}

/// A retrieved chunk paired with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieved {
    pub chunk: Chunk,
    pub score: f32,
}

/// Generated text paired with the exact chunks it was grounded on.
///
/// The pairing is the traceability guarantee: an answer is never presented
/// without the chunks that were placed in its prompt. `sources` is empty
/// only when the chain took the explicit no-context short circuit.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Retrieved>,
}

/// Per-file counts reported by the selector; skips are never hard failures.
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub selected: usize,
    pub skipped_binary: usize,
    pub skipped_empty: usize,
}

/// Summary of a completed indexing run.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub session: crate::session::SessionId,
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub files_skipped: usize,
}
