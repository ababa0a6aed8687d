//! # repoquery
//!
//! Retrieval-augmented question answering and auditing for source
//! repositories.
//!
//! repoquery turns a public repository into a queryable knowledge base:
//! it clones the repository into a session-scoped working tree, chunks
//! its source files along syntactic boundaries, embeds the chunks, and
//! stores them in a per-session vector index. Questions (and the fixed
//! audit) are answered by retrieving the most similar chunks and invoking
//! a generation model with a prompt grounded in exactly those chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌────────┐   ┌─────────────┐   ┌─────────┐   ┌────────┐
//! │ acquire │──▶│ select │──▶│   chunk     │──▶│  embed  │──▶│ SQLite │
//! │ (clone) │   │ (walk) │   │ (code-aware)│   │ (batch) │   │ vectors│
//! └─────────┘   └────────┘   └─────────────┘   └─────────┘   └───┬────┘
//!                                                                │
//!                              question / audit ──▶ embed ───────┤
//!                                                                ▼
//!                                              top-k retrieve ─▶ grounded
//!                                                                prompt ─▶ answer
//! ```
//!
//! Each indexing request gets its own session: one working tree, one
//! vector store, both removed on reset. Sessions never share state.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Failure taxonomy |
//! | [`models`] | Core data types |
//! | [`session`] | Session ids, path namespace, teardown |
//! | [`acquire`] | Shallow repository cloning |
//! | [`select`] | Working-tree file selection |
//! | [`chunk`] | Code-aware chunking |
//! | [`embedding`] | Embedding capability and vector utilities |
//! | [`generation`] | Text-generation capability |
//! | [`index`] | Per-session vector index |
//! | [`chain`] | Retrieval-augmented answer chain |
//! | [`audit`] | Structured audit orchestration |
//! | [`engine`] | Staged pipeline and caller-facing operations |

pub mod acquire;
pub mod audit;
pub mod chain;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod select;
pub mod session;

pub use engine::Engine;
pub use error::{Error, Result};
pub use models::{Answer, IndexReport, Retrieved};
pub use session::SessionId;
