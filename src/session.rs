//! Session allocation and teardown.
//!
//! A session binds one repository's working tree and vector index together
//! under one identifier. All per-session state lives in two directories
//! derived purely from the id, so two sessions can never share paths and
//! removing the directories removes every trace of the session.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque unique session token (UUID v4 under the hood).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    /// Parse a caller-supplied session id. Only canonical UUIDs are
    /// accepted so a mistyped id cannot resolve to an arbitrary path
    /// under the storage root.
    fn from_str(s: &str) -> Result<Self> {
        let parsed = Uuid::parse_str(s)
            .map_err(|_| Error::IndexNotReady(s.to_string()))?;
        Ok(Self(parsed.to_string()))
    }
}

/// The two on-disk locations owned by a session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    /// Where the acquired repository is materialized.
    pub work_tree: PathBuf,
    /// Where the session's vector index store lives.
    pub index_store: PathBuf,
}

/// Allocates session ids and maps them to their on-disk locations.
#[derive(Debug, Clone)]
pub struct SessionManager {
    root: PathBuf,
}

impl SessionManager {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Allocate a fresh session id. Ids are random UUIDs, unique for the
    /// process lifetime with negligible collision probability.
    pub fn create(&self) -> SessionId {
        SessionId::new()
    }

    /// Pure, deterministic mapping from id to paths. Distinct ids always
    /// resolve to disjoint directories.
    pub fn paths_for(&self, id: &SessionId) -> SessionPaths {
        let base = self.root.join(id.as_str());
        SessionPaths {
            work_tree: base.join("worktree"),
            index_store: base.join("index"),
        }
    }

    /// Remove both of a session's directories. Idempotent: calling this on
    /// an already-removed or never-materialized session is not an error.
    pub fn teardown(&self, id: &SessionId) {
        let base = self.root.join(id.as_str());
        if let Err(e) = std::fs::remove_dir_all(&base) {
            if e.kind() != std::io::ErrorKind::NotFound {
                eprintln!("Warning: teardown of session {} incomplete: {}", id, e);
            }
        }
    }
}
