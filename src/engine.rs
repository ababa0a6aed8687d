//! Pipeline orchestration and the caller-facing operations.
//!
//! [`Engine`] owns the configuration, the session namespace, and the two
//! external capabilities, and exposes the full surface:
//! `index_repository`, `index_local`, `ask`, `run_audit`,
//! `reset_session`.
//!
//! Indexing is a staged, one-shot batch job:
//! acquire → select → chunk → embed → build. A failure at any stage tears
//! the session down before the error propagates, so a session is either
//! fully indexed (`ready` marker committed) or gone, never
//! empty-but-queryable. Because the session id is only returned after the
//! build commits, no query can race a build for the same session; queries
//! are read-only and may run concurrently.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::acquire;
use crate::audit;
use crate::chain;
use crate::chunk::chunk_file;
use crate::config::{self, Config};
use crate::embedding::{Embedder, HttpEmbedder};
use crate::error::{Error, Result};
use crate::generation::{Generator, HttpGenerator};
use crate::index::{self, IndexStatus};
use crate::models::{Answer, Chunk, IndexReport};
use crate::select::select_files;
use crate::session::{SessionId, SessionManager};

pub struct Engine {
    config: Config,
    sessions: SessionManager,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl Engine {
    /// Build an engine with the HTTP-backed capability providers.
    pub fn new(config: Config) -> Result<Self> {
        let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
        let generator = Arc::new(HttpGenerator::new(&config.generation)?);
        Self::with_providers(config, embedder, generator)
    }

    /// Build an engine with injected capabilities (alternate backends,
    /// deterministic providers in tests).
    pub fn with_providers(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config::validate(&config)?;
        let sessions = SessionManager::new(config.storage.root.clone());
        Ok(Self {
            config,
            sessions,
            embedder,
            generator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquire a remote repository and index it under a fresh session.
    pub async fn index_repository(&self, url: &str) -> Result<IndexReport> {
        let session = self.sessions.create();
        let paths = self.sessions.paths_for(&session);
        let timeout = Duration::from_secs(self.config.indexing.clone_timeout_secs);

        if let Err(e) = acquire::acquire(url, &paths.work_tree, timeout).await {
            self.sessions.teardown(&session);
            return Err(e);
        }

        self.index_tree(session, &paths.work_tree).await
    }

    /// Index an already-materialized local tree under a fresh session.
    /// Runs the identical select → chunk → embed → build stages.
    pub async fn index_local(&self, root: &Path) -> Result<IndexReport> {
        if !root.is_dir() {
            return Err(Error::InvalidUrl {
                url: root.display().to_string(),
                reason: "local path does not exist or is not a directory".to_string(),
            });
        }
        let session = self.sessions.create();
        self.index_tree(session, root).await
    }

    async fn index_tree(&self, session: SessionId, root: &Path) -> Result<IndexReport> {
        match self.index_tree_inner(&session, root).await {
            Ok(report) => Ok(report),
            Err(e) => {
                // Abort leaves no partially usable session behind.
                self.sessions.teardown(&session);
                Err(e)
            }
        }
    }

    async fn index_tree_inner(&self, session: &SessionId, root: &Path) -> Result<IndexReport> {
        let (files, report) = select_files(root, &self.config.indexing)?;

        if files.is_empty() {
            return Err(Error::NoMatchingFiles {
                root: root.to_path_buf(),
                extensions: self.config.indexing.extensions.join(", "),
            });
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        for file in &files {
            chunks.extend(chunk_file(
                file,
                self.config.indexing.max_chunk_size,
                self.config.indexing.chunk_overlap,
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::EmbeddingService(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let entries: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();

        let paths = self.sessions.paths_for(session);
        let pool = index::open(&paths.index_store).await?;
        let built = index::build(
            &pool,
            session.as_str(),
            &entries,
            self.embedder.model_name(),
            self.embedder.dims(),
        )
        .await;
        pool.close().await;
        built?;

        Ok(IndexReport {
            session: session.clone(),
            files_indexed: files.len(),
            chunks_indexed: entries.len(),
            files_skipped: report.skipped_binary + report.skipped_empty,
        })
    }

    /// Answer a question against a session's index.
    pub async fn ask(&self, session: &SessionId, question: &str) -> Result<Answer> {
        let paths = self.ready_paths(session).await?;
        chain::answer(
            self.embedder.as_ref(),
            self.generator.as_ref(),
            &paths.index_store,
            session.as_str(),
            &self.config,
            question,
        )
        .await
    }

    /// Run the fixed structured audit against a session's index.
    pub async fn run_audit(&self, session: &SessionId) -> Result<Answer> {
        let paths = self.ready_paths(session).await?;
        audit::run_audit(
            self.embedder.as_ref(),
            self.generator.as_ref(),
            &paths.index_store,
            session.as_str(),
            &self.config,
        )
        .await
    }

    /// Remove a session's working tree and index store. Idempotent.
    pub fn reset_session(&self, session: &SessionId) {
        self.sessions.teardown(session);
    }

    /// Fail fast unless the session's build has committed.
    async fn ready_paths(&self, session: &SessionId) -> Result<crate::session::SessionPaths> {
        let paths = self.sessions.paths_for(session);
        match index::status(&paths.index_store).await? {
            IndexStatus::Ready => Ok(paths),
            IndexStatus::Building | IndexStatus::Absent => {
                Err(Error::IndexNotReady(session.to_string()))
            }
        }
    }
}
