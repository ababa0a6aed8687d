//! Per-session vector index over SQLite.
//!
//! Each session owns one store file (`index.sqlite` under the session's
//! index directory) holding the indexed chunks, their embedding vectors,
//! and a single metadata row. The metadata row's `status` is written in
//! the same transaction as the bulk load, so "is this session queryable"
//! is a checkable fact rather than an implicit assumption: a crashed or
//! aborted build leaves no `ready` marker behind.
//!
//! Similarity is cosine, applied identically at build and query time.
//! Query results are ordered by descending similarity with ties broken by
//! insertion (rowid) order.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{Chunk, Retrieved};

const STORE_FILE: &str = "index.sqlite";

/// Readiness of a session's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// Store exists and a build committed successfully.
    Ready,
    /// Store exists but no build has committed (in progress or aborted).
    Building,
    /// No store on disk.
    Absent,
}

pub fn store_path(index_store: &Path) -> std::path::PathBuf {
    index_store.join(STORE_FILE)
}

/// Open (creating if missing) a session's store and ensure its schema.
pub async fn open(index_store: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(index_store)?;
    let path = store_path(index_store);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(Error::Db)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            rowid INTEGER PRIMARY KEY,
            path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(path, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            chunk_rowid INTEGER PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_rowid) REFERENCES chunks(rowid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            built_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Bulk-load a session's index, replacing any prior content (idempotent
/// re-index). The `ready` marker is committed atomically with the data.
pub async fn build(
    pool: &SqlitePool,
    session: &str,
    entries: &[(Chunk, Vec<f32>)],
    model: &str,
    dims: usize,
) -> Result<()> {
    for (chunk, vector) in entries {
        if vector.len() != dims {
            return Err(Error::IndexCorruption {
                session: session.to_string(),
                detail: format!(
                    "embedding for {}#{} has {} dims, index expects {}",
                    chunk.path,
                    chunk.chunk_index,
                    vector.len(),
                    dims
                ),
            });
        }
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM vectors").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

    for (chunk, vector) in entries {
        let row = sqlx::query(
            r#"
            INSERT INTO chunks (path, chunk_index, text, start_line, end_line, hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.path)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.start_line)
        .bind(chunk.end_line)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO vectors (chunk_rowid, embedding) VALUES (?, ?)")
            .bind(row.last_insert_rowid())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
    }

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO index_meta (id, status, model, dims, built_at)
        VALUES (1, 'ready', ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            model = excluded.model,
            dims = excluded.dims,
            built_at = excluded.built_at
        "#,
    )
    .bind(model)
    .bind(dims as i64)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Report a session's store readiness without requiring it to exist.
pub async fn status(index_store: &Path) -> Result<IndexStatus> {
    if !store_path(index_store).exists() {
        return Ok(IndexStatus::Absent);
    }

    let pool = open(index_store).await?;
    let row: Option<String> = sqlx::query_scalar("SELECT status FROM index_meta WHERE id = 1")
        .fetch_optional(&pool)
        .await?;
    pool.close().await;

    match row.as_deref() {
        Some("ready") => Ok(IndexStatus::Ready),
        _ => Ok(IndexStatus::Building),
    }
}

/// Nearest-neighbor query: the `k` stored chunks most similar to
/// `query_vec`. Fewer than `k` entries exist → all of them, in order. A
/// missing or never-built store yields an empty result, not an error; a
/// store whose recorded dimensionality disagrees with the query vector is
/// corrupt.
pub async fn query(
    index_store: &Path,
    session: &str,
    query_vec: &[f32],
    k: usize,
) -> Result<Vec<Retrieved>> {
    if !store_path(index_store).exists() {
        return Ok(Vec::new());
    }

    let pool = open(index_store).await?;
    let result = query_pool(&pool, session, query_vec, k).await;
    pool.close().await;
    result
}

async fn query_pool(
    pool: &SqlitePool,
    session: &str,
    query_vec: &[f32],
    k: usize,
) -> Result<Vec<Retrieved>> {
    let meta: Option<(String, i64)> =
        sqlx::query_as("SELECT model, dims FROM index_meta WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    let dims = match meta {
        Some((_, dims)) => dims as usize,
        None => return Ok(Vec::new()),
    };

    if query_vec.len() != dims {
        return Err(Error::IndexCorruption {
            session: session.to_string(),
            detail: format!(
                "query vector has {} dims, store was built with {}",
                query_vec.len(),
                dims
            ),
        });
    }

    // Insertion order via rowid keeps ties stable.
    let rows = sqlx::query(
        r#"
        SELECT c.path, c.chunk_index, c.text, c.start_line, c.end_line, c.hash, v.embedding
        FROM chunks c
        JOIN vectors v ON v.chunk_rowid = c.rowid
        ORDER BY c.rowid
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut scored: Vec<Retrieved> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            let score = cosine_similarity(query_vec, &vector);
            Retrieved {
                chunk: Chunk {
                    path: row.get("path"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    start_line: row.get("start_line"),
                    end_line: row.get("end_line"),
                    hash: row.get("hash"),
                },
                score,
            }
        })
        .collect();

    // sort_by is stable: equal scores keep rowid order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    fn chunk(path: &str, index: i64, text: &str) -> Chunk {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Chunk {
            path: path.to_string(),
            chunk_index: index,
            text: text.to_string(),
            start_line: 1,
            end_line: 1,
            hash: format!("{:x}", hasher.finalize()),
        }
    }

    #[tokio::test]
    async fn test_build_then_query_orders_by_similarity() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            (chunk("a.py", 0, "alpha"), vec![1.0, 0.0, 0.0]),
            (chunk("b.py", 0, "beta"), vec![0.0, 1.0, 0.0]),
            (chunk("c.py", 0, "gamma"), vec![0.9, 0.1, 0.0]),
        ];

        let pool = open(tmp.path()).await.unwrap();
        build(&pool, "s1", &entries, "test-model", 3).await.unwrap();
        pool.close().await;

        let results = query(tmp.path(), "s1", &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.path, "a.py");
        assert_eq!(results[1].chunk.path, "c.py");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_query_fewer_than_k_returns_all() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![(chunk("only.py", 0, "just one"), vec![0.5, 0.5])];

        let pool = open(tmp.path()).await.unwrap();
        build(&pool, "s1", &entries, "test-model", 2).await.unwrap();
        pool.close().await;

        let results = query(tmp.path(), "s1", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_store_empty_result() {
        let tmp = TempDir::new().unwrap();
        let results = query(tmp.path(), "s1", &[1.0, 0.0], 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_dims_mismatch_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![(chunk("a.py", 0, "alpha"), vec![1.0, 0.0, 0.0])];

        let pool = open(tmp.path()).await.unwrap();
        build(&pool, "s1", &entries, "test-model", 3).await.unwrap();
        pool.close().await;

        let err = query(tmp.path(), "s1", &[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, Error::IndexCorruption { .. }));
    }

    #[tokio::test]
    async fn test_build_rejects_mixed_dims() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            (chunk("a.py", 0, "alpha"), vec![1.0, 0.0, 0.0]),
            (chunk("b.py", 0, "beta"), vec![0.0, 1.0]),
        ];

        let pool = open(tmp.path()).await.unwrap();
        let err = build(&pool, "s1", &entries, "test-model", 3).await.unwrap_err();
        assert!(matches!(err, Error::IndexCorruption { .. }));
        pool.close().await;

        // Failed build leaves no ready marker.
        assert_eq!(status(tmp.path()).await.unwrap(), IndexStatus::Building);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            (chunk("a.py", 0, "alpha"), vec![1.0, 0.0]),
            (chunk("b.py", 0, "beta"), vec![0.0, 1.0]),
        ];

        let pool = open(tmp.path()).await.unwrap();
        build(&pool, "s1", &entries, "test-model", 2).await.unwrap();
        let first = query_pool(&pool, "s1", &[0.7, 0.3], 5).await.unwrap();
        build(&pool, "s1", &entries, "test-model", 2).await.unwrap();
        let second = query_pool(&pool, "s1", &[0.7, 0.3], 5).await.unwrap();
        pool.close().await;

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.chunk.path, b.chunk.path);
            assert_eq!(a.chunk.text, b.chunk.text);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(status(tmp.path()).await.unwrap(), IndexStatus::Absent);

        let pool = open(tmp.path()).await.unwrap();
        pool.close().await;
        assert_eq!(status(tmp.path()).await.unwrap(), IndexStatus::Building);

        let pool = open(tmp.path()).await.unwrap();
        build(&pool, "s1", &[], "test-model", 2).await.unwrap();
        pool.close().await;
        assert_eq!(status(tmp.path()).await.unwrap(), IndexStatus::Ready);
    }

    #[tokio::test]
    async fn test_stable_tie_order() {
        let tmp = TempDir::new().unwrap();
        // Identical vectors: scores tie exactly; insertion order must hold.
        let entries = vec![
            (chunk("first.py", 0, "one"), vec![1.0, 0.0]),
            (chunk("second.py", 0, "two"), vec![1.0, 0.0]),
            (chunk("third.py", 0, "three"), vec![1.0, 0.0]),
        ];

        let pool = open(tmp.path()).await.unwrap();
        build(&pool, "s1", &entries, "test-model", 2).await.unwrap();
        pool.close().await;

        let results = query(tmp.path(), "s1", &[1.0, 0.0], 3).await.unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.chunk.path.as_str()).collect();
        assert_eq!(paths, vec!["first.py", "second.py", "third.py"]);
    }
}
