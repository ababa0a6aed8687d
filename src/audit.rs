//! Audit orchestration.
//!
//! The audit is a fixed, pre-authored query routed through the same
//! grounded-generation machinery as ad-hoc questions. A single top-k
//! retrieval is too narrow to cover a whole repository, so coverage is
//! widened by one retrieval pass per probe area; distinct chunks are
//! concatenated (deduplicated across passes) before one generation call.

use std::collections::HashSet;
use std::path::Path;

use crate::chain;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::generation::Generator;
use crate::index;
use crate::models::{Answer, Retrieved};

/// The fixed audit request handed to generation, demanding a report
/// structured by category.
const AUDIT_QUERY: &str = "Perform a complete audit of the code excerpts above. Produce a report \
with exactly these sections:\n\
1. Security Vulnerabilities: concrete flaws (injection, plaintext credentials, unsafe \
deserialization, path traversal), each with the file path and why it is exploitable.\n\
2. Refactoring Opportunities: duplicated or overly complex code worth restructuring.\n\
3. Best-Practice Violations: error handling, resource management, and API usage issues.\n\
List findings per section; if a section has none, say so. Never attribute a finding to a file \
that does not show the relevant code.";

/// Retrieval probes, one widened pass each. Phrased as content queries so
/// each pass lands in a different semantic neighborhood of the index.
const PROBES: &[&str] = &[
    "authentication login password secret token credentials",
    "sql query execute user input validation sanitize",
    "error handling exception try except raise",
    "file path open subprocess command shell os.system",
    "class function structure duplicated helper utility",
];

/// Run the audit for one session: probe retrievals, dedup, one grounded
/// generation call.
pub async fn run_audit(
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    index_store: &Path,
    session: &str,
    config: &Config,
) -> Result<Answer> {
    let mut passes = Vec::with_capacity(PROBES.len());
    for probe in PROBES {
        let query_vec = embedder.embed(probe).await?;
        passes.push(index::query(index_store, session, &query_vec, config.retrieval.audit_k).await?);
    }

    let retrieved = merge_passes(passes, config.retrieval.audit_max_chunks);
    chain::generate_grounded(generator, AUDIT_QUERY, retrieved).await
}

/// Merge retrieval passes: the first occurrence of each
/// `(path, chunk_index)` wins, total capped at `cap`.
fn merge_passes(passes: Vec<Vec<Retrieved>>, cap: usize) -> Vec<Retrieved> {
    let mut seen: HashSet<(String, i64)> = HashSet::new();
    let mut merged = Vec::new();

    for pass in passes {
        for r in pass {
            if merged.len() >= cap {
                return merged;
            }
            if seen.insert((r.chunk.path.clone(), r.chunk.chunk_index)) {
                merged.push(r);
            }
        }
    }
    merged
}
