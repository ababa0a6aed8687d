use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::IndexingConfig;
use crate::error::{Error, Result};
use crate::models::{SelectionReport, SourceFile};

/// Directories that never hold first-party source worth indexing.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/venv/**",
    "**/.venv/**",
    "**/__pycache__/**",
    "**/site-packages/**",
    "**/.tox/**",
];

/// Walk the working tree and select the files to index.
///
/// Files are filtered by the extension allow-list and the exclude globs.
/// Binary or empty files are skipped and counted in the report, never a
/// hard failure. Output is sorted by path so indexing is deterministic.
pub fn select_files(
    work_tree: &Path,
    config: &IndexingConfig,
) -> Result<(Vec<SourceFile>, SelectionReport)> {
    let exclude_set = build_excludes(config)?;

    let mut files = Vec::new();
    let mut report = SelectionReport::default();

    for entry in WalkDir::new(work_tree) {
        let entry = match entry {
            Ok(e) => e,
            // An unreadable subdirectory is skipped, not fatal.
            Err(e) => {
                eprintln!("Warning: skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(work_tree).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !has_allowed_extension(&rel_str, &config.extensions) {
            continue;
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Warning: could not read {}: {}", rel_str, e);
                report.skipped_binary += 1;
                continue;
            }
        };

        let text = match String::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                report.skipped_binary += 1;
                continue;
            }
        };

        if text.trim().is_empty() {
            report.skipped_empty += 1;
            continue;
        }

        files.push(SourceFile {
            path: rel_str,
            text,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    report.selected = files.len();

    Ok((files, report))
}

fn has_allowed_extension(path: &str, extensions: &[String]) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| e == ext),
        None => false,
    }
}

fn build_excludes(config: &IndexingConfig) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_EXCLUDES {
        builder.add(
            Glob::new(pattern).map_err(|e| Error::Config(format!("bad exclude glob: {}", e)))?,
        );
    }
    for pattern in &config.exclude_globs {
        builder.add(Glob::new(pattern).map_err(|e| {
            Error::Config(format!("bad indexing.exclude_globs entry '{}': {}", pattern, e))
        })?);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("could not compile exclude globs: {}", e)))
}
