//! # repoquery CLI (`repoq`)
//!
//! The `repoq` binary drives the indexing and retrieval pipeline from the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! repoq --config ./config/repoq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repoq index <url>` | Clone and index a public repository, print the session id |
//! | `repoq local <path>` | Index an already-checked-out local tree |
//! | `repoq ask <session> "<question>"` | Answer a question grounded in the indexed code |
//! | `repoq audit <session>` | Run the structured security/quality audit |
//! | `repoq reset <session>` | Remove a session's working tree and index |
//!
//! ## Examples
//!
//! ```bash
//! # Index a repository
//! repoq index https://github.com/streamlit/streamlit-example
//!
//! # Ask about it
//! repoq ask 7c0e... "how does the login flow work"
//!
//! # Full audit report
//! repoq audit 7c0e...
//! ```
//!
//! The embedding and generation services are reached through the
//! `OPENAI_API_KEY` environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repoquery::config::{self, Config};
use repoquery::models::Answer;
use repoquery::session::SessionId;
use repoquery::Engine;

/// repoquery: retrieval-augmented question answering and auditing for
/// source repositories.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; when the file is absent the documented defaults apply.
#[derive(Parser)]
#[command(
    name = "repoq",
    about = "Index a public repository and ask grounded questions about its code",
    version,
    long_about = "repoquery clones a public repository into an isolated session, builds a \
    per-session vector index over its source files, and answers natural-language questions \
    (or produces a structured audit) grounded in retrieved code chunks."
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file = defaults.
    #[arg(long, global = true, default_value = "./config/repoq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Clone and index a public repository.
    ///
    /// Runs the full pipeline (clone, select, chunk, embed, build) and
    /// prints the session id to use with `ask`, `audit`, and `reset`.
    Index {
        /// HTTPS URL of a public repository.
        url: String,
    },

    /// Index an already-materialized local tree.
    ///
    /// Same pipeline as `index`, minus the clone.
    Local {
        /// Path to the tree to index.
        path: PathBuf,
    },

    /// Ask a question about an indexed session.
    ///
    /// Prints the generated answer followed by the source chunks it was
    /// grounded on.
    Ask {
        /// Session id printed by `index`.
        session: String,
        /// The question to answer.
        question: String,
    },

    /// Run the structured security/quality audit.
    ///
    /// Retrieves broadly across the indexed codebase and prints a report
    /// with Security Vulnerabilities, Refactoring Opportunities, and
    /// Best-Practice Violations sections.
    Audit {
        /// Session id printed by `index`.
        session: String,
    },

    /// Remove a session's working tree and vector index.
    ///
    /// Idempotent: resetting an unknown or already-reset session is safe.
    Reset {
        /// Session id printed by `index`.
        session: String,
    },
}

fn load_or_default(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        Ok(config::load_config(path)?)
    } else {
        Ok(Config::default())
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim_end());
    println!();
    if answer.sources.is_empty() {
        println!("(no supporting chunks; nothing relevant was retrieved)");
        return;
    }
    println!("sources ({} chunks):", answer.sources.len());
    for (i, r) in answer.sources.iter().enumerate() {
        println!(
            "  {}. [{:.3}] {} (lines {}-{})",
            i + 1,
            r.score,
            r.chunk.path,
            r.chunk.start_line,
            r.chunk.end_line
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Index { url } => {
            let engine = Engine::new(cfg)?;
            let report = engine.index_repository(&url).await?;
            println!("index {}", url);
            println!("  files indexed: {}", report.files_indexed);
            println!("  chunks indexed: {}", report.chunks_indexed);
            if report.files_skipped > 0 {
                println!("  files skipped: {}", report.files_skipped);
            }
            println!("  session: {}", report.session);
            println!("ok");
        }
        Commands::Local { path } => {
            let engine = Engine::new(cfg)?;
            let report = engine.index_local(&path).await?;
            println!("index {}", path.display());
            println!("  files indexed: {}", report.files_indexed);
            println!("  chunks indexed: {}", report.chunks_indexed);
            if report.files_skipped > 0 {
                println!("  files skipped: {}", report.files_skipped);
            }
            println!("  session: {}", report.session);
            println!("ok");
        }
        Commands::Ask { session, question } => {
            let engine = Engine::new(cfg)?;
            let id: SessionId = session.parse()?;
            let answer = engine.ask(&id, &question).await?;
            print_answer(&answer);
        }
        Commands::Audit { session } => {
            let engine = Engine::new(cfg)?;
            let id: SessionId = session.parse()?;
            let answer = engine.run_audit(&id).await?;
            print_answer(&answer);
        }
        Commands::Reset { session } => {
            // Teardown needs no capability providers.
            let sessions = repoquery::session::SessionManager::new(cfg.storage.root.clone());
            let id: SessionId = session.parse()?;
            sessions.teardown(&id);
            println!("reset {}", id);
            println!("ok");
        }
    }

    Ok(())
}
