//! Repository acquisition: materialize a remote repository into a
//! session's working tree, or fail with a classified error.
//!
//! Clones are shallow (`--depth 1`) and non-interactive
//! (`GIT_TERMINAL_PROMPT=0`), so a private repository fails fast instead
//! of hanging on a credential prompt. On any failure the partially
//! populated working tree is removed before the error is returned; a
//! later query must never silently serve a half-cloned tree.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Clone `url` into `work_tree`, bounded by `timeout`.
pub async fn acquire(url: &str, work_tree: &Path, timeout: Duration) -> Result<()> {
    validate_url(url)?;

    if let Some(parent) = work_tree.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::DiskWrite {
            path: parent.to_path_buf(),
            detail: e.to_string(),
        })?;
    }

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth", "1", "--single-branch"])
        .arg(url)
        .arg(work_tree)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_ASKPASS", "true")
        .kill_on_drop(true);

    let run = tokio::time::timeout(timeout, cmd.output()).await;

    let output = match run {
        Err(_) => {
            cleanup(work_tree);
            return Err(Error::Unreachable {
                url: url.to_string(),
                detail: format!("clone did not finish within {}s", timeout.as_secs()),
            });
        }
        Ok(Err(e)) => {
            cleanup(work_tree);
            return Err(Error::Unreachable {
                url: url.to_string(),
                detail: format!("failed to execute 'git clone' (is git installed?): {}", e),
            });
        }
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    cleanup(work_tree);
    Err(classify_clone_failure(url, work_tree, stderr.trim()))
}

/// Reject URLs that cannot name a public remote repository before any
/// network traffic happens.
fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl {
            url: url.to_string(),
            reason: "empty URL".to_string(),
        });
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(Error::InvalidUrl {
            url: url.to_string(),
            reason: "URL contains whitespace".to_string(),
        });
    }
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| Error::InvalidUrl {
            url: url.to_string(),
            reason: "expected an https:// repository URL".to_string(),
        })?;
    match rest.split_once('/') {
        Some((host, path)) if !host.is_empty() && !path.is_empty() => Ok(()),
        _ => Err(Error::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no repository path".to_string(),
        }),
    }
}

/// Map git's stderr onto the acquisition error taxonomy. Patterns cover
/// the messages git 2.x emits for the common failure classes.
fn classify_clone_failure(url: &str, work_tree: &Path, stderr: &str) -> Error {
    let lower = stderr.to_lowercase();

    if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("could not read password")
        || lower.contains("permission denied")
        || lower.contains("terminal prompts disabled")
    {
        return Error::AuthRequired {
            url: url.to_string(),
        };
    }

    if lower.contains("repository") && lower.contains("not found") {
        return Error::InvalidUrl {
            url: url.to_string(),
            reason: "remote reports the repository does not exist".to_string(),
        };
    }

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
    {
        return Error::Unreachable {
            url: url.to_string(),
            detail: first_line(stderr),
        };
    }

    if lower.contains("no space left") || lower.contains("read-only file system") {
        return Error::DiskWrite {
            path: work_tree.to_path_buf(),
            detail: first_line(stderr),
        };
    }

    Error::Unreachable {
        url: url.to_string(),
        detail: first_line(stderr),
    }
}

fn first_line(s: &str) -> String {
    s.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("git clone failed")
        .trim()
        .to_string()
}

fn cleanup(work_tree: &Path) {
    if let Err(e) = std::fs::remove_dir_all(work_tree) {
        if e.kind() != std::io::ErrorKind::NotFound {
            eprintln!(
                "Warning: could not remove partial clone {}: {}",
                work_tree.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_urls() {
        assert!(matches!(
            validate_url(""),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("ftp://example.com/repo"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("https://host.example and junk"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("https://"),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_accepts_https_repo_urls() {
        assert!(validate_url("https://github.com/streamlit/streamlit-example").is_ok());
        assert!(validate_url("https://gitlab.com/org/repo.git").is_ok());
    }

    #[test]
    fn test_classify_auth_required() {
        let err = classify_clone_failure(
            "https://github.com/org/private",
            Path::new("/tmp/wt"),
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled",
        );
        assert!(matches!(err, Error::AuthRequired { .. }));
    }

    #[test]
    fn test_classify_not_found_as_invalid() {
        let err = classify_clone_failure(
            "https://github.com/org/nope",
            Path::new("/tmp/wt"),
            "remote: Repository not found.\nfatal: repository 'https://github.com/org/nope/' not found",
        );
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_classify_dns_failure_as_unreachable() {
        let err = classify_clone_failure(
            "https://no-such-host.invalid/repo",
            Path::new("/tmp/wt"),
            "fatal: unable to access 'https://no-such-host.invalid/repo/': Could not resolve host: no-such-host.invalid",
        );
        assert!(matches!(err, Error::Unreachable { .. }));
    }

    #[test]
    fn test_classify_disk_full() {
        let err = classify_clone_failure(
            "https://github.com/org/repo",
            Path::new("/tmp/wt"),
            "fatal: write error: No space left on device",
        );
        assert!(matches!(err, Error::DiskWrite { .. }));
    }
}
