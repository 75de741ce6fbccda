//! Project context detection.
//!
//! Asks git for the repository root (2-second timeout per command) and falls
//! back to the working directory. Detection failures are silent; callers
//! treat `None` as "no project filter".

use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Detect a project identifier for the current working directory.
///
/// Returns the git repository root when inside a work tree, else the working
/// directory path itself, else `None`.
pub async fn detect_project() -> Option<String> {
    if let Some(root) = git_repo_root().await {
        return Some(root);
    }
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.to_string_lossy().into_owned())
}

async fn git_repo_root() -> Option<String> {
    let inside = run_git(&["rev-parse", "--is-inside-work-tree"]).await?;
    if inside.trim() != "true" {
        return None;
    }
    let root = run_git(&["rev-parse", "--show-toplevel"]).await?;
    let root = root.trim();
    (!root.is_empty()).then(|| root.to_string())
}

async fn run_git(args: &[&str]) -> Option<String> {
    let output = tokio::time::timeout(
        GIT_TIMEOUT,
        Command::new("git").args(args).output(),
    )
    .await;

    match output {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!("Git detection failed: {e}");
            None
        }
        Err(_) => {
            debug!("Git detection timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detection_never_panics() {
        // Whatever the test environment looks like, detection must degrade
        // gracefully to Some(path) or None
        let _ = detect_project().await;
    }
}
