//! Context detection: `explicit argument → configured
//! default → git remote origin name → cwd basename`. Config-driven by
//! default, extended with git remote parsing and a cwd fallback for
//! deployments that never set an explicit default.

use std::path::Path;
use std::process::Command;

use url::Url;

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub default_context: Option<String>,
    pub auto_detect: bool,
}

/// Resolves the effective context for an operation. `context = None`
/// means "global/no namespace" and is a legitimate outcome, not an error.
pub fn resolve_context(explicit: Option<&str>, config: &ContextConfig) -> Option<String> {
    if let Some(ctx) = explicit {
        if !ctx.trim().is_empty() {
            return Some(ctx.trim().to_string());
        }
    }

    if let Some(default) = &config.default_context {
        if !default.trim().is_empty() {
            return Some(default.trim().to_string());
        }
    }

    if !config.auto_detect {
        return None;
    }

    git_remote_context().or_else(cwd_context)
}

fn git_remote_context() -> Option<String> {
    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let remote = String::from_utf8(output.stdout).ok()?;
    parse_git_remote(remote.trim())
}

/// Parses `git@host:owner/repo(.git)` or `https://host/owner/repo(.git)`
/// into a bare repo name.
pub fn parse_git_remote(remote: &str) -> Option<String> {
    let remote = remote.trim();
    if remote.is_empty() {
        return None;
    }

    if let Some(rest) = remote.strip_prefix("git@") {
        let path = rest.split_once(':').map(|(_, path)| path)?;
        return repo_name_from_path(path);
    }

    let url = Url::parse(remote).ok()?;
    repo_name_from_path(url.path())
}

fn repo_name_from_path(path: &str) -> Option<String> {
    let trimmed = path.trim_start_matches('/').trim_end_matches(".git");
    let repo = trimmed.rsplit('/').next()?;
    if repo.is_empty() {
        None
    } else {
        Some(repo.to_string())
    }
}

fn cwd_context() -> Option<String> {
    std::env::current_dir()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}
