use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static FULL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([^/]+)/([^/]+?)(?:\.git)?/?$").expect("valid GitHub URL pattern")
});

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^/\s]+)/([^/\s]+)$").expect("valid owner/repo pattern")
});

/// `owner/repo` pair extracted from user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Parse a GitHub URL (`https://github.com/owner/repo`, optionally ending in
/// `.git` and/or `/`) or an `owner/repo` shorthand.
///
/// Returns `None` when the input matches neither shape.
pub fn parse_repository_url(input: &str) -> Option<RepoRef> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let caps = FULL_URL
        .captures(input)
        .or_else(|| SHORTHAND.captures(input))?;

    let owner = caps.get(1)?.as_str();
    let repo = caps.get(2)?.as_str();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if owner.is_empty() || repo.is_empty() {
        return None;
    }

    Some(RepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}
