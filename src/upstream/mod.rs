//! Where repository metadata, releases and commit history come from.
//!
//! Callers hold an `Arc<dyn ReleaseSource>` and never know whether they are
//! talking to GitHub or to the in-process fixture data.

mod fixture;
mod github;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::models::Commit;

pub use fixture::FixtureSource;
pub use github::GitHubSource;

/// Upper bound on commits returned for a tag.
pub const COMMIT_WINDOW: usize = 50;

/// Repository metadata as reported upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRepository {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRelease {
    pub id: i64,
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub body: Option<String>,
    pub html_url: String,
}

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fails with `NotFound` when the repository does not exist upstream,
    /// `UpstreamUnavailable` for anything else.
    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<UpstreamRepository>;

    /// `Ok(None)` when the repository has never published a release.
    async fn fetch_latest_release(&self, owner: &str, name: &str)
        -> Result<Option<UpstreamRelease>>;

    /// Newest first, at most [`COMMIT_WINDOW`] entries. An unknown tag or a
    /// failed lookup yields an empty list.
    async fn fetch_commits_for_tag(&self, owner: &str, name: &str, tag: &str) -> Vec<Commit>;
}

/// Pick the source the configuration asks for.
pub fn from_config(config: &Config) -> Result<Arc<dyn ReleaseSource>> {
    if config.use_fixture_data {
        tracing::info!("Using fixture upstream data");
        Ok(Arc::new(FixtureSource::new()))
    } else {
        Ok(Arc::new(GitHubSource::new(config.github_token.clone())?))
    }
}

/// First line of a commit message.
pub(crate) fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}

pub(crate) fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}
