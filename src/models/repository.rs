use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReleaseView;

/// A repository row as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRepository {
    pub id: i64,
    pub upstream_id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRepository {
    pub upstream_id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
}

/// What callers see: the repository plus its newest release and whether
/// that release is still unseen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryView {
    pub id: i64,
    pub upstream_id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub latest_release: Option<ReleaseView>,
    pub has_unseen_updates: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryView {
    pub fn new(repo: TrackedRepository, latest_release: Option<ReleaseView>) -> Self {
        let has_unseen_updates = latest_release.as_ref().is_some_and(|r| !r.is_seen);
        Self {
            id: repo.id,
            upstream_id: repo.upstream_id,
            owner: repo.owner,
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            html_url: repo.html_url,
            latest_release,
            has_unseen_updates,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
        }
    }
}
