use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Commit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub repository_id: i64,
    pub upstream_release_id: i64,
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub body: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRelease {
    pub repository_id: i64,
    pub upstream_release_id: i64,
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub body: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseView {
    pub id: i64,
    pub repository_id: i64,
    pub upstream_release_id: i64,
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub body: Option<String>,
    pub html_url: String,
    pub is_seen: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReleaseView {
    pub fn new(release: Release, is_seen: bool) -> Self {
        Self {
            id: release.id,
            repository_id: release.repository_id,
            upstream_release_id: release.upstream_release_id,
            tag_name: release.tag_name,
            name: release.name,
            published_at: release.published_at,
            body: release.body,
            html_url: release.html_url,
            is_seen,
            created_at: release.created_at,
            updated_at: release.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDetails {
    pub release: ReleaseView,
    pub commits: Vec<Commit>,
}
