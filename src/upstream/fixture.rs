use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{ReleaseSource, UpstreamRelease, UpstreamRepository, COMMIT_WINDOW};
use crate::error::{AppError, Result};
use crate::models::{Commit, CommitAuthor};

const CREATED_ID_BASE: i64 = 10_000_000;

struct FixtureRepository {
    repository: UpstreamRepository,
    releases: Vec<UpstreamRelease>,
    failing: bool,
}

impl FixtureRepository {
    /// GitHub resolves owner and name case-insensitively.
    fn is(&self, owner: &str, name: &str) -> bool {
        self.repository.owner.eq_ignore_ascii_case(owner)
            && self.repository.name.eq_ignore_ascii_case(name)
    }
}

struct FixtureData {
    repositories: Vec<FixtureRepository>,
    next_release_id: i64,
}

impl FixtureData {
    fn find(&self, owner: &str, name: &str) -> Option<&FixtureRepository> {
        self.repositories
            .iter()
            .find(|r| r.is(owner, name))
    }

    fn find_mut(&mut self, owner: &str, name: &str) -> Option<&mut FixtureRepository> {
        self.repositories
            .iter_mut()
            .find(|r| r.is(owner, name))
    }

    /// Unknown repositories spring into existence the first time they are
    /// asked for, without any releases.
    fn find_or_create(&mut self, owner: &str, name: &str) -> &mut FixtureRepository {
        if let Some(index) = self
            .repositories
            .iter()
            .position(|r| r.is(owner, name))
        {
            return &mut self.repositories[index];
        }

        let id = CREATED_ID_BASE + self.repositories.len() as i64 + 1;
        tracing::debug!("Creating fixture repository {}/{}", owner, name);
        self.repositories.push(FixtureRepository {
            repository: UpstreamRepository {
                id,
                owner: owner.to_string(),
                name: name.to_string(),
                full_name: format!("{owner}/{name}"),
                description: Some(format!("Mock repository: {owner}/{name}")),
                html_url: format!("https://github.com/{owner}/{name}"),
            },
            releases: Vec::new(),
            failing: false,
        });
        let last = self.repositories.len() - 1;
        &mut self.repositories[last]
    }
}

/// Deterministic in-process stand-in for GitHub.
pub struct FixtureSource {
    data: Mutex<FixtureData>,
}

impl FixtureSource {
    pub fn new() -> Self {
        let repositories = vec![
            seeded(
                10270250,
                "facebook",
                "react",
                "The library for web and native user interfaces",
                12345678,
                "v18.2.0",
                "React 18.2.0",
                date(2024, 11, 20),
                "## What's Changed\n\n* Improved performance with concurrent rendering\n* New hooks and features\n* Bug fixes and improvements",
            ),
            seeded(
                70107786,
                "vercel",
                "next.js",
                "The React Framework for Production",
                12345679,
                "v14.1.0",
                "Next.js 14.1.0",
                date(2024, 11, 25),
                "## Highlights\n\n* Improved App Router performance\n* New middleware features\n* Enhanced developer experience",
            ),
            seeded(
                11730342,
                "vuejs",
                "vue",
                "This is the repo for Vue 2. For Vue 3, go to https://github.com/vuejs/core",
                12345680,
                "v2.7.16",
                "Vue 2.7.16",
                date(2024, 11, 28),
                "## Bug Fixes\n\n* Fixed memory leaks\n* Improved TypeScript support\n* Security updates",
            ),
        ];

        Self {
            data: Mutex::new(FixtureData {
                repositories,
                next_release_id: 12345681,
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, FixtureData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a new release upstream. The repository is created if needed.
    pub fn publish_release(
        &self,
        owner: &str,
        name: &str,
        tag_name: &str,
        published_at: DateTime<Utc>,
    ) -> UpstreamRelease {
        let mut data = self.data();
        let id = data.next_release_id;
        data.next_release_id += 1;

        let release = UpstreamRelease {
            id,
            tag_name: tag_name.to_string(),
            name: Some(format!("{name} {tag_name}")),
            published_at,
            body: None,
            html_url: format!("https://github.com/{owner}/{name}/releases/tag/{tag_name}"),
        };
        data.find_or_create(owner, name)
            .releases
            .push(release.clone());
        release
    }

    /// Make every metadata/release fetch for this repository fail as if
    /// GitHub were unreachable.
    pub fn fail_repository(&self, owner: &str, name: &str) {
        self.data().find_or_create(owner, name).failing = true;
    }

    pub fn recover_repository(&self, owner: &str, name: &str) {
        if let Some(repo) = self.data().find_mut(owner, name) {
            repo.failing = false;
        }
    }

    pub fn set_description(&self, owner: &str, name: &str, description: Option<&str>) {
        self.data().find_or_create(owner, name).repository.description =
            description.map(str::to_string);
    }
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseSource for FixtureSource {
    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<UpstreamRepository> {
        let mut data = self.data();
        let repo = data.find_or_create(owner, name);
        if repo.failing {
            return Err(unavailable(owner, name));
        }
        Ok(repo.repository.clone())
    }

    async fn fetch_latest_release(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<UpstreamRelease>> {
        let data = self.data();
        let Some(repo) = data.find(owner, name) else {
            return Ok(None);
        };
        if repo.failing {
            return Err(unavailable(owner, name));
        }
        Ok(repo
            .releases
            .iter()
            .max_by_key(|r| (r.published_at, r.id))
            .cloned())
    }

    async fn fetch_commits_for_tag(&self, owner: &str, name: &str, tag: &str) -> Vec<Commit> {
        let data = self.data();
        let known_tag = data
            .find(owner, name)
            .is_some_and(|repo| repo.releases.iter().any(|r| r.tag_name == tag));
        if !known_tag {
            return Vec::new();
        }

        [
            ("a1b2c3d", "Fix critical bug in rendering", "John Doe", "john@example.com", 19),
            ("e4f5a6b", "Add new feature for better performance", "Jane Smith", "jane@example.com", 18),
            ("c7d8e9f", "Update dependencies", "Bob Wilson", "bob@example.com", 17),
        ]
        .into_iter()
        .take(COMMIT_WINDOW)
        .map(|(sha, message, author, email, day)| Commit {
            sha: sha.to_string(),
            message: message.to_string(),
            author: CommitAuthor {
                name: author.to_string(),
                email: email.to_string(),
                date: date(2024, 11, day).to_rfc3339(),
            },
            html_url: format!("https://github.com/{owner}/{name}/commit/{sha}"),
        })
        .collect()
    }
}

fn unavailable(owner: &str, name: &str) -> AppError {
    AppError::upstream(format!("Fixture repository {owner}/{name} is unavailable"))
}

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn seeded(
    id: i64,
    owner: &str,
    name: &str,
    description: &str,
    release_id: i64,
    tag_name: &str,
    release_name: &str,
    published_at: DateTime<Utc>,
    body: &str,
) -> FixtureRepository {
    FixtureRepository {
        repository: UpstreamRepository {
            id,
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{owner}/{name}"),
            description: Some(description.to_string()),
            html_url: format!("https://github.com/{owner}/{name}"),
        },
        releases: vec![UpstreamRelease {
            id: release_id,
            tag_name: tag_name.to_string(),
            name: Some(release_name.to_string()),
            published_at,
            body: Some(body.to_string()),
            html_url: format!("https://github.com/{owner}/{name}/releases/tag/{tag_name}"),
        }],
        failing: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn serves_seeded_repositories() {
        let source = FixtureSource::new();
        let repo = source.fetch_repository("facebook", "react").await.unwrap();
        assert_eq!(repo.id, 10270250);
        assert_eq!(repo.full_name, "facebook/react");

        let release = source
            .fetch_latest_release("facebook", "react")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release.tag_name, "v18.2.0");
    }

    #[tokio::test]
    async fn creates_unknown_repositories_on_first_reference() {
        let source = FixtureSource::new();
        assert!(source
            .fetch_latest_release("rust-lang", "rust")
            .await
            .unwrap()
            .is_none());

        let first = source.fetch_repository("rust-lang", "rust").await.unwrap();
        let second = source.fetch_repository("rust-lang", "rust").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.id, CREATED_ID_BASE + 4);
        assert_eq!(first.description.as_deref(), Some("Mock repository: rust-lang/rust"));
        assert!(source
            .fetch_latest_release("rust-lang", "rust")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn latest_release_is_the_most_recently_published() {
        let source = FixtureSource::new();
        source.publish_release("facebook", "react", "v19.0.0", date(2024, 12, 5));
        source.publish_release("facebook", "react", "v18.3.1", date(2024, 12, 1));

        let latest = source
            .fetch_latest_release("facebook", "react")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.tag_name, "v19.0.0");
    }

    #[tokio::test]
    async fn commits_only_for_known_tags() {
        let source = FixtureSource::new();
        let commits = source
            .fetch_commits_for_tag("facebook", "react", "v18.2.0")
            .await;
        assert_eq!(commits.len(), 3);
        assert!(commits.iter().all(|c| c.sha.len() == 7));
        assert_eq!(
            commits[0].html_url,
            "https://github.com/facebook/react/commit/a1b2c3d"
        );

        assert!(source
            .fetch_commits_for_tag("facebook", "react", "v0.0.1")
            .await
            .is_empty());
        assert!(source
            .fetch_commits_for_tag("nobody", "nothing", "v1")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn failing_repository_reports_upstream_unavailable() {
        let source = FixtureSource::new();
        source.fail_repository("vuejs", "vue");

        let err = source.fetch_repository("vuejs", "vue").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        let err = source.fetch_latest_release("vuejs", "vue").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        source.recover_repository("vuejs", "vue");
        assert!(source.fetch_repository("vuejs", "vue").await.is_ok());
    }
}
