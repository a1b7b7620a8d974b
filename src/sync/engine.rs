use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{NewRelease, NewRepository, Release, TrackedRepository};
use crate::repo_url::parse_repository_url;
use crate::upstream::{ReleaseSource, UpstreamRelease};

/// Repositories refreshed at the same time during a batch.
const REFRESH_CONCURRENCY: usize = 5;

/// Outcome of a batch refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub attempted: usize,
    pub refreshed: usize,
    /// Ids of repositories whose refresh failed.
    pub failed: Vec<i64>,
}

/// Creates, refreshes and deletes tracked repositories, keeping the local
/// release history in step with upstream.
#[derive(Clone)]
pub struct SyncEngine {
    db: Database,
    source: Arc<dyn ReleaseSource>,
}

impl SyncEngine {
    pub fn new(db: Database, source: Arc<dyn ReleaseSource>) -> Self {
        Self { db, source }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn source(&self) -> &Arc<dyn ReleaseSource> {
        &self.source
    }

    /// Start tracking a repository. Adding one that is already tracked is
    /// an error, not a no-op.
    pub async fn add(&self, url: &str) -> Result<TrackedRepository> {
        let parsed = parse_repository_url(url)
            .ok_or_else(|| AppError::invalid_field("url", "Invalid GitHub repository URL"))?;

        // Two concurrent adds can both get past this check; the UNIQUE
        // (owner, name) constraint rejects the second insert.
        if self
            .db
            .find_repository_by_owner_and_name(&parsed.owner, &parsed.repo)
            .await?
            .is_some()
        {
            return Err(AppError::invalid_field(
                "url",
                "Repository is already being tracked",
            ));
        }

        let upstream = self
            .source
            .fetch_repository(&parsed.owner, &parsed.repo)
            .await?;

        // A differently cased or renamed path can resolve to a repository
        // that is already tracked.
        if self
            .db
            .find_repository_by_upstream_id(upstream.id)
            .await?
            .is_some()
        {
            return Err(AppError::invalid_field(
                "url",
                "Repository is already being tracked",
            ));
        }

        let latest = self
            .source
            .fetch_latest_release(&parsed.owner, &parsed.repo)
            .await?;

        let repo = self
            .db
            .insert_repository(
                NewRepository {
                    upstream_id: upstream.id,
                    owner: upstream.owner,
                    name: upstream.name,
                    full_name: upstream.full_name,
                    description: upstream.description,
                    html_url: upstream.html_url,
                },
                Utc::now(),
            )
            .await?;

        if let Some(release) = latest {
            self.record_release(repo.id, release).await?;
        }

        tracing::info!("Tracking {} (id {})", repo.full_name, repo.id);
        Ok(repo)
    }

    /// Pull fresh metadata and the latest release for one repository.
    pub async fn refresh(&self, id: i64) -> Result<TrackedRepository> {
        let repo = self
            .db
            .find_repository(id)
            .await?
            .ok_or_else(|| AppError::not_found("Repository"))?;

        let upstream = self.source.fetch_repository(&repo.owner, &repo.name).await?;
        let latest = self
            .source
            .fetch_latest_release(&repo.owner, &repo.name)
            .await?;

        self.db
            .update_repository_description(id, upstream.description, Utc::now())
            .await?;

        if let Some(release) = latest {
            if let Some(stored) = self.record_release(id, release).await? {
                tracing::info!("New release {} for {}", stored.tag_name, repo.full_name);
            }
        }

        self.db
            .find_repository(id)
            .await?
            .ok_or_else(|| AppError::not_found("Repository"))
    }

    /// Refresh every tracked repository. A failure on one repository is
    /// logged and counted; the rest of the batch still runs.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let repositories = match self.db.list_repositories().await {
            Ok(repositories) => repositories,
            Err(e) => {
                tracing::error!("Failed to list repositories for refresh: {}", e);
                return RefreshSummary::default();
            }
        };

        let results: Vec<(i64, bool)> = stream::iter(repositories)
            .map(|repo| async move {
                match self.refresh(repo.id).await {
                    Ok(_) => {
                        tracing::debug!("Refreshed {}", repo.full_name);
                        (repo.id, true)
                    }
                    Err(e) => {
                        tracing::error!(
                            repository_id = repo.id,
                            kind = %e.kind(),
                            "Failed to refresh {}: {}",
                            repo.full_name,
                            e
                        );
                        (repo.id, false)
                    }
                }
            })
            .buffer_unordered(REFRESH_CONCURRENCY)
            .collect()
            .await;

        let mut summary = RefreshSummary {
            attempted: results.len(),
            ..RefreshSummary::default()
        };
        for (id, ok) in results {
            if ok {
                summary.refreshed += 1;
            } else {
                summary.failed.push(id);
            }
        }
        summary.failed.sort_unstable();
        summary
    }

    /// Stop tracking a repository. Returns false if it was not tracked.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.db.delete_repository(id).await?;
        if removed {
            tracing::info!("Stopped tracking repository {}", id);
        }
        Ok(removed)
    }

    /// Store an upstream release unless one with the same upstream id is
    /// already present. Returns the new row, if any.
    async fn record_release(
        &self,
        repository_id: i64,
        release: UpstreamRelease,
    ) -> Result<Option<Release>> {
        if self
            .db
            .find_release_by_upstream_id(release.id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        self.db
            .insert_release(
                NewRelease {
                    repository_id,
                    upstream_release_id: release.id,
                    tag_name: release.tag_name,
                    name: release.name,
                    published_at: release.published_at,
                    body: release.body,
                    html_url: release.html_url,
                },
                Utc::now(),
            )
            .await
    }
}
