//! The operations offered to callers. Ids arrive as raw strings and are
//! validated here, before any I/O happens.

use std::sync::Arc;

use chrono::Utc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{ReleaseDetails, RepositoryView};
use crate::sync::{view, RefreshSummary, SyncEngine};
use crate::upstream::ReleaseSource;

#[derive(Clone)]
pub struct TrackerService {
    engine: SyncEngine,
}

impl TrackerService {
    pub fn new(db: Database, source: Arc<dyn ReleaseSource>) -> Self {
        Self {
            engine: SyncEngine::new(db, source),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    fn db(&self) -> &Database {
        self.engine.database()
    }

    pub async fn list_repositories(&self) -> Result<Vec<RepositoryView>> {
        let repos = self.db().list_repositories().await?;
        view::project_all(self.db(), repos).await
    }

    pub async fn get_repository(&self, id: &str) -> Result<Option<RepositoryView>> {
        let id = validate_id(id, "Repository")?;
        match self.db().find_repository(id).await? {
            Some(repo) => Ok(Some(view::project(self.db(), repo).await?)),
            None => Ok(None),
        }
    }

    pub async fn add_repository(&self, url: &str) -> Result<RepositoryView> {
        if url.trim().is_empty() {
            return Err(AppError::invalid_field("url", "Repository URL is required"));
        }
        let repo = self.engine.add(url).await?;
        view::project(self.db(), repo).await
    }

    pub async fn delete_repository(&self, id: &str) -> Result<bool> {
        let id = validate_id(id, "Repository")?;
        self.engine.delete(id).await
    }

    pub async fn refresh_repository(&self, id: &str) -> Result<RepositoryView> {
        let id = validate_id(id, "Repository")?;
        let repo = self.engine.refresh(id).await?;
        view::project(self.db(), repo).await
    }

    pub async fn refresh_all_repositories(&self) -> RefreshSummary {
        self.engine.refresh_all().await
    }

    pub async fn mark_release_as_seen(&self, repository_id: &str, release_id: &str) -> Result<()> {
        let repository_id = validate_id(repository_id, "Repository")?;
        let release_id = validate_id(release_id, "Release")?;
        self.db()
            .mark_seen(repository_id, release_id, Utc::now())
            .await
    }

    pub async fn get_release_details(
        &self,
        repository_id: &str,
        release_id: &str,
    ) -> Result<ReleaseDetails> {
        let repository_id = validate_id(repository_id, "Repository")?;
        let release_id = validate_id(release_id, "Release")?;
        view::release_details(
            self.db(),
            self.engine.source().as_ref(),
            repository_id,
            release_id,
        )
        .await
    }
}

/// Ids are positive integers.
pub fn validate_id(raw: &str, resource: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(AppError::invalid_field(
            "id",
            format!("Invalid {resource} ID: {raw}"),
        )),
    }
}
