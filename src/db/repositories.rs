use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;

use super::{format_datetime, get_datetime, is_constraint_violation, stored_precision, Database};
use crate::error::{AppError, Result};
use crate::models::{NewRepository, TrackedRepository};

impl Database {
    /// Insert a newly tracked repository. A clash on `(owner, name)` or on
    /// the upstream id is a caller mistake, not a storage fault.
    pub async fn insert_repository(
        &self,
        repo: NewRepository,
        now: DateTime<Utc>,
    ) -> Result<TrackedRepository> {
        let now = stored_precision(now);
        let now_text = format_datetime(&now);
        let id = self
            .insert(
                "INSERT INTO repositories (upstream_id, owner, name, full_name, description, html_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                vec![
                    Value::from(repo.upstream_id),
                    Value::from(repo.owner.clone()),
                    Value::from(repo.name.clone()),
                    Value::from(repo.full_name.clone()),
                    Value::from(repo.description.clone()),
                    Value::from(repo.html_url.clone()),
                    Value::from(now_text),
                ],
            )
            .await
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    AppError::invalid_field("url", "Repository is already being tracked")
                } else {
                    e
                }
            })?;

        Ok(TrackedRepository {
            id,
            upstream_id: repo.upstream_id,
            owner: repo.owner,
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            html_url: repo.html_url,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_repository(&self, id: i64) -> Result<Option<TrackedRepository>> {
        self.query_opt(
            "SELECT id, upstream_id, owner, name, full_name, description, html_url, created_at, updated_at
             FROM repositories WHERE id = ?1",
            vec![Value::from(id)],
            repository_from_row,
        )
        .await
    }

    /// Owner and name compare case-insensitively, as they do on GitHub.
    pub async fn find_repository_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<TrackedRepository>> {
        self.query_opt(
            "SELECT id, upstream_id, owner, name, full_name, description, html_url, created_at, updated_at
             FROM repositories WHERE owner = ?1 AND name = ?2",
            vec![Value::from(owner.to_string()), Value::from(name.to_string())],
            repository_from_row,
        )
        .await
    }

    pub async fn find_repository_by_upstream_id(
        &self,
        upstream_id: i64,
    ) -> Result<Option<TrackedRepository>> {
        self.query_opt(
            "SELECT id, upstream_id, owner, name, full_name, description, html_url, created_at, updated_at
             FROM repositories WHERE upstream_id = ?1",
            vec![Value::from(upstream_id)],
            repository_from_row,
        )
        .await
    }

    /// Newest first.
    pub async fn list_repositories(&self) -> Result<Vec<TrackedRepository>> {
        self.query(
            "SELECT id, upstream_id, owner, name, full_name, description, html_url, created_at, updated_at
             FROM repositories ORDER BY created_at DESC, id DESC",
            Vec::new(),
            repository_from_row,
        )
        .await
    }

    /// Overwrite the description and bump `updated_at`. Returns false when
    /// the row no longer exists.
    pub async fn update_repository_description(
        &self,
        id: i64,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .execute(
                "UPDATE repositories SET description = ?1, updated_at = ?2 WHERE id = ?3",
                vec![
                    Value::from(description),
                    Value::from(format_datetime(&now)),
                    Value::from(id),
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    /// Releases and seen marks go with it.
    pub async fn delete_repository(&self, id: i64) -> Result<bool> {
        let changed = self
            .execute("DELETE FROM repositories WHERE id = ?1", vec![Value::from(id)])
            .await?;
        Ok(changed > 0)
    }
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedRepository> {
    Ok(TrackedRepository {
        id: row.get(0)?,
        upstream_id: row.get(1)?,
        owner: row.get(2)?,
        name: row.get(3)?,
        full_name: row.get(4)?,
        description: row.get(5)?,
        html_url: row.get(6)?,
        created_at: get_datetime(row, 7)?,
        updated_at: get_datetime(row, 8)?,
    })
}
