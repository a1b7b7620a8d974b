use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;

use super::{format_datetime, get_datetime, stored_precision, Database};
use crate::error::Result;
use crate::models::{NewRelease, Release};

impl Database {
    /// Append a release. Returns `None` if a row with the same upstream
    /// release id already exists; existing rows are never rewritten.
    pub async fn insert_release(
        &self,
        release: NewRelease,
        now: DateTime<Utc>,
    ) -> Result<Option<Release>> {
        let now = stored_precision(now);
        let published_at = stored_precision(release.published_at);
        let id = self
            .insert_or_ignore(
                "INSERT INTO releases (repository_id, upstream_release_id, tag_name, name, published_at, body, html_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(upstream_release_id) DO NOTHING",
                vec![
                    Value::from(release.repository_id),
                    Value::from(release.upstream_release_id),
                    Value::from(release.tag_name.clone()),
                    Value::from(release.name.clone()),
                    Value::from(format_datetime(&published_at)),
                    Value::from(release.body.clone()),
                    Value::from(release.html_url.clone()),
                    Value::from(format_datetime(&now)),
                ],
            )
            .await?;

        Ok(id.map(|id| Release {
            id,
            repository_id: release.repository_id,
            upstream_release_id: release.upstream_release_id,
            tag_name: release.tag_name,
            name: release.name,
            published_at,
            body: release.body,
            html_url: release.html_url,
            created_at: now,
            updated_at: now,
        }))
    }

    pub async fn find_release(&self, id: i64) -> Result<Option<Release>> {
        self.query_opt(
            "SELECT id, repository_id, upstream_release_id, tag_name, name, published_at, body, html_url, created_at, updated_at
             FROM releases WHERE id = ?1",
            vec![Value::from(id)],
            release_from_row,
        )
        .await
    }

    pub async fn find_release_by_upstream_id(
        &self,
        upstream_release_id: i64,
    ) -> Result<Option<Release>> {
        self.query_opt(
            "SELECT id, repository_id, upstream_release_id, tag_name, name, published_at, body, html_url, created_at, updated_at
             FROM releases WHERE upstream_release_id = ?1",
            vec![Value::from(upstream_release_id)],
            release_from_row,
        )
        .await
    }

    /// The release with the greatest `published_at`, regardless of when it
    /// was inserted. Equal publish times fall back to the newer row.
    pub async fn latest_release(&self, repository_id: i64) -> Result<Option<Release>> {
        self.query_opt(
            "SELECT id, repository_id, upstream_release_id, tag_name, name, published_at, body, html_url, created_at, updated_at
             FROM releases WHERE repository_id = ?1
             ORDER BY published_at DESC, id DESC
             LIMIT 1",
            vec![Value::from(repository_id)],
            release_from_row,
        )
        .await
    }

    /// Newest published first.
    pub async fn list_releases(&self, repository_id: i64) -> Result<Vec<Release>> {
        self.query(
            "SELECT id, repository_id, upstream_release_id, tag_name, name, published_at, body, html_url, created_at, updated_at
             FROM releases WHERE repository_id = ?1
             ORDER BY published_at DESC, id DESC",
            vec![Value::from(repository_id)],
            release_from_row,
        )
        .await
    }
}

fn release_from_row(row: &Row<'_>) -> rusqlite::Result<Release> {
    Ok(Release {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        upstream_release_id: row.get(2)?,
        tag_name: row.get(3)?,
        name: row.get(4)?,
        published_at: get_datetime(row, 5)?,
        body: row.get(6)?,
        html_url: row.get(7)?,
        created_at: get_datetime(row, 8)?,
        updated_at: get_datetime(row, 9)?,
    })
}
