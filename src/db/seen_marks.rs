use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::{format_datetime, get_datetime, is_constraint_violation, stored_precision, Database};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenMark {
    pub id: i64,
    pub repository_id: i64,
    pub release_id: i64,
    pub seen_at: DateTime<Utc>,
}

impl Database {
    /// Record that a release has been seen. A second mark for the same pair
    /// only moves `seen_at` forward to `now`.
    pub async fn mark_seen(
        &self,
        repository_id: i64,
        release_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(
            "INSERT INTO seen_marks (repository_id, release_id, seen_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(repository_id, release_id) DO UPDATE SET seen_at = excluded.seen_at",
            vec![
                Value::from(repository_id),
                Value::from(release_id),
                Value::from(format_datetime(&stored_precision(now))),
            ],
        )
        .await
        .map_err(|e| {
            if is_constraint_violation(&e) {
                AppError::invalid_field("id", "Unknown repository or release")
            } else {
                e
            }
        })?;
        Ok(())
    }

    pub async fn is_seen(&self, repository_id: i64, release_id: i64) -> Result<bool> {
        Ok(self.find_seen_mark(repository_id, release_id).await?.is_some())
    }

    pub async fn find_seen_mark(
        &self,
        repository_id: i64,
        release_id: i64,
    ) -> Result<Option<SeenMark>> {
        self.query_opt(
            "SELECT id, repository_id, release_id, seen_at
             FROM seen_marks WHERE repository_id = ?1 AND release_id = ?2",
            vec![Value::from(repository_id), Value::from(release_id)],
            seen_mark_from_row,
        )
        .await
    }

    pub async fn list_seen_marks(&self, repository_id: i64) -> Result<Vec<SeenMark>> {
        self.query(
            "SELECT id, repository_id, release_id, seen_at
             FROM seen_marks WHERE repository_id = ?1 ORDER BY seen_at DESC",
            vec![Value::from(repository_id)],
            seen_mark_from_row,
        )
        .await
    }
}

fn seen_mark_from_row(row: &Row<'_>) -> rusqlite::Result<SeenMark> {
    Ok(SeenMark {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        release_id: row.get(2)?,
        seen_at: get_datetime(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{NewRelease, NewRepository};
    use chrono::TimeZone;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let repo = db
            .insert_repository(
                NewRepository {
                    upstream_id: 1,
                    owner: "o".into(),
                    name: "r".into(),
                    full_name: "o/r".into(),
                    description: None,
                    html_url: "https://github.com/o/r".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let release = db
            .insert_release(
                NewRelease {
                    repository_id: repo.id,
                    upstream_release_id: 77,
                    tag_name: "v1".into(),
                    name: None,
                    published_at: Utc::now(),
                    body: None,
                    html_url: "https://github.com/o/r/releases/tag/v1".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        (db, repo.id, release.id)
    }

    #[tokio::test]
    async fn marking_twice_keeps_one_row_with_the_later_time() {
        let (db, repo_id, release_id) = setup().await;
        let first = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 12, 2, 9, 30, 0).unwrap();

        assert!(!db.is_seen(repo_id, release_id).await.unwrap());
        db.mark_seen(repo_id, release_id, first).await.unwrap();
        db.mark_seen(repo_id, release_id, second).await.unwrap();

        let marks = db.list_seen_marks(repo_id).await.unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].seen_at, second);
        assert!(db.is_seen(repo_id, release_id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_release_is_a_validation_error() {
        let (db, repo_id, release_id) = setup().await;
        let err = db
            .mark_seen(repo_id, release_id + 50, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn deleting_the_repository_cascades() {
        let (db, repo_id, release_id) = setup().await;
        db.mark_seen(repo_id, release_id, Utc::now()).await.unwrap();

        assert!(db.delete_repository(repo_id).await.unwrap());
        assert!(db.find_release(release_id).await.unwrap().is_none());
        assert!(db.find_seen_mark(repo_id, release_id).await.unwrap().is_none());
    }
}
