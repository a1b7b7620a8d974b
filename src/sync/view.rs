use futures::future::try_join_all;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{ReleaseDetails, ReleaseView, RepositoryView, TrackedRepository};
use crate::upstream::ReleaseSource;

/// Attach the latest release and its seen state to a repository. Every
/// repository handed to a caller goes through here.
pub async fn project(db: &Database, repo: TrackedRepository) -> Result<RepositoryView> {
    let latest = match db.latest_release(repo.id).await? {
        Some(release) => {
            let is_seen = db.is_seen(repo.id, release.id).await?;
            Some(ReleaseView::new(release, is_seen))
        }
        None => None,
    };
    Ok(RepositoryView::new(repo, latest))
}

pub async fn project_all(
    db: &Database,
    repos: Vec<TrackedRepository>,
) -> Result<Vec<RepositoryView>> {
    try_join_all(repos.into_iter().map(|repo| project(db, repo))).await
}

/// A release of a specific repository together with the commits behind its
/// tag. Commit lookups never fail this call; they just come back empty.
pub async fn release_details(
    db: &Database,
    source: &dyn ReleaseSource,
    repository_id: i64,
    release_id: i64,
) -> Result<ReleaseDetails> {
    let repo = db
        .find_repository(repository_id)
        .await?
        .ok_or_else(|| AppError::not_found("Repository"))?;

    let release = db
        .find_release(release_id)
        .await?
        .filter(|release| release.repository_id == repo.id)
        .ok_or_else(|| AppError::not_found("Release"))?;

    let is_seen = db.is_seen(repo.id, release.id).await?;
    let commits = source
        .fetch_commits_for_tag(&repo.owner, &repo.name, &release.tag_name)
        .await;

    Ok(ReleaseDetails {
        release: ReleaseView::new(release, is_seen),
        commits,
    })
}
