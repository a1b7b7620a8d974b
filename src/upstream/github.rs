use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{
    first_line, short_sha, ReleaseSource, UpstreamRelease, UpstreamRepository, COMMIT_WINDOW,
};
use crate::error::{AppError, Result};
use crate::models::{Commit, CommitAuthor};

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT_STRING: &str = concat!("release-tracker/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    id: i64,
    name: String,
    full_name: String,
    description: Option<String>,
    html_url: String,
    owner: OwnerResponse,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: i64,
    tag_name: String,
    name: Option<String>,
    published_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    body: Option<String>,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
    #[serde(rename = "type")]
    object_type: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<GitAuthor>,
}

#[derive(Debug, Deserialize)]
struct GitAuthor {
    name: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

/// Live GitHub REST source.
pub struct GitHubSource {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl GitHubSource {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(GITHUB_API_URL, token)
    }

    /// Point the client at a GitHub Enterprise host or a local stand-in.
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid GitHub API URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "GitHub API URL cannot be a base: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        let token = token.filter(|t| !t.trim().is_empty());
        if token.is_none() {
            tracing::warn!("No GitHub token configured; unauthenticated rate limits apply");
        }

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a JSON document. A 404 comes back as `Ok(None)` so each caller can
    /// decide what absence means.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<Option<T>> {
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, USER_AGENT_STRING)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream_with(format!("Failed to fetch {what}"), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                %url,
                %status,
                body = %body.chars().take(200).collect::<String>(),
                "GitHub request failed"
            );
            let reason = match status {
                StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => "rate limited",
                _ => "unexpected status",
            };
            return Err(AppError::upstream(format!(
                "Failed to fetch {what}: HTTP {status} ({reason})"
            )));
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| AppError::upstream_with(format!("Malformed {what} response"), e))?;
        Ok(Some(value))
    }

    async fn resolve_tag(&self, owner: &str, name: &str, tag: &str) -> Result<Option<String>> {
        let mut url = self.endpoint(["repos", owner, name, "git", "ref", "tags"]);
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(tag.split('/'));
        }

        let Some(tag_ref) = self.get_json::<RefResponse>(url, "tag reference").await? else {
            return Ok(None);
        };

        // Annotated tags point at a tag object; the commits endpoint resolves
        // the tag name itself in that case.
        if tag_ref.object.object_type == "commit" {
            Ok(Some(tag_ref.object.sha))
        } else {
            Ok(Some(tag.to_string()))
        }
    }
}

#[async_trait]
impl ReleaseSource for GitHubSource {
    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<UpstreamRepository> {
        let url = self.endpoint(["repos", owner, name]);
        match self.get_json::<RepositoryResponse>(url, "repository").await? {
            Some(repo) => Ok(repository_from_response(repo)),
            None => Err(AppError::not_found("Repository")),
        }
    }

    async fn fetch_latest_release(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<UpstreamRelease>> {
        let url = self.endpoint(["repos", owner, name, "releases", "latest"]);
        match self.get_json::<ReleaseResponse>(url, "latest release").await? {
            Some(release) => release_from_response(release).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_commits_for_tag(&self, owner: &str, name: &str, tag: &str) -> Vec<Commit> {
        let start = match self.resolve_tag(owner, name, tag).await {
            Ok(Some(start)) => start,
            Ok(None) => {
                tracing::debug!("Tag {} not found in {}/{}", tag, owner, name);
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!("Failed to resolve tag {} in {}/{}: {}", tag, owner, name, e);
                return Vec::new();
            }
        };

        let mut url = self.endpoint(["repos", owner, name, "commits"]);
        url.query_pairs_mut()
            .append_pair("sha", &start)
            .append_pair("per_page", &COMMIT_WINDOW.to_string());

        match self.get_json::<Vec<CommitResponse>>(url, "commits").await {
            Ok(Some(commits)) => commits
                .into_iter()
                .take(COMMIT_WINDOW)
                .map(commit_from_response)
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::debug!("Failed to list commits for {}/{}@{}: {}", owner, name, tag, e);
                Vec::new()
            }
        }
    }
}

fn repository_from_response(repo: RepositoryResponse) -> UpstreamRepository {
    UpstreamRepository {
        id: repo.id,
        owner: repo.owner.login,
        name: repo.name,
        full_name: repo.full_name,
        description: repo.description,
        html_url: repo.html_url,
    }
}

fn release_from_response(release: ReleaseResponse) -> Result<UpstreamRelease> {
    let published_at = release
        .published_at
        .or(release.created_at)
        .ok_or_else(|| AppError::upstream(format!("Release {} has no publish date", release.id)))?;

    Ok(UpstreamRelease {
        id: release.id,
        tag_name: release.tag_name,
        name: release.name,
        published_at,
        body: release.body,
        html_url: release.html_url,
    })
}

fn commit_from_response(commit: CommitResponse) -> Commit {
    let author = commit.commit.author;
    Commit {
        sha: short_sha(&commit.sha),
        message: first_line(&commit.commit.message),
        author: CommitAuthor {
            name: author
                .as_ref()
                .and_then(|a| a.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            email: author
                .as_ref()
                .and_then(|a| a.email.clone())
                .unwrap_or_default(),
            date: author.and_then(|a| a.date).unwrap_or_default(),
        },
        html_url: commit.html_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Route = (&'static str, u16, &'static str);

    const REPO_JSON: &str = r#"{
        "id": 10270250,
        "name": "react",
        "full_name": "facebook/react",
        "description": "The library for web and native user interfaces",
        "html_url": "https://github.com/facebook/react",
        "owner": { "login": "facebook" }
    }"#;

    const RELEASE_JSON: &str = r#"{
        "id": 12345678,
        "tag_name": "v18.2.0",
        "name": "React 18.2.0",
        "published_at": "2024-11-20T00:00:00Z",
        "created_at": "2024-11-19T00:00:00Z",
        "body": "notes",
        "html_url": "https://github.com/facebook/react/releases/tag/v18.2.0"
    }"#;

    /// Serve canned responses keyed by request path (query ignored) on a
    /// local port; anything else is a 404. Returns the base URL.
    async fn serve(routes: Vec<Route>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    loop {
                        let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                        read += n;
                        if n == 0
                            || read == buf.len()
                            || buf[..read].windows(4).any(|w| w == b"\r\n\r\n")
                        {
                            break;
                        }
                    }

                    let request = String::from_utf8_lossy(&buf[..read]);
                    let target = request.split_whitespace().nth(1).unwrap_or("/");
                    let path = target.split('?').next().unwrap_or("/");
                    let (status, body) = routes
                        .iter()
                        .find(|(route, _, _)| *route == path)
                        .map(|(_, status, body)| (*status, *body))
                        .unwrap_or((404, r#"{"message":"Not Found"}"#));

                    let response = format!(
                        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        format!("http://{addr}/")
    }

    async fn source_for(routes: Vec<Route>) -> GitHubSource {
        let base = serve(routes).await;
        GitHubSource::with_base_url(&base, Some("t0ken".into())).unwrap()
    }

    #[tokio::test]
    async fn fetches_repository_and_latest_release() {
        let source = source_for(vec![
            ("/repos/facebook/react", 200, REPO_JSON),
            ("/repos/facebook/react/releases/latest", 200, RELEASE_JSON),
        ])
        .await;

        let repo = source.fetch_repository("facebook", "react").await.unwrap();
        assert_eq!(repo.id, 10270250);
        assert_eq!(repo.owner, "facebook");

        let release = source
            .fetch_latest_release("facebook", "react")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release.tag_name, "v18.2.0");
        assert_eq!(release.published_at.to_rfc3339(), "2024-11-20T00:00:00+00:00");
    }

    #[tokio::test]
    async fn missing_repository_is_not_found() {
        let source = source_for(Vec::new()).await;
        let err = source.fetch_repository("nobody", "nothing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Repository not found");
    }

    #[tokio::test]
    async fn missing_latest_release_is_none() {
        let source = source_for(vec![("/repos/facebook/react", 200, REPO_JSON)]).await;
        assert!(source
            .fetch_latest_release("facebook", "react")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn error_statuses_are_upstream_unavailable() {
        let source = source_for(vec![
            ("/repos/limited/forbidden", 403, r#"{"message":"API rate limit exceeded"}"#),
            ("/repos/limited/too-many", 429, r#"{"message":"slow down"}"#),
            ("/repos/broken/server", 500, r#"{"message":"boom"}"#),
            ("/repos/broken/gateway/releases/latest", 502, "Bad Gateway"),
        ])
        .await;

        for (owner, name) in [("limited", "forbidden"), ("limited", "too-many")] {
            let err = source.fetch_repository(owner, name).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable, "{owner}/{name}");
            assert!(err.to_string().contains("rate limited"), "{err}");
        }

        let err = source.fetch_repository("broken", "server").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("HTTP 500"), "{err}");

        let err = source
            .fetch_latest_release("broken", "gateway")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[tokio::test]
    async fn malformed_json_is_upstream_unavailable() {
        let source = source_for(vec![
            ("/repos/o/r", 200, "{ not json"),
            ("/repos/o/r/releases/latest", 200, r#"{"id": "seven"}"#),
        ])
        .await;

        let err = source.fetch_repository("o", "r").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("Malformed repository response"), "{err}");

        let err = source.fetch_latest_release("o", "r").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[tokio::test]
    async fn lists_commits_for_a_resolved_tag() {
        let source = source_for(vec![
            (
                "/repos/o/r/git/ref/tags/v1.0.0",
                200,
                r#"{"object": {"sha": "a1b2c3d4e5f6", "type": "commit"}}"#,
            ),
            (
                "/repos/o/r/commits",
                200,
                r#"[
                    {
                        "sha": "a1b2c3d4e5f6",
                        "commit": {
                            "message": "Release v1.0.0\n\nbody",
                            "author": {"name": "Jane", "email": "jane@example.com", "date": "2024-11-18T00:00:00Z"}
                        },
                        "html_url": "https://github.com/o/r/commit/a1b2c3d4e5f6"
                    },
                    {
                        "sha": "0f9e8d7c6b5a",
                        "commit": {"message": "Prepare release", "author": null},
                        "html_url": "https://github.com/o/r/commit/0f9e8d7c6b5a"
                    }
                ]"#,
            ),
        ])
        .await;

        let commits = source.fetch_commits_for_tag("o", "r", "v1.0.0").await;
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "a1b2c3d");
        assert_eq!(commits[0].message, "Release v1.0.0");
        assert_eq!(commits[1].author.name, "Unknown");
    }

    #[tokio::test]
    async fn commit_lookup_failures_yield_no_commits() {
        let source = source_for(vec![
            (
                "/repos/o/failing/git/ref/tags/v1.0.0",
                200,
                r#"{"object": {"sha": "a1b2c3d4e5f6", "type": "commit"}}"#,
            ),
            ("/repos/o/failing/commits", 500, r#"{"message":"boom"}"#),
            ("/repos/o/limited/git/ref/tags/v1.0.0", 403, r#"{"message":"rate limited"}"#),
        ])
        .await;

        assert!(source.fetch_commits_for_tag("o", "r", "v9.9.9").await.is_empty());
        assert!(source
            .fetch_commits_for_tag("o", "failing", "v1.0.0")
            .await
            .is_empty());
        assert!(source
            .fetch_commits_for_tag("o", "limited", "v1.0.0")
            .await
            .is_empty());
    }

    fn source() -> GitHubSource {
        GitHubSource::with_base_url("https://ghe.example.com/api/v3/", Some("t0ken".into()))
            .unwrap()
    }

    #[test]
    fn builds_endpoints_under_the_base_path() {
        let url = source().endpoint(["repos", "vercel", "next.js", "releases", "latest"]);
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/vercel/next.js/releases/latest"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(GitHubSource::with_base_url("not a url", None).is_err());
        assert!(GitHubSource::with_base_url("mailto:someone@example.com", None).is_err());
    }

    #[test]
    fn blank_token_is_ignored() {
        let source = GitHubSource::with_base_url(GITHUB_API_URL, Some("  ".into())).unwrap();
        assert!(source.token.is_none());
    }

    #[test]
    fn converts_repository_payload() {
        let payload: RepositoryResponse = serde_json::from_value(json!({
            "id": 10270250,
            "name": "react",
            "full_name": "facebook/react",
            "description": null,
            "html_url": "https://github.com/facebook/react",
            "owner": { "login": "facebook", "id": 69631 },
            "stargazers_count": 1
        }))
        .unwrap();

        let repo = repository_from_response(payload);
        assert_eq!(repo.id, 10270250);
        assert_eq!(repo.owner, "facebook");
        assert_eq!(repo.full_name, "facebook/react");
        assert_eq!(repo.description, None);
    }

    #[test]
    fn release_falls_back_to_creation_date() {
        let payload: ReleaseResponse = serde_json::from_value(json!({
            "id": 7,
            "tag_name": "v1.0.0",
            "name": null,
            "published_at": null,
            "created_at": "2024-11-20T10:00:00Z",
            "body": "notes",
            "html_url": "https://github.com/o/r/releases/tag/v1.0.0"
        }))
        .unwrap();

        let release = release_from_response(payload).unwrap();
        assert_eq!(release.published_at.to_rfc3339(), "2024-11-20T10:00:00+00:00");
        assert_eq!(release.name, None);
    }

    #[test]
    fn release_without_any_date_is_an_upstream_fault() {
        let payload: ReleaseResponse = serde_json::from_value(json!({
            "id": 7,
            "tag_name": "v1.0.0",
            "name": "One",
            "published_at": null,
            "created_at": null,
            "body": null,
            "html_url": "https://github.com/o/r/releases/tag/v1.0.0"
        }))
        .unwrap();

        let err = release_from_response(payload).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn converts_commit_payload() {
        let payload: CommitResponse = serde_json::from_value(json!({
            "sha": "a1b2c3d4e5f6a7b8c9d0",
            "commit": {
                "message": "Fix rendering\n\nDetails here",
                "author": { "name": "Jane", "email": "jane@example.com", "date": "2024-11-18T00:00:00Z" }
            },
            "html_url": "https://github.com/o/r/commit/a1b2c3d4e5f6a7b8c9d0"
        }))
        .unwrap();

        let commit = commit_from_response(payload);
        assert_eq!(commit.sha, "a1b2c3d");
        assert_eq!(commit.message, "Fix rendering");
        assert_eq!(commit.author.name, "Jane");
        assert_eq!(commit.author.date, "2024-11-18T00:00:00Z");
    }

    #[test]
    fn commit_without_author_is_unknown() {
        let payload: CommitResponse = serde_json::from_value(json!({
            "sha": "0123456789",
            "commit": { "message": "Initial commit", "author": null },
            "html_url": "https://github.com/o/r/commit/0123456789"
        }))
        .unwrap();

        let commit = commit_from_response(payload);
        assert_eq!(commit.author.name, "Unknown");
        assert_eq!(commit.author.email, "");
        assert_eq!(commit.author.date, "");
    }
}
