use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    /// As reported upstream; empty when unknown.
    pub date: String,
}

/// One entry of a release's commit history. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Abbreviated to seven characters.
    pub sha: String,
    /// First line of the commit message only.
    pub message: String,
    pub author: CommitAuthor,
    pub html_url: String,
}
