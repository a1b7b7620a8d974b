mod commit;
mod release;
mod repository;

pub use commit::{Commit, CommitAuthor};
pub use release::{NewRelease, Release, ReleaseDetails, ReleaseView};
pub use repository::{NewRepository, RepositoryView, TrackedRepository};
