//! Track GitHub repositories and keep a local, append-only history of their
//! releases, with a per-release "seen" flag.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repo_url;
pub mod service;
pub mod sync;
pub mod upstream;

pub use config::Config;
pub use error::{AppError, ErrorKind, Result};
pub use service::TrackerService;
