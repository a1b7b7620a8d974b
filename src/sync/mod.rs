mod engine;
mod scheduler;
pub mod view;

pub use engine::{RefreshSummary, SyncEngine};
pub use scheduler::RefreshScheduler;
