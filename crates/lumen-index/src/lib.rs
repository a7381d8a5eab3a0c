//! Incremental project indexing for local RAG.
//!
//! [`IndexBuilder`] walks a project, chunks its sources, submits function
//! chunks to the retrieval service in batches and reports deleted files by
//! diffing against the previous [`IndexManifest`]. [`IndexScheduler`]
//! re-runs it periodically while local RAG is enabled.

mod builder;
pub mod manifest;
mod scheduler;
pub mod walker;

pub use builder::{BuildOutcome, BuildReport, IndexBuilder};
pub use manifest::{compute_deletions, IndexManifest, IndexedFile, ManifestStore};
pub use scheduler::IndexScheduler;
pub use walker::{walk_project, WalkOptions};
