//! Persistence for form templates.
//!
//! Exposes:
//! - the [`VersionStore`] seam over append-only template histories
//! - an in-process [`VersionedConfigStore`]
//! - a SQLite-backed [`Storage`] with template metadata, soft delete, per-usage-type
//!   defaults, duplication and the same history API

mod history;
mod schema;
pub mod storage;
mod types;

pub use history::{VersionStore, VersionedConfigStore};
pub use storage::{Storage, StorageError};
pub use types::{SaveOptions, TemplateMeta, TemplateVersion, VersionOrigin, VersionSummary};
