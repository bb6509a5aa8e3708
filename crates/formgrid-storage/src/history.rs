//! Append-only version history for template configurations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use formgrid_model::TemplateSnapshot;
use uuid::Uuid;

use crate::storage::{Result, StorageError};
use crate::types::{SaveOptions, TemplateVersion, VersionOrigin, VersionSummary};

/// Persistence seam for template versions.
///
/// Implementations assign version numbers themselves: each template's history starts
/// at 1 and grows by one per append, whether the append is a save or a reset.
/// Stored versions are never rewritten.
pub trait VersionStore: Send + Sync {
    /// Store `snapshot` as the next version of `template_id`.
    fn append(
        &self,
        template_id: Uuid,
        snapshot: &TemplateSnapshot,
        origin: VersionOrigin,
        options: SaveOptions,
    ) -> Result<TemplateVersion>;

    /// The snapshot stored as `version`.
    fn get_version(&self, template_id: Uuid, version: u32) -> Result<TemplateSnapshot>;

    /// Up to `limit` versions, newest first.
    fn get_history(&self, template_id: Uuid, limit: usize) -> Result<Vec<TemplateVersion>>;

    fn latest(&self, template_id: Uuid) -> Result<Option<TemplateVersion>> {
        Ok(self.get_history(template_id, 1)?.into_iter().next())
    }

    fn save(&self, template_id: Uuid, snapshot: &TemplateSnapshot, options: SaveOptions) -> Result<TemplateVersion> {
        self.append(template_id, snapshot, VersionOrigin::Save, options)
    }

    /// Record `default` as a new version. Earlier versions stay retrievable.
    fn reset_to_default(
        &self,
        template_id: Uuid,
        default: &TemplateSnapshot,
        options: SaveOptions,
    ) -> Result<TemplateVersion> {
        self.append(template_id, default, VersionOrigin::ResetToDefault, options)
    }

    fn history_summaries(&self, template_id: Uuid, limit: usize) -> Result<Vec<VersionSummary>> {
        Ok(self
            .get_history(template_id, limit)?
            .iter()
            .map(TemplateVersion::summary)
            .collect())
    }
}

/// Check a strict-mode save against the newest stored version.
pub(crate) fn check_base(options: &SaveOptions, actual: u32) -> Result<()> {
    match options.expected_base {
        Some(expected) if expected != actual => Err(StorageError::VersionConflict { expected, actual }),
        _ => Ok(()),
    }
}

/// In-process history, one `Vec` of versions per template behind a single mutex.
#[derive(Debug, Default)]
pub struct VersionedConfigStore {
    versions: Mutex<HashMap<Uuid, Vec<TemplateVersion>>>,
}

impl VersionedConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<TemplateVersion>>> {
        match self.versions.lock() {
            Ok(guard) => guard,
            // Every mutation is a single push, so the map is consistent even if a
            // holder panicked.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl VersionStore for VersionedConfigStore {
    fn append(
        &self,
        template_id: Uuid,
        snapshot: &TemplateSnapshot,
        origin: VersionOrigin,
        options: SaveOptions,
    ) -> Result<TemplateVersion> {
        let mut versions = self.lock();
        let history = versions.entry(template_id).or_default();
        let actual = history.last().map_or(0, |v| v.version);
        check_base(&options, actual)?;

        let version = TemplateVersion {
            version: actual + 1,
            snapshot: snapshot.clone(),
            saved_at: Utc::now(),
            saved_by: options.saved_by,
            origin,
        };
        history.push(version.clone());
        log::debug!("template {template_id}: stored version {} ({})", version.version, origin.as_str());
        Ok(version)
    }

    fn get_version(&self, template_id: Uuid, version: u32) -> Result<TemplateSnapshot> {
        let versions = self.lock();
        versions
            .get(&template_id)
            .and_then(|history| history.iter().find(|v| v.version == version))
            .map(|v| v.snapshot.clone())
            .ok_or(StorageError::NotFound { template_id, version })
    }

    fn get_history(&self, template_id: Uuid, limit: usize) -> Result<Vec<TemplateVersion>> {
        let versions = self.lock();
        Ok(versions
            .get(&template_id)
            .map(|history| history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
