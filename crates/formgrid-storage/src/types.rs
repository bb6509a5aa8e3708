use chrono::{DateTime, Utc};
use formgrid_model::TemplateSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored template's identity and management flags. Its contents live in the
/// version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    pub id: Uuid,
    pub name: String,
    pub metadata: Option<serde_json::Value>,
    /// Documents this template can be used for (e.g. `"vaka_formu"`).
    #[serde(default)]
    pub usage_types: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Cleared by a soft delete; inactive templates are hidden from listings.
    pub is_active: bool,
}

/// Why a version was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionOrigin {
    Save,
    ResetToDefault,
}

impl VersionOrigin {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            VersionOrigin::Save => "save",
            VersionOrigin::ResetToDefault => "resetToDefault",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "save" => Some(VersionOrigin::Save),
            "resetToDefault" => Some(VersionOrigin::ResetToDefault),
            _ => None,
        }
    }
}

/// One immutable entry in a template's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVersion {
    pub version: u32,
    pub snapshot: TemplateSnapshot,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_by: Option<String>,
    pub origin: VersionOrigin,
}

impl TemplateVersion {
    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            version: self.version,
            saved_at: self.saved_at,
            saved_by: self.saved_by.clone(),
            origin: self.origin,
        }
    }
}

/// A history entry without its snapshot, as listed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_by: Option<String>,
    pub origin: VersionOrigin,
}

/// Per-save knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Strict mode: fail with `VersionConflict` unless the newest stored version is
    /// exactly this one (`Some(0)` means "no versions yet").
    pub expected_base: Option<u32>,
    pub saved_by: Option<String>,
}

impl SaveOptions {
    pub fn expecting(base: u32) -> Self {
        Self {
            expected_base: Some(base),
            ..Self::default()
        }
    }

    pub fn by(mut self, editor: impl Into<String>) -> Self {
        self.saved_by = Some(editor.into());
        self
    }
}
