//! Read-only registry of bindable fields.
//!
//! The catalog is loaded once per session from a JSON document of categories. Each
//! category lists plain scalar fields and checkbox groups; a group expands into one
//! composite field per option, keyed `group.option`.

use std::collections::{BTreeMap, BTreeSet};

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A parsed field key.
///
/// Keys arrive as dotted strings (`patientName`, `gender.erkek`) and are resolved into
/// this type once at the boundary, so catalog lookups and binding indexes never
/// compare raw strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    /// A scalar text/number/date value.
    Plain(String),
    /// One boolean option of a checkbox group.
    Composite { group: String, option: String },
}

impl FieldKey {
    /// Parse `name` or `group.option`. Segments are non-empty runs of ASCII
    /// alphanumerics, `_` and `-`.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidKey(raw.to_string());
        let mut parts = raw.split('.');
        let first = parts.next().filter(|s| is_segment(s)).ok_or_else(invalid)?;
        match (parts.next(), parts.next()) {
            (None, _) => Ok(FieldKey::Plain(first.to_string())),
            (Some(option), None) if is_segment(option) => Ok(FieldKey::Composite {
                group: first.to_string(),
                option: option.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, FieldKey::Composite { .. })
    }

    /// Checkbox group name for composite keys.
    pub fn group(&self) -> Option<&str> {
        match self {
            FieldKey::Plain(_) => None,
            FieldKey::Composite { group, .. } => Some(group),
        }
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Plain(name) => f.write_str(name),
            FieldKey::Composite { group, option } => write!(f, "{group}.{option}"),
        }
    }
}

impl core::str::FromStr for FieldKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::parse(s)
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub key: FieldKey,
    pub label: String,
    pub category_id: String,
}

impl FieldDefinition {
    pub fn is_composite(&self) -> bool {
        self.key.is_composite()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub categories: Vec<CategoryConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub key: String,
    pub label: String,
}

/// A checkbox group; each option becomes the composite field `key.option`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub key: String,
    pub label: String,
    pub options: Vec<FieldConfig>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub categories: usize,
    pub plain_fields: usize,
    pub composite_fields: usize,
    pub groups: usize,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("field {0:?} not found")]
    NotFound(String),
    #[error("duplicate field key {0:?}")]
    DuplicateKey(String),
    #[error("duplicate category id {0:?}")]
    DuplicateCategory(String),
    #[error("invalid field key {0:?}")]
    InvalidKey(String),
    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default)]
pub struct FieldCatalog {
    categories: Vec<Category>,
    fields: Vec<FieldDefinition>,
    index: BTreeMap<FieldKey, usize>,
}

impl FieldCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let config: CatalogConfig = serde_json::from_str(json)?;
        Self::from_config(config)
    }

    pub fn from_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut catalog = FieldCatalog::default();
        let mut category_ids = BTreeSet::new();

        for category in config.categories {
            if !category_ids.insert(category.id.clone()) {
                return Err(CatalogError::DuplicateCategory(category.id));
            }

            for field in category.fields {
                let key = FieldKey::parse(&field.key)?;
                if key.is_composite() {
                    // Composite keys only come from checkbox groups.
                    return Err(CatalogError::InvalidKey(field.key));
                }
                catalog.push(key, field.label, &category.id)?;
            }

            for group in category.groups {
                for option in group.options {
                    let raw = format!("{}.{}", group.key, option.key);
                    let key = FieldKey::parse(&raw)?;
                    let label = format!("{}: {}", group.label, option.label);
                    catalog.push(key, label, &category.id)?;
                }
            }

            catalog.categories.push(Category {
                id: category.id,
                name: category.name,
            });
        }

        Ok(catalog)
    }

    fn push(&mut self, key: FieldKey, label: String, category_id: &str) -> Result<(), CatalogError> {
        if self.index.contains_key(&key) {
            return Err(CatalogError::DuplicateKey(key.to_string()));
        }
        self.index.insert(key.clone(), self.fields.len());
        self.fields.push(FieldDefinition {
            key,
            label,
            category_id: category_id.to_string(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn by_key(&self, key: &FieldKey) -> Result<&FieldDefinition, CatalogError> {
        self.index
            .get(key)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))
    }

    /// Resolve a wire-format key. Malformed keys are reported as not found since
    /// they can never be in the catalog.
    pub fn resolve(&self, raw: &str) -> Result<&FieldDefinition, CatalogError> {
        let key = FieldKey::parse(raw).map_err(|_| CatalogError::NotFound(raw.to_string()))?;
        self.by_key(&key)
    }

    pub fn all_in_category(&self, category_id: &str) -> Vec<&FieldDefinition> {
        self.fields
            .iter()
            .filter(|f| f.category_id == category_id)
            .collect()
    }

    /// Every option of a checkbox group, in declaration order.
    pub fn group_options(&self, group: &str) -> Vec<&FieldDefinition> {
        self.fields
            .iter()
            .filter(|f| f.key.group() == Some(group))
            .collect()
    }

    /// Case-insensitive substring search over label, key and category name.
    ///
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&FieldDefinition> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.fields.iter().collect();
        }

        self.fields
            .iter()
            .filter(|f| {
                let category = self
                    .category(&f.category_id)
                    .map(|c| c.name.to_lowercase())
                    .unwrap_or_default();
                f.label.to_lowercase().contains(&needle)
                    || f.key.to_string().to_lowercase().contains(&needle)
                    || category.contains(&needle)
            })
            .collect()
    }

    pub fn summary(&self) -> CatalogSummary {
        let groups: BTreeSet<&str> = self.fields.iter().filter_map(|f| f.key.group()).collect();
        let composite_fields = self.fields.iter().filter(|f| f.is_composite()).count();
        CatalogSummary {
            categories: self.categories.len(),
            plain_fields: self.fields.len() - composite_fields,
            composite_fields,
            groups: groups.len(),
        }
    }
}
