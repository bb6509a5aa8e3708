use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellAddress, CellStatus, FieldCatalog, FieldKey, GridDimensions, Rect, Region, RegionIndex};

/// An association between one grid address and one field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub address: CellAddress,
    pub field_key: FieldKey,
}

/// Whether one field may be bound to several cells at once.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingPolicy {
    /// A field may appear in any number of cells (the editors never prevented it).
    #[default]
    AllowReuse,
    /// A field may occupy at most one cell; a second address is rejected.
    OneCellPerField,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("unknown field {0:?}")]
    UnknownField(String),
    #[error("{address} is covered by region {} at {}; bind its origin instead", .region.id, .region.rect)]
    CellCovered { address: CellAddress, region: Region },
    #[error("{address} lies outside the {dimensions} grid")]
    OutOfBounds {
        address: CellAddress,
        dimensions: GridDimensions,
    },
    #[error("field {key} is already bound at {existing}")]
    FieldAlreadyBound { key: FieldKey, existing: CellAddress },
}

/// Forward (`address -> field`) and reverse (`field -> addresses`) binding indexes.
///
/// Both maps are updated together by every mutation so `binding_at(a) == Some(k)`
/// holds exactly when `a` is in `bindings_for(k)`.
#[derive(Clone, Debug, Default)]
pub struct BindingStore {
    policy: BindingPolicy,
    by_address: BTreeMap<CellAddress, FieldKey>,
    by_field: BTreeMap<FieldKey, BTreeSet<CellAddress>>,
}

impl BindingStore {
    pub fn new(policy: BindingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> BindingPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Bind `address` to the catalog field `key`, replacing any previous binding at
    /// that address. Returns the replaced key.
    pub fn bind(
        &mut self,
        catalog: &FieldCatalog,
        regions: &RegionIndex,
        address: CellAddress,
        key: &str,
    ) -> Result<Option<FieldKey>, BindError> {
        let key = catalog
            .resolve(key)
            .map_err(|_| BindError::UnknownField(key.to_string()))?
            .key
            .clone();

        if let CellStatus::RegionCovered(region) = regions.locate(address) {
            return Err(BindError::CellCovered { address, region });
        }

        if self.policy == BindingPolicy::OneCellPerField {
            if let Some(existing) = self
                .by_field
                .get(&key)
                .and_then(|set| set.iter().find(|&&a| a != address))
            {
                return Err(BindError::FieldAlreadyBound {
                    key,
                    existing: *existing,
                });
            }
        }

        Ok(self.insert(address, key))
    }

    /// Write a binding without validation. Callers have already checked the catalog
    /// and region coverage.
    pub(crate) fn insert(&mut self, address: CellAddress, key: FieldKey) -> Option<FieldKey> {
        let previous = self.unbind(address);
        self.by_field.entry(key.clone()).or_default().insert(address);
        self.by_address.insert(address, key);
        previous
    }

    /// Remove the binding at `address`, if any.
    pub fn unbind(&mut self, address: CellAddress) -> Option<FieldKey> {
        let key = self.by_address.remove(&address)?;
        if let Some(set) = self.by_field.get_mut(&key) {
            set.remove(&address);
            if set.is_empty() {
                self.by_field.remove(&key);
            }
        }
        Some(key)
    }

    pub fn binding_at(&self, address: CellAddress) -> Option<&FieldKey> {
        self.by_address.get(&address)
    }

    /// Addresses bound to `key`, row-major.
    pub fn bindings_for(&self, key: &FieldKey) -> Vec<CellAddress> {
        self.by_field
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every binding, ordered row-major by address.
    pub fn snapshot(&self) -> Vec<Binding> {
        self.by_address
            .iter()
            .map(|(address, key)| Binding {
                address: *address,
                field_key: key.clone(),
            })
            .collect()
    }

    /// The `{address: fieldKey}` wire form.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        self.by_address
            .iter()
            .map(|(address, key)| (address.to_a1(), key.to_string()))
            .collect()
    }

    /// Remove every binding inside `rect`, optionally sparing its origin cell.
    /// Returns the removed bindings in row-major order.
    pub fn clear_within(&mut self, rect: &Rect, keep_origin: bool) -> Vec<Binding> {
        let doomed: Vec<CellAddress> = self
            .by_address
            .keys()
            .filter(|a| rect.contains(**a) && !(keep_origin && **a == rect.origin()))
            .copied()
            .collect();

        doomed
            .into_iter()
            .filter_map(|address| {
                self.unbind(address).map(|field_key| Binding { address, field_key })
            })
            .collect()
    }
}
