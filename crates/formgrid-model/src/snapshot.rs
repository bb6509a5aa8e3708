use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Binding, BlockId, CellAddress, EngineConfig, FieldCatalog, GridDimensions, Rect, RegionError, RegionId,
    Template, TemplateError, SCHEMA_VERSION,
};

/// A placed region as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSnapshot {
    pub id: RegionId,
    pub origin: CellAddress,
    pub row_span: u32,
    pub col_span: u32,
    /// Set when the region was produced by placing a block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockId>,
}

impl RegionSnapshot {
    pub fn rect(&self) -> Option<Rect> {
        Rect::from_span(self.origin, self.row_span, self.col_span)
    }
}

/// Immutable save-time view of a [`Template`].
///
/// This is what the document generator and the persistence layer consume. On the
/// wire, bindings are a flat `{address: fieldKey}` map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSnapshot {
    #[serde(default = "crate::serde_defaults::schema_version")]
    pub schema_version: u32,
    pub dimensions: GridDimensions,
    #[serde(default)]
    pub regions: Vec<RegionSnapshot>,
    #[serde(default, with = "flat_bindings")]
    pub bindings: Vec<Binding>,
    /// Raw cell text from an imported sheet or the online editor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<CellAddress, String>,
    /// Opaque to the engine; passed through to the document generator.
    #[serde(default)]
    pub style_attributes: serde_json::Value,
}

impl TemplateSnapshot {
    /// An empty grid with nothing placed or bound.
    pub fn empty(dimensions: GridDimensions) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            dimensions,
            regions: Vec::new(),
            bindings: Vec::new(),
            values: BTreeMap::new(),
            style_attributes: serde_json::Value::Null,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Template {
    pub fn snapshot(&self) -> TemplateSnapshot {
        let regions = self
            .regions()
            .sorted_by_origin()
            .into_iter()
            .map(|r| RegionSnapshot {
                id: r.id,
                origin: r.origin(),
                row_span: r.row_span(),
                col_span: r.col_span(),
                block: self.placements().block_at(r.id).cloned(),
            })
            .collect();

        TemplateSnapshot {
            schema_version: SCHEMA_VERSION,
            dimensions: self.dimensions(),
            regions,
            bindings: self.bindings().snapshot(),
            values: self.values().clone(),
            style_attributes: self.style_attributes().clone(),
        }
    }

    /// Rebuild an editable template from a snapshot, re-validating every region and
    /// binding against the grid and the catalog.
    pub fn from_snapshot(
        snapshot: &TemplateSnapshot,
        catalog: &FieldCatalog,
        config: &EngineConfig,
    ) -> Result<Self, TemplateError> {
        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(TemplateError::UnsupportedSchema(snapshot.schema_version));
        }
        let mut template =
            Template::restore_parts(snapshot.dimensions, config, snapshot.style_attributes.clone())?;

        for region in &snapshot.regions {
            let rect = region.rect().ok_or(RegionError::InvalidSpan {
                rows: region.row_span,
                cols: region.col_span,
            })?;
            template.restore_region(region.id, rect, region.block.clone())?;
        }
        for binding in &snapshot.bindings {
            template.restore_binding(catalog, binding)?;
        }
        for (address, text) in &snapshot.values {
            template.restore_value(*address, text.clone())?;
        }

        Ok(template)
    }
}

mod flat_bindings {
    use std::collections::BTreeMap;

    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::{Binding, CellAddress, FieldKey};

    pub fn serialize<S: Serializer>(bindings: &[Binding], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(bindings.len()))?;
        for binding in bindings {
            map.serialize_entry(&binding.address, &binding.field_key)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Binding>, D::Error> {
        let map = BTreeMap::<CellAddress, FieldKey>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(address, field_key)| Binding { address, field_key })
            .collect())
    }
}
