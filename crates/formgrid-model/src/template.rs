use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    AddressError, BindError, Binding, BindingStore, BlockCatalog, BlockId, BlockPlacements, BlockPlacer, CellAddress,
    CellStatus, EngineConfig, FieldCatalog, FieldKey, GridDimensions, GridLimits, PlacementError, Rect, Region,
    RegionError, RegionId, RegionIndex,
};

/// Whether a template has changed since it was last saved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EditState {
    Draft,
    Saved { version: u32 },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error("resizing to {dimensions} would leave {at} outside the grid")]
    OutOfBounds {
        dimensions: GridDimensions,
        at: CellAddress,
    },
    #[error("grid size {0} is outside the configured limits")]
    DimensionsOutOfRange(GridDimensions),
    #[error("snapshot schema version {0} is newer than this build supports")]
    UnsupportedSchema(u32),
}

/// One template being edited: its grid, regions, bindings, block placements,
/// imported cell text and opaque style attributes.
///
/// The template exclusively owns its [`RegionIndex`] and [`BindingStore`]; every
/// mutation goes through methods here so the cross-structure invariants (regions
/// and bindings inside the grid, no binding on a covered cell) hold after each call.
#[derive(Clone, Debug)]
pub struct Template {
    dimensions: GridDimensions,
    limits: GridLimits,
    regions: RegionIndex,
    bindings: BindingStore,
    placements: BlockPlacements,
    values: BTreeMap<CellAddress, String>,
    style_attributes: serde_json::Value,
    state: EditState,
}

impl Template {
    /// An empty template of the given size.
    pub fn new(dimensions: GridDimensions, config: &EngineConfig) -> Result<Self, TemplateError> {
        if !config.grid.allows(dimensions) {
            return Err(TemplateError::DimensionsOutOfRange(dimensions));
        }
        Ok(Self {
            dimensions,
            limits: config.grid,
            regions: RegionIndex::new(),
            bindings: BindingStore::new(config.binding_policy),
            placements: BlockPlacements::default(),
            values: BTreeMap::new(),
            style_attributes: serde_json::Value::Null,
            state: EditState::Draft,
        })
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    pub fn limits(&self) -> GridLimits {
        self.limits
    }

    pub fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn placements(&self) -> &BlockPlacements {
        &self.placements
    }

    pub fn values(&self) -> &BTreeMap<CellAddress, String> {
        &self.values
    }

    pub fn style_attributes(&self) -> &serde_json::Value {
        &self.style_attributes
    }

    pub fn edit_state(&self) -> EditState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == EditState::Draft
    }

    /// Record that the current contents were saved as `version`.
    pub fn mark_saved(&mut self, version: u32) {
        self.state = EditState::Saved { version };
    }

    fn touch(&mut self) {
        self.state = EditState::Draft;
    }

    fn check_cell(&self, address: CellAddress) -> Result<(), BindError> {
        if self.dimensions.contains(address) {
            Ok(())
        } else {
            Err(BindError::OutOfBounds {
                address,
                dimensions: self.dimensions,
            })
        }
    }

    fn check_rect(&self, rect: Rect) -> Result<(), RegionError> {
        if self.dimensions.contains_rect(&rect) {
            Ok(())
        } else {
            Err(RegionError::OutOfBounds {
                rect,
                dimensions: self.dimensions,
            })
        }
    }

    fn drop_covered_values(&mut self, rect: Rect) {
        let origin = rect.origin();
        self.values.retain(|a, _| !rect.contains(*a) || *a == origin);
    }

    pub fn locate(&self, address: CellAddress) -> CellStatus {
        self.regions.locate(address)
    }

    pub fn set_style_attributes(&mut self, attributes: serde_json::Value) {
        self.style_attributes = attributes;
        self.touch();
    }

    /// Change the grid size.
    ///
    /// Shrinking is refused while any region, binding or cell value would fall
    /// outside the new bounds.
    pub fn resize(&mut self, dimensions: GridDimensions) -> Result<(), TemplateError> {
        if !self.limits.allows(dimensions) {
            return Err(TemplateError::DimensionsOutOfRange(dimensions));
        }

        let region_ends = self.regions.sorted_by_origin().into_iter().map(|r| r.rect.end());
        let bound_cells = self.bindings.snapshot().into_iter().map(|b| b.address);
        let value_cells = self.values.keys().copied();

        if let Some(at) = region_ends
            .chain(bound_cells)
            .chain(value_cells)
            .find(|a| !dimensions.contains(*a))
        {
            return Err(TemplateError::OutOfBounds { dimensions, at });
        }

        log::debug!("resized grid from {} to {dimensions}", self.dimensions);
        self.dimensions = dimensions;
        self.touch();
        Ok(())
    }

    /// Merge `rect` into one region.
    ///
    /// As with spreadsheet merges, only the top-left cell keeps its value and
    /// binding; values and bindings on the other covered cells are dropped.
    pub fn merge(&mut self, rect: Rect) -> Result<RegionId, TemplateError> {
        self.check_rect(rect)?;
        let id = self.regions.add(rect).map_err(RegionError::from)?;
        self.bindings.clear_within(&rect, true);
        self.drop_covered_values(rect);
        self.touch();
        Ok(id)
    }

    /// Remove a region, keeping whatever its origin held. Unknown ids are ignored.
    pub fn unmerge(&mut self, region: RegionId) -> Option<Region> {
        let removed = self.regions.remove(region)?;
        self.placements.forget(region);
        self.touch();
        Some(removed)
    }

    pub fn bind(&mut self, catalog: &FieldCatalog, address: CellAddress, key: &str) -> Result<Option<FieldKey>, TemplateError> {
        self.check_cell(address)?;
        let previous = self.bindings.bind(catalog, &self.regions, address, key)?;
        self.touch();
        Ok(previous)
    }

    pub fn unbind(&mut self, address: CellAddress) -> Option<FieldKey> {
        let removed = self.bindings.unbind(address);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn binding_at(&self, address: CellAddress) -> Option<&FieldKey> {
        self.bindings.binding_at(address)
    }

    pub fn bindings_for(&self, key: &FieldKey) -> Vec<CellAddress> {
        self.bindings.bindings_for(key)
    }

    /// Replace every binding with the `{address: fieldKey}` wire form.
    ///
    /// The map is validated as a whole; on error the current bindings are untouched.
    pub fn replace_bindings(
        &mut self,
        catalog: &FieldCatalog,
        flat: &BTreeMap<String, String>,
    ) -> Result<(), TemplateError> {
        let mut staged = BindingStore::new(self.bindings.policy());
        for (address, key) in flat {
            let address = CellAddress::from_a1(address)?;
            self.check_cell(address)?;
            staged.bind(catalog, &self.regions, address, key)?;
        }
        self.bindings = staged;
        self.touch();
        Ok(())
    }

    /// Raw text shown in `address`. Covered cells show their region's origin.
    pub fn value(&self, address: CellAddress) -> Option<&str> {
        let anchor = match self.regions.locate(address) {
            CellStatus::RegionCovered(region) => region.origin(),
            _ => address,
        };
        self.values.get(&anchor).map(String::as_str)
    }

    /// Set the raw text of a cell; an empty string clears it. Writing inside a region
    /// writes its origin. Returns the cell actually written.
    pub fn set_value(&mut self, address: CellAddress, text: impl Into<String>) -> Result<CellAddress, TemplateError> {
        self.check_cell(address)?;
        let anchor = match self.regions.locate(address) {
            CellStatus::RegionCovered(region) => region.origin(),
            _ => address,
        };
        let text = text.into();
        if text.is_empty() {
            self.values.remove(&anchor);
        } else {
            self.values.insert(anchor, text);
        }
        self.touch();
        Ok(anchor)
    }

    fn placer<'a>(&'a mut self, blocks: &'a BlockCatalog) -> BlockPlacer<'a> {
        BlockPlacer::new(
            blocks,
            self.dimensions,
            &mut self.regions,
            &mut self.bindings,
            &mut self.placements,
        )
    }

    pub fn place_block(&mut self, blocks: &BlockCatalog, block_id: &str, origin: CellAddress) -> Result<RegionId, TemplateError> {
        let id = self.placer(blocks).place(block_id, origin)?;
        // The block's region may now cover cells that had their own text.
        if let Some(rect) = self.regions.get(id).map(|r| r.rect) {
            self.drop_covered_values(rect);
        }
        self.touch();
        Ok(id)
    }

    /// Remove a block (or any region) together with the bindings inside it.
    pub fn remove_block(&mut self, region: RegionId) -> Vec<Binding> {
        let existed = self.regions.get(region).is_some();
        let empty = BlockCatalog::default();
        let removed = self.placer(&empty).remove_block(region);
        if existed {
            self.touch();
        }
        removed
    }

    pub fn change_span(&mut self, region: RegionId, rows: u32, cols: u32) -> Result<Vec<Binding>, TemplateError> {
        let empty = BlockCatalog::default();
        let removed = self.placer(&empty).change_span(region, rows, cols)?;
        if let Some(rect) = self.regions.get(region).map(|r| r.rect) {
            self.drop_covered_values(rect);
        }
        self.touch();
        Ok(removed)
    }

    pub(crate) fn restore_parts(
        dimensions: GridDimensions,
        config: &EngineConfig,
        style_attributes: serde_json::Value,
    ) -> Result<Self, TemplateError> {
        let mut template = Self::new(dimensions, config)?;
        template.style_attributes = style_attributes;
        Ok(template)
    }

    pub(crate) fn restore_region(
        &mut self,
        id: RegionId,
        rect: Rect,
        block: Option<BlockId>,
    ) -> Result<(), TemplateError> {
        self.check_rect(rect)?;
        self.regions.insert(id, rect)?;
        if let Some(block) = block {
            self.placements.record(id, block);
        }
        Ok(())
    }

    pub(crate) fn restore_binding(&mut self, catalog: &FieldCatalog, binding: &Binding) -> Result<(), TemplateError> {
        self.check_cell(binding.address)?;
        self.bindings
            .bind(catalog, &self.regions, binding.address, &binding.field_key.to_string())?;
        Ok(())
    }

    pub(crate) fn restore_value(&mut self, address: CellAddress, text: String) -> Result<(), TemplateError> {
        self.check_cell(address)?;
        if let CellStatus::RegionCovered(region) = self.regions.locate(address) {
            log::warn!("dropping value at {address}: covered by region {} at {}", region.id, region.rect);
            return Ok(());
        }
        if !text.is_empty() {
            self.values.insert(address, text);
        }
        Ok(())
    }
}
