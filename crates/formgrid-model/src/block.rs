//! Drag-placed blocks.
//!
//! A block definition is a named, pre-sized unit (e.g. "Vital Bulgular 1", one row by
//! three columns, six sub-fields). Each definition may be placed at most once per
//! template; placing it again moves it.

use std::collections::BTreeMap;

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Binding, BindingStore, CellAddress, FieldCatalog, FieldKey, GridDimensions, OverlapError, Rect, RegionError,
    RegionId, RegionIndex,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    pub id: BlockId,
    pub name: String,
    pub row_span: u32,
    pub col_span: u32,
    /// Sub-fields the block stands for as a unit, printed in this order.
    #[serde(default)]
    pub fields: Vec<FieldKey>,
}

#[derive(Debug, Error)]
pub enum BlockCatalogError {
    #[error("duplicate block id {0}")]
    DuplicateId(BlockId),
    #[error("block {id} has an empty span {rows}x{cols}")]
    EmptySpan { id: BlockId, rows: u32, cols: u32 },
    #[error("block {block} lists unknown field {key}")]
    UnknownField { block: BlockId, key: FieldKey },
    #[error("invalid block catalog json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct BlockCatalogConfig {
    blocks: Vec<BlockDefinition>,
}

/// Read-only set of block definitions, loaded once per session.
#[derive(Clone, Debug, Default)]
pub struct BlockCatalog {
    blocks: BTreeMap<BlockId, BlockDefinition>,
}

impl BlockCatalog {
    pub fn from_json(json: &str) -> Result<Self, BlockCatalogError> {
        let config: BlockCatalogConfig = serde_json::from_str(json)?;
        Self::from_definitions(config.blocks)
    }

    /// Parse and check every block's sub-fields against `fields`.
    pub fn load(json: &str, fields: &FieldCatalog) -> Result<Self, BlockCatalogError> {
        let catalog = Self::from_json(json)?;
        catalog.check_fields(fields)?;
        Ok(catalog)
    }

    /// Fail on the first sub-field `fields` does not define.
    pub fn check_fields(&self, fields: &FieldCatalog) -> Result<(), BlockCatalogError> {
        for def in self.blocks.values() {
            if let Some(key) = def.fields.iter().find(|k| !fields.contains(k)) {
                return Err(BlockCatalogError::UnknownField {
                    block: def.id.clone(),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn from_definitions(
        definitions: impl IntoIterator<Item = BlockDefinition>,
    ) -> Result<Self, BlockCatalogError> {
        let mut blocks = BTreeMap::new();
        for def in definitions {
            if def.row_span == 0 || def.col_span == 0 {
                return Err(BlockCatalogError::EmptySpan {
                    id: def.id,
                    rows: def.row_span,
                    cols: def.col_span,
                });
            }
            if blocks.contains_key(&def.id) {
                return Err(BlockCatalogError::DuplicateId(def.id));
            }
            blocks.insert(def.id.clone(), def);
        }
        Ok(Self { blocks })
    }

    pub fn get(&self, id: &str) -> Option<&BlockDefinition> {
        self.blocks.get(&BlockId::new(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Which regions were produced by placing which block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockPlacements {
    by_region: BTreeMap<RegionId, BlockId>,
    by_block: BTreeMap<BlockId, RegionId>,
}

impl BlockPlacements {
    pub fn block_at(&self, region: RegionId) -> Option<&BlockId> {
        self.by_region.get(&region)
    }

    pub fn placement_of(&self, block: &BlockId) -> Option<RegionId> {
        self.by_block.get(block).copied()
    }

    pub fn len(&self) -> usize {
        self.by_region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }

    pub(crate) fn record(&mut self, region: RegionId, block: BlockId) {
        if let Some(old) = self.by_block.insert(block.clone(), region) {
            self.by_region.remove(&old);
        }
        self.by_region.insert(region, block);
    }

    pub(crate) fn forget(&mut self, region: RegionId) -> Option<BlockId> {
        let block = self.by_region.remove(&region)?;
        self.by_block.remove(&block);
        Some(block)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("unknown block {0:?}")]
    UnknownBlock(String),
    #[error(transparent)]
    Region(#[from] RegionError),
}

impl From<OverlapError> for PlacementError {
    fn from(err: OverlapError) -> Self {
        PlacementError::Region(RegionError::Overlap(err))
    }
}

/// Places, moves, resizes and removes blocks over one template's regions and
/// bindings, keeping "no binding on a covered cell" true after every operation.
pub struct BlockPlacer<'a> {
    blocks: &'a BlockCatalog,
    dimensions: GridDimensions,
    regions: &'a mut RegionIndex,
    bindings: &'a mut BindingStore,
    placements: &'a mut BlockPlacements,
}

impl<'a> BlockPlacer<'a> {
    pub fn new(
        blocks: &'a BlockCatalog,
        dimensions: GridDimensions,
        regions: &'a mut RegionIndex,
        bindings: &'a mut BindingStore,
        placements: &'a mut BlockPlacements,
    ) -> Self {
        Self {
            blocks,
            dimensions,
            regions,
            bindings,
            placements,
        }
    }

    fn bounded_rect(&self, origin: CellAddress, rows: u32, cols: u32) -> Result<Rect, RegionError> {
        let rect = Rect::from_span(origin, rows, cols).ok_or(RegionError::InvalidSpan { rows, cols })?;
        if !self.dimensions.contains_rect(&rect) {
            return Err(RegionError::OutOfBounds {
                rect,
                dimensions: self.dimensions,
            });
        }
        Ok(rect)
    }

    /// Place `block_id` with its default span at `origin`.
    ///
    /// If the block is already placed it is moved: the candidate is checked against
    /// every other region first, so a rejected move leaves the old placement intact.
    /// The binding on the old origin follows the block; bindings on cells the new
    /// rectangle covers are dropped.
    pub fn place(&mut self, block_id: &str, origin: CellAddress) -> Result<RegionId, PlacementError> {
        let blocks = self.blocks;
        let def = blocks
            .get(block_id)
            .ok_or_else(|| PlacementError::UnknownBlock(block_id.to_string()))?;
        let rect = self.bounded_rect(origin, def.row_span, def.col_span)?;

        let previous = self.placements.placement_of(&def.id);
        self.regions.check_vacant(rect, previous)?;

        let mut carried = None;
        if let Some(old_id) = previous {
            if let Some(old) = self.regions.remove(old_id) {
                carried = self.bindings.unbind(old.origin());
            }
            self.placements.forget(old_id);
        }

        let id = self.regions.add(rect)?;
        self.bindings.clear_within(&rect, true);
        if let Some(key) = carried {
            self.bindings.insert(rect.origin(), key);
        }
        self.placements.record(id, def.id.clone());

        match previous {
            Some(old_id) => log::debug!("moved block {} from region {old_id} to {rect}", def.id),
            None => log::debug!("placed block {} at {rect}", def.id),
        }
        Ok(id)
    }

    /// Remove a region and every binding inside it. Unknown ids are ignored.
    pub fn remove_block(&mut self, region: RegionId) -> Vec<Binding> {
        let Some(removed) = self.regions.remove(region) else {
            return Vec::new();
        };
        self.placements.forget(region);
        self.bindings.clear_within(&removed.rect, false)
    }

    /// Resize a region in place. Bindings on cells that become covered are removed
    /// and returned; cells uncovered by a shrink stay unbound.
    pub fn change_span(&mut self, region: RegionId, rows: u32, cols: u32) -> Result<Vec<Binding>, PlacementError> {
        let origin = self
            .regions
            .get(region)
            .ok_or(RegionError::NotFound(region))?
            .origin();
        let rect = self.bounded_rect(origin, rows, cols)?;
        self.regions.resize(region, rows, cols)?;
        Ok(self.bindings.clear_within(&rect, true))
    }
}
