//! `formgrid-model` is the in-memory side of the form template editor.
//!
//! A template is a fixed-size grid on which rectangular regions (merged cells and
//! drag-placed blocks) sit without overlapping, and whose cells can be bound to
//! fields from a catalog. The crate is intentionally free of I/O so it can be shared
//! by the persistence layer, the document generator and any UI boundary via `serde`.

mod address;
mod binding;
mod block;
mod catalog;
mod config;
pub mod fill;
mod grid;
pub mod import;
mod region;
mod serde_defaults;
mod snapshot;
mod template;

pub use address::{decode, encode, AddressError, CellAddress, Rect};
pub use binding::{BindError, Binding, BindingPolicy, BindingStore};
pub use block::{
    BlockCatalog, BlockCatalogError, BlockDefinition, BlockId, BlockPlacements, BlockPlacer, PlacementError,
};
pub use catalog::{
    CatalogConfig, CatalogError, CatalogSummary, Category, CategoryConfig, FieldCatalog, FieldConfig,
    FieldDefinition, FieldKey, GroupConfig,
};
pub use config::{ConfigError, EngineConfig};
pub use fill::{fill_blocks, fill_cells, render_cells};
pub use grid::{GridDimensions, GridLimits, MAX_GRID_COLS, MAX_GRID_ROWS};
pub use import::{ImportReport, ImportedCell, ImportedMerge, ImportedSheet};
pub use region::{CellStatus, OverlapError, Region, RegionError, RegionId, RegionIndex};
pub use snapshot::{RegionSnapshot, TemplateSnapshot};
pub use template::{EditState, Template, TemplateError};

/// Current serialization schema version.
///
/// This is embedded into [`TemplateSnapshot`] so stored versions written by older
/// builds can be recognized.
pub const SCHEMA_VERSION: u32 = 1;
