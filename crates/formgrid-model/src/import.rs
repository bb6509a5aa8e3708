//! Building templates from an uploaded spreadsheet.
//!
//! Parsing `.xlsx` bytes happens elsewhere; this module consumes the parser's output
//! (sheet size, merged ranges and raw cell text) and turns it into an editable
//! [`Template`] with one region per merged range.

use serde::{Deserialize, Serialize};

use crate::{CellAddress, CellStatus, EngineConfig, GridDimensions, Rect, Template, TemplateError};

/// One merged range as reported by the spreadsheet parser (1-based, inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedMerge {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl ImportedMerge {
    pub fn to_rect(&self) -> Result<Rect, TemplateError> {
        let start = CellAddress::new(self.min_row, self.min_col)?;
        let end = CellAddress::new(self.max_row, self.max_col)?;
        Ok(Rect::new(start, end))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedCell {
    pub address: CellAddress,
    pub value: String,
}

/// A parsed worksheet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedSheet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    pub max_row: u32,
    pub max_column: u32,
    #[serde(default)]
    pub merged_cells: Vec<ImportedMerge>,
    #[serde(default)]
    pub cells: Vec<ImportedCell>,
}

/// What an import kept and what it had to drop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub dimensions: GridDimensions,
    pub regions: usize,
    pub values: usize,
    /// Non-empty cells hidden under a merged range (only the top-left cell survives).
    pub dropped_covered: Vec<CellAddress>,
    /// Non-empty cells past the declared sheet size.
    pub dropped_outside: Vec<CellAddress>,
}

impl Template {
    /// Build a template from a parsed sheet.
    ///
    /// The grid takes the declared sheet size, grown if a merged range reaches past
    /// it. Overlapping merged ranges are an error. Cell text under a merged range
    /// (other than its origin) and text outside the grid are dropped and listed in
    /// the report.
    pub fn from_import(sheet: &ImportedSheet, config: &EngineConfig) -> Result<(Template, ImportReport), TemplateError> {
        let mut rects = Vec::with_capacity(sheet.merged_cells.len());
        for merge in &sheet.merged_cells {
            rects.push(merge.to_rect()?);
        }

        let rows = rects.iter().map(Rect::bottom).fold(sheet.max_row.max(1), u32::max);
        let columns = rects.iter().map(Rect::right).fold(sheet.max_column.max(1), u32::max);
        let dimensions = GridDimensions::new(rows, columns);
        let mut template = Template::new(dimensions, config)?;

        for rect in &rects {
            template.merge(*rect)?;
        }

        let mut report = ImportReport {
            dimensions,
            regions: rects.len(),
            ..ImportReport::default()
        };

        for cell in &sheet.cells {
            if cell.value.is_empty() {
                continue;
            }
            if !dimensions.contains(cell.address) {
                log::warn!("dropping value at {}: outside the {dimensions} sheet", cell.address);
                report.dropped_outside.push(cell.address);
                continue;
            }
            if let CellStatus::RegionCovered(region) = template.locate(cell.address) {
                log::warn!(
                    "dropping value at {}: covered by merged range {}",
                    cell.address,
                    region.rect
                );
                report.dropped_covered.push(cell.address);
                continue;
            }
            template.set_value(cell.address, cell.value.clone())?;
            report.values += 1;
        }

        log::debug!(
            "imported sheet {} as {dimensions} grid with {} regions and {} values",
            sheet.sheet_name.as_deref().unwrap_or("<unnamed>"),
            report.regions,
            report.values
        );
        Ok((template, report))
    }
}
