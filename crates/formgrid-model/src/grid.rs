use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{CellAddress, Rect};

/// Maximum rows a grid may grow to (Excel sheet bound).
pub const MAX_GRID_ROWS: u32 = 1_048_576;

/// Maximum columns a grid may grow to (Excel sheet bound, column `XFD`).
pub const MAX_GRID_COLS: u32 = 16_384;

/// Size of a template grid. Both dimensions are at least 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDimensions {
    pub rows: u32,
    pub columns: u32,
}

impl GridDimensions {
    pub const fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns }
    }

    /// The whole grid as a rectangle, or `None` for a degenerate size.
    pub fn bounds(&self) -> Option<Rect> {
        let origin = CellAddress::new(1, 1).ok()?;
        Rect::from_span(origin, self.rows, self.columns)
    }

    #[inline]
    pub const fn contains(&self, cell: CellAddress) -> bool {
        cell.row() <= self.rows && cell.col() <= self.columns
    }

    #[inline]
    pub const fn contains_rect(&self, rect: &Rect) -> bool {
        rect.bottom() <= self.rows && rect.right() <= self.columns
    }
}

impl Default for GridDimensions {
    /// A single cell.
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for GridDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

/// Bounds an editor may resize a grid within.
///
/// The table-template editor, for example, keeps at least 5 rows and between 3 and
/// 10 columns; the mapping editor works on a fixed 100x35 sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridLimits {
    pub min_rows: u32,
    pub max_rows: u32,
    pub min_columns: u32,
    pub max_columns: u32,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            min_rows: 1,
            max_rows: MAX_GRID_ROWS,
            min_columns: 1,
            max_columns: MAX_GRID_COLS,
        }
    }
}

impl GridLimits {
    pub fn allows(&self, dims: GridDimensions) -> bool {
        dims.rows >= self.min_rows.max(1)
            && dims.rows <= self.max_rows
            && dims.columns >= self.min_columns.max(1)
            && dims.columns <= self.max_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_checks_far_edges() {
        let dims = GridDimensions::new(10, 6);
        assert!(dims.contains(CellAddress::from_a1("F10").unwrap()));
        assert!(!dims.contains(CellAddress::from_a1("G1").unwrap()));
        assert!(!dims.contains(CellAddress::from_a1("A11").unwrap()));
        assert!(dims.contains_rect(&Rect::from_a1("B2:F10").unwrap()));
        assert!(!dims.contains_rect(&Rect::from_a1("B2:G2").unwrap()));
        assert_eq!(dims.bounds(), Some(Rect::from_a1("A1:F10").unwrap()));
    }

    #[test]
    fn limits_never_allow_empty_grids() {
        let limits = GridLimits {
            min_rows: 0,
            min_columns: 0,
            ..GridLimits::default()
        };
        assert!(!limits.allows(GridDimensions::new(0, 4)));
        assert!(limits.allows(GridDimensions::new(1, 1)));
    }
}
