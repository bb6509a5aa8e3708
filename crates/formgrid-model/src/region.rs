use std::collections::BTreeMap;

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellAddress, GridDimensions, Rect};

/// Identifier of a region within one [`RegionIndex`]. Ids are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(u32);

impl RegionId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A rectangular span of cells placed as one unit (a merged cell or a block).
///
/// Only the origin cell renders content or accepts a binding; every other covered
/// cell is suppressed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub id: RegionId,
    pub rect: Rect,
}

impl Region {
    #[inline]
    pub fn origin(&self) -> CellAddress {
        self.rect.origin()
    }

    #[inline]
    pub const fn row_span(&self) -> u32 {
        self.rect.height()
    }

    #[inline]
    pub const fn col_span(&self) -> u32 {
        self.rect.width()
    }
}

/// What occupies a given cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellStatus {
    Free,
    RegionOrigin(Region),
    RegionCovered(Region),
}

impl CellStatus {
    pub fn region(&self) -> Option<&Region> {
        match self {
            CellStatus::Free => None,
            CellStatus::RegionOrigin(r) | CellStatus::RegionCovered(r) => Some(r),
        }
    }

    /// Free cells and region origins may hold their own binding.
    pub fn is_bindable(&self) -> bool {
        !matches!(self, CellStatus::RegionCovered(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{candidate} overlaps region {existing_id} at {existing}")]
pub struct OverlapError {
    pub candidate: Rect,
    pub existing_id: RegionId,
    pub existing: Rect,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error(transparent)]
    Overlap(#[from] OverlapError),
    #[error("region span must be at least 1x1 and fit the grid, got {rows}x{cols}")]
    InvalidSpan { rows: u32, cols: u32 },
    #[error("region {0} not found")]
    NotFound(RegionId),
    #[error("region id {0} is already in use")]
    DuplicateId(RegionId),
    #[error("{rect} lies outside the {dimensions} grid")]
    OutOfBounds {
        rect: Rect,
        dimensions: GridDimensions,
    },
}

/// Set of non-overlapping regions over a grid.
///
/// Overlap checks are a linear scan over the stored rectangles, which is ample for
/// editor-sized templates (tens of regions).
#[derive(Clone, Debug, Default)]
pub struct RegionIndex {
    regions: BTreeMap<RegionId, Region>,
    next_id: u32,
}

impl RegionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Regions in id (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Regions ordered by origin, row-major.
    pub fn sorted_by_origin(&self) -> Vec<Region> {
        let mut out: Vec<Region> = self.regions.values().copied().collect();
        out.sort_by_key(|r| (r.origin(), r.id));
        out
    }

    /// Fail if `rect` shares a cell with any region other than `ignoring`.
    pub fn check_vacant(&self, rect: Rect, ignoring: Option<RegionId>) -> Result<(), OverlapError> {
        match self
            .regions
            .values()
            .find(|r| Some(r.id) != ignoring && r.rect.intersects(&rect))
        {
            Some(existing) => Err(OverlapError {
                candidate: rect,
                existing_id: existing.id,
                existing: existing.rect,
            }),
            None => Ok(()),
        }
    }

    /// Store a new region, rejecting any overlap with existing ones.
    pub fn add(&mut self, rect: Rect) -> Result<RegionId, OverlapError> {
        self.check_vacant(rect, None)?;
        self.next_id += 1;
        let id = RegionId(self.next_id);
        self.regions.insert(id, Region { id, rect });
        log::debug!("added region {id} at {rect}");
        Ok(id)
    }

    /// Store a region under a caller-chosen id (used when restoring a snapshot).
    pub fn insert(&mut self, id: RegionId, rect: Rect) -> Result<(), RegionError> {
        if self.regions.contains_key(&id) {
            return Err(RegionError::DuplicateId(id));
        }
        self.check_vacant(rect, None)?;
        self.regions.insert(id, Region { id, rect });
        self.next_id = self.next_id.max(id.0);
        Ok(())
    }

    /// Remove a region. Unknown ids are ignored.
    pub fn remove(&mut self, id: RegionId) -> Option<Region> {
        let removed = self.regions.remove(&id);
        if let Some(region) = &removed {
            log::debug!("removed region {id} at {}", region.rect);
        }
        removed
    }

    /// Classify `address` as free, a region origin, or covered by a region.
    pub fn locate(&self, address: CellAddress) -> CellStatus {
        match self.regions.values().find(|r| r.rect.contains(address)) {
            None => CellStatus::Free,
            Some(region) if region.origin() == address => CellStatus::RegionOrigin(*region),
            Some(region) => CellStatus::RegionCovered(*region),
        }
    }

    /// Change a region's span while keeping its origin.
    ///
    /// The new rectangle is validated against every other region before anything is
    /// written; on error the region is unchanged. Returns the previous rectangle.
    pub fn resize(&mut self, id: RegionId, rows: u32, cols: u32) -> Result<Rect, RegionError> {
        let current = *self.regions.get(&id).ok_or(RegionError::NotFound(id))?;
        let rect = Rect::from_span(current.origin(), rows, cols)
            .ok_or(RegionError::InvalidSpan { rows, cols })?;
        self.check_vacant(rect, Some(id))?;

        if let Some(region) = self.regions.get_mut(&id) {
            region.rect = rect;
        }
        log::debug!("resized region {id} from {} to {rect}", current.rect);
        Ok(current.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(a1: &str) -> Rect {
        Rect::from_a1(a1).unwrap()
    }

    fn cell(a1: &str) -> CellAddress {
        CellAddress::from_a1(a1).unwrap()
    }

    #[test]
    fn overlapping_add_is_rejected() {
        let mut index = RegionIndex::new();
        let a = index.add(rect("A1:B2")).unwrap();

        let err = index.add(rect("B2:C3")).unwrap_err();
        assert_eq!(err.existing_id, a);
        assert_eq!(err.existing, rect("A1:B2"));
        assert_eq!(err.to_string(), "B2:C3 overlaps region #1 at A1:B2");
        assert_eq!(index.len(), 1);

        // Edge-adjacent rectangles share no cell.
        index.add(rect("C1:C2")).unwrap();
        index.add(rect("A3:B3")).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn locate_distinguishes_origin_and_covered() {
        let mut index = RegionIndex::new();
        let id = index.add(rect("B2:C3")).unwrap();

        assert_eq!(index.locate(cell("A1")), CellStatus::Free);
        match index.locate(cell("B2")) {
            CellStatus::RegionOrigin(r) => assert_eq!(r.id, id),
            other => panic!("expected origin, got {other:?}"),
        }
        for covered in ["C2", "B3", "C3"] {
            assert!(matches!(index.locate(cell(covered)), CellStatus::RegionCovered(r) if r.id == id));
        }
        assert_eq!(index.locate(cell("D2")), CellStatus::Free);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut index = RegionIndex::new();
        let id = index.add(rect("A1:A2")).unwrap();
        assert!(index.remove(id).is_some());
        assert!(index.remove(id).is_none());
        assert!(index.remove(RegionId::new(99)).is_none());
        assert_eq!(index.locate(cell("A2")), CellStatus::Free);
    }

    #[test]
    fn ids_are_not_reused() {
        let mut index = RegionIndex::new();
        let a = index.add(rect("A1")).unwrap();
        index.remove(a);
        let b = index.add(rect("A1")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn failed_resize_leaves_region_unchanged() {
        let mut index = RegionIndex::new();
        let a = index.add(rect("A1:B1")).unwrap();
        index.add(rect("D1")).unwrap();

        let err = index.resize(a, 1, 4).unwrap_err();
        assert!(matches!(err, RegionError::Overlap(_)));
        assert_eq!(index.get(a).unwrap().rect, rect("A1:B1"));

        assert_eq!(
            index.resize(a, 0, 1),
            Err(RegionError::InvalidSpan { rows: 0, cols: 1 })
        );
        assert_eq!(
            index.resize(RegionId::new(42), 1, 1),
            Err(RegionError::NotFound(RegionId::new(42)))
        );

        // Growing into free space and shrinking both succeed; the region never
        // conflicts with itself.
        assert_eq!(index.resize(a, 2, 3).unwrap(), rect("A1:B1"));
        assert_eq!(index.get(a).unwrap().rect, rect("A1:C2"));
        index.resize(a, 1, 1).unwrap();
        assert_eq!(index.get(a).unwrap().rect, rect("A1"));
    }

    #[test]
    fn insert_preserves_ids_and_advances_counter() {
        let mut index = RegionIndex::new();
        index.insert(RegionId::new(7), rect("A1:B1")).unwrap();
        assert_eq!(
            index.insert(RegionId::new(7), rect("D4")),
            Err(RegionError::DuplicateId(RegionId::new(7)))
        );
        let next = index.add(rect("C3")).unwrap();
        assert_eq!(next, RegionId::new(8));
    }
}
