use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A reference to a single cell of a template grid.
///
/// Rows and columns are **1-indexed**, matching the A1 form shown to editors:
/// - `row = 1` is grid row `1`
/// - `col = 1` is column `A`
///
/// Ordering is row-major, which is the order bindings are persisted in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    row: u32,
    col: u32,
}

impl CellAddress {
    /// Construct a new [`CellAddress`], rejecting zero coordinates.
    pub fn new(row: u32, col: u32) -> Result<Self, AddressError> {
        if row == 0 || col == 0 {
            return Err(AddressError::InvalidCoordinate { row, col });
        }
        Ok(Self { row, col })
    }

    /// 1-indexed row.
    #[inline]
    pub const fn row(self) -> u32 {
        self.row
    }

    /// 1-indexed column.
    #[inline]
    pub const fn col(self) -> u32 {
        self.col
    }

    /// Canonical A1 form (e.g. `A1`, `AB12`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row)
    }

    /// Parse the canonical A1 form. See [`decode`] for the accepted grammar.
    pub fn from_a1(a1: &str) -> Result<Self, AddressError> {
        let (row, col) = decode(a1)?;
        Ok(Self { row, col })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&col_to_name(self.col))?;
        write!(f, "{}", self.row)
    }
}

impl FromStr for CellAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_a1(s)
    }
}

// Addresses cross the wire in their canonical string form.
impl Serialize for CellAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CellAddress::from_a1(&raw).map_err(serde::de::Error::custom)
    }
}

/// Encode a 1-indexed `(row, col)` pair into its A1 string.
pub fn encode(row: u32, col: u32) -> Result<String, AddressError> {
    Ok(CellAddress::new(row, col)?.to_a1())
}

/// Decode an A1 string into a 1-indexed `(row, col)` pair.
///
/// Only the canonical form is accepted: one or more uppercase letters followed by a
/// row number without leading zeros (`[A-Z]+[1-9][0-9]*`). No `$` markers, no
/// surrounding whitespace.
pub fn decode(address: &str) -> Result<(u32, u32), AddressError> {
    let malformed = || AddressError::MalformedAddress(address.to_string());

    let bytes = address.as_bytes();
    let split = bytes
        .iter()
        .position(|b| !b.is_ascii_uppercase())
        .ok_or_else(malformed)?;
    if split == 0 {
        return Err(malformed());
    }

    let (letters, digits) = bytes.split_at(split);
    if digits.first() == Some(&b'0') || !digits.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }

    let col = name_to_col(letters).ok_or_else(malformed)?;
    let row = digits.iter().try_fold(0u32, |acc, b| {
        acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
    });
    let row = row.ok_or_else(malformed)?;

    Ok((row, col))
}

/// An inclusive rectangle of grid cells.
///
/// Always normalized such that `1 <= top <= bottom` and `1 <= left <= right`; the
/// fields are private so every constructor upholds this. Serialized in A1 range form
/// (`"B2:D3"`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rect {
    top: u32,
    left: u32,
    bottom: u32,
    right: u32,
}

impl Rect {
    #[inline]
    pub const fn top(&self) -> u32 {
        self.top
    }

    #[inline]
    pub const fn left(&self) -> u32 {
        self.left
    }

    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.bottom
    }

    #[inline]
    pub const fn right(&self) -> u32 {
        self.right
    }

    /// Bottom-right cell.
    #[inline]
    pub fn end(&self) -> CellAddress {
        CellAddress {
            row: self.bottom,
            col: self.right,
        }
    }

    /// Construct the rectangle spanned by two corner cells, normalizing if needed.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            top: a.row.min(b.row),
            left: a.col.min(b.col),
            bottom: a.row.max(b.row),
            right: a.col.max(b.col),
        }
    }

    /// The rectangle anchored at `origin` covering `rows` × `cols` cells.
    ///
    /// Returns `None` for a zero span or when the far edge overflows `u32`.
    pub fn from_span(origin: CellAddress, rows: u32, cols: u32) -> Option<Self> {
        if rows == 0 || cols == 0 {
            return None;
        }
        Some(Self {
            top: origin.row,
            left: origin.col,
            bottom: origin.row.checked_add(rows - 1)?,
            right: origin.col.checked_add(cols - 1)?,
        })
    }

    /// Top-left cell.
    #[inline]
    pub fn origin(&self) -> CellAddress {
        CellAddress {
            row: self.top,
            col: self.left,
        }
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.top == self.bottom && self.left == self.right
    }

    /// Returns true if `cell` lies within this rectangle.
    #[inline]
    pub const fn contains(&self, cell: CellAddress) -> bool {
        cell.row >= self.top && cell.row <= self.bottom && cell.col >= self.left && cell.col <= self.right
    }

    /// Two rectangles intersect iff both their row ranges and column ranges overlap.
    #[inline]
    pub const fn intersects(&self, other: &Rect) -> bool {
        self.top <= other.bottom
            && other.top <= self.bottom
            && self.left <= other.right
            && other.left <= self.right
    }

    /// Iterate the covered cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.top..=self.bottom)
            .flat_map(move |row| (self.left..=self.right).map(move |col| CellAddress { row, col }))
    }

    /// Parse `B2:D3`, or a single-cell reference like `C3`.
    pub fn from_a1(a1: &str) -> Result<Self, AddressError> {
        match a1.split_once(':') {
            None => {
                let cell = CellAddress::from_a1(a1)?;
                Ok(Rect::new(cell, cell))
            }
            Some((a, b)) => Ok(Rect::new(CellAddress::from_a1(a)?, CellAddress::from_a1(b)?)),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.origin();
        if self.is_single_cell() {
            write!(f, "{start}")
        } else {
            write!(f, "{start}:{}", self.end())
        }
    }
}

impl FromStr for Rect {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_a1(s)
    }
}

impl Serialize for Rect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rect::from_a1(&raw).map_err(serde::de::Error::custom)
    }
}

/// Errors produced while encoding or decoding cell addresses.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid coordinate ({row}, {col}): rows and columns start at 1")]
    InvalidCoordinate { row: u32, col: u32 },
    #[error("malformed cell address {0:?}")]
    MalformedAddress(String),
}

fn col_to_name(col: u32) -> String {
    // Bijective base-26: there is no zero digit, so shift by one on every step.
    let mut n = col;
    let mut out = Vec::<u8>::with_capacity(4);
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.iter().rev().map(|&b| char::from(b)).collect()
}

fn name_to_col(letters: &[u8]) -> Option<u32> {
    letters.iter().try_fold(0u32, |col, &b| {
        col.checked_mul(26)?.checked_add(u32::from(b - b'A') + 1)
    })
}
