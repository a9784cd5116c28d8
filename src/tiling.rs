use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Position of a tile in the grid.
/// `col` indexes along `a`, `row` along `b`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub col: usize,
    pub row: usize,
}

impl TileCoord {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Partition of the `|a| x |b|` DP matrix into square tiles of `tile_size`
/// cells. The last column and row of tiles may be narrower.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tiling {
    pub len_a: usize,
    pub len_b: usize,
    pub tile_size: usize,
}

impl Tiling {
    pub fn new(len_a: usize, len_b: usize, tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(Error::invalid("tile-size", "must be >= 1"));
        }
        let tiling = Self {
            len_a,
            len_b,
            tile_size,
        };
        if tiling.cols() == 0 || tiling.rows() == 0 {
            return Err(Error::EmptyGrid {
                cols: tiling.cols(),
                rows: tiling.rows(),
            });
        }
        Ok(tiling)
    }

    /// Number of tile columns, `H`.
    pub fn cols(&self) -> usize {
        self.len_a.div_ceil(self.tile_size)
    }

    /// Number of tile rows, `V`.
    pub fn rows(&self) -> usize {
        self.len_b.div_ceil(self.tile_size)
    }

    /// Positions of `a` covered by tile column `col`.
    pub fn col_range(&self, col: usize) -> Range<usize> {
        debug_assert!(col < self.cols());
        let start = col * self.tile_size;
        start..(start + self.tile_size).min(self.len_a)
    }

    /// Positions of `b` covered by tile row `row`.
    pub fn row_range(&self, row: usize) -> Range<usize> {
        debug_assert!(row < self.rows());
        let start = row * self.tile_size;
        start..(start + self.tile_size).min(self.len_b)
    }

    /// Width and height of the given tile in cells.
    pub fn dims(&self, t: TileCoord) -> (usize, usize) {
        (self.col_range(t.col).len(), self.row_range(t.row).len())
    }
}
