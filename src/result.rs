//! Reduction of per-tile best-score candidates.
//!
//! Candidates are only accepted when strictly better than the current best,
//! so on ties the earliest recorded candidate wins. Merging reducers is the
//! same fold, which makes the final tile depend on merge order when scores
//! tie; callers that need reproducible tiles fold in a fixed order.

use crate::tiling::TileCoord;
use num_traits::Bounded;

/// A best score together with an auxiliary value recorded alongside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State<T> {
    pub score: T,
    pub aux: u32,
}

impl<T> State<T> {
    pub fn new(score: T, aux: u32) -> Self {
        Self { score, aux }
    }
}

impl<T: Bounded> Default for State<T> {
    fn default() -> Self {
        Self {
            score: T::min_value(),
            aux: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntermediateResult<T> {
    pub best_state: State<T>,
    /// The tile in which `best_state` was observed.
    pub best_tile: TileCoord,
}

impl<T: Bounded> Default for IntermediateResult<T> {
    fn default() -> Self {
        Self {
            best_state: State::default(),
            best_tile: TileCoord::default(),
        }
    }
}

impl<T: Bounded + PartialOrd + Copy> IntermediateResult<T> {
    pub fn new(best_state: State<T>) -> Self {
        Self {
            best_state,
            best_tile: TileCoord::default(),
        }
    }

    pub fn with_tile(best_state: State<T>, col: usize, row: usize) -> Self {
        Self {
            best_state,
            best_tile: TileCoord::new(col, row),
        }
    }

    /// Replace the best state iff `state` scores strictly higher.
    /// Returns whether it was replaced.
    pub fn update_max(&mut self, state: State<T>, col: usize, row: usize) -> bool {
        if state.score > self.best_state.score {
            self.best_state = state;
            self.best_tile = TileCoord::new(col, row);
            true
        } else {
            false
        }
    }

    /// Reset to the minimum score in tile `(0, 0)`.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fold `other` into `self` with the same strict rule as `update_max`.
    pub fn merge(&mut self, other: &Self) -> bool {
        self.update_max(other.best_state, other.best_tile.col, other.best_tile.row)
    }

    /// Folds `results` left to right.
    pub fn reduce<'r>(results: impl IntoIterator<Item = &'r Self>) -> Self
    where
        T: 'r,
    {
        let mut acc = Self::default();
        for r in results {
            acc.merge(r);
        }
        acc
    }

    pub fn score(&self) -> T {
        self.best_state.score
    }

    /// True while no candidate has been accepted.
    pub fn is_empty(&self) -> bool {
        !(self.best_state.score > T::min_value())
    }
}
