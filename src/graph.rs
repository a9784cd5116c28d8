//! The tile dependency graph.
//!
//! All tasks live in a single dense arena owned by [`TaskGraph`], laid out
//! column-major: task `(col, row)` has id `col * rows + row`. Successor links
//! are ids into that arena, so a task never owns its neighbours.
//!
//! Each task carries the number of unfinished predecessors. A finished task
//! decrements the counters of the tile to its right (`col + 1`) and the tile
//! below it (`row + 1`); whoever brings a counter to zero enqueues that task.
//! The decrement is `AcqRel`, so everything the predecessors wrote is visible
//! to the worker that runs the successor.

use crate::tiling::TileCoord;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Index of a task in the [`TaskGraph`] arena.
pub type TaskId = usize;

#[derive(Debug)]
pub struct TileTask {
    pub coord: TileCoord,
    /// Number of predecessors that have not finished yet.
    pending: AtomicU32,
    /// `[(col + 1, row), (col, row + 1)]`, when inside the grid.
    successors: [Option<TaskId>; 2],
    /// Only set for the bottom-right tile.
    is_last: bool,
}

impl TileTask {
    pub fn successors(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.successors.iter().flatten().copied()
    }

    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Current number of unresolved predecessors.
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    fn set_pending(&self, n: u32) {
        self.pending.store(n, Ordering::Relaxed);
    }

    /// Adds a predecessor. Returns the new count.
    pub fn increment(&self) -> u32 {
        self.pending.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Resolves one predecessor and returns the remaining count.
    /// Exactly one caller observes `0`.
    pub fn decrement(&self) -> u32 {
        let prev = self.pending.fetch_sub(1, Ordering::AcqRel);
        assert!(
            prev > 0,
            "Dependency counter of tile {} underflowed",
            self.coord
        );
        prev - 1
    }
}

#[derive(Debug)]
pub struct TaskGraph {
    cols: usize,
    rows: usize,
    tasks: Vec<TileTask>,
}

impl TaskGraph {
    /// Builds a fully wired `cols x rows` grid. Fails for empty grids.
    pub fn new(cols: usize, rows: usize) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(Error::EmptyGrid { cols, rows });
        }
        let len = cols
            .checked_mul(rows)
            .filter(|&len| len <= TaskId::MAX / 2)
            .ok_or_else(|| Error::invalid("grid", format!("{cols}x{rows} tiles is too large")))?;

        let mut tasks = Vec::with_capacity(len);
        for col in 0..cols {
            for row in 0..rows {
                let id = col * rows + row;
                let right = (col + 1 < cols).then_some(id + rows);
                let down = (row + 1 < rows).then_some(id + 1);
                tasks.push(TileTask {
                    coord: TileCoord::new(col, row),
                    pending: AtomicU32::new(0),
                    successors: [right, down],
                    is_last: false,
                });
            }
        }
        let mut graph = Self { cols, rows, tasks };
        graph.reset();
        graph.tasks[len - 1].is_last = true;
        Ok(graph)
    }

    /// Restores all dependency counters to their initial values, so the graph
    /// can be run again.
    pub fn reset(&mut self) {
        for t in &self.tasks {
            t.set_pending((t.coord.col > 0) as u32 + (t.coord.row > 0) as u32);
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn id(&self, c: TileCoord) -> TaskId {
        assert!(c.col < self.cols && c.row < self.rows, "Tile {c} outside grid");
        c.col * self.rows + c.row
    }

    pub fn coord(&self, id: TaskId) -> TileCoord {
        self.tasks[id].coord
    }

    pub fn task(&self, id: TaskId) -> &TileTask {
        &self.tasks[id]
    }

    pub fn tasks(&self) -> &[TileTask] {
        &self.tasks
    }

    /// The top-left tile; the only task that is ready from the start.
    pub fn first(&self) -> TaskId {
        0
    }

    /// The bottom-right tile; its completion ends the run.
    pub fn last(&self) -> TaskId {
        self.tasks.len() - 1
    }

    /// True when every dependency counter has reached zero.
    pub fn all_resolved(&self) -> bool {
        self.tasks.iter().all(|t| t.pending() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn initial_counters() {
        let g = TaskGraph::new(3, 4).unwrap();
        for (col, row) in (0..3).cartesian_product(0..4) {
            let t = g.task(g.id(TileCoord::new(col, row)));
            assert_eq!(t.pending(), (col > 0) as u32 + (row > 0) as u32);
        }
    }

    #[test]
    fn successors() {
        let g = TaskGraph::new(3, 2).unwrap();
        let succ = |col, row| {
            g.task(g.id(TileCoord::new(col, row)))
                .successors()
                .map(|id| g.coord(id))
                .collect_vec()
        };
        assert_eq!(succ(0, 0), [TileCoord::new(1, 0), TileCoord::new(0, 1)]);
        assert_eq!(succ(2, 0), [TileCoord::new(2, 1)]);
        assert_eq!(succ(1, 1), [TileCoord::new(2, 1)]);
        assert!(succ(2, 1).is_empty());
    }

    #[test]
    fn single_terminal() {
        let g = TaskGraph::new(4, 5).unwrap();
        let last = g.tasks().iter().filter(|t| t.is_last()).collect_vec();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].coord, TileCoord::new(3, 4));
        assert_eq!(g.coord(g.last()), TileCoord::new(3, 4));
        assert_eq!(g.coord(g.first()), TileCoord::new(0, 0));
    }

    #[test]
    fn one_by_one() {
        let g = TaskGraph::new(1, 1).unwrap();
        assert_eq!(g.first(), g.last());
        assert!(g.task(0).is_last());
        assert!(g.all_resolved());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(TaskGraph::new(0, 3), Err(Error::EmptyGrid { .. })));
        assert!(matches!(TaskGraph::new(3, 0), Err(Error::EmptyGrid { .. })));
    }

    #[test]
    fn decrement_reaches_zero_once() {
        let g = TaskGraph::new(2, 2).unwrap();
        let t = g.task(g.last());
        assert_eq!(t.decrement(), 1);
        assert_eq!(t.decrement(), 0);
        assert_eq!(t.increment(), 1);
        assert_eq!(t.decrement(), 0);
    }

    #[test]
    #[should_panic(expected = "underflowed")]
    fn decrement_underflow_panics() {
        let g = TaskGraph::new(2, 2).unwrap();
        g.task(g.first()).decrement();
    }

    #[test]
    fn reset_restores_counters() {
        let mut g = TaskGraph::new(2, 2).unwrap();
        for id in 1..g.len() {
            while g.task(id).pending() > 0 {
                g.task(id).decrement();
            }
        }
        assert!(g.all_resolved());
        g.reset();
        assert_eq!(g.task(g.last()).pending(), 2);
    }
}
