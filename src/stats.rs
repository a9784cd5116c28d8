use derive_more::AddAssign;
use std::fmt;
use std::time::Duration;

/// Counters kept by each worker, summed after the run.
#[derive(Default, Clone, Copy, AddAssign, Debug, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tiles executed, scalar or batched.
    pub tiles: usize,
    /// Tiles run through the scalar kernel.
    pub scalar_runs: usize,
    /// Full SIMD batches run.
    pub simd_batches: usize,
    /// Tiles run as part of a SIMD batch.
    pub simd_tiles: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RunStats {
    pub threads: usize,
    /// `(cols, rows)` of the tile grid.
    pub grid: (usize, usize),
    pub totals: WorkerStats,
    pub per_worker: Vec<WorkerStats>,
    pub duration: Duration,
}

impl RunStats {
    pub fn new(grid: (usize, usize), per_worker: Vec<WorkerStats>, duration: Duration) -> Self {
        let mut totals = WorkerStats::default();
        for w in &per_worker {
            totals += *w;
        }
        Self {
            threads: per_worker.len(),
            grid,
            totals,
            per_worker,
            duration,
        }
    }

    /// Fraction of tiles that ran inside a SIMD batch.
    pub fn simd_fraction(&self) -> f64 {
        if self.totals.tiles == 0 {
            return 0.;
        }
        self.totals.simd_tiles as f64 / self.totals.tiles as f64
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} tiles on {} threads in {:.3}s: {} scalar, {} batches ({:.1}% simd)",
            self.grid.0,
            self.grid.1,
            self.threads,
            self.duration.as_secs_f64(),
            self.totals.scalar_runs,
            self.totals.simd_batches,
            100. * self.simd_fraction()
        )
    }
}
