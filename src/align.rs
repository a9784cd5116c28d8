use crate::context::RunContext;
use crate::graph::TaskGraph;
use crate::kernel::local::{LocalKernel, Score, Scoring};
use crate::kernel::TileKernel;
use crate::params::WavefrontParams;
use crate::pool;
use crate::stats::RunStats;
use crate::tiling::{TileCoord, Tiling};
use crate::{Result, Seq};
use log::debug;
use std::time::Instant;

/// Runs tile kernels over the wavefront of a pair of sequences.
#[derive(Debug, Clone, Default)]
pub struct Wavefront {
    pub params: WavefrontParams,
}

/// The output of a run: the final workspace of every worker, in worker order.
#[derive(Debug)]
pub struct Run<W> {
    pub workspaces: Vec<W>,
    pub stats: RunStats,
}

impl Wavefront {
    pub fn new(params: WavefrontParams) -> Self {
        Self { params }
    }

    /// The tiling this configuration induces on `a` and `b`.
    pub fn tiling(&self, a: Seq, b: Seq) -> Result<Tiling> {
        self.params.validate()?;
        Tiling::new(a.len(), b.len(), self.params.tile_size)
    }

    /// Computes every tile of `a x b` with `kernel`.
    pub fn run<K: TileKernel>(&self, a: Seq, b: Seq, kernel: &K) -> Result<Run<K::Workspace>> {
        self.params.validate()?;
        let ctx = RunContext::new(a, b, self.params.tile_size, self.params.policy)?;
        let graph = TaskGraph::new(ctx.tiling.cols(), ctx.tiling.rows())?;
        let threads = self.params.num_threads();
        debug!(
            "Wavefront over {}x{} tiles of size {} for |a|={} |b|={}: {threads} threads, {}",
            graph.cols(),
            graph.rows(),
            ctx.tiling.tile_size,
            a.len(),
            b.len(),
            ctx.policy
        );

        let start = Instant::now();
        let parts = pool::invoke(&graph, &ctx, kernel, threads)?;
        let duration = start.elapsed();
        debug_assert!(graph.all_resolved());

        let (workspaces, per_worker): (Vec<_>, Vec<_>) = parts.into_iter().unzip();
        let stats = RunStats::new((graph.cols(), graph.rows()), per_worker, duration);
        assert_eq!(stats.totals.tiles, graph.len());
        debug!("{stats}");
        Ok(Run { workspaces, stats })
    }
}

/// Best local alignment score and where it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAlignment {
    pub score: Score,
    /// The tile holding the last cell of the alignment.
    pub tile: TileCoord,
    /// Exclusive end in `a`. 0 for the empty alignment.
    pub end_a: usize,
    /// Exclusive end in `b`. 0 for the empty alignment.
    pub end_b: usize,
}

/// Smith-Waterman score of `a` and `b`, computed in parallel over tiles.
///
/// Ties between equally scoring cells resolve to the first tile in
/// column-major order, and within a tile to the first cell in column-major
/// order, independent of the number of threads and the policy.
pub fn local_align(
    a: Seq,
    b: Seq,
    scoring: Scoring,
    params: &WavefrontParams,
) -> Result<(LocalAlignment, RunStats)> {
    let wf = Wavefront::new(params.clone());
    let kernel = LocalKernel::new(scoring, wf.tiling(a, b)?)?;
    let run = wf.run(a, b, &kernel)?;

    let best = kernel.best();
    let (end_a, end_b) = if best.score() > 0 {
        kernel.end_position(&best)
    } else {
        (0, 0)
    };
    Ok((
        LocalAlignment {
            score: best.score(),
            tile: best.best_tile,
            end_a,
            end_b,
        },
        run.stats,
    ))
}
