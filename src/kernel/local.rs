//! Local alignment (Smith-Waterman, linear gap cost) computed tile by tile.
//!
//! `M[x][y]` is the best score of a local alignment ending in `a[x-1]` and
//! `b[y-1]`, with `M[0][_] = M[_][0] = 0`. A tile covering `a[xs..xe]` and
//! `b[ys..ye]` computes `M[xs+1..=xe][ys+1..=ye]` from
//! - its left input `M[xs][ys..=ye]`, the last column of tile `(col-1, row)`,
//! - its top input `M[xs..=xe][ys]`, the last row of tile `(col, row-1)`,
//!
//! and publishes its own last column and last row exactly once.
//!
//! The auxiliary value of a best state is the offset `dx * tile_size + dy` of
//! the cell inside its tile.

use super::TileKernel;
use crate::context::RunContext;
use crate::params::MAX_SIMD_WIDTH;
use crate::result::{IntermediateResult, State};
use crate::tiling::{TileCoord, Tiling};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::max;
use std::sync::OnceLock;

pub type Score = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoring {
    pub match_score: Score,
    /// Usually negative.
    pub mismatch: Score,
    /// Score of a single gap position. Usually negative.
    pub gap: Score,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch: -1,
            gap: -2,
        }
    }
}

impl Scoring {
    #[inline(always)]
    pub fn sub(&self, x: u8, y: u8) -> Score {
        if x == y {
            self.match_score
        } else {
            self.mismatch
        }
    }

    /// One cell of the recurrence.
    #[inline(always)]
    fn cell(&self, diag: Score, left: Score, up: Score, x: u8, y: u8) -> Score {
        max(0, max(diag + self.sub(x, y), max(left, up) + self.gap))
    }
}

#[derive(Debug)]
struct TileOutput {
    /// `M[xe][ys..=ye]`
    last_col: Vec<Score>,
    /// `M[xs..=xe][ye]`
    last_row: Vec<Score>,
    best: IntermediateResult<Score>,
}

/// Per-worker scratch space.
#[derive(Debug, Default)]
pub struct LocalWorkspace {
    /// Previous and current column. In a batch, lane `l` of row `dy` lives
    /// at `dy * lanes + l`.
    prev: Vec<Score>,
    cur: Vec<Score>,
    a_lanes: Vec<u8>,
    b_lanes: Vec<u8>,
    top_lanes: Vec<Score>,
    lane_best: Vec<IntermediateResult<Score>>,
    last_cols: Vec<Vec<Score>>,
    last_rows: Vec<Vec<Score>>,

    /// Best cell over all tiles computed with this workspace.
    pub best: IntermediateResult<Score>,
    /// Number of tiles computed with this workspace.
    pub tiles: usize,
}

impl LocalWorkspace {
    fn record(&mut self, best: &IntermediateResult<Score>) {
        self.best.merge(best);
        self.tiles += 1;
    }
}

#[derive(Debug)]
pub struct LocalKernel {
    pub scoring: Scoring,
    tiling: Tiling,
    /// Column-major, like the task graph.
    outputs: Vec<OnceLock<TileOutput>>,
}

impl LocalKernel {
    pub fn new(scoring: Scoring, tiling: Tiling) -> Result<Self> {
        let ts = tiling.tile_size;
        if ts.checked_mul(ts).map_or(true, |cells| cells > u32::MAX as usize) {
            return Err(Error::invalid(
                "tile-size",
                format!("{ts}x{ts} cells do not fit a u32 offset"),
            ));
        }
        let n = tiling.cols() * tiling.rows();
        Ok(Self {
            scoring,
            tiling,
            outputs: (0..n).map(|_| OnceLock::new()).collect(),
        })
    }

    pub fn tiling(&self) -> Tiling {
        self.tiling
    }

    /// Forget all tile outputs so the kernel can be run again.
    pub fn reset(&mut self) {
        for o in &mut self.outputs {
            o.take();
        }
    }

    fn check_tiling(&self, ctx: &RunContext) {
        assert_eq!(
            ctx.tiling, self.tiling,
            "Kernel tiling does not match the run context"
        );
    }

    fn slot(&self, t: TileCoord) -> usize {
        t.col * self.tiling.rows() + t.row
    }

    fn output(&self, t: TileCoord) -> &TileOutput {
        self.outputs[self.slot(t)]
            .get()
            .unwrap_or_else(|| panic!("Tile {t} read before it was computed"))
    }

    fn publish(&self, t: TileCoord, out: TileOutput) {
        assert!(
            self.outputs[self.slot(t)].set(out).is_ok(),
            "Tile {t} computed twice"
        );
    }

    /// `M[xs][ys..=ye]`, or `None` on the left border.
    fn left_input(&self, t: TileCoord) -> Option<&[Score]> {
        (t.col > 0).then(|| &self.output(TileCoord::new(t.col - 1, t.row)).last_col[..])
    }

    /// `M[xs..=xe][ys]`, or `None` on the top border.
    fn top_input(&self, t: TileCoord) -> Option<&[Score]> {
        (t.row > 0).then(|| &self.output(TileCoord::new(t.col, t.row - 1)).last_row[..])
    }

    fn offset(&self, dx: usize, dy: usize) -> u32 {
        (dx * self.tiling.tile_size + dy) as u32
    }

    /// The best result of a computed tile.
    pub fn tile_best(&self, t: TileCoord) -> Option<IntermediateResult<Score>> {
        self.outputs[self.slot(t)].get().map(|o| o.best)
    }

    /// Folds the per-tile results in column-major tile order, so ties always
    /// resolve to the same tile regardless of thread count or batching.
    pub fn best(&self) -> IntermediateResult<Score> {
        IntermediateResult::reduce(self.outputs.iter().filter_map(|o| o.get()).map(|o| &o.best))
    }

    /// Exclusive end positions in `a` and `b` of the cell holding `r`.
    pub fn end_position(&self, r: &IntermediateResult<Score>) -> (usize, usize) {
        let ts = self.tiling.tile_size;
        let aux = r.best_state.aux as usize;
        (
            self.tiling.col_range(r.best_tile.col).start + aux / ts + 1,
            self.tiling.row_range(r.best_tile.row).start + aux % ts + 1,
        )
    }
}

impl TileKernel for LocalKernel {
    type Workspace = LocalWorkspace;

    fn workspace(&self, ctx: &RunContext) -> LocalWorkspace {
        // Capacity hint only. `new` bounds the tile size, the width is clamped
        // for contexts built without validated params.
        let lanes = ctx.simd_width().clamp(1, MAX_SIMD_WIDTH);
        let column = (self.tiling.tile_size + 1) * lanes;
        LocalWorkspace {
            prev: Vec::with_capacity(column),
            cur: Vec::with_capacity(column),
            ..Default::default()
        }
    }

    fn run_scalar(&self, ctx: &RunContext, t: TileCoord, ws: &mut LocalWorkspace) {
        self.check_tiling(ctx);
        let sc = self.scoring;
        let a = &ctx.a[self.tiling.col_range(t.col)];
        let b = &ctx.b[self.tiling.row_range(t.row)];
        let h = b.len();

        ws.prev.clear();
        match self.left_input(t) {
            Some(col) => ws.prev.extend_from_slice(col),
            None => ws.prev.resize(h + 1, 0),
        }
        ws.cur.clear();
        ws.cur.resize(h + 1, 0);
        let top = self.top_input(t);

        let mut last_row = Vec::with_capacity(a.len() + 1);
        last_row.push(ws.prev[h]);
        let mut best = IntermediateResult::default();
        for (dx, &ca) in a.iter().enumerate() {
            ws.cur[0] = top.map_or(0, |r| r[dx + 1]);
            for (dy, &cb) in b.iter().enumerate() {
                let v = sc.cell(ws.prev[dy], ws.prev[dy + 1], ws.cur[dy], ca, cb);
                ws.cur[dy + 1] = v;
                best.update_max(State::new(v, self.offset(dx, dy)), t.col, t.row);
            }
            last_row.push(ws.cur[h]);
            std::mem::swap(&mut ws.prev, &mut ws.cur);
        }

        ws.record(&best);
        self.publish(
            t,
            TileOutput {
                last_col: ws.prev.clone(),
                last_row,
                best,
            },
        );
    }

    /// One lane per tile. All lanes run over the largest tile in the batch;
    /// cells outside a lane's own tile are computed but never recorded.
    fn run_simd(&self, ctx: &RunContext, tiles: &[TileCoord], ws: &mut LocalWorkspace) {
        self.check_tiling(ctx);
        let sc = self.scoring;
        let lanes = tiles.len();
        let dims: SmallVec<[(usize, usize); 16]> =
            tiles.iter().map(|&t| self.tiling.dims(t)).collect();
        let wmax = dims.iter().map(|d| d.0).max().unwrap_or(0);
        let hmax = dims.iter().map(|d| d.1).max().unwrap_or(0);

        // Transpose the inputs into lane-interleaved buffers.
        for (buf, len) in [(&mut ws.a_lanes, wmax), (&mut ws.b_lanes, hmax)] {
            buf.clear();
            buf.resize(len * lanes, 0);
        }
        for (buf, len) in [
            (&mut ws.prev, hmax + 1),
            (&mut ws.cur, hmax + 1),
            (&mut ws.top_lanes, wmax + 1),
        ] {
            buf.clear();
            buf.resize(len * lanes, 0);
        }
        ws.lane_best.clear();
        ws.lane_best.resize(lanes, IntermediateResult::default());
        ws.last_cols.resize_with(lanes, Vec::new);
        ws.last_rows.resize_with(lanes, Vec::new);

        for (l, &t) in tiles.iter().enumerate() {
            let (w, h) = dims[l];
            for (dx, &c) in ctx.a[self.tiling.col_range(t.col)].iter().enumerate() {
                ws.a_lanes[dx * lanes + l] = c;
            }
            for (dy, &c) in ctx.b[self.tiling.row_range(t.row)].iter().enumerate() {
                ws.b_lanes[dy * lanes + l] = c;
            }
            if let Some(col) = self.left_input(t) {
                for (dy, &v) in col.iter().enumerate() {
                    ws.prev[dy * lanes + l] = v;
                }
            }
            if let Some(row) = self.top_input(t) {
                for (dx, &v) in row.iter().enumerate() {
                    ws.top_lanes[dx * lanes + l] = v;
                }
            }
            ws.last_rows[l].clear();
            ws.last_rows[l].reserve(w + 1);
            ws.last_rows[l].push(ws.prev[h * lanes + l]);
        }

        for dx in 0..wmax {
            let a_dx = dx * lanes;
            ws.cur[..lanes].copy_from_slice(&ws.top_lanes[a_dx + lanes..a_dx + 2 * lanes]);
            for dy in 0..hmax {
                let (up, here) = (dy * lanes, (dy + 1) * lanes);
                for l in 0..lanes {
                    ws.cur[here + l] = sc.cell(
                        ws.prev[up + l],
                        ws.prev[here + l],
                        ws.cur[up + l],
                        ws.a_lanes[a_dx + l],
                        ws.b_lanes[up + l],
                    );
                }
                for (l, &(w, h)) in dims.iter().enumerate() {
                    if dx < w && dy < h {
                        let t = tiles[l];
                        ws.lane_best[l].update_max(
                            State::new(ws.cur[here + l], self.offset(dx, dy)),
                            t.col,
                            t.row,
                        );
                    }
                }
            }
            for (l, &(w, h)) in dims.iter().enumerate() {
                if dx < w {
                    ws.last_rows[l].push(ws.cur[h * lanes + l]);
                }
                if dx + 1 == w {
                    ws.last_cols[l] = (0..=h).map(|dy| ws.cur[dy * lanes + l]).collect();
                }
            }
            std::mem::swap(&mut ws.prev, &mut ws.cur);
        }

        for (l, &t) in tiles.iter().enumerate() {
            let best = ws.lane_best[l];
            ws.record(&best);
            self.publish(
                t,
                TileOutput {
                    last_col: std::mem::take(&mut ws.last_cols[l]),
                    last_row: std::mem::take(&mut ws.last_rows[l]),
                    best,
                },
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::params::VecPolicy;
    use itertools::Itertools;

    /// Plain full-matrix Smith-Waterman.
    pub(crate) fn naive(a: &[u8], b: &[u8], sc: Scoring) -> Vec<Vec<Score>> {
        let mut m = vec![vec![0; b.len() + 1]; a.len() + 1];
        for x in 1..=a.len() {
            for y in 1..=b.len() {
                m[x][y] = sc.cell(m[x - 1][y - 1], m[x - 1][y], m[x][y - 1], a[x - 1], b[y - 1]);
            }
        }
        m
    }

    fn max_score(m: &[Vec<Score>]) -> Score {
        m.iter().flatten().copied().max().unwrap()
    }

    /// Runs all tiles in column-major order, which respects all dependencies.
    fn run_sequential(a: &[u8], b: &[u8], tile: usize) -> (LocalKernel, LocalWorkspace) {
        let ctx = RunContext::new(a, b, tile, VecPolicy::Scalar).unwrap();
        let k = LocalKernel::new(Scoring::default(), ctx.tiling).unwrap();
        let mut ws = k.workspace(&ctx);
        for (col, row) in (0..ctx.tiling.cols()).cartesian_product(0..ctx.tiling.rows()) {
            k.run_scalar(&ctx, TileCoord::new(col, row), &mut ws);
        }
        (k, ws)
    }

    #[test]
    fn single_tile_matches_naive() {
        let (a, b) = (b"ACGTTGCA".as_slice(), b"CGTTG".as_slice());
        let (k, ws) = run_sequential(a, b, 100);
        let m = naive(a, b, Scoring::default());
        assert_eq!(k.best().score(), max_score(&m));
        assert_eq!(ws.best, k.best());
        let (x, y) = k.end_position(&k.best());
        assert_eq!(m[x][y], k.best().score());
    }

    #[test]
    fn tiled_matches_naive() {
        let a = b"TTGGGTCAATCAGCCAGTTTTTA";
        let b = b"TTTGAGTGGGTCATCACCGATTTTAT";
        let m = naive(a, b, Scoring::default());
        for tile in [1, 2, 3, 5, 8, 64] {
            let (k, ws) = run_sequential(a, b, tile);
            assert_eq!(k.best().score(), max_score(&m), "tile {tile}");
            assert_eq!(ws.tiles, k.tiling().cols() * k.tiling().rows());
            let (x, y) = k.end_position(&k.best());
            assert_eq!(m[x][y], k.best().score());
        }
    }

    #[test]
    fn no_positive_cell() {
        let (k, _) = run_sequential(b"AAAA", b"CCC", 2);
        assert_eq!(k.best().score(), 0);
        assert_eq!(k.best().best_tile, TileCoord::new(0, 0));
        assert_eq!(k.end_position(&k.best()), (1, 1));
    }

    #[test]
    fn batch_matches_scalar() {
        let a = b"GCACGTCGCCCCCCGCCCGCGAT";
        let b = b"GCCCGCCCGCCCGCCCCCGCCCCC";
        let tile = 5;
        let (scalar, _) = run_sequential(a, b, tile);

        // Anti-diagonals of tiles are mutually independent.
        let ctx = RunContext::new(a, b, tile, VecPolicy::Simd { width: 4 }).unwrap();
        let (cols, rows) = (ctx.tiling.cols(), ctx.tiling.rows());
        let k = LocalKernel::new(Scoring::default(), ctx.tiling).unwrap();
        let mut ws = k.workspace(&ctx);
        for d in 0..cols + rows - 1 {
            let diag = (0..cols)
                .cartesian_product(0..rows)
                .filter(|&(c, r)| c + r == d)
                .map(|(c, r)| TileCoord::new(c, r))
                .collect_vec();
            k.run_simd(&ctx, &diag, &mut ws);
        }

        for (col, row) in (0..cols).cartesian_product(0..rows) {
            let t = TileCoord::new(col, row);
            assert_eq!(k.tile_best(t), scalar.tile_best(t), "tile {t}");
            assert_eq!(k.output(t).last_col, scalar.output(t).last_col);
            assert_eq!(k.output(t).last_row, scalar.output(t).last_row);
        }
        assert_eq!(k.best(), scalar.best());
    }

    #[test]
    #[should_panic(expected = "computed twice")]
    fn tile_computed_twice() {
        let ctx = RunContext::new(b"AC", b"AC", 4, VecPolicy::Scalar).unwrap();
        let k = LocalKernel::new(Scoring::default(), ctx.tiling).unwrap();
        let mut ws = k.workspace(&ctx);
        k.run_scalar(&ctx, TileCoord::new(0, 0), &mut ws);
        k.run_scalar(&ctx, TileCoord::new(0, 0), &mut ws);
    }

    #[test]
    #[should_panic(expected = "before it was computed")]
    fn missing_predecessor() {
        let ctx = RunContext::new(b"ACGT", b"AC", 2, VecPolicy::Scalar).unwrap();
        let k = LocalKernel::new(Scoring::default(), ctx.tiling).unwrap();
        let mut ws = k.workspace(&ctx);
        k.run_scalar(&ctx, TileCoord::new(1, 0), &mut ws);
    }

    #[test]
    fn reset_allows_rerun() {
        let ctx = RunContext::new(b"ACGT", b"ACGT", 4, VecPolicy::Scalar).unwrap();
        let mut k = LocalKernel::new(Scoring::default(), ctx.tiling).unwrap();
        let mut ws = k.workspace(&ctx);
        k.run_scalar(&ctx, TileCoord::new(0, 0), &mut ws);
        assert_eq!(k.best().score(), 8);
        k.reset();
        assert!(k.tile_best(TileCoord::new(0, 0)).is_none());
        k.run_scalar(&ctx, TileCoord::new(0, 0), &mut ws);
        assert_eq!(k.best().score(), 8);
    }

    #[test]
    #[should_panic(expected = "does not match the run context")]
    fn tiling_mismatch() {
        let ctx = RunContext::new(b"ACGTACGT", b"ACGT", 4, VecPolicy::Scalar).unwrap();
        let other = Tiling::new(8, 4, 2).unwrap();
        let k = LocalKernel::new(Scoring::default(), other).unwrap();
        let mut ws = k.workspace(&ctx);
        k.run_scalar(&ctx, TileCoord::new(0, 0), &mut ws);
    }

    #[test]
    #[should_panic(expected = "does not match the run context")]
    fn tiling_mismatch_in_batch() {
        let ctx = RunContext::new(b"ACGTACGT", b"ACGTACGT", 4, VecPolicy::Simd { width: 2 }).unwrap();
        let other = Tiling::new(8, 8, 2).unwrap();
        let k = LocalKernel::new(Scoring::default(), other).unwrap();
        let mut ws = k.workspace(&ctx);
        k.run_simd(&ctx, &[TileCoord::new(1, 0), TileCoord::new(0, 1)], &mut ws);
    }

    #[test]
    fn workspace_for_unvalidated_width() {
        let policy = VecPolicy::Simd { width: usize::MAX / 2 };
        let ctx = RunContext::new(b"ACGT", b"ACGT", 64, policy).unwrap();
        let k = LocalKernel::new(Scoring::default(), ctx.tiling).unwrap();
        let ws = k.workspace(&ctx);
        assert_eq!(ws.tiles, 0);
    }

    #[test]
    fn rejects_huge_tiles() {
        let tiling = Tiling::new(10, 10, 1 << 17).unwrap();
        assert!(LocalKernel::new(Scoring::default(), tiling).is_err());
    }
}
