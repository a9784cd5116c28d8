//! The boundary between the scheduler and the DP computation of a tile.
//!
//! The scheduler only decides when and in which grouping tiles are computed.
//! A kernel decides what computing a tile means: it reads the sequences from
//! the [`RunContext`], reads whatever its predecessors published, and
//! publishes its own output for its successors.

pub mod local;

use crate::context::RunContext;
use crate::tiling::TileCoord;

pub trait TileKernel: Sync {
    /// Mutable scratch state owned by a single worker for the whole run.
    type Workspace: Send;

    /// Called once per worker when the pool is built.
    fn workspace(&self, ctx: &RunContext) -> Self::Workspace;

    /// Compute a single tile.
    fn run_scalar(&self, ctx: &RunContext, tile: TileCoord, ws: &mut Self::Workspace);

    /// Compute a batch of mutually independent tiles in lockstep.
    ///
    /// Only called with exactly `ctx.simd_width()` tiles. Defaults to
    /// computing them one by one.
    fn run_simd(&self, ctx: &RunContext, tiles: &[TileCoord], ws: &mut Self::Workspace) {
        for &tile in tiles {
            self.run_scalar(ctx, tile, ws);
        }
    }
}
