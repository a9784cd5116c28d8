//! Parallel computation of a pairwise-alignment DP matrix, tile by tile.
//!
//! The matrix of `a x b` is cut into square tiles. Tile `(col, row)` can only
//! be computed once `(col-1, row)` and `(col, row-1)` are done, so the ready
//! tiles sweep over the grid as an anti-diagonal wavefront. A fixed pool of
//! workers executes ready tiles from a shared FIFO, optionally computing
//! several ready tiles at once in SIMD lanes, until the bottom-right tile
//! signals completion.
//!
//! What computing a tile means is up to a [`TileKernel`];
//! [`kernel::local::LocalKernel`] computes Smith-Waterman local alignment
//! scores and [`local_align`] wraps the whole pipeline.
//!
//! ```
//! use pa_wavefront::{local_align, Scoring, WavefrontParams};
//!
//! let params = WavefrontParams::simd(16, 2, 4);
//! let (aln, _stats) = local_align(b"GGACGTACGTT", b"CCACGTACGAA", Scoring::default(), &params).unwrap();
//! assert_eq!(aln.score, 14);
//! ```

mod align;
#[cfg(feature = "cli")]
pub mod cli;
pub mod context;
mod error;
pub mod graph;
pub mod kernel;
pub mod params;
pub mod pool;
pub mod queue;
pub mod result;
pub mod stats;
pub mod tiling;
pub mod worker;


pub use align::{local_align, LocalAlignment, Run, Wavefront};
pub use context::{Completion, RunContext, RunState};
pub use error::{Error, Result};
pub use graph::{TaskGraph, TaskId, TileTask};
pub use kernel::local::{LocalKernel, LocalWorkspace, Score, Scoring};
pub use kernel::TileKernel;
pub use params::{VecPolicy, WavefrontParams, MAX_SIMD_WIDTH};
pub use queue::ReadyQueue;
pub use result::{IntermediateResult, State};
pub use stats::{RunStats, WorkerStats};
pub use tiling::{TileCoord, Tiling};

/// A sequence of bytes.
pub type Seq<'a> = &'a [u8];
