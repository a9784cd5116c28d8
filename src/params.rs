use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest accepted number of tiles in one SIMD batch.
pub const MAX_SIMD_WIDTH: usize = 64;

/// How ready tiles are handed to the kernel. Chosen once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VecPolicy {
    /// Every tile is computed on its own.
    #[default]
    Scalar,
    /// Whenever `width` tiles are ready at once they are computed as one
    /// batch, one SIMD lane per tile. Otherwise the popped tile runs alone.
    Simd { width: usize },
}

impl VecPolicy {
    /// Number of tiles in a full batch; 1 for scalar execution.
    pub fn width(&self) -> usize {
        match *self {
            VecPolicy::Scalar => 1,
            VecPolicy::Simd { width } => width,
        }
    }

    /// Whether batches are formed at all.
    pub fn batches(&self) -> bool {
        self.width() > 1
    }
}

impl fmt::Display for VecPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VecPolicy::Scalar => write!(f, "scalar"),
            VecPolicy::Simd { width } => write!(f, "simd x{width}"),
        }
    }
}

/// Flat parameters for a wavefront run, usable from a CLI or a config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WavefrontParams {
    /// Side length of a tile in DP cells.
    pub tile_size: usize,

    /// Number of worker threads. `None` uses all available cores.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Scalar or batched execution.
    #[serde(default)]
    pub policy: VecPolicy,
}

impl Default for WavefrontParams {
    fn default() -> Self {
        Self {
            tile_size: 64,
            threads: None,
            policy: VecPolicy::Scalar,
        }
    }
}

impl WavefrontParams {
    pub fn scalar(tile_size: usize, threads: usize) -> Self {
        Self {
            tile_size,
            threads: Some(threads),
            policy: VecPolicy::Scalar,
        }
    }

    pub fn simd(tile_size: usize, threads: usize, width: usize) -> Self {
        Self {
            tile_size,
            threads: Some(threads),
            policy: VecPolicy::Simd { width },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(Error::invalid("tile-size", "must be >= 1"));
        }
        if self.threads == Some(0) {
            return Err(Error::invalid("threads", "must be >= 1"));
        }
        match self.policy.width() {
            0 => return Err(Error::invalid("simd-width", "must be >= 1")),
            w if w > MAX_SIMD_WIDTH => {
                return Err(Error::invalid(
                    "simd-width",
                    format!("must be <= {MAX_SIMD_WIDTH}, got {w}"),
                ))
            }
            _ => {}
        }
        Ok(())
    }

    /// The configured thread count, or the available parallelism.
    pub fn num_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
