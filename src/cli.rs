use crate::params::{VecPolicy, WavefrontParams};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[clap(next_help_heading = "Wavefront")]
pub struct WavefrontArgs {
    /// Side length of a tile in DP cells.
    #[clap(long, default_value_t = 64, value_name = "CELLS")]
    pub tile_size: usize,

    /// Number of worker threads. Defaults to all available cores.
    #[clap(short = 'j', long)]
    pub threads: Option<usize>,

    /// Compute up to this many ready tiles together in SIMD lanes.
    /// 1 disables batching, at most 64.
    #[clap(long, default_value_t = 1, value_name = "LANES")]
    pub simd_width: usize,
}

impl From<&WavefrontArgs> for WavefrontParams {
    fn from(args: &WavefrontArgs) -> Self {
        WavefrontParams {
            tile_size: args.tile_size,
            threads: args.threads,
            policy: match args.simd_width {
                1 => VecPolicy::Scalar,
                width => VecPolicy::Simd { width },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = WavefrontArgs::parse_from(["pa"]);
        let p = WavefrontParams::from(&args);
        assert_eq!(p, WavefrontParams::default());
    }

    #[test]
    fn simd_args() {
        let args = WavefrontArgs::parse_from(["pa", "--tile-size", "16", "-j", "3", "--simd-width", "8"]);
        let p = WavefrontParams::from(&args);
        assert_eq!(p, WavefrontParams::simd(16, 3, 8));
        p.validate().unwrap();
    }

    #[test]
    fn zero_width_is_rejected_on_validate() {
        let args = WavefrontArgs::parse_from(["pa", "--simd-width", "0"]);
        assert!(WavefrontParams::from(&args).validate().is_err());
    }
}
