//! Errors reported before a run starts.
//!
//! Contract violations inside a running grid (counter underflow, a second
//! completion signal, ...) are panics, not values of this type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The tile grid has no columns or no rows.
    #[error("Tile grid must be non-empty, got {cols}x{rows} tiles")]
    EmptyGrid {
        /// Number of tile columns (along `a`).
        cols: usize,
        /// Number of tile rows (along `b`).
        rows: usize,
    },

    /// Invalid parameter value provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name.
        parameter: &'static str,
        /// Explanation of why it's invalid.
        reason: String,
    },

    /// A worker thread could not be created.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }
}
