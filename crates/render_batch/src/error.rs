//! Error types
//!
//! The batching core degrades instead of failing; the only errors are
//! configuration problems and resource exhaustion inside shadow techniques.

use thiserror::Error;

pub use crate::config::ConfigError;

/// Shadow technique errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShadowError {
    /// Every shadow render target is taken for this frame
    #[error("Shadow target pool exhausted ({capacity} targets)")]
    PoolExhausted {
        /// Pool size
        capacity: usize,
    },
}
