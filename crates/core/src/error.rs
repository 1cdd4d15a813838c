//! Error types for the viewer core

use thiserror::Error;

/// Reasons a jump ends without repositioning the viewport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JumpError {
    /// The target never became resident within the retry budget.
    #[error("item {target} not resident after {attempts} attempts")]
    NotFound { target: usize, attempts: u32 },

    /// A newer jump replaced this one before it finished.
    #[error("jump to item {target} superseded by a newer jump")]
    Superseded { target: usize },
}

/// Result type for jump operations
pub type JumpResult<T> = Result<T, JumpError>;
