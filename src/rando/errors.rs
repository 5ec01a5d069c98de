// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Failure surfaces of the randomization engine.

use thiserror::Error;

/// Errors surfaced by randomization.
///
/// `OutOfLocations` is recoverable: the [`Randomizer`] catches it, resets
/// and retries a fresh permutation. `Validation` and `Cancelled` always
/// surface to the caller.
///
/// [`Randomizer`]: crate::rando::Randomizer
#[derive(Debug, Error)]
pub enum RandoError {
    #[error("Out of locations: {0}")]
    OutOfLocations(String),

    #[error("Validation failed: {}", failures.join("; "))]
    Validation { failures: Vec<String> },

    #[error("Randomization cancelled")]
    Cancelled,
}
