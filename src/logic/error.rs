// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Error types for logic registration and compilation.

use thiserror::Error;

/// Errors raised while building a [`LogicManager`](crate::logic::LogicManager)
/// or compiling logic definitions.
#[derive(Debug, Error)]
pub enum LogicError {
    #[error("Duplicate term: {0}")]
    DuplicateTerm(String),

    #[error("Unknown term: {0}")]
    UnknownTerm(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),

    #[error("Duplicate logic def: {0}")]
    DuplicateDef(String),

    #[error("Malformed logic in {def}: {detail}")]
    Malformed { def: String, detail: String },

    /// Produced by [`LogicCompiler`](crate::logic::LogicCompiler)
    /// implementations when the source text does not parse.
    #[error("Parse error: {0}")]
    Parse(String),
}
