// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The state model: field schema, packed vectors, dominance antichains.
//!
//! - [`StateManager`]: frozen registry of bool/int fields with defaults,
//!   directions, tags and named states.
//! - [`State`]: immutable packed resource vector.
//! - [`StateUnion`]: minimal antichain of states under dominance.
//! - [`LazyStateBuilder`]: copy-on-write mutator used during clause
//!   evaluation.

pub mod field;
pub mod lazy;
pub mod manager;
pub mod union;
pub mod vector;

pub use lazy::LazyStateBuilder;
pub use manager::{StateError, StateManager, StateManagerBuilder};
pub use union::StateUnion;
pub use vector::State;
