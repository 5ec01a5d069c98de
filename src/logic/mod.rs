// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The logic evaluator: terms, variables, compiled DNF definitions.
//!
//! # Architecture
//!
//! Compiled formulae are heterogeneous `i32` sequences (see
//! [`token`]) over three id bands: terms (`>= 0`), operator sentinels
//! (`[-99, -1]`) and variables (`< -99`). A [`DnfLogicDef`] is a
//! disjunction of [`Clause`]s; each clause is a conjunction with a
//! boolean part, a state part and a state provider.
//!
//! The [`LogicManager`] freezes the registries; evaluation runs against a
//! [`ProgressionManager`](crate::progression::ProgressionManager), which
//! holds the mutable knowledge.

pub mod clause;
pub mod dnf;
pub mod error;
pub mod manager;
pub mod term;
pub mod token;
pub mod variable;

pub use clause::Clause;
pub use dnf::DnfLogicDef;
pub use error::LogicError;
pub use manager::{
    AtomRef, ClauseBlueprint, ClauseElement, LogicCompiler, LogicManager, LogicManagerBuilder,
};
pub use term::{Term, TermId, TermKind};
pub use token::{CmpOp, LogicToken, VarId};
pub use variable::{
    ConstantVariable, DefaultResolver, IntVariable, StateAccessVariable, StateModifierVariable,
    StateProviderVariable, Variable, VariableResolver,
};
