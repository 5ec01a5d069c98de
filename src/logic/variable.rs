// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Variables: negative-id symbols resolved to custom behavior.
//!
//! The evaluator knows four variable capabilities, modeled as a tagged sum
//! ([`Variable`]) over trait objects rather than a deep hierarchy:
//!
//! - [`IntVariable`]: produce an integer for a clause + progression pair.
//! - [`StateProviderVariable`]: an int variable that can also originate
//!   the input state union for its clause.
//! - [`StateModifierVariable`]: transform a lazy state into 0..n output
//!   states, and/or originate states on the no-input branch.
//! - [`StateAccessVariable`]: read a scalar out of the lazy state under
//!   evaluation (comparison operands only).
//!
//! Concrete implementations are collaborator-provided; the crate ships
//! only [`ConstantVariable`] (integer literals) and the
//! [`DefaultResolver`] that produces them, as the base of the resolver
//! chain.
//!
//! Variable callbacks receive the owning [`Clause`] by reference for the
//! duration of the call; there is no stored back-pointer and no owning
//! cycle.

use std::fmt::Debug;
use std::rc::Rc;

use crate::logic::clause::Clause;
use crate::logic::term::TermId;
use crate::progression::ProgressionManager;
use crate::state::{LazyStateBuilder, StateUnion};

/// Integer-valued variable.
pub trait IntVariable: Debug {
    fn name(&self) -> &str;

    /// Terms this variable reads; drives incremental re-evaluation.
    fn terms(&self) -> Vec<TermId>;

    fn value(&self, clause: &Clause, pm: &ProgressionManager) -> i32;
}

/// An [`IntVariable`] that can also yield the input state for its clause.
pub trait StateProviderVariable: IntVariable {
    fn input_state(&self, clause: &Clause, pm: &ProgressionManager) -> Option<StateUnion>;
}

/// State-transforming variable.
pub trait StateModifierVariable: Debug {
    fn name(&self) -> &str;

    fn terms(&self) -> Vec<TermId>;

    /// Transform one input state into zero or more output states. An empty
    /// result fails the branch.
    fn modify_state(
        &self,
        clause: &Clause,
        pm: &ProgressionManager,
        input: &LazyStateBuilder,
    ) -> Vec<LazyStateBuilder>;

    /// Originate states on the no-input ("empty") branch.
    ///
    /// - `None`: the modifier requires an input state; fail the branch.
    /// - `Some(vec![])`: succeed with indeterminate output (the default:
    ///   an untracked state passes through untracked).
    /// - `Some(builders)`: concrete branches, each continued through the
    ///   rest of the sequence.
    fn provide_state(
        &self,
        _clause: &Clause,
        _pm: &ProgressionManager,
    ) -> Option<Vec<LazyStateBuilder>> {
        Some(Vec::new())
    }
}

/// Reads a scalar from the lazy state under evaluation.
pub trait StateAccessVariable: Debug {
    fn name(&self) -> &str;

    fn terms(&self) -> Vec<TermId>;

    fn value_in(&self, state: &LazyStateBuilder, pm: &ProgressionManager) -> i32;
}

/// The variable sum. The evaluator dispatches on the tag; each tag carries
/// a shared trait object.
#[derive(Debug, Clone)]
pub enum Variable {
    Int(Rc<dyn IntVariable>),
    StateProvider(Rc<dyn StateProviderVariable>),
    StateModifier(Rc<dyn StateModifierVariable>),
    StateAccess(Rc<dyn StateAccessVariable>),
}

impl Variable {
    pub fn name(&self) -> &str {
        match self {
            Variable::Int(v) => v.name(),
            Variable::StateProvider(v) => v.name(),
            Variable::StateModifier(v) => v.name(),
            Variable::StateAccess(v) => v.name(),
        }
    }

    pub fn terms(&self) -> Vec<TermId> {
        match self {
            Variable::Int(v) => v.terms(),
            Variable::StateProvider(v) => v.terms(),
            Variable::StateModifier(v) => v.terms(),
            Variable::StateAccess(v) => v.terms(),
        }
    }

    /// Integer value, for variables that have one.
    ///
    /// # Panics
    ///
    /// Panics for state-only variables: a modifier or access variable in an
    /// integer position is a compilation bug.
    pub fn int_value(&self, clause: &Clause, pm: &ProgressionManager) -> i32 {
        match self {
            Variable::Int(v) => v.value(clause, pm),
            Variable::StateProvider(v) => v.value(clause, pm),
            other => panic!(
                "Variable {} has no integer value outside state evaluation",
                other.name()
            ),
        }
    }
}

/// Composable name-to-variable resolution.
///
/// A resolver answers for the names it knows and defers the rest to its
/// inner fallback; the outermost resolver's [`resolve`](Self::resolve)
/// result therefore equals what the whole chain produces, and an unknown
/// name yields `None` from every link.
pub trait VariableResolver {
    /// Attempt to produce a variable for `name`, without consulting the
    /// fallback chain.
    fn try_match(&self, name: &str) -> Option<Variable>;

    /// The next resolver in the chain, if any.
    fn inner(&self) -> Option<&dyn VariableResolver> {
        None
    }

    /// Walk the chain: first `try_match`, then the inner fallback.
    fn resolve(&self, name: &str) -> Option<Variable> {
        match self.try_match(name) {
            Some(v) => Some(v),
            None => self.inner().and_then(|i| i.resolve(name)),
        }
    }
}

/// Integer literal as a variable.
#[derive(Debug)]
pub struct ConstantVariable {
    name: String,
    value: i32,
}

impl ConstantVariable {
    pub fn new(value: i32) -> Self {
        Self {
            name: value.to_string(),
            value,
        }
    }
}

impl IntVariable for ConstantVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn terms(&self) -> Vec<TermId> {
        Vec::new()
    }

    fn value(&self, _clause: &Clause, _pm: &ProgressionManager) -> i32 {
        self.value
    }
}

/// Base of the resolver chain: integer literals resolve to
/// [`ConstantVariable`]s, everything else is unknown.
#[derive(Debug, Default)]
pub struct DefaultResolver;

impl VariableResolver for DefaultResolver {
    fn try_match(&self, name: &str) -> Option<Variable> {
        name.parse::<i32>()
            .ok()
            .map(|value| Variable::Int(Rc::new(ConstantVariable::new(value))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NamedConst(&'static str, i32);

    impl IntVariable for NamedConst {
        fn name(&self) -> &str {
            self.0
        }
        fn terms(&self) -> Vec<TermId> {
            Vec::new()
        }
        fn value(&self, _clause: &Clause, _pm: &ProgressionManager) -> i32 {
            self.1
        }
    }

    struct OuterResolver {
        fallback: DefaultResolver,
    }

    impl VariableResolver for OuterResolver {
        fn try_match(&self, name: &str) -> Option<Variable> {
            (name == "$SPECIAL").then(|| Variable::Int(Rc::new(NamedConst("$SPECIAL", 7))))
        }

        fn inner(&self) -> Option<&dyn VariableResolver> {
            Some(&self.fallback)
        }
    }

    #[test]
    fn test_default_resolver_parses_literals() {
        let r = DefaultResolver;
        assert!(r.resolve("42").is_some());
        assert!(r.resolve("-3").is_some());
        assert!(r.resolve("NOPE").is_none());
    }

    #[test]
    fn test_chain_falls_through() {
        let r = OuterResolver {
            fallback: DefaultResolver,
        };
        // Outer handles its own name.
        assert_eq!(r.resolve("$SPECIAL").unwrap().name(), "$SPECIAL");
        // Unknown to outer, known to inner.
        assert_eq!(r.resolve("11").unwrap().name(), "11");
        // Unknown to the whole chain.
        assert!(r.resolve("$MISSING").is_none());
    }
}
