// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The logic registry: terms, variables and compiled definitions.
//!
//! [`LogicManagerBuilder`] accumulates term declarations and logic
//! definitions, resolving variable names through a composable
//! [`VariableResolver`] chain as definitions are compiled. [`build`]
//! freezes everything into an immutable [`LogicManager`].
//!
//! Definitions enter the builder either as [`ClauseBlueprint`]s (names,
//! not ids; the builder compiles them) or as source text through an
//! external [`LogicCompiler`], which stands in for the infix/RPN parser
//! this crate deliberately does not contain.
//!
//! [`build`]: LogicManagerBuilder::build

use std::collections::HashMap;
use std::rc::Rc;

use crate::logic::clause::Clause;
use crate::logic::dnf::DnfLogicDef;
use crate::logic::error::LogicError;
use crate::logic::term::{Term, TermId, TermKind};
use crate::logic::token::{CmpOp, VarId, ANY, NONE};
use crate::logic::variable::{DefaultResolver, Variable, VariableResolver};
use crate::state::StateManager;

/// Reference to a term or variable by name, used in blueprints.
#[derive(Debug, Clone)]
pub enum AtomRef {
    Term(String),
    Variable(String),
}

/// One element of a blueprint sequence.
#[derive(Debug, Clone)]
pub enum ClauseElement {
    Term(String),
    Variable(String),
    Any,
    None,
    Compare(CmpOp, AtomRef, AtomRef),
}

/// An uncompiled clause: the same shape as [`Clause`], with names in
/// place of ids.
#[derive(Debug, Clone, Default)]
pub struct ClauseBlueprint {
    pub logic: Vec<ClauseElement>,
    pub state_logic: Vec<ClauseElement>,
    pub state_provider: Option<AtomRef>,
}

/// External parser seam: compiles definition source into blueprints.
pub trait LogicCompiler {
    fn compile(&self, name: &str, source: &str) -> Result<Vec<ClauseBlueprint>, LogicError>;
}

/// Mutable accumulator for the logic registry.
pub struct LogicManagerBuilder {
    sm: Rc<StateManager>,
    terms: Vec<Term>,
    term_lookup: HashMap<String, TermId>,
    variables: Vec<Variable>,
    var_lookup: HashMap<String, VarId>,
    resolver: Box<dyn VariableResolver>,
    defs: Vec<(String, Vec<Clause>)>,
    def_names: HashMap<String, usize>,
}

impl LogicManagerBuilder {
    pub fn new(sm: Rc<StateManager>) -> Self {
        Self {
            sm,
            terms: Vec::new(),
            term_lookup: HashMap::new(),
            variables: Vec::new(),
            var_lookup: HashMap::new(),
            resolver: Box::new(DefaultResolver),
            defs: Vec::new(),
            def_names: HashMap::new(),
        }
    }

    /// Replace the variable resolver. The new resolver should keep
    /// [`DefaultResolver`] (or an equivalent) at the bottom of its chain
    /// so integer literals keep resolving.
    pub fn set_resolver(&mut self, resolver: Box<dyn VariableResolver>) -> &mut Self {
        self.resolver = resolver;
        self
    }

    /// Register a term. Ids are assigned densely in registration order.
    pub fn term(&mut self, name: &str, kind: TermKind) -> Result<TermId, LogicError> {
        if self.term_lookup.contains_key(name) {
            return Err(LogicError::DuplicateTerm(name.to_string()));
        }
        let id = TermId::from_index(self.terms.len());
        self.terms.push(Term {
            id,
            name: name.to_string(),
            kind,
        });
        self.term_lookup.insert(name.to_string(), id);
        Ok(id)
    }

    /// Id of an already-registered term.
    pub fn term_id(&self, name: &str) -> Option<TermId> {
        self.term_lookup.get(name).copied()
    }

    /// Pre-register a variable under its own name, bypassing the
    /// resolver. Re-registration of a known name is an error.
    pub fn register_variable(&mut self, variable: Variable) -> Result<VarId, LogicError> {
        let name = variable.name().to_string();
        if self.var_lookup.contains_key(&name) {
            return Err(LogicError::DuplicateVariable(name));
        }
        Ok(self.intern_variable(name, variable))
    }

    fn intern_variable(&mut self, name: String, variable: Variable) -> VarId {
        let id = VarId::from_index(self.variables.len());
        self.variables.push(variable);
        self.var_lookup.insert(name, id);
        id
    }

    /// Resolve a variable name to an id, consulting the resolver chain
    /// for names not yet interned.
    fn variable_id(&mut self, name: &str) -> Result<VarId, LogicError> {
        if let Some(&id) = self.var_lookup.get(name) {
            return Ok(id);
        }
        match self.resolver.resolve(name) {
            Some(variable) => Ok(self.intern_variable(name.to_string(), variable)),
            None => Err(LogicError::UnknownVariable(name.to_string())),
        }
    }

    fn atom_id(&mut self, def: &str, atom: &AtomRef, state_side: bool) -> Result<i32, LogicError> {
        match atom {
            AtomRef::Term(name) => self
                .term_id(name)
                .map(|t| t.raw())
                .ok_or_else(|| LogicError::UnknownTerm(name.clone())),
            AtomRef::Variable(name) => {
                let id = self.variable_id(name)?;
                match &self.variables[id.index()] {
                    Variable::StateModifier(_) => Err(LogicError::Malformed {
                        def: def.to_string(),
                        detail: format!("modifier {} used as comparison operand", name),
                    }),
                    Variable::StateAccess(_) if !state_side => Err(LogicError::Malformed {
                        def: def.to_string(),
                        detail: format!(
                            "access variable {} outside state evaluation",
                            name
                        ),
                    }),
                    _ => Ok(id.raw()),
                }
            }
        }
    }

    fn compile_sequence(
        &mut self,
        def: &str,
        elements: &[ClauseElement],
        state_side: bool,
    ) -> Result<Vec<i32>, LogicError> {
        let mut seq = Vec::new();
        for element in elements {
            match element {
                ClauseElement::Term(name) => {
                    if state_side {
                        return Err(LogicError::Malformed {
                            def: def.to_string(),
                            detail: format!("bare term {} in state logic", name),
                        });
                    }
                    let id = self
                        .term_id(name)
                        .ok_or_else(|| LogicError::UnknownTerm(name.clone()))?;
                    seq.push(id.raw());
                }
                ClauseElement::Variable(name) => {
                    let id = self.variable_id(name)?;
                    // Bare variables: the state side takes modifiers, the
                    // boolean side takes int-valued variables; access
                    // variables exist only as comparison operands.
                    let valid = match self.variables[id.index()] {
                        Variable::StateModifier(_) => state_side,
                        Variable::Int(_) | Variable::StateProvider(_) => !state_side,
                        Variable::StateAccess(_) => false,
                    };
                    if !valid {
                        return Err(LogicError::Malformed {
                            def: def.to_string(),
                            detail: format!(
                                "variable {} on the wrong side of the clause",
                                name
                            ),
                        });
                    }
                    seq.push(id.raw());
                }
                ClauseElement::Any => {
                    if state_side {
                        return Err(LogicError::Malformed {
                            def: def.to_string(),
                            detail: "ANY in state logic".to_string(),
                        });
                    }
                    seq.push(ANY);
                }
                ClauseElement::None => {
                    if state_side {
                        return Err(LogicError::Malformed {
                            def: def.to_string(),
                            detail: "NONE in state logic".to_string(),
                        });
                    }
                    seq.push(NONE);
                }
                ClauseElement::Compare(op, left, right) => {
                    let l = self.atom_id(def, left, state_side)?;
                    let r = self.atom_id(def, right, state_side)?;
                    seq.push(op.raw());
                    seq.push(l);
                    seq.push(r);
                }
            }
        }
        Ok(seq)
    }

    fn compile_clause(
        &mut self,
        def: &str,
        blueprint: &ClauseBlueprint,
    ) -> Result<Clause, LogicError> {
        let mut logic = self.compile_sequence(def, &blueprint.logic, false)?;
        let state_logic = self.compile_sequence(def, &blueprint.state_logic, true)?;

        let state_provider = match &blueprint.state_provider {
            Option::None => NONE,
            Some(AtomRef::Term(name)) => {
                let id = self
                    .term_id(name)
                    .ok_or_else(|| LogicError::UnknownTerm(name.clone()))?;
                if self.terms[id.index()].kind() != TermKind::State {
                    return Err(LogicError::Malformed {
                        def: def.to_string(),
                        detail: format!("state provider {} is not a state-valued term", name),
                    });
                }
                // The boolean part must gate on the provider being
                // reachable; splice the term in if the blueprint left it
                // out.
                if !logic.contains(&id.raw()) {
                    logic.insert(0, id.raw());
                }
                id.raw()
            }
            Some(AtomRef::Variable(name)) => {
                let id = self.variable_id(name)?;
                if !matches!(self.variables[id.index()], Variable::StateProvider(_)) {
                    return Err(LogicError::Malformed {
                        def: def.to_string(),
                        detail: format!("state provider {} is not a StateProvider", name),
                    });
                }
                id.raw()
            }
        };

        for seq in [&logic, &state_logic] {
            if let Err(detail) = crate::logic::token::validate_sequence(seq) {
                return Err(LogicError::Malformed {
                    def: def.to_string(),
                    detail,
                });
            }
        }

        Ok(Clause::new(logic, state_logic, state_provider))
    }

    /// Compile and register a definition from blueprints.
    pub fn define_logic(
        &mut self,
        name: &str,
        clauses: Vec<ClauseBlueprint>,
    ) -> Result<(), LogicError> {
        if self.def_names.contains_key(name) {
            return Err(LogicError::DuplicateDef(name.to_string()));
        }
        let compiled: Vec<Clause> = clauses
            .iter()
            .map(|bp| self.compile_clause(name, bp))
            .collect::<Result<_, _>>()?;
        self.def_names.insert(name.to_string(), self.defs.len());
        self.defs.push((name.to_string(), compiled));
        Ok(())
    }

    /// Compile and register a definition from source text via an external
    /// compiler.
    pub fn define_logic_from(
        &mut self,
        compiler: &dyn LogicCompiler,
        name: &str,
        source: &str,
    ) -> Result<(), LogicError> {
        let blueprints = compiler.compile(name, source)?;
        self.define_logic(name, blueprints)
    }

    /// Freeze the registry.
    pub fn build(self) -> LogicManager {
        let defs: Vec<Rc<DnfLogicDef>> = self
            .defs
            .into_iter()
            .map(|(name, clauses)| Rc::new(DnfLogicDef::new(name, clauses)))
            .collect();
        let def_lookup = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name().to_string(), i))
            .collect();
        LogicManager {
            sm: self.sm,
            terms: self.terms,
            term_lookup: self.term_lookup,
            variables: self.variables,
            var_lookup: self.var_lookup,
            defs,
            def_lookup,
        }
    }
}

/// Frozen registry of terms, variables and compiled logic definitions.
pub struct LogicManager {
    sm: Rc<StateManager>,
    terms: Vec<Term>,
    term_lookup: HashMap<String, TermId>,
    variables: Vec<Variable>,
    var_lookup: HashMap<String, VarId>,
    defs: Vec<Rc<DnfLogicDef>>,
    def_lookup: HashMap<String, usize>,
}

impl LogicManager {
    pub fn state_manager(&self) -> &StateManager {
        &self.sm
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Look up a term by name.
    ///
    /// # Panics
    ///
    /// Panics if no term with this name exists.
    pub fn term(&self, name: &str) -> &Term {
        self.try_term(name)
            .unwrap_or_else(|| panic!("Unknown term: {}", name))
    }

    pub fn try_term(&self, name: &str) -> Option<&Term> {
        self.term_lookup.get(name).map(|id| &self.terms[id.index()])
    }

    pub fn term_by_id(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    /// Look up a variable by id.
    ///
    /// # Panics
    ///
    /// Panics on an id outside the registered range; compiled arrays
    /// never contain one.
    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn try_variable_by_name(&self, name: &str) -> Option<(VarId, &Variable)> {
        self.var_lookup
            .get(name)
            .map(|&id| (id, &self.variables[id.index()]))
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Look up a compiled definition by name.
    ///
    /// # Panics
    ///
    /// Panics if no definition with this name exists.
    pub fn logic_def(&self, name: &str) -> &Rc<DnfLogicDef> {
        self.try_logic_def(name)
            .unwrap_or_else(|| panic!("Unknown logic def: {}", name))
    }

    pub fn try_logic_def(&self, name: &str) -> Option<&Rc<DnfLogicDef>> {
        self.def_lookup.get(name).map(|&i| &self.defs[i])
    }

    /// All definitions, in registration order.
    pub fn logic_defs(&self) -> &[Rc<DnfLogicDef>] {
        &self.defs
    }
}

impl std::fmt::Debug for LogicManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicManager")
            .field("terms", &self.terms.len())
            .field("variables", &self.variables.len())
            .field("defs", &self.defs.len())
            .finish()
    }
}
