// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The compiled-form bytecode: id banding, operator sentinels, decoding.
//!
//! Clause arrays are heterogeneous `i32` sequences mixing three id bands:
//!
//! | Band | Meaning |
//! |---|---|
//! | `>= 0` | term id |
//! | `[-99, -1]` | operator sentinel |
//! | `< -99` | variable id |
//!
//! Comparison operators consume the next two sequence entries as operands
//! and advance the cursor by 3; every other token advances by 1. This
//! module is the single place that knows the encoding; evaluation, term
//! extraction and token reconstruction all go through [`decode`] and
//! [`AtomIter`] rather than re-implementing the walk.

use std::fmt;

use crate::logic::term::TermId;

/// Always-true sentinel.
pub const ANY: i32 = -1;
/// Always-false sentinel.
pub const NONE: i32 = -2;
/// Conjunction marker (token reconstruction only; DNF clauses are implicit
/// conjunctions and never contain it inline).
pub const AND: i32 = -3;
/// Disjunction marker (token reconstruction only).
pub const OR: i32 = -4;
pub const EQ: i32 = -5;
pub const LT: i32 = -6;
pub const GT: i32 = -7;

/// Lower edge of the operator band. Ids below this are variables.
pub const OPERATOR_BAND_MIN: i32 = -99;

/// Variable ids are allocated densely downward from this offset:
/// the variable with index `k` has raw id `VARIABLE_ID_OFFSET - k`.
pub const VARIABLE_ID_OFFSET: i32 = -100;

/// Id of a registered variable. Raw values are always `<= VARIABLE_ID_OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) i32);

impl VarId {
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Index into the variable registry.
    pub fn index(self) -> usize {
        (VARIABLE_ID_OFFSET - self.0) as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(VARIABLE_ID_OFFSET - index as i32)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.index())
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Gt,
}

impl CmpOp {
    pub fn holds(self, left: i32, right: i32) -> bool {
        match self {
            CmpOp::Eq => left == right,
            CmpOp::Lt => left < right,
            CmpOp::Gt => left > right,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            CmpOp::Eq => EQ,
            CmpOp::Lt => LT,
            CmpOp::Gt => GT,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "="),
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Gt => write!(f, ">"),
        }
    }
}

/// A decoded sequence entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicToken {
    Term(TermId),
    Variable(VarId),
    Any,
    None,
    And,
    Or,
    Compare(CmpOp),
}

impl LogicToken {
    pub fn raw(self) -> i32 {
        match self {
            LogicToken::Term(t) => t.raw(),
            LogicToken::Variable(v) => v.raw(),
            LogicToken::Any => ANY,
            LogicToken::None => NONE,
            LogicToken::And => AND,
            LogicToken::Or => OR,
            LogicToken::Compare(op) => op.raw(),
        }
    }
}

/// Decode a raw id into a token. Returns `Option::None` for values in the
/// operator band that carry no assigned meaning; compiled arrays must
/// never contain them.
pub fn decode(raw: i32) -> Option<LogicToken> {
    if raw >= 0 {
        return Some(LogicToken::Term(TermId(raw)));
    }
    if raw <= VARIABLE_ID_OFFSET {
        return Some(LogicToken::Variable(VarId(raw)));
    }
    match raw {
        ANY => Some(LogicToken::Any),
        NONE => Some(LogicToken::None),
        AND => Some(LogicToken::And),
        OR => Some(LogicToken::Or),
        EQ => Some(LogicToken::Compare(CmpOp::Eq)),
        LT => Some(LogicToken::Compare(CmpOp::Lt)),
        GT => Some(LogicToken::Compare(CmpOp::Gt)),
        _ => None,
    }
}

/// An atom: a term or variable id position within a sequence, including
/// comparison operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atom {
    Term(TermId),
    Variable(VarId),
}

/// Iterator over every atom of a sequence, in order, descending into
/// comparison operands. `ANY`/`NONE` contribute nothing.
///
/// Used for term extraction and validation; assumes the sequence has
/// already passed [`validate_sequence`].
pub struct AtomIter<'a> {
    seq: &'a [i32],
    i: usize,
    /// Pending operand positions from a comparison (emitted before
    /// resuming the main walk).
    pending: usize,
}

pub fn atoms(seq: &[i32]) -> AtomIter<'_> {
    AtomIter {
        seq,
        i: 0,
        pending: 0,
    }
}

impl<'a> Iterator for AtomIter<'a> {
    type Item = Atom;

    fn next(&mut self) -> Option<Atom> {
        while self.i < self.seq.len() {
            let raw = self.seq[self.i];
            if self.pending > 0 {
                self.pending -= 1;
                self.i += 1;
                match decode(raw) {
                    Some(LogicToken::Term(t)) => return Some(Atom::Term(t)),
                    Some(LogicToken::Variable(v)) => return Some(Atom::Variable(v)),
                    _ => continue,
                }
            }
            match decode(raw) {
                Some(LogicToken::Term(t)) => {
                    self.i += 1;
                    return Some(Atom::Term(t));
                }
                Some(LogicToken::Variable(v)) => {
                    self.i += 1;
                    return Some(Atom::Variable(v));
                }
                Some(LogicToken::Compare(_)) => {
                    self.pending = 2;
                    self.i += 1;
                }
                _ => {
                    self.i += 1;
                }
            }
        }
        None
    }
}

/// Check the structural invariants of a compiled sequence: every entry
/// decodes, every comparison has two operand entries, and operands are
/// atoms (terms or variables), not operators.
pub fn validate_sequence(seq: &[i32]) -> Result<(), String> {
    let mut i = 0;
    while i < seq.len() {
        let raw = seq[i];
        match decode(raw) {
            Some(LogicToken::Compare(_)) => {
                if i + 2 >= seq.len() {
                    return Err(format!("comparison at {} is missing operands", i));
                }
                for operand in &seq[i + 1..i + 3] {
                    match decode(*operand) {
                        Some(LogicToken::Term(_)) | Some(LogicToken::Variable(_)) => {}
                        _ => {
                            return Err(format!(
                                "comparison operand {} is not a term or variable",
                                operand
                            ))
                        }
                    }
                }
                i += 3;
            }
            Some(LogicToken::And) | Some(LogicToken::Or) => {
                return Err(format!(
                    "AND/OR marker {} inside a compiled clause sequence",
                    raw
                ));
            }
            Some(_) => i += 1,
            Option::None => return Err(format!("id {} has no assigned meaning", raw)),
        }
    }
    Ok(())
}
