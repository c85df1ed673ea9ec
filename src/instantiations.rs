//! Binding environments produced by matching.
//!
//! Both [`SvInstantiations`] and [`RenamingTable`] are persistent: extending
//! one returns a new value and leaves the original usable, so a failed match
//! attempt never has to undo anything.
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::program::{ContextInstantiation, ProgramElement};
use crate::schema::SchemaVariable;
use crate::term::{Labels, LogicVariable, Term};
use crate::util::ListDisplay;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instantiation {
    Term(Term),
    Program(ProgramElement),
    ProgramList(Arc<[ProgramElement]>),
    Labels(Labels),
}

impl Instantiation {
    /// Equality used for the single-assignment check. Terms are compared up
    /// to renaming of bound variables.
    pub fn equivalent(&self, other: &Instantiation) -> bool {
        match (self, other) {
            (Instantiation::Term(a), Instantiation::Term(b)) => a.equals_mod_renaming(b),
            (a, b) => a == b,
        }
    }
}

impl Display for Instantiation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Instantiation::Term(t) => write!(f, "{t}"),
            Instantiation::Program(p) => write!(f, "{p}"),
            Instantiation::ProgramList(ps) => write!(f, "[{}]", ListDisplay(ps, " ")),
            Instantiation::Labels(ls) => write!(f, "<<{}>>", ListDisplay(ls, ", ")),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct SvInstantiations {
    map: im::HashMap<SchemaVariable, Instantiation>,
    context: Option<ContextInstantiation>,
}

impl SvInstantiations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty() && self.context.is_none()
    }

    pub fn get(&self, sv: &SchemaVariable) -> Option<&Instantiation> {
        self.map.get(sv)
    }

    pub fn is_instantiated(&self, sv: &SchemaVariable) -> bool {
        self.map.contains_key(sv)
    }

    pub fn get_term(&self, sv: &SchemaVariable) -> Option<&Term> {
        match self.map.get(sv)? {
            Instantiation::Term(t) => Some(t),
            _ => None,
        }
    }

    pub fn get_program(&self, sv: &SchemaVariable) -> Option<&ProgramElement> {
        match self.map.get(sv)? {
            Instantiation::Program(p) => Some(p),
            _ => None,
        }
    }

    /// The logic variable a variable schema variable is bound to.
    pub fn get_variable(&self, sv: &SchemaVariable) -> Option<LogicVariable> {
        match self.get_term(sv)?.op() {
            crate::term::Operator::Var(lv) => Some(*lv),
            _ => None,
        }
    }

    /// Bind `sv` to `inst`. Returns `None` if `sv` is already bound to
    /// something not equivalent to `inst`.
    pub fn add(&self, sv: &SchemaVariable, inst: Instantiation) -> Option<Self> {
        match self.map.get(sv) {
            Some(old) if old.equivalent(&inst) => Some(self.clone()),
            Some(_) => None,
            None => Some(Self {
                map: self.map.update(sv.clone(), inst),
                context: self.context.clone(),
            }),
        }
    }

    pub fn add_term(&self, sv: &SchemaVariable, t: Term) -> Option<Self> {
        self.add(sv, Instantiation::Term(t))
    }

    pub fn context(&self) -> Option<&ContextInstantiation> {
        self.context.as_ref()
    }

    /// Record the execution context; fails if a different one is recorded.
    pub fn with_context(&self, ctx: ContextInstantiation) -> Option<Self> {
        match &self.context {
            Some(old) if *old == ctx => Some(self.clone()),
            Some(_) => None,
            None => Some(Self {
                map: self.map.clone(),
                context: Some(ctx),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SchemaVariable, &Instantiation)> {
        self.map.iter()
    }
}

impl Display for SvInstantiations {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.map.iter().collect();
        entries.sort_by(|a, b| a.0.name().as_str().cmp(b.0.name().as_str()));
        write!(f, "{{")?;
        for (i, (sv, inst)) in entries.into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{sv} := {inst}")?;
        }
        write!(f, "}}")
    }
}

/// Pairs of (pattern variable, candidate variable) for the logic-variable
/// binders entered so far, innermost last.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct RenamingTable(im::Vector<(LogicVariable, LogicVariable)>);

impl RenamingTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, pattern: LogicVariable, candidate: LogicVariable) {
        self.0.push_back((pattern, candidate));
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Whether an occurrence of `pattern` may stand against an occurrence of
    /// `candidate`: both refer to the same binder pair, or both are free and equal.
    pub fn corresponds(&self, pattern: &LogicVariable, candidate: &LogicVariable) -> bool {
        let by_pattern = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, (p, _))| p == pattern)
            .map(|(i, _)| i)
            .last();
        let by_candidate = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| c == candidate)
            .map(|(i, _)| i)
            .last();
        match (by_pattern, by_candidate) {
            (None, None) => pattern == candidate,
            (p, c) => p == c,
        }
    }

    /// Whether `candidate` is bound by a pattern binder in scope.
    pub fn binds_candidate(&self, candidate: &LogicVariable) -> bool {
        self.0.iter().any(|(_, c)| c == candidate)
    }
}

/// Everything a match attempt threads through the recursion.
#[derive(Clone, Default, Debug)]
pub struct MatchConditions {
    pub insts: SvInstantiations,
    pub renamings: RenamingTable,
}

impl MatchConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_insts(insts: SvInstantiations) -> Self {
        Self {
            insts,
            renamings: RenamingTable::default(),
        }
    }

    pub fn with_insts(self, insts: SvInstantiations) -> Self {
        Self { insts, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Function, Sort, TermBuilder};

    #[test]
    fn single_assignment() {
        let tb = TermBuilder;
        let phi = SchemaVariable::formula("#phi");
        let p = tb.cons(Function::predicate("p", 0));
        let q = tb.cons(Function::predicate("q", 0));
        let empty = SvInstantiations::new();
        let bound = empty.add_term(&phi, p.clone()).unwrap();
        assert!(empty.get(&phi).is_none());
        assert!(bound.add_term(&phi, p).is_some());
        assert!(bound.add_term(&phi, q).is_none());
    }

    #[test]
    fn rebinding_modulo_renaming() {
        let tb = TermBuilder;
        let s = Sort::new("s");
        let x = LogicVariable::new("x", s);
        let y = LogicVariable::new("y", s);
        let p = Function::predicate("p", 1);
        let phi = SchemaVariable::formula("#phi");
        let insts = SvInstantiations::new()
            .add_term(&phi, tb.all(x, tb.func(p, [tb.var(x)])))
            .unwrap();
        assert!(insts
            .add_term(&phi, tb.all(y, tb.func(p, [tb.var(y)])))
            .is_some());
    }

    #[test]
    fn renaming_scopes() {
        let s = Sort::new("s");
        let x = LogicVariable::new("x", s);
        let y = LogicVariable::new("y", s);
        let z = LogicVariable::new("z", s);
        let mut table = RenamingTable::default();
        table.push(x, y);
        table.push(x, z);
        assert!(table.corresponds(&x, &z));
        assert!(!table.corresponds(&x, &y));
        table.truncate(1);
        assert!(table.corresponds(&x, &y));
        assert!(!table.corresponds(&x, &x));
        assert!(table.corresponds(&z, &z));
        assert!(table.binds_candidate(&y));
        assert!(!table.binds_candidate(&z));
    }
}
