//! Schema variables: the typed placeholders of rule patterns.
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::program::{ProgramElement, ProgramKind};
use crate::term::Sort;
use crate::Symbol;

/// Which program elements a program schema variable may stand for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ProgramSort {
    Statement,
    Expression,
    /// A variable or a literal.
    SimpleExpression,
    Variable,
    Any,
}

impl ProgramSort {
    pub fn admits(&self, elem: &ProgramElement) -> bool {
        let kind = elem.kind();
        match self {
            ProgramSort::Statement => matches!(
                kind,
                ProgramKind::Skip
                    | ProgramKind::Assign
                    | ProgramKind::If
                    | ProgramKind::While
                    | ProgramKind::Block
                    | ProgramKind::Return
            ),
            ProgramSort::Expression => matches!(
                kind,
                ProgramKind::Var(_) | ProgramKind::Lit(_) | ProgramKind::BinOp(_)
            ),
            ProgramSort::SimpleExpression => {
                matches!(kind, ProgramKind::Var(_) | ProgramKind::Lit(_))
            }
            ProgramSort::Variable => matches!(kind, ProgramKind::Var(_)),
            ProgramSort::Any => !matches!(kind, ProgramKind::Schema(_) | ProgramKind::Context),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum SvKind {
    Term(Sort),
    Formula,
    /// Stands for a logic variable, typically in binder position.
    Variable(Sort),
    /// Instantiated with a fresh constant when the rule is applied.
    Skolem(Sort),
    Program(ProgramSort),
    Label,
}

#[derive(PartialEq, Eq, Hash, Debug)]
struct SvData {
    name: Symbol,
    kind: SvKind,
    list: bool,
    rigid: bool,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SchemaVariable(Arc<SvData>);

impl SchemaVariable {
    fn make(name: &str, kind: SvKind, list: bool) -> Self {
        SchemaVariable(Arc::new(SvData {
            name: Symbol::from(name),
            kind,
            list,
            rigid: false,
        }))
    }

    pub fn term(name: &str, sort: Sort) -> Self {
        Self::make(name, SvKind::Term(sort), false)
    }

    pub fn formula(name: &str) -> Self {
        Self::make(name, SvKind::Formula, false)
    }

    pub fn variable(name: &str, sort: Sort) -> Self {
        Self::make(name, SvKind::Variable(sort), false)
    }

    pub fn skolem(name: &str, sort: Sort) -> Self {
        Self::make(name, SvKind::Skolem(sort), false)
    }

    pub fn program(name: &str, sort: ProgramSort) -> Self {
        Self::make(name, SvKind::Program(sort), false)
    }

    /// A program schema variable matching a run of zero or more elements.
    pub fn program_list(name: &str, sort: ProgramSort) -> Self {
        Self::make(name, SvKind::Program(sort), true)
    }

    pub fn label(name: &str) -> Self {
        Self::make(name, SvKind::Label, false)
    }

    /// A copy that only matches rigid terms.
    pub fn rigid(self) -> Self {
        SchemaVariable(Arc::new(SvData {
            name: self.0.name,
            kind: self.0.kind.clone(),
            list: self.0.list,
            rigid: true,
        }))
    }

    pub fn name(&self) -> Symbol {
        self.0.name
    }

    pub fn kind(&self) -> &SvKind {
        &self.0.kind
    }

    pub fn is_list(&self) -> bool {
        self.0.list
    }

    pub fn is_rigid(&self) -> bool {
        self.0.rigid
    }

    pub fn is_skolem(&self) -> bool {
        matches!(self.0.kind, SvKind::Skolem(_))
    }

    /// The sort of the terms this variable stands for.
    pub fn sort(&self) -> Sort {
        match &self.0.kind {
            SvKind::Formula => Sort::formula(),
            SvKind::Term(s) | SvKind::Variable(s) | SvKind::Skolem(s) => *s,
            SvKind::Program(_) | SvKind::Label => Sort::any(),
        }
    }
}

impl Display for SchemaVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)?;
        if self.0.list {
            write!(f, "*")?;
        }
        Ok(())
    }
}
