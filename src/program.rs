//! Program elements: a small statement language that modalities range over.
//!
//! A modality's program is a [`ProgramKind::Block`]. In rule patterns a block
//! whose only child is a [`ProgramKind::Context`] element stands for "the
//! active statements of this block", where the surrounding nested blocks and
//! the statements following the active ones are kept in a
//! [`ContextInstantiation`] and restored when the rule's result is built.
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::schema::SchemaVariable;
use crate::term::{Function, ProgramVariable, Sort, Term, TermBuilder};
use crate::util::IndexSet;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Literal {
    Bool(bool),
    Int(i64),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Eq,
    Lt,
}

impl BinOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Eq => "==",
            BinOp::Lt => "<",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ProgramKind {
    Skip,
    Var(ProgramVariable),
    Lit(Literal),
    /// `children[0] = children[1];`
    Assign,
    BinOp(BinOp),
    /// `if (children[0]) children[1] else children[2]`
    If,
    /// `while (children[0]) children[1]`
    While,
    Block,
    /// `return;` or `return children[0];`
    Return,
    Schema(SchemaVariable),
    /// Pattern-only: the active statements of the enclosing block.
    Context,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ProgramElement {
    kind: ProgramKind,
    children: Arc<[ProgramElement]>,
}

pub fn boolean_sort() -> Sort {
    Sort::new("boolean")
}

pub fn int_sort() -> Sort {
    Sort::new("int")
}

impl ProgramElement {
    pub fn new(kind: ProgramKind, children: impl IntoIterator<Item = ProgramElement>) -> Self {
        Self {
            kind,
            children: children.into_iter().collect(),
        }
    }

    pub fn skip() -> Self {
        Self::new(ProgramKind::Skip, [])
    }

    pub fn var(pv: ProgramVariable) -> Self {
        Self::new(ProgramKind::Var(pv), [])
    }

    pub fn lit(lit: Literal) -> Self {
        Self::new(ProgramKind::Lit(lit), [])
    }

    pub fn assign(lhs: ProgramVariable, rhs: ProgramElement) -> Self {
        Self::new(ProgramKind::Assign, [Self::var(lhs), rhs])
    }

    pub fn bin_op(op: BinOp, a: ProgramElement, b: ProgramElement) -> Self {
        Self::new(ProgramKind::BinOp(op), [a, b])
    }

    pub fn if_then_else(cond: ProgramElement, then: ProgramElement, els: ProgramElement) -> Self {
        Self::new(ProgramKind::If, [cond, then, els])
    }

    pub fn while_loop(cond: ProgramElement, body: ProgramElement) -> Self {
        Self::new(ProgramKind::While, [cond, body])
    }

    pub fn block(stmts: impl IntoIterator<Item = ProgramElement>) -> Self {
        Self::new(ProgramKind::Block, stmts)
    }

    pub fn ret(value: Option<ProgramElement>) -> Self {
        Self::new(ProgramKind::Return, value)
    }

    pub fn schema(sv: &SchemaVariable) -> Self {
        Self::new(ProgramKind::Schema(sv.clone()), [])
    }

    /// The pattern block `{ .. active ... }`.
    pub fn context(active: impl IntoIterator<Item = ProgramElement>) -> Self {
        Self::block([Self::new(ProgramKind::Context, active)])
    }

    pub fn kind(&self) -> &ProgramKind {
        &self.kind
    }

    pub fn children(&self) -> &[ProgramElement] {
        &self.children
    }

    pub fn with_children(&self, children: impl IntoIterator<Item = ProgramElement>) -> Self {
        Self::new(self.kind.clone(), children)
    }

    /// The active statements if this is a context pattern block.
    pub fn context_pattern(&self) -> Option<&[ProgramElement]> {
        match (&self.kind, &*self.children) {
            (ProgramKind::Block, [only]) if only.kind == ProgramKind::Context => {
                Some(only.children())
            }
            _ => None,
        }
    }

    pub fn collect_schema_vars(&self, out: &mut IndexSet<SchemaVariable>) {
        if let ProgramKind::Schema(sv) = &self.kind {
            out.insert(sv.clone());
        }
        for child in self.children.iter() {
            child.collect_schema_vars(out);
        }
    }

    /// The term denoted by an expression, if it has one.
    pub fn to_term(&self) -> Option<Term> {
        let tb = TermBuilder;
        match &self.kind {
            ProgramKind::Var(pv) => Some(tb.prog_var(*pv)),
            ProgramKind::Lit(Literal::Bool(b)) => {
                let name = if *b { "TRUE" } else { "FALSE" };
                Some(tb.cons(Function::constant(name, boolean_sort())))
            }
            ProgramKind::Lit(Literal::Int(n)) => {
                Some(tb.cons(Function::constant(n.to_string().as_str(), int_sort())))
            }
            ProgramKind::BinOp(op) => {
                let a = self.children[0].to_term()?;
                let b = self.children[1].to_term()?;
                let (name, sort) = match op {
                    BinOp::Add => ("add", int_sort()),
                    BinOp::Sub => ("sub", int_sort()),
                    BinOp::Eq => ("eq", boolean_sort()),
                    BinOp::Lt => ("lt", boolean_sort()),
                };
                Some(tb.func(Function::new(name, sort, 2), [a, b]))
            }
            _ => None,
        }
    }
}

fn write_stmts(f: &mut Formatter<'_>, stmts: &[ProgramElement]) -> fmt::Result {
    for s in stmts {
        write!(f, " {s}")?;
    }
    Ok(())
}

impl Display for ProgramElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = &self.children;
        match &self.kind {
            ProgramKind::Skip => write!(f, "skip;"),
            ProgramKind::Var(pv) => write!(f, "{}", pv.name()),
            ProgramKind::Lit(Literal::Bool(b)) => write!(f, "{b}"),
            ProgramKind::Lit(Literal::Int(n)) => write!(f, "{n}"),
            ProgramKind::Assign => write!(f, "{} = {};", c[0], c[1]),
            ProgramKind::BinOp(op) => write!(f, "{} {} {}", c[0], op.symbol(), c[1]),
            ProgramKind::If => write!(f, "if ({}) {} else {}", c[0], c[1], c[2]),
            ProgramKind::While => write!(f, "while ({}) {}", c[0], c[1]),
            ProgramKind::Block => {
                write!(f, "{{")?;
                write_stmts(f, c)?;
                write!(f, " }}")
            }
            ProgramKind::Return => match c.first() {
                Some(e) => write!(f, "return {e};"),
                None => write!(f, "return;"),
            },
            ProgramKind::Schema(sv) => write!(f, "{sv}"),
            ProgramKind::Context => {
                write!(f, "..")?;
                write_stmts(f, c)?;
                write!(f, " ...")
            }
        }
    }
}

/// Where the active statements of a matched block were found: `depth` leading
/// nested blocks below `outer`, and the first `consumed` statements there.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ContextInstantiation {
    outer: ProgramElement,
    depth: usize,
    consumed: usize,
}

impl ContextInstantiation {
    pub fn new(outer: ProgramElement, depth: usize, consumed: usize) -> Self {
        Self {
            outer,
            depth,
            consumed,
        }
    }

    pub fn outer(&self) -> &ProgramElement {
        &self.outer
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The statements after the active ones, in the innermost block.
    pub fn suffix(&self) -> &[ProgramElement] {
        let mut block = &self.outer;
        for _ in 0..self.depth {
            block = &block.children[0];
        }
        &block.children[self.consumed..]
    }

    /// Rebuild the outer block with the active statements replaced by `active`.
    pub fn splice(&self, active: Vec<ProgramElement>) -> ProgramElement {
        splice_at(&self.outer, self.depth, self.consumed, active)
    }
}

fn splice_at(
    block: &ProgramElement,
    depth: usize,
    consumed: usize,
    active: Vec<ProgramElement>,
) -> ProgramElement {
    if depth == 0 {
        let mut stmts = active;
        stmts.extend(block.children[consumed..].iter().cloned());
        return block.with_children(stmts);
    }
    let inner = splice_at(&block.children[0], depth - 1, consumed, active);
    let mut stmts = Vec::with_capacity(block.children.len());
    stmts.push(inner);
    stmts.extend(block.children[1..].iter().cloned());
    block.with_children(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> ProgramVariable {
        ProgramVariable::new("x", int_sort())
    }

    #[test]
    fn display() {
        let p = ProgramElement::block([
            ProgramElement::assign(x(), ProgramElement::lit(Literal::Int(1))),
            ProgramElement::skip(),
        ]);
        assert_eq!(p.to_string(), "{ x = 1; skip; }");
    }

    #[test]
    fn splice_keeps_prefix_and_suffix() {
        let inner = ProgramElement::block([ProgramElement::skip(), ProgramElement::ret(None)]);
        let outer = ProgramElement::block([
            inner,
            ProgramElement::assign(x(), ProgramElement::lit(Literal::Int(2))),
        ]);
        let ctx = ContextInstantiation::new(outer, 1, 1);
        assert_eq!(ctx.suffix().len(), 1);
        let spliced = ctx.splice(vec![]);
        assert_eq!(spliced.to_string(), "{ { return; } x = 2; }");
    }

    #[test]
    fn expressions_to_terms() {
        let e = ProgramElement::bin_op(
            BinOp::Add,
            ProgramElement::var(x()),
            ProgramElement::lit(Literal::Int(1)),
        );
        let t = e.to_term().unwrap();
        assert_eq!(t.to_string(), "add(x, 1)");
        assert!(!t.is_rigid());
        assert!(ProgramElement::skip().to_term().is_none());
    }
}
