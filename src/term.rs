//! The term algebra the rest of the crate operates on.
//!
//! Terms are immutable and structurally shared: a [`Term`] is an [`Arc`]
//! around its operator, subterms, the variables bound at each subterm
//! position and a label set. The free-variable set, sort, rigidity and a
//! structural hash are computed once when a term is built and never change.
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::program::ProgramElement;
use crate::schema::SchemaVariable;
use crate::util::HashSet;
use crate::Symbol;

pub type FreeVars = im::HashSet<LogicVariable>;
pub type BoundVars = SmallVec<[QuantifiableVariable; 1]>;
pub type Labels = SmallVec<[TermLabel; 1]>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Sort(Symbol);

impl Sort {
    pub fn new(name: &str) -> Self {
        Sort(Symbol::from(name))
    }

    pub fn formula() -> Self {
        Sort::new("Formula")
    }

    /// The top sort of all non-formula terms.
    pub fn any() -> Self {
        Sort::new("any")
    }

    pub fn name(&self) -> Symbol {
        self.0
    }

    pub fn is_formula(&self) -> bool {
        *self == Sort::formula()
    }

    pub fn extends(&self, other: &Sort) -> bool {
        self == other || (*other == Sort::any() && !self.is_formula())
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A variable that can be bound by a quantifier or a substitution.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LogicVariable {
    name: Symbol,
    sort: Sort,
}

impl LogicVariable {
    pub fn new(name: impl Into<Symbol>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }
}

impl Display for LogicVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An entry of a bound-variable list. Patterns may bind schema variables
/// (`\forall #x; #phi`); concrete terms only ever bind logic variables.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum QuantifiableVariable {
    Logic(LogicVariable),
    Schema(SchemaVariable),
}

impl QuantifiableVariable {
    pub fn as_logic(&self) -> Option<&LogicVariable> {
        match self {
            QuantifiableVariable::Logic(lv) => Some(lv),
            QuantifiableVariable::Schema(_) => None,
        }
    }
}

impl From<LogicVariable> for QuantifiableVariable {
    fn from(lv: LogicVariable) -> Self {
        QuantifiableVariable::Logic(lv)
    }
}

impl Display for QuantifiableVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QuantifiableVariable::Logic(lv) => write!(f, "{lv}"),
            QuantifiableVariable::Schema(sv) => write!(f, "{sv}"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TermLabel {
    Name(Symbol),
    Schema(SchemaVariable),
}

impl Display for TermLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TermLabel::Name(n) => write!(f, "{n}"),
            TermLabel::Schema(sv) => write!(f, "{sv}"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Function {
    name: Symbol,
    sort: Sort,
    arity: u32,
    rigid: bool,
}

impl Function {
    pub fn new(name: impl Into<Symbol>, sort: Sort, arity: usize) -> Self {
        Self {
            name: name.into(),
            sort,
            arity: arity as u32,
            rigid: true,
        }
    }

    pub fn constant(name: impl Into<Symbol>, sort: Sort) -> Self {
        Self::new(name, sort, 0)
    }

    pub fn predicate(name: impl Into<Symbol>, arity: usize) -> Self {
        Self::new(name, Sort::formula(), arity)
    }

    /// A function whose value depends on the program state.
    pub fn non_rigid(mut self) -> Self {
        self.rigid = false;
        self
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn arity(&self) -> usize {
        self.arity as usize
    }
}

/// A variable of the program model; its value depends on the state, so
/// terms containing it are never rigid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramVariable {
    name: Symbol,
    sort: Sort,
}

impl ProgramVariable {
    pub fn new(name: impl Into<Symbol>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Junctor {
    True,
    False,
    Not,
    And,
    Or,
    Imp,
    Equiv,
}

impl Junctor {
    pub fn arity(&self) -> usize {
        match self {
            Junctor::True | Junctor::False => 0,
            Junctor::Not => 1,
            Junctor::And | Junctor::Or | Junctor::Imp | Junctor::Equiv => 2,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Junctor::True => "true",
            Junctor::False => "false",
            Junctor::Not => "!",
            Junctor::And => "&",
            Junctor::Or => "|",
            Junctor::Imp => "->",
            Junctor::Equiv => "<->",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Quantifier {
    All,
    Ex,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ModalityKind {
    Diamond,
    Box,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Operator {
    Var(LogicVariable),
    Function(Function),
    ProgramVariable(ProgramVariable),
    Junctor(Junctor),
    Quantifier(Quantifier),
    Equals,
    IfThenElse,
    /// `{\subst x; t} body`: binds `x` in the second subterm.
    /// Executed with a clash-free substitution when a rule instantiates it.
    Subst,
    /// A modality over a program block, with the post condition as its only subterm.
    Modality(ModalityKind, ProgramElement),
    Schema(SchemaVariable),
}

impl Operator {
    pub fn arity(&self) -> usize {
        match self {
            Operator::Var(_) | Operator::ProgramVariable(_) | Operator::Schema(_) => 0,
            Operator::Function(f) => f.arity(),
            Operator::Junctor(j) => j.arity(),
            Operator::Quantifier(_) | Operator::Modality(..) => 1,
            Operator::Equals | Operator::Subst => 2,
            Operator::IfThenElse => 3,
        }
    }

    pub fn is_rigid(&self) -> bool {
        match self {
            Operator::ProgramVariable(_) | Operator::Modality(..) => false,
            Operator::Function(f) => f.rigid,
            _ => true,
        }
    }

    /// The subterm position whose bound-variable list this operator uses, if any.
    pub fn binding_position(&self) -> Option<usize> {
        match self {
            Operator::Quantifier(_) => Some(0),
            Operator::Subst => Some(1),
            _ => None,
        }
    }
}

struct TermData {
    op: Operator,
    subs: SmallVec<[Term; 2]>,
    bound: SmallVec<[BoundVars; 2]>,
    labels: Labels,
    free_vars: FreeVars,
    sort: Sort,
    rigid: bool,
    hash: u64,
}

/// An immutable, structurally shared term. Cloning is a reference-count bump.
#[derive(Clone)]
pub struct Term(Arc<TermData>);

impl Term {
    /// Build a term without bound variables or labels.
    pub fn new(op: Operator, subs: impl IntoIterator<Item = Term>) -> Term {
        Term::build(op, subs.into_iter().collect(), SmallVec::new(), Labels::new())
    }

    /// Build a term; `bound[i]` lists the variables bound in subterm `i`.
    /// A shorter `bound` is padded with empty lists.
    pub fn build(
        op: Operator,
        subs: SmallVec<[Term; 2]>,
        mut bound: SmallVec<[BoundVars; 2]>,
        labels: Labels,
    ) -> Term {
        assert_eq!(
            op.arity(),
            subs.len(),
            "operator {op:?} expects {} subterms",
            op.arity()
        );
        assert!(bound.len() <= subs.len(), "more bound lists than subterms");
        bound.resize_with(subs.len(), BoundVars::new);

        let free_vars = match &op {
            Operator::Var(lv) => FreeVars::unit(*lv),
            _ => {
                let mut fv = FreeVars::new();
                for (sub, bv) in subs.iter().zip(bound.iter()) {
                    if bv.is_empty() {
                        fv = fv.union(sub.free_vars().clone());
                    } else {
                        let mut local = sub.free_vars().clone();
                        for qv in bv.iter() {
                            if let QuantifiableVariable::Logic(lv) = qv {
                                local.remove(lv);
                            }
                        }
                        fv = fv.union(local);
                    }
                }
                fv
            }
        };

        let sort = match &op {
            Operator::Var(lv) => lv.sort(),
            Operator::Function(f) => f.sort(),
            Operator::ProgramVariable(pv) => pv.sort(),
            Operator::Junctor(_)
            | Operator::Quantifier(_)
            | Operator::Equals
            | Operator::Modality(..) => Sort::formula(),
            Operator::IfThenElse | Operator::Subst => subs[1].sort(),
            Operator::Schema(sv) => sv.sort(),
        };

        let rigid = op.is_rigid() && subs.iter().all(|s| s.is_rigid());

        let mut hasher = rustc_hash::FxHasher::default();
        op.hash(&mut hasher);
        for sub in subs.iter() {
            hasher.write_u64(sub.0.hash);
        }
        bound.hash(&mut hasher);
        labels.hash(&mut hasher);
        let hash = hasher.finish();

        Term(Arc::new(TermData {
            op,
            subs,
            bound,
            labels,
            free_vars,
            sort,
            rigid,
            hash,
        }))
    }

    pub fn op(&self) -> &Operator {
        &self.0.op
    }

    pub fn arity(&self) -> usize {
        self.0.subs.len()
    }

    pub fn sub(&self, i: usize) -> &Term {
        &self.0.subs[i]
    }

    pub fn subs(&self) -> &[Term] {
        &self.0.subs
    }

    pub fn vars_bound_here(&self, i: usize) -> &[QuantifiableVariable] {
        &self.0.bound[i]
    }

    pub fn bound_lists(&self) -> &[BoundVars] {
        &self.0.bound
    }

    pub fn labels(&self) -> &[TermLabel] {
        &self.0.labels
    }

    pub fn free_vars(&self) -> &FreeVars {
        &self.0.free_vars
    }

    pub fn sort(&self) -> Sort {
        self.0.sort
    }

    pub fn is_rigid(&self) -> bool {
        self.0.rigid
    }

    pub fn is_ground(&self) -> bool {
        self.0.free_vars.is_empty()
    }

    /// Reference identity, not structural equality.
    pub fn ptr_eq(a: &Term, b: &Term) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The same term with a different label set.
    pub fn with_labels(&self, labels: Labels) -> Term {
        if labels == self.0.labels {
            return self.clone();
        }
        Term::build(
            self.0.op.clone(),
            self.0.subs.clone(),
            self.0.bound.clone(),
            labels,
        )
    }

    /// The same operator, bound variables and labels over new subterms.
    pub fn with_subs(&self, subs: SmallVec<[Term; 2]>) -> Term {
        Term::build(
            self.0.op.clone(),
            subs,
            self.0.bound.clone(),
            self.0.labels.clone(),
        )
    }

    pub fn subterm_at(&self, pos: &PosInTerm) -> &Term {
        let mut t = self;
        for &i in pos.0.iter() {
            t = t.sub(i as usize);
        }
        t
    }

    /// Replace the subterm at `pos` by `new`, rebuilding the path above it.
    pub fn replace_at(&self, pos: &PosInTerm, new: Term) -> Term {
        self.replace_at_depth(&pos.0, new)
    }

    fn replace_at_depth(&self, path: &[u16], new: Term) -> Term {
        match path.split_first() {
            None => new,
            Some((&i, rest)) => {
                let mut subs = self.0.subs.clone();
                subs[i as usize] = subs[i as usize].replace_at_depth(rest, new);
                self.with_subs(subs)
            }
        }
    }

    /// Visit every subterm in pre-order.
    pub fn visit_preorder(&self, f: &mut impl FnMut(&Term)) {
        f(self);
        for sub in self.subs() {
            sub.visit_preorder(f);
        }
    }

    /// Visit every subterm together with its position below `self`.
    pub fn visit_positions(&self, f: &mut impl FnMut(&PosInTerm, &Term)) {
        let mut pos = PosInTerm::top();
        self.visit_positions_rec(&mut pos, f);
    }

    fn visit_positions_rec(&self, pos: &mut PosInTerm, f: &mut impl FnMut(&PosInTerm, &Term)) {
        f(pos, self);
        for (i, sub) in self.subs().iter().enumerate() {
            pos.0.push(i as u16);
            sub.visit_positions_rec(pos, f);
            pos.0.pop();
        }
    }

    /// Every logic variable occurring in this term, free or bound.
    pub fn collect_vars(&self, out: &mut HashSet<LogicVariable>) {
        self.visit_preorder(&mut |t| {
            if let Operator::Var(lv) = t.op() {
                out.insert(*lv);
            }
            for bv in t.bound_lists() {
                for qv in bv {
                    if let QuantifiableVariable::Logic(lv) = qv {
                        out.insert(*lv);
                    }
                }
            }
        });
    }

    /// Every schema variable occurring in this term, including binders and labels.
    pub fn collect_schema_vars(&self, out: &mut crate::util::IndexSet<SchemaVariable>) {
        self.visit_preorder(&mut |t| {
            match t.op() {
                Operator::Schema(sv) => {
                    out.insert(sv.clone());
                }
                Operator::Modality(_, prog) => prog.collect_schema_vars(out),
                _ => {}
            }
            for bv in t.bound_lists() {
                for qv in bv {
                    if let QuantifiableVariable::Schema(sv) = qv {
                        out.insert(sv.clone());
                    }
                }
            }
            for label in t.labels() {
                if let TermLabel::Schema(sv) = label {
                    out.insert(sv.clone());
                }
            }
        });
    }

    /// Structural equality up to consistent renaming of bound variables.
    /// Labels are ignored.
    pub fn equals_mod_renaming(&self, other: &Term) -> bool {
        let mut left = Vec::new();
        let mut right = Vec::new();
        alpha_eq(self, other, &mut left, &mut right)
    }
}

fn alpha_eq(
    a: &Term,
    b: &Term,
    left: &mut Vec<QuantifiableVariable>,
    right: &mut Vec<QuantifiableVariable>,
) -> bool {
    if left.is_empty() && Term::ptr_eq(a, b) {
        return true;
    }
    match (a.op(), b.op()) {
        (Operator::Var(x), Operator::Var(y)) => {
            let x = QuantifiableVariable::Logic(*x);
            let y = QuantifiableVariable::Logic(*y);
            let i = left.iter().rposition(|v| *v == x);
            let j = right.iter().rposition(|v| *v == y);
            match (i, j) {
                (None, None) => x == y,
                (i, j) => i == j,
            }
        }
        (op_a, op_b) => {
            if op_a != op_b || a.arity() != b.arity() {
                return false;
            }
            for i in 0..a.arity() {
                let bv_a = a.vars_bound_here(i);
                let bv_b = b.vars_bound_here(i);
                if bv_a.len() != bv_b.len() {
                    return false;
                }
                let mark = left.len();
                left.extend(bv_a.iter().cloned());
                right.extend(bv_b.iter().cloned());
                let ok = alpha_eq(a.sub(i), b.sub(i), left, right);
                left.truncate(mark);
                right.truncate(mark);
                if !ok {
                    return false;
                }
            }
            true
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        Term::ptr_eq(self, other)
            || (self.0.hash == other.0.hash
                && self.0.op == other.0.op
                && self.0.subs == other.0.subs
                && self.0.bound == other.0.bound
                && self.0.labels == other.0.labels)
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Term({self})")
    }
}

fn write_bound(f: &mut Formatter<'_>, bv: &[QuantifiableVariable]) -> fmt::Result {
    for (i, qv) in bv.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{qv}")?;
    }
    Ok(())
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.op() {
            Operator::Var(lv) => write!(f, "{lv}")?,
            Operator::ProgramVariable(pv) => write!(f, "{}", pv.name())?,
            Operator::Schema(sv) => write!(f, "{sv}")?,
            Operator::Function(func) => {
                write!(f, "{}", func.name())?;
                if self.arity() > 0 {
                    write!(f, "(")?;
                    for (i, sub) in self.subs().iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{sub}")?;
                    }
                    write!(f, ")")?;
                }
            }
            Operator::Junctor(j) => match j.arity() {
                0 => write!(f, "{}", j.symbol())?,
                1 => write!(f, "{}{}", j.symbol(), self.sub(0))?,
                _ => write!(f, "({} {} {})", self.sub(0), j.symbol(), self.sub(1))?,
            },
            Operator::Quantifier(q) => {
                let kw = match q {
                    Quantifier::All => "\\forall",
                    Quantifier::Ex => "\\exists",
                };
                write!(f, "{kw} ")?;
                write_bound(f, self.vars_bound_here(0))?;
                write!(f, "; {}", self.sub(0))?;
            }
            Operator::Equals => write!(f, "{} = {}", self.sub(0), self.sub(1))?,
            Operator::IfThenElse => write!(
                f,
                "\\if ({}) \\then ({}) \\else ({})",
                self.sub(0),
                self.sub(1),
                self.sub(2)
            )?,
            Operator::Subst => {
                write!(f, "{{\\subst ")?;
                write_bound(f, self.vars_bound_here(1))?;
                write!(f, "; {}}}{}", self.sub(0), self.sub(1))?;
            }
            Operator::Modality(kind, prog) => match kind {
                ModalityKind::Diamond => write!(f, "\\<{}\\>{}", prog, self.sub(0))?,
                ModalityKind::Box => write!(f, "\\[{}\\]{}", prog, self.sub(0))?,
            },
        }
        if !self.labels().is_empty() {
            write!(f, "<<")?;
            for (i, l) in self.labels().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{l}")?;
            }
            write!(f, ">>")?;
        }
        Ok(())
    }
}

/// A path from a term to one of its subterms.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct PosInTerm(SmallVec<[u16; 4]>);

impl PosInTerm {
    pub fn top() -> Self {
        Self::default()
    }

    pub fn is_top(&self) -> bool {
        self.0.is_empty()
    }

    pub fn down(&self, i: usize) -> Self {
        let mut p = self.clone();
        p.0.push(i as u16);
        p
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().map(|&i| i as usize)
    }
}

impl Display for PosInTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{idx}")?;
        }
        write!(f, "]")
    }
}

/// Convenience constructors for terms.
#[derive(Clone, Copy, Debug, Default)]
pub struct TermBuilder;

impl TermBuilder {
    pub fn var(&self, lv: LogicVariable) -> Term {
        Term::new(Operator::Var(lv), [])
    }

    pub fn func(&self, f: Function, args: impl IntoIterator<Item = Term>) -> Term {
        Term::new(Operator::Function(f), args)
    }

    pub fn cons(&self, f: Function) -> Term {
        Term::new(Operator::Function(f), [])
    }

    pub fn prog_var(&self, pv: ProgramVariable) -> Term {
        Term::new(Operator::ProgramVariable(pv), [])
    }

    pub fn sv(&self, sv: &SchemaVariable) -> Term {
        Term::new(Operator::Schema(sv.clone()), [])
    }

    pub fn tt(&self) -> Term {
        Term::new(Operator::Junctor(Junctor::True), [])
    }

    pub fn ff(&self) -> Term {
        Term::new(Operator::Junctor(Junctor::False), [])
    }

    pub fn not(&self, t: Term) -> Term {
        Term::new(Operator::Junctor(Junctor::Not), [t])
    }

    pub fn and(&self, a: Term, b: Term) -> Term {
        Term::new(Operator::Junctor(Junctor::And), [a, b])
    }

    pub fn or(&self, a: Term, b: Term) -> Term {
        Term::new(Operator::Junctor(Junctor::Or), [a, b])
    }

    pub fn imp(&self, a: Term, b: Term) -> Term {
        Term::new(Operator::Junctor(Junctor::Imp), [a, b])
    }

    pub fn equiv(&self, a: Term, b: Term) -> Term {
        Term::new(Operator::Junctor(Junctor::Equiv), [a, b])
    }

    pub fn equals(&self, a: Term, b: Term) -> Term {
        Term::new(Operator::Equals, [a, b])
    }

    pub fn ite(&self, cond: Term, then: Term, els: Term) -> Term {
        Term::new(Operator::IfThenElse, [cond, then, els])
    }

    pub fn quantify(
        &self,
        q: Quantifier,
        vars: impl IntoIterator<Item = QuantifiableVariable>,
        body: Term,
    ) -> Term {
        Term::build(
            Operator::Quantifier(q),
            smallvec::smallvec![body],
            smallvec::smallvec![vars.into_iter().collect()],
            Labels::new(),
        )
    }

    pub fn all(&self, lv: LogicVariable, body: Term) -> Term {
        self.quantify(Quantifier::All, [lv.into()], body)
    }

    pub fn ex(&self, lv: LogicVariable, body: Term) -> Term {
        self.quantify(Quantifier::Ex, [lv.into()], body)
    }

    /// `{\subst x; replacement} body`
    pub fn subst(&self, x: QuantifiableVariable, replacement: Term, body: Term) -> Term {
        Term::build(
            Operator::Subst,
            smallvec::smallvec![replacement, body],
            smallvec::smallvec![BoundVars::new(), smallvec::smallvec![x]],
            Labels::new(),
        )
    }

    pub fn diamond(&self, prog: ProgramElement, post: Term) -> Term {
        Term::new(Operator::Modality(ModalityKind::Diamond, prog), [post])
    }

    pub fn box_(&self, prog: ProgramElement, post: Term) -> Term {
        Term::new(Operator::Modality(ModalityKind::Box, prog), [post])
    }

    pub fn label(&self, t: Term, labels: impl IntoIterator<Item = TermLabel>) -> Term {
        t.with_labels(labels.into_iter().collect())
    }
}
