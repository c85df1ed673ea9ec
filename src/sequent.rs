//! Sequents and the change records produced when they are edited.
//!
//! Sequents are persistent: every edit returns a new sequent together with a
//! description of what was added, removed, or rejected as redundant.
use std::fmt::{self, Display, Formatter};

use crate::term::{Junctor, Operator, PosInTerm, Term};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Side {
    Antec,
    Succ,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SequentFormula(Term);

impl SequentFormula {
    pub fn new(formula: Term) -> Self {
        assert!(
            formula.sort().is_formula(),
            "sequent formula {formula} is not a formula"
        );
        SequentFormula(formula)
    }

    pub fn formula(&self) -> &Term {
        &self.0
    }

    /// `true` in the antecedent or `false` in the succedent says nothing.
    fn is_trivial_on(&self, side: Side) -> bool {
        matches!(
            (side, self.0.op()),
            (Side::Antec, Operator::Junctor(Junctor::True))
                | (Side::Succ, Operator::Junctor(Junctor::False))
        )
    }
}

impl Display for SequentFormula {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an edit of one semisequent did.
#[derive(Clone, Debug, Default)]
pub struct SemisequentChangeInfo {
    pub added: Vec<SequentFormula>,
    pub removed: Vec<SequentFormula>,
    /// Formulas an edit tried to add that were redundant.
    pub rejected: Vec<SequentFormula>,
    pub result: Semisequent,
}

impl SemisequentChangeInfo {
    fn unchanged(result: Semisequent) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    pub fn has_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Semisequent(im::Vector<SequentFormula>);

impl Semisequent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SequentFormula> {
        self.0.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequentFormula> {
        self.0.iter()
    }

    /// Position of `sf`, preferring reference identity.
    pub fn index_of(&self, sf: &SequentFormula) -> Option<usize> {
        self.0
            .iter()
            .position(|f| Term::ptr_eq(f.formula(), sf.formula()))
            .or_else(|| self.0.iter().position(|f| f == sf))
    }

    fn is_redundant(&self, sf: &SequentFormula, side: Side) -> bool {
        sf.is_trivial_on(side)
            || self
                .0
                .iter()
                .any(|f| f.formula().equals_mod_renaming(sf.formula()))
    }

    /// Insert `sf` at `idx` unless an equal formula (up to bound renaming)
    /// is already present.
    pub fn insert(&self, idx: usize, sf: SequentFormula, side: Side) -> SemisequentChangeInfo {
        if self.is_redundant(&sf, side) {
            let mut info = SemisequentChangeInfo::unchanged(self.clone());
            info.rejected.push(sf);
            return info;
        }
        let mut result = self.0.clone();
        result.insert(idx.min(result.len()), sf.clone());
        SemisequentChangeInfo {
            added: vec![sf],
            result: Semisequent(result),
            ..Default::default()
        }
    }

    /// Insert the formulas in order, starting at `idx`.
    pub fn insert_all(
        &self,
        idx: usize,
        formulas: impl IntoIterator<Item = SequentFormula>,
        side: Side,
    ) -> SemisequentChangeInfo {
        let mut info = SemisequentChangeInfo::unchanged(self.clone());
        let mut at = idx;
        for sf in formulas {
            let step = info.result.insert(at, sf, side);
            if !step.added.is_empty() {
                at += 1;
            }
            info.added.extend(step.added);
            info.rejected.extend(step.rejected);
            info.result = step.result;
        }
        info
    }

    pub fn remove(&self, idx: usize) -> SemisequentChangeInfo {
        let mut result = self.0.clone();
        let removed = result.remove(idx);
        SemisequentChangeInfo {
            removed: vec![removed],
            result: Semisequent(result),
            ..Default::default()
        }
    }

    /// Replace the formula at `idx` by `formulas`. Replacing a formula by
    /// one equal to it up to renaming is not a change.
    pub fn replace(
        &self,
        idx: usize,
        formulas: Vec<SequentFormula>,
        side: Side,
    ) -> SemisequentChangeInfo {
        if let ([new], Some(old)) = (formulas.as_slice(), self.0.get(idx)) {
            if new.formula().equals_mod_renaming(old.formula()) {
                let mut info = SemisequentChangeInfo::unchanged(self.clone());
                info.rejected.push(new.clone());
                return info;
            }
        }
        let removal = self.remove(idx);
        let mut info = removal.result.insert_all(idx, formulas, side);
        info.removed = removal.removed;
        info
    }
}

impl FromIterator<SequentFormula> for Semisequent {
    fn from_iter<T: IntoIterator<Item = SequentFormula>>(iter: T) -> Self {
        Semisequent(iter.into_iter().collect())
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Sequent {
    antec: Semisequent,
    succ: Semisequent,
}

impl Sequent {
    pub fn new(antec: Semisequent, succ: Semisequent) -> Self {
        Self { antec, succ }
    }

    /// Build a sequent, dropping redundant formulas.
    pub fn from_formulas(
        antec: impl IntoIterator<Item = Term>,
        succ: impl IntoIterator<Item = Term>,
    ) -> Self {
        let antec = Semisequent::new()
            .insert_all(0, antec.into_iter().map(SequentFormula::new), Side::Antec)
            .result;
        let succ = Semisequent::new()
            .insert_all(0, succ.into_iter().map(SequentFormula::new), Side::Succ)
            .result;
        Self { antec, succ }
    }

    pub fn antecedent(&self) -> &Semisequent {
        &self.antec
    }

    pub fn succedent(&self) -> &Semisequent {
        &self.succ
    }

    pub fn side(&self, side: Side) -> &Semisequent {
        match side {
            Side::Antec => &self.antec,
            Side::Succ => &self.succ,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.antec.is_empty() && self.succ.is_empty()
    }

    /// Every formula with its side, antecedent first.
    pub fn formulas(&self) -> impl Iterator<Item = (Side, &SequentFormula)> {
        self.antec
            .iter()
            .map(|f| (Side::Antec, f))
            .chain(self.succ.iter().map(|f| (Side::Succ, f)))
    }

    fn with_side(&self, side: Side, semi: Semisequent) -> Sequent {
        match side {
            Side::Antec => Sequent::new(semi, self.succ.clone()),
            Side::Succ => Sequent::new(self.antec.clone(), semi),
        }
    }

    fn record(&self, side: Side, info: SemisequentChangeInfo) -> SequentChangeInfo {
        let sequent = self.with_side(side, info.result);
        let tag = |fs: Vec<SequentFormula>| -> Vec<(Side, SequentFormula)> {
            fs.into_iter().map(|f| (side, f)).collect()
        };
        SequentChangeInfo {
            added: tag(info.added),
            removed: tag(info.removed),
            rejected: tag(info.rejected),
            sequent,
        }
    }

    pub fn insert(&self, side: Side, idx: usize, sf: SequentFormula) -> SequentChangeInfo {
        self.record(side, self.side(side).insert(idx, sf, side))
    }

    pub fn insert_all(
        &self,
        side: Side,
        idx: usize,
        formulas: impl IntoIterator<Item = SequentFormula>,
    ) -> SequentChangeInfo {
        self.record(side, self.side(side).insert_all(idx, formulas, side))
    }

    pub fn remove(&self, side: Side, idx: usize) -> SequentChangeInfo {
        self.record(side, self.side(side).remove(idx))
    }

    pub fn replace(
        &self,
        side: Side,
        idx: usize,
        formulas: Vec<SequentFormula>,
    ) -> SequentChangeInfo {
        self.record(side, self.side(side).replace(idx, formulas, side))
    }
}

impl Display for Sequent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let join = |f: &mut Formatter<'_>, semi: &Semisequent| -> fmt::Result {
            for (i, sf) in semi.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{sf}")?;
            }
            Ok(())
        };
        join(f, &self.antec)?;
        if !self.antec.is_empty() {
            write!(f, " ")?;
        }
        write!(f, "==>")?;
        if !self.succ.is_empty() {
            write!(f, " ")?;
        }
        join(f, &self.succ)
    }
}

/// What a sequence of edits did to a sequent.
#[derive(Clone, Debug, Default)]
pub struct SequentChangeInfo {
    pub added: Vec<(Side, SequentFormula)>,
    pub removed: Vec<(Side, SequentFormula)>,
    pub rejected: Vec<(Side, SequentFormula)>,
    pub sequent: Sequent,
}

impl SequentChangeInfo {
    pub fn unchanged(sequent: Sequent) -> Self {
        Self {
            sequent,
            ..Default::default()
        }
    }

    /// Whether the edits changed the sequent, as opposed to only having
    /// redundant additions rejected.
    pub fn has_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Append an edit that was applied to `self.sequent`.
    pub fn combine(mut self, next: SequentChangeInfo) -> SequentChangeInfo {
        for (side, f) in next.removed {
            // removing something added earlier in the same edit cancels it
            if let Some(i) = self.added.iter().position(|(s, g)| *s == side && *g == f) {
                self.added.remove(i);
            } else {
                self.removed.push((side, f));
            }
        }
        self.added.extend(next.added);
        self.rejected.extend(next.rejected);
        self.sequent = next.sequent;
        self
    }
}

/// A position in a sequent: a formula on one side and a path into it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PosInOccurrence {
    side: Side,
    formula: SequentFormula,
    pos: PosInTerm,
}

impl PosInOccurrence {
    pub fn new(side: Side, formula: SequentFormula, pos: PosInTerm) -> Self {
        Self { side, formula, pos }
    }

    pub fn top_level(side: Side, formula: SequentFormula) -> Self {
        Self::new(side, formula, PosInTerm::top())
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn sequent_formula(&self) -> &SequentFormula {
        &self.formula
    }

    pub fn pos_in_term(&self) -> &PosInTerm {
        &self.pos
    }

    pub fn is_top_level(&self) -> bool {
        self.pos.is_top()
    }

    pub fn subterm(&self) -> &Term {
        self.formula.formula().subterm_at(&self.pos)
    }

    pub fn depth(&self) -> usize {
        self.pos.depth()
    }
}

impl Display for PosInOccurrence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Antec => "antec",
            Side::Succ => "succ",
        };
        write!(f, "{} in {side} formula {}{}", self.subterm(), self.formula, self.pos)
    }
}
