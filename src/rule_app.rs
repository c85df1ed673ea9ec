//! Rule applications: a taclet, its instantiations, and where it applies.
use std::fmt::{self, Display, Formatter};

use crate::instantiations::{Instantiation, MatchConditions, SvInstantiations};
use crate::schema::{SchemaVariable, SvKind};
use crate::sequent::{PosInOccurrence, Sequent};
use crate::rule::Taclet;
use crate::term::Term;
use crate::Symbol;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TacletApp {
    taclet: Taclet,
    insts: SvInstantiations,
    pos: Option<PosInOccurrence>,
    assumes: Option<Vec<PosInOccurrence>>,
}

impl TacletApp {
    pub fn new(taclet: Taclet, insts: SvInstantiations, pos: Option<PosInOccurrence>) -> Self {
        let assumes = taclet.assumes().is_empty().then(Vec::new);
        Self {
            taclet,
            insts,
            pos,
            assumes,
        }
    }

    pub fn taclet(&self) -> &Taclet {
        &self.taclet
    }

    pub fn rule_name(&self) -> Symbol {
        self.taclet.name()
    }

    pub fn instantiations(&self) -> &SvInstantiations {
        &self.insts
    }

    pub fn pos(&self) -> Option<&PosInOccurrence> {
        self.pos.as_ref()
    }

    /// The formulas matched by the assumes part, once found.
    pub fn assumes_formulas(&self) -> Option<&[PosInOccurrence]> {
        self.assumes.as_deref()
    }

    /// Schema variables that still need a value before the rule can fire.
    /// Fresh variables are instantiated by the executor.
    pub fn uninstantiated_vars(&self) -> Vec<SchemaVariable> {
        self.taclet
            .schema_vars()
            .iter()
            .filter(|sv| !sv.is_skolem() && !self.insts.is_instantiated(sv))
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.assumes.is_some()
            && self.uninstantiated_vars().is_empty()
            && self.taclet.check_conditions(&self.insts, true)
    }

    /// Supply a value for an open schema variable. Returns `None` if the
    /// value clashes with an existing one or violates a condition.
    pub fn add_instantiation(&self, sv: &SchemaVariable, t: Term) -> Option<TacletApp> {
        let sort_ok = match sv.kind() {
            SvKind::Formula => t.sort().is_formula(),
            SvKind::Term(sort) => !t.sort().is_formula() && t.sort().extends(sort),
            _ => false,
        };
        if !sort_ok || (sv.is_rigid() && !t.is_rigid()) {
            return None;
        }
        let insts = self.insts.add(sv, Instantiation::Term(t))?;
        if !self.taclet.check_conditions(&insts, false) {
            return None;
        }
        Some(TacletApp {
            insts,
            ..self.clone()
        })
    }

    /// Complete the assumes part against `seq`, taking the first combination
    /// of formulas that matches.
    pub fn find_assumes(&self, seq: &Sequent) -> Option<TacletApp> {
        if self.assumes.is_some() {
            return Some(self.clone());
        }
        let mc = MatchConditions::from_insts(self.insts.clone());
        let (mc, found) = self.taclet.match_assumes(seq, self.pos.as_ref(), mc)?;
        Some(TacletApp {
            taclet: self.taclet.clone(),
            insts: mc.insts,
            pos: self.pos.clone(),
            assumes: Some(found),
        })
    }

    /// Whether `other` applies the same rule at the same place the same way.
    pub fn same_application(&self, other: &TacletApp) -> bool {
        self.taclet == other.taclet && self.pos == other.pos && self.insts == other.insts
    }
}

impl Display for TacletApp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.taclet.display_name())?;
        if let Some(pos) = &self.pos {
            write!(f, " at {}", pos.subterm())?;
        }
        if !self.insts.is_empty() {
            write!(f, " with {}", self.insts)?;
        }
        Ok(())
    }
}
