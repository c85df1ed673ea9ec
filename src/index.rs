//! Finding rule applications.
//!
//! [`TacletIndex`] buckets taclets by the top operator of their find pattern.
//! Each goal owns a [`RuleAppIndex`] that stores the find matches of every
//! sequent formula and is updated from the change records of rule
//! applications, and a [`RuleAppQueue`] of costed, complete applications that
//! is rebuilt whenever the sequent changes.
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::trace;

use crate::feature::RuleAppCost;
use crate::rule_app::TacletApp;
use crate::sequent::{PosInOccurrence, Sequent, SequentChangeInfo, SequentFormula, Side};
use crate::rule::Taclet;
use crate::term::{Junctor, ModalityKind, Operator, Quantifier, Term};
use crate::util::{HashMap, IndexMap};
use crate::Symbol;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum OpKey {
    Function(Symbol),
    ProgramVariable(Symbol),
    Junctor(Junctor),
    Quantifier(Quantifier),
    Equals,
    IfThenElse,
    Subst,
    Modality(ModalityKind),
}

impl OpKey {
    fn of(op: &Operator) -> Option<OpKey> {
        Some(match op {
            Operator::Var(_) | Operator::Schema(_) => return None,
            Operator::Function(f) => OpKey::Function(f.name()),
            Operator::ProgramVariable(pv) => OpKey::ProgramVariable(pv.name()),
            Operator::Junctor(j) => OpKey::Junctor(*j),
            Operator::Quantifier(q) => OpKey::Quantifier(*q),
            Operator::Equals => OpKey::Equals,
            Operator::IfThenElse => OpKey::IfThenElse,
            Operator::Subst => OpKey::Subst,
            Operator::Modality(kind, _) => OpKey::Modality(*kind),
        })
    }
}

/// All taclets of a proof, bucketed for fast candidate lookup.
#[derive(Clone, Default, Debug)]
pub struct TacletIndex {
    by_name: IndexMap<Symbol, Taclet>,
    by_op: HashMap<OpKey, Vec<Taclet>>,
    /// Taclets whose find pattern is a schema variable.
    wildcard: Vec<Taclet>,
    no_find: Vec<Taclet>,
}

impl TacletIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a taclet, replacing any taclet of the same name.
    pub fn add(&mut self, taclet: Taclet) {
        if self.by_name.contains_key(&taclet.name()) {
            self.remove(taclet.name());
        }
        match taclet.find().pattern() {
            None => self.no_find.push(taclet.clone()),
            Some(pattern) => match OpKey::of(pattern.op()) {
                Some(key) => self.by_op.entry(key).or_default().push(taclet.clone()),
                None => self.wildcard.push(taclet.clone()),
            },
        }
        self.by_name.insert(taclet.name(), taclet);
    }

    pub fn add_all(&mut self, taclets: impl IntoIterator<Item = Taclet>) {
        for t in taclets {
            self.add(t);
        }
    }

    pub fn remove(&mut self, name: Symbol) -> Option<Taclet> {
        let taclet = self.by_name.shift_remove(&name)?;
        for bucket in self.by_op.values_mut() {
            bucket.retain(|t| t.name() != name);
        }
        self.wildcard.retain(|t| t.name() != name);
        self.no_find.retain(|t| t.name() != name);
        Some(taclet)
    }

    pub fn get(&self, name: Symbol) -> Option<&Taclet> {
        self.by_name.get(&name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Taclet> {
        self.by_name.values()
    }

    pub fn no_find_taclets(&self) -> &[Taclet] {
        &self.no_find
    }

    /// Taclets whose find pattern could match `t`.
    pub fn candidates<'a>(&'a self, t: &Term) -> impl Iterator<Item = &'a Taclet> + 'a {
        let bucket = OpKey::of(t.op())
            .and_then(|k| self.by_op.get(&k))
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        bucket.iter().chain(self.wildcard.iter())
    }

    /// Every find match of a taclet inside `sf`.
    pub fn matches_in(&self, side: Side, sf: &SequentFormula) -> Vec<TacletApp> {
        let mut out = Vec::new();
        sf.formula().visit_positions(&mut |pos, sub| {
            for taclet in self.candidates(sub) {
                if !taclet.find().admits(side, pos.is_top()) {
                    continue;
                }
                if let Some(mc) = taclet.match_find(sub) {
                    let pio = PosInOccurrence::new(side, sf.clone(), pos.clone());
                    out.push(TacletApp::new(taclet.clone(), mc.insts, Some(pio)));
                }
            }
        });
        out
    }
}

/// The find matches of a goal, per sequent formula.
#[derive(Clone, Default, Debug)]
pub struct RuleAppIndex {
    per_formula: IndexMap<(Side, SequentFormula), Vec<TacletApp>>,
    no_find: Vec<TacletApp>,
}

impl RuleAppIndex {
    /// Compute all matches in `seq`.
    pub fn new(taclets: &TacletIndex, seq: &Sequent) -> Self {
        let mut index = Self {
            per_formula: IndexMap::default(),
            no_find: taclets
                .no_find_taclets()
                .iter()
                .map(|t| TacletApp::new(t.clone(), Default::default(), None))
                .collect(),
        };
        for (side, sf) in seq.formulas() {
            index.add_formula(taclets, side, sf);
        }
        index
    }

    fn add_formula(&mut self, taclets: &TacletIndex, side: Side, sf: &SequentFormula) {
        let apps = taclets.matches_in(side, sf);
        trace!("{} matches in {}", apps.len(), sf);
        self.per_formula.insert((side, sf.clone()), apps);
    }

    /// Bring the index in line with a changed sequent.
    pub fn update(&mut self, taclets: &TacletIndex, change: &SequentChangeInfo) {
        for (side, sf) in &change.removed {
            self.per_formula.shift_remove(&(*side, sf.clone()));
        }
        for (side, sf) in &change.added {
            self.add_formula(taclets, *side, sf);
        }
    }

    /// Every indexed application, formula matches first in sequent order.
    pub fn apps(&self) -> impl Iterator<Item = &TacletApp> {
        self.per_formula
            .values()
            .flatten()
            .chain(self.no_find.iter())
    }

    /// Applications focused on `pos`, or all applications without a focus.
    pub fn apps_at<'a>(
        &'a self,
        pos: Option<&'a PosInOccurrence>,
    ) -> impl Iterator<Item = &'a TacletApp> + 'a {
        self.apps().filter(move |app| app.pos() == pos)
    }

    pub fn len(&self) -> usize {
        self.per_formula.values().map(Vec::len).sum::<usize>() + self.no_find.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct QueueEntry {
    cost: RuleAppCost,
    age: usize,
    app: TacletApp,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.age == other.age
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.cost, self.age).cmp(&(other.cost, other.age))
    }
}

/// Complete applications of one goal, cheapest first, ties in insertion order.
#[derive(Default)]
pub struct RuleAppQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    valid: bool,
}

impl RuleAppQueue {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Drop the contents; the next access must refill the queue.
    pub fn invalidate(&mut self) {
        self.heap.clear();
        self.valid = false;
    }

    pub fn fill(&mut self, entries: impl IntoIterator<Item = (RuleAppCost, TacletApp)>) {
        self.heap = entries
            .into_iter()
            .enumerate()
            .map(|(age, (cost, app))| Reverse(QueueEntry { cost, age, app }))
            .collect();
        self.valid = true;
    }

    pub fn peek(&self) -> Option<(RuleAppCost, &TacletApp)> {
        self.heap.peek().map(|Reverse(e)| (e.cost, &e.app))
    }

    pub fn pop(&mut self) -> Option<(RuleAppCost, TacletApp)> {
        self.heap.pop().map(|Reverse(e)| (e.cost, e.app))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl std::fmt::Debug for RuleAppQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleAppQueue")
            .field("len", &self.heap.len())
            .field("valid", &self.valid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaVariable;
    use crate::rule::{GoalTemplate, TacletBuilder};
    use crate::term::{Function, TermBuilder};

    fn and_left() -> Taclet {
        let tb = TermBuilder;
        let a = SchemaVariable::formula("#a");
        let b = SchemaVariable::formula("#b");
        TacletBuilder::new("andLeft")
            .find_antec(tb.and(tb.sv(&a), tb.sv(&b)))
            .goal(GoalTemplate::new().replace_sequent([tb.sv(&a), tb.sv(&b)], []))
            .build()
            .unwrap()
    }

    #[test]
    fn candidates_by_top_operator() {
        let tb = TermBuilder;
        let mut index = TacletIndex::new();
        index.add(and_left());
        let p = tb.cons(Function::predicate("p", 0));
        assert_eq!(index.candidates(&tb.and(p.clone(), p.clone())).count(), 1);
        assert_eq!(index.candidates(&tb.or(p.clone(), p)).count(), 0);
    }

    #[test]
    fn finds_respect_sides() {
        let tb = TermBuilder;
        let mut taclets = TacletIndex::new();
        taclets.add(and_left());
        let p = tb.cons(Function::predicate("p", 0));
        let q = tb.cons(Function::predicate("q", 0));
        let pq = tb.and(p, q);
        let seq = Sequent::from_formulas([pq.clone()], [pq]);
        let index = RuleAppIndex::new(&taclets, &seq);
        assert_eq!(index.len(), 1);
        assert_eq!(index.apps().next().unwrap().pos().unwrap().side(), Side::Antec);
    }

    #[test]
    fn update_follows_changes() {
        let tb = TermBuilder;
        let mut taclets = TacletIndex::new();
        taclets.add(and_left());
        let p = tb.cons(Function::predicate("p", 0));
        let q = tb.cons(Function::predicate("q", 0));
        let seq = Sequent::from_formulas([p.clone()], []);
        let mut index = RuleAppIndex::new(&taclets, &seq);
        assert!(index.is_empty());
        let change = seq.insert(Side::Antec, 0, SequentFormula::new(tb.and(p, q)));
        index.update(&taclets, &change);
        assert_eq!(index.len(), 1);
        let removal = change.sequent.remove(Side::Antec, 0);
        index.update(&taclets, &removal);
        assert!(index.is_empty());
    }

    #[test]
    fn queue_orders_by_cost_then_age() {
        let app = TacletApp::new(and_left(), Default::default(), None);
        let mut queue = RuleAppQueue::default();
        assert!(!queue.is_valid());
        queue.fill([
            (RuleAppCost::Number(5), app.clone()),
            (RuleAppCost::Number(-1), app.clone()),
            (RuleAppCost::Number(-1), app),
        ]);
        let costs: Vec<_> = std::iter::from_fn(|| queue.pop().map(|(c, _)| c)).collect();
        assert_eq!(
            costs,
            vec![RuleAppCost::Number(-1), RuleAppCost::Number(-1), RuleAppCost::Number(5)]
        );
        queue.invalidate();
        assert!(!queue.is_valid() && queue.is_empty());
    }
}
