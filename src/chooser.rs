//! Goal choosers decide which open goal the driver works on next.
use std::collections::VecDeque;

use log::trace;

use crate::proof::{GoalId, NodeId, Proof};
use crate::stop::{SearchBudget, StepPredicate, StopCondition};
use crate::util::IndexSet;

pub trait GoalChooser {
    /// Start choosing among `goals`.
    fn init(&mut self, proof: &Proof, goals: &[GoalId]);

    /// The goal to work on next, or `None` if no goal is left.
    fn next_goal(&mut self, proof: &mut Proof, stop: &mut dyn StopCondition) -> Option<GoalId>;

    /// Replace the goal a rule was applied to at `node` by `new_goals`.
    fn update_goal_list(&mut self, proof: &Proof, node: NodeId, new_goals: &[GoalId]);

    /// Stop choosing `goal`.
    fn remove_goal(&mut self, goal: GoalId);

    /// Forget all goals.
    fn clear(&mut self);
}

impl<T: GoalChooser + ?Sized> GoalChooser for Box<T> {
    fn init(&mut self, proof: &Proof, goals: &[GoalId]) {
        (**self).init(proof, goals)
    }

    fn next_goal(&mut self, proof: &mut Proof, stop: &mut dyn StopCondition) -> Option<GoalId> {
        (**self).next_goal(proof, stop)
    }

    fn update_goal_list(&mut self, proof: &Proof, node: NodeId, new_goals: &[GoalId]) {
        (**self).update_goal_list(proof, node, new_goals)
    }

    fn remove_goal(&mut self, goal: GoalId) {
        (**self).remove_goal(goal)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

/// Hands out the selected goals in list order and starts over when it runs
/// out. After a step, the goals replacing the worked-on goal take its place
/// in the list and choosing continues with the goal after it.
#[derive(Clone, Debug, Default)]
pub struct DepthFirstGoalChooser {
    selected: Vec<GoalId>,
    next_goals: VecDeque<GoalId>,
}

impl DepthFirstGoalChooser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &[GoalId] {
        &self.selected
    }

    /// Move the first selected goal to the end of the list.
    pub fn rotate(&mut self) {
        if !self.selected.is_empty() {
            self.selected.rotate_left(1);
        }
    }

    fn is_automatic(proof: &Proof, goal: GoalId) -> bool {
        proof.get_goal(goal).is_some_and(|g| g.is_automatic())
    }

    fn next_automatic(&mut self, proof: &Proof) -> Option<GoalId> {
        let mut refilled = false;
        loop {
            if self.next_goals.is_empty() {
                if refilled || self.selected.is_empty() {
                    return None;
                }
                self.next_goals = self.selected.iter().copied().collect();
                refilled = true;
            }
            let goal = self.next_goals.pop_front()?;
            if Self::is_automatic(proof, goal) {
                return Some(goal);
            }
        }
    }
}

impl GoalChooser for DepthFirstGoalChooser {
    fn init(&mut self, proof: &Proof, goals: &[GoalId]) {
        self.selected = goals.iter().copied().filter(|g| proof.is_open(*g)).collect();
        self.next_goals.clear();
    }

    fn next_goal(&mut self, proof: &mut Proof, _: &mut dyn StopCondition) -> Option<GoalId> {
        self.next_automatic(proof)
    }

    fn update_goal_list(&mut self, proof: &Proof, node: NodeId, new_goals: &[GoalId]) {
        let replaced = |g: GoalId| match proof.get_goal(g) {
            None => true,
            Some(goal) => proof.node(goal.node()).parent() == Some(node),
        };
        let mut updated = Vec::with_capacity(self.selected.len() + new_goals.len());
        let mut inserted = false;
        let mut after = VecDeque::new();
        for &g in &self.selected {
            if replaced(g) || new_goals.contains(&g) {
                if !inserted {
                    updated.extend(new_goals.iter().copied().filter(|n| proof.is_open(*n)));
                    inserted = true;
                }
                after.clear();
            } else {
                updated.push(g);
                after.push_back(g);
            }
        }
        if !inserted {
            updated.extend(new_goals.iter().copied().filter(|n| proof.is_open(*n)));
            after.clear();
        }
        self.selected = updated;
        self.next_goals = after;
    }

    fn remove_goal(&mut self, goal: GoalId) {
        self.selected.retain(|g| *g != goal);
        self.next_goals.retain(|g| *g != goal);
    }

    fn clear(&mut self) {
        self.selected.clear();
        self.next_goals.clear();
    }
}

/// Advances every goal by one significant step before any goal takes a
/// second one.
///
/// Goals whose next step is not significant are handed out as the inner
/// depth-first chooser proposes them. Significant steps go first to the goals
/// still owed a turn; a goal whose next step the stop condition denies is
/// deferred to the end of the list, and is handed out anyway when it comes
/// up denied a second time. A call that finds no permitted goal within two
/// passes over the list returns the first goal it looked at.
pub struct BalancedGoalChooser<P> {
    inner: DepthFirstGoalChooser,
    prefer: IndexSet<GoalId>,
    predicate: P,
}

impl<P: StepPredicate> BalancedGoalChooser<P> {
    pub fn new(predicate: P) -> Self {
        Self {
            inner: DepthFirstGoalChooser::new(),
            prefer: IndexSet::default(),
            predicate,
        }
    }

    /// Goals still owed a significant step in the current round.
    pub fn preferred(&self) -> &IndexSet<GoalId> {
        &self.prefer
    }

    /// Start a new round once every preferred goal had its turn. Only goals
    /// the inner chooser can hand out are preferred.
    fn refill(&mut self, proof: &mut Proof, stop: &mut dyn StopCondition) {
        if !self.prefer.is_empty() {
            return;
        }
        let probe = SearchBudget::probe();
        let candidates: Vec<GoalId> = self
            .inner
            .selected()
            .iter()
            .copied()
            .filter(|g| DepthFirstGoalChooser::is_automatic(&*proof, *g))
            .collect();
        for &g in &candidates {
            if stop.is_goal_allowed(proof, g, &probe) {
                self.prefer.insert(g);
            }
        }
        if self.prefer.is_empty() {
            self.prefer.extend(candidates);
        }
        trace!("balanced chooser prefers {:?}", self.prefer);
    }
}

impl<P: StepPredicate> GoalChooser for BalancedGoalChooser<P> {
    fn init(&mut self, proof: &Proof, goals: &[GoalId]) {
        self.prefer.clear();
        self.inner.init(proof, goals);
    }

    fn next_goal(&mut self, proof: &mut Proof, stop: &mut dyn StopCondition) -> Option<GoalId> {
        if self.inner.selected().len() < 2 {
            return self.inner.next_goal(proof, stop);
        }
        self.prefer.retain(|g| DepthFirstGoalChooser::is_automatic(&*proof, *g));
        self.refill(proof, stop);
        let mut denied: IndexSet<GoalId> = IndexSet::default();
        let mut first = None;
        // every goal can be deferred once and then comes up again
        for _ in 0..2 * self.inner.selected().len() + 1 {
            let next = self.inner.next_goal(proof, stop)?;
            first.get_or_insert(next);
            let node = proof.goal(next).node();
            let significant = match proof.peek_next(next).cloned() {
                Some(app) => self.predicate.is_significant(proof, node, &app),
                None => false,
            };
            if !significant {
                return Some(next);
            }
            if self.prefer.shift_remove(&next) || self.prefer.is_empty() {
                if stop.is_goal_allowed(proof, next, &SearchBudget::probe()) {
                    return Some(next);
                }
                if !denied.insert(next) {
                    return Some(next);
                }
            }
            self.inner.rotate();
        }
        trace!("balanced chooser found no permitted goal, taking {first:?}");
        first
    }

    fn update_goal_list(&mut self, proof: &Proof, node: NodeId, new_goals: &[GoalId]) {
        self.inner.update_goal_list(proof, node, new_goals);
        self.prefer.retain(|g| proof.is_open(*g));
    }

    fn remove_goal(&mut self, goal: GoalId) {
        self.inner.remove_goal(goal);
        self.prefer.shift_remove(&goal);
    }

    fn clear(&mut self) {
        self.inner.clear();
        self.prefer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;
    use crate::sequent::Sequent;
    use crate::stop::{AnyStep, AppliedRuleStopCondition, SignificantStepStopCondition};
    use crate::term::{Function, Term, TermBuilder};

    fn pred(name: &str) -> Term {
        TermBuilder.cons(Function::predicate(name, 0))
    }

    /// A proof with three open goals `(a & b) & c ==>` and so on, each with
    /// two steps left.
    fn three_goals() -> Proof {
        let tb = TermBuilder;
        let conj = |a: &str, b: &str, c: &str| tb.and(tb.and(pred(a), pred(b)), pred(c));
        let seq = Sequent::from_formulas(
            [tb.or(
                conj("a", "b", "c"),
                tb.or(conj("d", "e", "f"), conj("g", "h", "i")),
            )],
            [],
        );
        let mut proof = Proof::new(seq, rules::propositional());
        while proof.open_goals().len() < 3 {
            let goal = *proof.open_goals().last().unwrap();
            let app = proof.next_app(goal).unwrap();
            proof.apply(goal, app).unwrap();
        }
        proof
    }

    #[test]
    fn depth_first_skips_non_automatic_goals() {
        let mut proof = three_goals();
        let goals = proof.open_goals().to_vec();
        proof.set_automatic(goals[0], false).unwrap();
        let mut chooser = DepthFirstGoalChooser::new();
        chooser.init(&proof, &goals);
        let mut stop = AppliedRuleStopCondition;
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[1]));
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[2]));
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[1]));
        for g in &goals[1..] {
            proof.set_automatic(*g, false).unwrap();
        }
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), None);
    }

    #[test]
    fn depth_first_replaces_goal_in_place() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.or(pred("p"), pred("q")), pred("r")], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let root_goal = proof.open_goals()[0];
        let mut chooser = DepthFirstGoalChooser::new();
        chooser.init(&proof, proof.open_goals());
        let mut stop = AppliedRuleStopCondition;
        let goal = chooser.next_goal(&mut proof, &mut stop).unwrap();
        assert_eq!(goal, root_goal);
        let node = proof.goal(goal).node();
        let app = proof.next_app(goal).unwrap();
        let new_goals = proof.apply(goal, app).unwrap();
        chooser.update_goal_list(&proof, node, &new_goals);
        assert_eq!(chooser.selected(), &new_goals[..]);
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(new_goals[0]));
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(new_goals[1]));
        chooser.remove_goal(new_goals[0]);
        assert_eq!(chooser.selected(), &new_goals[1..]);
    }

    #[test]
    fn balanced_returns_each_goal_once_per_round() {
        let mut proof = three_goals();
        let goals = proof.open_goals().to_vec();
        let mut chooser = BalancedGoalChooser::new(AnyStep);
        chooser.init(&proof, &goals);
        let mut stop = AppliedRuleStopCondition;
        let mut seen = Vec::new();
        for _ in 0..goals.len() {
            let g = chooser.next_goal(&mut proof, &mut stop).unwrap();
            assert!(!seen.contains(&g), "{g} chosen twice in one round");
            seen.push(g);
        }
        seen.sort();
        let mut expected = goals.clone();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn balanced_defers_goal_over_its_step_limit() {
        let mut proof = three_goals();
        let goals = proof.open_goals().to_vec();
        let mut stop = SignificantStepStopCondition::new(1, AnyStep);
        let probe = SearchBudget::probe();
        assert!(stop.is_goal_allowed(&mut proof, goals[0], &probe));
        let app = proof.next_app(goals[0]).unwrap();
        proof.apply(goals[0], app).unwrap();
        assert!(!stop.is_goal_allowed(&mut proof, goals[0], &probe));

        let mut chooser = BalancedGoalChooser::new(AnyStep);
        chooser.init(&proof, &goals);
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[1]));
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[2]));
    }

    #[test]
    fn balanced_hands_out_a_goal_when_none_is_permitted() {
        let mut proof = three_goals();
        let goals = proof.open_goals().to_vec();
        let mut stop = SignificantStepStopCondition::new(0, AnyStep);
        let mut chooser = BalancedGoalChooser::new(AnyStep);
        chooser.init(&proof, &goals);
        for _ in 0..4 {
            let goal = chooser.next_goal(&mut proof, &mut stop);
            assert!(goal.is_some_and(|g| goals.contains(&g)), "{goal:?}");
        }
        assert!(!stop.was_significant_step_executed());
    }

    #[test]
    fn balanced_skips_non_automatic_goals() {
        let mut proof = three_goals();
        let goals = proof.open_goals().to_vec();
        proof.set_automatic(goals[0], false).unwrap();
        let mut stop = SignificantStepStopCondition::new(1, AnyStep);
        let mut chooser = BalancedGoalChooser::new(AnyStep);
        chooser.init(&proof, &goals);
        let chosen: Vec<GoalId> = (0..6)
            .map(|_| chooser.next_goal(&mut proof, &mut stop).unwrap())
            .collect();
        assert_eq!(&chosen[..2], &goals[1..]);
        assert!(!chosen.contains(&goals[0]));
    }

    #[test]
    fn balanced_drops_goal_turned_interactive_mid_round() {
        let mut proof = three_goals();
        let goals = proof.open_goals().to_vec();
        let mut stop = SignificantStepStopCondition::new(1, AnyStep);
        let mut chooser = BalancedGoalChooser::new(AnyStep);
        chooser.init(&proof, &goals);
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[0]));
        proof.set_automatic(goals[2], false).unwrap();
        assert_eq!(chooser.next_goal(&mut proof, &mut stop), Some(goals[1]));
        assert!(chooser.preferred().is_empty());
        assert!(chooser.next_goal(&mut proof, &mut stop).is_some());
    }
}
