//! Stop conditions bound an automatic proof search.
//!
//! The driver asks [`StopCondition::is_goal_allowed`] before each rule
//! application and [`StopCondition::should_stop`] after it. Goal choosers may
//! also probe whether a goal is allowed, with a [`SearchBudget::probe`]
//! budget, so answers must not change when the same question is asked twice.
use std::time::Duration;

use crate::id::IdMap;
use crate::proof::{GoalId, NodeId, Proof};
use crate::rule_app::TacletApp;
use crate::Symbol;

/// The global limits of a run and how much of them is used up.
#[derive(Clone, Copy, Debug)]
pub struct SearchBudget {
    pub max_applications: Option<usize>,
    pub timeout: Option<Duration>,
    pub start: instant::Instant,
    pub applied: usize,
}

impl SearchBudget {
    pub fn new(max_applications: Option<usize>, timeout: Option<Duration>) -> Self {
        Self {
            max_applications,
            timeout,
            start: instant::Instant::now(),
            applied: 0,
        }
    }

    /// An unlimited budget, used when asking about a goal outside of a step.
    pub fn probe() -> Self {
        Self::new(None, None)
    }

    pub fn steps_exhausted(&self) -> bool {
        self.max_applications.is_some_and(|max| self.applied >= max)
    }

    pub fn timed_out(&self) -> bool {
        self.timeout.is_some_and(|t| self.start.elapsed() >= t)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// What happened in one step of the driver.
#[derive(Clone, Debug)]
pub struct SingleRuleApplicationInfo {
    pub goal: GoalId,
    /// The node the rule was applied to.
    pub node: NodeId,
    pub app: TacletApp,
    /// The goals replacing `goal`, the first of which is `goal` itself
    /// unless the goal was closed.
    pub new_goals: Vec<GoalId>,
}

pub trait StopCondition {
    /// Called once at the start of a run. Returns an estimate of the number
    /// of applications the run will perform, or 0 if unknown.
    fn maximal_work(&mut self, budget: &SearchBudget) -> usize;

    /// Whether the next application on `goal` may be performed.
    fn is_goal_allowed(&mut self, proof: &mut Proof, goal: GoalId, budget: &SearchBudget) -> bool;

    fn goal_not_allowed_message(
        &self,
        proof: &Proof,
        goal: GoalId,
        budget: &SearchBudget,
    ) -> String;

    /// Whether the run should end after the step described by `info`.
    fn should_stop(
        &mut self,
        proof: &Proof,
        budget: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> bool;

    fn stop_message(
        &self,
        proof: &Proof,
        budget: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> String;

    /// Forget the state of the current run.
    fn clear(&mut self) {}

    /// A condition that allows a goal only if both allow it, and stops
    /// if either wants to stop.
    fn and<B: StopCondition>(self, other: B) -> CompoundStopCondition<Self, B>
    where
        Self: Sized,
    {
        CompoundStopCondition::new(self, other)
    }
}

impl<T: StopCondition + ?Sized> StopCondition for Box<T> {
    fn maximal_work(&mut self, budget: &SearchBudget) -> usize {
        (**self).maximal_work(budget)
    }

    fn is_goal_allowed(&mut self, proof: &mut Proof, goal: GoalId, budget: &SearchBudget) -> bool {
        (**self).is_goal_allowed(proof, goal, budget)
    }

    fn goal_not_allowed_message(
        &self,
        proof: &Proof,
        goal: GoalId,
        budget: &SearchBudget,
    ) -> String {
        (**self).goal_not_allowed_message(proof, goal, budget)
    }

    fn should_stop(
        &mut self,
        proof: &Proof,
        budget: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> bool {
        (**self).should_stop(proof, budget, info)
    }

    fn stop_message(
        &self,
        proof: &Proof,
        budget: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> String {
        (**self).stop_message(proof, budget, info)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

/// Stops after the maximal number of rule applications or when the time is up.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppliedRuleStopCondition;

impl AppliedRuleStopCondition {
    fn message(budget: &SearchBudget) -> String {
        if budget.steps_exhausted() {
            "Maximal number of rule applications reached.".to_owned()
        } else {
            "Timeout reached.".to_owned()
        }
    }
}

impl StopCondition for AppliedRuleStopCondition {
    fn maximal_work(&mut self, budget: &SearchBudget) -> usize {
        budget.max_applications.unwrap_or(0)
    }

    fn is_goal_allowed(&mut self, _: &mut Proof, _: GoalId, budget: &SearchBudget) -> bool {
        !budget.steps_exhausted() && !budget.timed_out()
    }

    fn goal_not_allowed_message(&self, _: &Proof, _: GoalId, budget: &SearchBudget) -> String {
        Self::message(budget)
    }

    fn should_stop(
        &mut self,
        _: &Proof,
        budget: &SearchBudget,
        _: Option<&SingleRuleApplicationInfo>,
    ) -> bool {
        budget.steps_exhausted() || budget.timed_out()
    }

    fn stop_message(
        &self,
        _: &Proof,
        budget: &SearchBudget,
        _: Option<&SingleRuleApplicationInfo>,
    ) -> String {
        Self::message(budget)
    }
}

/// Decides which rule applications count as significant steps.
pub trait StepPredicate {
    fn is_significant(&self, proof: &Proof, node: NodeId, app: &TacletApp) -> bool;
}

/// Every application is significant.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyStep;

impl StepPredicate for AnyStep {
    fn is_significant(&self, _: &Proof, _: NodeId, _: &TacletApp) -> bool {
        true
    }
}

/// Applications of taclets in one rule set are significant.
#[derive(Clone, Copy, Debug)]
pub struct InRuleSet(pub Symbol);

impl InRuleSet {
    pub fn new(name: &str) -> Self {
        InRuleSet(Symbol::from(name))
    }
}

impl StepPredicate for InRuleSet {
    fn is_significant(&self, _: &Proof, _: NodeId, app: &TacletApp) -> bool {
        app.taclet().in_rule_set(self.0)
    }
}

/// Allows at most `limit` significant steps per goal.
///
/// A goal that forks passes its count on to all of its successors. The
/// decision for a node is remembered, so asking again about a goal that has
/// not moved neither counts a second step nor changes the answer.
pub struct SignificantStepStopCondition<P = InRuleSet> {
    limit: usize,
    predicate: P,
    executed: IdMap<GoalId, usize>,
    allowed_at: IdMap<NodeId, bool>,
    executed_total: usize,
}

impl<P: StepPredicate> SignificantStepStopCondition<P> {
    pub fn new(limit: usize, predicate: P) -> Self {
        Self {
            limit,
            predicate,
            executed: IdMap::new(),
            allowed_at: IdMap::new(),
            executed_total: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Significant steps counted for `goal` in this run.
    pub fn executed(&self, goal: GoalId) -> usize {
        self.executed.get(goal).copied().unwrap_or(0)
    }

    /// Whether any significant step was allowed since the run started.
    pub fn was_significant_step_executed(&self) -> bool {
        self.executed_total > 0
    }
}

impl<P: StepPredicate> StopCondition for SignificantStepStopCondition<P> {
    fn maximal_work(&mut self, _: &SearchBudget) -> usize {
        self.executed.clear();
        self.allowed_at.clear();
        self.executed_total = 0;
        0
    }

    fn is_goal_allowed(&mut self, proof: &mut Proof, goal: GoalId, _: &SearchBudget) -> bool {
        let Some(node) = proof.get_goal(goal).map(|g| g.node()) else {
            return true;
        };
        let Some(app) = proof.peek_next(goal).cloned() else {
            return true;
        };
        if !self.predicate.is_significant(proof, node, &app) {
            return true;
        }
        if let Some(&allowed) = self.allowed_at.get(node) {
            return allowed;
        }
        let executed = self.executed(goal);
        let allowed = executed < self.limit;
        if allowed {
            self.executed.insert(goal, executed + 1);
            self.executed_total += 1;
        }
        self.allowed_at.insert(node, allowed);
        allowed
    }

    fn goal_not_allowed_message(&self, _: &Proof, _: GoalId, _: &SearchBudget) -> String {
        if self.limit > 1 {
            format!("Maximal limit of {} symbolic execution tree nodes reached.", self.limit)
        } else {
            "Maximal limit of one symbolic execution tree node reached.".to_owned()
        }
    }

    fn should_stop(
        &mut self,
        proof: &Proof,
        _: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> bool {
        let Some(info) = info else {
            return false;
        };
        if proof.node(info.node).children().len() >= 2 {
            if let Some(&count) = self.executed.get(info.goal) {
                for &g in info.new_goals.iter().filter(|g| **g != info.goal) {
                    self.executed.insert(g, count);
                }
            }
        }
        false
    }

    fn stop_message(
        &self,
        _: &Proof,
        _: &SearchBudget,
        _: Option<&SingleRuleApplicationInfo>,
    ) -> String {
        String::new()
    }

    fn clear(&mut self) {
        self.executed.clear();
        self.allowed_at.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    First,
    Second,
}

/// Both conditions must allow a goal; either may stop the run.
pub struct CompoundStopCondition<A, B> {
    first: A,
    second: B,
    denied_by: Option<Part>,
    stopped_by: Option<Part>,
}

impl<A: StopCondition, B: StopCondition> CompoundStopCondition<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            denied_by: None,
            stopped_by: None,
        }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A: StopCondition, B: StopCondition> StopCondition for CompoundStopCondition<A, B> {
    fn maximal_work(&mut self, budget: &SearchBudget) -> usize {
        let a = self.first.maximal_work(budget);
        let b = self.second.maximal_work(budget);
        a.max(b)
    }

    fn is_goal_allowed(&mut self, proof: &mut Proof, goal: GoalId, budget: &SearchBudget) -> bool {
        self.denied_by = if !self.first.is_goal_allowed(proof, goal, budget) {
            Some(Part::First)
        } else if !self.second.is_goal_allowed(proof, goal, budget) {
            Some(Part::Second)
        } else {
            None
        };
        self.denied_by.is_none()
    }

    fn goal_not_allowed_message(
        &self,
        proof: &Proof,
        goal: GoalId,
        budget: &SearchBudget,
    ) -> String {
        match self.denied_by {
            Some(Part::Second) => self.second.goal_not_allowed_message(proof, goal, budget),
            _ => self.first.goal_not_allowed_message(proof, goal, budget),
        }
    }

    fn should_stop(
        &mut self,
        proof: &Proof,
        budget: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> bool {
        let a = self.first.should_stop(proof, budget, info);
        let b = self.second.should_stop(proof, budget, info);
        self.stopped_by = match (a, b) {
            (true, _) => Some(Part::First),
            (false, true) => Some(Part::Second),
            _ => None,
        };
        a || b
    }

    fn stop_message(
        &self,
        proof: &Proof,
        budget: &SearchBudget,
        info: Option<&SingleRuleApplicationInfo>,
    ) -> String {
        match self.stopped_by {
            Some(Part::Second) => self.second.stop_message(proof, budget, info),
            _ => self.first.stop_message(proof, budget, info),
        }
    }

    fn clear(&mut self) {
        self.first.clear();
        self.second.clear();
        self.denied_by = None;
        self.stopped_by = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;
    use crate::sequent::Sequent;
    use crate::term::{Function, TermBuilder};

    fn pred(name: &str) -> crate::term::Term {
        TermBuilder.cons(Function::predicate(name, 0))
    }

    #[test]
    fn applied_rule_budget() {
        let mut proof = Proof::new(Sequent::from_formulas([pred("p")], []), rules::propositional());
        let goal = proof.open_goals()[0];
        let mut stop = AppliedRuleStopCondition;
        let mut budget = SearchBudget::new(Some(2), None);
        assert_eq!(stop.maximal_work(&budget), 2);
        assert!(stop.is_goal_allowed(&mut proof, goal, &budget));
        budget.applied = 2;
        assert!(!stop.is_goal_allowed(&mut proof, goal, &budget));
        assert!(stop.should_stop(&proof, &budget, None));
        assert_eq!(
            stop.goal_not_allowed_message(&proof, goal, &budget),
            "Maximal number of rule applications reached."
        );
        assert!(stop.is_goal_allowed(&mut proof, goal, &SearchBudget::probe()));
    }

    #[test]
    fn timeout_is_observed() {
        let mut proof = Proof::new(Sequent::from_formulas([pred("p")], []), rules::propositional());
        let goal = proof.open_goals()[0];
        let budget = SearchBudget::new(None, Some(Duration::ZERO));
        assert!(!AppliedRuleStopCondition.is_goal_allowed(&mut proof, goal, &budget));
    }

    #[test]
    fn significant_steps_are_memoised_per_node() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.and(pred("p"), tb.and(pred("q"), pred("r")))], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let goal = proof.open_goals()[0];
        let mut stop = SignificantStepStopCondition::new(1, AnyStep);
        stop.maximal_work(&SearchBudget::probe());
        assert!(!stop.was_significant_step_executed());
        assert!(stop.is_goal_allowed(&mut proof, goal, &SearchBudget::probe()));
        assert!(stop.is_goal_allowed(&mut proof, goal, &SearchBudget::probe()));
        assert_eq!(stop.executed(goal), 1);
        assert!(stop.was_significant_step_executed());

        let app = proof.next_app(goal).unwrap();
        proof.apply(goal, app).unwrap();
        assert!(!stop.is_goal_allowed(&mut proof, goal, &SearchBudget::probe()));
        assert_eq!(stop.executed(goal), 1);
        assert_eq!(
            stop.goal_not_allowed_message(&proof, goal, &SearchBudget::probe()),
            "Maximal limit of one symbolic execution tree node reached."
        );
    }

    #[test]
    fn compound_reports_the_denying_part() {
        let mut proof = Proof::new(Sequent::from_formulas([pred("p")], []), rules::propositional());
        let goal = proof.open_goals()[0];
        let mut stop = SignificantStepStopCondition::new(5, AnyStep).and(AppliedRuleStopCondition);
        let budget = SearchBudget::new(Some(0), None);
        assert!(!stop.is_goal_allowed(&mut proof, goal, &budget));
        assert_eq!(
            stop.goal_not_allowed_message(&proof, goal, &budget),
            "Maximal number of rule applications reached."
        );
        stop.clear();
        assert!(stop.is_goal_allowed(&mut proof, goal, &SearchBudget::probe()));
    }
}
