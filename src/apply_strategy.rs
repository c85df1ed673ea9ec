//! The automatic proof search loop.
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::chooser::{DepthFirstGoalChooser, GoalChooser};
use crate::proof::{GoalId, Proof};
use crate::settings::StrategySettings;
use crate::stop::{AppliedRuleStopCondition, SearchBudget, SingleRuleApplicationInfo, StopCondition};
use crate::util::IndexMap;
use crate::{Error, Symbol};

/// A shared flag asking a running search to stop after the current step.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No goal with an applicable rule is left.
    GoalsExhausted,
    /// The stop condition refused to go on.
    BudgetExhausted(String),
    /// A goal had no applicable rule and the search was asked to stop there.
    NonCloseableGoal(GoalId),
    Cancelled,
}

#[derive(Debug)]
pub enum Outcome {
    Finished(StopReason),
    /// A rule application failed. The proof is left as it was before it.
    Error(Error),
}

/// The result of [`ApplyStrategy::start`].
#[derive(Debug)]
pub struct ApplyStrategyInfo {
    pub message: String,
    pub outcome: Outcome,
    /// Number of rule applications performed.
    pub applied: usize,
    pub closed_goals: usize,
    pub time: Duration,
    /// The goal the search stopped at, if any.
    pub goal: Option<GoalId>,
    pub per_rule: IndexMap<Symbol, usize>,
}

impl ApplyStrategyInfo {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            Outcome::Error(e) => Some(e),
            Outcome::Finished(_) => None,
        }
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        match &self.outcome {
            Outcome::Finished(reason) => Some(reason),
            Outcome::Error(_) => None,
        }
    }
}

impl Display for ApplyStrategyInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.message)?;
        if let Outcome::Error(e) = &self.outcome {
            writeln!(f, "Error: {e}")?;
        }
        let mut rules: Vec<_> = self.per_rule.iter().collect();
        rules.sort_by_key(|(name, count)| (std::cmp::Reverse(**count), name.as_str()));
        for (name, count) in rules {
            writeln!(f, "Rule {name}: applied {count} times")?;
        }
        write!(
            f,
            "Applied {} rules, closed {} goals in {:.3}s",
            self.applied,
            self.closed_goals,
            self.time.as_secs_f64()
        )
    }
}

enum Step {
    Applied(SingleRuleApplicationInfo),
    Stopped {
        message: String,
        reason: StopReason,
        goal: Option<GoalId>,
    },
    Failed(Error, GoalId),
}

/// Applies rules automatically until the goals are closed or a stop
/// condition ends the search.
///
/// The goal chooser and stop condition are cleared whenever a run ends, so
/// the same driver can be started again.
pub struct ApplyStrategy<C = DepthFirstGoalChooser, S = AppliedRuleStopCondition> {
    chooser: C,
    stop: S,
    cancel: CancellationToken,
}

impl Default for ApplyStrategy {
    fn default() -> Self {
        Self::new(DepthFirstGoalChooser::new(), AppliedRuleStopCondition)
    }
}

impl ApplyStrategy<Box<dyn GoalChooser>, Box<dyn StopCondition>> {
    pub fn from_settings(settings: &StrategySettings) -> Self {
        Self::new(settings.goal_chooser(), settings.stop_condition())
    }
}

impl<C: GoalChooser, S: StopCondition> ApplyStrategy<C, S> {
    pub fn new(chooser: C, stop: S) -> Self {
        Self {
            chooser,
            stop,
            cancel: CancellationToken::new(),
        }
    }

    /// A handle that cancels the current run from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn chooser(&self) -> &C {
        &self.chooser
    }

    pub fn stop_condition(&self) -> &S {
        &self.stop
    }

    pub fn stop_condition_mut(&mut self) -> &mut S {
        &mut self.stop
    }

    /// Run on all open goals with the limits from `settings`.
    pub fn run(&mut self, proof: &mut Proof, settings: &StrategySettings) -> ApplyStrategyInfo {
        let goals = proof.open_goals().to_vec();
        self.start(
            proof,
            &goals,
            settings.max_steps,
            settings.timeout,
            settings.stop_at_first_non_closeable,
        )
    }

    /// Search for at most `max_steps` rule applications on `goals` and the
    /// goals they turn into.
    pub fn start(
        &mut self,
        proof: &mut Proof,
        goals: &[GoalId],
        max_steps: usize,
        timeout: Option<Duration>,
        stop_at_first_non_closeable: bool,
    ) -> ApplyStrategyInfo {
        self.cancel.reset();
        let mut budget = SearchBudget::new(Some(max_steps), timeout);
        self.chooser.init(proof, goals);
        let work = self.stop.maximal_work(&budget);
        info!(
            "Starting proof search on {} goals, at most {max_steps} steps (estimated work {work})",
            goals.len()
        );

        let mut closed_goals = 0;
        let mut per_rule: IndexMap<Symbol, usize> = IndexMap::default();
        let (message, outcome, goal) = loop {
            if self.cancel.is_cancelled() {
                break ("Interrupted.".to_owned(), Outcome::Finished(StopReason::Cancelled), None);
            }
            match self.apply_automatic_rule(proof, &budget, stop_at_first_non_closeable) {
                Step::Applied(step) => {
                    budget.applied += 1;
                    if step.new_goals.is_empty() {
                        closed_goals += 1;
                    }
                    *per_rule.entry(step.app.rule_name()).or_default() += 1;
                    if self.stop.should_stop(proof, &budget, Some(&step)) {
                        let message = self.stop.stop_message(proof, &budget, Some(&step));
                        warn!("Proof search stopped: {message}");
                        let reason = StopReason::BudgetExhausted(message.clone());
                        break (message, Outcome::Finished(reason), Some(step.goal));
                    }
                }
                Step::Stopped {
                    message,
                    reason,
                    goal,
                } => {
                    if let StopReason::BudgetExhausted(_) = reason {
                        warn!("Proof search stopped: {message}");
                    }
                    break (message, Outcome::Finished(reason), goal);
                }
                Step::Failed(err, goal) => {
                    warn!("Rule application on goal {goal} failed: {err}");
                    break ("Error.".to_owned(), Outcome::Error(err), Some(goal));
                }
            }
        };

        self.chooser.clear();
        self.stop.clear();
        let result = ApplyStrategyInfo {
            message,
            outcome,
            applied: budget.applied,
            closed_goals,
            time: budget.elapsed(),
            goal,
            per_rule,
        };
        info!(
            "Proof search finished after {} rule applications: {}",
            result.applied, result.message
        );
        result
    }

    fn apply_automatic_rule(
        &mut self,
        proof: &mut Proof,
        budget: &SearchBudget,
        stop_at_first_non_closeable: bool,
    ) -> Step {
        loop {
            let Some(goal) = self.chooser.next_goal(proof, &mut self.stop) else {
                return Step::Stopped {
                    message: "No more rules automatically applicable to any goal.".to_owned(),
                    reason: StopReason::GoalsExhausted,
                    goal: None,
                };
            };
            let Some(node) = proof.get_goal(goal).map(|g| g.node()) else {
                self.chooser.remove_goal(goal);
                continue;
            };
            if !self.stop.is_goal_allowed(proof, goal, budget) {
                let message = self.stop.goal_not_allowed_message(proof, goal, budget);
                return Step::Stopped {
                    reason: StopReason::BudgetExhausted(message.clone()),
                    message,
                    goal: Some(goal),
                };
            }
            let Some(app) = proof.next_app(goal) else {
                if stop_at_first_non_closeable {
                    return Step::Stopped {
                        message: "Could not close goal.".to_owned(),
                        reason: StopReason::NonCloseableGoal(goal),
                        goal: Some(goal),
                    };
                }
                debug!("goal {goal} has no applicable rule");
                self.chooser.remove_goal(goal);
                continue;
            };
            match proof.apply(goal, app.clone()) {
                Ok(new_goals) => {
                    self.chooser.update_goal_list(proof, node, &new_goals);
                    return Step::Applied(SingleRuleApplicationInfo {
                        goal,
                        node,
                        app,
                        new_goals,
                    });
                }
                Err(err) => return Step::Failed(err, goal),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;
    use crate::sequent::Sequent;
    use crate::term::{Function, Term, TermBuilder};

    fn pred(name: &str) -> Term {
        TermBuilder.cons(Function::predicate(name, 0))
    }

    #[test]
    fn zero_steps_is_a_budget_stop() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.and(pred("p"), pred("q"))], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let goals = proof.open_goals().to_vec();
        let mut driver = ApplyStrategy::default();
        let result = driver.start(&mut proof, &goals, 0, None, false);
        assert_eq!(result.applied, 0);
        assert!(!result.is_error());
        assert!(matches!(result.stop_reason(), Some(StopReason::BudgetExhausted(_))));
    }

    #[test]
    fn cancellation_is_observed_at_next_iteration() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.and(pred("p"), pred("q"))], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let goals = proof.open_goals().to_vec();
        let mut driver = ApplyStrategy::new(Cancelling::default(), AppliedRuleStopCondition);
        let token = driver.cancellation_token();
        driver.chooser.token = Some(token);
        let result = driver.start(&mut proof, &goals, 100, None, false);
        assert_eq!(result.stop_reason(), Some(&StopReason::Cancelled));
        // the step already chosen completes
        assert_eq!(result.applied, 1);
    }

    /// Depth-first, but cancels the run the first time it is asked for a goal.
    #[derive(Default)]
    struct Cancelling {
        inner: DepthFirstGoalChooser,
        token: Option<CancellationToken>,
    }

    impl GoalChooser for Cancelling {
        fn init(&mut self, proof: &Proof, goals: &[GoalId]) {
            self.inner.init(proof, goals)
        }

        fn next_goal(&mut self, proof: &mut Proof, stop: &mut dyn StopCondition) -> Option<GoalId> {
            if let Some(token) = self.token.take() {
                token.cancel();
            }
            self.inner.next_goal(proof, stop)
        }

        fn update_goal_list(
            &mut self,
            proof: &Proof,
            node: crate::proof::NodeId,
            new_goals: &[GoalId],
        ) {
            self.inner.update_goal_list(proof, node, new_goals)
        }

        fn remove_goal(&mut self, goal: GoalId) {
            self.inner.remove_goal(goal)
        }

        fn clear(&mut self) {
            self.inner.clear()
        }
    }

    #[test]
    fn closes_propositional_tautology() {
        let tb = TermBuilder;
        let (p, q) = (pred("p"), pred("q"));
        let seq = Sequent::from_formulas(
            [],
            [tb.imp(tb.and(p.clone(), q.clone()), tb.and(q, p))],
        );
        let mut proof = Proof::new(seq, rules::propositional());
        let goals = proof.open_goals().to_vec();
        let mut driver = ApplyStrategy::default();
        let result = driver.start(&mut proof, &goals, 100, None, false);
        assert!(proof.is_closed());
        assert_eq!(result.stop_reason(), Some(&StopReason::GoalsExhausted));
        assert_eq!(result.closed_goals, 2);
        assert_eq!(result.per_rule[&Symbol::from("close")], 2);
        assert!(driver.chooser().selected().is_empty());
    }

    #[test]
    fn stops_at_first_non_closeable_goal() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.or(pred("p"), pred("q"))], [pred("p")]);
        let mut proof = Proof::new(seq, rules::propositional());
        let goals = proof.open_goals().to_vec();
        let mut driver = ApplyStrategy::default();
        let result = driver.start(&mut proof, &goals, 100, None, true);
        let Some(StopReason::NonCloseableGoal(goal)) = result.stop_reason() else {
            panic!("unexpected outcome {result}");
        };
        assert_eq!(proof.sequent(*goal).to_string(), "q ==> p");
        assert_eq!(result.goal, Some(*goal));
    }
}
