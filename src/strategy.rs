//! Strategies rank rule applications and complete the ones that still have
//! open schema variables.
use std::sync::Arc;

use log::trace;

use crate::feature::{
    BranchingFeature, Feature, FeatureContext, FeatureRef, FindDepthFeature,
    NonDuplicateAppFeature, RuleAppCost, RuleSetDispatchFeature, SumFeature,
};
use crate::rule_app::TacletApp;
use crate::schema::SvKind;
use crate::sequent::{PosInOccurrence, Sequent};
use crate::settings::StrategySettings;
use crate::term::Term;
use crate::util::IndexSet;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost;

    /// Checked again right before an application taken from a queue is
    /// executed.
    fn is_approved(&self, app: &TacletApp, ctx: &FeatureContext<'_>) -> bool {
        !self.compute_cost(app, app.pos(), ctx).is_top()
    }

    /// Turn an application found by matching into complete applications.
    fn instantiate_app(
        &self,
        app: &TacletApp,
        seq: &Sequent,
        _ctx: &FeatureContext<'_>,
    ) -> Vec<TacletApp> {
        heuristic_instantiations(app, seq)
    }
}

/// Complete the assumes part of `app`, then try every ground term of `seq`
/// with a fitting sort for each open term schema variable. Applications
/// with open variables of any other kind are dropped.
pub fn heuristic_instantiations(app: &TacletApp, seq: &Sequent) -> Vec<TacletApp> {
    let Some(app) = app.find_assumes(seq) else {
        return Vec::new();
    };
    let open = app.uninstantiated_vars();
    if open.is_empty() {
        return if app.is_complete() { vec![app] } else { Vec::new() };
    }
    if open.iter().any(|sv| !matches!(sv.kind(), SvKind::Term(_))) {
        return Vec::new();
    }

    let mut ground: IndexSet<Term> = IndexSet::default();
    for (_, sf) in seq.formulas() {
        sf.formula().visit_preorder(&mut |t| {
            if !t.sort().is_formula() && t.is_ground() {
                ground.insert(t.clone());
            }
        });
    }

    let mut partial = vec![app];
    for sv in &open {
        let sort = sv.sort();
        let mut next = Vec::new();
        for candidate in ground.iter().filter(|t| t.sort().extends(&sort)) {
            next.extend(partial.iter().filter_map(|a| a.add_instantiation(sv, candidate.clone())));
        }
        partial = next;
    }
    partial.retain(TacletApp::is_complete);
    trace!("{} heuristic instantiations", partial.len());
    partial
}

/// Rule-set weights, a branching penalty, the depth of the focus, and no
/// repetition of an application on the same branch. Taclets in no weighted
/// rule set and taclets meant for interactive use only are never chosen.
pub struct DefaultStrategy {
    feature: FeatureRef,
}

impl DefaultStrategy {
    pub fn new(settings: &StrategySettings) -> Self {
        let mut dispatch = RuleSetDispatchFeature::new(RuleAppCost::Top);
        for (rule_set, weight) in &settings.rule_set_weights {
            dispatch.add_cost(*rule_set, RuleAppCost::Number(*weight));
        }
        let feature = SumFeature::create([
            Arc::new(dispatch) as FeatureRef,
            Arc::new(NonDuplicateAppFeature),
            Arc::new(BranchingFeature {
                cost_per_goal: settings.branching_cost,
            }),
            Arc::new(FindDepthFeature),
        ]);
        Self { feature }
    }

    /// A strategy computing costs with `feature` alone.
    pub fn from_feature(feature: FeatureRef) -> Self {
        Self { feature }
    }
}

impl Default for DefaultStrategy {
    fn default() -> Self {
        Self::new(&StrategySettings::default())
    }
}

impl Strategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        if !app.taclet().is_automatic() {
            return RuleAppCost::Top;
        }
        self.feature.compute_cost(app, pos, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::Proof;
    use crate::rules;
    use crate::term::{Function, LogicVariable, Sort, TermBuilder};
    use crate::Symbol;

    #[test]
    fn gamma_rule_instantiated_with_ground_terms() {
        let tb = TermBuilder;
        let s = Sort::new("s");
        let x = LogicVariable::new("x", s);
        let p = Function::new("p", Sort::formula(), 1);
        let c = tb.cons(Function::constant("c", s));
        let d = tb.cons(Function::constant("d", s));
        let seq = Sequent::from_formulas(
            [tb.all(x, tb.func(p, [tb.var(x)]))],
            [tb.func(p, [c]), tb.func(p, [d])],
        );
        let mut proof = Proof::new(seq, rules::first_order());
        let goal = proof.open_goals()[0];
        let mut names = Vec::new();
        while let Some(app) = proof.next_app(goal) {
            names.push(app.to_string());
        }
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("allLeft")));
    }

    #[test]
    fn unknown_rule_sets_are_rejected() {
        let tb = TermBuilder;
        let p = tb.cons(Function::predicate("p", 0));
        let seq = Sequent::from_formulas([tb.and(p.clone(), p)], []);
        let mut settings = StrategySettings::default();
        settings.rule_set_weights.shift_remove(&Symbol::from("alpha"));
        let mut proof = Proof::with_strategy(
            seq,
            rules::propositional(),
            Box::new(DefaultStrategy::new(&settings)),
        );
        let goal = proof.open_goals()[0];
        assert!(proof.next_app(goal).is_none());
    }

    #[test]
    fn closing_is_cheapest() {
        let tb = TermBuilder;
        let p = tb.cons(Function::predicate("p", 0));
        let q = tb.cons(Function::predicate("q", 0));
        let seq = Sequent::from_formulas([p.clone(), tb.and(q.clone(), q)], [p]);
        let mut proof = Proof::new(seq, rules::propositional());
        let goal = proof.open_goals()[0];
        let app = proof.next_app(goal).unwrap();
        assert_eq!(app.rule_name(), Symbol::from("close"));
    }
}
