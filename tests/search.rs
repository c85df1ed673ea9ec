use std::sync::Arc;

use taclet::chooser::{BalancedGoalChooser, DepthFirstGoalChooser, GoalChooser};
use taclet::feature::{Feature, FeatureContext, FeatureRef, RuleAppCost, ScaleFeature};
use taclet::program::{boolean_sort, ProgramElement};
use taclet::settings::SYMBOLIC_EXECUTION;
use taclet::stop::{
    AnyStep, AppliedRuleStopCondition, InRuleSet, SearchBudget, SignificantStepStopCondition,
    SingleRuleApplicationInfo, StopCondition,
};
use taclet::term::ProgramVariable;
use taclet::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pred(name: &str) -> Term {
    TermBuilder.cons(Function::predicate(name, 0))
}

fn standard_rule(taclets: &[Taclet], name: &str) -> Taclet {
    taclets
        .iter()
        .find(|t| t.name() == Symbol::from(name))
        .cloned()
        .unwrap()
}

#[test]
fn and_left_splits_into_two_goals() {
    init_logger();
    let tb = TermBuilder;
    let a = SchemaVariable::formula("#a");
    let b = SchemaVariable::formula("#b");
    let split = TacletBuilder::new("andSplit")
        .find_antec(tb.and(tb.sv(&a), tb.sv(&b)))
        .goal(GoalTemplate::new().replace_sequent([tb.sv(&a)], []))
        .goal(GoalTemplate::new().replace_sequent([tb.sv(&b)], []))
        .rule_set("beta")
        .build()
        .unwrap();
    let seq = Sequent::from_formulas([tb.and(pred("p"), pred("q"))], []);
    let mut proof = Proof::new(seq, [split]);
    let goal = proof.open_goals()[0];
    let app = proof.next_app(goal).unwrap();
    let goals = proof.apply(goal, app).unwrap();
    let sequents: Vec<String> = goals.iter().map(|g| proof.sequent(*g).to_string()).collect();
    assert_eq!(sequents, ["p ==>", "q ==>"]);
    assert_eq!(proof.open_goals(), &goals[..]);
    assert_eq!(proof.node(proof.root()).children().len(), 2);
}

#[test]
fn zero_steps_is_exhaustion_not_error() {
    init_logger();
    let seq = Sequent::from_formulas([], [TermBuilder.imp(pred("p"), pred("p"))]);
    let mut proof = Proof::new(seq, rules::propositional());
    let goals = proof.open_goals().to_vec();
    let info = ApplyStrategy::default().start(&mut proof, &goals, 0, None, false);
    assert_eq!(info.applied, 0);
    assert!(!info.is_error());
    assert!(matches!(info.stop_reason(), Some(StopReason::BudgetExhausted(_))));
    assert_eq!(info.message, "Maximal number of rule applications reached.");
    assert!(!proof.is_closed());
}

#[test]
fn proves_propositional_tautologies() {
    init_logger();
    let tb = TermBuilder;
    let (p, q, r) = (pred("p"), pred("q"), pred("r"));
    let tautologies = [
        tb.imp(
            tb.and(tb.imp(p.clone(), q.clone()), tb.imp(q.clone(), r.clone())),
            tb.imp(p.clone(), r.clone()),
        ),
        tb.or(p.clone(), tb.not(p.clone())),
        tb.equiv(tb.and(p.clone(), q.clone()), tb.and(q.clone(), p.clone())),
        tb.imp(tb.not(tb.or(p.clone(), q.clone())), tb.not(p.clone())),
    ];
    for t in tautologies {
        let mut proof = Proof::new(Sequent::from_formulas([], [t.clone()]), rules::propositional());
        let info = ApplyStrategy::default().run(&mut proof, &StrategySettings::default());
        assert!(proof.is_closed(), "{t} not proved: {info}");
        assert_eq!(info.stop_reason(), Some(&StopReason::GoalsExhausted));
    }
}

#[test]
fn non_theorem_leaves_goal_open() {
    init_logger();
    let tb = TermBuilder;
    let seq = Sequent::from_formulas([], [tb.imp(tb.or(pred("p"), pred("q")), pred("p"))]);
    let mut proof = Proof::new(seq, rules::propositional());
    let info = ApplyStrategy::default().run(&mut proof, &StrategySettings::default());
    assert_eq!(info.stop_reason(), Some(&StopReason::GoalsExhausted));
    assert_eq!(proof.open_goals().len(), 1);
    assert_eq!(proof.sequent(proof.open_goals()[0]).to_string(), "q ==> p");
}

#[test]
fn proves_first_order_goal() {
    init_logger();
    let tb = TermBuilder;
    let s = Sort::new("s");
    let (x, y) = (LogicVariable::new("x", s), LogicVariable::new("y", s));
    let p = Function::new("p", Sort::formula(), 1);
    let q = Function::new("q", Sort::formula(), 1);
    let at = |f: &Function, v: LogicVariable| tb.func(f.clone(), [tb.var(v)]);
    // (\exists x; p(x)) & (\forall y; (p(y) -> q(y))) -> \exists x; q(x)
    let goal = tb.imp(
        tb.and(tb.ex(x, at(&p, x)), tb.all(y, tb.imp(at(&p, y), at(&q, y)))),
        tb.ex(x, at(&q, x)),
    );
    let mut proof = Proof::new(Sequent::from_formulas([], [goal]), rules::first_order());
    let settings = StrategySettings {
        max_steps: 200,
        ..StrategySettings::default()
    };
    let info = ApplyStrategy::default().run(&mut proof, &settings);
    assert!(proof.is_closed(), "{info}");
    assert_eq!(info.per_rule.get(&Symbol::from("exLeft")), Some(&1));
}

#[test]
fn symbolic_execution_closes_both_branches() {
    init_logger();
    let tb = TermBuilder;
    let b = ProgramVariable::new("b", boolean_sort());
    let prog = ProgramElement::block([ProgramElement::if_then_else(
        ProgramElement::var(b),
        ProgramElement::block([ProgramElement::skip()]),
        ProgramElement::block([ProgramElement::skip(), ProgramElement::skip()]),
    )]);
    let seq = Sequent::from_formulas([], [tb.box_(prog, tb.tt())]);
    let mut proof = Proof::new(seq, rules::symbolic_execution());
    let settings = StrategySettings {
        chooser: ChooserKind::Balanced,
        ..StrategySettings::default()
    };
    let info = ApplyStrategy::from_settings(&settings).run(&mut proof, &settings);
    assert!(proof.is_closed(), "{info}");
    assert_eq!(info.closed_goals, 2);
    assert_eq!(info.per_rule.get(&Symbol::from("ifSplitBox")), Some(&1));
    assert_eq!(info.per_rule.get(&Symbol::from("closeTrue")), Some(&2));
}

#[test]
fn step_limit_of_one_denies_the_second_step() {
    init_logger();
    let tb = TermBuilder;
    let prog = ProgramElement::block([ProgramElement::skip(), ProgramElement::skip()]);
    let seq = Sequent::from_formulas([], [tb.diamond(prog, tb.tt())]);
    let mut proof = Proof::new(seq, rules::symbolic_execution());
    let stop = SignificantStepStopCondition::new(1, InRuleSet::new(SYMBOLIC_EXECUTION))
        .and(AppliedRuleStopCondition);
    let mut driver = ApplyStrategy::new(DepthFirstGoalChooser::new(), stop);
    let goals = proof.open_goals().to_vec();
    let info = driver.start(&mut proof, &goals, 100, None, false);
    assert_eq!(info.applied, 1);
    assert_eq!(info.message, "Maximal limit of one symbolic execution tree node reached.");
    assert!(matches!(info.stop_reason(), Some(StopReason::BudgetExhausted(_))));
    assert!(driver.stop_condition().first().was_significant_step_executed());
    assert_eq!(proof.sequent(goals[0]).to_string(), "==> \\<{ skip; }\\>true");
}

#[test]
fn balanced_search_stops_once_every_branch_used_its_step() {
    init_logger();
    let tb = TermBuilder;
    let b = ProgramVariable::new("b", boolean_sort());
    let prog = ProgramElement::block([ProgramElement::if_then_else(
        ProgramElement::var(b),
        ProgramElement::block([ProgramElement::skip()]),
        ProgramElement::block([ProgramElement::skip()]),
    )]);
    let seq = Sequent::from_formulas([], [tb.box_(prog, tb.tt())]);
    let mut proof = Proof::new(seq, rules::symbolic_execution());
    let stop = SignificantStepStopCondition::new(1, InRuleSet::new(SYMBOLIC_EXECUTION))
        .and(AppliedRuleStopCondition);
    let chooser = BalancedGoalChooser::new(InRuleSet::new(SYMBOLIC_EXECUTION));
    let mut driver = ApplyStrategy::new(chooser, stop);
    let goals = proof.open_goals().to_vec();
    let info = driver.start(&mut proof, &goals, 100, None, false);
    assert_eq!(info.applied, 1, "{info}");
    assert_eq!(info.per_rule.get(&Symbol::from("ifSplitBox")), Some(&1));
    assert_eq!(proof.open_goals().len(), 2);
    assert_eq!(info.message, "Maximal limit of one symbolic execution tree node reached.");
    assert!(matches!(info.stop_reason(), Some(StopReason::BudgetExhausted(_))));
}

/// Take one automatic step on `goal` the way the driver does.
fn step(proof: &mut Proof, stop: &mut dyn StopCondition, goal: GoalId) -> Vec<GoalId> {
    let budget = SearchBudget::probe();
    assert!(stop.is_goal_allowed(proof, goal, &budget));
    let node = proof.goal(goal).node();
    let app = proof.next_app(goal).unwrap();
    let new_goals = proof.apply(goal, app.clone()).unwrap();
    let info = SingleRuleApplicationInfo {
        goal,
        node,
        app,
        new_goals: new_goals.clone(),
    };
    assert!(!stop.should_stop(proof, &budget, Some(&info)));
    new_goals
}

#[test]
fn step_counts_propagate_to_all_children() {
    init_logger();
    let tb = TermBuilder;
    let (a, b, c) = (
        SchemaVariable::formula("#a"),
        SchemaVariable::formula("#b"),
        SchemaVariable::formula("#c"),
    );
    let split3 = TacletBuilder::new("orLeft3")
        .find_antec(tb.or(tb.sv(&a), tb.or(tb.sv(&b), tb.sv(&c))))
        .goal(GoalTemplate::new().replace_sequent([tb.sv(&a)], []))
        .goal(GoalTemplate::new().replace_sequent([tb.sv(&b)], []))
        .goal(GoalTemplate::new().replace_sequent([tb.sv(&c)], []))
        .rule_set("beta")
        .build()
        .unwrap();
    let taclets = [standard_rule(&rules::propositional(), "andLeft"), split3];
    let seq = Sequent::from_formulas(
        [tb.and(pred("a"), pred("b")), tb.or(pred("p"), tb.or(pred("q"), pred("r")))],
        [],
    );
    let mut proof = Proof::new(seq, taclets);
    let mut stop = SignificantStepStopCondition::new(10, AnyStep);
    stop.maximal_work(&SearchBudget::probe());

    let goal = proof.open_goals()[0];
    assert_eq!(step(&mut proof, &mut stop, goal), [goal]);
    assert_eq!(stop.executed(goal), 1);

    let children = step(&mut proof, &mut stop, goal);
    assert_eq!(children.len(), 3);
    for g in &children {
        assert_eq!(stop.executed(*g), 2, "goal {g}");
    }
}

#[test]
fn balanced_chooser_visits_every_goal_once_per_round() {
    init_logger();
    let tb = TermBuilder;
    let conj = |a: &str, b: &str| tb.and(pred(a), pred(b));
    let seq = Sequent::from_formulas(
        [tb.or(conj("a", "b"), tb.or(conj("c", "d"), tb.or(conj("e", "f"), conj("g", "h"))))],
        [],
    );
    let mut proof = Proof::new(seq, rules::propositional());
    while proof.open_goals().len() < 4 {
        let goal = *proof.open_goals().last().unwrap();
        let app = proof.next_app(goal).unwrap();
        proof.apply(goal, app).unwrap();
    }
    let goals = proof.open_goals().to_vec();
    let mut chooser = BalancedGoalChooser::new(AnyStep);
    chooser.init(&proof, &goals);
    let mut stop = AppliedRuleStopCondition;
    let mut seen = Vec::new();
    for _ in 0..goals.len() {
        let g = chooser.next_goal(&mut proof, &mut stop).unwrap();
        assert!(!seen.contains(&g), "{g} chosen twice in one round");
        seen.push(g);
        // a non-forking step: andLeft keeps the goal
        let node = proof.goal(g).node();
        let app = proof.next_app(g).unwrap();
        assert_eq!(app.rule_name(), Symbol::from("andLeft"));
        let new_goals = proof.apply(g, app).unwrap();
        assert_eq!(new_goals, [g]);
        chooser.update_goal_list(&proof, node, &new_goals);
    }
    seen.sort();
    let mut expected = goals.clone();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn cancellation_before_start_is_reset() {
    init_logger();
    let tb = TermBuilder;
    let swap = tb.imp(tb.and(pred("p"), pred("q")), tb.and(pred("q"), pred("p")));
    let seq = Sequent::from_formulas([], [swap]);
    let mut proof = Proof::new(seq, rules::propositional());
    let mut driver = ApplyStrategy::default();
    let token = driver.cancellation_token();
    token.cancel();
    let goals = proof.open_goals().to_vec();
    let info = driver.start(&mut proof, &goals, 100, None, false);
    // a fresh run clears a cancellation requested before it started
    assert!(!token.is_cancelled());
    assert_eq!(info.stop_reason(), Some(&StopReason::GoalsExhausted));
    assert!(proof.is_closed());
}

struct Fixed(i64);

impl Feature for Fixed {
    fn compute_cost(
        &self,
        _: &TacletApp,
        _: Option<&PosInOccurrence>,
        _: &FeatureContext<'_>,
    ) -> RuleAppCost {
        RuleAppCost::Number(self.0)
    }
}

#[test]
fn positive_affine_scaling_preserves_order() {
    let seq = Sequent::from_formulas([TermBuilder.and(pred("p"), pred("q"))], []);
    let mut proof = Proof::new(seq, rules::propositional());
    let goal = proof.open_goals()[0];
    let app = proof.peek_next(goal).unwrap().clone();
    let ctx = FeatureContext {
        proof: &proof,
        node: proof.goal(goal).node(),
    };
    for coeff in [0.25, 1.0, 3.5, 100.0] {
        for offset in [-50, 0, 7] {
            let scaled = |v: i64| {
                let f: FeatureRef = Arc::new(Fixed(v));
                ScaleFeature::affine(f, coeff, offset).compute_cost(&app, app.pos(), &ctx)
            };
            for a in -30..30 {
                for b in a..a + 5 {
                    assert!(scaled(a) <= scaled(b), "{coeff} * x + {offset} at {a} and {b}");
                }
            }
        }
    }
}

#[test]
fn denial_is_stable_when_asked_again() {
    init_logger();
    let tb = TermBuilder;
    let prog = ProgramElement::block([
        ProgramElement::skip(),
        ProgramElement::skip(),
        ProgramElement::skip(),
    ]);
    let seq = Sequent::from_formulas([], [tb.diamond(prog, tb.ff())]);
    let mut proof = Proof::new(seq, rules::symbolic_execution());
    let mut stop = SignificantStepStopCondition::new(2, InRuleSet::new(SYMBOLIC_EXECUTION));
    stop.maximal_work(&SearchBudget::probe());
    let goal = proof.open_goals()[0];
    step(&mut proof, &mut stop, goal);
    step(&mut proof, &mut stop, goal);
    assert_eq!(stop.executed(goal), 2);
    assert_eq!(proof.sequent(goal).to_string(), "==> \\<{ skip; }\\>false");
    let budget = SearchBudget::probe();
    assert!(!stop.is_goal_allowed(&mut proof, goal, &budget));
    assert!(!stop.is_goal_allowed(&mut proof, goal, &budget));
    assert_eq!(stop.executed(goal), 2);
    assert!(stop.was_significant_step_executed());
}
