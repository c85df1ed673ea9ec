//! A standard rule base: propositional sequent calculus, quantifier rules,
//! and symbolic execution of the small statement language.
//!
//! Rule sets used for scheduling: `closure`, `simplify`, `alpha` (non-splitting),
//! `beta` (splitting), `delta` (fresh constants), `gamma` (instantiation) and
//! `symbolic_execution`.
use crate::program::{boolean_sort, ProgramElement};
use crate::schema::{ProgramSort, SchemaVariable};
use crate::settings::SYMBOLIC_EXECUTION;
use crate::rule::{GoalTemplate, Taclet, TacletBuilder};
use crate::term::{
    Function, ModalityKind, QuantifiableVariable, Quantifier, Sort, Term, TermBuilder,
};

fn finish(builder: TacletBuilder) -> Taclet {
    builder
        .build()
        .unwrap_or_else(|e| panic!("malformed standard rule: {e}"))
}

struct Svs {
    a: SchemaVariable,
    b: SchemaVariable,
    phi: SchemaVariable,
}

impl Svs {
    fn new() -> Self {
        Self {
            a: SchemaVariable::formula("#a"),
            b: SchemaVariable::formula("#b"),
            phi: SchemaVariable::formula("#phi"),
        }
    }
}

/// Closure, the propositional connectives, two simplifications and cut.
pub fn propositional() -> Vec<Taclet> {
    let tb = TermBuilder;
    let Svs { a, b, phi } = Svs::new();
    let (a, b, phi) = (tb.sv(&a), tb.sv(&b), tb.sv(&phi));
    let t = SchemaVariable::term("#t", Sort::any());
    let cut_phi = SchemaVariable::formula("#cutFormula");
    let none = || std::iter::empty::<Term>();

    vec![
        finish(
            TacletBuilder::new("close")
                .assumes_antec(phi.clone())
                .find_succ(phi.clone())
                .rule_set("closure"),
        ),
        finish(TacletBuilder::new("closeTrue").find_succ(tb.tt()).rule_set("closure")),
        finish(TacletBuilder::new("closeFalse").find_antec(tb.ff()).rule_set("closure")),
        finish(
            TacletBuilder::new("andLeft")
                .find_antec(tb.and(a.clone(), b.clone()))
                .goal(GoalTemplate::new().replace_sequent([a.clone(), b.clone()], none()))
                .rule_set("alpha"),
        ),
        finish(
            TacletBuilder::new("andRight")
                .find_succ(tb.and(a.clone(), b.clone()))
                .goal(GoalTemplate::new().label("left").replace_sequent(none(), [a.clone()]))
                .goal(GoalTemplate::new().label("right").replace_sequent(none(), [b.clone()]))
                .rule_set("beta"),
        ),
        finish(
            TacletBuilder::new("orLeft")
                .find_antec(tb.or(a.clone(), b.clone()))
                .goal(GoalTemplate::new().label("left").replace_sequent([a.clone()], none()))
                .goal(GoalTemplate::new().label("right").replace_sequent([b.clone()], none()))
                .rule_set("beta"),
        ),
        finish(
            TacletBuilder::new("orRight")
                .find_succ(tb.or(a.clone(), b.clone()))
                .goal(GoalTemplate::new().replace_sequent(none(), [a.clone(), b.clone()]))
                .rule_set("alpha"),
        ),
        finish(
            TacletBuilder::new("impLeft")
                .find_antec(tb.imp(a.clone(), b.clone()))
                .goal(GoalTemplate::new().label("premise").replace_sequent(none(), [a.clone()]))
                .goal(GoalTemplate::new().label("conclusion").replace_sequent([b.clone()], none()))
                .rule_set("beta"),
        ),
        finish(
            TacletBuilder::new("impRight")
                .find_succ(tb.imp(a.clone(), b.clone()))
                .goal(GoalTemplate::new().replace_sequent([a.clone()], [b.clone()]))
                .rule_set("alpha"),
        ),
        finish(
            TacletBuilder::new("notLeft")
                .find_antec(tb.not(a.clone()))
                .goal(GoalTemplate::new().replace_sequent(none(), [a.clone()]))
                .rule_set("alpha"),
        ),
        finish(
            TacletBuilder::new("notRight")
                .find_succ(tb.not(a.clone()))
                .goal(GoalTemplate::new().replace_sequent([a.clone()], none()))
                .rule_set("alpha"),
        ),
        finish(
            TacletBuilder::new("equivLeft")
                .find_antec(tb.equiv(a.clone(), b.clone()))
                .goal(
                    GoalTemplate::new()
                        .label("both")
                        .replace_sequent([a.clone(), b.clone()], none()),
                )
                .goal(
                    GoalTemplate::new()
                        .label("neither")
                        .replace_sequent(none(), [a.clone(), b.clone()]),
                )
                .rule_set("beta"),
        ),
        finish(
            TacletBuilder::new("equivRight")
                .find_succ(tb.equiv(a.clone(), b.clone()))
                .goal(
                    GoalTemplate::new()
                        .label("forward")
                        .replace_sequent([a.clone()], [b.clone()]),
                )
                .goal(
                    GoalTemplate::new()
                        .label("backward")
                        .replace_sequent([b.clone()], [a.clone()]),
                )
                .rule_set("beta"),
        ),
        finish(
            TacletBuilder::new("and_true")
                .find_rewrite(tb.and(phi.clone(), tb.tt()))
                .goal(GoalTemplate::new().replace_term(phi))
                .rule_set("simplify"),
        ),
        finish(
            TacletBuilder::new("equal_refl")
                .find_rewrite(tb.equals(tb.sv(&t), tb.sv(&t)))
                .goal(GoalTemplate::new().replace_term(tb.tt()))
                .rule_set("simplify"),
        ),
        finish(
            TacletBuilder::new("cut")
                .goal(GoalTemplate::new().label("TRUE").add_antec(tb.sv(&cut_phi)))
                .goal(GoalTemplate::new().label("FALSE").add_succ(tb.sv(&cut_phi)))
                .instantiate_externally(&cut_phi)
                .interactive_only(),
        ),
    ]
}

/// The propositional rules plus quantifier rules. Existential witnesses
/// and universal counterexamples become fresh constants; universal
/// assumptions are instantiated with ground terms of the sequent.
pub fn first_order() -> Vec<Taclet> {
    let tb = TermBuilder;
    let x = SchemaVariable::variable("#x", Sort::any());
    let phi = SchemaVariable::formula("#phi");
    let sk = SchemaVariable::skolem("#sk", Sort::any());
    let t = SchemaVariable::term("#t", Sort::any());
    let bind = || [QuantifiableVariable::Schema(x.clone())];
    let all = tb.quantify(Quantifier::All, bind(), tb.sv(&phi));
    let ex = tb.quantify(Quantifier::Ex, bind(), tb.sv(&phi));
    let subst = |with: &SchemaVariable| {
        tb.subst(QuantifiableVariable::Schema(x.clone()), tb.sv(with), tb.sv(&phi))
    };
    let none = || std::iter::empty::<Term>();

    let mut rules = propositional();
    rules.extend([
        finish(
            TacletBuilder::new("allRight")
                .find_succ(all.clone())
                .goal(GoalTemplate::new().replace_sequent(none(), [subst(&sk)]))
                .rule_set("delta"),
        ),
        finish(
            TacletBuilder::new("exLeft")
                .find_antec(ex.clone())
                .goal(GoalTemplate::new().replace_sequent([subst(&sk)], none()))
                .rule_set("delta"),
        ),
        finish(
            TacletBuilder::new("allLeft")
                .find_antec(all)
                .goal(GoalTemplate::new().add_antec(subst(&t)))
                .instantiate_externally(&t)
                .rule_set("gamma"),
        ),
        finish(
            TacletBuilder::new("exRight")
                .find_succ(ex)
                .goal(GoalTemplate::new().add_succ(subst(&t)))
                .instantiate_externally(&t)
                .rule_set("gamma"),
        ),
    ]);
    rules
}

/// The constant `TRUE` of sort `boolean`, the value of a true condition.
pub fn true_constant() -> Term {
    TermBuilder.cons(Function::constant("TRUE", boolean_sort()))
}

fn modality(kind: ModalityKind, prog: ProgramElement, post: Term) -> Term {
    let tb = TermBuilder;
    match kind {
        ModalityKind::Diamond => tb.diamond(prog, post),
        ModalityKind::Box => tb.box_(prog, post),
    }
}

fn program_rules(kind: ModalityKind) -> Vec<Taclet> {
    let tb = TermBuilder;
    let suffix = match kind {
        ModalityKind::Diamond => "Diamond",
        ModalityKind::Box => "Box",
    };
    let name = |base: &str| format!("{base}{suffix}");
    let post_sv = SchemaVariable::formula("#post");
    let post = tb.sv(&post_sv);
    let cond = SchemaVariable::program("#cond", ProgramSort::Expression);
    let then_sv = SchemaVariable::program("#then", ProgramSort::Statement);
    let else_sv = SchemaVariable::program("#else", ProgramSort::Statement);
    let body = SchemaVariable::program("#body", ProgramSort::Statement);
    let stmts = SchemaVariable::program_list("#stmts", ProgramSort::Statement);
    let p = |sv: &SchemaVariable| ProgramElement::schema(sv);
    let m = |prog: ProgramElement| modality(kind, prog, post.clone());

    let in_context = |active: Vec<ProgramElement>| ProgramElement::context(active);
    let cond_holds = tb.equals(tb.sv(&cond), true_constant());

    vec![
        finish(
            TacletBuilder::new(&name("emptyModality"))
                .display_name("emptyModality")
                .find_rewrite(m(ProgramElement::block([])))
                .goal(GoalTemplate::new().replace_term(post.clone()))
                .rule_set(SYMBOLIC_EXECUTION),
        ),
        finish(
            TacletBuilder::new(&name("skip"))
                .display_name("skip")
                .find_rewrite(m(in_context(vec![ProgramElement::skip()])))
                .goal(GoalTemplate::new().replace_term(m(in_context(vec![]))))
                .rule_set(SYMBOLIC_EXECUTION),
        ),
        finish(
            TacletBuilder::new(&name("blockFlatten"))
                .display_name("blockFlatten")
                .find_rewrite(m(in_context(vec![ProgramElement::block([p(&stmts)])])))
                .goal(GoalTemplate::new().replace_term(m(in_context(vec![p(&stmts)]))))
                .rule_set(SYMBOLIC_EXECUTION),
        ),
        finish(
            TacletBuilder::new(&name("ifSplit"))
                .display_name("ifSplit")
                .find_succ(m(in_context(vec![ProgramElement::if_then_else(
                    p(&cond),
                    p(&then_sv),
                    p(&else_sv),
                )])))
                .goal(
                    GoalTemplate::new()
                        .label("then")
                        .replace_sequent([cond_holds.clone()], [m(in_context(vec![p(&then_sv)]))]),
                )
                .goal(
                    GoalTemplate::new()
                        .label("else")
                        .replace_sequent(
                            std::iter::empty(),
                            [m(in_context(vec![p(&else_sv)])), cond_holds],
                        ),
                )
                .rule_set(SYMBOLIC_EXECUTION),
        ),
        finish(
            TacletBuilder::new(&name("loopUnwind"))
                .display_name("loopUnwind")
                .find_rewrite(m(in_context(vec![ProgramElement::while_loop(p(&cond), p(&body))])))
                .goal(GoalTemplate::new().replace_term(m(in_context(vec![
                    ProgramElement::if_then_else(
                        p(&cond),
                        ProgramElement::block([
                            p(&body),
                            ProgramElement::while_loop(p(&cond), p(&body)),
                        ]),
                        ProgramElement::block([]),
                    ),
                ]))))
                .rule_set(SYMBOLIC_EXECUTION),
        ),
    ]
}

/// The first-order rules plus symbolic execution rules for both modalities.
pub fn symbolic_execution() -> Vec<Taclet> {
    let mut rules = first_order();
    rules.extend(program_rules(ModalityKind::Diamond));
    rules.extend(program_rules(ModalityKind::Box));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::Proof;
    use crate::sequent::Sequent;
    use crate::term::ProgramVariable;
    use crate::util::HashSet;
    use crate::Symbol;

    #[test]
    fn rule_names_are_unique() {
        let rules = symbolic_execution();
        let names: HashSet<Symbol> = rules.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), rules.len());
    }

    #[test]
    fn cut_is_interactive_only() {
        let rules = propositional();
        let cut = rules.iter().find(|t| t.name() == Symbol::from("cut")).unwrap();
        assert!(!cut.is_automatic());
        assert!(cut.attributes().interactive);
    }

    #[test]
    fn if_split_on_condition() {
        let tb = TermBuilder;
        let b = ProgramVariable::new("b", boolean_sort());
        let prog = ProgramElement::block([ProgramElement::if_then_else(
            ProgramElement::var(b),
            ProgramElement::block([ProgramElement::skip()]),
            ProgramElement::skip(),
        )]);
        let seq = Sequent::from_formulas([], [tb.diamond(prog, tb.tt())]);
        let mut proof = Proof::new(seq, symbolic_execution());
        let goal = proof.open_goals()[0];
        let app = proof.next_app(goal).unwrap();
        assert_eq!(app.rule_name(), Symbol::from("ifSplitDiamond"));
        let goals = proof.apply(goal, app).unwrap();
        assert_eq!(
            proof.sequent(goals[0]).to_string(),
            "b = TRUE ==> \\<{ { skip; } }\\>true"
        );
        assert_eq!(
            proof.sequent(goals[1]).to_string(),
            "==> \\<{ skip; }\\>true, b = TRUE"
        );
    }
}
