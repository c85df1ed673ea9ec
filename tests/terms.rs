use taclet::executor::instantiate_term;
use taclet::subst::ClashFreeSubst;
use taclet::term::{QuantifiableVariable, Quantifier};
use taclet::*;

fn s() -> Sort {
    Sort::new("s")
}

fn lv(name: &str) -> LogicVariable {
    LogicVariable::new(name, s())
}

/// Terms over `x`, `y` and `z` with binders in various places.
fn sample_terms() -> Vec<Term> {
    let tb = TermBuilder;
    let (x, y, z) = (lv("x"), lv("y"), lv("z"));
    let p = Function::predicate("p", 1);
    let q = Function::predicate("q", 2);
    let f = Function::new("f", s(), 1);
    let px = |v: LogicVariable| tb.func(p.clone(), [tb.var(v)]);
    let qxy = |a: LogicVariable, b: LogicVariable| tb.func(q.clone(), [tb.var(a), tb.var(b)]);
    vec![
        px(x),
        tb.all(y, qxy(x, y)),
        tb.ex(z, tb.all(y, tb.and(qxy(x, y), qxy(z, x)))),
        tb.and(px(x), tb.all(x, px(x))),
        tb.all(y, tb.func(p.clone(), [tb.func(f.clone(), [tb.var(x)])])),
        tb.quantify(
            Quantifier::All,
            [QuantifiableVariable::from(y), QuantifiableVariable::from(z)],
            tb.imp(qxy(y, z), qxy(x, y)),
        ),
        tb.all(y, tb.ex(y, qxy(x, y))),
    ]
}

fn sample_replacements() -> Vec<Term> {
    let tb = TermBuilder;
    let f = Function::new("f", s(), 1);
    let g = Function::new("g", s(), 2);
    vec![
        tb.var(lv("y")),
        tb.var(lv("z")),
        tb.func(f, [tb.var(lv("y"))]),
        tb.func(g, [tb.var(lv("y")), tb.var(lv("z"))]),
        tb.cons(Function::constant("c", s())),
    ]
}

#[test]
fn substitution_is_capture_free() {
    let x = lv("x");
    for t in sample_terms() {
        for s in sample_replacements() {
            let out = ClashFreeSubst::new(x, s.clone()).apply(&t).unwrap();
            assert!(
                !out.free_vars().contains(&x) || s.free_vars().contains(&x),
                "{t} [x := {s}] = {out}"
            );
            // every free variable of the result was free in the term or in the replacement
            for v in out.free_vars().iter() {
                assert!(
                    (t.free_vars().contains(v) && *v != x) || s.free_vars().contains(v),
                    "{v} captured or invented in {out}"
                );
            }
            // every free variable of the replacement stays free where x was free
            if t.free_vars().contains(&x) {
                for v in s.free_vars().iter() {
                    assert!(out.free_vars().contains(v), "{v} captured in {out}");
                }
            }
        }
    }
}

#[test]
fn substitution_without_occurrence_is_identity() {
    let w = lv("w");
    for t in sample_terms() {
        for s in sample_replacements() {
            let out = ClashFreeSubst::new(w, s).apply(&t).unwrap();
            assert!(Term::ptr_eq(&t, &out), "{t} was rebuilt");
        }
    }
}

#[test]
fn renamed_binders_are_fresh() {
    let tb = TermBuilder;
    let (x, y) = (lv("x"), lv("y"));
    let q = Function::predicate("q", 2);
    // \forall y; \forall y1; q(x, y)  [x := y]
    let t = tb.all(y, tb.all(lv("y1"), tb.func(q, [tb.var(x), tb.var(y)])));
    let out = ClashFreeSubst::new(x, tb.var(y)).apply(&t).unwrap();
    assert_eq!(out.to_string(), "\\forall y2; \\forall y1; q(y, y2)");
}

#[test]
fn matching_reproduces_the_candidate() {
    let tb = TermBuilder;
    let sample = sample_terms();
    let taclets = rules::first_order();
    let mut matched = 0;
    for taclet in &taclets {
        let Some(pattern) = taclet.find().pattern() else {
            continue;
        };
        for candidate in &sample {
            let closed = tb.all(lv("x"), candidate.clone());
            for t in [candidate, &closed] {
                let Some(mc) = taclet.match_find(t) else {
                    continue;
                };
                matched += 1;
                let rebuilt = instantiate_term(pattern, &mc.insts, taclet.name()).unwrap();
                assert!(rebuilt.equals_mod_renaming(t), "{} on {t} gave {rebuilt}", taclet.name());
            }
        }
    }
    assert!(matched > 0);
}

#[test]
fn quantifier_pattern_binds_the_variable() {
    let tb = TermBuilder;
    let x = SchemaVariable::variable("#x", Sort::any());
    let phi = SchemaVariable::formula("#phi");
    let binder = QuantifiableVariable::Schema(x.clone());
    let pattern = tb.quantify(Quantifier::All, [binder], tb.sv(&phi));
    let taclet = TacletBuilder::new("allPattern")
        .find_antec(pattern)
        .goal(GoalTemplate::new())
        .build()
        .unwrap();
    let candidate = &sample_terms()[1];
    let mc = taclet.match_find(candidate).unwrap();
    assert_eq!(mc.insts.get_variable(&x), Some(lv("y")));
    assert!(taclet.match_find(&sample_terms()[0]).is_none());
}
