//! Capture-avoiding substitution of a term for a logic variable.
use smallvec::SmallVec;
use thiserror::Error;

use crate::term::{
    BoundVars, FreeVars, LogicVariable, Operator, QuantifiableVariable, Term, TermBuilder,
};
use crate::util::HashSet;
use crate::Symbol;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubstError {
    #[error("could not find a fresh name for bound variable {0}")]
    FreshNameExhausted(Symbol),
}

/// Substitutes `replacement` for the free occurrences of `var`, renaming
/// bound variables that would capture a free variable of `replacement`.
#[derive(Clone, Debug)]
pub struct ClashFreeSubst {
    var: LogicVariable,
    replacement: Term,
    svars: FreeVars,
}

impl ClashFreeSubst {
    pub fn new(var: LogicVariable, replacement: Term) -> Self {
        let svars = replacement.free_vars().clone();
        Self {
            var,
            replacement,
            svars,
        }
    }

    pub fn var(&self) -> LogicVariable {
        self.var
    }

    pub fn replacement(&self) -> &Term {
        &self.replacement
    }

    /// Apply the substitution. If `var` is not free in `t` the result is `t`
    /// itself, not a copy.
    pub fn apply(&self, t: &Term) -> Result<Term, SubstError> {
        if !t.free_vars().contains(&self.var) {
            return Ok(t.clone());
        }
        if let Operator::Var(_) = t.op() {
            // the only free variable of a variable term is itself
            return Ok(self.replacement.clone());
        }
        let mut subs = SmallVec::with_capacity(t.arity());
        let mut bound = SmallVec::with_capacity(t.arity());
        for (i, sub) in t.subs().iter().enumerate() {
            let bv = t.vars_bound_here(i);
            if bv.is_empty() {
                subs.push(self.apply(sub)?);
                bound.push(BoundVars::new());
            } else {
                let (new_bv, new_sub) = self.apply_under_binder(bv, sub)?;
                subs.push(new_sub);
                bound.push(new_bv);
            }
        }
        Ok(Term::build(
            t.op().clone(),
            subs,
            bound,
            t.labels().iter().cloned().collect(),
        ))
    }

    fn apply_under_binder(
        &self,
        bv: &[QuantifiableVariable],
        sub: &Term,
    ) -> Result<(BoundVars, Term), SubstError> {
        let rebinds_var = bv.iter().any(|qv| qv.as_logic() == Some(&self.var));
        if rebinds_var || !sub.free_vars().contains(&self.var) {
            return Ok((bv.iter().cloned().collect(), sub.clone()));
        }
        let mut new_bv: BoundVars = bv.iter().cloned().collect();
        let mut body = sub.clone();
        for i in 0..bv.len() {
            let QuantifiableVariable::Logic(qv) = &bv[i] else {
                continue;
            };
            if !self.svars.contains(qv) {
                continue;
            }
            let fresh = self.fresh_variable_like(qv, &body, &new_bv)?;
            new_bv[i] = QuantifiableVariable::Logic(fresh);
            // a later entry binding the same variable shadows this one
            let shadowed = bv[i + 1..].iter().any(|later| later.as_logic() == Some(qv));
            if !shadowed {
                body = ClashFreeSubst::new(*qv, TermBuilder.var(fresh)).apply(&body)?;
            }
        }
        Ok((new_bv, self.apply(&body)?))
    }

    /// `qv`'s name with the smallest positive suffix that names no variable
    /// of `body`, of the replacement, or of the binder list.
    fn fresh_variable_like(
        &self,
        qv: &LogicVariable,
        body: &Term,
        binders: &[QuantifiableVariable],
    ) -> Result<LogicVariable, SubstError> {
        let mut used: HashSet<LogicVariable> = HashSet::default();
        body.collect_vars(&mut used);
        self.replacement.collect_vars(&mut used);
        used.extend(self.svars.iter().copied());
        used.extend(binders.iter().filter_map(|b| b.as_logic().copied()));
        let used_names: HashSet<&str> = used.iter().map(|v| v.name().as_str()).collect();
        let stem = qv.name();
        for i in 1..=u32::MAX {
            let candidate = format!("{stem}{i}");
            if !used_names.contains(candidate.as_str()) {
                return Ok(LogicVariable::new(candidate.as_str(), qv.sort()));
            }
        }
        Err(SubstError::FreshNameExhausted(stem))
    }
}

/// Execute every `{\subst x; t}` operator in `t`, innermost first.
pub fn execute_substitutions(t: &Term) -> Result<Term, SubstError> {
    let mut changed = false;
    let mut subs = SmallVec::with_capacity(t.arity());
    for sub in t.subs() {
        let new = execute_substitutions(sub)?;
        changed |= !Term::ptr_eq(&new, sub);
        subs.push(new);
    }
    let t = if changed { t.with_subs(subs) } else { t.clone() };
    if let Operator::Subst = t.op() {
        if let [QuantifiableVariable::Logic(x)] = t.vars_bound_here(1) {
            return ClashFreeSubst::new(*x, t.sub(0).clone()).apply(t.sub(1));
        }
    }
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Function, Sort};

    fn s() -> Sort {
        Sort::new("s")
    }

    #[test]
    fn noop_returns_same_term() {
        let tb = TermBuilder;
        let x = LogicVariable::new("x", s());
        let y = LogicVariable::new("y", s());
        let p = Function::predicate("p", 1);
        let t = tb.func(p, [tb.var(y)]);
        let out = ClashFreeSubst::new(x, tb.var(y)).apply(&t).unwrap();
        assert!(Term::ptr_eq(&t, &out));
    }

    #[test]
    fn renames_clashing_binder() {
        let tb = TermBuilder;
        let x = LogicVariable::new("x", s());
        let y = LogicVariable::new("y", s());
        let q = Function::predicate("q", 2);
        // \forall y; q(x, y)  [x := y]
        let t = tb.all(y, tb.func(q, [tb.var(x), tb.var(y)]));
        let out = ClashFreeSubst::new(x, tb.var(y)).apply(&t).unwrap();
        assert_eq!(out.to_string(), "\\forall y1; q(y, y1)");
        assert!(out.free_vars().contains(&y));
    }

    #[test]
    fn fresh_suffix_skips_used_names() {
        let tb = TermBuilder;
        let x = LogicVariable::new("x", s());
        let y = LogicVariable::new("y", s());
        let y1 = LogicVariable::new("y1", s());
        let r = Function::predicate("r", 3);
        // \forall y; r(x, y, y1)  [x := y]
        let t = tb.all(y, tb.func(r, [tb.var(x), tb.var(y), tb.var(y1)]));
        let out = ClashFreeSubst::new(x, tb.var(y)).apply(&t).unwrap();
        assert_eq!(out.to_string(), "\\forall y2; r(y, y2, y1)");
    }

    #[test]
    fn shadowing_binder_blocks_substitution() {
        let tb = TermBuilder;
        let x = LogicVariable::new("x", s());
        let p = Function::predicate("p", 1);
        let c = tb.cons(Function::constant("c", s()));
        let inner = tb.all(x, tb.func(p, [tb.var(x)]));
        let t = tb.and(tb.func(p, [tb.var(x)]), inner.clone());
        let out = ClashFreeSubst::new(x, c).apply(&t).unwrap();
        assert_eq!(out.to_string(), "(p(c) & \\forall x; p(x))");
        assert!(Term::ptr_eq(out.sub(1), &inner));
    }

    #[test]
    fn executes_subst_operator() {
        let tb = TermBuilder;
        let x = LogicVariable::new("x", s());
        let p = Function::predicate("p", 1);
        let c = tb.cons(Function::constant("c", s()));
        let t = tb.subst(x.into(), c, tb.func(p, [tb.var(x)]));
        assert_eq!(execute_substitutions(&t).unwrap().to_string(), "p(c)");
    }
}
