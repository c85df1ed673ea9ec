//! Structural matching of schematic patterns against concrete terms and programs.
//!
//! Every function here returns `None` on failure. Matching is attempted for
//! every rule at every position of every sequent formula, so failure is the
//! common case and carries no information beyond "no".
use log::trace;

use crate::instantiations::{Instantiation, MatchConditions};
use crate::program::{ContextInstantiation, ProgramElement, ProgramKind};
use crate::schema::{SchemaVariable, SvKind};
use crate::term::{Labels, Operator, QuantifiableVariable, Term, TermLabel};

/// Match `pattern` against `candidate`, extending `mc`.
pub fn match_term(
    pattern: &Term,
    candidate: &Term,
    mc: MatchConditions,
) -> Option<MatchConditions> {
    let mc = match pattern.op() {
        Operator::Schema(sv) => match_schema_variable(sv, candidate, mc)?,
        Operator::Var(x) => match candidate.op() {
            Operator::Var(y) if mc.renamings.corresponds(x, y) => mc,
            _ => return None,
        },
        op => {
            let mc = match (op, candidate.op()) {
                (Operator::Modality(k1, p1), Operator::Modality(k2, p2)) if k1 == k2 => {
                    match_program(p1, p2, mc)?
                }
                (Operator::Modality(..), _) => return None,
                (a, b) if a == b => mc,
                _ => return None,
            };
            match_subterms(pattern, candidate, mc)?
        }
    };
    match_labels(pattern, candidate, mc)
}

fn match_subterms(
    pattern: &Term,
    candidate: &Term,
    mut mc: MatchConditions,
) -> Option<MatchConditions> {
    if pattern.arity() != candidate.arity() {
        return None;
    }
    for i in 0..pattern.arity() {
        let scope = mc.renamings.len();
        mc = match_bound_vars(
            pattern.vars_bound_here(i),
            candidate.vars_bound_here(i),
            mc,
        )?;
        mc = match_term(pattern.sub(i), candidate.sub(i), mc)?;
        mc.renamings.truncate(scope);
    }
    Some(mc)
}

/// Variable schema variables in binder position are instantiated with the
/// candidate's variable; concrete pattern binders open a renaming scope.
fn match_bound_vars(
    pattern: &[QuantifiableVariable],
    candidate: &[QuantifiableVariable],
    mut mc: MatchConditions,
) -> Option<MatchConditions> {
    if pattern.len() != candidate.len() {
        return None;
    }
    for (p, c) in pattern.iter().zip(candidate) {
        let QuantifiableVariable::Logic(cv) = c else {
            return None;
        };
        match p {
            QuantifiableVariable::Schema(sv) => {
                let SvKind::Variable(sort) = sv.kind() else {
                    return None;
                };
                if !cv.sort().extends(sort) {
                    return None;
                }
                let var = Term::new(Operator::Var(*cv), []);
                mc.insts = mc.insts.add(sv, Instantiation::Term(var))?;
            }
            QuantifiableVariable::Logic(pv) => {
                if pv.sort() != cv.sort() {
                    return None;
                }
                mc.renamings.push(*pv, *cv);
            }
        }
    }
    Some(mc)
}

fn match_schema_variable(
    sv: &SchemaVariable,
    candidate: &Term,
    mut mc: MatchConditions,
) -> Option<MatchConditions> {
    let sort_ok = match sv.kind() {
        SvKind::Formula => candidate.sort().is_formula(),
        SvKind::Term(sort) => !candidate.sort().is_formula() && candidate.sort().extends(sort),
        SvKind::Variable(sort) => {
            matches!(candidate.op(), Operator::Var(lv) if lv.sort().extends(sort))
        }
        // fresh constants are created by the executor, never matched
        SvKind::Skolem(_) | SvKind::Program(_) | SvKind::Label => false,
    };
    if !sort_ok || (sv.is_rigid() && !candidate.is_rigid()) {
        return None;
    }
    if !mc.renamings.is_empty()
        && candidate
            .free_vars()
            .iter()
            .any(|v| mc.renamings.binds_candidate(v))
    {
        trace!("{sv} rejects {candidate}: it would capture a pattern-bound variable");
        return None;
    }
    mc.insts = mc.insts.add(sv, Instantiation::Term(candidate.clone()))?;
    Some(mc)
}

/// A label schema variable in the pattern binds the candidate's whole label
/// set; concrete pattern labels are not required to be present.
fn match_labels(
    pattern: &Term,
    candidate: &Term,
    mut mc: MatchConditions,
) -> Option<MatchConditions> {
    for label in pattern.labels() {
        if let TermLabel::Schema(sv) = label {
            let labels: Labels = candidate.labels().iter().cloned().collect();
            mc.insts = mc.insts.add(sv, Instantiation::Labels(labels))?;
        }
    }
    Some(mc)
}

/// Match a program pattern against a program element.
pub fn match_program(
    pattern: &ProgramElement,
    candidate: &ProgramElement,
    mut mc: MatchConditions,
) -> Option<MatchConditions> {
    if let Some(active) = pattern.context_pattern() {
        return match_context(active, candidate, mc);
    }
    match pattern.kind() {
        ProgramKind::Schema(sv) => {
            if sv.is_list() {
                let (mc, consumed) = match_sequence(
                    std::slice::from_ref(pattern),
                    std::slice::from_ref(candidate),
                    mc,
                )?;
                return (consumed == 1).then_some(mc);
            }
            let SvKind::Program(sort) = sv.kind() else {
                return None;
            };
            if !sort.admits(candidate) {
                return None;
            }
            mc.insts = mc.insts.add(sv, Instantiation::Program(candidate.clone()))?;
            Some(mc)
        }
        ProgramKind::Context => None,
        kind => {
            if kind != candidate.kind() {
                return None;
            }
            let (mc, consumed) = match_sequence(pattern.children(), candidate.children(), mc)?;
            (consumed == candidate.children().len()).then_some(mc)
        }
    }
}

/// Match a sequence of patterns against a prefix of `candidates`, returning
/// how many candidates were consumed. List schema variables take the longest
/// run of admissible elements and never give any back.
pub fn match_sequence(
    patterns: &[ProgramElement],
    candidates: &[ProgramElement],
    mut mc: MatchConditions,
) -> Option<(MatchConditions, usize)> {
    let mut next = 0;
    for pattern in patterns {
        match pattern.kind() {
            ProgramKind::Schema(sv) if sv.is_list() => {
                let SvKind::Program(sort) = sv.kind() else {
                    return None;
                };
                let run = candidates[next..]
                    .iter()
                    .take_while(|c| sort.admits(c))
                    .count();
                let list = candidates[next..next + run].iter().cloned().collect();
                mc.insts = mc.insts.add(sv, Instantiation::ProgramList(list))?;
                next += run;
            }
            _ => {
                let candidate = candidates.get(next)?;
                mc = match_program(pattern, candidate, mc)?;
                next += 1;
            }
        }
    }
    Some((mc, next))
}

/// Find the active statements in `block`: first at its own level, then in
/// each leading nested block, outermost first.
fn match_context(
    active: &[ProgramElement],
    block: &ProgramElement,
    mc: MatchConditions,
) -> Option<MatchConditions> {
    if *block.kind() != ProgramKind::Block {
        return None;
    }
    let mut current = block;
    let mut depth = 0;
    loop {
        if let Some((found, consumed)) = match_sequence(active, current.children(), mc.clone()) {
            let ctx = ContextInstantiation::new(block.clone(), depth, consumed);
            let insts = found.insts.with_context(ctx)?;
            return Some(found.with_insts(insts));
        }
        match current.children().first() {
            Some(first) if *first.kind() == ProgramKind::Block => {
                current = first;
                depth += 1;
            }
            _ => return None,
        }
    }
}
