//! Turning a complete rule application into successor sequents.
use log::trace;
use smallvec::SmallVec;
use thiserror::Error;

use crate::instantiations::{Instantiation, SvInstantiations};
use crate::program::{ProgramElement, ProgramKind};
use crate::proof::Namespace;
use crate::rule_app::TacletApp;
use crate::sequent::{PosInOccurrence, Sequent, SequentChangeInfo, SequentFormula, Side};
use crate::subst::{execute_substitutions, SubstError};
use crate::rule::{GoalTemplate, Replacement};
use crate::term::{Function, Labels, Operator, QuantifiableVariable, Term, TermLabel};
use crate::Symbol;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("rule application {0} is not complete")]
    Incomplete(String),
    #[error("the focus of {0} is not in the sequent")]
    StaleFocus(String),
    #[error("schema variable {0} has no usable instantiation")]
    MissingInstantiation(Symbol),
    #[error("the instantiation of {0} is not a term")]
    NotATerm(Symbol),
    #[error("rule {0} rebuilds a program context that was never matched")]
    MissingContext(Symbol),
    #[error(transparent)]
    Subst(#[from] SubstError),
}

/// One successor goal produced by a rule application.
#[derive(Clone, Debug)]
pub struct Successor {
    pub label: Option<Symbol>,
    pub change: SequentChangeInfo,
}

impl Successor {
    pub fn sequent(&self) -> &Sequent {
        &self.change.sequent
    }
}

pub struct TacletExecutor<'a> {
    namespace: &'a mut Namespace,
}

impl<'a> TacletExecutor<'a> {
    pub fn new(namespace: &'a mut Namespace) -> Self {
        Self { namespace }
    }

    /// Apply `app` to `seq`. An empty result means the goal is closed.
    pub fn execute(
        &mut self,
        app: &TacletApp,
        seq: &Sequent,
    ) -> Result<Vec<Successor>, ExecutionError> {
        if !app.is_complete() {
            return Err(ExecutionError::Incomplete(app.to_string()));
        }
        let taclet = app.taclet();
        let focus = match app.pos() {
            Some(pos) => {
                let idx = seq
                    .side(pos.side())
                    .index_of(pos.sequent_formula())
                    .ok_or_else(|| ExecutionError::StaleFocus(app.to_string()))?;
                Some((pos, idx))
            }
            None => None,
        };

        let mut insts = app.instantiations().clone();
        for sv in taclet.schema_vars().iter().filter(|sv| sv.is_skolem()) {
            if insts.is_instantiated(sv) {
                continue;
            }
            let stem = sv.name().as_str().trim_start_matches('#');
            let name = self.namespace.fresh_name(stem);
            let constant = Term::new(Operator::Function(Function::constant(name, sv.sort())), []);
            if let Some(next) = insts.add_term(sv, constant) {
                insts = next;
            }
        }

        let mut successors = Vec::with_capacity(taclet.templates().len());
        for template in taclet.templates() {
            let change = self.apply_template(template, &insts, seq, focus, taclet.name())?;
            trace!("{} produced {}", taclet.name(), change.sequent);
            successors.push(Successor {
                label: template.label,
                change,
            });
        }
        Ok(successors)
    }

    fn apply_template(
        &self,
        template: &GoalTemplate,
        insts: &SvInstantiations,
        seq: &Sequent,
        focus: Option<(&PosInOccurrence, usize)>,
        rule: Symbol,
    ) -> Result<SequentChangeInfo, ExecutionError> {
        let mut change = SequentChangeInfo::unchanged(seq.clone());
        match (&template.replace, focus) {
            (Replacement::None, _) => {}
            (Replacement::Term(t), Some((pos, idx))) => {
                let replacement = instantiate_formula(t, insts, rule)?;
                let formula = pos
                    .sequent_formula()
                    .formula()
                    .replace_at(pos.pos_in_term(), replacement);
                let step = change
                    .sequent
                    .replace(pos.side(), idx, vec![SequentFormula::new(formula)]);
                change = change.combine(step);
            }
            (Replacement::Sequent(s), Some((pos, idx))) => {
                let same = instantiate_all(s.side(pos.side()), insts, rule)?;
                let step = change.sequent.replace(pos.side(), idx, same);
                change = change.combine(step);
                let other_side = match pos.side() {
                    Side::Antec => Side::Succ,
                    Side::Succ => Side::Antec,
                };
                let other = instantiate_all(s.side(other_side), insts, rule)?;
                let step = change.sequent.insert_all(other_side, 0, other);
                change = change.combine(step);
            }
            // rejected when the taclet was built
            (_, None) => return Err(ExecutionError::StaleFocus(rule.to_string())),
        }
        for side in [Side::Antec, Side::Succ] {
            let added = instantiate_all(template.add.side(side), insts, rule)?;
            if !added.is_empty() {
                let step = change.sequent.insert_all(side, 0, added);
                change = change.combine(step);
            }
        }
        Ok(change)
    }
}

fn instantiate_all(
    templates: &[Term],
    insts: &SvInstantiations,
    rule: Symbol,
) -> Result<Vec<SequentFormula>, ExecutionError> {
    templates
        .iter()
        .map(|t| instantiate_formula(t, insts, rule).map(SequentFormula::new))
        .collect()
}

/// Instantiate a template and execute the substitutions it contains.
pub fn instantiate_formula(
    template: &Term,
    insts: &SvInstantiations,
    rule: Symbol,
) -> Result<Term, ExecutionError> {
    let t = instantiate_term(template, insts, rule)?;
    Ok(execute_substitutions(&t)?)
}

/// Replace every schema variable in `template` by its instantiation.
pub fn instantiate_term(
    template: &Term,
    insts: &SvInstantiations,
    rule: Symbol,
) -> Result<Term, ExecutionError> {
    let labels = instantiate_labels(template.labels(), insts)?;
    let term = match template.op() {
        Operator::Schema(sv) => {
            let inst = match insts.get(sv) {
                Some(Instantiation::Term(t)) => t.clone(),
                Some(Instantiation::Program(p)) => {
                    p.to_term().ok_or(ExecutionError::NotATerm(sv.name()))?
                }
                Some(_) => return Err(ExecutionError::NotATerm(sv.name())),
                None => return Err(ExecutionError::MissingInstantiation(sv.name())),
            };
            if labels.is_empty() {
                return Ok(inst);
            }
            inst
        }
        op => {
            let op = match op {
                Operator::Modality(kind, prog) => {
                    Operator::Modality(*kind, instantiate_program(prog, insts, rule)?)
                }
                op => op.clone(),
            };
            let mut subs = SmallVec::with_capacity(template.arity());
            let mut bound = SmallVec::with_capacity(template.arity());
            for (i, sub) in template.subs().iter().enumerate() {
                subs.push(instantiate_term(sub, insts, rule)?);
                let bv = template
                    .vars_bound_here(i)
                    .iter()
                    .map(|qv| match qv {
                        QuantifiableVariable::Logic(_) => Ok(qv.clone()),
                        QuantifiableVariable::Schema(sv) => insts
                            .get_variable(sv)
                            .map(QuantifiableVariable::Logic)
                            .ok_or(ExecutionError::MissingInstantiation(sv.name())),
                    })
                    .collect::<Result<_, _>>()?;
                bound.push(bv);
            }
            return Ok(Term::build(op, subs, bound, labels));
        }
    };
    let mut all: Labels = term.labels().iter().cloned().collect();
    all.extend(labels.into_iter().filter(|l| !term.labels().contains(l)));
    Ok(term.with_labels(all))
}

fn instantiate_labels(
    labels: &[TermLabel],
    insts: &SvInstantiations,
) -> Result<Labels, ExecutionError> {
    let mut out = Labels::new();
    for label in labels {
        match label {
            TermLabel::Name(_) => out.push(label.clone()),
            TermLabel::Schema(sv) => match insts.get(sv) {
                Some(Instantiation::Labels(ls)) => out.extend(ls.iter().cloned()),
                _ => return Err(ExecutionError::MissingInstantiation(sv.name())),
            },
        }
    }
    Ok(out)
}

/// Instantiate a program template, splicing list instantiations and
/// restoring the matched execution context.
pub fn instantiate_program(
    template: &ProgramElement,
    insts: &SvInstantiations,
    rule: Symbol,
) -> Result<ProgramElement, ExecutionError> {
    if let Some(active) = template.context_pattern() {
        let ctx = insts.context().ok_or(ExecutionError::MissingContext(rule))?;
        let stmts = instantiate_sequence(active, insts, rule)?;
        return Ok(ctx.splice(stmts));
    }
    match template.kind() {
        ProgramKind::Schema(sv) => match insts.get(sv) {
            Some(Instantiation::Program(p)) => Ok(p.clone()),
            Some(Instantiation::ProgramList(l)) if l.len() == 1 => Ok(l[0].clone()),
            _ => Err(ExecutionError::MissingInstantiation(sv.name())),
        },
        _ if template.children().is_empty() => Ok(template.clone()),
        _ => Ok(template.with_children(instantiate_sequence(template.children(), insts, rule)?)),
    }
}

fn instantiate_sequence(
    templates: &[ProgramElement],
    insts: &SvInstantiations,
    rule: Symbol,
) -> Result<Vec<ProgramElement>, ExecutionError> {
    let mut out = Vec::with_capacity(templates.len());
    for t in templates {
        match t.kind() {
            ProgramKind::Schema(sv) if sv.is_list() => match insts.get(sv) {
                Some(Instantiation::ProgramList(l)) => out.extend(l.iter().cloned()),
                _ => return Err(ExecutionError::MissingInstantiation(sv.name())),
            },
            _ => out.push(instantiate_program(t, insts, rule)?),
        }
    }
    Ok(out)
}
