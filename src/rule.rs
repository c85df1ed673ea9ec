//! Schematic inference rules.
//!
//! A [`Taclet`] is built once through a [`TacletBuilder`], which rejects
//! malformed rules, and is immutable afterwards. Cloning shares the rule.
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use smallvec::SmallVec;
use thiserror::Error;

use crate::instantiations::{Instantiation, MatchConditions, SvInstantiations};
use crate::matching::match_term;
use crate::schema::{SchemaVariable, SvKind};
use crate::sequent::{PosInOccurrence, Sequent, Side};
use crate::term::Term;
use crate::util::{IndexSet, ListDisplay};
use crate::Symbol;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TacletError {
    #[error("taclet {taclet}: schema variable {sv} is never bound")]
    UnboundSchemaVariable { taclet: Symbol, sv: Symbol },
    #[error("taclet {taclet}: fresh schema variable {sv} occurs in a pattern")]
    SkolemInPattern { taclet: Symbol, sv: Symbol },
    #[error("taclet {taclet}: goal {goal} has a replacement that does not fit its find part")]
    ReplacementMismatch { taclet: Symbol, goal: usize },
    #[error("taclet {taclet}: not-free-in expects a variable schema variable, found {sv}")]
    NotFreeInNeedsVariable { taclet: Symbol, sv: Symbol },
    #[error("taclet {taclet}: expected a formula, found {term}")]
    FormulaExpected { taclet: Symbol, term: String },
    #[error("taclet {taclet}: replacement {term} does not have the sort of the find pattern")]
    SortMismatch { taclet: Symbol, term: String },
}

/// The focus of a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FindPart {
    NoFind,
    /// Matches a subterm at any position on either side.
    Rewrite(Term),
    /// Matches a top-level formula of the antecedent.
    Antec(Term),
    /// Matches a top-level formula of the succedent.
    Succ(Term),
}

impl FindPart {
    pub fn pattern(&self) -> Option<&Term> {
        match self {
            FindPart::NoFind => None,
            FindPart::Rewrite(t) | FindPart::Antec(t) | FindPart::Succ(t) => Some(t),
        }
    }

    /// Whether a position on `side` can be the focus.
    pub fn admits(&self, side: Side, top_level: bool) -> bool {
        match self {
            FindPart::NoFind => false,
            FindPart::Rewrite(_) => true,
            FindPart::Antec(_) => top_level && side == Side::Antec,
            FindPart::Succ(_) => top_level && side == Side::Succ,
        }
    }
}

/// A schematic sequent: the formulas a rule requires or adds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequentPattern {
    pub antec: Vec<Term>,
    pub succ: Vec<Term>,
}

impl SequentPattern {
    pub fn new(
        antec: impl IntoIterator<Item = Term>,
        succ: impl IntoIterator<Item = Term>,
    ) -> Self {
        Self {
            antec: antec.into_iter().collect(),
            succ: succ.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.antec.is_empty() && self.succ.is_empty()
    }

    pub fn side(&self, side: Side) -> &[Term] {
        match side {
            Side::Antec => &self.antec,
            Side::Succ => &self.succ,
        }
    }

    fn formulas(&self) -> impl Iterator<Item = &Term> {
        self.antec.iter().chain(self.succ.iter())
    }
}

impl Display for SequentPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ==> {}",
            ListDisplay(&self.antec, ", "),
            ListDisplay(&self.succ, ", ")
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Replacement {
    #[default]
    None,
    /// Replaces the focus term of a rewrite rule.
    Term(Term),
    /// Replaces the focus formula of an antecedent or succedent rule. The
    /// part on the focus side takes the focus formula's place, the other
    /// part is added. An empty sequent removes the focus.
    Sequent(SequentPattern),
}

/// How to build one successor goal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoalTemplate {
    pub label: Option<Symbol>,
    pub replace: Replacement,
    pub add: SequentPattern,
}

impl GoalTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(Symbol::from(label));
        self
    }

    pub fn replace_term(mut self, t: Term) -> Self {
        self.replace = Replacement::Term(t);
        self
    }

    pub fn replace_sequent(
        mut self,
        antec: impl IntoIterator<Item = Term>,
        succ: impl IntoIterator<Item = Term>,
    ) -> Self {
        self.replace = Replacement::Sequent(SequentPattern::new(antec, succ));
        self
    }

    pub fn add_antec(mut self, t: Term) -> Self {
        self.add.antec.push(t);
        self
    }

    pub fn add_succ(mut self, t: Term) -> Self {
        self.add.succ.push(t);
        self
    }

    fn terms(&self) -> impl Iterator<Item = &Term> {
        let replaced: Vec<&Term> = match &self.replace {
            Replacement::None => vec![],
            Replacement::Term(t) => vec![t],
            Replacement::Sequent(s) => s.formulas().collect(),
        };
        replaced.into_iter().chain(self.add.formulas())
    }
}

pub type ConditionCheck = Arc<dyn Fn(&SvInstantiations) -> bool + Send + Sync>;

/// A side condition over schema variable instantiations.
#[derive(Clone)]
pub enum VariableCondition {
    /// The variable bound to the first schema variable does not occur free
    /// in the instantiation of the second.
    NotFreeIn(SchemaVariable, SchemaVariable),
    Different(SchemaVariable, SchemaVariable),
    Custom {
        name: Symbol,
        vars: Vec<SchemaVariable>,
        check: ConditionCheck,
    },
}

impl VariableCondition {
    pub fn custom(
        name: &str,
        vars: impl IntoIterator<Item = SchemaVariable>,
        check: impl Fn(&SvInstantiations) -> bool + Send + Sync + 'static,
    ) -> Self {
        VariableCondition::Custom {
            name: Symbol::from(name),
            vars: vars.into_iter().collect(),
            check: Arc::new(check),
        }
    }

    pub fn schema_vars(&self) -> SmallVec<[&SchemaVariable; 2]> {
        match self {
            VariableCondition::NotFreeIn(a, b) | VariableCondition::Different(a, b) => {
                smallvec::smallvec![a, b]
            }
            VariableCondition::Custom { vars, .. } => vars.iter().collect(),
        }
    }

    /// `None` while some variable of the condition is uninstantiated.
    pub fn check(&self, insts: &SvInstantiations) -> Option<bool> {
        if !self.schema_vars().iter().all(|sv| insts.is_instantiated(sv)) {
            return None;
        }
        Some(match self {
            VariableCondition::NotFreeIn(var, sv) => {
                let lv = insts.get_variable(var)?;
                match insts.get(sv)? {
                    Instantiation::Term(t) => !t.free_vars().contains(&lv),
                    _ => true,
                }
            }
            VariableCondition::Different(a, b) => {
                !insts.get(a)?.equivalent(insts.get(b)?)
            }
            VariableCondition::Custom { check, .. } => check(insts),
        })
    }
}

impl Debug for VariableCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for VariableCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VariableCondition::NotFreeIn(a, b) => write!(f, "\\notFreeIn({a}, {b})"),
            VariableCondition::Different(a, b) => write!(f, "\\different({a}, {b})"),
            VariableCondition::Custom { name, vars, .. } => {
                write!(f, "\\{name}({})", ListDisplay(vars, ", "))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TacletAttributes {
    /// May be applied by the automatic strategy.
    pub automatic: bool,
    /// Offered to a user choosing rules by hand.
    pub interactive: bool,
    pub display_name: Option<String>,
}

impl Default for TacletAttributes {
    fn default() -> Self {
        Self {
            automatic: true,
            interactive: true,
            display_name: None,
        }
    }
}

#[derive(Debug)]
struct TacletData {
    name: Symbol,
    find: FindPart,
    assumes: SequentPattern,
    conditions: Vec<VariableCondition>,
    rule_sets: SmallVec<[Symbol; 2]>,
    attributes: TacletAttributes,
    templates: Vec<GoalTemplate>,
    schema_vars: IndexSet<SchemaVariable>,
}

#[derive(Clone, Debug)]
pub struct Taclet(Arc<TacletData>);

impl PartialEq for Taclet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for Taclet {}

impl std::hash::Hash for Taclet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl Taclet {
    pub fn name(&self) -> Symbol {
        self.0.name
    }

    pub fn display_name(&self) -> &str {
        self.0
            .attributes
            .display_name
            .as_deref()
            .unwrap_or(self.0.name.as_str())
    }

    pub fn find(&self) -> &FindPart {
        &self.0.find
    }

    pub fn assumes(&self) -> &SequentPattern {
        &self.0.assumes
    }

    pub fn conditions(&self) -> &[VariableCondition] {
        &self.0.conditions
    }

    pub fn rule_sets(&self) -> &[Symbol] {
        &self.0.rule_sets
    }

    pub fn in_rule_set(&self, name: Symbol) -> bool {
        self.0.rule_sets.contains(&name)
    }

    pub fn attributes(&self) -> &TacletAttributes {
        &self.0.attributes
    }

    pub fn is_automatic(&self) -> bool {
        self.0.attributes.automatic
    }

    pub fn templates(&self) -> &[GoalTemplate] {
        &self.0.templates
    }

    /// A taclet without goal templates closes the goal it is applied to.
    pub fn is_closing(&self) -> bool {
        self.0.templates.is_empty()
    }

    /// Every schema variable of the taclet, in order of first occurrence.
    pub fn schema_vars(&self) -> &IndexSet<SchemaVariable> {
        &self.0.schema_vars
    }

    /// Match the find pattern against `candidate`. Conditions whose
    /// variables are all instantiated are checked as well.
    pub fn match_find(&self, candidate: &Term) -> Option<MatchConditions> {
        let pattern = self.0.find.pattern()?;
        let mc = match_term(pattern, candidate, MatchConditions::new())?;
        self.check_conditions(&mc.insts, false).then_some(mc)
    }

    /// Check the variable conditions. If `complete`, a condition over an
    /// uninstantiated variable fails; otherwise it is deferred.
    pub fn check_conditions(&self, insts: &SvInstantiations, complete: bool) -> bool {
        self.0.conditions.iter().all(|c| match c.check(insts) {
            Some(ok) => ok,
            None => !complete,
        })
    }

    /// Find sequent formulas for the assumes part, skipping the focus formula.
    /// Returns the first complete combination, with the matched positions.
    pub fn match_assumes(
        &self,
        seq: &Sequent,
        focus: Option<&PosInOccurrence>,
        mc: MatchConditions,
    ) -> Option<(MatchConditions, Vec<PosInOccurrence>)> {
        let wanted: Vec<(Side, &Term)> = self
            .0
            .assumes
            .antec
            .iter()
            .map(|t| (Side::Antec, t))
            .chain(self.0.assumes.succ.iter().map(|t| (Side::Succ, t)))
            .collect();
        let mut found = Vec::with_capacity(wanted.len());
        let mc = match_assumes_rec(&wanted, seq, focus, mc, &mut found)?;
        self.check_conditions(&mc.insts, false).then_some((mc, found))
    }
}

fn match_assumes_rec(
    wanted: &[(Side, &Term)],
    seq: &Sequent,
    focus: Option<&PosInOccurrence>,
    mc: MatchConditions,
    found: &mut Vec<PosInOccurrence>,
) -> Option<MatchConditions> {
    let Some(((side, pattern), rest)) = wanted.split_first() else {
        return Some(mc);
    };
    for sf in seq.side(*side).iter() {
        let is_focus = focus.is_some_and(|f| f.side() == *side && f.sequent_formula() == sf);
        if is_focus {
            continue;
        }
        let Some(next) = match_term(pattern, sf.formula(), mc.clone()) else {
            continue;
        };
        found.push(PosInOccurrence::top_level(*side, sf.clone()));
        if let Some(done) = match_assumes_rec(rest, seq, focus, next, found) {
            return Some(done);
        }
        found.pop();
    }
    None
}

impl Display for Taclet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(f, "{} {{", d.name)?;
        if !d.assumes.is_empty() {
            write!(f, " \\assumes({})", d.assumes)?;
        }
        match &d.find {
            FindPart::NoFind => {}
            FindPart::Rewrite(t) => write!(f, " \\find({t})")?,
            FindPart::Antec(t) => write!(f, " \\find({t} ==>)")?,
            FindPart::Succ(t) => write!(f, " \\find(==> {t})")?,
        }
        for c in &d.conditions {
            write!(f, " \\varcond({c})")?;
        }
        if d.templates.is_empty() {
            write!(f, " \\closegoal")?;
        }
        for (i, g) in d.templates.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            if let Some(label) = g.label {
                write!(f, " \"{label}\":")?;
            }
            match &g.replace {
                Replacement::None => {}
                Replacement::Term(t) => write!(f, " \\replacewith({t})")?,
                Replacement::Sequent(s) => write!(f, " \\replacewith({s})")?,
            }
            if !g.add.is_empty() {
                write!(f, " \\add({})", g.add)?;
            }
        }
        if !d.rule_sets.is_empty() {
            write!(f, " \\heuristics({})", ListDisplay(&d.rule_sets, ", "))?;
        }
        write!(f, " }}")
    }
}

pub struct TacletBuilder {
    name: Symbol,
    find: FindPart,
    assumes: SequentPattern,
    conditions: Vec<VariableCondition>,
    rule_sets: SmallVec<[Symbol; 2]>,
    attributes: TacletAttributes,
    templates: Vec<GoalTemplate>,
    external: IndexSet<SchemaVariable>,
}

impl TacletBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: Symbol::from(name),
            find: FindPart::NoFind,
            assumes: SequentPattern::default(),
            conditions: vec![],
            rule_sets: SmallVec::new(),
            attributes: TacletAttributes::default(),
            templates: vec![],
            external: IndexSet::default(),
        }
    }

    pub fn find(mut self, find: FindPart) -> Self {
        self.find = find;
        self
    }

    pub fn find_rewrite(self, t: Term) -> Self {
        self.find(FindPart::Rewrite(t))
    }

    pub fn find_antec(self, t: Term) -> Self {
        self.find(FindPart::Antec(t))
    }

    pub fn find_succ(self, t: Term) -> Self {
        self.find(FindPart::Succ(t))
    }

    pub fn assumes_antec(mut self, t: Term) -> Self {
        self.assumes.antec.push(t);
        self
    }

    pub fn assumes_succ(mut self, t: Term) -> Self {
        self.assumes.succ.push(t);
        self
    }

    pub fn condition(mut self, c: VariableCondition) -> Self {
        self.conditions.push(c);
        self
    }

    pub fn rule_set(mut self, name: &str) -> Self {
        self.rule_sets.push(Symbol::from(name));
        self
    }

    pub fn goal(mut self, g: GoalTemplate) -> Self {
        self.templates.push(g);
        self
    }

    /// A schema variable left open by matching, to be supplied by the user
    /// or by heuristic instantiation.
    pub fn instantiate_externally(mut self, sv: &SchemaVariable) -> Self {
        self.external.insert(sv.clone());
        self
    }

    /// Only applicable by hand.
    pub fn interactive_only(mut self) -> Self {
        self.attributes.automatic = false;
        self
    }

    /// Never offered to a user choosing rules by hand.
    pub fn non_interactive(mut self) -> Self {
        self.attributes.interactive = false;
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.attributes.display_name = Some(name.to_owned());
        self
    }

    pub fn build(self) -> Result<Taclet, TacletError> {
        let name = self.name;

        let mut matched = IndexSet::default();
        if let Some(t) = self.find.pattern() {
            t.collect_schema_vars(&mut matched);
        }
        for t in self.assumes.formulas() {
            t.collect_schema_vars(&mut matched);
        }
        if let Some(sv) = matched.iter().find(|sv| sv.is_skolem()) {
            return Err(TacletError::SkolemInPattern { taclet: name, sv: sv.name() });
        }

        let formula_expected = |t: &Term| {
            if t.sort().is_formula() {
                Ok(())
            } else {
                Err(TacletError::FormulaExpected { taclet: name, term: t.to_string() })
            }
        };
        if let FindPart::Antec(t) | FindPart::Succ(t) = &self.find {
            formula_expected(t)?;
        }
        for t in self.assumes.formulas() {
            formula_expected(t)?;
        }

        let mut used = IndexSet::default();
        for (i, g) in self.templates.iter().enumerate() {
            let fits = matches!(
                (&self.find, &g.replace),
                (_, Replacement::None)
                    | (FindPart::Rewrite(_), Replacement::Term(_))
                    | (FindPart::Antec(_) | FindPart::Succ(_), Replacement::Sequent(_))
            );
            if !fits {
                return Err(TacletError::ReplacementMismatch { taclet: name, goal: i });
            }
            if let (FindPart::Rewrite(f), Replacement::Term(t)) = (&self.find, &g.replace) {
                if f.sort().is_formula() != t.sort().is_formula() {
                    return Err(TacletError::SortMismatch { taclet: name, term: t.to_string() });
                }
            }
            if let Replacement::Sequent(s) = &g.replace {
                for t in s.formulas() {
                    formula_expected(t)?;
                }
            }
            for t in g.add.formulas() {
                formula_expected(t)?;
            }
            for t in g.terms() {
                t.collect_schema_vars(&mut used);
            }
        }
        for c in &self.conditions {
            if let VariableCondition::NotFreeIn(var, _) = c {
                if !matches!(var.kind(), SvKind::Variable(_)) {
                    return Err(TacletError::NotFreeInNeedsVariable {
                        taclet: name,
                        sv: var.name(),
                    });
                }
            }
            used.extend(c.schema_vars().into_iter().cloned());
        }
        for sv in used.iter() {
            if !matched.contains(sv) && !sv.is_skolem() && !self.external.contains(sv) {
                return Err(TacletError::UnboundSchemaVariable { taclet: name, sv: sv.name() });
            }
        }

        let mut schema_vars = matched;
        schema_vars.extend(used);
        schema_vars.extend(self.external);
        Ok(Taclet(Arc::new(TacletData {
            name,
            find: self.find,
            assumes: self.assumes,
            conditions: self.conditions,
            rule_sets: self.rule_sets,
            attributes: self.attributes,
            templates: self.templates,
            schema_vars,
        })))
    }
}
