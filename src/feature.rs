//! Costs of rule applications.
//!
//! A [`Feature`] maps a rule application to a [`RuleAppCost`]. Features are
//! pure: the same application in the same proof state always gets the same
//! cost, since queues are rebuilt and costs recomputed whenever a goal changes.
//! Strategies are built by composing the combinators in this module.
use std::fmt::{self, Display, Formatter};
use std::ops::Add;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::proof::{NodeId, Proof};
use crate::rule_app::TacletApp;
use crate::sequent::PosInOccurrence;
use crate::util::HashMap;
use crate::Symbol;

/// The cost of a rule application. `Top` rejects the application and is
/// greater than every number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RuleAppCost {
    Number(i64),
    Top,
}

impl RuleAppCost {
    pub const ZERO: RuleAppCost = RuleAppCost::Number(0);

    pub fn is_top(self) -> bool {
        matches!(self, RuleAppCost::Top)
    }

    pub fn value(self) -> Option<i64> {
        match self {
            RuleAppCost::Number(n) => Some(n),
            RuleAppCost::Top => None,
        }
    }
}

impl Add for RuleAppCost {
    type Output = RuleAppCost;

    fn add(self, rhs: RuleAppCost) -> RuleAppCost {
        match (self, rhs) {
            (RuleAppCost::Number(a), RuleAppCost::Number(b)) => {
                RuleAppCost::Number(a.saturating_add(b))
            }
            _ => RuleAppCost::Top,
        }
    }
}

impl From<i64> for RuleAppCost {
    fn from(n: i64) -> Self {
        RuleAppCost::Number(n)
    }
}

impl Display for RuleAppCost {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RuleAppCost::Number(n) => write!(f, "{n}"),
            RuleAppCost::Top => write!(f, "Top"),
        }
    }
}

/// What a feature may look at besides the application itself.
#[derive(Clone, Copy)]
pub struct FeatureContext<'a> {
    pub proof: &'a Proof,
    /// The node of the goal the application belongs to.
    pub node: NodeId,
}

pub trait Feature: Send + Sync {
    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost;
}

pub type FeatureRef = Arc<dyn Feature>;

impl<F: Feature + ?Sized> Feature for Arc<F> {
    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        (**self).compute_cost(app, pos, ctx)
    }
}

/// Always the same cost.
#[derive(Clone, Copy, Debug)]
pub struct ConstFeature(pub RuleAppCost);

impl ConstFeature {
    pub fn create(cost: RuleAppCost) -> FeatureRef {
        Arc::new(ConstFeature(cost))
    }
}

impl Feature for ConstFeature {
    fn compute_cost(
        &self,
        _: &TacletApp,
        _: Option<&PosInOccurrence>,
        _: &FeatureContext<'_>,
    ) -> RuleAppCost {
        self.0
    }
}

/// `round(coeff * f) + offset`. If `f` is `Top` the result is `Top`, unless
/// the coefficient is zero, in which case it is `offset`.
pub struct ScaleFeature {
    feature: FeatureRef,
    coeff: OrderedFloat<f64>,
    offset: i64,
}

fn is_zero(x: f64) -> bool {
    x.abs() < 1e-7
}

fn finite(cost: RuleAppCost) -> i64 {
    match cost {
        RuleAppCost::Number(n) => n,
        RuleAppCost::Top => panic!("expected a finite cost"),
    }
}

impl ScaleFeature {
    pub fn scaled(feature: FeatureRef, coeff: f64) -> FeatureRef {
        Self::affine(feature, coeff, 0)
    }

    pub fn affine(feature: FeatureRef, coeff: f64, offset: i64) -> FeatureRef {
        Arc::new(ScaleFeature {
            feature,
            coeff: OrderedFloat(coeff),
            offset,
        })
    }

    /// The affine map sending `dom0` to `img0` and `dom1` to `img1`.
    ///
    /// Either point may be `Top`. If the images coincide the result is
    /// constant; a `Top` domain or image point turns the map into a test on
    /// the base feature.
    ///
    /// # Panics
    ///
    /// If `dom0 == dom1`.
    pub fn affine_from_points(
        feature: FeatureRef,
        dom0: RuleAppCost,
        dom1: RuleAppCost,
        img0: RuleAppCost,
        img1: RuleAppCost,
    ) -> FeatureRef {
        assert_ne!(dom0, dom1, "an affine map needs two distinct domain points");
        if img0 == img1 {
            return ConstFeature::create(img0);
        }
        match (dom0, dom1, img0, img1) {
            (RuleAppCost::Top, _, _, _) => Self::first_dom_infty(feature, dom1, img0, img1),
            (_, RuleAppCost::Top, _, _) => Self::first_dom_infty(feature, dom0, img1, img0),
            (_, _, RuleAppCost::Top, _) => {
                ShannonFeature::conditional_const(feature, dom1, img1, RuleAppCost::Top)
            }
            (_, _, _, RuleAppCost::Top) => {
                ShannonFeature::conditional_const(feature, dom0, img0, RuleAppCost::Top)
            }
            _ => {
                let (d0, d1) = (finite(dom0) as f64, finite(dom1) as f64);
                let (i0, i1) = (finite(img0) as f64, finite(img1) as f64);
                let coeff = (i1 - i0) / (d1 - d0);
                let offset = (i0 - d0 * coeff) as i64;
                Self::affine(feature, coeff, offset)
            }
        }
    }

    /// `Top` maps to `img0`, the finite `dom1` maps to `img1`.
    fn first_dom_infty(
        feature: FeatureRef,
        dom1: RuleAppCost,
        img0: RuleAppCost,
        img1: RuleAppCost,
    ) -> FeatureRef {
        if img0.is_top() {
            Self::affine(feature, 1.0, finite(img1) - finite(dom1))
        } else {
            ShannonFeature::conditional_const(feature, RuleAppCost::Top, img0, img1)
        }
    }
}

impl Feature for ScaleFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        let coeff = self.coeff.into_inner();
        match self.feature.compute_cost(app, pos, ctx) {
            RuleAppCost::Top if is_zero(coeff) => RuleAppCost::Number(self.offset),
            RuleAppCost::Top => RuleAppCost::Top,
            RuleAppCost::Number(n) => {
                let scaled = (coeff * n as f64 + 0.5).floor() as i64;
                RuleAppCost::Number(scaled.saturating_add(self.offset))
            }
        }
    }
}

/// `if cond == true_value { then } else { els }`.
pub struct ShannonFeature {
    cond: FeatureRef,
    true_value: RuleAppCost,
    then: FeatureRef,
    els: FeatureRef,
}

impl ShannonFeature {
    pub fn conditional(
        cond: FeatureRef,
        true_value: RuleAppCost,
        then: FeatureRef,
        els: FeatureRef,
    ) -> FeatureRef {
        Arc::new(ShannonFeature {
            cond,
            true_value,
            then,
            els,
        })
    }

    pub fn conditional_const(
        cond: FeatureRef,
        true_value: RuleAppCost,
        then: RuleAppCost,
        els: RuleAppCost,
    ) -> FeatureRef {
        Self::conditional(cond, true_value, ConstFeature::create(then), ConstFeature::create(els))
    }

    /// A condition that treats cost zero as true.
    pub fn binary(cond: FeatureRef, then: FeatureRef, els: FeatureRef) -> FeatureRef {
        Self::conditional(cond, RuleAppCost::ZERO, then, els)
    }

    pub fn binary_const(cond: FeatureRef, then: RuleAppCost, els: RuleAppCost) -> FeatureRef {
        Self::conditional_const(cond, RuleAppCost::ZERO, then, els)
    }
}

impl Feature for ShannonFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        if self.cond.compute_cost(app, pos, ctx) == self.true_value {
            self.then.compute_cost(app, pos, ctx)
        } else {
            self.els.compute_cost(app, pos, ctx)
        }
    }
}

/// The sum of its summands; stops at the first `Top`.
pub struct SumFeature(Vec<FeatureRef>);

impl SumFeature {
    pub fn create(features: impl IntoIterator<Item = FeatureRef>) -> FeatureRef {
        Arc::new(SumFeature(features.into_iter().collect()))
    }
}

impl Feature for SumFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        let mut sum = RuleAppCost::ZERO;
        for f in &self.0 {
            sum = sum + f.compute_cost(app, pos, ctx);
            if sum.is_top() {
                break;
            }
        }
        sum
    }
}

/// The sum of the features registered for the rule sets of the taclet.
/// Taclets in no registered rule set get `default`.
pub struct RuleSetDispatchFeature {
    by_rule_set: HashMap<Symbol, FeatureRef>,
    default: RuleAppCost,
}

impl RuleSetDispatchFeature {
    pub fn new(default: RuleAppCost) -> Self {
        Self {
            by_rule_set: HashMap::default(),
            default,
        }
    }

    /// Add `feature` to the cost of rule set `name`.
    pub fn add(&mut self, name: Symbol, feature: FeatureRef) {
        let combined = match self.by_rule_set.remove(&name) {
            Some(old) => SumFeature::create([old, feature]),
            None => feature,
        };
        self.by_rule_set.insert(name, combined);
    }

    pub fn add_cost(&mut self, name: Symbol, cost: RuleAppCost) {
        self.add(name, ConstFeature::create(cost));
    }
}

impl Feature for RuleSetDispatchFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        pos: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        let mut sum = None;
        for rs in app.taclet().rule_sets() {
            if let Some(f) = self.by_rule_set.get(rs) {
                let c = f.compute_cost(app, pos, ctx);
                sum = Some(sum.map_or(c, |s| s + c));
            }
        }
        sum.unwrap_or(self.default)
    }
}

/// Zero if the taclet is in the rule set, `Top` otherwise.
pub struct InRuleSetFeature(pub Symbol);

impl InRuleSetFeature {
    pub fn create(name: &str) -> FeatureRef {
        Arc::new(InRuleSetFeature(Symbol::from(name)))
    }
}

impl Feature for InRuleSetFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        _: Option<&PosInOccurrence>,
        _: &FeatureContext<'_>,
    ) -> RuleAppCost {
        if app.taclet().in_rule_set(self.0) {
            RuleAppCost::ZERO
        } else {
            RuleAppCost::Top
        }
    }
}

/// `Top` if the same taclet was already applied the same way on this branch.
pub struct NonDuplicateAppFeature;

impl Feature for NonDuplicateAppFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        _: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        let mut cur = ctx.proof.node(ctx.node).parent();
        while let Some(id) = cur {
            let node = ctx.proof.node(id);
            if node.app().is_some_and(|done| done.same_application(app)) {
                return RuleAppCost::Top;
            }
            cur = node.parent();
        }
        RuleAppCost::ZERO
    }
}

/// `cost_per_goal` for each goal beyond the first the application creates.
pub struct BranchingFeature {
    pub cost_per_goal: i64,
}

impl Feature for BranchingFeature {
    fn compute_cost(
        &self,
        app: &TacletApp,
        _: Option<&PosInOccurrence>,
        _: &FeatureContext<'_>,
    ) -> RuleAppCost {
        let extra = app.taclet().templates().len().saturating_sub(1) as i64;
        RuleAppCost::Number(extra.saturating_mul(self.cost_per_goal))
    }
}

/// The depth of the focus inside its formula.
pub struct FindDepthFeature;

impl Feature for FindDepthFeature {
    fn compute_cost(
        &self,
        _: &TacletApp,
        pos: Option<&PosInOccurrence>,
        _: &FeatureContext<'_>,
    ) -> RuleAppCost {
        RuleAppCost::Number(pos.map_or(0, |p| p.depth() as i64))
    }
}

/// The number of nodes between the goal and the root; spreads work over
/// shallow branches first when added to other costs.
pub struct NodeDepthFeature;

impl Feature for NodeDepthFeature {
    fn compute_cost(
        &self,
        _: &TacletApp,
        _: Option<&PosInOccurrence>,
        ctx: &FeatureContext<'_>,
    ) -> RuleAppCost {
        let mut depth = 0i64;
        let mut cur = ctx.proof.node(ctx.node).parent();
        while let Some(id) = cur {
            depth += 1;
            cur = ctx.proof.node(id).parent();
        }
        RuleAppCost::Number(depth)
    }
}
