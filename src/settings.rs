//! Options of an automatic proof search.
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use crate::chooser::{BalancedGoalChooser, DepthFirstGoalChooser, GoalChooser};
use crate::stop::{AppliedRuleStopCondition, InRuleSet, SignificantStepStopCondition, StopCondition};
use crate::strategy::DefaultStrategy;
use crate::util::IndexMap;
use crate::Symbol;

/// What bounds the search besides the global step and time budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopMode {
    #[default]
    AppliedRules,
    /// Also bound the number of symbolic execution steps per goal.
    SignificantSteps,
}

impl Display for StopMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StopMode::AppliedRules => write!(f, "applied-rules"),
            StopMode::SignificantSteps => write!(f, "significant-steps"),
        }
    }
}

impl FromStr for StopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applied-rules" => Ok(StopMode::AppliedRules),
            "significant-steps" => Ok(StopMode::SignificantSteps),
            _ => Err(format!("Unknown stop mode: {s}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChooserKind {
    #[default]
    DepthFirst,
    Balanced,
}

impl Display for ChooserKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChooserKind::DepthFirst => write!(f, "depth-first"),
            ChooserKind::Balanced => write!(f, "balanced"),
        }
    }
}

impl FromStr for ChooserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depth-first" => Ok(ChooserKind::DepthFirst),
            "balanced" => Ok(ChooserKind::Balanced),
            _ => Err(format!("Unknown goal chooser: {s}")),
        }
    }
}

/// The rule set whose applications count as symbolic execution steps.
pub const SYMBOLIC_EXECUTION: &str = "symbolic_execution";

#[derive(Clone, Debug)]
pub struct StrategySettings {
    pub max_steps: usize,
    pub timeout: Option<Duration>,
    pub stop_mode: StopMode,
    pub chooser: ChooserKind,
    /// Symbolic execution steps allowed per goal in
    /// [`StopMode::SignificantSteps`].
    pub step_limit: usize,
    pub stop_at_first_non_closeable: bool,
    /// Cost of the applications of each rule set.
    pub rule_set_weights: IndexMap<Symbol, i64>,
    /// Cost of each goal beyond the first an application creates.
    pub branching_cost: i64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        let rule_set_weights = [
            ("closure", -10_000),
            ("simplify", -5_000),
            ("alpha", -1_000),
            ("delta", -800),
            (SYMBOLIC_EXECUTION, -500),
            ("beta", -300),
            ("gamma", 100),
        ]
        .into_iter()
        .map(|(name, w)| (Symbol::from(name), w))
        .collect();
        Self {
            max_steps: 10_000,
            timeout: None,
            stop_mode: StopMode::default(),
            chooser: ChooserKind::default(),
            step_limit: 1_000,
            stop_at_first_non_closeable: false,
            rule_set_weights,
            branching_cost: 50,
        }
    }
}

impl StrategySettings {
    pub fn strategy(&self) -> DefaultStrategy {
        DefaultStrategy::new(self)
    }

    pub fn goal_chooser(&self) -> Box<dyn GoalChooser> {
        match self.chooser {
            ChooserKind::DepthFirst => Box::new(DepthFirstGoalChooser::new()),
            ChooserKind::Balanced => {
                Box::new(BalancedGoalChooser::new(InRuleSet::new(SYMBOLIC_EXECUTION)))
            }
        }
    }

    pub fn stop_condition(&self) -> Box<dyn StopCondition> {
        match self.stop_mode {
            StopMode::AppliedRules => Box::new(AppliedRuleStopCondition),
            StopMode::SignificantSteps => Box::new(
                SignificantStepStopCondition::new(
                    self.step_limit,
                    InRuleSet::new(SYMBOLIC_EXECUTION),
                )
                .and(AppliedRuleStopCondition),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_names_round_trip() {
        for mode in [StopMode::AppliedRules, StopMode::SignificantSteps] {
            assert_eq!(mode.to_string().parse::<StopMode>(), Ok(mode));
        }
        for kind in [ChooserKind::DepthFirst, ChooserKind::Balanced] {
            assert_eq!(kind.to_string().parse::<ChooserKind>(), Ok(kind));
        }
        assert!("sideways".parse::<ChooserKind>().is_err());
    }

    #[test]
    fn default_weights_order_rule_sets() {
        let s = StrategySettings::default();
        let w = |name: &str| s.rule_set_weights[&Symbol::from(name)];
        assert!(w("closure") < w("alpha"));
        assert!(w("alpha") < w(SYMBOLIC_EXECUTION));
        assert!(w(SYMBOLIC_EXECUTION) < w("beta"));
        assert!(w("beta") < w("gamma"));
    }
}
