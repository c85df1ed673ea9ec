//! # taclet
//! taclet is the automated-deduction core of a sequent-calculus prover.
//! Rules are *taclets*: schematic patterns with a find part, assumptions,
//! variable conditions and goal templates. The crate matches taclets
//! against sequents, applies them with capture-avoiding substitution, and
//! runs a cost-guided proof search bounded by step and time budgets.
//!
//! # Overview
//! - [`term`], [`sequent`] and [`program`] hold the logic: immutable,
//!   structurally shared terms, sequents and statement blocks.
//! - [`rule`], [`matching`] and [`executor`] describe, match and apply rules.
//! - [`proof`] is the proof tree with its open goals.
//! - [`feature`] and [`strategy`] rate applications; [`chooser`] and [`stop`]
//!   pick goals and bound the search; [`apply_strategy`] drives it all.
//! - [`rules`] is a small standard rule base.
//!
//! ```
//! use taclet::*;
//!
//! let tb = TermBuilder;
//! let p = tb.cons(Function::predicate("p", 0));
//! let q = tb.cons(Function::predicate("q", 0));
//! let goal = tb.imp(tb.and(p.clone(), q.clone()), tb.and(q, p));
//! let mut proof = Proof::new(Sequent::from_formulas([], [goal]), rules::propositional());
//! let info = ApplyStrategy::default().run(&mut proof, &StrategySettings::default());
//! assert!(proof.is_closed());
//! assert_eq!(info.stop_reason(), Some(&StopReason::GoalsExhausted));
//! ```
pub mod apply_strategy;
pub mod chooser;
mod cli;
pub mod executor;
pub mod feature;
pub mod id;
pub mod index;
pub mod instantiations;
pub mod matching;
pub mod program;
pub mod proof;
pub mod rule;
pub mod rule_app;
pub mod rules;
pub mod schema;
pub mod sequent;
pub mod settings;
pub mod stop;
pub mod strategy;
pub mod subst;
pub mod term;
pub mod util;

use thiserror::Error;

pub use apply_strategy::{ApplyStrategy, ApplyStrategyInfo, CancellationToken, Outcome, StopReason};
#[cfg(feature = "bin")]
pub use cli::bin::*;
pub use executor::ExecutionError;
pub use proof::{GoalId, NodeId, Proof};
pub use rule_app::TacletApp;
pub use schema::{ProgramSort, SchemaVariable};
pub use sequent::{PosInOccurrence, Sequent, SequentFormula, Side};
pub use settings::{ChooserKind, StopMode, StrategySettings};
pub use subst::SubstError;
pub use rule::{GoalTemplate, Taclet, TacletBuilder, TacletError};
pub use term::{Function, LogicVariable, Sort, Term, TermBuilder};

pub type Symbol = symbol_table::GlobalSymbol;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Taclet(#[from] TacletError),
    #[error(transparent)]
    Subst(#[from] SubstError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("goal {0} is not open")]
    GoalNotOpen(GoalId),
    #[error("rule {0} may not be applied interactively")]
    NotInteractive(Symbol),
}
