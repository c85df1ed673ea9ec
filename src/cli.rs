#[cfg(feature = "bin")]
pub mod bin {
    use std::fmt::{Display, Formatter};
    use std::str::FromStr;
    use std::time::Duration;

    use clap::Parser;

    use crate::program::{boolean_sort, ProgramElement};
    use crate::term::{Function, LogicVariable, ProgramVariable, Term, TermBuilder};
    use crate::*;

    /// A bundled problem to run the prover on.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Problem {
        Propositional,
        Quantifier,
        Symbolic,
    }

    impl Display for Problem {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            match self {
                Problem::Propositional => write!(f, "propositional"),
                Problem::Quantifier => write!(f, "quantifier"),
                Problem::Symbolic => write!(f, "symbolic"),
            }
        }
    }

    impl FromStr for Problem {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "propositional" => Ok(Problem::Propositional),
                "quantifier" => Ok(Problem::Quantifier),
                "symbolic" => Ok(Problem::Symbolic),
                _ => Err(format!("Unknown problem: {s}")),
            }
        }
    }

    impl Problem {
        /// The sequent to prove and the rules to prove it with.
        pub fn build(&self) -> (Sequent, Vec<Taclet>) {
            let tb = TermBuilder;
            let pred = |name: &str| tb.cons(Function::predicate(name, 0));
            match self {
                Problem::Propositional => {
                    let (p, q, r) = (pred("p"), pred("q"), pred("r"));
                    // ((p -> q) & (q -> r)) -> (p -> r)
                    let goal = tb.imp(
                        tb.and(tb.imp(p.clone(), q.clone()), tb.imp(q, r.clone())),
                        tb.imp(p, r),
                    );
                    (Sequent::from_formulas([], [goal]), rules::propositional())
                }
                Problem::Quantifier => {
                    let s = Sort::new("s");
                    let x = LogicVariable::new("x", s);
                    let y = LogicVariable::new("y", s);
                    let p = Function::new("p", Sort::formula(), 1);
                    let q = Function::new("q", Sort::formula(), 1);
                    let at = |f: &Function, v: &LogicVariable| tb.func(f.clone(), [tb.var(*v)]);
                    // (\exists x; p(x)) & (\forall y; (p(y) -> q(y))) -> \exists x; q(x)
                    let goal = tb.imp(
                        tb.and(
                            tb.ex(x, at(&p, &x)),
                            tb.all(y, tb.imp(at(&p, &y), at(&q, &y))),
                        ),
                        tb.ex(x, at(&q, &x)),
                    );
                    (Sequent::from_formulas([], [goal]), rules::first_order())
                }
                Problem::Symbolic => {
                    let b = ProgramVariable::new("b", boolean_sort());
                    let prog = ProgramElement::block([ProgramElement::if_then_else(
                        ProgramElement::var(b),
                        ProgramElement::block([ProgramElement::skip()]),
                        ProgramElement::block([ProgramElement::skip(), ProgramElement::skip()]),
                    )]);
                    let goal: Term = tb.box_(prog, tb.tt());
                    (Sequent::from_formulas([], [goal]), rules::symbolic_execution())
                }
            }
        }
    }

    #[derive(Debug, Parser)]
    #[command(version, about = env!("CARGO_PKG_DESCRIPTION"))]
    struct Args {
        /// The bundled problem to prove
        #[clap(long, default_value_t = Problem::Propositional)]
        problem: Problem,
        /// Maximal number of rule applications
        #[clap(long, default_value = "10000")]
        max_steps: usize,
        /// Time limit of the search in milliseconds
        #[clap(long)]
        timeout_ms: Option<u64>,
        /// How the next goal is chosen
        #[clap(long, default_value_t = ChooserKind::DepthFirst)]
        chooser: ChooserKind,
        /// Also bound the symbolic execution steps of each goal
        #[clap(long, default_value_t = StopMode::AppliedRules)]
        stop_mode: StopMode,
        /// Symbolic execution steps per goal with `--stop-mode significant-steps`
        #[clap(long, default_value = "1000")]
        step_limit: usize,
        /// Give up as soon as a goal cannot be closed
        #[clap(long)]
        stop_at_first_non_closeable: bool,
        /// Print the open goals left after the search
        #[clap(long)]
        show_goals: bool,
    }

    /// Run the prover on a bundled problem with the options on the command line.
    #[allow(clippy::disallowed_macros)]
    pub fn cli() {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .format_timestamp(None)
            .format_target(false)
            .parse_default_env()
            .init();

        let args = Args::parse();
        let settings = StrategySettings {
            max_steps: args.max_steps,
            timeout: args.timeout_ms.map(Duration::from_millis),
            stop_mode: args.stop_mode,
            chooser: args.chooser,
            step_limit: args.step_limit,
            stop_at_first_non_closeable: args.stop_at_first_non_closeable,
            ..StrategySettings::default()
        };

        let (sequent, taclets) = args.problem.build();
        log::info!("Proving {sequent}");
        let mut proof = Proof::with_strategy(sequent, taclets, Box::new(settings.strategy()));
        let mut driver = ApplyStrategy::from_settings(&settings);
        let info = driver.run(&mut proof, &settings);
        println!("{info}");

        if args.show_goals {
            for &goal in proof.open_goals() {
                println!("{goal}: {}", proof.sequent(goal));
            }
        }
        if let Some(err) = info.error() {
            log::error!("{err}");
            std::process::exit(1)
        }
        if proof.is_closed() {
            println!("Proved.");
        } else {
            println!("{} goals remain open.", proof.open_goals().len());
            std::process::exit(2)
        }
    }
}
