//! The proof tree and its open goals.
//!
//! Nodes live in an arena and are never removed. Every open goal points at a
//! leaf node and owns the rule-application index and queue for that leaf. A
//! goal keeps its id when a rule application turns it into the first of its
//! successors, so schedulers can keep per-goal state across steps.
use log::{debug, trace};
use smallvec::SmallVec;

use crate::executor::TacletExecutor;
use crate::feature::{FeatureContext, RuleAppCost};
use crate::id::{Arena, Id, IdMap};
use crate::index::{RuleAppIndex, RuleAppQueue, TacletIndex};
use crate::rule_app::TacletApp;
use crate::sequent::{PosInOccurrence, Sequent};
use crate::strategy::{DefaultStrategy, Strategy};
use crate::rule::Taclet;
use crate::term::{Operator, QuantifiableVariable, Term};
use crate::util::{HashSet, SymbolGen};
use crate::{Error, Symbol};

crate::define_id!(pub NodeId, "a node of the proof tree");
crate::define_id!(pub GoalId, "an open goal of a proof");

/// The names in use in a proof. Fresh constants introduced by rules are
/// checked against it, and registered in it.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    used: HashSet<Symbol>,
    gen: SymbolGen,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: Symbol) {
        self.used.insert(name);
    }

    pub fn is_unused(&self, name: Symbol) -> bool {
        !self.used.contains(&name)
    }

    /// Register every function, variable and program variable name in `t`.
    pub fn register_term(&mut self, t: &Term) {
        t.visit_preorder(&mut |sub| {
            match sub.op() {
                Operator::Function(f) => self.register(f.name()),
                Operator::Var(lv) => self.register(lv.name()),
                Operator::ProgramVariable(pv) => self.register(pv.name()),
                _ => {}
            }
            for bound in sub.bound_lists().iter().flatten() {
                if let QuantifiableVariable::Logic(lv) = bound {
                    self.register(lv.name());
                }
            }
        });
    }

    pub fn register_sequent(&mut self, seq: &Sequent) {
        for (_, sf) in seq.formulas() {
            self.register_term(sf.formula());
        }
    }

    /// A name `{stem}_{n}` not used anywhere in the proof. The name is
    /// registered before it is returned.
    pub fn fresh_name(&mut self, stem: &str) -> Symbol {
        loop {
            let name = self.gen.fresh(stem);
            if self.is_unused(name) {
                self.register(name);
                return name;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 2]>,
    sequent: Sequent,
    app: Option<TacletApp>,
    closed: bool,
    branch_label: Option<Symbol>,
}

impl Node {
    fn new(parent: Option<NodeId>, sequent: Sequent, branch_label: Option<Symbol>) -> Self {
        Self {
            parent,
            children: SmallVec::new(),
            sequent,
            app: None,
            closed: false,
            branch_label,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn sequent(&self) -> &Sequent {
        &self.sequent
    }

    /// The rule application performed on this node, if any.
    pub fn app(&self) -> Option<&TacletApp> {
        self.app.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn branch_label(&self) -> Option<Symbol> {
        self.branch_label
    }
}

#[derive(Debug)]
pub struct Goal {
    node: NodeId,
    automatic: bool,
    index: RuleAppIndex,
    queue: RuleAppQueue,
}

impl Goal {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether automatic search may work on this goal.
    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    pub fn rule_app_index(&self) -> &RuleAppIndex {
        &self.index
    }
}

pub struct Proof {
    nodes: Arena<NodeId, Node>,
    goals: IdMap<GoalId, Goal>,
    /// Open goals in tree order.
    open: Vec<GoalId>,
    next_goal: usize,
    taclets: TacletIndex,
    strategy: Box<dyn Strategy>,
    namespace: Namespace,
}

impl Proof {
    /// A proof of `root` with the default strategy.
    pub fn new(root: Sequent, taclets: impl IntoIterator<Item = Taclet>) -> Self {
        Self::with_strategy(root, taclets, Box::new(DefaultStrategy::default()))
    }

    pub fn with_strategy(
        root: Sequent,
        taclets: impl IntoIterator<Item = Taclet>,
        strategy: Box<dyn Strategy>,
    ) -> Self {
        let mut index = TacletIndex::new();
        index.add_all(taclets);
        let mut namespace = Namespace::new();
        namespace.register_sequent(&root);
        let goal_index = RuleAppIndex::new(&index, &root);
        let mut nodes = Arena::default();
        let node = nodes.push(Node::new(None, root, None));
        let mut goals = IdMap::new();
        let goal = GoalId::from_index(0);
        goals.insert(
            goal,
            Goal {
                node,
                automatic: true,
                index: goal_index,
                queue: RuleAppQueue::default(),
            },
        );
        Self {
            nodes,
            goals,
            open: vec![goal],
            next_goal: 1,
            taclets: index,
            strategy,
            namespace,
        }
    }

    /// Replace the strategy. All queues are rebuilt on next use.
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = strategy;
        for &g in &self.open {
            if let Some(goal) = self.goals.get_mut(g) {
                goal.queue.invalidate();
            }
        }
    }

    pub fn strategy(&self) -> &dyn Strategy {
        &*self.strategy
    }

    pub fn taclets(&self) -> &TacletIndex {
        &self.taclets
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    pub fn root(&self) -> NodeId {
        NodeId::from_index(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Open goals in tree order.
    pub fn open_goals(&self) -> &[GoalId] {
        &self.open
    }

    pub fn is_open(&self, goal: GoalId) -> bool {
        self.goals.contains_key(goal)
    }

    pub fn get_goal(&self, goal: GoalId) -> Option<&Goal> {
        self.goals.get(goal)
    }

    /// # Panics
    ///
    /// If `goal` is not open.
    pub fn goal(&self, goal: GoalId) -> &Goal {
        match self.goals.get(goal) {
            Some(g) => g,
            None => panic!("goal {goal} is not open"),
        }
    }

    pub fn sequent(&self, goal: GoalId) -> &Sequent {
        self.nodes[self.goal(goal).node].sequent()
    }

    pub fn is_closed(&self) -> bool {
        self.nodes[self.root()].closed
    }

    pub fn set_automatic(&mut self, goal: GoalId, automatic: bool) -> Result<(), Error> {
        let g = self.goals.get_mut(goal).ok_or(Error::GoalNotOpen(goal))?;
        g.automatic = automatic;
        Ok(())
    }

    fn queue_entries(&self, goal: GoalId) -> Vec<(RuleAppCost, TacletApp)> {
        let Some(g) = self.goals.get(goal) else {
            return Vec::new();
        };
        let seq = self.nodes[g.node].sequent();
        let ctx = FeatureContext {
            proof: self,
            node: g.node,
        };
        let mut entries = Vec::new();
        for app in g.index.apps() {
            if !app.taclet().is_automatic() {
                continue;
            }
            if self.strategy.compute_cost(app, app.pos(), &ctx).is_top() {
                continue;
            }
            for complete in self.strategy.instantiate_app(app, seq, &ctx) {
                let cost = self.strategy.compute_cost(&complete, complete.pos(), &ctx);
                if !cost.is_top() {
                    entries.push((cost, complete));
                }
            }
        }
        entries
    }

    fn ensure_queue(&mut self, goal: GoalId) {
        match self.goals.get(goal) {
            Some(g) if !g.queue.is_valid() => {}
            _ => return,
        }
        let entries = self.queue_entries(goal);
        trace!("rebuilt queue of goal {goal}: {} applications", entries.len());
        if let Some(g) = self.goals.get_mut(goal) {
            g.queue.fill(entries);
        }
    }

    /// The cheapest application for `goal`, without removing it.
    pub fn peek_next(&mut self, goal: GoalId) -> Option<&TacletApp> {
        self.ensure_queue(goal);
        self.goals.get(goal)?.queue.peek().map(|(_, app)| app)
    }

    /// The cost of the cheapest application for `goal`.
    pub fn peek_cost(&mut self, goal: GoalId) -> Option<RuleAppCost> {
        self.ensure_queue(goal);
        self.goals.get(goal)?.queue.peek().map(|(cost, _)| cost)
    }

    /// Remove and return the cheapest application the strategy approves of.
    pub fn next_app(&mut self, goal: GoalId) -> Option<TacletApp> {
        self.ensure_queue(goal);
        let node = self.goals.get(goal)?.node;
        loop {
            let (cost, app) = self.goals.get_mut(goal)?.queue.pop()?;
            let ctx = FeatureContext { proof: self, node };
            if self.strategy.is_approved(&app, &ctx) {
                debug!("goal {goal}: next {app} at cost {cost}");
                return Some(app);
            }
        }
    }

    /// Apply a complete rule application to `goal` and return the goals that
    /// replace it. The first successor keeps the id `goal`; an empty result
    /// means the goal was closed.
    pub fn apply(&mut self, goal: GoalId, app: TacletApp) -> Result<Vec<GoalId>, Error> {
        let node = self.goals.get(goal).ok_or(Error::GoalNotOpen(goal))?.node;
        let successors = {
            let seq = self.nodes[node].sequent();
            TacletExecutor::new(&mut self.namespace).execute(&app, seq)?
        };
        debug!("goal {goal}: applied {app}, {} successors", successors.len());
        self.nodes[node].app = Some(app);

        if successors.is_empty() {
            self.close_goal(goal);
            return Ok(Vec::new());
        }

        let Some(old) = self.goals.take(goal) else {
            return Err(Error::GoalNotOpen(goal));
        };
        let mut ids = Vec::with_capacity(successors.len());
        for (i, succ) in successors.into_iter().enumerate() {
            let child = self
                .nodes
                .push(Node::new(Some(node), succ.change.sequent.clone(), succ.label));
            self.nodes[node].children.push(child);
            let mut index = old.index.clone();
            index.update(&self.taclets, &succ.change);
            let id = if i == 0 { goal } else { self.fresh_goal_id() };
            self.goals.insert(
                id,
                Goal {
                    node: child,
                    automatic: old.automatic,
                    index,
                    queue: RuleAppQueue::default(),
                },
            );
            ids.push(id);
        }
        if let Some(at) = self.open.iter().position(|g| *g == goal) {
            self.open.splice(at + 1..at + 1, ids[1..].iter().copied());
        }
        Ok(ids)
    }

    fn fresh_goal_id(&mut self) -> GoalId {
        let id = GoalId::from_index(self.next_goal);
        self.next_goal += 1;
        id
    }

    fn close_goal(&mut self, goal: GoalId) {
        let Some(g) = self.goals.take(goal) else {
            return;
        };
        self.open.retain(|other| *other != goal);
        let mut cur = Some(g.node);
        while let Some(id) = cur {
            let node = &self.nodes[id];
            if !node.children.iter().all(|c| self.nodes[*c].closed) {
                break;
            }
            self.nodes[id].closed = true;
            cur = self.nodes[id].parent;
        }
        debug!("closed goal {goal}");
    }

    /// Every application a user could choose at `pos` (or among the rules
    /// without a focus, if `pos` is `None`). Assumes parts are completed
    /// against the goal's sequent; schema variables that need external
    /// instantiation may still be open.
    pub fn applicable_apps(&self, goal: GoalId, pos: Option<&PosInOccurrence>) -> Vec<TacletApp> {
        let Some(g) = self.goals.get(goal) else {
            return Vec::new();
        };
        let seq = self.nodes[g.node].sequent();
        g.index
            .apps_at(pos)
            .filter(|app| app.taclet().attributes().interactive)
            .filter_map(|app| app.find_assumes(seq))
            .collect()
    }

    /// Apply an application chosen by a user.
    pub fn apply_interactive(
        &mut self,
        goal: GoalId,
        app: TacletApp,
    ) -> Result<Vec<GoalId>, Error> {
        if !app.taclet().attributes().interactive {
            return Err(Error::NotInteractive(app.rule_name()));
        }
        self.apply(goal, app)
    }
}

impl std::fmt::Debug for Proof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proof")
            .field("nodes", &self.nodes.len())
            .field("open", &self.open)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;
    use crate::sequent::Side;
    use crate::term::{Function, Sort, TermBuilder};

    fn pred(name: &str) -> Term {
        TermBuilder.cons(Function::predicate(name, 0))
    }

    #[test]
    fn fresh_names_skip_used_ones() {
        let mut ns = Namespace::new();
        ns.register(Symbol::from("c_0"));
        assert_eq!(ns.fresh_name("c"), Symbol::from("c_1"));
        assert!(!ns.is_unused(Symbol::from("c_1")));
        assert_eq!(ns.fresh_name("c"), Symbol::from("c_2"));
    }

    #[test]
    fn register_term_sees_constants() {
        let tb = TermBuilder;
        let mut ns = Namespace::new();
        let c = tb.cons(Function::constant("k", Sort::new("s")));
        ns.register_term(&tb.equals(c.clone(), c));
        assert!(!ns.is_unused(Symbol::from("k")));
    }

    #[test]
    fn split_keeps_first_goal_id() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.or(pred("p"), pred("q"))], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let goal = proof.open_goals()[0];
        let app = proof.next_app(goal).unwrap();
        assert_eq!(app.rule_name(), Symbol::from("orLeft"));
        let goals = proof.apply(goal, app).unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0], goal);
        assert_eq!(proof.open_goals(), &goals[..]);
        assert_eq!(proof.sequent(goals[0]).to_string(), "p ==>");
        assert_eq!(proof.sequent(goals[1]).to_string(), "q ==>");
        let root = proof.root();
        assert_eq!(proof.node(root).children().len(), 2);
    }

    #[test]
    fn closing_propagates_to_root() {
        let tb = TermBuilder;
        let p = pred("p");
        let seq = Sequent::from_formulas([p.clone()], [tb.and(p.clone(), p)]);
        let mut proof = Proof::new(seq, rules::propositional());
        while let Some(&goal) = proof.open_goals().first() {
            let app = proof.next_app(goal).unwrap();
            proof.apply(goal, app).unwrap();
        }
        assert!(proof.is_closed());
        assert!(proof.get_goal(GoalId::from_index(0)).is_none());
    }

    #[test]
    fn queue_is_rebuilt_after_change() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([tb.and(pred("a"), tb.and(pred("b"), pred("c")))], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let goal = proof.open_goals()[0];
        let app = proof.next_app(goal).unwrap();
        proof.apply(goal, app).unwrap();
        let next = proof.peek_next(goal).unwrap();
        assert_eq!(next.rule_name(), Symbol::from("andLeft"));
        let focus = next.pos().unwrap();
        assert_eq!(focus.side(), Side::Antec);
        assert_eq!(focus.subterm().to_string(), "(b & c)");
    }

    #[test]
    fn interactive_queries_offer_cut() {
        let tb = TermBuilder;
        let seq = Sequent::from_formulas([], [pred("p")]);
        let mut proof = Proof::new(seq, rules::propositional());
        let goal = proof.open_goals()[0];
        assert!(proof.next_app(goal).is_none());
        let apps = proof.applicable_apps(goal, None);
        let cut = apps.iter().find(|a| a.rule_name() == Symbol::from("cut")).unwrap();
        assert!(!cut.is_complete());
        let phi = cut.uninstantiated_vars()[0].clone();
        let cut = cut.add_instantiation(&phi, pred("q")).unwrap();
        let goals = proof.apply_interactive(goal, cut).unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(proof.sequent(goals[0]).to_string(), "q ==> p");
        assert_eq!(proof.sequent(goals[1]).to_string(), "==> q, p");
    }

    #[test]
    fn non_automatic_goal_flag() {
        let seq = Sequent::from_formulas([pred("p")], []);
        let mut proof = Proof::new(seq, rules::propositional());
        let goal = proof.open_goals()[0];
        proof.set_automatic(goal, false).unwrap();
        assert!(!proof.goal(goal).is_automatic());
        assert!(proof.set_automatic(GoalId::from_index(7), true).is_err());
    }
}
