//! Transition systems and featured transition systems.
//!
//! A [`TransitionSystem`] is built once through a [`TransitionSystemBuilder`]
//! and is read-only afterwards. States, actions and transitions keep their
//! insertion order, and both the forward and the backward adjacency are
//! stored, so coverage criteria can enumerate incoming/outgoing pairs.
//!
//! A [`FeaturedTransitionSystem`] adds a guard to every transition: the
//! feature expression a product must satisfy to be able to fire it.
//!
//! ```
//! use fts_rs::fexpr::FExpression;
//! use fts_rs::ts::FeaturedTransitionSystemBuilder;
//!
//! let mut builder = FeaturedTransitionSystemBuilder::new("idle");
//! builder.add_transition("idle", "pay", "paid", FExpression::true_value());
//! let serve = builder.add_transition("paid", "serve", "idle", FExpression::feature_expr("Tea"));
//! let fts = builder.build();
//!
//! assert_eq!(fts.ts().state_count(), 2);
//! assert_eq!(fts.guard(&serve).to_string(), "Tea");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::fexpr::FExpression;

macro_rules! label {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(name: impl AsRef<str>) -> Self {
                Self(Arc::from(name.as_ref()))
            }

            pub fn name(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<&$name> for $name {
            fn from(value: &$name) -> Self {
                value.clone()
            }
        }
    };
}

label!(
    /// A state, identified by its name.
    State
);
label!(
    /// An action label, identified by its name.
    Action
);

/// A labelled edge `source -action-> target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition {
    pub source: State,
    pub action: Action,
    pub target: State,
}

impl Transition {
    pub fn new(source: impl Into<State>, action: impl Into<Action>, target: impl Into<State>) -> Self {
        Self {
            source: source.into(),
            action: action.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source, self.action, self.target)
    }
}

#[derive(Debug, Clone)]
pub struct TransitionSystem {
    initial: State,
    states: Vec<State>,
    actions: Vec<Action>,
    transitions: Vec<Transition>,
    known: HashSet<Transition>,
    outgoing: HashMap<State, Vec<usize>>,
    incoming: HashMap<State, Vec<usize>>,
}

impl TransitionSystem {
    pub fn initial_state(&self) -> &State {
        &self.initial
    }

    /// All states, in insertion order. The initial state comes first.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name() == name)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn contains_state(&self, state: &State) -> bool {
        self.outgoing.contains_key(state)
    }

    pub fn contains_transition(&self, transition: &Transition) -> bool {
        self.known.contains(transition)
    }

    fn adjacent<'a>(
        &'a self,
        map: &'a HashMap<State, Vec<usize>>,
        state: &State,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        map.get(state)
            .into_iter()
            .flatten()
            .map(move |&i| &self.transitions[i])
    }

    /// Transitions leaving `state`, in insertion order.
    pub fn outgoing(&self, state: &State) -> impl Iterator<Item = &Transition> + '_ {
        self.adjacent(&self.outgoing, state)
    }

    /// Transitions entering `state`, in insertion order.
    pub fn incoming(&self, state: &State) -> impl Iterator<Item = &Transition> + '_ {
        self.adjacent(&self.incoming, state)
    }

    pub fn outgoing_with<'a>(&'a self, state: &State, action: &'a Action) -> impl Iterator<Item = &'a Transition> + 'a {
        self.outgoing(state).filter(move |t| &t.action == action)
    }
}

/// Incremental construction of a [`TransitionSystem`].
///
/// Endpoints and actions of added transitions are registered automatically.
/// Adding the same transition twice has no effect.
#[derive(Debug, Clone)]
pub struct TransitionSystemBuilder {
    ts: TransitionSystem,
}

impl TransitionSystemBuilder {
    pub fn new(initial: impl Into<State>) -> Self {
        let initial = initial.into();
        let mut builder = Self {
            ts: TransitionSystem {
                initial: initial.clone(),
                states: Vec::new(),
                actions: Vec::new(),
                transitions: Vec::new(),
                known: HashSet::new(),
                outgoing: HashMap::new(),
                incoming: HashMap::new(),
            },
        };
        builder.add_state(initial);
        builder
    }

    pub fn add_state(&mut self, state: impl Into<State>) -> State {
        let state = state.into();
        if !self.ts.outgoing.contains_key(&state) {
            self.ts.outgoing.insert(state.clone(), Vec::new());
            self.ts.incoming.insert(state.clone(), Vec::new());
            self.ts.states.push(state.clone());
        }
        state
    }

    pub fn add_action(&mut self, action: impl Into<Action>) -> Action {
        let action = action.into();
        if !self.ts.actions.contains(&action) {
            self.ts.actions.push(action.clone());
        }
        action
    }

    pub fn add_transition(
        &mut self,
        source: impl Into<State>,
        action: impl Into<Action>,
        target: impl Into<State>,
    ) -> Transition {
        let source = self.add_state(source);
        let action = self.add_action(action);
        let target = self.add_state(target);
        let transition = Transition { source, action, target };
        if self.ts.known.insert(transition.clone()) {
            let i = self.ts.transitions.len();
            self.ts.transitions.push(transition.clone());
            if let Some(out) = self.ts.outgoing.get_mut(&transition.source) {
                out.push(i);
            }
            if let Some(inc) = self.ts.incoming.get_mut(&transition.target) {
                inc.push(i);
            }
        }
        transition
    }

    pub fn build(self) -> TransitionSystem {
        debug!(
            "Built transition system with {} states, {} actions, {} transitions",
            self.ts.state_count(),
            self.ts.action_count(),
            self.ts.transition_count()
        );
        self.ts
    }
}

/// A transition system whose transitions are guarded by feature expressions.
#[derive(Debug, Clone)]
pub struct FeaturedTransitionSystem {
    ts: TransitionSystem,
    guards: HashMap<Transition, FExpression>,
}

impl FeaturedTransitionSystem {
    pub fn ts(&self) -> &TransitionSystem {
        &self.ts
    }

    /// Guard of `transition`; `true` when none was given.
    pub fn guard(&self, transition: &Transition) -> FExpression {
        self.guards.get(transition).cloned().unwrap_or_default()
    }

    /// Transitions whose guard is not the constant `true`.
    pub fn guarded_transitions(&self) -> impl Iterator<Item = (&Transition, &FExpression)> {
        self.ts
            .transitions()
            .iter()
            .filter_map(|t| self.guards.get(t).map(|g| (t, g)))
            .filter(|(_, g)| !g.is_true())
    }
}

impl AsRef<TransitionSystem> for FeaturedTransitionSystem {
    fn as_ref(&self) -> &TransitionSystem {
        &self.ts
    }
}

impl AsRef<TransitionSystem> for TransitionSystem {
    fn as_ref(&self) -> &TransitionSystem {
        self
    }
}

/// Every transition is guarded by `true`.
impl From<TransitionSystem> for FeaturedTransitionSystem {
    fn from(ts: TransitionSystem) -> Self {
        Self {
            ts,
            guards: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeaturedTransitionSystemBuilder {
    inner: TransitionSystemBuilder,
    guards: HashMap<Transition, FExpression>,
}

impl FeaturedTransitionSystemBuilder {
    pub fn new(initial: impl Into<State>) -> Self {
        Self {
            inner: TransitionSystemBuilder::new(initial),
            guards: HashMap::new(),
        }
    }

    pub fn add_state(&mut self, state: impl Into<State>) -> State {
        self.inner.add_state(state)
    }

    pub fn add_action(&mut self, action: impl Into<Action>) -> Action {
        self.inner.add_action(action)
    }

    /// Add a guarded transition. A transition added twice is guarded by the
    /// disjunction of its guards.
    pub fn add_transition(
        &mut self,
        source: impl Into<State>,
        action: impl Into<Action>,
        target: impl Into<State>,
        guard: FExpression,
    ) -> Transition {
        let transition = self.inner.add_transition(source, action, target);
        match self.guards.get_mut(&transition) {
            Some(existing) => existing.or_with(guard),
            None => {
                self.guards.insert(transition.clone(), guard);
            }
        }
        transition
    }

    pub fn build(self) -> FeaturedTransitionSystem {
        let ts = self.inner.build();
        debug!("{} guarded transitions", self.guards.values().filter(|g| !g.is_true()).count());
        FeaturedTransitionSystem {
            ts,
            guards: self.guards,
        }
    }
}
