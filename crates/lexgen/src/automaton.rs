use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    hash::{Hash, Hasher},
};

use crate::closure_builder::ClosureBuilder;

mod algebra;
mod dfa_builder;
pub mod store;

pub use dfa_builder::DfaBuilder;

/// The reserved literal used to spell epsilon transitions
pub const EPSILON: &str = "\\L";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct StateId(u32);

impl StateId {
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    #[inline]
    pub(crate) const fn index(self) -> usize { self.0 as usize }

    #[inline]
    const fn offset(self, by: u32) -> Self { Self(self.0 + by) }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A node of an [`Automaton`], owning its outgoing edges
///
/// Two states compare equal iff their ids do; the id is only meaningful
/// within the automaton that owns the state.
#[derive(Debug, Clone)]
pub struct State {
    id: StateId,
    accepting: bool,
    token: Option<String>,
    nil: BTreeSet<StateId>,
    edges: BTreeMap<char, BTreeSet<StateId>>,
}

impl State {
    fn new(id: StateId, accepting: bool, token: Option<String>) -> Self {
        Self {
            id,
            accepting,
            token,
            nil: BTreeSet::new(),
            edges: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> StateId { self.id }

    #[inline]
    #[must_use]
    pub fn is_accepting(&self) -> bool { self.accepting }

    /// The primary token name this state terminates, if any
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&str> { self.token.as_deref() }

    #[inline]
    #[must_use]
    pub fn nil_edges(&self) -> &BTreeSet<StateId> { &self.nil }

    #[inline]
    pub fn edges(&self) -> impl Iterator<Item = (char, &BTreeSet<StateId>)> {
        self.edges.iter().map(|(&c, to)| (c, to))
    }

    #[inline]
    #[must_use]
    pub fn next_states(&self, by: char) -> Option<&BTreeSet<StateId>> { self.edges.get(&by) }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering { self.id.cmp(&other.id) }
}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

/// A finite automaton over single characters, stored as an arena of states
/// indexed by [`StateId`]
///
/// Epsilon edges are kept separately from symbol edges, so the alphabet never
/// contains the epsilon symbol.  Accepting states may additionally carry a
/// set of token names, which is how one state of a combined scanner stands
/// for several overlapping rules at once.
#[derive(Debug, Clone)]
pub struct Automaton {
    states: Vec<State>,
    start: Option<StateId>,
    alphabet: BTreeSet<char>,
    epsilon: String,
    regex: String,
    tokens: BTreeMap<StateId, BTreeSet<String>>,
}

impl Default for Automaton {
    fn default() -> Self { Self::new() }
}

impl Automaton {
    #[must_use]
    pub fn new() -> Self { Self::with_epsilon(EPSILON) }

    #[must_use]
    pub fn with_epsilon(epsilon: impl Into<String>) -> Self {
        Self {
            states: Vec::new(),
            start: None,
            alphabet: BTreeSet::new(),
            epsilon: epsilon.into(),
            regex: String::new(),
            tokens: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize { self.states.len() }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.states.is_empty() }

    #[inline]
    #[must_use]
    pub fn start(&self) -> Option<StateId> { self.start }

    pub fn set_start(&mut self, id: StateId) {
        assert!(self.contains(id), "Start state {id} is not in the automaton");
        self.start = Some(id);
    }

    #[inline]
    #[must_use]
    pub fn epsilon(&self) -> &str { &self.epsilon }

    #[inline]
    #[must_use]
    pub fn regex(&self) -> &str { &self.regex }

    #[inline]
    pub fn set_regex(&mut self, regex: impl Into<String>) { self.regex = regex.into(); }

    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &BTreeSet<char> { &self.alphabet }

    #[inline]
    pub fn add_symbol(&mut self, symbol: char) { self.alphabet.insert(symbol); }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: StateId) -> bool { id.index() < self.states.len() }

    fn next_id(&self) -> StateId {
        StateId(
            u32::try_from(self.states.len())
                .unwrap_or_else(|_| panic!("Automaton exceeded {} states", u32::MAX)),
        )
    }

    /// Add a fresh non-accepting state
    pub fn insert(&mut self) -> StateId {
        let id = self.next_id();
        self.states.push(State::new(id, false, None));
        id
    }

    /// Add a fresh accepting state with an optional primary token
    pub fn insert_accept(&mut self, token: Option<String>) -> StateId {
        let id = self.next_id();
        self.states.push(State::new(id, true, token));
        id
    }

    /// Look up a state by id
    ///
    /// # Panics
    /// This method panics if `id` does not belong to this automaton, which
    /// always indicates a broken internal invariant.
    #[must_use]
    pub fn state(&self, id: StateId) -> &State {
        self.states
            .get(id.index())
            .unwrap_or_else(|| panic!("State {id} not found in automaton"))
    }

    fn state_mut(&mut self, id: StateId) -> &mut State {
        self.states
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("State {id} not found in automaton"))
    }

    #[inline]
    pub fn states(&self) -> std::slice::Iter<'_, State> { self.states.iter() }

    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = StateId> + use<> {
        (0..self.next_id().0).map(StateId)
    }

    #[inline]
    #[must_use]
    pub fn is_accepting(&self, id: StateId) -> bool { self.state(id).accepting }

    #[inline]
    pub fn accepting(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states.iter().filter(|s| s.accepting).map(|s| s.id)
    }

    /// Promote or demote a state; demoted states lose every token name
    pub fn set_accepting(&mut self, id: StateId, accepting: bool) {
        let state = self.state_mut(id);
        state.accepting = accepting;

        if !accepting {
            state.token = None;
            self.tokens.remove(&id);
        }
    }

    /// Add an edge, returning whether it was new.  `None` denotes an epsilon
    /// edge.
    pub fn connect(&mut self, from: StateId, to: StateId, by: Option<char>) -> bool {
        assert!(self.contains(to), "State {to} not found in automaton");
        let from = self.state_mut(from);

        if let Some(c) = by {
            let fresh = from.edges.entry(c).or_default().insert(to);
            self.alphabet.insert(c);
            fresh
        } else {
            from.nil.insert(to)
        }
    }

    /// The destinations reachable from `from` by reading `by`, or by an epsilon
    /// edge if `by` is `None`
    #[must_use]
    pub fn next_states(&self, from: StateId, by: Option<char>) -> Option<&BTreeSet<StateId>> {
        let state = self.state(from);
        match by {
            Some(c) => state.edges.get(&c),
            None => Some(&state.nil),
        }
    }

    /// Take a single deterministic step
    #[inline]
    #[must_use]
    pub fn next(&self, from: StateId, by: char) -> Option<StateId> {
        self.state(from)
            .edges
            .get(&by)
            .and_then(|s| s.first())
            .copied()
    }

    /// Every edge as a `(from, symbol, to)` triple, epsilon edges as `None`,
    /// ordered by source state
    pub fn transitions(&self) -> impl Iterator<Item = (StateId, Option<char>, StateId)> + '_ {
        self.states.iter().flat_map(|s| {
            s.nil
                .iter()
                .map(move |&t| (s.id, None, t))
                .chain(
                    s.edges
                        .iter()
                        .flat_map(move |(&c, to)| to.iter().map(move |&t| (s.id, Some(c), t))),
                )
        })
    }

    /// Mark every accepting state as terminating `name` alone
    pub fn set_token(&mut self, name: &str) {
        for state in self.states.iter_mut().filter(|s| s.accepting) {
            state.token = Some(name.into());
        }
        self.tokens.clear();
    }

    /// Set the primary token of a single accepting state
    pub fn set_state_token(&mut self, id: StateId, name: impl Into<String>) {
        let state = self.state_mut(id);
        assert!(state.accepting, "Cannot attach a token to non-accepting state {id}");
        state.token = Some(name.into());
    }

    /// Extend the token set of an accepting state
    pub fn add_tokens<I: IntoIterator<Item = String>>(&mut self, id: StateId, names: I) {
        let state = self.state_mut(id);
        assert!(state.accepting, "Cannot attach tokens to non-accepting state {id}");
        let set = self.tokens.entry(id).or_default();
        set.extend(names);

        if set.is_empty() {
            self.tokens.remove(&id);
        }
    }

    #[inline]
    #[must_use]
    pub fn token_set(&self, id: StateId) -> Option<&BTreeSet<String>> { self.tokens.get(&id) }

    #[inline]
    #[must_use]
    pub fn has_token_sets(&self) -> bool { !self.tokens.is_empty() }

    /// Every token name state `id` can terminate: its token set, or failing
    /// that its primary token
    #[must_use]
    pub fn token_names(&self, id: StateId) -> BTreeSet<&str> {
        match self.tokens.get(&id) {
            Some(set) => set.iter().map(String::as_str).collect(),
            None => self.state(id).token().into_iter().collect(),
        }
    }

    /// Whether the automaton has no epsilon edges and at most one destination
    /// per state and symbol
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.states
            .iter()
            .all(|s| s.nil.is_empty() && s.edges.values().all(|t| t.len() <= 1))
    }

    /// Whether every state has exactly one transition on every symbol
    #[must_use]
    pub fn is_total(&self) -> bool {
        self.is_deterministic()
            && self.states.iter().all(|s| {
                self.alphabet
                    .iter()
                    .all(|c| s.edges.get(c).is_some_and(|t| t.len() == 1))
            })
    }

    /// Run the automaton over `input`, following epsilon edges, and report
    /// whether it ends in an accepting state
    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        let Some(start) = self.start else {
            return false;
        };

        let nil = |n: StateId| self.state(n).nil.iter().copied();
        let mut closure = ClosureBuilder::default();
        closure.init([start]);
        let mut current = closure.solve(BTreeSet::new(), nil);

        for c in input.chars() {
            closure.init(
                current
                    .iter()
                    .filter_map(|&n| self.state(n).edges.get(&c))
                    .flatten()
                    .copied(),
            );
            current = closure.solve(BTreeSet::new(), nil);

            if current.is_empty() {
                return false;
            }
        }

        current.iter().any(|&n| self.is_accepting(n))
    }

    /// Follow deterministic transitions over all of `input`
    #[must_use]
    pub fn walk(&self, input: &str) -> Option<StateId> {
        input
            .chars()
            .try_fold(self.start?, |state, c| self.next(state, c))
    }

    /// The dense state × symbol view of a deterministic automaton, with
    /// columns in alphabet order
    #[must_use]
    pub fn transition_table(&self) -> Vec<Vec<Option<StateId>>> {
        self.states
            .iter()
            .map(|s| self.alphabet.iter().map(|&c| self.next(s.id, c)).collect())
            .collect()
    }

    /// Copy every state of `other` into this automaton, shifting its ids past
    /// the ones already allocated, and return the shift
    fn absorb(&mut self, other: &Self) -> u32 {
        let offset = self.next_id().get();

        self.states.extend(other.states.iter().map(|s| State {
            id: s.id.offset(offset),
            accepting: s.accepting,
            token: s.token.clone(),
            nil: s.nil.iter().map(|n| n.offset(offset)).collect(),
            edges: s
                .edges
                .iter()
                .map(|(&c, to)| (c, to.iter().map(|n| n.offset(offset)).collect()))
                .collect(),
        }));
        self.alphabet.extend(other.alphabet.iter().copied());
        self.tokens.extend(
            other
                .tokens
                .iter()
                .map(|(id, set)| (id.offset(offset), set.clone())),
        );

        offset
    }

    fn expect_start(&self) -> StateId {
        self.start
            .unwrap_or_else(|| panic!("Automaton for {:?} has no start state", self.regex))
    }
}
