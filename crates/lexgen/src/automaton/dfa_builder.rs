use std::{
    collections::{BTreeSet, VecDeque},
    sync::Arc,
};

use hashbrown::HashMap;
use tracing::debug;

use super::{Automaton, StateId};
use crate::{closure_builder::ClosureBuilder, dfa::Error};

/// Subset construction over an [`Automaton`] with epsilon edges
///
/// Each output state stands for the epsilon-closed set of input states it was
/// built from.  The empty set is collapsed into a single shared dead state,
/// which makes the output total over the input's alphabet.
#[derive(Debug)]
pub struct DfaBuilder<'a> {
    nfa: &'a Automaton,
    aggregate: bool,
    closure: ClosureBuilder<StateId>,
    memo: HashMap<StateId, BTreeSet<StateId>>,
    dfa: Automaton,
    states: HashMap<Arc<BTreeSet<StateId>>, StateId>,
    queue: VecDeque<(StateId, Arc<BTreeSet<StateId>>)>,
    dead: Option<StateId>,
}

impl<'a> DfaBuilder<'a> {
    /// Prepare a construction over `nfa`.  If `aggregate` is set, each
    /// accepting output state records the token names of every accepting
    /// input state it covers rather than just one of them.
    #[must_use]
    pub fn new(nfa: &'a Automaton, aggregate: bool) -> Self {
        Self {
            nfa,
            aggregate,
            closure: ClosureBuilder::default(),
            memo: HashMap::new(),
            dfa: Automaton::with_epsilon(nfa.epsilon()),
            states: HashMap::new(),
            queue: VecDeque::new(),
            dead: None,
        }
    }

    fn closure_of(&mut self, state: StateId) -> &BTreeSet<StateId> {
        let nfa = self.nfa;
        let closure = &mut self.closure;

        self.memo.entry(state).or_insert_with(|| {
            closure.init([state]);
            closure.solve(BTreeSet::new(), |n| nfa.state(n).nil_edges().iter().copied())
        })
    }

    fn dead_state(&mut self) -> StateId {
        if let Some(dead) = self.dead {
            return dead;
        }

        let dead = self.dfa.insert();
        for &c in self.nfa.alphabet() {
            self.dfa.connect(dead, dead, Some(c));
        }
        self.dead = Some(dead);
        dead
    }

    fn intern(&mut self, set: BTreeSet<StateId>) -> StateId {
        if set.is_empty() {
            return self.dead_state();
        }

        if let Some(&id) = self.states.get(&set) {
            return id;
        }

        let nfa = self.nfa;
        let accepting: Vec<StateId> = set.iter().copied().filter(|&n| nfa.is_accepting(n)).collect();

        let id = if accepting.is_empty() {
            self.dfa.insert()
        } else {
            let token = accepting.iter().find_map(|&n| nfa.state(n).token());
            let id = self.dfa.insert_accept(token.map(Into::into));

            if self.aggregate {
                self.dfa.add_tokens(
                    id,
                    accepting
                        .iter()
                        .flat_map(|&n| nfa.token_names(n))
                        .map(Into::into),
                );
            }

            id
        };

        let set = Arc::new(set);
        self.states.insert(Arc::clone(&set), id);
        self.queue.push_back((id, set));
        id
    }

    /// Run the construction.  The output's start state is always state 0.
    ///
    /// # Errors
    /// This method fails if the input automaton has no start state.
    pub fn build(mut self) -> Result<Automaton, Error> {
        let nfa = self.nfa;
        let start = nfa.start().ok_or(Error::MissingStart)?;

        self.dfa.set_regex(nfa.regex());
        for &c in nfa.alphabet() {
            self.dfa.add_symbol(c);
        }

        let head = self.closure_of(start).clone();
        let head = self.intern(head);
        self.dfa.set_start(head);

        while let Some((id, set)) = self.queue.pop_front() {
            for &c in nfa.alphabet() {
                let moved: Vec<StateId> = set
                    .iter()
                    .filter_map(|&n| nfa.state(n).next_states(c))
                    .flatten()
                    .copied()
                    .collect();

                let mut closed = BTreeSet::new();
                for n in moved {
                    closed.extend(self.closure_of(n).iter().copied());
                }

                let to = self.intern(closed);
                self.dfa.connect(id, to, Some(c));
            }
        }

        debug!(
            nfa_states = nfa.len(),
            dfa_states = self.dfa.len(),
            "Subset construction finished"
        );

        Ok(self.dfa)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::DfaBuilder;
    use crate::{automaton::Automaton, dfa::Error};

    fn build(nfa: &Automaton) -> Automaton { DfaBuilder::new(nfa, false).build().unwrap() }

    #[test]
    fn no_start() {
        assert!(matches!(
            DfaBuilder::new(&Automaton::new(), false).build(),
            Err(Error::MissingStart)
        ));
    }

    #[test]
    fn single_symbol() {
        let dfa = build(&Automaton::symbol('a'));
        assert_eq!(dfa.len(), 3);
        assert_eq!(dfa.start().map(|s| s.get()), Some(0));
        assert_eq!(dfa.accepting().count(), 1);
        assert!(dfa.is_total());
        assert!(dfa.matches("a"));
        assert!(!dfa.matches("aa"));
    }

    #[test]
    fn epsilon_only() {
        let dfa = build(&Automaton::empty_string());
        assert_eq!(dfa.len(), 1);
        assert!(dfa.is_accepting(dfa.start().unwrap()));
        assert!(dfa.alphabet().is_empty());
    }

    #[test]
    fn aggregated_tokens() {
        let mut kw = Automaton::literal("if");
        kw.set_token("if");
        let mut id = Automaton::symbol('i')
            .union(&Automaton::symbol('f'))
            .positive();
        id.set_token("id");

        let nfa = Automaton::union_all([&kw, &id]);
        let dfa = DfaBuilder::new(&nfa, true).build().unwrap();
        let end = dfa.walk("if").unwrap();
        assert_eq!(dfa.token_names(end).into_iter().collect::<Vec<_>>(), ["id", "if"]);
        let end = dfa.walk("fi").unwrap();
        assert_eq!(dfa.token_names(end).into_iter().collect::<Vec<_>>(), ["id"]);

        let plain = DfaBuilder::new(&nfa, false).build().unwrap();
        assert!(!plain.has_token_sets());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        #[test]
        fn language_preserved(input in "[abc]{0,8}") {
            let nfa = Automaton::literal("ab")
                .union(&Automaton::symbol('c'))
                .kleene()
                .concat(&Automaton::symbol('a').positive());
            let dfa = build(&nfa);

            prop_assert!(dfa.is_total());
            prop_assert_eq!(dfa.matches(&input), nfa.matches(&input));
            prop_assert_eq!(
                dfa.walk(&input).is_some_and(|s| dfa.is_accepting(s)),
                nfa.matches(&input)
            );
        }
    }
}
