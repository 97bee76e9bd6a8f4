use crate::{
    PriorityTable,
    automaton::{Automaton, DfaBuilder, StateId, store},
};

mod minimize;
mod scanner;

pub use scanner::{Scanner, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Automaton has no start state")]
    MissingStart,
    #[error("State {0} has an epsilon transition")]
    EpsilonEdge(StateId),
    #[error("State {0} has more than one transition on {1:?}")]
    Nondeterministic(StateId, char),
}

/// A deterministic automaton recognizing the language of a single rule
#[derive(Debug, Clone)]
#[repr(transparent)]
pub struct Dfa(Automaton);

impl Dfa {
    /// Determinize `nfa` by subset construction
    ///
    /// # Errors
    /// This function fails if `nfa` has no start state.
    pub fn from_nfa(nfa: &Automaton) -> Result<Self, Error> {
        DfaBuilder::new(nfa, false).build().map(Self)
    }

    /// Merge every pair of states no input string can tell apart
    #[must_use]
    pub fn minimize(&self) -> Self { Self(minimize::run(&self.0)) }

    #[inline]
    #[must_use]
    pub fn as_automaton(&self) -> &Automaton { &self.0 }

    #[inline]
    #[must_use]
    pub fn into_automaton(self) -> Automaton { self.0 }

    #[inline]
    pub fn set_token(&mut self, name: &str) { self.0.set_token(name); }

    #[inline]
    pub fn set_regex(&mut self, regex: impl Into<String>) { self.0.set_regex(regex); }

    #[must_use]
    pub fn accepts(&self, input: &str) -> bool {
        self.0.walk(input).is_some_and(|s| self.0.is_accepting(s))
    }
}

/// The combined automaton driving a [`Scanner`]
///
/// Accepting states carry the set of every token they may terminate.  There
/// is deliberately no way to minimize one, as merging states would conflate
/// their token sets.
#[derive(Debug, Clone)]
#[repr(transparent)]
pub struct LexerDfa(Automaton);

impl LexerDfa {
    /// Determinize the union of every token automaton
    ///
    /// # Errors
    /// This function fails if `nfa` has no start state.
    pub fn from_nfa(nfa: &Automaton) -> Result<Self, Error> {
        DfaBuilder::new(nfa, true).build().map(Self)
    }

    /// Wrap an automaton, checking that it is deterministic and has a start
    /// state
    ///
    /// # Errors
    /// This function fails if `automaton` has no start state, has an epsilon
    /// edge, or has two destinations for one symbol.
    pub fn from_automaton(automaton: Automaton) -> Result<Self, Error> {
        let Some(start) = automaton.start() else {
            return Err(Error::MissingStart);
        };
        debug_assert!(automaton.contains(start));

        for state in automaton.states() {
            if !state.nil_edges().is_empty() {
                return Err(Error::EpsilonEdge(state.id()));
            }

            if let Some((c, _)) = state.edges().find(|(_, to)| to.len() > 1) {
                return Err(Error::Nondeterministic(state.id(), c));
            }
        }

        Ok(Self(automaton))
    }

    /// Parse an automaton from its text store form
    ///
    /// # Errors
    /// This function fails if the stored automaton is not a valid scanner.
    pub fn load(text: &str) -> Result<Self, Error> { Self::from_automaton(store::decode(text)) }

    /// Render the text store form
    #[must_use]
    pub fn store(&self) -> String { self.0.to_string() }

    /// Render the JSON interchange form
    ///
    /// # Errors
    /// This method fails if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> { store::to_json(&self.0) }

    #[inline]
    #[must_use]
    pub fn start(&self) -> StateId { self.0.start().unwrap_or_else(|| unreachable!()) }

    #[inline]
    #[must_use]
    pub fn as_automaton(&self) -> &Automaton { &self.0 }

    #[inline]
    #[must_use]
    pub fn scanner<'a>(&'a self, priorities: &PriorityTable, text: &'a str) -> Scanner<'a> {
        Scanner::new(self, priorities, text)
    }
}

#[cfg(test)]
mod test {
    use super::{Dfa, Error, LexerDfa};
    use crate::automaton::{Automaton, StateId};

    #[test]
    fn accepts() {
        let dfa = Dfa::from_nfa(&Automaton::literal("ab").kleene()).unwrap();
        assert!(dfa.accepts(""));
        assert!(dfa.accepts("abab"));
        assert!(!dfa.accepts("aba"));
        assert!(!dfa.accepts("x"));
    }

    #[test]
    fn validation() {
        assert_eq!(
            LexerDfa::from_automaton(Automaton::new()).unwrap_err(),
            Error::MissingStart
        );

        let nfa = Automaton::symbol('a').kleene();
        assert!(matches!(
            LexerDfa::from_automaton(nfa).unwrap_err(),
            Error::EpsilonEdge(_)
        ));

        let mut a = Automaton::new();
        let s = a.insert();
        let x = a.insert_accept(None);
        let y = a.insert_accept(None);
        a.set_start(s);
        a.connect(s, x, Some('q'));
        a.connect(s, y, Some('q'));
        assert_eq!(
            LexerDfa::from_automaton(a).unwrap_err(),
            Error::Nondeterministic(StateId::new(0), 'q')
        );
    }
}
