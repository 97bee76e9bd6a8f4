use tracing::info;

use crate::{
    PriorityTable,
    dfa::{LexerDfa, Scanner, Token},
    rules::{self, Compiled, Session},
};

/// A generated scanner: the combined automaton plus the priorities that
/// disambiguate its accepting states
#[derive(Debug, Clone)]
pub struct Lexer {
    dfa: LexerDfa,
    priorities: PriorityTable,
}

impl Lexer {
    #[inline]
    #[must_use]
    pub fn new(dfa: LexerDfa, priorities: PriorityTable) -> Self { Self { dfa, priorities } }

    /// Compile a rule file with the default retry budget
    ///
    /// # Errors
    /// This function fails if the rules are malformed, do not resolve, or
    /// define no tokens.
    pub fn generate(rules: &str) -> Result<Self, rules::Error> {
        Self::generate_with(rules, Session::new())
    }

    /// Compile a rule file using the given session
    ///
    /// # Errors
    /// This function fails if the rules are malformed, do not resolve, or
    /// define no tokens.
    pub fn generate_with(rules: &str, session: Session) -> Result<Self, rules::Error> {
        let rules = rules::parse(rules)?;
        let compiled = session.compile(&rules)?;
        let nfa = compiled.union();
        let dfa = LexerDfa::from_nfa(&nfa)?;
        let Compiled { tokens, priorities } = compiled;

        info!(
            tokens = tokens.len(),
            nfa_states = nfa.len(),
            dfa_states = dfa.as_automaton().len(),
            "Generated lexer"
        );

        Ok(Self { dfa, priorities })
    }

    #[inline]
    #[must_use]
    pub fn dfa(&self) -> &LexerDfa { &self.dfa }

    #[inline]
    #[must_use]
    pub fn priorities(&self) -> &PriorityTable { &self.priorities }

    #[inline]
    #[must_use]
    pub fn scan<'a>(&'a self, text: &'a str) -> Scanner<'a> { self.dfa.scanner(&self.priorities, text) }

    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<Token> { self.scan(text).collect() }
}
