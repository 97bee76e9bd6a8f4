//! Regular expression front end
//!
//! Two surface forms are accepted.  The string form treats every character as
//! its own operand, e.g. `a(b|c)*`.  The token form, used for named rules,
//! reads whitespace-separated words that may refer to earlier rules, e.g.
//! `letter (letter | digit)*`, and additionally supports `[a-z0-9]` classes.
//!
//! Both forms are converted to postfix with explicit concatenation before
//! being evaluated into an automaton.

use std::fmt;

use crate::dfa::{self, Dfa};

mod nfa_builder;
mod postfix;

pub use nfa_builder::{Definitions, Lookup, build};
pub use postfix::{
    concat_explicit, concat_explicit_tokens, regex_evaluate_postfix, regex_infix_to_postfix,
    regular_definition_evaluate_postfix, regular_definition_infix_to_postfix, tokenize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Escape,
    Star,
    Plus,
    Range,
    Concat,
    Union,
    LParen,
    RParen,
}

impl Operator {
    pub const ALL: [Self; 8] = [
        Self::Escape,
        Self::Star,
        Self::Plus,
        Self::Range,
        Self::Concat,
        Self::Union,
        Self::LParen,
        Self::RParen,
    ];

    #[must_use]
    pub fn from_char(c: char) -> Option<Self> { Self::ALL.into_iter().find(|o| o.as_char() == c) }

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Escape => '\\',
            Self::Star => '*',
            Self::Plus => '+',
            Self::Range => '-',
            Self::Concat => '.',
            Self::Union => '|',
            Self::LParen => '(',
            Self::RParen => ')',
        }
    }

    /// Binding strength; parentheses never bind
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Escape => 5,
            Self::Star | Self::Plus => 4,
            Self::Range => 3,
            Self::Concat => 2,
            Self::Union => 1,
            Self::LParen | Self::RParen => 0,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One item of a tokenized regular definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Sym(String),
    Op(Operator),
}

impl Term {
    #[inline]
    #[must_use]
    pub fn sym(s: impl Into<String>) -> Self { Self::Sym(s.into()) }

    #[inline]
    #[must_use]
    pub fn as_op(&self) -> Option<Operator> {
        match self {
            Self::Op(o) => Some(*o),
            Self::Sym(_) => None,
        }
    }

    /// The character this operand spells, if it is exactly one character long
    #[must_use]
    pub fn single_char(&self) -> Option<char> {
        let Self::Sym(s) = self else { return None };
        let mut chars = s.chars();
        chars.next().filter(|_| chars.next().is_none())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sym(s) => f.write_str(s),
            Self::Op(o) => o.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Found extraneous right parenthesis")]
    TrailingParen,
    #[error("Unclosed parenthesis")]
    UnclosedParen,
    #[error("Unterminated character class")]
    ClassUnclosed,
    #[error("Empty character class")]
    ClassEmpty,
    #[error("Escape character at end of expression")]
    TrailingEscape,
    #[error("Missing operand for {0}")]
    MissingOperand(Operator),
    #[error("Invalid range {0}-{1}")]
    InvalidRange(String, String),
    #[error("Empty regular expression")]
    Empty,
    #[error("{0} operands left over after evaluation")]
    DanglingOperands(usize),
    #[error("Reference to {0:?}, which is not yet defined")]
    Unresolved(String),
    #[error("Error determinizing expression")]
    Dfa(#[from] dfa::Error),
}

/// Escape every operator character in `word` so the string form reads it
/// literally
#[must_use]
pub fn escape_literal(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if Operator::from_char(c).is_some() {
            out.push(Operator::Escape.as_char());
        }
        out.push(c);
    }
    out
}

/// Compile a string-form expression into a minimized automaton
///
/// # Errors
/// This function fails if `regex` is malformed.
pub fn regex_to_minimized_dfa(regex: &str) -> Result<Dfa, Error> {
    let postfix = regex_infix_to_postfix(regex)?;
    let nfa = build(&postfix::string_terms(&postfix), &())?;
    let mut dfa = Dfa::from_nfa(&nfa)?.minimize();
    dfa.set_regex(regex_evaluate_postfix(&postfix)?);
    Ok(dfa)
}

/// Compile a token-form expression into a minimized automaton, resolving
/// names through `defs`
///
/// # Errors
/// This function fails if `definition` is malformed or refers to a rule
/// `defs` reports as still pending.
pub fn regular_definition_to_minimized_dfa(
    definition: &str,
    defs: &impl Definitions,
) -> Result<Dfa, Error> {
    let terms = tokenize(definition)?;
    let postfix = regular_definition_infix_to_postfix(&terms)?;
    let nfa = build(&postfix, defs)?;
    let mut dfa = Dfa::from_nfa(&nfa)?.minimize();
    dfa.set_regex(nfa.regex());
    Ok(dfa)
}
