//! Toolkit for compiling lexical rules into a maximal-munch scanner

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)] // TODO: document the automaton algebra

pub mod automaton;
mod closure_builder;
pub mod dfa;
pub mod lexer;
pub mod priority;
pub mod re;
pub mod rules;

pub use automaton::{Automaton, State, StateId};
pub use dfa::{Dfa, LexerDfa, Scanner, Token};
pub use lexer::Lexer;
pub use priority::PriorityTable;
