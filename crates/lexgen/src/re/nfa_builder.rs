use hashbrown::HashMap;

use super::{Error, Operator, Term};
use crate::automaton::Automaton;

/// The escaped literal standing for the empty string
const EPSILON_LETTER: &str = "L";

/// What a word in a regular definition refers to
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// A rule that has already been compiled
    Defined(&'a Automaton),
    /// A rule that exists but has not been compiled yet
    Pending,
    /// Not a rule name; the word is read literally
    Unknown,
}

/// Name resolution for regular definitions
pub trait Definitions {
    fn lookup(&self, name: &str) -> Lookup<'_>;
}

impl Definitions for () {
    #[inline]
    fn lookup(&self, _: &str) -> Lookup<'_> { Lookup::Unknown }
}

impl Definitions for HashMap<String, Automaton> {
    fn lookup(&self, name: &str) -> Lookup<'_> {
        self.get(name).map_or(Lookup::Unknown, Lookup::Defined)
    }
}

fn operand(name: &str, defs: &impl Definitions) -> Result<Automaton, Error> {
    match defs.lookup(name) {
        Lookup::Defined(a) => Ok(a.clone()),
        Lookup::Pending => Err(Error::Unresolved(name.into())),
        Lookup::Unknown => Ok(Automaton::literal(name)),
    }
}

fn range(lo: &Automaton, hi: &Automaton) -> Result<Automaton, Error> {
    let (Some(l), Some(h)) = (lo.as_symbol(), hi.as_symbol()) else {
        return Err(Error::InvalidRange(lo.regex().into(), hi.regex().into()));
    };

    if l > h {
        return Err(Error::InvalidRange(l.into(), h.into()));
    }

    Ok(Automaton::range(l, h))
}

/// Evaluate a postfix expression into an automaton with epsilon edges
///
/// # Errors
/// This function fails if an operator is missing operands, the expression
/// does not reduce to exactly one automaton, a range has an endpoint that is
/// not a single character, or a word refers to a pending rule.
pub fn build(postfix: &[Term], defs: &impl Definitions) -> Result<Automaton, Error> {
    let mut stack: Vec<Automaton> = vec![];
    let mut it = postfix.iter();

    while let Some(term) = it.next() {
        let next = match term {
            Term::Sym(s) => operand(s, defs)?,
            Term::Op(Operator::Escape) => match it.next() {
                Some(Term::Sym(s)) if s == EPSILON_LETTER => Automaton::empty_string(),
                Some(Term::Sym(s)) => Automaton::literal(s),
                Some(Term::Op(op)) => Automaton::symbol(op.as_char()),
                None => return Err(Error::TrailingEscape),
            },
            &Term::Op(op @ (Operator::Star | Operator::Plus)) => {
                let a = stack.pop().ok_or(Error::MissingOperand(op))?;
                if op == Operator::Star {
                    a.kleene()
                } else {
                    a.positive()
                }
            },
            &Term::Op(op @ (Operator::Range | Operator::Concat | Operator::Union)) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    return Err(Error::MissingOperand(op));
                };

                match op {
                    Operator::Concat => a.concat(&b),
                    Operator::Union => a.union(&b),
                    _ => range(&a, &b)?,
                }
            },
            Term::Op(Operator::LParen | Operator::RParen) => return Err(Error::UnclosedParen),
        };

        stack.push(next);
    }

    match (stack.pop(), stack.len()) {
        (Some(a), 0) => Ok(a),
        (None, _) => Err(Error::Empty),
        (Some(_), n) => Err(Error::DanglingOperands(n + 1)),
    }
}

#[cfg(test)]
mod test {
    use hashbrown::HashMap;

    use super::{Definitions, Lookup, build};
    use crate::{
        automaton::Automaton,
        re::{Error, Term, regular_definition_infix_to_postfix, tokenize},
    };

    struct Waiting;

    impl Definitions for Waiting {
        fn lookup(&self, name: &str) -> Lookup<'_> {
            if name == "later" {
                Lookup::Pending
            } else {
                Lookup::Unknown
            }
        }
    }

    fn compile(src: &str, defs: &impl Definitions) -> Result<Automaton, Error> {
        build(&regular_definition_infix_to_postfix(&tokenize(src)?)?, defs)
    }

    #[test]
    fn literals_and_epsilon() {
        let a = compile("ab \\L", &()).unwrap();
        assert!(a.matches("ab"));
        assert!(!a.matches("a"));

        let a = compile("x (\\L | y)", &()).unwrap();
        assert!(a.matches("x") && a.matches("xy"));

        let a = compile("\\( \\) \\.", &()).unwrap();
        assert!(a.matches("().") && !a.matches("()"));
    }

    #[test]
    fn definitions_are_copied() {
        let mut defs = HashMap::new();
        defs.insert("ab".to_owned(), Automaton::literal("xy"));
        let a = compile("ab+", &defs).unwrap();
        assert!(a.matches("xyxy"));
        assert!(!a.matches("ab"));
        assert_eq!(defs["ab"].len(), 4);
    }

    #[test]
    fn errors() {
        assert_eq!(
            compile("x later", &Waiting).unwrap_err(),
            Error::Unresolved("later".into())
        );
        assert_eq!(
            compile("9-0", &()).unwrap_err(),
            Error::InvalidRange("9".into(), "0".into())
        );
        assert_eq!(build(&[], &()).unwrap_err(), Error::Empty);
        assert_eq!(
            build(&[Term::sym("a"), Term::sym("b")], &()).unwrap_err(),
            Error::DanglingOperands(2)
        );
    }
}
