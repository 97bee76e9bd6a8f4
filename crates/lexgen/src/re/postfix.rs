use std::str::Chars;

use super::{Error, Operator, Term};

/// Tracks whether an explicit concatenation belongs between two items
#[derive(Debug, Default, Clone, Copy)]
struct Juxtapose {
    escaped: bool,
    after_operand: bool,
}

impl Juxtapose {
    /// Feed the next item, given its operator if it is one.  Returns whether
    /// a concatenation operator must be emitted before it.
    fn step(&mut self, op: Option<Operator>) -> bool {
        let op = op.filter(|_| !self.escaped);
        let starts_operand = matches!(op, None | Some(Operator::LParen | Operator::Escape));
        let concat = self.after_operand && starts_operand;

        self.after_operand = matches!(
            op,
            None | Some(Operator::RParen | Operator::Star | Operator::Plus)
        );
        self.escaped = op == Some(Operator::Escape);
        concat
    }
}

/// Insert the concatenation operator wherever two operands are juxtaposed
#[must_use]
pub fn concat_explicit(regex: &str) -> String {
    let mut out = String::with_capacity(regex.len() * 2);
    let mut jux = Juxtapose::default();

    for c in regex.chars() {
        if jux.step(Operator::from_char(c)) {
            out.push(Operator::Concat.as_char());
        }
        out.push(c);
    }

    out
}

#[must_use]
pub fn concat_explicit_tokens(terms: &[Term]) -> Vec<Term> {
    let mut out = Vec::with_capacity(terms.len() * 2);
    let mut jux = Juxtapose::default();

    for term in terms {
        if jux.step(term.as_op()) {
            out.push(Term::Op(Operator::Concat));
        }
        out.push(term.clone());
    }

    out
}

/// Move `op` onto the operator stack, first emitting every stacked operator
/// that binds at least as tightly
fn shunt(stack: &mut Vec<Operator>, op: Operator, mut emit: impl FnMut(Operator)) {
    while let Some(&top) = stack.last() {
        if top == Operator::LParen || top.priority() < op.priority() {
            break;
        }
        emit(top);
        stack.pop();
    }
    stack.push(op);
}

fn close_paren(stack: &mut Vec<Operator>, mut emit: impl FnMut(Operator)) -> Result<(), Error> {
    loop {
        match stack.pop() {
            Some(Operator::LParen) => break Ok(()),
            Some(op) => emit(op),
            None => break Err(Error::TrailingParen),
        }
    }
}

fn drain(mut stack: Vec<Operator>, mut emit: impl FnMut(Operator)) -> Result<(), Error> {
    while let Some(op) = stack.pop() {
        if op == Operator::LParen {
            return Err(Error::UnclosedParen);
        }
        emit(op);
    }
    Ok(())
}

/// Convert a string-form expression to postfix.  Whitespace is ignored, and
/// escape pairs are copied through with the escape first.
///
/// # Errors
/// This function fails on unbalanced parentheses or a dangling escape.
pub fn regex_infix_to_postfix(regex: &str) -> Result<String, Error> {
    let stripped: String = regex.chars().filter(|c| !c.is_whitespace()).collect();
    let infix = concat_explicit(&stripped);
    let mut out = String::with_capacity(infix.len());
    let mut stack = vec![];
    let mut chars = infix.chars();

    while let Some(c) = chars.next() {
        match Operator::from_char(c) {
            None => out.push(c),
            Some(Operator::Escape) => {
                out.push(c);
                out.push(chars.next().ok_or(Error::TrailingEscape)?);
            },
            Some(Operator::LParen) => stack.push(Operator::LParen),
            Some(Operator::RParen) => close_paren(&mut stack, |o| out.push(o.as_char()))?,
            Some(op) => shunt(&mut stack, op, |o| out.push(o.as_char())),
        }
    }

    drain(stack, |o| out.push(o.as_char()))?;
    Ok(out)
}

/// Convert a tokenized expression to postfix, inserting explicit
/// concatenation first
///
/// # Errors
/// This function fails on unbalanced parentheses or a dangling escape.
pub fn regular_definition_infix_to_postfix(terms: &[Term]) -> Result<Vec<Term>, Error> {
    let infix = concat_explicit_tokens(terms);
    let mut out = Vec::with_capacity(infix.len());
    let mut stack = vec![];
    let mut it = infix.into_iter();

    while let Some(term) = it.next() {
        match term.as_op() {
            None => out.push(term),
            Some(Operator::Escape) => {
                out.push(term);
                out.push(it.next().ok_or(Error::TrailingEscape)?);
            },
            Some(Operator::LParen) => stack.push(Operator::LParen),
            Some(Operator::RParen) => close_paren(&mut stack, |o| out.push(Term::Op(o)))?,
            Some(op) => shunt(&mut stack, op, |o| out.push(Term::Op(o))),
        }
    }

    drain(stack, |o| out.push(Term::Op(o)))?;
    Ok(out)
}

/// Split a string-form postfix expression into one term per character
pub(super) fn string_terms(postfix: &str) -> Vec<Term> {
    postfix
        .chars()
        .map(|c| Operator::from_char(c).map_or_else(|| Term::sym(c), Term::Op))
        .collect()
}

/// Rebuild a fully parenthesized infix rendering of a postfix expression
fn evaluate<I: Iterator<Item = Term>>(mut it: I) -> Result<String, Error> {
    let mut stack: Vec<String> = vec![];

    while let Some(term) = it.next() {
        let next = match term {
            Term::Sym(s) => s,
            Term::Op(Operator::Escape) => {
                let lit = it.next().ok_or(Error::TrailingEscape)?;
                format!("({}{lit})", Operator::Escape)
            },
            Term::Op(op @ (Operator::Star | Operator::Plus)) => {
                let a = stack.pop().ok_or(Error::MissingOperand(op))?;
                format!("({a}){op}")
            },
            Term::Op(op @ (Operator::Range | Operator::Concat | Operator::Union)) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    return Err(Error::MissingOperand(op));
                };
                format!("({a}{op}{b})")
            },
            Term::Op(Operator::LParen | Operator::RParen) => return Err(Error::UnclosedParen),
        };

        stack.push(next);
    }

    match (stack.pop(), stack.len()) {
        (Some(s), 0) => Ok(s),
        (None, _) => Err(Error::Empty),
        (Some(_), n) => Err(Error::DanglingOperands(n + 1)),
    }
}

/// Render a string-form postfix expression back to parenthesized infix
///
/// # Errors
/// This function fails if `postfix` is not a well-formed postfix expression.
pub fn regex_evaluate_postfix(postfix: &str) -> Result<String, Error> {
    evaluate(string_terms(postfix).into_iter())
}

/// Render a tokenized postfix expression back to parenthesized infix
///
/// # Errors
/// This function fails if `postfix` is not a well-formed postfix expression.
pub fn regular_definition_evaluate_postfix(postfix: &[Term]) -> Result<String, Error> {
    evaluate(postfix.iter().cloned())
}

fn push_escaped(terms: &mut Vec<Term>, c: char) {
    terms.push(Term::Op(Operator::Escape));
    terms.push(Operator::from_char(c).map_or_else(|| Term::sym(c), Term::Op));
}

fn push_class_char(terms: &mut Vec<Term>, c: char) {
    if Operator::from_char(c).is_some() {
        push_escaped(terms, c);
    } else {
        terms.push(Term::sym(c));
    }
}

/// Expand a bracketed class, whose opening bracket has been consumed, into a
/// parenthesized union
fn class(chars: &mut Chars<'_>, terms: &mut Vec<Term>) -> Result<(), Error> {
    let mut body = vec![];
    loop {
        match chars.next().ok_or(Error::ClassUnclosed)? {
            ']' => break,
            '\\' => body.push((chars.next().ok_or(Error::ClassUnclosed)?, true)),
            c if c.is_whitespace() => (),
            c => body.push((c, false)),
        }
    }

    if body.is_empty() {
        return Err(Error::ClassEmpty);
    }

    terms.push(Term::Op(Operator::LParen));
    let mut i = 0;
    while let Some(&(c, _)) = body.get(i) {
        if i > 0 {
            terms.push(Term::Op(Operator::Union));
        }

        push_class_char(terms, c);
        if let (Some(('-', false)), Some(&(hi, _))) = (body.get(i + 1), body.get(i + 2)) {
            terms.push(Term::Op(Operator::Range));
            push_class_char(terms, hi);
            i += 3;
        } else {
            i += 1;
        }
    }
    terms.push(Term::Op(Operator::RParen));

    Ok(())
}

/// Whether the term ending at `i` is a one-character operand, counting an
/// escape pair as one
fn single_operand_before(terms: &[Term], i: usize) -> bool {
    match i.checked_sub(1).map(|j| (j, &terms[j])) {
        Some((_, t)) if t.single_char().is_some() => true,
        Some((j, Term::Op(_))) => j.checked_sub(1).is_some_and(|k| terms[k] == Term::Op(Operator::Escape)),
        _ => false,
    }
}

/// Demote every range operator without a one-character operand on each side
/// to a literal dash
fn literal_dashes(terms: Vec<Term>) -> Vec<Term> {
    let mut out = Vec::with_capacity(terms.len());

    for (i, term) in terms.iter().enumerate() {
        let is_range = *term == Term::Op(Operator::Range)
            && !(i > 0 && terms[i - 1] == Term::Op(Operator::Escape));

        if is_range {
            let lhs = single_operand_before(&terms, i);
            let rhs = terms
                .get(i + 1)
                .is_some_and(|t| t.single_char().is_some() || *t == Term::Op(Operator::Escape));

            if !(lhs && rhs) {
                out.push(Term::Op(Operator::Escape));
            }
        }

        out.push(term.clone());
    }

    out
}

/// Split a token-form expression into operands and operators
///
/// Words are delimited by whitespace and operators.  An escape followed by a
/// character yields an escape term and that character's term; an unescaped
/// `.` is read as a literal dot.  A dash only denotes a range between two
/// one-character operands, and is otherwise a literal.
///
/// # Errors
/// This function fails on a dangling escape or a malformed class.
pub fn tokenize(definition: &str) -> Result<Vec<Term>, Error> {
    fn flush(buf: &mut String, terms: &mut Vec<Term>) {
        if !buf.is_empty() {
            terms.push(Term::Sym(std::mem::take(buf)));
        }
    }

    let mut terms = vec![];
    let mut buf = String::new();
    let mut chars = definition.chars();

    while let Some(c) = chars.next() {
        if c == '[' {
            flush(&mut buf, &mut terms);
            class(&mut chars, &mut terms)?;
            continue;
        }

        match Operator::from_char(c) {
            None if c.is_whitespace() => flush(&mut buf, &mut terms),
            None => buf.push(c),
            Some(op) => {
                flush(&mut buf, &mut terms);
                match op {
                    Operator::Escape => {
                        push_escaped(&mut terms, chars.next().ok_or(Error::TrailingEscape)?);
                    },
                    Operator::Concat => push_escaped(&mut terms, c),
                    op => terms.push(Term::Op(op)),
                }
            },
        }
    }

    flush(&mut buf, &mut terms);
    Ok(literal_dashes(terms))
}

#[cfg(test)]
mod test {
    use super::{
        concat_explicit, concat_explicit_tokens, regex_evaluate_postfix, regex_infix_to_postfix,
        regular_definition_evaluate_postfix, regular_definition_infix_to_postfix, tokenize,
    };
    use crate::re::{Error, Operator, Term};

    fn render(terms: &[Term]) -> String {
        terms.iter().map(|t| format!("{t} ")).collect::<String>().trim_end().to_owned()
    }

    #[test]
    fn explicit_concat() {
        assert_eq!(concat_explicit("ab"), "a.b");
        assert_eq!(concat_explicit("a(b|c)*d"), "a.(b|c)*.d");
        assert_eq!(concat_explicit("a*b+"), "a*.b+");
        assert_eq!(concat_explicit("a-z"), "a-z");
        assert_eq!(concat_explicit("a\\*b"), "a.\\*.b");
        assert_eq!(concat_explicit("\\(\\)"), "\\(.\\)");
        assert_eq!(concat_explicit("(a)(b)"), "(a).(b)");
    }

    #[test]
    fn string_postfix() {
        assert_eq!(regex_infix_to_postfix("ab|c").unwrap(), "ab.c|");
        assert_eq!(regex_infix_to_postfix("a(b|c)*").unwrap(), "abc|*.");
        assert_eq!(regex_infix_to_postfix("a-z|A-Z").unwrap(), "az-AZ-|");
        assert_eq!(regex_infix_to_postfix("a b").unwrap(), "ab.");
        assert_eq!(regex_infix_to_postfix("\\(a").unwrap(), "\\(a.");
        assert_eq!(regex_infix_to_postfix("a\\").unwrap_err(), Error::TrailingEscape);
        assert_eq!(regex_infix_to_postfix("(a").unwrap_err(), Error::UnclosedParen);
        assert_eq!(regex_infix_to_postfix("a)").unwrap_err(), Error::TrailingParen);
    }

    #[test]
    fn string_evaluate() {
        assert_eq!(regex_evaluate_postfix("ab.c|").unwrap(), "((a.b)|c)");
        assert_eq!(regex_evaluate_postfix("a*").unwrap(), "(a)*");
        assert_eq!(regex_evaluate_postfix("\\(").unwrap(), "(\\()");
        assert_eq!(regex_evaluate_postfix("").unwrap_err(), Error::Empty);
        assert_eq!(regex_evaluate_postfix("ab").unwrap_err(), Error::DanglingOperands(2));
        assert_eq!(
            regex_evaluate_postfix("a|").unwrap_err(),
            Error::MissingOperand(Operator::Union)
        );
    }

    #[test]
    fn tokens() {
        let t = tokenize("letter (letter|digit)*").unwrap();
        assert_eq!(render(&t), "letter ( letter | digit ) *");

        let t = tokenize("digit+ . digit+").unwrap();
        assert_eq!(render(&t), "digit + \\ . digit +");

        let t = tokenize("\\=\\= | \\L").unwrap();
        assert_eq!(render(&t), "\\ = \\ = | \\ L");

        assert_eq!(tokenize("x\\").unwrap_err(), Error::TrailingEscape);
    }

    #[test]
    fn dashes() {
        assert_eq!(render(&tokenize("a-z").unwrap()), "a - z");
        assert_eq!(render(&tokenize("0 - 9").unwrap()), "0 - 9");
        assert_eq!(render(&tokenize("foo-bar").unwrap()), "foo \\ - bar");
        assert_eq!(render(&tokenize("a-").unwrap()), "a \\ -");
        assert_eq!(render(&tokenize("\\- | a").unwrap()), "\\ - | a");
        assert_eq!(render(&tokenize("\\+-\\.").unwrap()), "\\ + - \\ .");
    }

    #[test]
    fn classes() {
        assert_eq!(
            render(&tokenize("[a-z0-9_]").unwrap()),
            "( a - z | 0 - 9 | _ )"
        );
        assert_eq!(render(&tokenize("[+-]").unwrap()), "( \\ + | \\ - )");
        assert_eq!(render(&tokenize("x[ab]").unwrap()), "x ( a | b )");
        assert_eq!(tokenize("[ab").unwrap_err(), Error::ClassUnclosed);
        assert_eq!(tokenize("[]").unwrap_err(), Error::ClassEmpty);
    }

    #[test]
    fn token_postfix() {
        let t = tokenize("letter (letter | digit)*").unwrap();
        assert_eq!(
            render(&concat_explicit_tokens(&t)),
            "letter . ( letter | digit ) *"
        );

        let p = regular_definition_infix_to_postfix(&t).unwrap();
        assert_eq!(render(&p), "letter letter digit | * .");
        assert_eq!(
            regular_definition_evaluate_postfix(&p).unwrap(),
            "(letter.((letter|digit))*)"
        );

        let t = tokenize("a \\* b").unwrap();
        let p = regular_definition_infix_to_postfix(&t).unwrap();
        assert_eq!(render(&p), "a \\ * . b .");

        let t = tokenize("(a | b").unwrap();
        assert_eq!(
            regular_definition_infix_to_postfix(&t).unwrap_err(),
            Error::UnclosedParen
        );
    }
}
