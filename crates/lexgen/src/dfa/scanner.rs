use hashbrown::{HashMap, HashSet};
use tracing::{trace, warn};

use super::LexerDfa;
use crate::{
    PriorityTable,
    automaton::{Automaton, StateId},
};

/// A single scanned token.  The default value, with an empty name and
/// lexeme, marks the end of the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Token {
    pub name: String,
    pub lexeme: String,
}

impl Token {
    #[must_use]
    pub fn new(name: impl Into<String>, lexeme: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lexeme: lexeme.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn end() -> Self { Self::default() }

    #[inline]
    #[must_use]
    pub fn is_end(&self) -> bool { self.name.is_empty() && self.lexeme.is_empty() }
}

/// Longest-match tokenizer over a program text
///
/// Whitespace separates lexemes and is never part of one.  Characters outside
/// the automaton's alphabet are reported and skipped.  When no prefix at the
/// cursor matches any token the first character is dropped and scanning
/// resumes right after it.
#[derive(Debug)]
pub struct Scanner<'a> {
    dfa: &'a Automaton,
    start: StateId,
    text: &'a str,
    pos: usize,
    dead: HashSet<StateId>,
    names: HashMap<StateId, &'a str>,
}

/// Non-start states from which no accepting state is reachable
fn dead_states(dfa: &Automaton, start: StateId) -> HashSet<StateId> {
    let mut preds: HashMap<StateId, Vec<StateId>> = HashMap::new();
    for from in dfa.ids() {
        for &c in dfa.alphabet() {
            if let Some(to) = dfa.next(from, c) {
                preds.entry(to).or_default().push(from);
            }
        }
    }

    let mut live: HashSet<StateId> = dfa.accepting().collect();
    let mut stack: Vec<StateId> = live.iter().copied().collect();
    while let Some(s) = stack.pop() {
        for &p in preds.get(&s).into_iter().flatten() {
            if live.insert(p) {
                stack.push(p);
            }
        }
    }

    dfa.ids()
        .filter(|&s| s != start && !live.contains(&s))
        .collect()
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(dfa: &'a LexerDfa, priorities: &PriorityTable, text: &'a str) -> Self {
        let start = dfa.start();
        let dfa = dfa.as_automaton();
        let names = dfa
            .accepting()
            .filter_map(|s| {
                let name = priorities.resolve(dfa.token_names(s));
                if name.is_none() {
                    warn!(state = %s, "Accepting state has no token name");
                }
                name.map(|n| (s, n))
            })
            .collect();

        Self {
            dfa,
            start,
            text,
            pos: 0,
            dead: dead_states(dfa, start),
            names,
        }
    }

    /// Byte offset of the scan cursor
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize { self.pos }

    /// Produce the next token, or [`Token::end`] once only whitespace remains
    pub fn next_token(&mut self) -> Token {
        loop {
            let rest = &self.text[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.is_empty() {
                return Token::end();
            }

            match self.munch() {
                Ok(tok) => return tok,
                Err(resume) => self.pos = resume,
            }
        }
    }

    /// Run the automaton from the cursor.  On success the cursor is left just
    /// past the longest accepted prefix; on failure the position to retry
    /// from is returned.
    fn munch(&mut self) -> Result<Token, usize> {
        let mut state = self.start;
        let mut cur = self.pos;
        let mut lexeme = String::new();
        let mut best: Option<(&'a str, usize, usize)> = None;
        let mut first = None;
        let mut stuck = None;

        while let Some(c) = self.text[cur..].chars().next() {
            if c.is_whitespace() {
                break;
            }

            let end = cur + c.len_utf8();

            if !self.dfa.alphabet().contains(&c) {
                warn!(pos = cur, "Invalid input, skipping {c:?}");
                cur = end;
                continue;
            }

            let Some(next) = self
                .dfa
                .next(state, c)
                .filter(|n| !self.dead.contains(n))
            else {
                stuck = Some((cur, c));
                break;
            };

            state = next;
            cur = end;
            lexeme.push(c);
            first.get_or_insert(end);

            if let Some(&name) = self.names.get(&state) {
                best = Some((name, lexeme.len(), cur));
            }
        }

        if let Some((name, len, end)) = best {
            lexeme.truncate(len);
            trace!(token = name, lexeme = %lexeme, "Scanned token");
            self.pos = end;
            return Ok(Token::new(name, lexeme));
        }

        Err(if let Some(first) = first {
            warn!(
                pos = self.pos,
                "No token matches {:?}, skipping one character",
                &self.text[self.pos..cur]
            );
            first
        } else if let Some((at, c)) = stuck {
            warn!(pos = at, "No token starts with {c:?}, skipping it");
            at + c.len_utf8()
        } else {
            cur
        })
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let tok = self.next_token();
        (!tok.is_end()).then_some(tok)
    }
}

#[cfg(test)]
mod test {
    use super::{Token, dead_states};
    use crate::{Automaton, Lexer, LexerDfa, PriorityTable};

    fn lexer(rules: &[(&str, Automaton)]) -> (LexerDfa, PriorityTable) {
        let tagged: Vec<Automaton> = rules
            .iter()
            .map(|(name, a)| {
                let mut a = a.clone();
                a.set_token(name);
                a
            })
            .collect();
        let dfa = LexerDfa::from_nfa(&Automaton::union_all(&tagged)).unwrap();
        let prio = PriorityTable::from_declaration_order(rules.iter().map(|(n, _)| *n));
        (dfa, prio)
    }

    fn scan(dfa: &LexerDfa, prio: &PriorityTable, text: &str) -> Vec<(String, String)> {
        dfa.scanner(prio, text)
            .map(|Token { name, lexeme }| (name, lexeme))
            .collect()
    }

    fn pairs(p: &[(&str, &str)]) -> Vec<(String, String)> {
        p.iter().map(|&(a, b)| (a.into(), b.into())).collect()
    }

    fn lower() -> Automaton { Automaton::range('a', 'z') }

    #[test]
    fn keyword_beats_identifier() {
        let (dfa, prio) = lexer(&[
            ("if", Automaton::literal("if")),
            ("id", lower().positive()),
        ]);

        assert_eq!(
            scan(&dfa, &prio, "if iff x"),
            pairs(&[("if", "if"), ("id", "iff"), ("id", "x")])
        );
    }

    #[test]
    fn longest_match_rewinds() {
        let (dfa, prio) = lexer(&[
            ("lt", Automaton::symbol('<')),
            ("shl", Automaton::literal("<<")),
            ("arrow", Automaton::literal("<<-")),
        ]);

        // "<<<" has no three-character token, so it splits as "<<" "<"
        assert_eq!(
            scan(&dfa, &prio, "<<< <<-"),
            pairs(&[("shl", "<<"), ("lt", "<"), ("arrow", "<<-")])
        );
    }

    #[test]
    fn invalid_characters() {
        let (dfa, prio) = lexer(&[("id", lower().positive())]);

        assert_eq!(
            scan(&dfa, &prio, "ab$cd  #  e"),
            pairs(&[("id", "abcd"), ("id", "e")])
        );
    }

    #[test]
    fn unmatched_prefix_is_skipped() {
        let (dfa, prio) = lexer(&[
            ("arrow", Automaton::literal("->")),
            ("id", lower().positive()),
        ]);

        // '-' is in the alphabet but never starts a complete token on its own
        assert_eq!(
            scan(&dfa, &prio, "-x -> -"),
            pairs(&[("id", "x"), ("arrow", "->")])
        );
    }

    #[test]
    fn per_rule_traps_are_dead() {
        let lexer = Lexer::generate("[ \\( \\) ]\nid: [a-z]+\n").unwrap();
        let dfa = lexer.dfa().as_automaton();
        let dead = dead_states(dfa, lexer.dfa().start());

        let paren = dfa.walk("(").unwrap();
        assert!(dfa.is_accepting(paren));
        assert!(!dead.contains(&paren));
        assert!(dead.contains(&dfa.walk("((").unwrap()));
        assert!(dead.contains(&dfa.walk("a(").unwrap()));
        assert!(!dead.contains(&dfa.walk("ab").unwrap()));

        let run = "(".repeat(64);
        let mut scan = lexer.scan(&run);
        assert_eq!(scan.next_token(), Token::new("(", "("));
        assert_eq!(scan.position(), 1);
        assert_eq!(scan.count(), 63);
    }

    #[test]
    fn end_sentinel() {
        let (dfa, prio) = lexer(&[("id", lower().positive())]);
        let mut s = dfa.scanner(&prio, "   \n\t ");
        assert!(s.next_token().is_end());
        assert!(s.next_token().is_end());
        assert_eq!(s.position(), 6);
        assert!(Token::end().is_end());
        assert!(!Token::new("id", "x").is_end());
    }

    #[test]
    fn unranked_tokens_lose() {
        let (dfa, _) = lexer(&[
            ("if", Automaton::literal("if")),
            ("id", lower().positive()),
        ]);

        let mut prio = PriorityTable::new();
        prio.insert("id", 1);
        assert_eq!(scan(&dfa, &prio, "if"), pairs(&[("id", "if")]));

        // equal ranks fall back to name order
        prio.insert("if", 1);
        assert_eq!(scan(&dfa, &prio, "if"), pairs(&[("id", "if")]));
        prio.insert("if", 2);
        assert_eq!(scan(&dfa, &prio, "if"), pairs(&[("if", "if")]));
    }
}
