//! Lexical rule files
//!
//! Each non-blank line is one of:
//!
//! - `{ if else while }`: keywords, each its own token
//! - `[ ; , \( \) ]`: punctuation, each its own token named after the
//!   literal with one leading `\` removed
//! - `name: definition`: a named token
//! - `name = definition`: a named helper; it becomes a token only if no other
//!   rule refers to it
//!
//! Definitions may refer to rules declared later in the file.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::{
    PriorityTable,
    automaton::Automaton,
    dfa::{self, Dfa},
    re::{self, Definitions, Lookup, Term},
};

/// How many times a rule waiting on a forward reference is retried before
/// giving up
pub const MAX_ATTEMPTS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Line {line}: unrecognized rule {text:?}")]
    Malformed { line: usize, text: String },
    #[error("Error compiling rule {name:?}")]
    Compile {
        name: String,
        #[source]
        source: re::Error,
    },
    #[error("Rules still unresolved after {attempts} attempts: {}", .names.join(", "))]
    Unresolved { names: Vec<String>, attempts: usize },
    #[error("Rule {0:?} is declared more than once")]
    Duplicate(String),
    #[error("Rule set defines no tokens")]
    Empty,
    #[error("Error building the combined automaton")]
    Dfa(#[from] dfa::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// `name: definition`
    Token,
    /// `name = definition`
    Helper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Keywords(Vec<String>),
    Punctuation(Vec<String>),
    Named {
        name: String,
        binding: Binding,
        body: String,
    },
}

impl Rule {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            Self::Keywords(_) | Self::Punctuation(_) => None,
        }
    }

    /// Every token or helper name this rule introduces
    #[must_use]
    pub fn declares(&self) -> Vec<&str> {
        match self {
            Self::Keywords(words) => words.iter().map(String::as_str).collect(),
            Self::Punctuation(lits) => lits.iter().map(|l| punctuation_name(l)).collect(),
            Self::Named { name, .. } => vec![name],
        }
    }
}

fn words(body: &str) -> Vec<String> { body.split_whitespace().map(Into::into).collect() }

fn is_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || re::Operator::from_char(c).is_some())
}

fn parse_line(text: &str) -> Option<Rule> {
    let text = text.trim();

    if let Some(body) = text.strip_prefix('{') {
        return Some(Rule::Keywords(words(body.strip_suffix('}')?)));
    }

    if let Some(body) = text.strip_prefix('[') {
        return Some(Rule::Punctuation(words(body.strip_suffix(']')?)));
    }

    let split = text.find([':', '='])?;
    let (name, body) = (text[..split].trim(), text[split + 1..].trim());
    let binding = if text[split..].starts_with(':') {
        Binding::Token
    } else {
        Binding::Helper
    };

    (is_name(name) && !body.is_empty()).then(|| Rule::Named {
        name: name.into(),
        binding,
        body: body.into(),
    })
}

/// Parse a rule file, skipping blank lines
///
/// # Errors
/// This function fails on the first line that is not a valid rule.
pub fn parse(src: &str) -> Result<Vec<Rule>, Error> {
    src.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            parse_line(l).ok_or_else(|| Error::Malformed {
                line: i + 1,
                text: l.into(),
            })
        })
        .collect()
}

/// The name a punctuation literal is known by
fn punctuation_name(lit: &str) -> &str {
    match lit.strip_prefix('\\') {
        Some(rest) if !rest.is_empty() => rest,
        _ => lit,
    }
}

/// The per-rule automata and priorities compiled from a rule file
#[derive(Debug)]
pub struct Compiled {
    pub tokens: Vec<(String, Dfa)>,
    pub priorities: PriorityTable,
}

/// State for compiling one rule file
#[derive(Debug)]
pub struct Session {
    max_attempts: usize,
    declared: HashSet<String>,
    definitions: HashMap<String, Dfa>,
    attempts: HashMap<String, usize>,
}

impl Default for Session {
    fn default() -> Self { Self::new() }
}

impl Definitions for Session {
    fn lookup(&self, name: &str) -> Lookup<'_> {
        if let Some(dfa) = self.definitions.get(name) {
            Lookup::Defined(dfa.as_automaton())
        } else if self.declared.contains(name) {
            Lookup::Pending
        } else {
            Lookup::Unknown
        }
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self { Self::with_max_attempts(MAX_ATTEMPTS) }

    #[must_use]
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            declared: HashSet::new(),
            definitions: HashMap::new(),
            attempts: HashMap::new(),
        }
    }

    /// Compile and store a literal token
    fn literal(&mut self, name: &str, lit: &str) -> Result<(), Error> {
        let mut dfa = re::regex_to_minimized_dfa(&re::escape_literal(lit)).map_err(|source| {
            Error::Compile {
                name: name.into(),
                source,
            }
        })?;
        dfa.set_token(name);
        self.definitions.insert(name.into(), dfa);
        Ok(())
    }

    /// Try to compile a named rule, returning `false` if it refers to a rule
    /// that is not compiled yet
    fn define(&mut self, name: &str, body: &str) -> Result<bool, Error> {
        match re::regular_definition_to_minimized_dfa(body, &*self) {
            Ok(mut dfa) => {
                dfa.set_token(name);
                self.definitions.insert(name.into(), dfa);
                Ok(true)
            },
            Err(re::Error::Unresolved(dep)) => {
                trace!(rule = name, %dep, "Deferring rule");
                Ok(false)
            },
            Err(source) => Err(Error::Compile {
                name: name.into(),
                source,
            }),
        }
    }

    /// Retry deferred rules round-robin until all compile or some rule runs
    /// out of attempts
    fn resolve<'r>(&mut self, mut backlog: VecDeque<(&'r str, &'r str)>) -> Result<(), Error> {
        let mut unresolved = vec![];

        while let Some((name, body)) = backlog.pop_front() {
            if self.definitions.contains_key(name) {
                continue;
            }

            let attempts = self.attempts.entry(name.to_owned()).or_default();
            *attempts += 1;
            let attempts = *attempts;

            if self.define(name, body)? {
                debug!(rule = name, attempts, "Resolved deferred rule");
            } else if attempts < self.max_attempts {
                backlog.push_back((name, body));
            } else {
                unresolved.push(name.to_owned());
            }
        }

        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(Error::Unresolved {
                names: unresolved,
                attempts: self.max_attempts,
            })
        }
    }

    /// Names of helper rules some other rule refers to
    fn referenced(&self, rules: &[Rule]) -> HashSet<String> {
        rules
            .iter()
            .filter_map(|r| match r {
                Rule::Named { name, body, .. } => Some((name, body)),
                _ => None,
            })
            .flat_map(|(name, body)| {
                re::tokenize(body)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(move |t| match t {
                        Term::Sym(s) if s != *name && self.declared.contains(&s) => Some(s),
                        _ => None,
                    })
            })
            .collect()
    }

    /// Compile every rule, in declaration order, into per-token automata
    ///
    /// # Errors
    /// This method fails if a name is declared twice, a rule does not
    /// compile, some rules never resolve, or no tokens are defined.
    pub fn compile(mut self, rules: &[Rule]) -> Result<Compiled, Error> {
        let mut names = HashSet::new();
        if let Some(dup) = rules.iter().flat_map(Rule::declares).find(|&n| !names.insert(n)) {
            return Err(Error::Duplicate(dup.into()));
        }

        self.declared = rules.iter().filter_map(Rule::name).map(Into::into).collect();
        let referenced = self.referenced(rules);

        let mut order: Vec<String> = vec![];
        let mut backlog = VecDeque::new();

        for rule in rules {
            match rule {
                Rule::Keywords(words) => {
                    for word in words {
                        self.literal(word, word)?;
                        order.push(word.clone());
                    }
                },
                Rule::Punctuation(lits) => {
                    for lit in lits {
                        let name = punctuation_name(lit);
                        self.literal(name, name)?;
                        order.push(name.to_owned());
                    }
                },
                Rule::Named {
                    name,
                    binding,
                    body,
                } => {
                    if *binding == Binding::Token || !referenced.contains(name) {
                        order.push(name.clone());
                    }

                    if !self.define(name, body)? {
                        backlog.push_back((name.as_str(), body.as_str()));
                    }
                },
            }
        }

        self.resolve(backlog)?;

        let tokens: Vec<(String, Dfa)> = order
            .into_iter()
            .filter_map(|n| {
                let dfa = self.definitions.get(&n)?.clone();
                Some((n, dfa))
            })
            .collect();

        if tokens.is_empty() {
            return Err(Error::Empty);
        }

        debug!(
            rules = rules.len(),
            tokens = tokens.len(),
            helpers = self.definitions.len().saturating_sub(tokens.len()),
            "Compiled rule set"
        );

        let priorities = PriorityTable::from_declaration_order(tokens.iter().map(|(n, _)| n.as_str()));
        Ok(Compiled { tokens, priorities })
    }
}

impl Compiled {
    /// The union of every token automaton, each accepting state tagged with
    /// its token name
    #[must_use]
    pub fn union(&self) -> Automaton {
        Automaton::union_all(self.tokens.iter().map(|(_, d)| d.as_automaton()))
    }
}

#[cfg(test)]
mod test {
    use super::{Binding, Error, Rule, Session, parse};

    fn named(name: &str, binding: Binding, body: &str) -> Rule {
        Rule::Named {
            name: name.into(),
            binding,
            body: body.into(),
        }
    }

    fn compile(src: &str) -> Result<super::Compiled, Error> {
        Session::new().compile(&parse(src).unwrap())
    }

    fn names(src: &str) -> Vec<String> {
        compile(src)
            .unwrap()
            .tokens
            .into_iter()
            .map(|(n, _)| n)
            .collect()
    }

    #[test]
    fn parsing() {
        let rules = parse(
            "{ if else }\n\
             \n\
             [ ; \\( \\, ]\n\
             letter = a-z | A-Z\n\
             relop: \\=\\= | <\n",
        )
        .unwrap();

        assert_eq!(rules, [
            Rule::Keywords(vec!["if".into(), "else".into()]),
            Rule::Punctuation(vec![";".into(), "\\(".into(), "\\,".into()]),
            named("letter", Binding::Helper, "a-z | A-Z"),
            named("relop", Binding::Token, "\\=\\= | <"),
        ]);
    }

    #[test]
    fn malformed() {
        for (src, line) in [
            ("{ if", 1),
            ("x = a\n\nnot a rule", 3),
            ("= a", 1),
            ("two words: a", 1),
            ("empty:", 1),
            ("[ ;", 1),
        ] {
            match parse(src) {
                Err(Error::Malformed { line: l, .. }) => assert_eq!(l, line, "{src:?}"),
                r => panic!("{src:?} parsed as {r:?}"),
            }
        }
    }

    #[test]
    fn helpers_are_not_tokens() {
        assert_eq!(
            names("{ if }\nletter = [a-z]\nid = letter (letter)*\n"),
            ["if", "id"]
        );
        assert_eq!(
            names("digit = [0-9]\nnum: digit+\ndigit2: digit digit\n"),
            ["num", "digit2"]
        );
        // a `:` rule is a token even when referenced
        assert_eq!(names("a: x\nb: a a\n"), ["a", "b"]);
    }

    #[test]
    fn punctuation_names() {
        let c = compile("[ ; \\( \\) \\ ]").unwrap();
        let names: Vec<_> = c.tokens.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, [";", "(", ")", "\\"]);

        let (_, paren) = &c.tokens[1];
        assert!(paren.accepts("("));
        assert!(!paren.accepts("\\("));
        assert_eq!(c.priorities.get(";"), Some(4));
        assert_eq!(c.priorities.get("\\"), Some(1));
    }

    #[test]
    fn forward_references() {
        let c = compile("id: letter (letter | digit)*\nletter = [a-z]\ndigit = [0-9]\n").unwrap();
        assert_eq!(c.tokens.len(), 1);
        let (name, id) = &c.tokens[0];
        assert_eq!(name, "id");
        assert!(id.accepts("a1b2"));
        assert!(!id.accepts("1a"));
        assert!(c.union().matches("x9"));
    }

    #[test]
    fn unresolved() {
        let rules = parse("a: b\nb: a c\nc: x\nd: d\n").unwrap();
        match Session::with_max_attempts(5).compile(&rules) {
            Err(Error::Unresolved { names, attempts }) => {
                assert_eq!(attempts, 5);
                let mut names = names;
                names.sort();
                assert_eq!(names, ["a", "b", "d"]);
            },
            r => panic!("expected unresolved rules, got {r:?}"),
        }
    }

    #[test]
    fn duplicate_names() {
        for (src, dup) in [
            ("{ if }\nif: x y\n", "if"),
            // the rule is deferred until `y` compiles
            ("{ then }\nthen: y\ny = [a-z]\n", "then"),
            ("[ ; ]\n;: x\n", ";"),
            ("a = x\na: y\n", "a"),
            ("{ do do }", "do"),
        ] {
            match compile(src) {
                Err(Error::Duplicate(name)) => assert_eq!(name, dup, "{src:?}"),
                r => panic!("{src:?} compiled as {r:?}"),
            }
        }
    }

    #[test]
    fn errors() {
        assert!(matches!(compile(""), Err(Error::Empty)));
        assert!(matches!(
            compile("x: (a"),
            Err(Error::Compile { ref name, .. }) if name == "x"
        ));
    }
}
