//! Text and JSON forms of an [`Automaton`]
//!
//! The text form is line-oriented:
//!
//! ```text
//! States: 0 1 2
//! Input Symbols: a b
//! Start State: 0
//! Final States: 2
//! Transition Function:
//! f(0, a) = 1
//! f(1, b) = 2
//!
//! Regex: ((a)(b))
//! Tokens:
//! [2]: ab
//!
//! ```
//!
//! Symbols are written with Rust-style escapes, with whitespace always
//! spelled as `\u{..}` so it survives the whitespace-separated lists.
//! Decoding is lenient: malformed lines are logged and skipped.

use std::{collections::BTreeMap, fmt};

use hashbrown::HashMap;
use serde::Serialize;
use tracing::warn;

use super::{Automaton, StateId};

fn escape(c: char) -> String {
    if c.is_whitespace() {
        c.escape_unicode().to_string()
    } else {
        c.escape_default().to_string()
    }
}

fn unescape(s: &str) -> Option<char> {
    let Some(esc) = s.strip_prefix('\\') else {
        let mut chars = s.chars();
        return chars.next().filter(|_| chars.next().is_none());
    };

    match esc {
        "n" => Some('\n'),
        "r" => Some('\r'),
        "t" => Some('\t'),
        "0" => Some('\0'),
        "\\" | "'" | "\"" => esc.chars().next(),
        _ => {
            let hex = esc.strip_prefix("u{")?.strip_suffix('}')?;
            char::from_u32(u32::from_str_radix(hex, 16).ok()?)
        },
    }
}

impl Automaton {
    fn fmt_symbol(&self, by: Option<char>) -> String {
        by.map_or_else(|| self.epsilon.clone(), escape)
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            head: &str,
            it: impl IntoIterator<Item = T>,
        ) -> fmt::Result {
            f.write_str(head)?;
            for el in it {
                write!(f, " {el}")?;
            }
            writeln!(f)
        }

        list(f, "States:", self.ids())?;
        list(f, "Input Symbols:", self.alphabet.iter().map(|&c| escape(c)))?;
        list(f, "Start State:", self.start)?;
        list(f, "Final States:", self.accepting())?;

        writeln!(f, "Transition Function:")?;
        for (from, by, to) in self.transitions() {
            writeln!(f, "f({from}, {}) = {to}", self.fmt_symbol(by))?;
        }
        writeln!(f)?;

        writeln!(f, "Regex: {}", self.regex)?;
        writeln!(f, "Tokens:")?;
        for id in self.accepting() {
            let names = self.token_names(id);
            if !names.is_empty() {
                write!(f, "[{id}]:")?;
                list(f, "", names)?;
            }
        }
        writeln!(f)
    }
}

fn parse_transition(line: &str) -> Option<(&str, &str, &str)> {
    let body = line.trim().strip_prefix("f(")?;
    let (from, rest) = body.split_once(", ")?;
    let (by, to) = rest.rsplit_once(") = ")?;
    Some((from.trim(), by, to.trim()))
}

struct Decoder {
    out: Automaton,
    ids: HashMap<u32, StateId>,
}

impl Decoder {
    fn state(&self, s: &str) -> Option<StateId> {
        let id = s.trim().parse::<u32>().ok().and_then(|n| self.ids.get(&n).copied());
        if id.is_none() {
            warn!(id = s, "Reference to unknown state");
        }
        id
    }

    fn declare(&mut self, s: &str) {
        match s.parse::<u32>() {
            Ok(n) => {
                let out = &mut self.out;
                self.ids.entry(n).or_insert_with(|| out.insert());
            },
            Err(e) => warn!(id = s, %e, "Invalid state ID"),
        }
    }

    fn transition(&mut self, line: &str) {
        let Some((from, by, to)) = parse_transition(line) else {
            return;
        };
        let (Some(from), Some(to)) = (self.state(from), self.state(to)) else {
            return;
        };

        let by = if by == self.out.epsilon {
            None
        } else if let Some(c) = unescape(by) {
            Some(c)
        } else {
            warn!(symbol = by, "Invalid transition symbol");
            return;
        };

        self.out.connect(from, to, by);
    }

    fn tokens(&mut self, line: &str) {
        let Some((id, names)) = line
            .trim()
            .strip_prefix('[')
            .and_then(|l| l.split_once("]:"))
        else {
            warn!(line, "Malformed token line");
            return;
        };
        let Some(id) = self.state(id) else { return };
        let names: Vec<String> = names.split_whitespace().map(Into::into).collect();

        let Some(primary) = names.first() else {
            warn!(%id, "Token line lists no names");
            return;
        };

        self.out.set_accepting(id, true);
        if self.out.state(id).token().is_none() {
            self.out.set_state_token(id, primary.clone());
        }
        self.out.add_tokens(id, names);
    }
}

/// Parse the text form written by [`Automaton`]'s [`Display`](fmt::Display)
/// implementation
#[must_use]
pub fn decode(text: &str) -> Automaton {
    let mut dec = Decoder {
        out: Automaton::new(),
        ids: HashMap::new(),
    };
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let line = line.trim_end();

        if let Some(rest) = line.strip_prefix("States:") {
            for id in rest.split_whitespace() {
                dec.declare(id);
            }
        } else if let Some(rest) = line.strip_prefix("Input Symbols:") {
            for sym in rest.split_whitespace() {
                match unescape(sym) {
                    Some(c) => dec.out.add_symbol(c),
                    None => warn!(symbol = sym, "Invalid input symbol"),
                }
            }
        } else if let Some(rest) = line.strip_prefix("Start State:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                if let Some(id) = dec.state(rest) {
                    dec.out.set_start(id);
                }
            }
        } else if let Some(rest) = line.strip_prefix("Final States:") {
            let ids: Vec<_> = rest.split_whitespace().filter_map(|s| dec.state(s)).collect();
            for id in ids {
                dec.out.set_accepting(id, true);
            }
        } else if line.starts_with("Transition Function:") {
            while let Some(t) = lines.next_if(|l| parse_transition(l).is_some()) {
                dec.transition(t);
            }
        } else if let Some(rest) = line.strip_prefix("Regex:") {
            dec.out.set_regex(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.starts_with("Tokens:") {
            while let Some(t) = lines.next_if(|l| !l.trim().is_empty()) {
                dec.tokens(t);
            }
        } else if !line.trim().is_empty() {
            warn!(line, "Unrecognized line in stored automaton");
        }
    }

    dec.out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonAutomaton {
    transitions: BTreeMap<u32, BTreeMap<String, String>>,
    start_state: Option<String>,
    accept_states: Vec<String>,
}

#[derive(Debug, Serialize)]
struct JsonDocument {
    #[serde(rename = "type")]
    ty: &'static str,
    dfa: JsonAutomaton,
}

/// Render the JSON interchange form.  Nondeterministic edges list every
/// destination, space-separated.
///
/// # Errors
/// This function fails if serialization fails.
pub fn to_json(automaton: &Automaton) -> serde_json::Result<String> {
    let mut transitions: BTreeMap<u32, BTreeMap<String, String>> = automaton
        .ids()
        .map(|id| (id.get(), BTreeMap::new()))
        .collect();

    for (from, by, to) in automaton.transitions() {
        let dest = transitions
            .entry(from.get())
            .or_default()
            .entry(automaton.fmt_symbol(by))
            .or_default();
        if !dest.is_empty() {
            dest.push(' ');
        }
        dest.push_str(&to.to_string());
    }

    serde_json::to_string_pretty(&JsonDocument {
        ty: "DFA",
        dfa: JsonAutomaton {
            transitions,
            start_state: automaton.start().map(|s| s.to_string()),
            accept_states: automaton.accepting().map(|s| s.to_string()).collect(),
        },
    })
}
