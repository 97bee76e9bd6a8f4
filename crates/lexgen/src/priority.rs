use std::{fmt, num::ParseIntError, str::FromStr};

use indexmap::IndexMap;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Line {line}: expected `<token> <priority>`, found {text:?}")]
    Malformed { line: usize, text: String },
    #[error("Line {line}: invalid priority {text:?}")]
    Priority {
        line: usize,
        text: String,
        #[source]
        source: ParseIntError,
    },
}

/// Ranks used to pick one token name when a lexeme matches several rules
///
/// Higher ranks win.  Insertion order is kept so the table renders in the
/// order tokens were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityTable(IndexMap<String, i64>);

impl PriorityTable {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Rank `names` so that earlier names beat later ones: the first of `n`
    /// distinct names gets `n`, the last gets 1.  Repeated names keep their
    /// first position.
    pub fn from_declaration_order<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        let mut map = IndexMap::new();
        for name in names {
            map.entry(name.into()).or_insert(0);
        }

        let n = map.len();
        for (i, rank) in map.values_mut().enumerate() {
            *rank = i64::try_from(n - i).unwrap_or(i64::MAX);
        }

        Self(map)
    }

    pub fn insert(&mut self, name: impl Into<String>, rank: i64) -> Option<i64> {
        self.0.insert(name.into(), rank)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> { self.0.get(name).copied() }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Pick the highest-ranked of `names`.  Names missing from the table rank
    /// below every listed one; ties go to the lexicographically smallest name.
    pub fn resolve<'n, I: IntoIterator<Item = &'n str>>(&self, names: I) -> Option<&'n str> {
        names
            .into_iter()
            .max_by(|a, b| self.get(a).cmp(&self.get(b)).then_with(|| b.cmp(a)))
    }
}

impl FromStr for PriorityTable {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = IndexMap::new();

        for (i, text) in s.lines().enumerate() {
            let line = i + 1;
            let mut parts = text.split_whitespace();

            let (name, rank) = match (parts.next(), parts.next(), parts.next()) {
                (None, ..) => continue,
                (Some(name), Some(rank), None) => (name, rank),
                _ => {
                    return Err(ParseError::Malformed {
                        line,
                        text: text.into(),
                    });
                },
            };

            let rank = rank.parse().map_err(|source| ParseError::Priority {
                line,
                text: rank.into(),
                source,
            })?;
            map.insert(name.to_owned(), rank);
        }

        Ok(Self(map))
    }
}

impl fmt::Display for PriorityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .iter()
            .try_for_each(|(name, rank)| writeln!(f, "{name} {rank}"))
    }
}
