//! Thompson-style combinators.  Every combinator copies its operands into a
//! fresh arena, so the inputs are left untouched.

use super::{Automaton, StateId};

impl Automaton {
    /// Two states joined by a single edge on `c`
    #[must_use]
    pub fn symbol(c: char) -> Self {
        let mut out = Self::new();
        let s = out.insert();
        let f = out.insert_accept(Some(c.into()));
        out.connect(s, f, Some(c));
        out.start = Some(s);
        out.regex = format!("({c})");
        out
    }

    /// Two states joined by an epsilon edge, accepting only the empty string
    #[must_use]
    pub fn empty_string() -> Self {
        let mut out = Self::new();
        let epsilon = out.epsilon.clone();
        let s = out.insert();
        let f = out.insert_accept(Some(epsilon));
        out.connect(s, f, None);
        out.start = Some(s);
        out.regex = format!("({})", out.epsilon);
        out
    }

    /// The concatenation of one symbol automaton per character of `word`
    #[must_use]
    pub fn literal(word: &str) -> Self {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            return Self::empty_string();
        };

        let mut out = chars.fold(Self::symbol(first), |a, c| a.concat(&Self::symbol(c)));
        out.regex = format!("({word})");
        out
    }

    /// The single symbol this automaton consists of, if it is exactly the
    /// output of [`symbol`](Self::symbol)
    #[must_use]
    pub fn as_symbol(&self) -> Option<char> {
        let start = self.start?;
        if self.states.len() != 2 || self.alphabet.len() != 1 {
            return None;
        }

        let s = self.state(start);
        let (c, to) = s.edges().next()?;
        (s.nil.is_empty() && to.len() == 1 && to.first().is_some_and(|&f| self.is_accepting(f)))
            .then_some(c)
    }

    #[must_use]
    pub fn union(&self, rhs: &Self) -> Self {
        let mut out = Self::with_epsilon(&self.epsilon);
        let start = out.insert();
        let l = out.absorb(self);
        let r = out.absorb(rhs);
        out.connect(start, self.expect_start().offset(l), None);
        out.connect(start, rhs.expect_start().offset(r), None);
        out.start = Some(start);
        out.regex = format!("({}|{})", self.regex, rhs.regex);
        out
    }

    #[must_use]
    pub fn concat(&self, rhs: &Self) -> Self {
        let mut out = Self::with_epsilon(&self.epsilon);
        let l = out.absorb(self);
        let r = out.absorb(rhs);
        let tail = rhs.expect_start().offset(r);

        for acc in self.accepting().map(|a| a.offset(l)) {
            out.set_accepting(acc, false);
            out.connect(acc, tail, None);
        }

        out.start = Some(self.expect_start().offset(l));
        out.regex = format!("({}{})", self.regex, rhs.regex);
        out
    }

    /// Zero or more repetitions
    #[must_use]
    pub fn kleene(&self) -> Self {
        let mut out = self.loop_around(true);
        out.regex = format!("({})*", self.regex);
        out
    }

    /// One or more repetitions
    #[must_use]
    pub fn positive(&self) -> Self {
        let mut out = self.loop_around(false);
        out.regex = format!("({})+", self.regex);
        out
    }

    fn loop_around(&self, skippable: bool) -> Self {
        let mut out = Self::with_epsilon(&self.epsilon);
        let head = out.insert();
        let off = out.absorb(self);
        let tail = out.insert_accept(None);

        out.connect(head, self.expect_start().offset(off), None);
        out.connect(tail, head, None);
        if skippable {
            out.connect(head, tail, None);
        }

        let accepting: Vec<StateId> = self.accepting().map(|a| a.offset(off)).collect();
        for acc in accepting {
            out.set_accepting(acc, false);
            out.connect(acc, tail, None);
        }

        out.start = Some(head);
        out
    }

    /// The union of every symbol from `lo` to `hi` inclusive
    ///
    /// # Panics
    /// This function panics if `lo` is greater than `hi`.
    #[must_use]
    pub fn range(lo: char, hi: char) -> Self {
        assert!(lo <= hi, "Invalid character range {lo:?}-{hi:?}");
        let mut out = (lo..=hi)
            .skip(1)
            .fold(Self::symbol(lo), |a, c| a.union(&Self::symbol(c)));
        out.regex = format!("({lo}-{hi})");
        out
    }

    /// A fresh start state with an epsilon edge to each input's start state.
    /// Accepting states keep their token names.
    ///
    /// An empty input yields an automaton with no states and no start state.
    pub fn union_all<'a, I: IntoIterator<Item = &'a Self>>(it: I) -> Self {
        let mut it = it.into_iter().peekable();
        let Some(first) = it.peek() else {
            return Self::new();
        };

        let mut out = Self::with_epsilon(&first.epsilon);
        let start = out.insert();
        out.start = Some(start);

        let mut parts = vec![];
        for a in it {
            let off = out.absorb(a);
            out.connect(start, a.expect_start().offset(off), None);
            parts.push(format!("({})", a.regex));
        }

        out.regex = format!("({})", parts.join("|"));
        out
    }
}
