use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::automaton::{Automaton, StateId};

type Signature = Vec<Option<usize>>;

/// Split every group by where its members' transitions land
fn refine(dfa: &Automaton, symbols: &[char], groups: &[Vec<StateId>]) -> Vec<Vec<StateId>> {
    let mut group_of = vec![0; dfa.len()];
    for (i, group) in groups.iter().enumerate() {
        for state in group {
            group_of[state.index()] = i;
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        let mut split: IndexMap<Signature, Vec<StateId>> = IndexMap::new();

        for &state in group {
            let sig = symbols
                .iter()
                .map(|&c| dfa.next(state, c).map(|n| group_of[n.index()]))
                .collect();
            split.entry(sig).or_default().push(state);
        }

        out.extend(split.into_values());
    }

    out
}

/// Moore partition refinement, starting from accepting vs. non-accepting
pub(super) fn run(dfa: &Automaton) -> Automaton {
    let symbols: Vec<char> = dfa.alphabet().iter().copied().collect();
    let (accept, reject): (Vec<_>, Vec<_>) = dfa.ids().partition(|&s| dfa.is_accepting(s));
    let mut groups: Vec<_> = [accept, reject]
        .into_iter()
        .filter(|g| !g.is_empty())
        .collect();

    let mut passes = 0_usize;
    loop {
        let next = refine(dfa, &symbols, &groups);
        passes += 1;

        if next.len() == groups.len() {
            break;
        }
        groups = next;
    }

    if let Some(pos) = dfa
        .start()
        .and_then(|s| groups.iter().position(|g| g.contains(&s)))
    {
        groups[..=pos].rotate_right(1);
    }

    trace!(
        before = dfa.len(),
        after = groups.len(),
        passes,
        "Minimized automaton"
    );

    let mut out = Automaton::with_epsilon(dfa.epsilon());
    out.set_regex(dfa.regex());
    for &c in &symbols {
        out.add_symbol(c);
    }

    let mut merged = vec![StateId::new(0); dfa.len()];
    for group in &groups {
        let accepting: Vec<StateId> = group
            .iter()
            .copied()
            .filter(|&s| dfa.is_accepting(s))
            .collect();

        let id = if accepting.is_empty() {
            out.insert()
        } else {
            let token = accepting.iter().find_map(|&s| dfa.state(s).token());
            let id = out.insert_accept(token.map(Into::into));
            let names: BTreeSet<String> = accepting
                .iter()
                .filter_map(|&s| dfa.token_set(s))
                .flatten()
                .cloned()
                .collect();
            out.add_tokens(id, names);
            id
        };

        for state in group {
            merged[state.index()] = id;
        }
    }

    // every member of a group agrees on its transitions, so any one will do
    for (group, id) in groups.iter().zip(out.ids()) {
        let rep = group[0];
        for &c in &symbols {
            if let Some(to) = dfa.next(rep, c) {
                out.connect(id, merged[to.index()], Some(c));
            }
        }
    }

    if !groups.is_empty() {
        out.set_start(StateId::new(0));
    }

    out
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeSet, VecDeque};

    use proptest::prelude::*;

    use crate::{
        automaton::{Automaton, StateId},
        dfa::Dfa,
    };

    /// Every pair of states must be told apart by some input string
    fn assert_minimal(dfa: &Automaton) {
        let ids: Vec<StateId> = dfa.ids().collect();
        let mut distinct = BTreeSet::new();
        let mut queue = VecDeque::new();

        for &a in &ids {
            for &b in &ids {
                if a < b && dfa.is_accepting(a) != dfa.is_accepting(b) {
                    distinct.insert((a, b));
                    queue.push_back((a, b));
                }
            }
        }

        while let Some((a, b)) = queue.pop_front() {
            for &p in &ids {
                for &q in &ids {
                    if p >= q || distinct.contains(&(p, q)) {
                        continue;
                    }

                    let leads = dfa.alphabet().iter().any(|&c| {
                        let (x, y) = (dfa.next(p, c), dfa.next(q, c));
                        matches!((x, y), (Some(x), Some(y)) if (x.min(y), x.max(y)) == (a, b))
                    });

                    if leads {
                        distinct.insert((p, q));
                        queue.push_back((p, q));
                    }
                }
            }
        }

        let pairs = ids.len() * ids.len().saturating_sub(1) / 2;
        assert_eq!(distinct.len(), pairs, "{dfa:?} is not minimal");
    }

    fn sample() -> Automaton {
        // (a|b)*abb, the textbook case with a redundant state after subset
        // construction
        let ab = Automaton::symbol('a').union(&Automaton::symbol('b'));
        ab.kleene().concat(&Automaton::literal("abb"))
    }

    #[test]
    fn textbook() {
        let dfa = Dfa::from_nfa(&sample()).unwrap();
        let min = dfa.minimize();
        let a = min.as_automaton();

        // four live states plus nothing else; the language never traps
        assert_eq!(a.len(), 4);
        assert_eq!(a.start(), Some(StateId::new(0)));
        assert!(a.is_total());
        assert_minimal(a);
        assert!(min.accepts("babb"));
        assert!(!min.accepts("abba"));
    }

    #[test]
    fn idempotent() {
        let once = Dfa::from_nfa(&sample()).unwrap().minimize();
        let twice = once.minimize();
        assert_eq!(once.as_automaton().len(), twice.as_automaton().len());
        assert_eq!(
            once.as_automaton().transition_table(),
            twice.as_automaton().transition_table()
        );
    }

    #[test]
    fn keeps_primary_token() {
        let mut nfa = Automaton::literal("ab").union(&Automaton::literal("cb"));
        nfa.set_token("pair");
        let min = Dfa::from_nfa(&nfa).unwrap().minimize();
        let a = min.as_automaton();

        let acc: Vec<_> = a.accepting().collect();
        assert_eq!(acc.len(), 1);
        assert_eq!(a.state(acc[0]).token(), Some("pair"));
        // start, after a|c, accept, dead
        assert_eq!(a.len(), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn preserves_language(
            words in prop::collection::vec("[ab]{1,4}", 1..5),
            probe in "[ab]{0,6}",
        ) {
            let nfa = words
                .iter()
                .map(|w| Automaton::literal(w))
                .reduce(|a, b| a.union(&b))
                .unwrap()
                .kleene();
            let dfa = Dfa::from_nfa(&nfa).unwrap();
            let min = dfa.minimize();

            assert_minimal(min.as_automaton());
            prop_assert!(min.as_automaton().len() <= dfa.as_automaton().len());
            prop_assert_eq!(min.accepts(&probe), nfa.matches(&probe));
        }
    }
}
