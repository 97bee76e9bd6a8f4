use std::{borrow::BorrowMut, collections::BTreeSet};

/// Depth-first worklist for computing reflexive-transitive closures over a
/// successor function
#[derive(Debug)]
pub struct ClosureBuilder<T>(Vec<T>);

impl<T> Default for ClosureBuilder<T> {
    #[inline]
    fn default() -> Self { Self(Vec::new()) }
}

impl<T> ClosureBuilder<T> {
    #[inline]
    pub fn init<I: IntoIterator<Item = T>>(&mut self, it: I) {
        assert!(self.0.is_empty());
        self.0.extend(it);
    }
}

impl<T: Copy + Ord> ClosureBuilder<T> {
    /// Drain the worklist into `set`, following `f` from every element that
    /// was not already present
    pub fn solve<S: BorrowMut<BTreeSet<T>>, I: IntoIterator<Item = T>>(
        &mut self,
        mut set: S,
        f: impl Fn(T) -> I,
    ) -> S {
        {
            let set = set.borrow_mut();

            while let Some(el) = self.0.pop() {
                if set.insert(el) {
                    self.0.extend(f(el).into_iter().filter(|n| !set.contains(n)));
                }
            }
        }

        set
    }
}
