//! Set difference over relationship lists.

use std::collections::HashSet;
use std::hash::Hash;

/// Computes `(added, removed)` between two relationship lists.
///
/// `added` holds elements present only in `final_state`, `removed` those
/// present only in `initial`. Duplicates and ordering are irrelevant; the
/// diff is a set difference.
#[must_use]
pub fn diff_ids<T>(initial: &[T], final_state: &[T]) -> (HashSet<T>, HashSet<T>)
where
    T: Eq + Hash + Clone,
{
    let initial_set: HashSet<T> = initial.iter().cloned().collect();
    let final_set: HashSet<T> = final_state.iter().cloned().collect();
    let added = final_set.difference(&initial_set).cloned().collect();
    let removed = initial_set.difference(&final_set).cloned().collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(initial: &[&str], final_state: &[&str], added: &[&str], removed: &[&str]) {
        let (got_added, got_removed) = diff_ids(initial, final_state);
        assert_eq!(got_added, added.iter().copied().collect::<HashSet<_>>());
        assert_eq!(got_removed, removed.iter().copied().collect::<HashSet<_>>());
    }

    #[test]
    fn empty_lists() {
        check(&[], &[], &[], &[]);
    }

    #[test]
    fn empty_initial() {
        check(&[], &["a", "b", "c"], &["a", "b", "c"], &[]);
    }

    #[test]
    fn empty_final() {
        check(&["a", "b", "c"], &[], &[], &["a", "b", "c"]);
    }

    #[test]
    fn disjoint() {
        check(&["a", "b"], &["c"], &["c"], &["a", "b"]);
    }

    #[test]
    fn add_and_remove() {
        check(&["a", "b"], &["b", "c"], &["c"], &["a"]);
    }
}
