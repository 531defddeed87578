//! Aggregation policies for operations applied across several resources
//!
//! Disabling and pausing must never partially succeed unnoticed, so they
//! stop at the first failure. Enabling and resuming are recovery paths and
//! try every resource regardless.

/// How per-resource results fold into one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Stop at the first failure; remaining items are not visited.
    AllOrAbort,
    /// Visit every item; the verdict is the AND of all results.
    BestEffortAll,
}

impl Aggregation {
    /// Apply `op` to `items` under this policy.
    pub fn apply<I, F>(self, items: I, mut op: F) -> bool
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> bool,
    {
        let mut success = true;
        for item in items {
            if !op(item) {
                success = false;
                if self == Aggregation::AllOrAbort {
                    break;
                }
            }
        }
        success
    }

    pub fn name(self) -> &'static str {
        match self {
            Aggregation::AllOrAbort => "all-or-abort",
            Aggregation::BestEffortAll => "best-effort-all",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_or_abort_stops_at_first_failure() {
        let mut visited = Vec::new();
        let ok = Aggregation::AllOrAbort.apply([1, 2, 3, 4], |i| {
            visited.push(i);
            i != 2
        });
        assert!(!ok);
        assert_eq!(visited, vec![1, 2]);
    }

    #[test]
    fn test_best_effort_visits_everything() {
        let mut visited = Vec::new();
        let ok = Aggregation::BestEffortAll.apply([1, 2, 3, 4], |i| {
            visited.push(i);
            i != 2
        });
        assert!(!ok);
        assert_eq!(visited, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_input_succeeds() {
        let empty: Vec<u8> = Vec::new();
        assert!(Aggregation::AllOrAbort.apply(empty.clone(), |_| false));
        assert!(Aggregation::BestEffortAll.apply(empty, |_| false));
    }

    #[test]
    fn test_all_successes() {
        assert!(Aggregation::AllOrAbort.apply(["a", "b"], |_| true));
        assert!(Aggregation::BestEffortAll.apply(["a", "b"], |_| true));
    }
}
