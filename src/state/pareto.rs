/// A set of mutually non-dominated elements.
///
/// The dominance relation is supplied per call site as
/// "left dominates or equals right"; insertion rejects a candidate that
/// any member dominates-or-equals and evicts members the candidate
/// strictly dominates. The outcome is independent of insertion order.
#[derive(Debug, Clone)]
pub struct ParetoSet<T> {
    items: Vec<T>,
}

impl<T> Default for ParetoSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

/// Result of a [ParetoSet::try_insert].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    pub accepted: bool,
    pub dropped: usize,
}

impl<T> ParetoSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn try_insert(
        &mut self,
        candidate: T,
        dominates_or_equals: impl Fn(&T, &T) -> bool,
    ) -> Insertion {
        if self
            .items
            .iter()
            .any(|member| dominates_or_equals(member, &candidate))
        {
            return Insertion {
                accepted: false,
                dropped: 0,
            };
        }
        let before = self.items.len();
        self.items
            .retain(|member| !dominates_or_equals(&candidate, member));
        let dropped = before - self.items.len();
        self.items.push(candidate);
        Insertion {
            accepted: true,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    // Two-criteria minimization.
    fn dominates_or_equals(l: &(i32, i32), r: &(i32, i32)) -> bool {
        l.0 <= r.0 && l.1 <= r.1
    }

    #[test]
    fn dominated_candidates_are_rejected_and_evicted() {
        let mut set = ParetoSet::new();
        assert!(set.try_insert((5, 5), dominates_or_equals).accepted);
        // Worse on both: rejected.
        assert!(!set.try_insert((6, 6), dominates_or_equals).accepted);
        // Trade-off: kept.
        assert!(set.try_insert((3, 8), dominates_or_equals).accepted);
        // Dominates both members.
        let result = set.try_insert((3, 5), dominates_or_equals);
        assert!(result.accepted);
        assert_eq!(result.dropped, 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut set = ParetoSet::new();
        assert!(set.try_insert((5, 5), dominates_or_equals).accepted);
        assert!(!set.try_insert((5, 5), dominates_or_equals).accepted);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn frontier_is_independent_of_insertion_order() {
        let candidates: Vec<(i32, i32)> = vec![
            (1, 9),
            (2, 8),
            (3, 7),
            (5, 5),
            (9, 1),
            (4, 9),
            (2, 9),
            (9, 9),
            (5, 6),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut expected: Option<Vec<(i32, i32)>> = None;
        for _ in 0..50 {
            let mut shuffled = candidates.clone();
            shuffled.shuffle(&mut rng);
            let mut set = ParetoSet::new();
            for c in shuffled {
                set.try_insert(c, dominates_or_equals);
            }
            let mut front = set.as_slice().to_vec();
            front.sort_unstable();
            match &expected {
                None => expected = Some(front),
                Some(e) => assert_eq!(&front, e),
            }
        }
        let front = expected.unwrap();
        // No member dominates another.
        for l in &front {
            for r in &front {
                assert!(l == r || !dominates_or_equals(l, r));
            }
        }
    }
}
