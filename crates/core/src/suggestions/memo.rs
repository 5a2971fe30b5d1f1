//! Single-slot cache keyed by the cart fingerprint

use std::sync::Arc;

use super::types::{MemoOutcome, RankedSuggestions};
use crate::domain::cart::CartFingerprint;

#[derive(Debug, Default)]
pub struct RecomputeMemo {
    slot: Option<(CartFingerprint, Arc<RankedSuggestions>)>,
    computations: u64,
}

impl RecomputeMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored list when `fingerprint` matches the last computation,
    /// otherwise runs `compute` and stores its result.
    pub fn get_or_compute<F>(&mut self, fingerprint: CartFingerprint, compute: F) -> MemoOutcome
    where
        F: FnOnce() -> RankedSuggestions,
    {
        if let Some((stored, ranked)) = &self.slot {
            if *stored == fingerprint {
                return MemoOutcome::Unchanged(Arc::clone(ranked));
            }
        }

        let ranked = Arc::new(compute());
        self.computations += 1;
        self.slot = Some((fingerprint, Arc::clone(&ranked)));
        MemoOutcome::Fresh(ranked)
    }

    /// Forgets the stored result so the next request recomputes.
    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Number of times `compute` actually ran.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::RecomputeMemo;
    use crate::domain::cart::{Cart, CartFingerprint};
    use crate::suggestions::RankedSuggestions;

    fn fingerprint() -> CartFingerprint {
        Cart::default().fingerprint()
    }

    #[test]
    fn unchanged_fingerprint_skips_work() {
        let mut memo = RecomputeMemo::new();
        let mut calls = 0;

        let first = memo.get_or_compute(fingerprint(), || {
            calls += 1;
            RankedSuggestions::empty(&fingerprint())
        });
        let second = memo.get_or_compute(fingerprint(), || {
            calls += 1;
            RankedSuggestions::empty(&fingerprint())
        });

        assert!(first.is_fresh());
        assert!(!second.is_fresh());
        assert!(Arc::ptr_eq(first.suggestions(), second.suggestions()));
        assert_eq!(calls, 1);
        assert_eq!(memo.computations(), 1);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut memo = RecomputeMemo::new();
        memo.get_or_compute(fingerprint(), || RankedSuggestions::empty(&fingerprint()));
        memo.invalidate();

        let outcome =
            memo.get_or_compute(fingerprint(), || RankedSuggestions::empty(&fingerprint()));
        assert!(outcome.is_fresh());
        assert_eq!(memo.computations(), 2);
    }
}
