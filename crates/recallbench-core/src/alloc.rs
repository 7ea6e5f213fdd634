//! Collision-free random ID allocation.
//!
//! Memories that survive both matching passes without an ID get a fresh one
//! drawn from a reserved numeric band: four significant digits behind a
//! leading zero, so allocated IDs render as `0XXXX` and can never collide
//! with ground-truth fact IDs outside that band. Every draw is checked
//! against the full existing-ID set; collisions are retried, not
//! overwritten, with a bound so band exhaustion is detected instead of
//! spinning forever.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use rand::Rng;

use recallbench_types::error::AllocError;

/// The band freshly allocated memory IDs are drawn from (`01000`..=`09999`).
pub const MEMORY_ID_BAND: RangeInclusive<i64> = 1_000..=9_999;

/// Draw attempts before declaring the band exhausted.
const MAX_ATTEMPTS: usize = 100_000;

/// Generates fixed-width random IDs that avoid an existing-ID set.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    band: RangeInclusive<i64>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            band: MEMORY_ID_BAND,
        }
    }
}

impl IdAllocator {
    /// Allocator over a custom band. Used by tests; production callers use
    /// [`Default`], which covers the memory band.
    pub fn with_band(band: RangeInclusive<i64>) -> Self {
        Self { band }
    }

    /// Produce an ID not present in `existing`, inserting it into the set
    /// before returning so the next allocation in the same run cannot
    /// duplicate it.
    pub fn allocate(&self, existing: &mut HashSet<i64>) -> Result<i64, AllocError> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_ATTEMPTS {
            let candidate = rng.gen_range(self.band.clone());
            if existing.insert(candidate) {
                return Ok(candidate);
            }
        }
        Err(AllocError::BandExhausted(MAX_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_ids_are_in_band() {
        let allocator = IdAllocator::default();
        let mut existing = HashSet::new();
        for _ in 0..100 {
            let id = allocator.allocate(&mut existing).unwrap();
            assert!(MEMORY_ID_BAND.contains(&id));
        }
    }

    #[test]
    fn test_sequential_allocations_are_pairwise_distinct() {
        let allocator = IdAllocator::default();
        let mut existing: HashSet<i64> = [1, 2, 3].into_iter().collect();
        let mut allocated = Vec::new();
        for _ in 0..500 {
            allocated.push(allocator.allocate(&mut existing).unwrap());
        }
        let unique: HashSet<i64> = allocated.iter().copied().collect();
        assert_eq!(unique.len(), allocated.len());
        assert!(!unique.contains(&1));
    }

    #[test]
    fn test_avoids_seed_set() {
        let allocator = IdAllocator::with_band(1..=2);
        let mut existing: HashSet<i64> = [1].into_iter().collect();
        assert_eq!(allocator.allocate(&mut existing).unwrap(), 2);
    }

    #[test]
    fn test_exhausted_band_is_detected() {
        let allocator = IdAllocator::with_band(1..=3);
        let mut existing: HashSet<i64> = [1, 2, 3].into_iter().collect();
        assert!(matches!(
            allocator.allocate(&mut existing),
            Err(AllocError::BandExhausted(_))
        ));
    }
}
