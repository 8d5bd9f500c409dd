//! Additive interval ledger over reward cycles.
//!
//! A range write `[first, last] += amount` is stored as two point deltas:
//! `+amount` at `first` and `-amount` at `last + 1`. The value at a cycle is
//! the prefix sum of all deltas up to it. Positive and negative deltas live in
//! separate Fenwick trees so the arithmetic stays unsigned; the negative
//! prefix never exceeds the positive prefix because every end delta sits
//! strictly after its start delta.
//!
//! Writes and point reads are O(log n) in the highest cycle touched.

use citymine_core::types::{Balance, RewardCycle};
use serde::{Deserialize, Serialize};

/// Fenwick tree over 1-based indices whose capacity doubles on demand.
/// `tree[0]` is unused; capacity is `tree.len() - 1` and is always a power
/// of two once allocated.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Fenwick {
    tree: Vec<Balance>,
}

impl Fenwick {
    fn capacity(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    fn grow_to(&mut self, index: usize) {
        if self.tree.is_empty() {
            self.tree = vec![0; 2];
        }
        while self.capacity() < index {
            // Doubling a power-of-two tree only adds one non-zero node: the
            // new root at 2n covers (0, 2n] and inherits the old total.
            let n = self.capacity();
            let total = self.prefix(n);
            self.tree.resize(2 * n + 1, 0);
            self.tree[2 * n] = total;
        }
    }

    fn add(&mut self, index: usize, amount: Balance) {
        self.grow_to(index);
        let cap = self.capacity();
        let mut i = index;
        while i <= cap {
            self.tree[i] += amount;
            i += i & i.wrapping_neg();
        }
    }

    fn prefix(&self, index: usize) -> Balance {
        let mut i = index.min(self.capacity());
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }
}

/// Cycle-indexed additive range map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CycleDeltaTree {
    starts: Fenwick,
    ends: Fenwick,
}

impl CycleDeltaTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to every cycle in `[first, last]`.
    pub fn add_range(&mut self, first: RewardCycle, last: RewardCycle, amount: Balance) {
        if amount == 0 || last < first {
            return;
        }
        // Cycle c lives at Fenwick index c + 1.
        self.starts.add(first as usize + 1, amount);
        self.ends.add(last as usize + 2, amount);
    }

    /// Accumulated value at `cycle`; 0 for cycles never covered.
    pub fn value_at(&self, cycle: RewardCycle) -> Balance {
        let idx = usize::try_from(cycle).map_or(usize::MAX, |c| c.saturating_add(1));
        self.starts.prefix(idx) - self.ends.prefix(idx)
    }
}
