use serde::{Deserialize, Serialize};

use crate::types::{BlockHeight, RewardCycle};

/// Reward-cycle arithmetic anchored at the activation block.
///
/// Every component that needs a cycle boundary goes through this type, so the
/// mining split and the stacking window can never disagree about which cycle
/// a height belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolClock {
    activation_height: BlockHeight,
    cycle_length: u64,
}

impl ProtocolClock {
    /// `cycle_length` must be non-zero; `ProtocolParams::validate` enforces it.
    pub fn new(activation_height: BlockHeight, cycle_length: u64) -> Self {
        Self { activation_height, cycle_length }
    }

    pub fn activation_height(&self) -> BlockHeight {
        self.activation_height
    }

    pub fn cycle_length(&self) -> u64 {
        self.cycle_length
    }

    /// Cycle containing `height`, or `None` before activation.
    pub fn cycle_of(&self, height: BlockHeight) -> Option<RewardCycle> {
        height
            .checked_sub(self.activation_height)
            .map(|offset| offset / self.cycle_length)
    }

    /// First block height of `cycle`.
    pub fn first_block_of(&self, cycle: RewardCycle) -> BlockHeight {
        self.activation_height + cycle * self.cycle_length
    }

    /// Inclusive cycle window `[current + 1, current + lock_period]` covered by
    /// a stacking action submitted at `height`.
    pub fn stacking_window(
        &self,
        height: BlockHeight,
        lock_period: u32,
    ) -> Option<(RewardCycle, RewardCycle)> {
        let current = self.cycle_of(height)?;
        Some((current + 1, current + lock_period as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_before_activation() {
        let clock = ProtocolClock::new(150, 2_100);
        assert_eq!(clock.cycle_of(0), None);
        assert_eq!(clock.cycle_of(149), None);
        assert_eq!(clock.cycle_of(150), Some(0));
    }

    #[test]
    fn boundaries_agree_with_first_block() {
        let clock = ProtocolClock::new(151, 10);
        for cycle in 0..50 {
            let first = clock.first_block_of(cycle);
            assert_eq!(clock.cycle_of(first), Some(cycle));
            assert_eq!(clock.cycle_of(first + 9), Some(cycle));
            assert_eq!(clock.cycle_of(first + 10), Some(cycle + 1));
        }
    }

    #[test]
    fn stacking_window_starts_next_cycle() {
        let clock = ProtocolClock::new(100, 10);
        assert_eq!(clock.stacking_window(100, 1), Some((1, 1)));
        assert_eq!(clock.stacking_window(135, 8), Some((4, 11)));
        assert_eq!(clock.stacking_window(99, 8), None);
    }
}
