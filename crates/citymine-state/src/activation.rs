use citymine_core::clock::ProtocolClock;
use citymine_core::error::CitymineError;
use citymine_core::types::{Address, BlockHeight, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::users::UserRegistry;

/// Registration counter that schedules activation once the threshold is met.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivationGate {
    registered_count: u32,
    threshold: u32,
    delay: u64,
    activation_height: Option<BlockHeight>,
}

impl ActivationGate {
    pub fn new(threshold: u32, delay: u64) -> Self {
        Self { registered_count: 0, threshold, delay, activation_height: None }
    }

    pub fn registered_count(&self) -> u32 {
        self.registered_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// True once the threshold has been met and the activation block fixed.
    pub fn is_scheduled(&self) -> bool {
        self.activation_height.is_some()
    }

    /// Validate a registration without touching any state.
    pub fn check_register(&self, users: &UserRegistry, principal: &Address) -> Result<(), CitymineError> {
        if users.id_of(principal).is_some() {
            return Err(CitymineError::AlreadyRegistered);
        }
        if self.is_scheduled() {
            return Err(CitymineError::ActivationThresholdReached);
        }
        Ok(())
    }

    /// Register `principal` at `current_height`. The registration that brings
    /// the count to the threshold fixes the activation block.
    pub fn register(
        &mut self,
        users: &mut UserRegistry,
        principal: &Address,
        current_height: BlockHeight,
    ) -> Result<UserId, CitymineError> {
        self.check_register(users, principal)?;

        let id = users.get_or_create(principal);
        self.registered_count += 1;

        if self.registered_count == self.threshold && self.activation_height.is_none() {
            let at = current_height + self.delay;
            self.activation_height = Some(at);
            info!(
                registered = self.registered_count,
                activation_height = at,
                "activation threshold reached"
            );
        }
        Ok(id)
    }

    pub fn activation_height(&self) -> Result<BlockHeight, CitymineError> {
        self.activation_height.ok_or(CitymineError::NotActivated)
    }

    pub fn is_activated(&self, height: BlockHeight) -> bool {
        matches!(self.activation_height, Some(at) if height >= at)
    }

    /// Cycle clock, available once activation is scheduled.
    pub fn clock(&self, cycle_length: u64) -> Option<ProtocolClock> {
        self.activation_height.map(|at| ProtocolClock::new(at, cycle_length))
    }

    /// Lower the threshold before activation. Used by genesis and devnets
    /// that want a single-registrant network.
    pub fn set_threshold(&mut self, threshold: u32) {
        if self.activation_height.is_none() {
            self.threshold = threshold;
        }
    }
}
