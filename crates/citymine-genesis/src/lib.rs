//! citymine-genesis
//!
//! Builds the initial world from `GenesisParams`: protocol parameters, the
//! city wallet, and starting balances. Native funds are credited directly;
//! genesis tokens are minted so they count toward the token supply.
//!
//! Nothing here registers users or touches the chain; the first applied
//! block is height 1.

pub mod params;

pub use params::{Allocation, GenesisParams};

use citymine_core::error::CitymineError;
use citymine_core::ledger::AssetLedger;
use citymine_core::types::{Address, Asset, Balance};
use citymine_crypto::blake3_hash;
use citymine_state::World;
use tracing::info;

/// Validate `params` and build the genesis world.
pub fn apply_genesis(params: &GenesisParams) -> Result<World, CitymineError> {
    info!("applying citymine genesis state");
    params.params.validate()?;
    check_allocations(params)?;

    let mut world = World::new(params.params.clone(), params.city_wallet.clone());

    let mut native_total: Balance = 0;
    for alloc in &params.allocations {
        if alloc.native > 0 {
            world.assets.fund_native(&alloc.address, alloc.native);
            native_total += alloc.native;
        }
        if alloc.token > 0 {
            world.assets.mint(Asset::Token, &alloc.address, alloc.token)?;
        }
    }
    info!(
        accounts = params.allocations.len(),
        native_total,
        token_supply = world.assets.token_supply(),
        "genesis: allocations credited"
    );
    info!(
        city_wallet = %params.city_wallet,
        threshold = params.params.activation_threshold,
        cycle_length = params.params.reward_cycle_length,
        "genesis state ready"
    );
    Ok(world)
}

/// BLAKE3 of the canonical JSON encoding. Stored alongside the database so a
/// restart with different genesis params can be detected.
pub fn genesis_fingerprint(params: &GenesisParams) -> Result<[u8; 32], CitymineError> {
    let json = serde_json::to_vec(params).map_err(|e| CitymineError::Serialization(e.to_string()))?;
    Ok(blake3_hash(&json))
}

fn check_allocations(params: &GenesisParams) -> Result<(), CitymineError> {
    let escrow = Address::protocol();
    let mut seen = std::collections::BTreeSet::new();
    for alloc in &params.allocations {
        if alloc.address == escrow {
            return Err(CitymineError::InvalidParams(
                "genesis may not allocate to the protocol escrow".into(),
            ));
        }
        if !seen.insert(&alloc.address) {
            return Err(CitymineError::InvalidParams(format!(
                "duplicate genesis allocation for {}",
                alloc.address
            )));
        }
    }
    Ok(())
}
