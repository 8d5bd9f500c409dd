pub mod activation;
pub mod assets;
pub mod cycle_tree;
pub mod db;
pub mod engine;
pub mod mining;
pub mod query;
pub mod rewards;
pub mod stacking;
pub mod state;
pub mod users;

pub use activation::ActivationGate;
pub use assets::{AssetBook, Holdings};
pub use cycle_tree::CycleDeltaTree;
pub use db::StateDb;
pub use engine::StateEngine;
pub use mining::{select_winner, MiningLedger};
pub use query::ProtocolQuery;
pub use rewards::RewardEngine;
pub use stacking::StackingLedger;
pub use state::{ChainRecord, ProtocolState, World};
pub use users::UserRegistry;
