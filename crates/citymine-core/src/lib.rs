pub mod action;
pub mod clock;
pub mod coinbase;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod params;
pub mod types;

pub use action::*;
pub use clock::ProtocolClock;
pub use coinbase::{coinbase_amount, CoinbaseSchedule};
pub use constants::*;
pub use error::{AddressParseError, CitymineError, MintError, TransferError};
pub use ledger::{AssetLedger, ChainView};
pub use params::ProtocolParams;
pub use types::*;
