// Storage module - PERSISTENCE
// Beneficiary records and activation state in sled

mod records;
mod store;

pub use records::*;
pub use store::{PublicIdUpdate, RewardStore, StorageStats, StoreError};
