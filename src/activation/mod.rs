// Activation module - ACCOUNT PROVISIONING
// Funds a beneficiary account, establishes its trustline to the reward
// asset, and verifies both before the account is marked ACTIVE

mod retry;
mod workflow;

pub use crate::storage::ActivationState;
pub use retry::*;
pub use workflow::*;
