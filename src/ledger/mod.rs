// Ledger module - transaction model, envelope codec, and the gateway to the
// external ledger network

mod asset;
mod balance;
mod builder;
mod codec;
mod gateway;
mod horizon;
mod memory;
mod transaction;
mod xdr;

pub use asset::*;
pub use balance::*;
pub use builder::*;
pub use codec::*;
pub use gateway::*;
pub use horizon::*;
pub use memory::*;
pub use transaction::*;
pub use xdr::*;
