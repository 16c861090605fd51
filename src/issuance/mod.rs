// Issuance module - REWARD PAYMENTS
// Builds issuer-signed, not-yet-broadcast reward payments through a
// signing backend chosen once from configuration

mod backend;
mod builder;
mod remote;

pub use backend::*;
pub use builder::*;
pub use remote::*;
