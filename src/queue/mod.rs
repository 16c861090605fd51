// Queue module - TWO-PARTY APPROVAL
// Pending payments wait for a validator's decision; merit grants wait for
// a second distinct signature

mod id;
mod merit;
mod payment;

pub use id::*;
pub use merit::*;
pub use payment::*;
