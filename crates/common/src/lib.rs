//! Common types for corral
//!
//! This crate defines:
//! - Caller and transaction identities
//! - Physical timestamps and the pluggable clock used for transaction ordering
//! - The resource and resource-operation abstractions the manager coordinates

mod client_id;
mod clock;
mod resource;
mod timestamp;
mod transaction_id;

pub use client_id::ClientId;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use resource::Resource;
pub use resource::ResourceId;
pub use resource::ResourceOperation;
pub use timestamp::Timestamp;
pub use transaction_id::TransactionId;
