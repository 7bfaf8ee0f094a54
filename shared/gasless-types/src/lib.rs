//! Shared types for sponsor pools, smart-account identities, operations and receipts.

pub mod account;
pub mod operation;
pub mod packing;
pub mod pool;

pub use account::SmartAccountIdentity;
pub use operation::{OperationReceipt, SignedOperation, UnsignedOperation};
pub use packing::{PackingError, SponsorFields};
pub use pool::{CandidatePool, PoolError, SponsorPool, MAX_FEE_BASIS_POINTS};
