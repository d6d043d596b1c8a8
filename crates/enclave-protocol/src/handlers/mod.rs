//! Operation handlers
//!
//! One module per concern, all sharing a [`HandlerContext`]. Registration
//! order in [`crate::Vault`] puts the identity-sensitive receivers
//! (devices, key operations, recovery) ahead of the general-purpose core
//! receiver.

pub mod core;
pub mod devices;
pub mod keyops;
pub mod recovery;
mod shared;

pub use core::CoreHandler;
pub use devices::DevicesHandler;
pub use keyops::KeyOpsHandler;
pub use recovery::RecoveryHandler;
pub use shared::HandlerContext;
