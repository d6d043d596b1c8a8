//! Enclave Protocol: the vault's request surface
//!
//! Untrusted client contexts talk to the vault through opaque structured
//! requests: one operation key, a caller-supplied correlation token and the
//! caller's origin. The [`Dispatcher`] walks an ordered list of receivers;
//! the first one whose `claims` predicate matches — including its
//! execution-mode gate — handles the request and its result or error is
//! echoed back under the same token. Requests nothing claims are reported
//! as unrecognized, never raised as fatal errors.
//!
//! The handlers cover device and card enrollment, per-application key
//! operations (origin-scoped derivation, signing, envelope encryption),
//! recovery methods and the core vault queries. [`Vault`] wires them all
//! over one identity.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod handlers;
pub mod message;
pub mod vault;

pub use dispatch::{Dispatcher, Receiver};
pub use handlers::HandlerContext;
pub use message::{CorrelationToken, Request, Response};
pub use vault::Vault;
