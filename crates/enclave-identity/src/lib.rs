//! Enclave Identity: custody of the master seed
//!
//! This crate owns every piece of identity state:
//!
//! - **Local store**: the device's keypairs and its sealed half of the
//!   master seed, behind a small key-value trait.
//! - **Remote stores**: traits for the share store (holds the remote half,
//!   revocable) and the object store (holds the enrollment registry), with
//!   HTTP implementations speaking the JSON + recoverable-signature
//!   protocol, and counting in-memory implementations for tests.
//! - **Secret lifecycle**: single-flight reconstruction of the master seed
//!   from the two halves, with refcounted, zeroized in-memory exposure.
//! - **Enrollment registry**: the append/revoke set of devices and recovery
//!   methods, persisted as one encrypted document.
//! - **Provisioning**: identity creation, device enrollment key setup and
//!   local-state wipe.
//!
//! One logical actor owns these per identity; registry mutations are
//! serialized internally, and the in-memory seed never crosses a process
//! boundary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod lifecycle;
pub mod local;
pub mod registry;
pub mod remote;
pub mod service;
pub mod testing;

pub use http::{HttpObjectStore, HttpShareStore};
pub use lifecycle::SecretLifecycle;
pub use local::{JsonFileStore, LocalIdentity, LocalIdentityStore, LocalStore, MemoryStore};
pub use registry::{EnrollmentRecord, EnrollmentRegistry, RecordType};
pub use remote::{ObjectStore, ShareStore};
pub use service::{EnrolleeKeys, IdentityService};
pub use testing::{MemoryObjectStore, MemoryShareStore};
