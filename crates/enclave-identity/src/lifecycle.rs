//! Secret lifecycle management
//!
//! Owns all access to the master seed. Reconstruction pulls the remote
//! half from the share store, decrypts both halves with the local key and
//! recombines them; the result is cached only while someone is inside a
//! `with_master_seed` window and zeroized the moment the refcount hits
//! zero.
//!
//! The single-flight invariant: the reconstruction future is created and
//! stored in the shared slot under the state lock — strictly before any
//! suspension point — so callers arriving before the first remote fetch
//! resolves all await the same future and exactly one fetch happens.

use std::future::Future;
use std::sync::Arc;

use enclave_core::{Hash256, Result, VaultError};
use enclave_crypto::{combine, derive_node, KeyNode, MasterSeed, Share};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::local::LocalIdentityStore;
use crate::remote::ShareStore;

type SeedFuture = Shared<BoxFuture<'static, Result<MasterSeed>>>;

#[derive(Default)]
struct LifecycleState {
    cached: Option<MasterSeed>,
    refs: u32,
    // Generation tag distinguishes this reconstruction from any later one,
    // so a slow awaiter never clears a successor's in-flight slot
    inflight: Option<(u64, SeedFuture)>,
    generation: u64,
}

/// Refcounted, single-flight custodian of the master seed
pub struct SecretLifecycle {
    state: Mutex<LifecycleState>,
    local: LocalIdentityStore,
    shares: Arc<dyn ShareStore>,
}

impl SecretLifecycle {
    /// Create a lifecycle manager over the device's local state and the
    /// remote share store
    pub fn new(local: LocalIdentityStore, shares: Arc<dyn ShareStore>) -> Self {
        Self {
            state: Mutex::new(LifecycleState::default()),
            local,
            shares,
        }
    }

    /// Run `f` with the reconstructed master seed
    ///
    /// Nested calls share the cached seed through the refcount; the seed is
    /// dropped and zeroized when the outermost call returns.
    pub async fn with_master_seed<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(MasterSeed) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let seed = self.acquire().await?;
        let result = f(seed).await;
        self.release();
        result
    }

    /// Reconstruct-and-derive in one refcount window
    pub async fn derive(&self, hash: Hash256) -> Result<KeyNode> {
        self.with_master_seed(|seed| async move { derive_node(&seed, &hash) })
            .await
    }

    /// Current refcount, for diagnostics
    pub fn refs(&self) -> u32 {
        self.state.lock().refs
    }

    async fn acquire(&self) -> Result<MasterSeed> {
        let (generation, fut) = {
            let mut state = self.state.lock();
            if let Some(seed) = &state.cached {
                let seed = seed.clone();
                state.refs += 1;
                return Ok(seed);
            }
            match &state.inflight {
                Some((generation, shared)) => (*generation, shared.clone()),
                None => {
                    // Created and stored before this task can suspend; any
                    // caller landing here next awaits the same future.
                    let shared = reconstruct(self.local.clone(), Arc::clone(&self.shares))
                        .boxed()
                        .shared();
                    state.generation += 1;
                    state.inflight = Some((state.generation, shared.clone()));
                    (state.generation, shared)
                }
            }
        };

        let outcome = fut.await;
        let mut state = self.state.lock();
        if state
            .inflight
            .as_ref()
            .is_some_and(|(g, _)| *g == generation)
        {
            state.inflight = None;
        }
        match outcome {
            Ok(seed) => {
                if state.cached.is_none() {
                    state.cached = Some(seed.clone());
                }
                state.refs += 1;
                Ok(seed)
            }
            Err(e) => Err(e),
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.refs = state.refs.saturating_sub(1);
        debug!(refs = state.refs, "Released master seed reference");
        if state.refs == 0 && state.cached.take().is_some() {
            debug!("Dropped cached master seed");
        }
    }
}

/// Pull the remote half, decrypt both halves and recombine
///
/// A missing remote share means the identity can never again be
/// reconstructed from this device's surviving half, so local state is
/// wiped before the error propagates. Nothing is cached on any failure.
async fn reconstruct(
    local: LocalIdentityStore,
    shares: Arc<dyn ShareStore>,
) -> Result<MasterSeed> {
    let identity = local.load()?;
    info!("Reconstructing master seed");

    let Some(remote_envelope) = shares.fetch(&identity.auth_key).await? else {
        warn!("Remote share missing or revoked; wiping local identity state");
        if let Err(e) = local.wipe() {
            warn!("Failed to wipe local identity state: {}", e);
        }
        return Err(VaultError::remote_identity(
            "Remote share missing or revoked",
        ));
    };

    let remote_share = Share::from_bytes(&remote_envelope.open(&identity.local_key)?)?;
    let local_share = Share::from_bytes(&identity.local_share.open(&identity.local_key)?)?;

    let seed_bytes = combine(&local_share, &remote_share)?;
    MasterSeed::new(seed_bytes.to_vec())
}
