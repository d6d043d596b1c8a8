//! Injectable effects for deterministic testing
//!
//! Randomness and wall-clock time are the only side effects the crypto
//! layer needs. Both are injected through [`Effects`] so production code
//! uses the system sources while tests swap in seeded, fixed ones and get
//! byte-identical envelopes and signatures on every run.

use enclave_core::{Result, VaultError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use secp256k1::SecretKey;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstract time source - real system time or a fixed test value
pub trait TimeSource: Send + Sync {
    /// Current Unix timestamp in milliseconds
    fn unix_millis(&self) -> Result<u64>;
}

/// Real system time source (production use)
#[derive(Debug, Clone, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn unix_millis(&self) -> Result<u64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .map_err(|e| VaultError::crypto(format!("System time is before UNIX epoch: {}", e)))
    }
}

/// Fixed time source for deterministic tests
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    millis: Arc<Mutex<u64>>,
}

impl FixedTimeSource {
    /// Create a fixed source starting at the given millisecond timestamp
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Arc::new(Mutex::new(millis)),
        }
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        *self.millis.lock() += millis;
    }
}

impl TimeSource for FixedTimeSource {
    fn unix_millis(&self) -> Result<u64> {
        Ok(*self.millis.lock())
    }
}

/// Bundled randomness and time effects
///
/// Cheap to clone; clones share the same underlying rng stream and clock.
#[derive(Clone)]
pub struct Effects {
    time: Arc<dyn TimeSource>,
    rng: Arc<Mutex<StdRng>>,
}

impl Effects {
    /// Production effects: OS-seeded rng and the system clock
    pub fn system() -> Self {
        Self {
            time: Arc::new(SystemTimeSource),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Deterministic effects from an rng seed and a fixed epoch timestamp
    pub fn deterministic(seed: u64, epoch_millis: u64) -> Self {
        Self {
            time: Arc::new(FixedTimeSource::new(epoch_millis)),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Default deterministic effects for tests
    pub fn test() -> Self {
        // 2025-01-01 00:00:00 UTC
        Self::deterministic(42, 1_735_689_600_000)
    }

    /// Effects with a custom time source and OS-seeded rng
    pub fn with_time(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Fill a fixed-size array with random bytes
    pub fn random_bytes<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }

    /// Produce `len` random bytes
    pub fn random_vec(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a fresh secp256k1 secret key
    pub fn secret_key(&self) -> SecretKey {
        SecretKey::new(&mut *self.rng.lock())
    }

    /// Current Unix timestamp in milliseconds
    pub fn unix_millis(&self) -> Result<u64> {
        self.time.unix_millis()
    }
}

impl std::fmt::Debug for Effects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effects").finish_non_exhaustive()
    }
}
