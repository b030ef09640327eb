//! # Crypto Engine Lock Arbitration
//!
//! The hardware crypto engine is shared between the secure world and
//! ordinary kernel drivers. An external crypto driver registers a
//! [`CryptoBackend`] that knows how to take and give back the engine; this
//! module forwards caller requests to it.
//!
//! The arbitrator keeps only a [`Weak`] handle in a lock-protected slot. The
//! registering module owns the backend; once it deregisters (or simply drops
//! its `Arc`), the slot reads as empty. The handle is re-read on every retry,
//! so a backend that disappears mid-loop is noticed at the next attempt.
//!
//! | Backend | `lock()` | `release()` |
//! |---------|----------|-------------|
//! | absent | success, no side effect | success, no side effect |
//! | present | up to `attempts` tries while [`Busy`](CryptoBackendError::Busy) | forwarded once |
//! | removed while retrying | [`Unavailable`](SecmemError::Unavailable) | – |

use crate::error::SecmemError;
use alloc::sync::{Arc, Weak};
use log::{debug, error, trace, warn};
use spin::Mutex;

/// Failure reported by a crypto backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CryptoBackendError {
    /// The engine is held by someone else; trying again may succeed.
    #[error("crypto engine busy")]
    Busy,
    /// The backend failed with the given errno; retrying will not help.
    #[error("crypto engine fault (errno {0})")]
    Fault(i32),
}

/// Mutual exclusion around the hardware crypto engine, provided by the
/// crypto driver.
pub trait CryptoBackend: Send + Sync {
    /// Try once to take the engine lock.
    fn lock(&self) -> Result<(), CryptoBackendError>;

    /// Give the engine lock back.
    fn release(&self) -> Result<(), CryptoBackendError>;
}

pub struct CryptoArbitrator {
    backend: Mutex<Option<Weak<dyn CryptoBackend>>>,
    attempts: u32,
}

impl CryptoArbitrator {
    /// Arbitrator with no backend, trying a contended lock up to `attempts`
    /// times (at least once).
    #[must_use]
    pub fn new(attempts: u32) -> Self {
        Self {
            backend: Mutex::new(None),
            attempts: attempts.max(1),
        }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Install `backend`, replacing any previous registration.
    pub fn register<B: CryptoBackend + 'static>(&self, backend: &Arc<B>) {
        let weak = Arc::downgrade(backend) as Weak<dyn CryptoBackend>;
        if self.backend.lock().replace(weak).is_some() {
            warn!("replacing registered crypto backend");
        }
        debug!("crypto backend registered");
    }

    /// Remove the current backend, if any.
    pub fn deregister(&self) {
        if self.backend.lock().take().is_some() {
            debug!("crypto backend deregistered");
        }
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn CryptoBackend>> {
        self.backend.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Take the crypto engine lock.
    ///
    /// # Errors
    /// - `ResourceBusy` after `attempts` busy answers.
    /// - `Backend` when the backend reports a hard fault.
    /// - `Unavailable` when the backend goes away between attempts.
    pub fn lock(&self) -> Result<(), SecmemError> {
        let Some(mut backend) = self.current() else {
            trace!("no crypto backend registered, lock is a no-op");
            return Ok(());
        };

        let mut attempt = 1;
        loop {
            match backend.lock() {
                Ok(()) => {
                    trace!("crypto lock taken after {attempt} attempt(s)");
                    return Ok(());
                }
                Err(CryptoBackendError::Fault(code)) => {
                    error!("crypto backend failed to lock (errno {code})");
                    return Err(SecmemError::Backend(code));
                }
                Err(CryptoBackendError::Busy) => {}
            }

            if attempt == self.attempts {
                error!("crypto lock still busy after {attempt} attempts");
                return Err(SecmemError::ResourceBusy);
            }
            warn!("retry to get crypto sync lock ({attempt}/{})", self.attempts);
            attempt += 1;

            backend = self.current().ok_or_else(|| {
                warn!("crypto backend went away after {} attempt(s)", attempt - 1);
                SecmemError::Unavailable
            })?;
        }
    }

    /// Give the crypto engine lock back.
    ///
    /// # Errors
    /// Whatever the backend reports, see [`CryptoBackendError`].
    pub fn release(&self) -> Result<(), SecmemError> {
        let Some(backend) = self.current() else {
            trace!("no crypto backend registered, release is a no-op");
            return Ok(());
        };
        backend.release().map_err(|err| {
            error!("crypto backend failed to release the lock: {err}");
            SecmemError::from(err)
        })
    }
}
