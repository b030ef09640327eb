//! # DRM Protected Playback Mode
//!
//! While protected content is decoded, the media blocks must not be power
//! gated. Switching DRM mode on forbids automatic runtime power-state
//! transitions; switching it off allows them again. The underlying
//! forbid/allow calls are not reference counted, so the flag and the power
//! call change together under one lock, and a request for the state that is
//! already active only records a diagnostic.
//!
//! ```text
//!          set(true) / forbid()
//!   ┌─────┐ ───────────────────► ┌────┐
//!   │ Off │                      │ On │
//!   └─────┘ ◄─────────────────── └────┘
//!          set(false) / allow()
//!
//!   set(false) on Off, set(true) on On: no PM call, redundant_requests += 1
//! ```

use crate::platform::PowerManager;
use core::sync::atomic::{AtomicU64, Ordering};
use log::{info, warn};
use spin::Mutex;

/// What a [`DrmMode::set`] request did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrmTransition {
    /// Off → On; power-state transitions are now forbidden.
    Enabled,
    /// On → Off; power-state transitions are allowed again.
    Disabled,
    /// Already on; nothing changed.
    AlreadyOn,
    /// Already off; nothing changed.
    AlreadyOff,
}

impl DrmTransition {
    /// Whether the request asked for the state that was already active.
    #[must_use]
    pub const fn is_redundant(self) -> bool {
        matches!(self, Self::AlreadyOn | Self::AlreadyOff)
    }
}

pub struct DrmMode {
    on: Mutex<bool>,
    redundant: AtomicU64,
}

impl Default for DrmMode {
    fn default() -> Self {
        Self::new()
    }
}

impl DrmMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            on: Mutex::new(false),
            redundant: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        *self.on.lock()
    }

    /// Number of requests for a state that was already active.
    #[must_use]
    pub fn redundant_requests(&self) -> u64 {
        self.redundant.load(Ordering::Relaxed)
    }

    /// Switch DRM mode on or off.
    #[must_use]
    pub fn set<P: PowerManager + ?Sized>(&self, power: &P, on: bool) -> DrmTransition {
        let mut state = self.on.lock();
        let transition = match (*state, on) {
            (false, true) => {
                *state = true;
                power.forbid();
                DrmTransition::Enabled
            }
            (true, false) => {
                *state = false;
                power.allow();
                DrmTransition::Disabled
            }
            (true, true) => DrmTransition::AlreadyOn,
            (false, false) => DrmTransition::AlreadyOff,
        };
        drop(state);

        if transition.is_redundant() {
            self.redundant.fetch_add(1, Ordering::Relaxed);
            warn!("DRM is already {}", if on { "on" } else { "off" });
        } else {
            info!("DRM protected mode {}", if on { "enabled" } else { "disabled" });
        }
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[derive(Default)]
    struct CountingPm {
        forbids: AtomicU32,
        allows: AtomicU32,
    }

    impl PowerManager for CountingPm {
        fn runtime_enable(&self) {}
        fn runtime_disable(&self) {}
        fn forbid(&self) {
            self.forbids.fetch_add(1, Ordering::SeqCst);
        }
        fn allow(&self) {
            self.allows.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn on_off_cycle() {
        let pm = CountingPm::default();
        let drm = DrmMode::new();
        assert!(!drm.is_on());

        assert_eq!(drm.set(&pm, true), DrmTransition::Enabled);
        assert!(drm.is_on());
        assert_eq!(drm.set(&pm, false), DrmTransition::Disabled);
        assert!(!drm.is_on());

        assert_eq!(pm.forbids.load(Ordering::SeqCst), 1);
        assert_eq!(pm.allows.load(Ordering::SeqCst), 1);
        assert_eq!(drm.redundant_requests(), 0);
    }

    #[test]
    fn repeated_on_suppresses_once() {
        let pm = CountingPm::default();
        let drm = DrmMode::new();

        assert_eq!(drm.set(&pm, true), DrmTransition::Enabled);
        assert_eq!(drm.set(&pm, true), DrmTransition::AlreadyOn);
        assert_eq!(pm.forbids.load(Ordering::SeqCst), 1);
        assert_eq!(drm.redundant_requests(), 1);
    }

    #[test]
    fn off_while_off_is_redundant() {
        let pm = CountingPm::default();
        let drm = DrmMode::new();
        assert_eq!(drm.set(&pm, false), DrmTransition::AlreadyOff);
        assert_eq!(pm.allows.load(Ordering::SeqCst), 0);
        assert_eq!(drm.redundant_requests(), 1);
    }

    #[test]
    fn racing_enables_forbid_exactly_once() {
        let threads = 8;
        let pm = Arc::new(CountingPm::default());
        let drm = Arc::new(DrmMode::new());
        let start = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pm = Arc::clone(&pm);
                let drm = Arc::clone(&drm);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    drm.set(&*pm, true)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let enabled = outcomes.iter().filter(|t| **t == DrmTransition::Enabled).count();
        assert_eq!(enabled, 1);
        assert_eq!(pm.forbids.load(Ordering::SeqCst), 1);
        assert_eq!(drm.redundant_requests(), threads as u64 - 1);
    }
}
