//! # DRM Reserved Buffer
//!
//! A single buffer allocated when the device starts and handed out only when
//! general DMA allocation fails for a DRM request. At most one grant is
//! outstanding at a time; the slot is claimed and returned with a single
//! compare-and-swap, so two racing requests can never both receive it.

use crate::addr::VirtualAddress;
use crate::error::SecmemError;
use crate::platform::DmaAllocator;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{error, info, warn};

pub struct ReservedPool {
    buffer: Option<VirtualAddress>,
    capacity: usize,
    /// * `false`: slot free
    /// * `true`: buffer granted
    in_use: AtomicBool,
}

impl ReservedPool {
    /// A pool that never grants anything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            buffer: None,
            capacity: 0,
            in_use: AtomicBool::new(false),
        }
    }

    /// Wrap an already allocated buffer.
    pub(crate) const fn from_buffer(buffer: VirtualAddress, capacity: usize) -> Self {
        Self {
            buffer: Some(buffer),
            capacity,
            in_use: AtomicBool::new(false),
        }
    }

    /// Allocate the backing buffer up front.
    ///
    /// # Errors
    /// `OutOfMemory` if the buffer cannot be allocated; the device must not
    /// start without it.
    pub fn allocate<D: DmaAllocator + ?Sized>(dma: &D, capacity: usize) -> Result<Self, SecmemError> {
        let Some(buffer) = dma.alloc_zeroed(capacity) else {
            error!("failed to reserve {capacity} byte DRM buffer");
            return Err(SecmemError::OutOfMemory);
        };
        info!("reserved {capacity} byte DRM buffer at {buffer}");
        Ok(Self::from_buffer(buffer, capacity))
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn buffer(&self) -> Option<VirtualAddress> {
        self.buffer
    }

    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Claim the buffer for a request of `len` bytes.
    #[must_use]
    pub fn acquire(&self, len: usize) -> Option<VirtualAddress> {
        let buffer = self.buffer?;
        if len > self.capacity {
            return None;
        }
        self.in_use
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| buffer)
    }

    /// Give the buffer back. Returns `false` if `va` is not the buffer or the
    /// buffer is not currently granted; the memory then belongs to the
    /// general allocator.
    #[must_use]
    pub fn release(&self, va: VirtualAddress) -> bool {
        self.buffer == Some(va)
            && self
                .in_use
                .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed)
                .is_ok()
    }

    /// Return the backing buffer to `dma`.
    pub(crate) fn free<D: DmaAllocator + ?Sized>(self, dma: &D) {
        let Some(buffer) = self.buffer else {
            return;
        };
        if self.is_in_use() {
            warn!("freeing DRM buffer {buffer} while it is still granted");
        }
        // SAFETY: `buffer` came from `alloc_zeroed(capacity)` in `allocate`
        // and `self` is consumed, so it is freed exactly once.
        unsafe { dma.free(buffer, self.capacity) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    const BUF: VirtualAddress = VirtualAddress::new(0xC000_0000);

    #[test]
    fn single_slot() {
        let pool = ReservedPool::from_buffer(BUF, 256 * 1024);
        assert_eq!(pool.acquire(4096), Some(BUF));
        assert!(pool.is_in_use());
        assert_eq!(pool.acquire(4096), None);

        assert!(pool.release(BUF));
        assert!(!pool.is_in_use());
        assert_eq!(pool.acquire(256 * 1024), Some(BUF));
    }

    #[test]
    fn oversized_request_leaves_slot_free() {
        let pool = ReservedPool::from_buffer(BUF, 256 * 1024);
        assert_eq!(pool.acquire(256 * 1024 + 1), None);
        assert!(!pool.is_in_use());
    }

    #[test]
    fn release_of_foreign_or_free_buffer_is_refused() {
        let pool = ReservedPool::from_buffer(BUF, 4096);
        assert!(!pool.release(BUF), "slot is not granted");

        assert_eq!(pool.acquire(16), Some(BUF));
        assert!(!pool.release(VirtualAddress::new(BUF.as_u64() + 16)));
        assert!(pool.is_in_use());
        assert!(pool.release(BUF));
        assert!(!pool.release(BUF), "double release");
    }

    #[test]
    fn disabled_pool_grants_nothing() {
        let pool = ReservedPool::disabled();
        assert_eq!(pool.acquire(1), None);
        assert!(!pool.release(VirtualAddress::new(0)));
    }

    #[test]
    fn racing_acquires_grant_once() {
        let threads = 8;
        let pool = Arc::new(ReservedPool::from_buffer(BUF, 4096));
        let start = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    pool.acquire(4096).is_some()
                })
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(granted, 1);
    }
}
