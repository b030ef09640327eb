//! # Region Allocation
//!
//! Grants DMA-visible regions to callers and takes them back.
//!
//! A request is served from general DMA memory first. Only when that is
//! exhausted, and only for DRM requests, the [`ReservedPool`] buffer is used.
//! Each grant is entered into a live table keyed by its virtual address, so
//! a release of an address that was never granted (or was already released)
//! is refused instead of freeing foreign memory.

use crate::addr::{PhysicalAddress, VirtualAddress};
use crate::error::SecmemError;
use crate::platform::{DmaDirection, Platform};
use crate::reserved_pool::ReservedPool;
use alloc::collections::BTreeMap;
use log::{debug, error, warn};
use spin::Mutex;

/// Where a region's memory came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegionSource {
    GeneralPool,
    ReservedPool,
}

/// A granted region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AllocatedRegion {
    pub virt: VirtualAddress,
    pub phys: PhysicalAddress,
    pub len: usize,
    pub source: RegionSource,
}

/// Parameters of an allocation request.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct RegionRequest {
    pub len: usize,
    /// Allow falling back to the DRM reserved buffer.
    pub drm: bool,
}

impl RegionRequest {
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self { len, drm: false }
    }

    #[must_use]
    pub const fn drm(len: usize) -> Self {
        Self { len, drm: true }
    }
}

pub struct RegionAllocator {
    pool: ReservedPool,
    live: Mutex<BTreeMap<VirtualAddress, AllocatedRegion>>,
}

impl RegionAllocator {
    #[must_use]
    pub const fn new(pool: ReservedPool) -> Self {
        Self {
            pool,
            live: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &ReservedPool {
        &self.pool
    }

    /// Number of regions granted and not yet released.
    #[must_use]
    pub fn live_regions(&self) -> usize {
        self.live.lock().len()
    }

    /// Grant a region of `request.len` bytes.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero length, `OutOfMemory` when neither the
    /// general allocator nor (for DRM requests) the reserved buffer can serve it.
    pub fn allocate<P: Platform + ?Sized>(
        &self,
        platform: &P,
        request: RegionRequest,
    ) -> Result<AllocatedRegion, SecmemError> {
        let len = request.len;
        if len == 0 {
            error!("rejecting zero-length region request");
            return Err(SecmemError::InvalidArgument);
        }

        let (virt, source) = if let Some(va) = platform.alloc_zeroed(len) {
            (va, RegionSource::GeneralPool)
        } else if let Some(va) = self.reserved_grant(request) {
            (va, RegionSource::ReservedPool)
        } else {
            error!("failed to get memory for a {len} byte region");
            return Err(SecmemError::OutOfMemory);
        };

        let region = AllocatedRegion {
            virt,
            phys: platform.virt_to_phys(virt),
            len,
            source,
        };
        platform.map_single(virt, len, DmaDirection::ToDevice);
        self.live.lock().insert(virt, region);

        debug!(
            "granted {len} bytes at {} (phys {}) from {source:?}",
            region.virt, region.phys
        );
        Ok(region)
    }

    fn reserved_grant(&self, request: RegionRequest) -> Option<VirtualAddress> {
        if !request.drm {
            return None;
        }
        let va = self.pool.acquire(request.len)?;
        // The buffer is reused across grants; hand it out zeroed like fresh
        // general memory.
        // SAFETY: the reserved buffer is `capacity >= len` bytes of DMA memory
        // owned by the pool, and the slot claim makes this the only user.
        unsafe { core::ptr::write_bytes(va.as_mut_ptr::<u8>(), 0, request.len) };
        warn!("general allocation exhausted, using DRM reserved buffer for {} bytes", request.len);
        Some(va)
    }

    /// Take back the region granted at `virt`.
    ///
    /// # Errors
    /// `InvalidArgument` if `virt` is null or not a live grant; nothing is freed.
    pub fn release<P: Platform + ?Sized>(
        &self,
        platform: &P,
        virt: VirtualAddress,
    ) -> Result<AllocatedRegion, SecmemError> {
        if virt.is_null() {
            error!("cannot release a null region address");
            return Err(SecmemError::InvalidArgument);
        }
        let Some(region) = self.live.lock().remove(&virt) else {
            error!("release of {virt}, which is not a granted region");
            return Err(SecmemError::InvalidArgument);
        };
        self.give_back(platform, &region);
        debug!("released region at {virt} ({} bytes)", region.len);
        Ok(region)
    }

    fn give_back<P: Platform + ?Sized>(&self, platform: &P, region: &AllocatedRegion) {
        if !self.pool.release(region.virt) {
            // SAFETY: the region was removed from the live table, which only
            // holds general grants from `alloc_zeroed(region.len)` besides the
            // reserved buffer handled above.
            unsafe { platform.free(region.virt, region.len) };
        }
    }

    /// Free every outstanding grant and hand the reserved pool back.
    pub(crate) fn drain<P: Platform + ?Sized>(self, platform: &P) -> ReservedPool {
        let live = core::mem::take(&mut *self.live.lock());
        if !live.is_empty() {
            warn!("freeing {} regions still granted at shutdown", live.len());
        }
        for region in live.values() {
            self.give_back(platform, region);
        }
        self.pool
    }
}
