//! The secure memory device instance.

use crate::addr::{PhysicalAddress, VirtualAddress};
use crate::config::SecmemConfig;
use crate::crypto::{CryptoArbitrator, CryptoBackend};
use crate::drm::{DrmMode, DrmTransition};
use crate::error::SecmemError;
use crate::mmap::{PageRemapper, VmArea, map_secure_range};
use crate::platform::{Platform, ResolveError};
use crate::region::{AllocatedRegion, RegionAllocator, RegionRequest};
use crate::reserved_pool::ReservedPool;
use crate::zone::{ZoneDescriptor, ZoneLookup, ZoneRegistry};
use alloc::sync::Arc;
use log::{debug, error, info, warn};
use secmem_abi::MFC_SEC_MAGIC;

/// All state of one secure memory device.
///
/// Exactly one instance exists per system; it is created when the driver
/// starts and passed by reference to every request. Per-field
/// synchronisation makes it safe to share between any number of callers.
pub struct SecmemDevice<P: Platform> {
    platform: P,
    config: SecmemConfig,
    zones: ZoneRegistry,
    regions: RegionAllocator,
    crypto: CryptoArbitrator,
    drm: DrmMode,
}

impl<P: Platform> SecmemDevice<P> {
    /// Bring the device up.
    ///
    /// Reserves the DRM buffer first; if that fails the device does not start.
    /// Runtime power management is enabled and no crypto backend is registered.
    ///
    /// # Errors
    /// `OutOfMemory` if the reserved buffer cannot be allocated.
    pub fn new(platform: P, config: SecmemConfig) -> Result<Self, SecmemError> {
        let pool = match config.reserved_pool_size {
            Some(capacity) => ReservedPool::allocate(&platform, capacity)?,
            None => ReservedPool::disabled(),
        };

        platform.runtime_enable();
        info!(
            "{}: {} secure zones, DRM buffer {}",
            config.device_name,
            config.zones.len(),
            pool.buffer().map_or(0, |_| pool.capacity())
        );

        Ok(Self {
            zones: ZoneRegistry::new(config.zones.iter().cloned()),
            regions: RegionAllocator::new(pool),
            crypto: CryptoArbitrator::new(config.crypto_lock_attempts),
            drm: DrmMode::new(),
            platform,
            config,
        })
    }

    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    #[must_use]
    pub const fn config(&self) -> &SecmemConfig {
        &self.config
    }

    #[must_use]
    pub const fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    #[must_use]
    pub const fn regions(&self) -> &RegionAllocator {
        &self.regions
    }

    #[must_use]
    pub const fn crypto(&self) -> &CryptoArbitrator {
        &self.crypto
    }

    #[must_use]
    pub const fn drm(&self) -> &DrmMode {
        &self.drm
    }

    /// Entry point for the crypto driver to install its backend.
    pub fn register_crypto<B: CryptoBackend + 'static>(&self, backend: &Arc<B>) {
        self.crypto.register(backend);
    }

    pub fn deregister_crypto(&self) {
        self.crypto.deregister();
    }

    /// # Errors
    /// See [`ZoneRegistry::lookup`].
    pub fn zone_chunk_info(&self, index: i32) -> Result<ZoneLookup<'_>, SecmemError> {
        self.zones.lookup(&self.platform, index)
    }

    /// Base and size of the fixed camera text zone.
    ///
    /// # Errors
    /// `InvalidArgument` if the allocator does not know the zone.
    pub fn text_chunk_info(&self) -> Result<ZoneDescriptor<'_>, SecmemError> {
        let zone = ZoneRegistry::resolve(&self.platform, &self.config.text_zone)?;
        info!("[{}] base: {} size: {:#x}", zone.name(), zone.base(), zone.size());
        Ok(zone)
    }

    /// Stamp the MFC magic marker into the first 16 bytes of the shared-memory zone.
    ///
    /// # Errors
    /// `InvalidArgument` if the zone is unknown or smaller than the marker.
    pub fn write_mfc_magic(&self) -> Result<ZoneDescriptor<'_>, SecmemError> {
        let zone = ZoneRegistry::resolve(&self.platform, &self.config.shm_zone)?;
        zone.write_words(&self.platform, 0, &MFC_SEC_MAGIC)?;
        debug!("MFC magic written to {} at {}", zone.name(), zone.base());
        Ok(zone)
    }

    /// # Errors
    /// See [`RegionAllocator::allocate`].
    pub fn allocate_region(&self, request: RegionRequest) -> Result<AllocatedRegion, SecmemError> {
        self.regions.allocate(&self.platform, request)
    }

    /// # Errors
    /// See [`RegionAllocator::release`].
    pub fn release_region(&self, virt: VirtualAddress) -> Result<AllocatedRegion, SecmemError> {
        self.regions.release(&self.platform, virt)
    }

    #[must_use]
    pub fn drm_mode(&self) -> bool {
        self.drm.is_on()
    }

    #[must_use]
    pub fn set_drm_mode(&self, on: bool) -> DrmTransition {
        self.drm.set(&self.platform, on)
    }

    /// # Errors
    /// See [`CryptoArbitrator::lock`].
    pub fn acquire_crypto_lock(&self) -> Result<(), SecmemError> {
        self.crypto.lock()
    }

    /// # Errors
    /// See [`CryptoArbitrator::release`].
    pub fn release_crypto_lock(&self) -> Result<(), SecmemError> {
        self.crypto.release()
    }

    /// Physical address behind an imported video-memory handle.
    ///
    /// # Errors
    /// `Unavailable` if the platform cannot import handles, `InvalidArgument`
    /// if `fd` does not resolve.
    pub fn resolve_handle(&self, fd: i32) -> Result<PhysicalAddress, SecmemError> {
        match self.platform.resolve_phys(fd) {
            Ok(phys) => {
                debug!("handle {fd} resolves to {phys}");
                Ok(phys)
            }
            Err(ResolveError::Unsupported) => {
                error!("handle import is not available on this platform");
                Err(SecmemError::Unavailable)
            }
            Err(err @ ResolveError::BadHandle(_)) => {
                error!("{err}");
                Err(SecmemError::InvalidArgument)
            }
        }
    }

    /// Map secure memory into the caller, see [`map_secure_range`].
    ///
    /// # Errors
    /// See [`map_secure_range`].
    pub fn mmap<R: PageRemapper + ?Sized>(&self, vma: &mut VmArea, remapper: &R) -> Result<(), SecmemError> {
        debug!(
            "{}: mmap {:#x}..{:#x} at pfn {:#x}",
            self.config.device_name, vma.start, vma.end, vma.pgoff
        );
        map_secure_range(vma, remapper)
    }

    /// Tear the device down and give the platform back.
    ///
    /// Restores power-state transitions if DRM mode is still on, frees every
    /// outstanding region and the reserved buffer, and disables runtime PM.
    #[must_use]
    pub fn shutdown(self) -> P {
        let Self {
            platform,
            config,
            regions,
            crypto,
            drm,
            ..
        } = self;

        crypto.deregister();
        if drm.is_on() {
            warn!("{}: shutting down with DRM mode on", config.device_name);
            let _ = drm.set(&platform, false);
        }
        regions.drain(&platform).free(&platform);
        platform.runtime_disable();
        info!("{}: shut down", config.device_name);
        platform
    }
}
