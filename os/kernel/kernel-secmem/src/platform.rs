//! # Platform Collaborators
//!
//! The secure memory core owns no hardware itself. Everything it needs from
//! the host kernel is expressed as a small trait here, in the same spirit as
//! a `FrameAlloc`/`PhysMapper` pair abstracts page-table code over the boot
//! environment:
//!
//! | Trait | Host service |
//! |-------|--------------|
//! | [`ContiguousMemory`] | CMA query of a reserved zone by name |
//! | [`DmaAllocator`] | DMA-capable zeroed allocation, free, single-direction sync |
//! | [`PhysMapper`] | linear-map translation between kernel VA and PA |
//! | [`PowerManager`] | runtime power-management enable/disable/forbid/allow |
//! | [`HandleResolver`] | video-memory handle import and physical resolution |
//! | [`UserAccess`] | per-call copy-in/copy-out against the caller's memory |
//!
//! [`Platform`] bundles the first five for a device instance.

use crate::addr::{PhysicalAddress, VirtualAddress};
use core::fmt;
use secmem_abi::Pod;

/// Result of a CMA query for a named zone.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CmaInfo {
    /// Physical base of the zone.
    pub lower_bound: PhysicalAddress,
    /// Zone size in bytes.
    pub total_size: u64,
}

/// Contiguous memory allocator queries.
pub trait ContiguousMemory {
    /// Look up a reserved zone by name; `None` if the allocator does not know it.
    fn cma_info(&self, name: &str) -> Option<CmaInfo>;
}

/// Direction of a streaming DMA mapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DmaDirection {
    ToDevice,
    FromDevice,
    Bidirectional,
}

/// DMA-capable kernel memory.
pub trait DmaAllocator {
    /// Allocate `len` zeroed bytes from DMA-reachable memory.
    fn alloc_zeroed(&self, len: usize) -> Option<VirtualAddress>;

    /// Return memory obtained from [`alloc_zeroed`](Self::alloc_zeroed).
    ///
    /// # Safety
    /// `va` must come from `alloc_zeroed(len)` on this allocator and must not
    /// have been freed already.
    unsafe fn free(&self, va: VirtualAddress, len: usize);

    /// Hand `[va, va + len)` to devices, syncing caches for `direction`.
    fn map_single(&self, va: VirtualAddress, len: usize, direction: DmaDirection);
}

/// Linear-map address translation.
pub trait PhysMapper {
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress;
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;
}

/// Runtime power management of the device's parent.
pub trait PowerManager {
    /// Enable runtime PM for the device (once, at start).
    fn runtime_enable(&self);
    /// Disable runtime PM for the device (once, at shutdown).
    fn runtime_disable(&self);
    /// Forbid automatic power-state transitions.
    fn forbid(&self);
    /// Allow automatic power-state transitions again.
    fn allow(&self);
}

/// Why an imported handle could not be resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// The platform has no video-memory handle subsystem.
    #[error("handle import is not supported on this platform")]
    Unsupported,
    /// The handle could not be imported or has no physical backing.
    #[error("handle {0} could not be resolved")]
    BadHandle(i32),
}

/// Video-memory handle import and physical address resolution.
pub trait HandleResolver {
    /// Import `fd`, resolve its physical address and drop the import again.
    fn resolve_phys(&self, fd: i32) -> Result<PhysicalAddress, ResolveError> {
        let _ = fd;
        Err(ResolveError::Unsupported)
    }
}

/// All host services a [`SecmemDevice`](crate::SecmemDevice) needs.
///
/// # Safety
/// Implementors guarantee that
/// - every zone reported by [`ContiguousMemory::cma_info`] is writable through
///   [`PhysMapper::phys_to_virt`] for its whole `total_size`, and
/// - every address returned by [`DmaAllocator::alloc_zeroed`] is writable for
///   the requested length until it is freed.
pub unsafe trait Platform:
    ContiguousMemory + DmaAllocator + PhysMapper + PowerManager + HandleResolver + Send + Sync
{
}

/// Caller-side pointer passed as the control-operation argument.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq)]
pub struct UserPtr(usize);

impl UserPtr {
    #[inline]
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPtr(0x{:x})", self.0)
    }
}

/// A copy across the user/kernel boundary faulted.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("fault copying across the user boundary")]
pub struct CopyFault;

/// Copy primitives for the calling process.
pub trait UserAccess {
    /// Fill `dst` from caller memory at `src`.
    fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> Result<(), CopyFault>;

    /// Write `src` to caller memory at `dst`.
    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> Result<(), CopyFault>;
}

/// Copy one payload record in from the caller.
///
/// # Errors
/// `CopyFault` if `src` does not name readable caller memory.
pub fn read_record<T: Pod, U: UserAccess + ?Sized>(user: &U, src: UserPtr) -> Result<T, CopyFault> {
    let mut record = T::default();
    user.copy_from_user(record.as_bytes_mut(), src)?;
    Ok(record)
}

/// Copy one payload record out to the caller.
///
/// # Errors
/// `CopyFault` if `dst` does not name writable caller memory.
pub fn write_record<T: Pod, U: UserAccess + ?Sized>(
    user: &U,
    dst: UserPtr,
    record: &T,
) -> Result<(), CopyFault> {
    user.copy_to_user(dst, record.as_bytes())
}
