//! # User Mappings of Secure Memory
//!
//! Callers map secure zones into their address space through the device's
//! `mmap` entry point. The page-table work belongs to the host kernel; this
//! module only enforces the contract of the request:
//!
//! - the user range must start and end on a page boundary,
//! - the mapping is marked reserved (never swapped or merged) and non-cacheable,
//! - the VMA page offset is the first physical frame to map.

use crate::error::SecmemError;
use bitfield_struct::bitfield;
use log::error;
use secmem_abi::PAGE_SIZE;

/// Attributes requested for a secure memory mapping.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct MappingFlags {
    /// Bit 0: Pages are reserved and must not be swapped or merged (`VM_RESERVED`).
    pub reserved: bool,

    /// Bit 1: Map with caching disabled.
    pub noncached: bool,

    /// Bits 2–7: Reserved (must be 0).
    #[bits(6, default = 0)]
    _reserved_2_7: u8,
}

/// The user virtual memory area of an `mmap` request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VmArea {
    /// First user address of the mapping.
    pub start: u64,
    /// One past the last user address of the mapping.
    pub end: u64,
    /// Offset into the device in pages, i.e. the first physical frame number.
    pub pgoff: u64,
    /// Mapping attributes, filled in by [`map_secure_range`].
    pub flags: MappingFlags,
}

impl VmArea {
    #[must_use]
    pub const fn new(start: u64, end: u64, pgoff: u64) -> Self {
        Self {
            start,
            end,
            pgoff,
            flags: MappingFlags::new(),
        }
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remapping of a physical frame range failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("remap_pfn_range failed")]
pub struct RemapError;

/// Installs physical frames into the caller's address space.
pub trait PageRemapper {
    /// Map `size` bytes of frames starting at `pfn` to user address `start`.
    fn remap_pfn_range(
        &self,
        start: u64,
        pfn: u64,
        size: u64,
        flags: MappingFlags,
    ) -> Result<(), RemapError>;
}

const fn is_page_aligned(addr: u64) -> bool {
    addr.is_multiple_of(PAGE_SIZE)
}

/// Validate `vma`, mark it reserved and non-cacheable, and hand it to `remapper`.
///
/// # Errors
/// `InvalidArgument` for an unaligned or inverted range, `RemapFailed` if
/// the host kernel cannot install the mapping.
pub fn map_secure_range<R: PageRemapper + ?Sized>(
    vma: &mut VmArea,
    remapper: &R,
) -> Result<(), SecmemError> {
    if !is_page_aligned(vma.start) || !is_page_aligned(vma.end) || vma.end < vma.start {
        error!(
            "refusing unaligned secure mapping {:#x}..{:#x}",
            vma.start, vma.end
        );
        return Err(SecmemError::InvalidArgument);
    }

    vma.flags = vma.flags.with_reserved(true).with_noncached(true);
    remapper
        .remap_pfn_range(vma.start, vma.pgoff, vma.len(), vma.flags)
        .map_err(|err| {
            error!("{err} for {:#x}..{:#x}", vma.start, vma.end);
            SecmemError::RemapFailed
        })
}
