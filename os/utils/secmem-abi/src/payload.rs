//! Payload records exchanged across the user/kernel boundary.
//!
//! All records are `#[repr(C)]`, carry explicit reserved words instead of
//! implicit padding, and accept any bit pattern, so they can be viewed as raw
//! bytes with [`Pod`].

/// Plain-old-data records that may be copied bytewise across the user boundary.
///
/// # Safety
/// Implementors must be `#[repr(C)]` (or a primitive integer), contain no
/// padding bytes and be valid for every bit pattern.
pub unsafe trait Pod: Copy + Default + 'static {
    /// The record as raw bytes.
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: Pod guarantees no padding, so every byte is initialized.
        unsafe { core::slice::from_raw_parts(core::ptr::from_ref(self).cast::<u8>(), size_of::<Self>()) }
    }

    /// The record as mutable raw bytes.
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: Pod guarantees every bit pattern is a valid value.
        unsafe {
            core::slice::from_raw_parts_mut(core::ptr::from_mut(self).cast::<u8>(), size_of::<Self>())
        }
    }
}

unsafe impl Pod for i32 {}
unsafe impl Pod for u32 {}
unsafe impl Pod for u64 {}

/// Zone lookup record used by `ChunkInfo` and `TextChunkInfo`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SecChunkInfo {
    /// Zone index on input. Rewritten to [`CHUNK_INDEX_END`](crate::CHUNK_INDEX_END)
    /// when the index is past the last zone.
    pub index: i32,

    /// Reserved; must be zero.
    pub reserved: u32,

    /// Physical base address of the zone.
    pub base: u64,

    /// Size of the zone in bytes.
    pub size: u64,
}

/// Imported video-memory handle and the physical address it resolves to.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SecFdInfo {
    /// File descriptor of the imported buffer.
    pub fd: i32,

    /// Reserved; must be zero.
    pub reserved: u32,

    /// Physical address of the buffer, filled by the driver.
    pub phys: u64,
}

/// Request may be served from the DRM reserved buffer when general
/// allocation is exhausted.
pub const REGION_FLAG_DRM: u32 = 1 << 0;

/// Region request/grant record used by `GetAddr` and `ReleaseAddr`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SecMemRegion {
    /// Kernel virtual address of the granted region. Output of `GetAddr`,
    /// input of `ReleaseAddr`.
    pub virt_addr: u64,

    /// Physical address of the granted region.
    pub phys_addr: u64,

    /// Requested length in bytes.
    pub len: u64,

    /// Request flags, see [`REGION_FLAG_DRM`].
    pub flags: u32,

    /// Reserved; must be zero.
    pub reserved: u32,
}

unsafe impl Pod for SecChunkInfo {}
unsafe impl Pod for SecFdInfo {}
unsafe impl Pod for SecMemRegion {}

const _: () = {
    assert!(size_of::<SecChunkInfo>() == 24);
    assert!(size_of::<SecFdInfo>() == 16);
    assert!(size_of::<SecMemRegion>() == 32);
};
