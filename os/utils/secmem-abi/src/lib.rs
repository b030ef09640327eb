//! # Secure Memory Device ABI
//!
//! Types shared between the `s5p-smem` secure memory driver and its privileged
//! user-space callers (media decode and camera HALs).
//!
//! Every request is a single `(command, argument)` pair issued through the
//! device's control-operation entry point. The command word is a Linux style
//! `_IOC` number (see [`IoctlNumber`]); the argument points at one of the
//! `#[repr(C)]` payload records defined in [`payload`].
//!
//! | Command | Payload | Direction |
//! |---------|---------|-----------|
//! | [`ChunkInfo`](SecmemCommand::ChunkInfo) | [`SecChunkInfo`] | in/out |
//! | [`GetFdPhysAddr`](SecmemCommand::GetFdPhysAddr) | [`SecFdInfo`] | in/out |
//! | [`SetDrmOnOff`](SecmemCommand::SetDrmOnOff) | `i32` | in |
//! | [`GetDrmOnOff`](SecmemCommand::GetDrmOnOff) | `i32` | out |
//! | [`GetCryptoLock`](SecmemCommand::GetCryptoLock) | – | – |
//! | [`ReleaseCryptoLock`](SecmemCommand::ReleaseCryptoLock) | – | – |
//! | [`GetAddr`](SecmemCommand::GetAddr) | [`SecMemRegion`] | in/out |
//! | [`ReleaseAddr`](SecmemCommand::ReleaseAddr) | [`SecMemRegion`] | in |
//! | [`MfcMagicKey`](SecmemCommand::MfcMagicKey) | – | – |
//! | [`TextChunkInfo`](SecmemCommand::TextChunkInfo) | [`SecChunkInfo`] | out |

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod command;
pub mod payload;

pub use command::{IoctlDirection, IoctlNumber, SECMEM_IOCTL_TYPE, SecmemCommand};
pub use payload::{Pod, REGION_FLAG_DRM, SecChunkInfo, SecFdInfo, SecMemRegion};

/// Name under which the device node is registered.
pub const SECMEM_DEVICE_NAME: &str = "s5p-smem";

/// Granularity of user mappings of secure memory.
pub const PAGE_SIZE: u64 = 4096;

/// Words written to the start of the MFC shared-memory zone by
/// [`SecmemCommand::MfcMagicKey`]. Firmware checks this marker before it
/// enters secure decode.
pub const MFC_SEC_MAGIC: [u32; 4] = [0x13cd_bf16, 0x8b80_3342, 0x5e87_f4f5, 0x3bd0_5317];

/// `index` value reported by [`SecmemCommand::ChunkInfo`] once iteration has
/// passed the last configured zone.
pub const CHUNK_INDEX_END: i32 = -1;
