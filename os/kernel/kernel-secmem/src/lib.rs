//! # Secure Memory Gatekeeper
//!
//! Kernel-side core of the `s5p-smem` device. The SoC reserves physically
//! contiguous "secure" zones at boot for the MFC video codec and the FIMC
//! camera pipeline; privileged user space uses this device to
//!
//! - discover zone base addresses and sizes ([`zone`]),
//! - obtain DMA-visible buffers with their physical addresses ([`region`]),
//!   falling back to a single DRM reserved buffer ([`reserved_pool`]),
//! - serialise access to the hardware crypto engine ([`crypto`]),
//! - switch DRM protected playback on and off, which pins runtime power
//!   management ([`drm`]),
//! - map secure memory non-cached into its address space ([`mmap`]).
//!
//! ## Architecture
//!
//! ```text
//!   caller (cmd, arg)
//!        │
//!        ▼
//! ┌──────────────────────────────┐
//! │  SecmemDevice::ioctl         │  decode, copy-in, copy-out
//! └──┬──────┬──────┬──────┬──────┘
//!    │      │      │      │
//!    ▼      ▼      ▼      ▼
//!  Zone   Region  Crypto   DRM
//!  Regis- Alloc-  Arbi-    Mode
//!  try    ator    trator
//!    │      │ └► ReservedPool
//!    ▼      ▼             │
//! ┌──────────────────────────────┐
//! │  Platform (CMA, DMA, linear  │
//! │  map, runtime PM, handles)   │
//! └──────────────────────────────┘
//! ```
//!
//! All shared state lives in one [`SecmemDevice`] passed by reference to
//! every request; there are no hidden globals. Each piece of mutable state
//! carries its own synchronisation:
//!
//! | State | Discipline |
//! |-------|------------|
//! | reserved buffer slot | `AtomicBool` compare-and-swap |
//! | live region table | spin mutex |
//! | DRM flag | spin mutex held across the power-management call |
//! | crypto backend handle | spin mutex around a `Weak`, re-read per attempt |
//!
//! ## Example
//!
//! ```rust,ignore
//! use kernel_secmem::{SecmemConfig, SecmemDevice};
//!
//! let device = SecmemDevice::new(platform, SecmemConfig::exynos4())?;
//! device.register_crypto(&crypto_driver);
//!
//! // from the file_operations glue:
//! let ret = device.unlocked_ioctl(&caller, cmd, arg);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod addr;
pub mod config;
pub mod crypto;
mod device;
mod dispatch;
pub mod drm;
mod error;
pub mod mmap;
pub mod platform;
pub mod region;
pub mod reserved_pool;
pub mod zone;

pub use crate::addr::{PhysicalAddress, VirtualAddress};
pub use crate::config::SecmemConfig;
pub use crate::crypto::{CryptoArbitrator, CryptoBackend, CryptoBackendError};
pub use crate::device::SecmemDevice;
pub use crate::drm::{DrmMode, DrmTransition};
pub use crate::error::{SecmemError, errno};
pub use crate::mmap::{MappingFlags, PageRemapper, RemapError, VmArea};
pub use crate::platform::{
    CmaInfo, ContiguousMemory, CopyFault, DmaAllocator, DmaDirection, HandleResolver, PhysMapper,
    Platform, PowerManager, ResolveError, UserAccess, UserPtr,
};
pub use crate::region::{AllocatedRegion, RegionAllocator, RegionRequest, RegionSource};
pub use crate::reserved_pool::ReservedPool;
pub use crate::zone::{ZoneDescriptor, ZoneLookup, ZoneRegistry};
pub use secmem_abi as abi;
