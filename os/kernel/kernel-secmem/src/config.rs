//! Platform configuration of the secure memory device.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use secmem_abi::SECMEM_DEVICE_NAME;

/// Capacity of the DRM reserved buffer on platforms that carve one out.
pub const RESERVED_POOL_SIZE: usize = 256 * 1024;

/// How often a contended crypto lock is tried before giving up.
pub const CRYPTO_LOCK_ATTEMPTS: u32 = 100;

/// Zone name of the camera text chunk reported by `TextChunkInfo`.
pub const TEXT_ZONE: &str = "fimc0";

/// Zone list and tunables for one SoC variant.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SecmemConfig {
    /// Name the device node is registered under.
    pub device_name: String,

    /// Ordered zone names; the position is the caller-facing zone index.
    pub zones: Vec<String>,

    /// Zone that receives the MFC magic marker.
    pub shm_zone: String,

    /// Zone reported by the fixed diagnostic lookup.
    pub text_zone: String,

    /// DRM reserved buffer capacity, `None` if the platform reserves none.
    pub reserved_pool_size: Option<usize>,

    /// Upper bound of crypto lock attempts per request (at least one).
    pub crypto_lock_attempts: u32,
}

impl SecmemConfig {
    const EXYNOS4_ZONES: [&'static str; 6] = ["mfc", "fimc", "mfc-shm", "sectbl", "video", "fimd"];
    const MIDAS_ZONES: [&'static str; 5] = ["mfc", "fimc", "mfc-shm", "sectbl", "fimd"];

    fn with_zone_names(zones: &[&str], shm_zone: &str) -> Self {
        Self {
            device_name: SECMEM_DEVICE_NAME.to_string(),
            zones: zones.iter().map(ToString::to_string).collect(),
            shm_zone: shm_zone.to_string(),
            text_zone: TEXT_ZONE.to_string(),
            reserved_pool_size: Some(RESERVED_POOL_SIZE),
            crypto_lock_attempts: CRYPTO_LOCK_ATTEMPTS,
        }
    }

    /// Exynos 4212/4412 boards with a dedicated video zone.
    #[must_use]
    pub fn exynos4() -> Self {
        Self::with_zone_names(&Self::EXYNOS4_ZONES, "mfc-shm")
    }

    /// Midas boards; same as [`exynos4`](Self::exynos4) without the video zone.
    #[must_use]
    pub fn midas() -> Self {
        Self::with_zone_names(&Self::MIDAS_ZONES, "mfc-shm")
    }

    /// Exynos 5250, whose MFC shared-memory zone is called `mfc_sh`.
    #[must_use]
    pub fn exynos5250() -> Self {
        Self::with_zone_names(&Self::EXYNOS4_ZONES, "mfc_sh")
    }

    /// Replace the zone list.
    #[must_use]
    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_shm_zone(mut self, name: impl Into<String>) -> Self {
        self.shm_zone = name.into();
        self
    }

    #[must_use]
    pub fn with_text_zone(mut self, name: impl Into<String>) -> Self {
        self.text_zone = name.into();
        self
    }

    #[must_use]
    pub const fn with_reserved_pool(mut self, size: Option<usize>) -> Self {
        self.reserved_pool_size = size;
        self
    }

    #[must_use]
    pub const fn with_crypto_lock_attempts(mut self, attempts: u32) -> Self {
        self.crypto_lock_attempts = attempts;
        self
    }
}

impl Default for SecmemConfig {
    fn default() -> Self {
        Self::exynos4()
    }
}
