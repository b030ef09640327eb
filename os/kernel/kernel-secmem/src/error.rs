use crate::crypto::CryptoBackendError;
use crate::platform::CopyFault;

/// Linux errno values reported through the raw control-operation entry point.
pub mod errno {
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
}

/// Failure of a secure memory operation.
///
/// No variant is fatal to the device: a failed operation leaves the zone
/// registry, reserved pool, region table and DRM flag as they were.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecmemError {
    /// Malformed payload, zero-length request, negative zone index or an
    /// address that was never granted.
    #[error("invalid argument")]
    InvalidArgument,
    /// Copying a payload across the user/kernel boundary failed.
    #[error(transparent)]
    CopyFault(#[from] CopyFault),
    /// Both general allocation and the reserved pool are exhausted.
    #[error("out of memory")]
    OutOfMemory,
    /// The platform configured no secure memory zones.
    #[error("no secure memory zones configured")]
    NoZones,
    /// The crypto engine stayed locked for every permitted attempt.
    #[error("crypto engine busy")]
    ResourceBusy,
    /// The crypto backend reported a hard failure.
    #[error("crypto backend failure (errno {0})")]
    Backend(i32),
    /// The operation needs a collaborator that is not present.
    #[error("backend unavailable")]
    Unavailable,
    /// Unknown control-operation code.
    #[error("unsupported control operation {0:#010x}")]
    NotSupported(u32),
    /// Remapping secure pages into the caller's address space failed.
    #[error("failed to remap secure pages")]
    RemapFailed,
}

impl SecmemError {
    /// Positive errno for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument => errno::EINVAL,
            Self::CopyFault(_) => errno::EFAULT,
            Self::OutOfMemory | Self::NoZones => errno::ENOMEM,
            Self::ResourceBusy => errno::EBUSY,
            Self::Backend(code) => code,
            Self::Unavailable => errno::ENODEV,
            Self::NotSupported(_) => errno::ENOTTY,
            Self::RemapFailed => errno::EAGAIN,
        }
    }
}

impl From<CryptoBackendError> for SecmemError {
    fn from(value: CryptoBackendError) -> Self {
        match value {
            CryptoBackendError::Busy => Self::ResourceBusy,
            CryptoBackendError::Fault(code) => Self::Backend(code),
        }
    }
}
