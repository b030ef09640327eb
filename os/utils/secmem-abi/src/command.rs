use crate::payload::{SecChunkInfo, SecFdInfo, SecMemRegion};
use bitfield_struct::bitfield;

/// ioctl "type" byte shared by all secure memory commands.
pub const SECMEM_IOCTL_TYPE: u8 = b'S';

/// Data transfer direction encoded in bits 30–31 of an ioctl number,
/// seen from user space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum IoctlDirection {
    None = 0,
    Write = 1,
    Read = 2,
    ReadWrite = 3,
}

impl IoctlDirection {
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::None,
            1 => Self::Write,
            2 => Self::Read,
            _ => Self::ReadWrite,
        }
    }
}

/// Linux `_IOC` command word.
///
/// ```text
/// | 31‒30 | 29‒16 | 15‒8 | 7‒0 |
/// |  dir  |  size | type |  nr |
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct IoctlNumber {
    /// Bits 0–7: command number within the type.
    pub nr: u8,

    /// Bits 8–15: driver type byte, [`SECMEM_IOCTL_TYPE`] for this device.
    pub kind: u8,

    /// Bits 16–29: size of the payload record in bytes.
    #[bits(14)]
    pub size: u16,

    /// Bits 30–31: transfer direction.
    #[bits(2, default = IoctlDirection::None)]
    pub dir: IoctlDirection,
}

impl IoctlNumber {
    #[must_use]
    pub const fn encode(dir: IoctlDirection, nr: u8, size: usize) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let size = size as u16;
        Self::new()
            .with_dir(dir)
            .with_kind(SECMEM_IOCTL_TYPE)
            .with_nr(nr)
            .with_size(size)
            .into_bits()
    }
}

/// Control operations understood by the secure memory device.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SecmemCommand {
    /// Resolve a zone index to its base and size.
    ChunkInfo,
    /// Set (`!= 0`) or clear (`0`) DRM protected playback mode.
    SetDrmOnOff,
    /// Report whether DRM protected playback mode is active.
    GetDrmOnOff,
    /// Take the hardware crypto engine lock.
    GetCryptoLock,
    /// Give back the hardware crypto engine lock.
    ReleaseCryptoLock,
    /// Allocate a DMA-visible region and report its physical address.
    GetAddr,
    /// Release a region obtained with [`GetAddr`](Self::GetAddr).
    ReleaseAddr,
    /// Resolve an imported video-memory handle to a physical address.
    GetFdPhysAddr,
    /// Stamp [`MFC_SEC_MAGIC`](crate::MFC_SEC_MAGIC) into the MFC shared-memory zone.
    MfcMagicKey,
    /// Report base and size of the fixed camera text zone.
    TextChunkInfo,
}

impl SecmemCommand {
    pub const ALL: [Self; 10] = [
        Self::ChunkInfo,
        Self::SetDrmOnOff,
        Self::GetDrmOnOff,
        Self::GetCryptoLock,
        Self::ReleaseCryptoLock,
        Self::GetAddr,
        Self::ReleaseAddr,
        Self::GetFdPhysAddr,
        Self::MfcMagicKey,
        Self::TextChunkInfo,
    ];

    /// The raw ioctl number callers pass for this command.
    #[must_use]
    pub const fn number(self) -> u32 {
        use IoctlDirection::{Read, ReadWrite};
        match self {
            Self::ChunkInfo => IoctlNumber::encode(ReadWrite, 1, size_of::<SecChunkInfo>()),
            Self::SetDrmOnOff => IoctlNumber::encode(ReadWrite, 2, size_of::<i32>()),
            Self::GetDrmOnOff => IoctlNumber::encode(ReadWrite, 3, size_of::<i32>()),
            Self::GetCryptoLock => IoctlNumber::encode(Read, 4, size_of::<i32>()),
            Self::ReleaseCryptoLock => IoctlNumber::encode(Read, 5, size_of::<i32>()),
            Self::GetAddr => IoctlNumber::encode(ReadWrite, 6, size_of::<SecMemRegion>()),
            Self::ReleaseAddr => IoctlNumber::encode(ReadWrite, 7, size_of::<SecMemRegion>()),
            Self::GetFdPhysAddr => IoctlNumber::encode(ReadWrite, 8, size_of::<SecFdInfo>()),
            Self::MfcMagicKey => IoctlNumber::encode(Read, 9, size_of::<i32>()),
            Self::TextChunkInfo => IoctlNumber::encode(ReadWrite, 10, size_of::<SecChunkInfo>()),
        }
    }

    /// Decode a raw ioctl number; `None` for anything this device does not handle.
    #[must_use]
    pub fn from_number(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.number() == raw)
    }
}

impl From<SecmemCommand> for u32 {
    fn from(value: SecmemCommand) -> Self {
        value.number()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_unique_and_decode_back() {
        for cmd in SecmemCommand::ALL {
            assert_eq!(SecmemCommand::from_number(cmd.number()), Some(cmd));
        }
        let mut raw: Vec<u32> = SecmemCommand::ALL.iter().map(|c| c.number()).collect();
        raw.sort_unstable();
        raw.dedup();
        assert_eq!(raw.len(), SecmemCommand::ALL.len());
    }

    #[test]
    fn chunk_info_matches_ioc_layout() {
        let raw = SecmemCommand::ChunkInfo.number();
        let decoded = IoctlNumber::from_bits(raw);
        assert_eq!(decoded.kind(), b'S');
        assert_eq!(decoded.nr(), 1);
        assert_eq!(decoded.dir(), IoctlDirection::ReadWrite);
        assert_eq!(usize::from(decoded.size()), size_of::<SecChunkInfo>());

        // _IOWR('S', 1, 24 bytes)
        assert_eq!(raw, (3 << 30) | (24 << 16) | (u32::from(b'S') << 8) | 1);
    }

    #[test]
    fn foreign_numbers_are_rejected() {
        assert_eq!(SecmemCommand::from_number(0), None);
        // right nr, wrong type byte
        let other = IoctlNumber::new()
            .with_dir(IoctlDirection::ReadWrite)
            .with_kind(b'V')
            .with_nr(1)
            .with_size(24)
            .into_bits();
        assert_eq!(SecmemCommand::from_number(other), None);
    }
}
