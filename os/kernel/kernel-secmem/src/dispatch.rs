//! # Control-Operation Dispatcher
//!
//! Decodes a raw `(command, argument)` pair, copies the payload in, runs
//! exactly one device operation and copies the result back out.
//!
//! Side effects happen before the copy-out. If copying the result back
//! faults, the caller sees `CopyFault` but the operation is not undone; a
//! granted region stays live, for example.

use crate::addr::VirtualAddress;
use crate::device::SecmemDevice;
use crate::error::SecmemError;
use crate::platform::{Platform, UserAccess, UserPtr, read_record, write_record};
use crate::region::RegionRequest;
use crate::zone::ZoneLookup;
use log::{debug, error, trace};
use secmem_abi::{
    CHUNK_INDEX_END, REGION_FLAG_DRM, SecChunkInfo, SecFdInfo, SecMemRegion, SecmemCommand,
};

impl<P: Platform> SecmemDevice<P> {
    /// Handle one control operation.
    ///
    /// # Errors
    /// `NotSupported` for an unknown `cmd`, `CopyFault` if the payload cannot
    /// be copied, otherwise the error of the operation.
    pub fn ioctl<U: UserAccess + ?Sized>(
        &self,
        user: &U,
        cmd: u32,
        arg: UserPtr,
    ) -> Result<(), SecmemError> {
        let Some(command) = SecmemCommand::from_number(cmd) else {
            debug!("unknown control operation {cmd:#010x}");
            return Err(SecmemError::NotSupported(cmd));
        };
        trace!("{command:?} arg={arg:?}");

        let result = match command {
            SecmemCommand::ChunkInfo => self.handle_chunk_info(user, arg),
            SecmemCommand::GetFdPhysAddr => self.handle_fd_phys_addr(user, arg),
            SecmemCommand::GetDrmOnOff => self.handle_get_drm(user, arg),
            SecmemCommand::SetDrmOnOff => self.handle_set_drm(user, arg),
            SecmemCommand::GetCryptoLock => self.acquire_crypto_lock(),
            SecmemCommand::ReleaseCryptoLock => self.release_crypto_lock(),
            SecmemCommand::GetAddr => self.handle_get_addr(user, arg),
            SecmemCommand::ReleaseAddr => self.handle_release_addr(user, arg),
            SecmemCommand::MfcMagicKey => self.write_mfc_magic().map(|_| ()),
            SecmemCommand::TextChunkInfo => self.handle_text_chunk_info(user, arg),
        };

        if let Err(err) = result {
            debug!("{command:?} failed: {err}");
        }
        result
    }

    /// [`ioctl`](Self::ioctl) with the host kernel's calling convention:
    /// `0` on success, `-errno` on failure.
    #[must_use]
    pub fn unlocked_ioctl<U: UserAccess + ?Sized>(&self, user: &U, cmd: u32, arg: usize) -> i64 {
        match self.ioctl(user, cmd, UserPtr::new(arg)) {
            Ok(()) => 0,
            Err(err) => -i64::from(err.errno()),
        }
    }

    fn handle_chunk_info<U: UserAccess + ?Sized>(&self, user: &U, arg: UserPtr) -> Result<(), SecmemError> {
        if self.zones().is_empty() {
            return Err(SecmemError::NoZones);
        }

        let mut info: SecChunkInfo = read_record(user, arg)?;
        ensure_reserved_clear(info.reserved)?;
        match self.zone_chunk_info(info.index)? {
            ZoneLookup::Found(zone) => {
                info.base = zone.base().as_u64();
                info.size = zone.size();
            }
            ZoneLookup::EndOfList => info.index = CHUNK_INDEX_END,
        }
        write_record(user, arg, &info)?;
        Ok(())
    }

    fn handle_text_chunk_info<U: UserAccess + ?Sized>(
        &self,
        user: &U,
        arg: UserPtr,
    ) -> Result<(), SecmemError> {
        let zone = self.text_chunk_info()?;
        let info = SecChunkInfo {
            base: zone.base().as_u64(),
            size: zone.size(),
            ..SecChunkInfo::default()
        };
        write_record(user, arg, &info)?;
        Ok(())
    }

    fn handle_fd_phys_addr<U: UserAccess + ?Sized>(
        &self,
        user: &U,
        arg: UserPtr,
    ) -> Result<(), SecmemError> {
        let mut fd_info: SecFdInfo = read_record(user, arg)?;
        ensure_reserved_clear(fd_info.reserved)?;
        debug!("fd from user space = {}", fd_info.fd);
        fd_info.phys = self.resolve_handle(fd_info.fd)?.as_u64();
        write_record(user, arg, &fd_info)?;
        Ok(())
    }

    fn handle_get_drm<U: UserAccess + ?Sized>(&self, user: &U, arg: UserPtr) -> Result<(), SecmemError> {
        let on = i32::from(self.drm_mode());
        write_record(user, arg, &on)?;
        Ok(())
    }

    fn handle_set_drm<U: UserAccess + ?Sized>(&self, user: &U, arg: UserPtr) -> Result<(), SecmemError> {
        let value: i32 = read_record(user, arg)?;
        // A redundant request is only a diagnostic; the caller still succeeds.
        let _ = self.set_drm_mode(value != 0);
        Ok(())
    }

    fn handle_get_addr<U: UserAccess + ?Sized>(&self, user: &U, arg: UserPtr) -> Result<(), SecmemError> {
        let mut region: SecMemRegion = read_record(user, arg)?;
        ensure_reserved_clear(region.reserved)?;
        let Ok(len) = usize::try_from(region.len) else {
            error!("secure region size out of range [size : {}]", region.len);
            return Err(SecmemError::InvalidArgument);
        };
        let request = RegionRequest {
            len,
            drm: region.flags & REGION_FLAG_DRM != 0,
        };

        let granted = self.allocate_region(request)?;
        region.virt_addr = granted.virt.as_u64();
        region.phys_addr = granted.phys.as_u64();
        write_record(user, arg, &region)?;
        Ok(())
    }

    fn handle_release_addr<U: UserAccess + ?Sized>(
        &self,
        user: &U,
        arg: UserPtr,
    ) -> Result<(), SecmemError> {
        let region: SecMemRegion = read_record(user, arg)?;
        ensure_reserved_clear(region.reserved)?;
        self.release_region(VirtualAddress::new(region.virt_addr))?;
        Ok(())
    }
}

/// Reserved payload words must be zero.
fn ensure_reserved_clear(word: u32) -> Result<(), SecmemError> {
    if word == 0 {
        Ok(())
    } else {
        error!("reserved payload word is {word:#x}, expected 0");
        Err(SecmemError::InvalidArgument)
    }
}
