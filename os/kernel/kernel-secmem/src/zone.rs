//! # Zone Registry
//!
//! Secure memory is carved out at boot into named, physically contiguous
//! zones, one per hardware pipeline. Callers address zones by their position
//! in the configured list and iterate `0, 1, 2, …` until the registry reports
//! [`ZoneLookup::EndOfList`].
//!
//! The registry stores names only. Base and size are always asked from the
//! contiguous memory allocator, so a lookup is a pure query and repeated
//! lookups of the same index agree.

use crate::addr::PhysicalAddress;
use crate::error::SecmemError;
use crate::platform::{ContiguousMemory, Platform};
use alloc::string::String;
use alloc::vec::Vec;
use log::{error, trace};

/// A resolved zone.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ZoneDescriptor<'a> {
    name: &'a str,
    base: PhysicalAddress,
    size: u64,
}

impl<'a> ZoneDescriptor<'a> {
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Store `words` as consecutive 32-bit cells starting `offset` bytes into
    /// the zone.
    ///
    /// The whole range must lie inside the zone and the first cell must be
    /// 4-byte aligned; otherwise nothing is written and `InvalidArgument` is
    /// returned.
    pub(crate) fn write_words<P: Platform + ?Sized>(
        &self,
        platform: &P,
        offset: u64,
        words: &[u32],
    ) -> Result<(), SecmemError> {
        let bytes = (words.len() as u64).saturating_mul(4);
        let in_bounds = offset
            .checked_add(bytes)
            .is_some_and(|end| end <= self.size);
        if !offset.is_multiple_of(4) || !in_bounds {
            error!(
                "zone {} ({} bytes) cannot hold {} bytes at offset {offset:#x}",
                self.name, self.size, bytes
            );
            return Err(SecmemError::InvalidArgument);
        }

        let start = self.base.checked_add(offset).ok_or(SecmemError::InvalidArgument)?;
        let cells = platform.phys_to_virt(start).as_mut_ptr::<u32>();
        if !start.as_u64().is_multiple_of(4) || !cells.is_aligned() {
            error!("zone {} at {start} is not 32-bit aligned", self.name);
            return Err(SecmemError::InvalidArgument);
        }
        for (i, word) in words.iter().enumerate() {
            // SAFETY: the zone came from `cma_info` and the Platform contract
            // keeps it mapped for `size` bytes; the range was checked above.
            unsafe { cells.add(i).write_volatile(*word) };
        }
        Ok(())
    }
}

/// Outcome of an index lookup.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ZoneLookup<'a> {
    Found(ZoneDescriptor<'a>),
    /// The index is past the last configured zone.
    EndOfList,
}

/// Fixed, ordered list of zone names.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    names: Vec<String>,
}

impl ZoneRegistry {
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Resolve the zone at `index`.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative index or when the allocator does not
    /// know the configured zone name.
    pub fn lookup<C: ContiguousMemory + ?Sized>(
        &self,
        cma: &C,
        index: i32,
    ) -> Result<ZoneLookup<'_>, SecmemError> {
        let Ok(index) = usize::try_from(index) else {
            return Err(SecmemError::InvalidArgument);
        };
        match self.names.get(index) {
            Some(name) => Self::resolve(cma, name).map(ZoneLookup::Found),
            None => {
                trace!("zone index {index} is past the last of {} zones", self.len());
                Ok(ZoneLookup::EndOfList)
            }
        }
    }

    /// Resolve a zone by name, whether or not it is part of the index list.
    ///
    /// # Errors
    /// `InvalidArgument` when the allocator does not know `name`.
    pub fn resolve<'n, C: ContiguousMemory + ?Sized>(
        cma: &C,
        name: &'n str,
    ) -> Result<ZoneDescriptor<'n>, SecmemError> {
        let Some(info) = cma.cma_info(name) else {
            error!("no contiguous memory zone named {name:?}");
            return Err(SecmemError::InvalidArgument);
        };
        Ok(ZoneDescriptor {
            name,
            base: info.lower_bound,
            size: info.total_size,
        })
    }
}
