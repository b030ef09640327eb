#![allow(dead_code)]

use kernel_secmem::abi::Pod;
use kernel_secmem::{
    CmaInfo, ContiguousMemory, CopyFault, DmaAllocator, DmaDirection, HandleResolver, PhysMapper,
    PhysicalAddress, Platform, PowerManager, ResolveError, SecmemConfig, SecmemDevice, UserAccess,
    UserPtr, VirtualAddress,
};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Host-memory platform: identity linear map, heap-backed DMA memory and
/// counters for every side effect.
#[derive(Default)]
pub struct MockPlatform {
    zones: Vec<(String, u64, u64)>,
    /// Host allocations standing in for carve-outs, by address.
    carve_outs: Vec<(usize, Layout)>,
    heap: Mutex<HashMap<u64, Layout>>,
    handles: Option<HashMap<i32, u64>>,

    /// Make every DMA allocation fail.
    pub dma_exhausted: AtomicBool,

    pub allocs: AtomicUsize,
    pub frees: AtomicUsize,
    pub syncs: AtomicUsize,
    pub forbids: AtomicUsize,
    pub allows: AtomicUsize,
    pub pm_enabled: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zone at a made-up physical address; never dereferenced.
    pub fn with_zone(mut self, name: &str, base: u64, size: u64) -> Self {
        self.zones.push((name.to_string(), base, size));
        self
    }

    /// Zone backed by real host memory so it can be written and read back.
    pub fn with_backed_zone(mut self, name: &str, size: usize) -> Self {
        let layout = Layout::from_size_align(size.max(4), 16).unwrap();
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        let addr = ptr.expose_provenance();
        self.carve_outs.push((addr, layout));
        self.zones.push((name.to_string(), addr as u64, size as u64));
        self
    }

    /// Backed zone whose base sits `skew` bytes past a 16-byte boundary.
    pub fn with_skewed_zone(mut self, name: &str, size: usize, skew: usize) -> Self {
        let layout = Layout::from_size_align(size + skew, 16).unwrap();
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        let addr = ptr.expose_provenance();
        self.carve_outs.push((addr, layout));
        self.zones.push((name.to_string(), (addr + skew) as u64, size as u64));
        self
    }

    pub fn with_handles(mut self, handles: &[(i32, u64)]) -> Self {
        self.handles = Some(handles.iter().copied().collect());
        self
    }

    pub fn zone(&self, name: &str) -> (u64, u64) {
        self.zones
            .iter()
            .find(|(n, ..)| n == name)
            .map(|&(_, base, size)| (base, size))
            .unwrap()
    }

    /// Read back 32-bit word `index` of a backed zone.
    pub fn read_zone_word(&self, name: &str, index: usize) -> u32 {
        let (base, size) = self.zone(name);
        assert!((index + 1) * 4 <= size as usize);
        let ptr = std::ptr::with_exposed_provenance::<u32>(base as usize);
        // SAFETY: backed zones are live host allocations of `size` bytes.
        unsafe { ptr.add(index).read_volatile() }
    }

    /// Raw contents of a backed zone.
    pub fn read_zone_bytes(&self, name: &str) -> Vec<u8> {
        let (base, size) = self.zone(name);
        let ptr = std::ptr::with_exposed_provenance::<u8>(base as usize);
        // SAFETY: backed zones are live host allocations of `size` bytes.
        (0..size as usize).map(|i| unsafe { ptr.add(i).read_volatile() }).collect()
    }

    pub fn live_heap_allocations(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl Drop for MockPlatform {
    fn drop(&mut self) {
        for (addr, layout) in self.carve_outs.drain(..) {
            // SAFETY: allocated in `with_backed_zone` with this layout.
            unsafe { dealloc(std::ptr::with_exposed_provenance_mut(addr), layout) };
        }
        for (addr, layout) in self.heap.lock().unwrap().drain() {
            // SAFETY: allocated in `alloc_zeroed` with this layout.
            unsafe { dealloc(std::ptr::with_exposed_provenance_mut(addr as usize), layout) };
        }
    }
}

impl ContiguousMemory for MockPlatform {
    fn cma_info(&self, name: &str) -> Option<CmaInfo> {
        self.zones
            .iter()
            .find(|(n, ..)| n == name)
            .map(|&(_, base, size)| CmaInfo {
                lower_bound: PhysicalAddress::new(base),
                total_size: size,
            })
    }
}

impl DmaAllocator for MockPlatform {
    fn alloc_zeroed(&self, len: usize) -> Option<VirtualAddress> {
        if self.dma_exhausted.load(Ordering::SeqCst) || len == 0 {
            return None;
        }
        let layout = Layout::from_size_align(len, 64).ok()?;
        // SAFETY: non-zero size checked above.
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return None;
        }
        let va = VirtualAddress::from_ptr(ptr);
        self.heap.lock().unwrap().insert(va.as_u64(), layout);
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Some(va)
    }

    unsafe fn free(&self, va: VirtualAddress, len: usize) {
        let layout = self
            .heap
            .lock()
            .unwrap()
            .remove(&va.as_u64())
            .unwrap_or_else(|| panic!("free of {va}, which was not allocated"));
        assert_eq!(layout.size(), len, "free with mismatched length");
        // SAFETY: allocated in `alloc_zeroed` with this layout.
        unsafe { dealloc(va.as_mut_ptr(), layout) };
        self.frees.fetch_add(1, Ordering::SeqCst);
    }

    fn map_single(&self, _va: VirtualAddress, _len: usize, direction: DmaDirection) {
        assert_eq!(direction, DmaDirection::ToDevice);
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }
}

impl PhysMapper for MockPlatform {
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64())
    }

    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64())
    }
}

impl PowerManager for MockPlatform {
    fn runtime_enable(&self) {
        self.pm_enabled.store(true, Ordering::SeqCst);
    }

    fn runtime_disable(&self) {
        self.pm_enabled.store(false, Ordering::SeqCst);
    }

    fn forbid(&self) {
        self.forbids.fetch_add(1, Ordering::SeqCst);
    }

    fn allow(&self) {
        self.allows.fetch_add(1, Ordering::SeqCst);
    }
}

impl HandleResolver for MockPlatform {
    fn resolve_phys(&self, fd: i32) -> Result<PhysicalAddress, ResolveError> {
        let handles = self.handles.as_ref().ok_or(ResolveError::Unsupported)?;
        handles
            .get(&fd)
            .map(|&phys| PhysicalAddress::new(phys))
            .ok_or(ResolveError::BadHandle(fd))
    }
}

// SAFETY: backed zones and DMA allocations are live host memory of the
// reported size; unbacked zones are never written by the tests.
unsafe impl Platform for MockPlatform {}

/// The caller's memory: a flat byte arena starting at `ARENA_BASE`.
pub struct UserArena {
    mem: Mutex<Vec<u8>>,
    /// Make every copy back to the caller fault.
    pub fail_copy_out: AtomicBool,
}

pub const ARENA_BASE: usize = 0x1000;

impl UserArena {
    pub fn new(size: usize) -> Self {
        Self {
            mem: Mutex::new(vec![0; size]),
            fail_copy_out: AtomicBool::new(false),
        }
    }

    pub fn ptr(offset: usize) -> UserPtr {
        UserPtr::new(ARENA_BASE + offset)
    }

    fn range(&self, at: UserPtr, len: usize) -> Result<std::ops::Range<usize>, CopyFault> {
        let start = at.as_usize().checked_sub(ARENA_BASE).ok_or(CopyFault)?;
        let end = start.checked_add(len).ok_or(CopyFault)?;
        if end > self.mem.lock().unwrap().len() {
            return Err(CopyFault);
        }
        Ok(start..end)
    }

    pub fn put<T: Pod>(&self, at: UserPtr, value: &T) {
        let range = self.range(at, size_of::<T>()).unwrap();
        self.mem.lock().unwrap()[range].copy_from_slice(value.as_bytes());
    }

    pub fn get<T: Pod>(&self, at: UserPtr) -> T {
        let mut value = T::default();
        let range = self.range(at, size_of::<T>()).unwrap();
        value.as_bytes_mut().copy_from_slice(&self.mem.lock().unwrap()[range]);
        value
    }
}

impl UserAccess for UserArena {
    fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> Result<(), CopyFault> {
        let range = self.range(src, dst.len())?;
        dst.copy_from_slice(&self.mem.lock().unwrap()[range]);
        Ok(())
    }

    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> Result<(), CopyFault> {
        if self.fail_copy_out.load(Ordering::SeqCst) {
            return Err(CopyFault);
        }
        let range = self.range(dst, src.len())?;
        self.mem.lock().unwrap()[range].copy_from_slice(src);
        Ok(())
    }
}

/// Zones `mfc`, `fimc`, `mfc-shm` (backed) and `fimc0`, with a 4 KiB reserved buffer.
pub fn standard_platform() -> MockPlatform {
    MockPlatform::new()
        .with_zone("mfc", 0x5000_0000, 0x0200_0000)
        .with_zone("fimc", 0x5200_0000, 0x0100_0000)
        .with_backed_zone("mfc-shm", 0x1000)
        .with_zone("fimc0", 0x5400_0000, 0x0080_0000)
}

pub fn standard_config() -> SecmemConfig {
    SecmemConfig::exynos4()
        .with_zones(["mfc", "fimc", "mfc-shm"])
        .with_reserved_pool(Some(4096))
}

pub fn standard_device() -> SecmemDevice<MockPlatform> {
    SecmemDevice::new(standard_platform(), standard_config()).unwrap()
}
