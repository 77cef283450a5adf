//! Heap-backed [`DmaAllocator`](super::DmaAllocator) for hosted targets.
//!
//! Backs regions with the global allocator and hands out sequential pseudo
//! bus addresses, with counters to inject allocation or mapping failures at
//! a chosen point. Useful for tests and for the `prugen-cli` demo; real
//! targets supply their own allocator against coherent memory.

use core::alloc::Layout;
use core::ptr::NonNull;

use super::DmaRegion;
use crate::BURST_ALIGN;

/// Base of the pseudo bus-address space handed out by [`Allocator`].
pub const FAKE_BUS_BASE: u32 = 0x9000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The host allocation failed (or was made to fail).
    AllocFailed,
    /// The mapping failed (or was made to fail).
    MapFailed,
}

/// A fake allocator over the global heap.
pub struct Allocator {
    allow_allocs: Option<u32>,
    allow_maps: Option<u32>,
    next_bus: u32,
    live_regions: u32,
    live_mappings: u32,
}

impl Allocator {
    pub fn new() -> Self {
        Self {
            allow_allocs: None,
            allow_maps: None,
            next_bus: FAKE_BUS_BASE,
            live_regions: 0,
            live_mappings: 0,
        }
    }

    /// Fail every `alloc` call after the first `n` have succeeded.
    pub fn fail_allocs_after(mut self, n: u32) -> Self {
        self.allow_allocs = Some(n);
        self
    }

    /// Fail every `map` call after the first `n` have succeeded.
    pub fn fail_maps_after(mut self, n: u32) -> Self {
        self.allow_maps = Some(n);
        self
    }

    /// Regions currently allocated and not yet freed.
    pub fn live_regions(&self) -> u32 {
        self.live_regions
    }

    /// Mappings currently established and not yet torn down.
    pub fn live_mappings(&self) -> u32 {
        self.live_mappings
    }

    fn layout(len: usize) -> Layout {
        // Infallible for the sizes the pool produces: len is nonzero and
        // BURST_ALIGN is a power of two.
        Layout::from_size_align(len, BURST_ALIGN).unwrap_or(Layout::new::<u8>())
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl super::DmaAllocator for Allocator {
    type Error = Error;

    fn alloc(&mut self, len: usize) -> Result<DmaRegion, Error> {
        if let Some(budget) = &mut self.allow_allocs {
            if *budget == 0 {
                return Err(Error::AllocFailed);
            }
            *budget -= 1;
        }
        // SAFETY: len is nonzero for every pool buffer; the layout is valid.
        let raw = unsafe { alloc::alloc::alloc_zeroed(Self::layout(len)) };
        let ptr = NonNull::new(raw).ok_or(Error::AllocFailed)?;
        self.live_regions += 1;
        // SAFETY: freshly allocated block of exactly `len` bytes, exclusively
        // ours until freed.
        Ok(unsafe { DmaRegion::from_raw(ptr, len) })
    }

    fn free(&mut self, region: DmaRegion) {
        let len = region.len();
        // SAFETY: the region came out of `alloc` above with this layout.
        unsafe { alloc::alloc::dealloc(region.as_ptr().as_ptr(), Self::layout(len)) };
        self.live_regions -= 1;
    }

    fn map(&mut self, region: &DmaRegion) -> Result<u32, Error> {
        if let Some(budget) = &mut self.allow_maps {
            if *budget == 0 {
                return Err(Error::MapFailed);
            }
            *budget -= 1;
        }
        let bus = self.next_bus;
        self.next_bus += region.len() as u32;
        self.live_mappings += 1;
        Ok(bus)
    }

    fn unmap(&mut self, _bus_addr: u32, _len: usize) {
        self.live_mappings -= 1;
    }
}
