//! The hardware seam for DMA-capable memory: allocation of the regions that
//! back the buffer ring, and mapping them for device-visible addressing.

use core::ptr::NonNull;

pub mod fake;

/// A contiguous host-visible memory region suitable for outbound DMA.
///
/// The pointer/length pair is owned by whichever [`DmaAllocator`] produced
/// it; the region stays valid until handed back through
/// [`DmaAllocator::free`]. Regions are produced zero-filled and aligned to
/// [`BURST_ALIGN`](crate::BURST_ALIGN).
#[derive(Debug)]
pub struct DmaRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl DmaRegion {
    /// Assemble a region from its raw parts.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `len` bytes of readable and writable
    /// memory that remains valid until the region is freed, and nothing
    /// else may write through that memory while the region is live.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Length of the region in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The host-visible base pointer.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Copy `src` into the region starting at `byte` offset.
    ///
    /// # Panics
    ///
    /// Panics if the copy would run past the end of the region.
    pub(crate) fn write_at(&mut self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.len);
        // SAFETY: the range is in bounds per the assert above, and the
        // `from_raw` contract gives this region exclusive write access to
        // its memory.
        unsafe {
            core::ptr::copy_nonoverlapping(
                src.as_ptr(),
                self.ptr.as_ptr().add(offset),
                src.len(),
            );
        }
    }

    /// Read-only view of the region contents.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: covered by the `from_raw` contract.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

// SAFETY: a DmaRegion is an owning handle; access to its memory is mediated
// by &/&mut on the handle itself.
unsafe impl Send for DmaRegion {}

/// Allocator and mapper for DMA-capable memory.
///
/// Split exactly along the line the driver needs: `alloc`/`free` manage the
/// lifetime of host memory, `map`/`unmap` manage its visibility to the
/// device. Mapping is for the outbound (host to device) direction only.
pub trait DmaAllocator {
    type Error;

    /// Allocate a zero-filled region of `len` bytes.
    fn alloc(&mut self, len: usize) -> Result<DmaRegion, Self::Error>;

    /// Return a region to the allocator. The region must not be mapped.
    fn free(&mut self, region: DmaRegion);

    /// Make the region visible to the device for outbound transfers,
    /// returning its device (bus) address.
    fn map(&mut self, region: &DmaRegion) -> Result<u32, Self::Error>;

    /// Tear down a mapping previously established with `map`.
    fn unmap(&mut self, bus_addr: u32, len: usize);
}

impl<D: DmaAllocator> DmaAllocator for &mut D {
    type Error = D::Error;

    fn alloc(&mut self, len: usize) -> Result<DmaRegion, Self::Error> {
        (**self).alloc(len)
    }

    fn free(&mut self, region: DmaRegion) {
        (**self).free(region)
    }

    fn map(&mut self, region: &DmaRegion) -> Result<u32, Self::Error> {
        (**self).map(region)
    }

    fn unmap(&mut self, bus_addr: u32, len: usize) {
        (**self).unmap(bus_addr, len)
    }
}
