//! The ring of DMA buffers backing one generation session.
//!
//! Buffers live in a flat array and are ring-linked by index arithmetic:
//! the buffer after `i` is `(i + 1) % count`. Every buffer except the last
//! is exactly one allocation unit long; the last carries the remainder,
//! rounded up to the hardware burst size so the consumer's final burst
//! cannot run past owned memory.

use alloc::vec::Vec;

use log::{debug, info};

use crate::dma::{DmaAllocator, DmaRegion};
use crate::BURST_ALIGN;

/// Round `val` up to the next multiple of `align` (a power of two).
pub(crate) const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Mapping state of a single buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Backing memory exists but has never been device-mapped.
    Allocated,
    /// Mapped for outbound device access; `bus_addr` is valid.
    Mapped,
    /// Previously mapped, mapping torn down.
    Unmapped,
    /// Backing memory handed back to the allocator; terminal.
    Dropped,
}

/// One contiguous region in the ring.
#[derive(Debug)]
pub struct Buffer {
    region: DmaRegion,
    bus: u32,
    state: BufferState,
    index: u16,
}

impl Buffer {
    fn new(region: DmaRegion, index: u16) -> Self {
        Self {
            region,
            bus: 0,
            state: BufferState::Allocated,
            index,
        }
    }

    /// Size of this buffer in bytes.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Position of this buffer within the ring.
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Device address, valid only while the buffer is mapped.
    pub fn bus_addr(&self) -> Option<u32> {
        match self.state {
            BufferState::Mapped => Some(self.bus),
            _ => None,
        }
    }

    /// Map this buffer for outbound device access. Idempotent: an already
    /// mapped buffer is left untouched.
    pub(crate) fn map<D: DmaAllocator>(&mut self, dma: &mut D) -> Result<(), D::Error> {
        if self.state == BufferState::Mapped {
            return Ok(());
        }
        self.bus = dma.map(&self.region)?;
        self.state = BufferState::Mapped;
        Ok(())
    }

    /// Tear down the device mapping. A no-op unless currently mapped.
    pub(crate) fn unmap<D: DmaAllocator>(&mut self, dma: &mut D) {
        if self.state != BufferState::Mapped {
            return;
        }
        dma.unmap(self.bus, self.region.len());
        self.state = BufferState::Unmapped;
    }

    pub(crate) fn write_at(&mut self, offset: usize, src: &[u8]) {
        self.region.write_at(offset, src);
    }

    /// Read-only view of the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        self.region.as_slice()
    }
}

/// Why a pool could not be allocated. Either way nothing is left allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError<E> {
    /// The request needs more ring entries than the firmware supports, or
    /// none at all.
    Capacity { requested: usize, max: usize },
    /// An individual region allocation failed; everything allocated by this
    /// call has been released again.
    Region(E),
}

/// The ordered, ring-linked buffer set backing a session.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<Buffer>,
    unit_size: usize,
}

impl BufferPool {
    /// Allocate a pool covering `total_size` bytes in units of `unit_size`,
    /// bounded by the firmware-advertised `max_count` ring entries.
    ///
    /// The capacity check happens before any memory is touched. On a
    /// mid-way allocation failure every region already allocated by this
    /// call is released; partial pools are never left live.
    pub fn allocate<D: DmaAllocator>(
        dma: &mut D,
        total_size: usize,
        unit_size: usize,
        max_count: usize,
    ) -> Result<Self, PoolError<D::Error>> {
        debug_assert!(unit_size >= BURST_ALIGN && unit_size % BURST_ALIGN == 0);

        let count = total_size.div_ceil(unit_size);
        if count == 0 || count > max_count {
            return Err(PoolError::Capacity {
                requested: count,
                max: max_count,
            });
        }

        let mut buffers: Vec<Buffer> = Vec::with_capacity(count);
        for i in 0..count {
            let len = if i == count - 1 {
                // Remainder, padded to the burst size: the consumer moves
                // data in fixed 64-byte bursts and would otherwise read
                // past the buffer into adjacent memory.
                align_up(total_size - i * unit_size, BURST_ALIGN)
            } else {
                unit_size
            };
            match dma.alloc(len) {
                Ok(region) => buffers.push(Buffer::new(region, i as u16)),
                Err(e) => {
                    debug!("pool allocation failed at buffer {} of {}", i, count);
                    for buf in buffers.drain(..) {
                        dma.free(buf.region);
                    }
                    return Err(PoolError::Region(e));
                }
            }
        }

        let pool = Self {
            buffers,
            unit_size,
        };
        info!(
            "allocated {} buffers for {} bytes ({} of {} plus a final {})",
            count,
            total_size,
            count - 1,
            unit_size,
            pool.last_len(),
        );
        Ok(pool)
    }

    /// Release every buffer back to the allocator, unmapping first where
    /// needed.
    pub fn free<D: DmaAllocator>(mut self, dma: &mut D) {
        for mut buf in self.buffers.drain(..) {
            buf.unmap(dma);
            buf.state = BufferState::Dropped;
            dma.free(buf.region);
        }
    }

    /// Number of buffers in the ring.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// The configured allocation unit.
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Total bytes actually allocated, including final-buffer padding.
    pub fn total_size(&self) -> usize {
        (self.len() - 1) * self.unit_size + self.last_len()
    }

    fn last_len(&self) -> usize {
        self.buffers.last().map(Buffer::len).unwrap_or(0)
    }

    /// Ring successor of buffer `index`.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.buffers.len()
    }

    pub fn buffer(&self, index: usize) -> &Buffer {
        &self.buffers[index]
    }

    pub(crate) fn buffer_mut(&mut self, index: usize) -> &mut Buffer {
        &mut self.buffers[index]
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub(crate) fn buffers_mut(&mut self) -> &mut [Buffer] {
        &mut self.buffers
    }
}
