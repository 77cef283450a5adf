//! Device mapping of the buffer ring and publication of the address table.
//!
//! Mapping and unmapping never touch buffer lifetime; that stays with
//! [`BufferPool`](crate::pool::BufferPool).

use alloc::vec::Vec;

use log::error;

use crate::dma::DmaAllocator;
use crate::interface::Interface;
use crate::mailbox::Mailbox;
use crate::pool::BufferPool;

/// Why mapping the pool failed. In every case the mappings established by
/// the failing call have been rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAllError<E> {
    /// A buffer failed to become device-visible.
    Mapping { index: usize },
    /// The address table could not be written to the firmware.
    Comm(E),
}

/// Map every buffer in index order and publish the address table.
///
/// Buffers that are already mapped are left untouched. On the first mapping
/// failure, the buffers this call mapped are unmapped again and
/// [`MapAllError::Mapping`] is returned. On success the firmware's table
/// holds one (start, end) range per buffer, followed by a 0/0 terminator
/// when the table has room for one; the firmware bounds its own scan at its
/// advertised capacity either way.
pub fn map_all<D: DmaAllocator, I: Interface>(
    dma: &mut D,
    mailbox: &mut Mailbox<I>,
    pool: &mut BufferPool,
    max_entries: u32,
) -> Result<(), MapAllError<I::Error>> {
    let mut mapped_here: Vec<usize> = Vec::with_capacity(pool.len());
    for i in 0..pool.len() {
        let buf = pool.buffer_mut(i);
        let was_mapped = buf.bus_addr().is_some();
        if buf.map(dma).is_err() {
            error!("device mapping failed at buffer {}", i);
            for &j in &mapped_here {
                pool.buffer_mut(j).unmap(dma);
            }
            return Err(MapAllError::Mapping { index: i });
        }
        if !was_mapped {
            mapped_here.push(i);
        }
    }

    if let Err(e) = write_table(mailbox, pool, max_entries) {
        error!("address table write failed");
        unmap_all(dma, pool);
        return Err(MapAllError::Comm(e));
    }
    Ok(())
}

fn write_table<I: Interface>(
    mailbox: &mut Mailbox<I>,
    pool: &BufferPool,
    max_entries: u32,
) -> Result<(), I::Error> {
    for buf in pool.buffers() {
        // Every buffer is mapped at this point, so the address is present.
        let start = buf.bus_addr().unwrap_or(0);
        let end = start + buf.len() as u32;
        mailbox.write_table_entry(buf.index() as u32, start, end)?;
    }
    if (pool.len() as u32) < max_entries {
        mailbox.write_table_entry(pool.len() as u32, 0, 0)?;
    }
    Ok(())
}

/// Unmap every mapped buffer unconditionally. Used on normal completion and
/// on failure rollback alike; unmapping an unmapped buffer is a no-op.
pub fn unmap_all<D: DmaAllocator>(dma: &mut D, pool: &mut BufferPool) {
    for buf in pool.buffers_mut() {
        buf.unmap(dma);
    }
}
