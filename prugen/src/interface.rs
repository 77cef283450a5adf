//! The hardware seam between this crate and the shared memory window in
//! which the firmware mailbox lives.

pub mod fake;

/// Implementations of `Interface` adapt this library to a concrete way of
/// reaching the coprocessor's shared SRAM, where the command mailbox is
/// resident, plus the single host-to-device interrupt line.
///
/// The main library contains no real implementation of this trait, keeping
/// it portable: a Linux host would back it with an ioremapped PRU SRAM
/// window and an interrupt controller handle, a bare-metal host with raw
/// volatile accesses. The [`fake`] module provides a hosted implementation
/// that simulates the firmware side for tests and demos.
///
/// All offsets are byte offsets from the start of the mailbox window and
/// are always 4-byte aligned; the mailbox protocol is word-granular.
pub trait Interface {
    type Error;

    /// Read one little-endian word from the mailbox window.
    fn read32(&mut self, offset: u32) -> Result<u32, Self::Error>;

    /// Write one little-endian word into the mailbox window.
    fn write32(&mut self, offset: u32, value: u32) -> Result<(), Self::Error>;

    /// Raise the host-to-device interrupt line.
    ///
    /// The firmware interprets this as a request to stop generation at the
    /// end of the current buffer cycle; there is no immediate-abort line.
    fn trigger_stop(&mut self) -> Result<(), Self::Error>;
}

impl<I: Interface> Interface for &mut I {
    type Error = I::Error;

    fn read32(&mut self, offset: u32) -> Result<u32, Self::Error> {
        (**self).read32(offset)
    }

    fn write32(&mut self, offset: u32, value: u32) -> Result<(), Self::Error> {
        (**self).write32(offset, value)
    }

    fn trigger_stop(&mut self) -> Result<(), Self::Error> {
        (**self).trigger_stop()
    }
}
