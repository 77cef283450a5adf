//! The synchronous command mailbox shared with the firmware.
//!
//! The mailbox is a fixed layout at the start of the shared window: a magic
//! word, a command word (written by the host, cleared by the firmware once
//! handled), a response word (written by the firmware before it clears the
//! command), and the null-terminated buffer address table. Both sides write
//! disjoint fields under strict turn-taking; exactly one command is ever
//! outstanding, and the caller is expected to hold the session exclusively
//! for the duration of a send.

use log::{debug, trace};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::interface::Interface;

/// Sentinel identifying a valid firmware mailbox.
pub const MAGIC: u32 = 0xBEA6_1E10;

/// Byte offset of the magic word.
pub const OFF_MAGIC: u32 = 0x00;
/// Byte offset of the command word.
pub const OFF_CMD: u32 = 0x04;
/// Byte offset of the response word.
pub const OFF_RESP: u32 = 0x08;
/// Byte offset of the first address-table entry.
pub const OFF_TABLE: u32 = 0x0c;

/// Size of one (start, end) address-table entry in bytes.
pub const TABLE_ENTRY_BYTES: u32 = 8;

/// Table capacity declared by the reference firmware.
pub const REFERENCE_MAX_ENTRIES: u32 = 128;

/// Poll iterations `send` allows before declaring the firmware
/// unresponsive. An iteration bound rather than a wall-clock one; callers
/// on hard-real-time hosts should treat it as approximate.
pub const CMD_POLL_BOUND: u32 = 200;

/// Commands understood by the firmware's dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Command {
    /// Query the firmware version; the response packs the minor version in
    /// the low byte and the major version in the next byte.
    GetVersion = 1,
    /// Query the maximum number of address-table entries supported.
    GetMaxEntries = 2,
    /// Tell the firmware the address table is ready; the response is a
    /// status code.
    PushConfig = 3,
    /// Arm the generation loop; the response is a status code.
    Start = 4,
}

/// Errors from mailbox traffic, wrapping the interface's own error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError<E> {
    /// The magic word did not match [`MAGIC`]; wrong or absent firmware.
    BadMagic(u32),
    /// The firmware did not clear the command word within
    /// [`CMD_POLL_BOUND`] polls. Mailbox state is unspecified afterwards;
    /// the device should be treated as unresponsive.
    Timeout,
    /// The underlying interface failed.
    Comm(E),
}

impl<E> From<E> for MailboxError<E> {
    fn from(e: E) -> Self {
        MailboxError::Comm(e)
    }
}

/// Host endpoint of the mailbox protocol.
pub struct Mailbox<I: Interface> {
    raw: I,
}

impl<I: Interface> Mailbox<I> {
    pub fn new(raw: I) -> Self {
        Self { raw }
    }

    /// Check the magic word the firmware is expected to have planted.
    pub fn verify_magic(&mut self) -> Result<(), MailboxError<I::Error>> {
        let found = self.raw.read32(OFF_MAGIC)?;
        if found == MAGIC {
            Ok(())
        } else {
            Err(MailboxError::BadMagic(found))
        }
    }

    /// Send one command and busy-poll for its response.
    ///
    /// Writes the command word, then polls it until the firmware clears it
    /// to zero, bounded by [`CMD_POLL_BOUND`] iterations. The firmware
    /// publishes the response word before clearing the command, so on
    /// success the response read here is the answer to this command.
    pub fn send(&mut self, cmd: Command) -> Result<u32, MailboxError<I::Error>> {
        self.raw.write32(OFF_CMD, cmd.into())?;
        let mut polls = CMD_POLL_BOUND;
        while polls > 0 {
            if self.raw.read32(OFF_CMD)? == 0 {
                let resp = self.raw.read32(OFF_RESP)?;
                debug!("command {:?} answered with {:#x}", cmd, resp);
                return Ok(resp);
            }
            core::hint::spin_loop();
            polls -= 1;
        }
        debug!("command {:?} unanswered after {} polls", cmd, CMD_POLL_BOUND);
        Err(MailboxError::Timeout)
    }

    /// Write address-table entry `index` as a (start, end) device range.
    pub fn write_table_entry(&mut self, index: u32, start: u32, end: u32) -> Result<(), I::Error> {
        let base = OFF_TABLE + index * TABLE_ENTRY_BYTES;
        self.raw.write32(base, start)?;
        self.raw.write32(base + 4, end)?;
        trace!("table[{}] = {:#010x}..{:#010x}", index, start, end);
        Ok(())
    }

    /// Consume the mailbox, returning the underlying interface.
    pub fn into_inner(self) -> I {
        self.raw
    }

    /// Ring the host-to-device doorbell requesting a cooperative stop.
    pub fn request_stop(&mut self) -> Result<(), MailboxError<I::Error>> {
        self.raw.trigger_stop()?;
        Ok(())
    }
}

/// Split a `GetVersion` response into (major, minor).
pub fn split_version(resp: u32) -> (u8, u8) {
    ((resp >> 8) as u8, resp as u8)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::interface::fake::Firmware;

    #[test]
    fn magic_accepted_and_rejected() {
        let mut mb = Mailbox::new(Firmware::new());
        assert!(mb.verify_magic().is_ok());

        let mut mb = Mailbox::new(Firmware::new().with_bad_magic());
        assert_eq!(mb.verify_magic(), Err(MailboxError::BadMagic(0xDEAD_BEEF)));
    }

    #[test]
    fn version_and_capacity_queries() {
        let mut mb = Mailbox::new(Firmware::new());
        let resp = mb.send(Command::GetVersion).unwrap();
        assert_eq!(split_version(resp), (0, 1));
        assert_eq!(mb.send(Command::GetMaxEntries), Ok(REFERENCE_MAX_ENTRIES));
    }

    #[test]
    fn slow_firmware_still_answers_within_bound() {
        let mut mb = Mailbox::new(Firmware::new().with_latency(CMD_POLL_BOUND - 1));
        assert_eq!(mb.send(Command::PushConfig), Ok(0));
    }

    #[test]
    fn unresponsive_firmware_times_out() {
        let mut mb = Mailbox::new(Firmware::new().unresponsive());
        assert_eq!(mb.send(Command::GetVersion), Err(MailboxError::Timeout));
    }

    #[test]
    fn version_packing() {
        assert_eq!(split_version(0x0203), (2, 3));
        assert_eq!(split_version(0x0001), (0, 1));
    }
}
