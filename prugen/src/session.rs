//! The session: the authoritative state machine for one configure → run →
//! stop cycle, and the control-plane operations that drive it.
//!
//! At most one session exists per device; the caller is expected to hold
//! the session exclusively (a mutex or equivalent around the [`Session`]
//! value) for the whole configure-to-stop span. The subset of state shared
//! with the signal context and with waiting threads (current state, last
//! error, current ring index) lives in [`SessionStatus`], all atomics, so
//! the interrupt glue can publish a transition and a parked thread can
//! observe it without contending for the session borrow:
//!
//! ```text
//! control thread                      signal context
//! --------------                      --------------
//! session.request_stop()?;
//! let status = session.status().clone();
//! /* release the session lock */
//!                                     session.handle_signal(Completion);
//! status.wait_idle(&mut waiter)?;
//! ```

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, error, info};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::dma::DmaAllocator;
use crate::error::Error;
use crate::event::{self, Disposition, Signal};
use crate::interface::Interface;
use crate::mailbox::{self, Command, Mailbox};
use crate::mapper::{self, MapAllError};
use crate::pool::{align_up, Buffer, BufferPool};
use crate::stream::{self, StreamCursor, StreamWrite};
use crate::waiter::Waiter;
use crate::{BURST_ALIGN, DEFAULT_UNIT_SIZE};

/// States of the session state machine.
///
/// `Error` is terminal until the caller re-runs the allocate/map cycle;
/// the machine never self-heals out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum SessionState {
    /// Powered off; only seen before probe and after teardown.
    Disabled = 0,
    /// Probed and idle; no buffers allocated or session complete.
    Initialized = 1,
    /// Buffer ring allocated but not device-visible.
    MemAllocated = 2,
    /// Ring mapped and configuration accepted; ready to start.
    Armed = 3,
    /// Generation in progress.
    Running = 4,
    /// Stop requested; waiting for the firmware to finish the cycle.
    RequestStop = 5,
    /// Faulted; requires a fresh allocate/map cycle.
    Error = 6,
}

/// No error recorded.
pub const ERR_NONE: u32 = 0;
/// A buffer could not be made device-visible.
pub const ERR_MAPPING: u32 = 1;
/// A completion-class signal arrived in a state where none was expected.
pub const ERR_UNEXPECTED_SIGNAL: u32 = 2;

/// The asynchronously shared slice of session state.
///
/// Everything here is atomic: the signal context stores with `Release` and
/// observers load with `Acquire`, so a transition published by the
/// interrupt glue happens-before anything a woken waiter reads.
pub struct SessionStatus {
    state: AtomicU32,
    last_error: AtomicU32,
    current_buffer: AtomicU32,
}

impl SessionStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU32::new(SessionState::Disabled.into()),
            last_error: AtomicU32::new(ERR_NONE),
            current_buffer: AtomicU32::new(0),
        }
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        SessionState::try_from(self.state.load(Ordering::Acquire))
            .unwrap_or(SessionState::Error)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.into(), Ordering::Release);
    }

    /// The most recent error code; [`ERR_NONE`] if the last start is still
    /// clean.
    pub fn last_error(&self) -> u32 {
        self.last_error.load(Ordering::Acquire)
    }

    pub(crate) fn set_last_error(&self, code: u32) {
        self.last_error.store(code, Ordering::Release);
    }

    pub(crate) fn note_buffer_entered(&self, index: u32) {
        self.current_buffer.store(index, Ordering::Release);
    }

    /// The control-channel state read: the ring index most recently entered
    /// by the write cursor while `Running`, and the negated state code in
    /// any other state.
    pub fn debug_code(&self) -> i32 {
        match self.state() {
            SessionState::Running => self.current_buffer.load(Ordering::Acquire) as i32,
            other => -(u32::from(other) as i32),
        }
    }

    /// Park through `waiter` for as long as `pred` holds for the observed
    /// state; returns the first state that breaks it.
    pub fn wait_while<W: Waiter>(
        &self,
        waiter: &mut W,
        pred: impl Fn(SessionState) -> bool,
    ) -> Result<SessionState, W::Error> {
        loop {
            let state = self.state();
            if !pred(state) {
                return Ok(state);
            }
            waiter.wait()?;
        }
    }

    /// Block until the session is no longer running or winding down.
    ///
    /// This is the second half of a cooperative stop (see the module docs);
    /// it also returns if the session faults, so a waiter is never left
    /// parked on a session that can no longer complete.
    pub fn wait_idle<W: Waiter>(&self, waiter: &mut W) -> Result<SessionState, W::Error> {
        self.wait_while(waiter, |s| {
            matches!(s, SessionState::Running | SessionState::RequestStop)
        })
    }

    /// Block until a `Running` session has left that state, then report the
    /// last error code.
    pub fn last_error_blocking<W: Waiter>(&self, waiter: &mut W) -> Result<u32, W::Error> {
        self.wait_while(waiter, |s| s == SessionState::Running)?;
        Ok(self.last_error())
    }
}

/// One waveform-generation session against a probed device.
pub struct Session<D: DmaAllocator, I: Interface> {
    dma: D,
    mailbox: Mailbox<I>,
    pool: Option<BufferPool>,
    status: Arc<SessionStatus>,
    version: (u8, u8),
    max_entries: u32,
    unit_size: usize,
}

impl<D: DmaAllocator, I: Interface> Session<D, I> {
    /// Probe the firmware and build the session.
    ///
    /// Validates the mailbox magic, queries the firmware version (a zero
    /// response means the dispatch loop is not actually running) and the
    /// address-table capacity (sanity-checked to the plausible 1..256
    /// window), and applies the default allocation unit. A successful
    /// probe leaves the session `Initialized`.
    pub fn new(dma: D, interface: I) -> Result<Self, Error<I>> {
        let mut mailbox = Mailbox::new(interface);
        mailbox.verify_magic().map_err(Error::from_mailbox)?;

        let resp = mailbox.send(Command::GetVersion).map_err(Error::from_mailbox)?;
        if resp == 0 {
            error!("firmware answered the version query with 0");
            return Err(Error::Firmware);
        }
        let version = mailbox::split_version(resp);

        let max_entries = mailbox
            .send(Command::GetMaxEntries)
            .map_err(Error::from_mailbox)?;
        if !(1..256).contains(&max_entries) {
            error!("implausible table capacity {}", max_entries);
            return Err(Error::Firmware);
        }

        info!(
            "firmware {}.{} with up to {} table entries",
            version.0, version.1, max_entries
        );

        let status = Arc::new(SessionStatus::new());
        status.set_state(SessionState::Initialized);
        Ok(Self {
            dma,
            mailbox,
            pool: None,
            status,
            version,
            max_entries,
            unit_size: DEFAULT_UNIT_SIZE,
        })
    }

    /// Firmware version as (major, minor).
    pub fn firmware_version(&self) -> (u8, u8) {
        self.version
    }

    /// Address-table capacity advertised by the firmware.
    pub fn max_table_entries(&self) -> u32 {
        self.max_entries
    }

    /// Current state of the state machine.
    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// The shared status handle; clone it before parking on a wait so the
    /// signal context can take the session in the meantime.
    pub fn status(&self) -> &Arc<SessionStatus> {
        &self.status
    }

    /// The configured allocation unit in bytes.
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Change the allocation unit. Minimum 64 bytes, silently rounded up
    /// to a multiple of 64; any existing pool is freed, since its layout no
    /// longer matches.
    pub fn set_unit_size(&mut self, size: usize) -> Result<(), Error<I>> {
        if self.is_active() {
            return Err(Error::InvalidState);
        }
        if size < BURST_ALIGN {
            return Err(Error::InvalidState);
        }
        self.unit_size = align_up(size, BURST_ALIGN);
        self.release_pool();
        Ok(())
    }

    /// Total bytes currently allocated for the ring, padding included.
    pub fn total_size(&self) -> usize {
        self.pool.as_ref().map(BufferPool::total_size).unwrap_or(0)
    }

    /// Size the buffer ring for `total_size` bytes and arm the device.
    ///
    /// Any previous ring is freed first (resize is always
    /// free-then-reallocate), then the new ring is allocated, mapped, the
    /// address table published and the configuration pushed; on success the
    /// session is `Armed`. A request that exceeds the firmware's table
    /// capacity fails up front with nothing touched. This is also the only
    /// way back out of the `Error` state.
    pub fn set_total_size(&mut self, total_size: usize) -> Result<(), Error<I>> {
        if self.is_active() || self.status.state() == SessionState::Disabled {
            return Err(Error::InvalidState);
        }

        // Capacity check before the existing pool is disturbed.
        let count = total_size.div_ceil(self.unit_size);
        if count == 0 || count > self.max_entries as usize {
            debug!(
                "refusing pool of {} buffers against capacity {}",
                count, self.max_entries
            );
            return Err(Error::ResourceExhausted);
        }

        self.release_pool();
        self.status.set_state(SessionState::Initialized);

        let pool = BufferPool::allocate(
            &mut self.dma,
            total_size,
            self.unit_size,
            self.max_entries as usize,
        )
        .map_err(|_| Error::ResourceExhausted)?;
        self.pool = Some(pool);
        self.status.set_state(SessionState::MemAllocated);

        self.arm()
    }

    /// Map the ring, publish the address table and push the configuration.
    fn arm(&mut self) -> Result<(), Error<I>> {
        let pool = match self.pool.as_mut() {
            Some(pool) => pool,
            None => return Err(Error::InvalidState),
        };
        match mapper::map_all(&mut self.dma, &mut self.mailbox, pool, self.max_entries) {
            Ok(()) => {}
            Err(MapAllError::Mapping { index }) => {
                error!("arming failed: buffer {} would not map", index);
                self.status.set_last_error(ERR_MAPPING);
                self.status.set_state(SessionState::Error);
                return Err(Error::MappingFailure);
            }
            Err(MapAllError::Comm(e)) => {
                self.status.set_last_error(ERR_MAPPING);
                self.status.set_state(SessionState::Error);
                return Err(Error::Interface(e));
            }
        }

        // A configuration failure here leaves the session mapped but not
        // armed; the caller can retry or re-probe.
        self.push_config()?;
        self.status.set_state(SessionState::Armed);
        Ok(())
    }

    fn push_config(&mut self) -> Result<(), Error<I>> {
        let resp = self
            .mailbox
            .send(Command::PushConfig)
            .map_err(Error::from_mailbox)?;
        if resp != 0 {
            error!("firmware rejected configuration with status {}", resp);
            return Err(Error::Firmware);
        }
        Ok(())
    }

    /// Start generation.
    ///
    /// Only valid while `Armed`; in particular, a session that is already
    /// `Running` rejects a second start with
    /// [`InvalidState`](Error::InvalidState). Returns a cursor bound to
    /// the start of the ring.
    pub fn start(&mut self) -> Result<StreamCursor, Error<I>> {
        if self.status.state() != SessionState::Armed {
            return Err(Error::InvalidState);
        }

        self.push_config()?;
        let resp = self.mailbox.send(Command::Start).map_err(Error::from_mailbox)?;
        if resp != 0 {
            error!("firmware rejected start with status {}", resp);
            return Err(Error::Firmware);
        }

        self.status.set_last_error(ERR_NONE);
        self.status.note_buffer_entered(0);
        self.status.set_state(SessionState::Running);
        info!("waveform generation started");

        let pool = match self.pool.as_ref() {
            Some(pool) => pool,
            None => return Err(Error::InvalidState),
        };
        Ok(StreamCursor::at_ring_start(pool))
    }

    /// Stream sample bytes into the ring at the cursor's position.
    ///
    /// Consumes at most up to the current buffer boundary; callers loop on
    /// [`StreamWrite::Written`] until their span is gone. Fails with
    /// [`IoFault`](Error::IoFault) once the session is in the `Error`
    /// state, and with [`InvalidState`](Error::InvalidState) when the
    /// cursor belongs to a ring that has since been reallocated.
    pub fn write(
        &mut self,
        cursor: &mut StreamCursor,
        bytes: &[u8],
    ) -> Result<StreamWrite, Error<I>> {
        if self.status.state() == SessionState::Error {
            return Err(Error::IoFault);
        }
        let pool = match self.pool.as_mut() {
            Some(pool) => pool,
            None => return Err(Error::InvalidState),
        };
        if !cursor.describes(pool) {
            return Err(Error::InvalidState);
        }
        Ok(stream::write(cursor, pool, &self.status, bytes))
    }

    /// Ask the firmware to stop at the end of the current buffer cycle.
    ///
    /// A no-op unless the session is `Running`. This only files the
    /// request; completion arrives later as a [`Signal`] and the caller
    /// waits it out through [`SessionStatus::wait_idle`].
    pub fn request_stop(&mut self) -> Result<(), Error<I>> {
        if self.status.state() != SessionState::Running {
            return Ok(());
        }
        self.mailbox.request_stop().map_err(Error::from_mailbox)?;
        self.status.set_state(SessionState::RequestStop);
        debug!("stop requested");
        Ok(())
    }

    /// Deliver one of the device's interrupt lines.
    ///
    /// Called by the platform's interrupt glue. A completion unmaps the
    /// ring, returns the machine to `Initialized` and thereby wakes
    /// whoever is parked in [`SessionStatus::wait_idle`]; an unexpected
    /// signal forces `Error`.
    pub fn handle_signal(&mut self, signal: Signal) {
        let state = self.status.state();
        match event::dispatch(signal, state) {
            Disposition::Ignore => {
                debug!("signal {:?} ignored in state {:?}", signal, state);
            }
            Disposition::Complete => {
                if let Some(pool) = self.pool.as_mut() {
                    mapper::unmap_all(&mut self.dma, pool);
                }
                self.status.set_state(SessionState::Initialized);
                info!("generation session complete");
            }
            Disposition::Fault => {
                error!("unexpected signal {:?} in state {:?}", signal, state);
                self.status.set_last_error(ERR_UNEXPECTED_SIGNAL);
                self.status.set_state(SessionState::Error);
            }
        }
    }

    /// Per-buffer view of the ring, for the administrative enumeration.
    pub fn buffers(&self) -> &[Buffer] {
        self.pool.as_ref().map(BufferPool::buffers).unwrap_or(&[])
    }

    fn is_active(&self) -> bool {
        matches!(
            self.status.state(),
            SessionState::Running | SessionState::RequestStop
        )
    }

    /// Free the ring if one exists. Freeing an absent pool is a no-op.
    fn release_pool(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.free(&mut self.dma);
            if matches!(
                self.status.state(),
                SessionState::MemAllocated | SessionState::Armed
            ) {
                self.status.set_state(SessionState::Initialized);
            }
        }
    }
}

impl<D: DmaAllocator, I: Interface> Drop for Session<D, I> {
    fn drop(&mut self) {
        self.release_pool();
        self.status.set_state(SessionState::Disabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::fake as fake_dma;
    use crate::interface::fake::Firmware;
    use crate::pool::BufferState;

    fn session(fw: Firmware) -> Session<fake_dma::Allocator, Firmware> {
        Session::new(fake_dma::Allocator::new(), fw).unwrap()
    }

    #[test]
    fn probe_reads_version_and_capacity() {
        let s = session(Firmware::new());
        assert_eq!(s.firmware_version(), (0, 1));
        assert_eq!(s.max_table_entries(), 128);
        assert_eq!(s.state(), SessionState::Initialized);
        assert_eq!(s.unit_size(), DEFAULT_UNIT_SIZE);
    }

    #[test]
    fn probe_rejects_bad_magic() {
        let r = Session::new(fake_dma::Allocator::new(), Firmware::new().with_bad_magic());
        assert!(matches!(r, Err(Error::Firmware)));
    }

    #[test]
    fn probe_rejects_silly_capacity() {
        let r = Session::new(
            fake_dma::Allocator::new(),
            Firmware::new().with_max_entries(4096),
        );
        assert!(matches!(r, Err(Error::Firmware)));
    }

    #[test]
    fn probe_times_out_on_dead_firmware() {
        let r = Session::new(fake_dma::Allocator::new(), Firmware::new().unresponsive());
        assert!(matches!(r, Err(Error::ProtocolTimeout)));
    }

    #[test]
    fn sizing_allocates_maps_and_arms() {
        let mut s = session(Firmware::new());
        s.set_unit_size(100 * 64).unwrap();
        s.set_total_size(150 * 64).unwrap();
        assert_eq!(s.state(), SessionState::Armed);
        assert_eq!(s.buffers().len(), 2);
        for buf in s.buffers() {
            assert_eq!(buf.state(), BufferState::Mapped);
        }
        assert_eq!(s.total_size(), 150 * 64);
    }

    #[test]
    fn unit_size_is_rounded_and_bounded() {
        let mut s = session(Firmware::new());
        assert!(matches!(s.set_unit_size(63), Err(Error::InvalidState)));
        s.set_unit_size(65).unwrap();
        assert_eq!(s.unit_size(), 128);
    }

    #[test]
    fn changing_unit_size_frees_the_pool() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(256).unwrap();
        assert_eq!(s.state(), SessionState::Armed);
        s.set_unit_size(128).unwrap();
        assert!(s.buffers().is_empty());
        assert_eq!(s.state(), SessionState::Initialized);
        assert_eq!(s.total_size(), 0);
    }

    #[test]
    fn oversized_request_changes_nothing() {
        let mut s = session(Firmware::new().with_max_entries(4));
        s.set_unit_size(64).unwrap();
        s.set_total_size(4 * 64).unwrap();
        assert_eq!(s.state(), SessionState::Armed);

        let err = s.set_total_size(5 * 64).unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted));
        // The old ring is untouched.
        assert_eq!(s.state(), SessionState::Armed);
        assert_eq!(s.buffers().len(), 4);
    }

    #[test]
    fn mapping_failure_faults_the_session() {
        let fw = Firmware::new();
        let dma = fake_dma::Allocator::new().fail_maps_after(1);
        let mut s = Session::new(dma, fw).unwrap();
        s.set_unit_size(64).unwrap();

        let err = s.set_total_size(3 * 64).unwrap_err();
        assert!(matches!(err, Error::MappingFailure));
        assert_eq!(s.state(), SessionState::Error);
        assert_eq!(s.status().last_error(), ERR_MAPPING);
        for buf in s.buffers() {
            assert_ne!(buf.state(), BufferState::Mapped);
        }
    }

    #[test]
    fn config_timeout_leaves_prior_state() {
        // Budget covers the two probe queries only; the configuration push
        // then goes unanswered.
        let fw = Firmware::new().with_answer_budget(2);
        let mut s = Session::new(fake_dma::Allocator::new(), fw).unwrap();
        s.set_unit_size(64).unwrap();

        let err = s.set_total_size(2 * 64).unwrap_err();
        assert!(matches!(err, Error::ProtocolTimeout));
        assert_eq!(s.state(), SessionState::MemAllocated);
    }

    #[test]
    fn config_rejection_is_a_firmware_error() {
        let fw = Firmware::new().with_config_status(0xffff_ffff);
        let mut s = Session::new(fake_dma::Allocator::new(), fw).unwrap();
        s.set_unit_size(64).unwrap();
        let err = s.set_total_size(64).unwrap_err();
        assert!(matches!(err, Error::Firmware));
        assert_eq!(s.state(), SessionState::MemAllocated);
    }

    #[test]
    fn start_requires_an_armed_session() {
        let mut s = session(Firmware::new());
        assert!(matches!(s.start(), Err(Error::InvalidState)));
    }

    #[test]
    fn second_start_while_running_is_rejected() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(128).unwrap();
        let _cursor = s.start().unwrap();
        assert_eq!(s.state(), SessionState::Running);
        assert!(matches!(s.start(), Err(Error::InvalidState)));
    }

    #[test]
    fn stop_is_a_noop_unless_running() {
        let fw = Firmware::new();
        let mut s = session(fw);
        s.request_stop().unwrap();
        assert_eq!(s.state(), SessionState::Initialized);
    }

    #[test]
    fn stop_rings_the_doorbell_and_completion_wakes() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(128).unwrap();
        let _cursor = s.start().unwrap();

        s.request_stop().unwrap();
        assert_eq!(s.state(), SessionState::RequestStop);

        s.handle_signal(Signal::Completion);
        assert_eq!(s.state(), SessionState::Initialized);
        for buf in s.buffers() {
            assert_eq!(buf.state(), BufferState::Unmapped);
        }

        let mut w = crate::waiter::BoundedWaiter::new(8);
        assert_eq!(s.status().wait_idle(&mut w), Ok(SessionState::Initialized));
    }

    #[test]
    fn unexpected_completion_faults() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(128).unwrap();
        assert_eq!(s.state(), SessionState::Armed);

        s.handle_signal(Signal::Completion);
        assert_eq!(s.state(), SessionState::Error);
        assert_eq!(s.status().last_error(), ERR_UNEXPECTED_SIGNAL);

        // Faulted sessions reject stream writes...
        let mut cursor = StreamCursor::new();
        assert!(matches!(s.write(&mut cursor, &[0u8; 4]), Err(Error::IoFault)));
        // ...and only a fresh allocate/map cycle clears the fault.
        s.set_total_size(128).unwrap();
        assert_eq!(s.state(), SessionState::Armed);
    }

    #[test]
    fn config_ack_is_benign_before_running() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(128).unwrap();
        s.handle_signal(Signal::ConfigOrStop);
        assert_eq!(s.state(), SessionState::Armed);
    }

    #[test]
    fn debug_code_tracks_state_and_cursor() {
        let mut s = session(Firmware::new());
        assert_eq!(s.status().debug_code(), -1);
        s.set_unit_size(64).unwrap();
        s.set_total_size(128).unwrap();
        assert_eq!(s.status().debug_code(), -3);

        let mut cursor = s.start().unwrap();
        assert_eq!(s.status().debug_code(), 0);
        s.write(&mut cursor, &[0u8; 64]).unwrap();
        assert_eq!(s.status().debug_code(), 1);
    }

    #[test]
    fn last_error_read_blocks_out_the_running_state() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(128).unwrap();
        let _cursor = s.start().unwrap();

        // While running, a bounded wait expires rather than returning.
        let mut w = crate::waiter::BoundedWaiter::new(4);
        assert!(s.status().last_error_blocking(&mut w).is_err());

        s.handle_signal(Signal::Completion);
        let mut w = crate::waiter::BoundedWaiter::new(4);
        assert_eq!(s.status().last_error_blocking(&mut w), Ok(ERR_NONE));
    }

    #[test]
    fn end_to_end_150_byte_session() {
        // The worked example: 150 requested bytes at unit size 100 rounds
        // the unit to 128 and the tail to 64.
        let mut s = session(Firmware::new());
        s.set_unit_size(100).unwrap();
        assert_eq!(s.unit_size(), 128);
        s.set_total_size(150).unwrap();
        assert_eq!(s.buffers().len(), 2);
        assert_eq!(s.buffers()[0].len(), 128);
        assert_eq!(s.buffers()[1].len(), 64);

        let mut cursor = s.start().unwrap();
        let data = [0x55u8; 140];
        let mut sent = 0;
        while sent < data.len() {
            match s.write(&mut cursor, &data[sent..]).unwrap() {
                StreamWrite::Written(n) => sent += n,
                StreamWrite::EndOfSession => break,
            }
        }
        assert_eq!(sent, 140);
        assert_eq!(cursor.buffer_index(), Some(1));
        assert_eq!(cursor.offset(), 12);

        // Fill the remainder of the tail buffer; the cursor wraps.
        s.write(&mut cursor, &[0x55u8; 64]).unwrap();
        assert_eq!(cursor.buffer_index(), Some(0));

        s.handle_signal(Signal::Completion);
        assert_eq!(s.state(), SessionState::Initialized);
        assert_eq!(
            s.write(&mut cursor, &[0u8; 16]).unwrap(),
            StreamWrite::EndOfSession
        );
    }

    #[test]
    fn stale_cursor_after_resize_is_rejected() {
        let mut s = session(Firmware::new());
        s.set_unit_size(64).unwrap();
        s.set_total_size(3 * 64).unwrap();
        let mut cursor = s.start().unwrap();
        s.write(&mut cursor, &[0u8; 64]).unwrap();
        s.write(&mut cursor, &[0u8; 64]).unwrap();
        assert_eq!(cursor.buffer_index(), Some(2));

        s.handle_signal(Signal::Completion);
        s.set_total_size(64).unwrap();

        // The old cursor points past the end of the new, smaller ring.
        assert!(matches!(
            s.write(&mut cursor, &[0u8; 8]),
            Err(Error::InvalidState)
        ));
        // A fresh start hands out a cursor that fits.
        let mut cursor = s.start().unwrap();
        assert_eq!(
            s.write(&mut cursor, &[0u8; 8]).unwrap(),
            StreamWrite::Written(8)
        );
    }

    #[test]
    fn teardown_frees_the_ring() {
        let fw = Firmware::new();
        let mut s = Session::new(fake_dma::Allocator::new(), fw).unwrap();
        s.set_unit_size(64).unwrap();
        s.set_total_size(256).unwrap();
        let status = s.status().clone();
        drop(s);
        assert_eq!(status.state(), SessionState::Disabled);
    }
}
