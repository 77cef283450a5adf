//! Driver core for a PRU-based digital waveform generator.
//!
//! The generator streams user-supplied sample data out of a ring of
//! DMA-capable buffers into a coprocessor that bit-bangs the output pins.
//! This crate implements the host side of that arrangement: buffer-ring
//! allocation and mapping, the synchronous command mailbox shared with the
//! firmware, the session state machine, and the byte-stream write path that
//! fills the ring in order.
//!
//! The crate contains no platform bindings. Two small traits are the seams
//! to real hardware: [`interface::Interface`] gives access to the shared
//! mailbox window and the stop doorbell, and [`dma::DmaAllocator`] provides
//! DMA-capable memory and device-visible mappings. Fake implementations of
//! both ship with the crate so the whole driver can run hosted, in tests or
//! in the `prugen-cli` utility.
//!
//! A typical session:
//!
//! 1. [`Session::new`] probes the firmware (magic, version, table capacity).
//! 2. [`Session::set_total_size`] allocates and maps the buffer ring and
//!    pushes the configuration, arming the device.
//! 3. [`Session::start`] begins generation and hands back a [`StreamCursor`].
//! 4. [`Session::write`] streams sample bytes into the ring.
//! 5. [`Session::request_stop`] plus [`SessionStatus::wait_idle`] wind the
//!    session down cooperatively; the completion interrupt (delivered via
//!    [`Session::handle_signal`]) unmaps the ring and returns the state
//!    machine to idle.

#![no_std]

extern crate alloc;

pub mod dma;
pub mod error;
pub mod event;
pub mod interface;
pub mod mailbox;
pub mod mapper;
pub mod pool;
pub mod session;
pub mod stream;
pub mod waiter;

pub use error::Error;
pub use event::Signal;
pub use interface::Interface;
pub use session::{Session, SessionState, SessionStatus};
pub use stream::{StreamCursor, StreamWrite};

/// Transfer granularity of the hardware consumer, in bytes.
///
/// The coprocessor drains buffers in fixed bursts of this size, so every
/// buffer boundary must fall on a multiple of it; the final buffer of a pool
/// is padded up to the next multiple to keep the last burst inside owned
/// memory.
pub const BURST_ALIGN: usize = 64;

/// Default allocation unit for the buffer ring, in bytes.
///
/// Matches the value the reference firmware was tuned for; callers can
/// change it through [`Session::set_unit_size`] before sizing the pool.
pub const DEFAULT_UNIT_SIZE: usize = 640_000;
