//! The error taxonomy surfaced by [`Session`](crate::Session).

use crate::interface::Interface;
use crate::mailbox::MailboxError;

/// Errors from session-level operations.
///
/// The type is generic over the mailbox seam so that transport failures
/// carry the adapter's own error value through unchanged. DMA allocator
/// failures do not appear here: a region that cannot be allocated is folded
/// into [`Error::ResourceExhausted`] and one that cannot be mapped into
/// [`Error::MappingFailure`], which is all the control plane can usefully
/// say about either.
#[non_exhaustive]
pub enum Error<I: Interface> {
    /// The requested pool exceeds the firmware's table capacity, or an
    /// underlying region allocation failed. Never partially applied:
    /// nothing was left allocated. Recoverable by asking for less.
    ResourceExhausted,

    /// A buffer failed to become device-visible. Partial mappings have
    /// been rolled back and the session is now in the `Error` state.
    MappingFailure,

    /// The firmware did not acknowledge a command within the poll bound.
    /// The session keeps its prior state; the device should be re-probed.
    ProtocolTimeout,

    /// The operation is not valid in the session's current state. Rejected
    /// without side effects.
    InvalidState,

    /// A stream write was attempted while the session is faulted.
    IoFault,

    /// The firmware failed validation: bad mailbox magic, a zero version,
    /// an implausible table capacity, or a nonzero command status.
    Firmware,

    /// The mailbox interface failed.
    Interface(I::Error),
}

impl<I: Interface> Error<I> {
    pub(crate) fn from_mailbox(err: MailboxError<I::Error>) -> Self {
        match err {
            MailboxError::BadMagic(_) => Error::Firmware,
            MailboxError::Timeout => Error::ProtocolTimeout,
            MailboxError::Comm(e) => Error::Interface(e),
        }
    }
}

impl<I: Interface> core::fmt::Debug for Error<I>
where
    I::Error: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ResourceExhausted => f.write_str("ResourceExhausted"),
            Error::MappingFailure => f.write_str("MappingFailure"),
            Error::ProtocolTimeout => f.write_str("ProtocolTimeout"),
            Error::InvalidState => f.write_str("InvalidState"),
            Error::IoFault => f.write_str("IoFault"),
            Error::Firmware => f.write_str("Firmware"),
            Error::Interface(e) => f.debug_tuple("Interface").field(e).finish(),
        }
    }
}

impl<I: Interface> core::error::Error for Error<I> where I::Error: core::fmt::Debug {}

impl<I: Interface> core::fmt::Display for Error<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ResourceExhausted => f.write_str("buffer pool exceeds device resources"),
            Error::MappingFailure => f.write_str("device mapping of the buffer pool failed"),
            Error::ProtocolTimeout => f.write_str("firmware did not acknowledge the command"),
            Error::InvalidState => f.write_str("operation not valid in the current state"),
            Error::IoFault => f.write_str("session is faulted"),
            Error::Firmware => f.write_str("firmware failed validation"),
            Error::Interface(_) => f.write_str("mailbox interface error"),
        }
    }
}
