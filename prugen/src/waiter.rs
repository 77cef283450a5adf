//! Helpers for blocking until the session leaves a given state.
//!
//! [`Waiter`] is the suspension primitive used by the blocking reads on
//! [`SessionStatus`](crate::SessionStatus): the stop path and the
//! last-error read both park the calling thread through one. The built-in
//! [`PollingWaiter`] simply busy-spins; hosts that can sleep on the
//! completion interrupt should implement a waiter that does so, and
//! real-time hosts that must not block forever can use [`BoundedWaiter`].

/// Parks the caller for one iteration of a state poll.
///
/// `wait` is invoked once per observation of a state that the caller is
/// still waiting out. Returning an error aborts the wait and surfaces to
/// the blocked caller.
pub trait Waiter {
    type Error;

    fn wait(&mut self) -> Result<(), Self::Error>;
}

/// Busy-polls with a spin hint and never gives up.
pub struct PollingWaiter;

impl Waiter for PollingWaiter {
    type Error = core::convert::Infallible;

    fn wait(&mut self) -> Result<(), Self::Error> {
        core::hint::spin_loop();
        Ok(())
    }
}

/// Error returned by [`BoundedWaiter`] when its iteration budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitExpired;

/// Busy-polls up to a fixed number of iterations.
pub struct BoundedWaiter {
    remaining: u32,
}

impl BoundedWaiter {
    pub fn new(iterations: u32) -> Self {
        Self {
            remaining: iterations,
        }
    }
}

impl Waiter for BoundedWaiter {
    type Error = WaitExpired;

    fn wait(&mut self) -> Result<(), WaitExpired> {
        if self.remaining == 0 {
            return Err(WaitExpired);
        }
        self.remaining -= 1;
        core::hint::spin_loop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_waiter_expires() {
        let mut w = BoundedWaiter::new(2);
        assert!(w.wait().is_ok());
        assert!(w.wait().is_ok());
        assert_eq!(w.wait(), Err(WaitExpired));
    }
}
