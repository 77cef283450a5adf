//! Translation of the device's two interrupt lines into state-machine
//! moves.
//!
//! The platform's interrupt glue delivers each line as a [`Signal`] to
//! [`Session::handle_signal`](crate::Session::handle_signal); the decision
//! of what a signal means in the current state lives in [`dispatch`], a
//! pure function so the bridge logic can be tested without any hardware or
//! even a session.

use crate::session::SessionState;

/// The two asynchronous inputs the device can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The firmware finished the buffer cycle; the ring is no longer being
    /// consumed.
    Completion,
    /// Shared line: configuration acknowledged, or generation wound down
    /// after a stop request.
    ConfigOrStop,
}

/// What [`dispatch`] decided a signal means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Benign; nothing to do.
    Ignore,
    /// Treat as session completion: unmap the ring, return to
    /// `Initialized`, wake stop-waiters.
    Complete,
    /// Unexpected in this state; force the session into `Error`.
    Fault,
}

/// Decide what `signal` means while the session is in `state`.
pub fn dispatch(signal: Signal, state: SessionState) -> Disposition {
    use SessionState::*;
    match (signal, state) {
        (Signal::Completion, Running | RequestStop) => Disposition::Complete,
        // A completion while nothing is supposed to be running means the
        // host and firmware disagree about the session.
        (Signal::Completion, _) => Disposition::Fault,

        // Before the session runs, this line only acknowledges
        // configuration.
        (Signal::ConfigOrStop, Disabled | Initialized | MemAllocated | Armed) => {
            Disposition::Ignore
        }
        (Signal::ConfigOrStop, Running | RequestStop) => Disposition::Complete,
        (Signal::ConfigOrStop, Error) => Disposition::Fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn completion_expected_only_while_running_or_stopping() {
        assert_eq!(dispatch(Signal::Completion, Running), Disposition::Complete);
        assert_eq!(
            dispatch(Signal::Completion, RequestStop),
            Disposition::Complete
        );
        for state in [Disabled, Initialized, MemAllocated, Armed, Error] {
            assert_eq!(dispatch(Signal::Completion, state), Disposition::Fault);
        }
    }

    #[test]
    fn config_line_is_benign_before_running() {
        for state in [Disabled, Initialized, MemAllocated, Armed] {
            assert_eq!(dispatch(Signal::ConfigOrStop, state), Disposition::Ignore);
        }
    }

    #[test]
    fn config_line_completes_a_running_session() {
        assert_eq!(
            dispatch(Signal::ConfigOrStop, Running),
            Disposition::Complete
        );
        assert_eq!(
            dispatch(Signal::ConfigOrStop, RequestStop),
            Disposition::Complete
        );
    }

    #[test]
    fn config_line_in_error_state_stays_faulted() {
        assert_eq!(dispatch(Signal::ConfigOrStop, Error), Disposition::Fault);
    }
}
