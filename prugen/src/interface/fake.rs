//! Fake [`Interface`](super::Interface) implementation for testing and
//! examples.
//!
//! [`Firmware`] keeps the mailbox image in local RAM and plays the part of
//! the coprocessor's command loop: when the host polls the command word, the
//! pending command is executed after a configurable number of polls, the
//! response word is filled in and the command word cleared, in that order,
//! exactly as the real firmware does. It implements none of the actual
//! waveform timing; interrupt delivery stays in the caller's hands via
//! [`Session::handle_signal`](crate::Session::handle_signal).

use alloc::vec;
use alloc::vec::Vec;

use crate::mailbox::{self, Command};

/// Simulated firmware mailbox, usable anywhere an
/// [`Interface`](super::Interface) is expected.
pub struct Firmware {
    words: Vec<u32>,
    version: u32,
    max_entries: u32,
    config_status: u32,
    latency: u32,
    countdown: Option<u32>,
    responsive: bool,
    answer_budget: Option<u32>,
    started: u32,
    stop_requests: u32,
}

impl Firmware {
    /// A firmware image with valid magic, version 0.1 and the reference
    /// table capacity of 128 entries, answering commands on the first poll.
    pub fn new() -> Self {
        let max_entries = mailbox::REFERENCE_MAX_ENTRIES;
        let mut words = vec![0u32; 3 + 2 * max_entries as usize];
        words[0] = mailbox::MAGIC;
        Self {
            words,
            version: 0x0001, // minor 1, major 0
            max_entries,
            config_status: 0,
            latency: 0,
            countdown: None,
            responsive: true,
            answer_budget: None,
            started: 0,
            stop_requests: 0,
        }
    }

    /// Delay command completion by `polls` reads of the command word.
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Advertise a different maximum buffer-table capacity.
    pub fn with_max_entries(mut self, max: u32) -> Self {
        self.max_entries = max;
        self
    }

    /// Answer the push-configuration command with a nonzero status code.
    pub fn with_config_status(mut self, status: u32) -> Self {
        self.config_status = status;
        self
    }

    /// Corrupt the magic word, as if the wrong firmware were loaded.
    pub fn with_bad_magic(mut self) -> Self {
        self.words[0] = 0xDEAD_BEEF;
        self
    }

    /// Stop answering commands entirely; the command word never clears.
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    /// Answer only the next `n` commands, then go silent. Lets tests wedge
    /// the firmware at a chosen point mid-session.
    pub fn with_answer_budget(mut self, n: u32) -> Self {
        self.answer_budget = Some(n);
        self
    }

    /// The buffer-table entry at `index`, as (start, end) device addresses.
    pub fn table_entry(&self, index: usize) -> (u32, u32) {
        let base = 3 + 2 * index;
        (self.words[base], self.words[base + 1])
    }

    /// Number of start commands accepted so far.
    pub fn start_count(&self) -> u32 {
        self.started
    }

    /// Number of times the stop doorbell has been rung.
    pub fn stop_requests(&self) -> u32 {
        self.stop_requests
    }

    fn handle_command(&mut self, cmd: u32) -> u32 {
        match Command::try_from(cmd) {
            Ok(Command::GetVersion) => self.version,
            Ok(Command::GetMaxEntries) => self.max_entries,
            Ok(Command::PushConfig) => self.config_status,
            Ok(Command::Start) => {
                self.started += 1;
                0
            }
            // The real firmware answers unknown commands with -1.
            Err(_) => u32::MAX,
        }
    }

    fn poll_command(&mut self) {
        if !self.responsive || self.words[1] == 0 {
            return;
        }
        if self.answer_budget == Some(0) {
            return;
        }
        let remaining = self.countdown.unwrap_or(self.latency);
        if remaining > 0 {
            self.countdown = Some(remaining - 1);
            return;
        }
        if let Some(budget) = &mut self.answer_budget {
            *budget -= 1;
        }
        // Response is published before the command word clears, matching
        // the ordering the host relies on.
        let cmd = self.words[1];
        self.words[2] = self.handle_command(cmd);
        self.words[1] = 0;
        self.countdown = None;
    }
}

impl Default for Firmware {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Interface for Firmware {
    type Error = ();

    fn read32(&mut self, offset: u32) -> Result<u32, ()> {
        if offset == mailbox::OFF_CMD {
            self.poll_command();
        }
        let index = (offset / 4) as usize;
        self.words.get(index).copied().ok_or(())
    }

    fn write32(&mut self, offset: u32, value: u32) -> Result<(), ()> {
        let index = (offset / 4) as usize;
        match self.words.get_mut(index) {
            Some(w) => {
                *w = value;
                if offset == mailbox::OFF_CMD && value != 0 {
                    self.countdown = Some(self.latency);
                }
                Ok(())
            }
            None => Err(()),
        }
    }

    fn trigger_stop(&mut self) -> Result<(), ()> {
        self.stop_requests += 1;
        Ok(())
    }
}
