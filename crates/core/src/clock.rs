//! Two-phase system clock.
//!
//! The clock is one toggling level. Every simulation tick flips it once, so
//! a full machine cycle spans two ticks: an active half with the level high
//! and an idle half with it low. What the sequential logic actually sees is
//! the level gated by the halt line, so a halted machine keeps toggling (and
//! reporting) its raw level while nothing downstream moves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Clock {
    level: bool,
    /// Run speed knob: cycles per frame unit. Zero selects manual
    /// single-step mode.
    frequency: u32,
}

impl Clock {
    pub fn new() -> Self {
        Clock::default()
    }

    /// Flip the level and return the new state.
    pub fn toggle(&mut self) -> bool {
        self.level = !self.level;
        self.level
    }

    /// The clock signal distributed to the latches: the raw level gated by
    /// the halt line.
    #[inline(always)]
    pub fn signal(&self, halt: bool) -> bool {
        self.level && !halt
    }

    #[inline(always)]
    pub fn level(&self) -> bool {
        self.level
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: u32) {
        self.frequency = frequency;
    }

    /// Drop the level back to idle. The frequency setting survives.
    pub fn reset(&mut self) {
        self.level = false;
    }
}
