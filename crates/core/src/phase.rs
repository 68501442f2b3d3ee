//! Multi-cycle phase tracker.
//!
//! A handful of single-bit latches remember which stage of a multi-word or
//! multi-cycle instruction is in flight: extension-word fetch, address
//! phase, stack-pointer move, subroutine call/return, register-indirect
//! access. Together with the register file and RAM these latches are the
//! machine's entire state; the decoder and ALU are combinational.
//!
//! The latches do not consume the raw decoder outputs directly. Each input
//! is first masked by the phase that consumes it ([`PhaseInputs::derive`]),
//! which is what turns a level signal like `is_nxt_ext` into a one-shot
//! request and lets a two-word instruction span ticks without re-arming
//! itself.

use serde::{Deserialize, Serialize};

use crate::control::ControlSignals;

/// The phase latches. `is_curr_addr` is not stored; it is the OR of its
/// two components (see [`PhaseFlags::is_curr_addr`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFlags {
    /// The bus currently holds an extension word, not the next opcode.
    pub is_curr_ext: bool,
    /// Address phase reached through a plain extension address.
    pub is_curr_addr_base: bool,
    /// Address phase reached through a JSR.
    pub is_curr_addr_jsr: bool,
    /// A stack-pointer move is pending or in flight.
    pub is_curr_sp_change: bool,
    /// First cycle of a JSR (return-address push).
    pub is_curr_jsr: bool,
    /// An RTS is in flight.
    pub is_curr_rts: bool,
    /// Source B drives the address bus (register-indirect access).
    pub reg_is_curr_addr: bool,
}

impl PhaseFlags {
    /// The extension word on the bus is a memory address.
    #[inline(always)]
    pub fn is_curr_addr(&self) -> bool {
        self.is_curr_addr_base || self.is_curr_addr_jsr
    }

    /// Advance the latches for one half-cycle.
    ///
    /// The active half updates everything except `is_curr_addr_base`; the
    /// idle half updates only `is_curr_addr_base`. A latched JSR promotes
    /// itself to an extension fetch on the next active edge, which is why
    /// `is_curr_ext` reads the old `is_curr_jsr` before it is overwritten.
    pub fn update(&mut self, inputs: PhaseInputs, clock_signal: bool) {
        if clock_signal {
            let from_jsr = self.is_curr_jsr;
            self.is_curr_ext = from_jsr || inputs.ext;
            self.is_curr_addr_jsr = inputs.contains_address;
            self.is_curr_sp_change = inputs.sp_change;
            self.is_curr_jsr = inputs.jsr && !inputs.was_ext;
            self.is_curr_rts = inputs.rts;
            self.reg_is_curr_addr = inputs.reg_is_address;
        } else {
            self.is_curr_addr_base = inputs.contains_address && !inputs.jsr;
        }
    }
}

/// Decoder outputs masked by the phases that consume them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseInputs {
    pub ext: bool,
    pub jsr: bool,
    pub contains_address: bool,
    pub sp_change: bool,
    pub rts: bool,
    pub reg_is_address: bool,
    pub was_ext: bool,
}

impl PhaseInputs {
    /// Mask the raw decoder outputs against the previous phase state.
    pub fn derive(signals: &ControlSignals, prev: &PhaseFlags) -> Self {
        let jsr = signals.jsr && !prev.is_curr_jsr;
        PhaseInputs {
            ext: signals.is_nxt_ext && !prev.is_curr_ext,
            jsr,
            contains_address: jsr || (signals.contains_address && prev.is_curr_ext),
            sp_change: signals.sp_change && !prev.is_curr_sp_change && !prev.is_curr_ext,
            rts: signals.rts,
            reg_is_address: signals.reg_is_address && !prev.reg_is_curr_addr,
            was_ext: prev.is_curr_ext,
        }
    }
}
