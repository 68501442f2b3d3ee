//! Memory-interface arbitration.
//!
//! Four sources compete for the RAM address bus: the stack pointer, a
//! source-B register (indirect access), the RAM-address latch (extended
//! addressing) and the program counter. [`MemoryBus::resolve`] picks the
//! winner and derives the write line, the RAM clock polarity and the store
//! data for one half-cycle; it is pure, so the orchestrator can call it
//! again at the end of a tick for the read-ahead without side effects.
//!
//! The only state is the write-request latch. A store instruction raises
//! it one half-cycle before the store lands, which is what lets the data
//! and address settle first; it is updated exactly once per tick, on the
//! RAM-update step.

use serde::{Deserialize, Serialize};

use crate::control::ControlSignals;
use crate::phase::PhaseFlags;
use crate::registers::RegisterFile;

/// One resolved bus half-cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusAccess {
    pub address: u16,
    pub write_to_ram: bool,
    /// RAM stores only while this is asserted.
    pub ram_clock: bool,
    pub data: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBus {
    write_latch: bool,
}

impl MemoryBus {
    pub fn new() -> Self {
        MemoryBus::default()
    }

    pub fn reset(&mut self) {
        self.write_latch = false;
    }

    #[inline(always)]
    pub fn write_latch(&self) -> bool {
        self.write_latch
    }

    /// Advance the write-request latch for this tick. Moves only on the
    /// idle half: cleared when an extension fetch begins, otherwise
    /// set-toggled by a pending store or return-address push.
    pub fn update_latch(
        &mut self,
        signals: &ControlSignals,
        phase: &PhaseFlags,
        clock_signal: bool,
        mem_write: bool,
    ) {
        if clock_signal {
            return;
        }
        if signals.is_nxt_ext && !phase.is_curr_ext {
            self.write_latch = false;
        } else {
            self.write_latch = !self.write_latch && (mem_write || phase.is_curr_jsr);
        }
    }

    /// Arbitrate the RAM access for one half-cycle.
    ///
    /// Address priority: stack phase, then register-indirect, then the
    /// RAM-address latch while an extension address is live (never for
    /// branches, whose extension word goes to the PC instead), then the
    /// PC. During a stack phase the RAM clock is inverted so the slot
    /// transfer never races the SP update. A JSR stores the return
    /// address; everything else stores source A.
    pub fn resolve(
        &self,
        signals: &ControlSignals,
        regs: &RegisterFile,
        phase: &PhaseFlags,
        clock_signal: bool,
        mem_write: bool,
        src_b_value: u16,
        src_a_value: u16,
    ) -> BusAccess {
        let address = if phase.is_curr_sp_change {
            regs.sp
        } else if phase.reg_is_curr_addr {
            src_b_value
        } else if !phase.is_curr_jsr
            && phase.is_curr_addr()
            && phase.is_curr_ext
            && !signals.load_pc
        {
            regs.ram_address
        } else {
            regs.pc
        };

        let ram_clock = if phase.is_curr_sp_change {
            !clock_signal
        } else {
            clock_signal
        };

        let data = if phase.is_curr_jsr {
            regs.pc.wrapping_add(2)
        } else {
            src_a_value
        };

        BusAccess {
            address,
            write_to_ram: self.write_latch || (phase.reg_is_curr_addr && mem_write),
            ram_clock,
            data,
        }
    }
}
