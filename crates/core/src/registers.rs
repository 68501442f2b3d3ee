//! Register file with per-register clock domains.
//!
//! Every architectural register belongs to exactly one clock domain, and a
//! write outside that domain's active half is a no-op:
//!
//! | register    | domain |
//! |-------------|--------|
//! | R0–R7       | main clock, inverted while an address phase holds the bus |
//! | PC          | active halves, stalled by JSR/stack/indirect phases |
//! | SP          | idle half of a stack phase |
//! | FLAGS       | active halves, compare only |
//! | IR0         | idle halves, suppressed while the bus is held |
//! | IR1         | extension fetches |
//! | RAM address | every idle half, shadowing IR1 |
//!
//! [`RegisterFile::on_clock_edge`] and [`RegisterFile::on_idle`] are the two
//! entry points; both run every tick and gate the writes internally. Stored
//! values changing is what produces [`SimEvent::Register`] notifications.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::alu::AluOut;
use crate::control::{opcode, subopcode, ControlSignals};
use crate::events::SimEvent;
use crate::phase::PhaseFlags;

/// Architectural register names, used for events and by-name access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    Sp,
    Pc,
    Flags,
    Ir0,
    Ir1,
    RamAddress,
}

impl Register {
    /// General-purpose register for a 3-bit selector field.
    #[inline(always)]
    pub fn gp(index: usize) -> Register {
        use Register::*;
        [R0, R1, R2, R3, R4, R5, R6, R7][index & 7]
    }

    pub const ALL: [Register; 14] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::Sp,
        Register::Pc,
        Register::Flags,
        Register::Ir0,
        Register::Ir1,
        Register::RamAddress,
    ];

    fn name(self) -> &'static str {
        match self {
            Register::R0 => "R0",
            Register::R1 => "R1",
            Register::R2 => "R2",
            Register::R3 => "R3",
            Register::R4 => "R4",
            Register::R5 => "R5",
            Register::R6 => "R6",
            Register::R7 => "R7",
            Register::Sp => "SP",
            Register::Pc => "PC",
            Register::Flags => "FLAGS",
            Register::Ir0 => "IR0",
            Register::Ir1 => "IR1",
            Register::RamAddress => "RAM_ADDRESS",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .iter()
            .copied()
            .find(|reg| reg.name() == s)
            .ok_or_else(|| format!("unknown register name: {}", s))
    }
}

/// The architectural register state. All registers power up as zero; `SP`
/// gets its 0xFFFF start value from the machine's init, not from here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterFile {
    pub gp: [u16; 8],
    pub sp: u16,
    pub pc: u16,
    /// Four live bits; writes are masked to 0x0F.
    pub flags: u8,
    pub ir0: u16,
    pub ir1: u16,
    pub ram_address: u16,
}

/// Inputs for the clock-edge entry point, gathered by the orchestrator
/// before the phase tracker advanced (`was`) and after (`now`).
pub struct EdgeInputs<'a> {
    pub clock_signal: bool,
    pub signals: &'a ControlSignals,
    pub was: &'a PhaseFlags,
    pub now: &'a PhaseFlags,
    /// Orchestrator write gate for the general-purpose register.
    pub gp_write_gate: bool,
    /// Destination selector decoded from the instruction snapshot.
    pub dst: usize,
    pub alu: AluOut,
    /// Previous tick's RAM read-ahead.
    pub ram_value: u16,
    pub input_port_value: u16,
    /// IR1 snapshot taken before this tick started mutating registers.
    pub old_ir1: u16,
}

/// Inputs for the idle-domain entry point, using the phase flags and RAM
/// read-ahead of the current tick.
pub struct IdleInputs<'a> {
    pub clock_signal: bool,
    pub now: &'a PhaseFlags,
    pub ram_value: u16,
}

impl RegisterFile {
    /// Read a register's stored value. FLAGS widens to 16 bits.
    pub fn get(&self, reg: Register) -> u16 {
        match reg {
            Register::R0 => self.gp[0],
            Register::R1 => self.gp[1],
            Register::R2 => self.gp[2],
            Register::R3 => self.gp[3],
            Register::R4 => self.gp[4],
            Register::R5 => self.gp[5],
            Register::R6 => self.gp[6],
            Register::R7 => self.gp[7],
            Register::Sp => self.sp,
            Register::Pc => self.pc,
            Register::Flags => self.flags as u16,
            Register::Ir0 => self.ir0,
            Register::Ir1 => self.ir1,
            Register::RamAddress => self.ram_address,
        }
    }

    /// Store a register value, masking FLAGS to its four live bits, and
    /// emit a [`SimEvent::Register`] when the stored value changed.
    pub fn set(&mut self, reg: Register, value: u16, events: &mut Vec<SimEvent>) {
        let value = if reg == Register::Flags {
            value & 0x000F
        } else {
            value
        };
        if self.get(reg) == value {
            return;
        }
        match reg {
            Register::R0 => self.gp[0] = value,
            Register::R1 => self.gp[1] = value,
            Register::R2 => self.gp[2] = value,
            Register::R3 => self.gp[3] = value,
            Register::R4 => self.gp[4] = value,
            Register::R5 => self.gp[5] = value,
            Register::R6 => self.gp[6] = value,
            Register::R7 => self.gp[7] = value,
            Register::Sp => self.sp = value,
            Register::Pc => self.pc = value,
            Register::Flags => self.flags = value as u8,
            Register::Ir0 => self.ir0 = value,
            Register::Ir1 => self.ir1 = value,
            Register::RamAddress => self.ram_address = value,
        }
        events.push(SimEvent::Register { reg, value });
    }

    /// Edge-domain register update: GP write-back, PC, SP, FLAGS and the
    /// RAM-address latch.
    pub fn on_clock_edge(&mut self, inputs: EdgeInputs, events: &mut Vec<SimEvent>) {
        let clk = inputs.clock_signal;
        let signals = inputs.signals;
        let was = inputs.was;
        let now = inputs.now;

        // General-purpose write-back. The GP clock runs inverted while an
        // address phase holds the bus, so the write lands on the half
        // where its data source is stable.
        let gp_clock = if was.is_curr_addr() { !clk } else { clk };
        if !gp_clock && inputs.gp_write_gate {
            let value = if signals.use_in {
                inputs.input_port_value
            } else if was.is_curr_sp_change || was.reg_is_curr_addr {
                inputs.ram_value
            } else if was.is_curr_ext {
                inputs.old_ir1
            } else {
                inputs.alu.result
            };
            self.set(Register::gp(inputs.dst), value, events);
        }

        // Program counter. Stalls while a JSR or stack phase is active,
        // while a stack phase is about to start, and while source B
        // drives the address bus. The read-ahead peek mirrors the
        // circuit's early stall line for indirect stores.
        let sp_change_pending =
            signals.sp_change && !was.is_curr_ext && !was.is_curr_sp_change;
        let reg_addr_pending = !clk
            && opcode(inputs.ram_value) == 3
            && subopcode(inputs.ram_value) == 2
            && !was.reg_is_curr_addr;
        let pc_clock = clk
            && !now.is_curr_jsr
            && !now.is_curr_sp_change
            && !sp_change_pending
            && !reg_addr_pending
            && !was.reg_is_curr_addr;
        if pc_clock {
            let write_to_pc = (signals.load_pc
                && was.is_curr_ext
                && !was.is_curr_jsr
                && was.is_curr_addr())
                || signals.rts;
            let value = if !write_to_pc {
                self.pc.wrapping_add(1)
            } else if signals.rts {
                inputs.ram_value
            } else {
                inputs.old_ir1
            };
            self.set(Register::Pc, value, events);
        }

        // Stack pointer moves on the idle half of its phase.
        if was.is_curr_sp_change && !clk {
            let value = if signals.sp_pop {
                self.sp.wrapping_add(1)
            } else {
                self.sp.wrapping_sub(1)
            };
            self.set(Register::Sp, value, events);
        }

        // FLAGS latches the ALU status bits, compare only.
        if clk && signals.flags_write {
            let packed = inputs.alu.zero as u16
                | (inputs.alu.negative as u16) << 1
                | (inputs.alu.carry as u16) << 2
                | (inputs.alu.overflow as u16) << 3;
            self.set(Register::Flags, packed, events);
        }

        // The address latch shadows IR1 on every idle half.
        if !clk {
            let ir1 = self.ir1;
            self.set(Register::RamAddress, ir1, events);
        }
    }

    /// Idle-domain register update: the two instruction latches.
    ///
    /// IR0 takes the read-ahead word on idle halves, held off while an
    /// extension or register-indirect phase owns the bus and suppressed
    /// mid-stack-operation. IR1 takes it whenever an extension phase is
    /// live, which double-latches on extended loads (address first, then
    /// the addressed value).
    pub fn on_idle(&mut self, inputs: IdleInputs, events: &mut Vec<SimEvent>) {
        let now = inputs.now;
        let ir0_clock = inputs.clock_signal || now.is_curr_ext || now.reg_is_curr_addr;
        if !ir0_clock && !now.is_curr_sp_change {
            self.set(Register::Ir0, inputs.ram_value, events);
        }
        if now.is_curr_ext {
            self.set(Register::Ir1, inputs.ram_value, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::decode;

    fn edge<'a>(
        clock_signal: bool,
        signals: &'a ControlSignals,
        was: &'a PhaseFlags,
        now: &'a PhaseFlags,
    ) -> EdgeInputs<'a> {
        EdgeInputs {
            clock_signal,
            signals,
            was,
            now,
            gp_write_gate: false,
            dst: 0,
            alu: AluOut::default(),
            ram_value: 0,
            input_port_value: 0,
            old_ir1: 0,
        }
    }

    #[test]
    fn test_register_names_round_trip() {
        for reg in Register::ALL {
            let parsed: Register = reg.to_string().parse().unwrap();
            assert_eq!(parsed, reg);
        }
        assert!("R8".parse::<Register>().is_err());
        assert!("sp".parse::<Register>().is_err());
    }

    #[test]
    fn test_flags_masked_and_event_on_change_only() {
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();

        regs.set(Register::Flags, 0xFFFF, &mut events);
        assert_eq!(regs.flags, 0x0F);
        assert_eq!(
            events,
            vec![SimEvent::Register {
                reg: Register::Flags,
                value: 0x0F
            }]
        );

        // Same masked value again: no event.
        regs.set(Register::Flags, 0xFF0F, &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_gp_write_gate_and_data_mux() {
        // LDI R3 => 010 0000 011 000 000 = 0x40C0
        let signals = decode(0x40C0, 0);
        let was = PhaseFlags {
            is_curr_ext: true,
            ..PhaseFlags::default()
        };
        let now = was;
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();

        // Gate low: nothing happens even on the write half.
        regs.on_clock_edge(edge(false, &signals, &was, &now), &mut events);
        assert_eq!(regs.gp[3], 0);

        // Gate high on the idle half: the extension mux selects IR1.
        let mut inputs = edge(false, &signals, &was, &now);
        inputs.gp_write_gate = true;
        inputs.dst = 3;
        inputs.old_ir1 = 0x1234;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.gp[3], 0x1234);

        // Stack/indirect phases select the RAM read-ahead instead.
        let was = PhaseFlags {
            reg_is_curr_addr: true,
            ..PhaseFlags::default()
        };
        // LOAD R5, [R2] => 0x6742
        let signals = decode(0x6742, 0);
        let mut inputs = edge(false, &signals, &was, &was);
        inputs.gp_write_gate = true;
        inputs.dst = 5;
        inputs.ram_value = 0xBEEF;
        inputs.old_ir1 = 0x1111;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.gp[5], 0xBEEF);
    }

    #[test]
    fn test_gp_input_port_has_priority() {
        // IN R1, A => 0xE240
        let signals = decode(0xE240, 0);
        let was = PhaseFlags::default();
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();

        let mut inputs = edge(false, &signals, &was, &was);
        inputs.gp_write_gate = true;
        inputs.dst = 1;
        inputs.input_port_value = 0x00FF;
        inputs.ram_value = 0xDEAD;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.gp[1], 0x00FF);
    }

    #[test]
    fn test_pc_increments_only_on_active_edges() {
        // ADD R0, R0, R0 => 0x0000
        let signals = decode(0x0000, 0);
        let idle = PhaseFlags::default();
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();

        regs.on_clock_edge(edge(true, &signals, &idle, &idle), &mut events);
        assert_eq!(regs.pc, 1);
        regs.on_clock_edge(edge(false, &signals, &idle, &idle), &mut events);
        assert_eq!(regs.pc, 1);
        regs.on_clock_edge(edge(true, &signals, &idle, &idle), &mut events);
        assert_eq!(regs.pc, 2);
    }

    #[test]
    fn test_pc_stalls_for_stack_and_indirect_phases() {
        // PUSH R1 => 0xA008: the phase has not latched yet, but the
        // pending stack change already stalls the PC.
        let signals = decode(0xA008, 0);
        let idle = PhaseFlags::default();
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();
        regs.on_clock_edge(edge(true, &signals, &idle, &idle), &mut events);
        assert_eq!(regs.pc, 0);

        // Indirect access: the held phase stalls the PC on active edges.
        // STORE [R2], R1 => 0x640A
        let signals = decode(0x640A, 0);
        let held = PhaseFlags {
            reg_is_curr_addr: true,
            ..PhaseFlags::default()
        };
        regs.on_clock_edge(edge(true, &signals, &held, &held), &mut events);
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_pc_loads_branch_target_from_ir1() {
        // JMP => 0x8000, taken, with the extension and address phases in
        // flight from the previous ticks.
        let signals = decode(0x8000, 0);
        let was = PhaseFlags {
            is_curr_ext: true,
            is_curr_addr_base: true,
            ..PhaseFlags::default()
        };
        let now = PhaseFlags {
            is_curr_addr_jsr: true,
            ..PhaseFlags::default()
        };
        let mut regs = RegisterFile::default();
        regs.pc = 0x0010;
        let mut events = Vec::new();

        let mut inputs = edge(true, &signals, &was, &now);
        inputs.old_ir1 = 0x0300;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.pc, 0x0300);
    }

    #[test]
    fn test_pc_loads_return_address_from_ram_on_rts() {
        // RTS => 0x9800
        let signals = decode(0x9800, 0);
        let was = PhaseFlags {
            is_curr_ext: true,
            is_curr_sp_change: true,
            is_curr_rts: true,
            ..PhaseFlags::default()
        };
        let now = PhaseFlags {
            is_curr_rts: true,
            ..PhaseFlags::default()
        };
        let mut regs = RegisterFile::default();
        regs.pc = 0x0200;
        let mut events = Vec::new();

        let mut inputs = edge(true, &signals, &was, &now);
        inputs.ram_value = 0x0042;
        inputs.old_ir1 = 0x9999;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.pc, 0x0042, "rts takes the popped word, not IR1");
    }

    #[test]
    fn test_sp_moves_on_idle_half_of_stack_phase() {
        let push = decode(0xA008, 0);
        let pop = decode(0xA2C0, 0);
        let stack = PhaseFlags {
            is_curr_sp_change: true,
            ..PhaseFlags::default()
        };
        let mut regs = RegisterFile::default();
        regs.sp = 0xFFFF;
        let mut events = Vec::new();

        // Active half: no move.
        regs.on_clock_edge(edge(true, &push, &stack, &stack), &mut events);
        assert_eq!(regs.sp, 0xFFFF);

        regs.on_clock_edge(edge(false, &push, &stack, &stack), &mut events);
        assert_eq!(regs.sp, 0xFFFE);

        regs.on_clock_edge(edge(false, &pop, &stack, &stack), &mut events);
        assert_eq!(regs.sp, 0xFFFF);
    }

    #[test]
    fn test_flags_latch_only_under_compare() {
        // CMP R1, R2 => 0x340A
        let cmp = decode(0x340A, 0);
        let idle = PhaseFlags::default();
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();

        let alu = AluOut {
            result: 0,
            zero: true,
            negative: false,
            carry: true,
            overflow: false,
        };

        // Idle half: compare does not latch.
        let mut inputs = edge(false, &cmp, &idle, &idle);
        inputs.alu = alu;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.flags, 0);

        let mut inputs = edge(true, &cmp, &idle, &idle);
        inputs.alu = alu;
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.flags, 0b0101);

        // A plain ALU op never touches FLAGS.
        let add = decode(0x0081, 0);
        let mut inputs = edge(true, &add, &idle, &idle);
        inputs.alu = AluOut {
            zero: true,
            ..AluOut::default()
        };
        regs.on_clock_edge(inputs, &mut events);
        assert_eq!(regs.flags, 0b0101);
    }

    #[test]
    fn test_ram_address_shadows_ir1_on_idle_half() {
        let signals = decode(0x0000, 0);
        let idle = PhaseFlags::default();
        let mut regs = RegisterFile::default();
        regs.ir1 = 0x8123;
        let mut events = Vec::new();

        regs.on_clock_edge(edge(true, &signals, &idle, &idle), &mut events);
        assert_eq!(regs.ram_address, 0);

        regs.on_clock_edge(edge(false, &signals, &idle, &idle), &mut events);
        assert_eq!(regs.ram_address, 0x8123);
    }

    #[test]
    fn test_ir0_latch_gating() {
        let mut regs = RegisterFile::default();
        let mut events = Vec::new();

        // Plain idle half: IR0 takes the read-ahead.
        let now = PhaseFlags::default();
        regs.on_idle(
            IdleInputs {
                clock_signal: false,
                now: &now,
                ram_value: 0x4000,
            },
            &mut events,
        );
        assert_eq!(regs.ir0, 0x4000);

        // Active half: held.
        regs.on_idle(
            IdleInputs {
                clock_signal: true,
                now: &now,
                ram_value: 0x1111,
            },
            &mut events,
        );
        assert_eq!(regs.ir0, 0x4000);

        // Extension phase: held, and IR1 latches instead.
        let now = PhaseFlags {
            is_curr_ext: true,
            ..PhaseFlags::default()
        };
        regs.on_idle(
            IdleInputs {
                clock_signal: false,
                now: &now,
                ram_value: 0x2222,
            },
            &mut events,
        );
        assert_eq!(regs.ir0, 0x4000);
        assert_eq!(regs.ir1, 0x2222);

        // Stack phase suppresses IR0 on the idle half.
        let now = PhaseFlags {
            is_curr_sp_change: true,
            ..PhaseFlags::default()
        };
        regs.on_idle(
            IdleInputs {
                clock_signal: false,
                now: &now,
                ram_value: 0x3333,
            },
            &mut events,
        );
        assert_eq!(regs.ir0, 0x4000);
    }
}
