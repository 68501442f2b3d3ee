//! Tick orchestrator.
//!
//! One call to [`Machine::tick`] advances the machine by one half-cycle,
//! running the update domains in a fixed order: snapshot and decode, clock
//! toggle, register write gate, phase latches, registers on the edge, the
//! RAM access belonging to that edge, the read-ahead for the next tick,
//! instruction latches on the idle half, output-port drive, and finally
//! the bus cursor. Every consumer of "previous" state reads the snapshots
//! taken in step one, which is what makes the in-place updates safe.
//!
//! The ordering quirks worth knowing:
//!
//! - The edge's RAM access is addressed with the registers and phase flags
//!   from *before* the edge, so a store initiated by the completed edge
//!   lands where that edge saw the machine.
//! - The read-ahead re-decodes IR0 against possibly fresh flags, resolves
//!   the bus purely (no store, no latch movement) and fetches the word the
//!   *next* tick will consume.
//! - The output port is driven from the pre-latch decode, so an OUT keeps
//!   its port refreshed on both halves of its cycle.

use crate::alu;
use crate::control::{self, ALU_ENABLE};
use crate::events::{Port, SimEvent};
use crate::phase::{PhaseFlags, PhaseInputs};
use crate::registers::{EdgeInputs, IdleInputs, Register};
use crate::Machine;

/// Frame pacing: a frame runs `frequency * TICKS_PER_FREQUENCY_UNIT` ticks.
const TICKS_PER_FREQUENCY_UNIT: u64 = 10;

impl Machine {
    /// Advance the machine by one half-cycle.
    pub fn tick(&mut self) {
        // 1. Snapshot the state every later step treats as "previous", and
        //    evaluate the combinational domain against it.
        let was = self.phase;
        let old_regs = self.regs.clone();
        let prev = control::decode(old_regs.ir0, old_regs.flags);
        let old_ra = old_regs.gp[control::src_ra(old_regs.ir0)];
        let old_rb = old_regs.gp[control::src_rb(old_regs.ir0)];
        let alu_enabled = prev.alu_data & ALU_ENABLE != 0;
        let alu_out = alu::compute(old_ra, old_rb, prev.alu_data & 0xF, alu_enabled);

        // 2. Toggle the clock. HLT freezes the distributed signal while the
        //    raw level keeps flipping.
        let level = self.clock.toggle();
        self.events.push(SimEvent::ClockLevel { high: level });
        let clk = self.clock.signal(prev.hlt);

        // 3. The general-purpose write gate: a write-back instruction only
        //    commits once its value source is live.
        let gp_write_gate = prev.reg_write
            && (was.is_curr_ext || alu_enabled || was.reg_is_curr_addr || prev.use_in);

        // 4. Advance the phase latches.
        self.phase.update(PhaseInputs::derive(&prev, &was), clk);
        let now = self.phase;
        if now != was {
            self.events.push(SimEvent::PhaseFlags { flags: now });
        }

        // 5. Registers move on the edge.
        self.regs.on_clock_edge(
            EdgeInputs {
                clock_signal: clk,
                signals: &prev,
                was: &was,
                now: &now,
                gp_write_gate,
                dst: control::dst_r(old_regs.ir0),
                alu: alu_out,
                ram_value: self.old_ram_value,
                input_port_value: self.in_ports[prev.io_port],
                old_ir1: old_regs.ir1,
            },
            &mut self.events,
        );

        // 6. The RAM access belonging to the edge that just completed,
        //    addressed with the old registers and old phase.
        let mem_write = (was.is_curr_sp_change && !prev.sp_pop)
            || (prev.mem_write && (was.is_curr_ext || was.reg_is_curr_addr));
        self.bus.update_latch(&prev, &was, clk, mem_write);
        let access = self
            .bus
            .resolve(&prev, &old_regs, &was, clk, mem_write, old_rb, old_ra);
        if access.write_to_ram {
            self.ram
                .write(access.address, access.data, access.ram_clock, &mut self.events);
        }

        // 7. Re-decode against the just-updated registers and resolve the
        //    read-ahead the next tick will consume.
        let new = control::decode(self.regs.ir0, self.regs.flags);
        let new_ra = self.regs.gp[control::src_ra(self.regs.ir0)];
        let new_rb = self.regs.gp[control::src_rb(self.regs.ir0)];
        let read = self
            .bus
            .resolve(&new, &self.regs, &now, clk, false, new_rb, new_ra);
        let new_ram_value = self.ram.read(read.address);

        // 8. Instruction registers latch on the idle half, seeing the new
        //    phase and the fresh read-ahead.
        self.regs.on_idle(
            IdleInputs {
                clock_signal: clk,
                now: &now,
                ram_value: new_ram_value,
            },
            &mut self.events,
        );

        // 9. Output-port drive, from the pre-latch decode.
        if new.use_out && self.out_ports[new.io_port] != new_ra {
            self.out_ports[new.io_port] = new_ra;
            self.events.push(SimEvent::PortOut {
                port: Port::ALL[new.io_port],
                value: new_ra,
            });
        }

        // 10. Remember the bus cursor and read-ahead word for the next tick.
        if read.address != self.old_ram_address {
            self.events.push(SimEvent::RamCursor {
                from: self.old_ram_address,
                to: read.address,
            });
        }
        self.old_ram_address = read.address;
        self.old_ram_value = new_ram_value;
        self.tick_count += 1;

        if self.debug {
            eprintln!(
                "[tick {}] clk={} ir0={:04X} ir1={:04X} pc={:04X} sp={:04X} flags={:X} \
                 ext={} addr={} stk={} jsr={} rts={} reg={} wlatch={} bus={:04X}",
                self.tick_count,
                clk as u8,
                self.regs.ir0,
                self.regs.ir1,
                self.regs.pc,
                self.regs.sp,
                self.regs.flags,
                now.is_curr_ext as u8,
                now.is_curr_addr() as u8,
                now.is_curr_sp_change as u8,
                now.is_curr_jsr as u8,
                now.is_curr_rts as u8,
                now.reg_is_curr_addr as u8,
                self.bus.write_latch() as u8,
                read.address,
            );
        }
    }

    /// Run one frame's worth of ticks. At frequency zero the machine is in
    /// manual single-step mode and a frame is exactly one tick.
    pub fn run_frame(&mut self) {
        let ticks = self.clock.frequency() as u64 * TICKS_PER_FREQUENCY_UNIT;
        if ticks == 0 {
            self.tick();
        } else {
            for _ in 0..ticks {
                self.tick();
            }
        }
    }

    /// Prime the fetch path so the first tick sees a coherent machine: IR0
    /// and the read-ahead slot take the word at address zero, SP starts at
    /// the top of memory, the bus cursor returns to zero and the I/O ports
    /// clear. RAM is left alone.
    pub fn init(&mut self) {
        let first = self.ram.read(0);
        self.regs.set(Register::Ir0, first, &mut self.events);
        self.regs.set(Register::Sp, 0xFFFF, &mut self.events);
        self.old_ram_value = first;
        if self.old_ram_address != 0 {
            self.events.push(SimEvent::RamCursor {
                from: self.old_ram_address,
                to: 0,
            });
        }
        self.old_ram_address = 0;
        self.in_ports = [0; 3];
        for port in Port::ALL {
            if self.out_ports[port.index()] != 0 {
                self.out_ports[port.index()] = 0;
                self.events.push(SimEvent::PortOut { port, value: 0 });
            }
        }
    }

    /// Return to power-on state. RAM contents survive a reset; everything
    /// sequential clears, observers get a fresh phase-flags notification,
    /// and [`Machine::init`] re-primes the fetch path.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.events.push(SimEvent::ClockLevel { high: false });
        self.phase = PhaseFlags::default();
        self.events.push(SimEvent::PhaseFlags { flags: self.phase });
        for reg in Register::ALL {
            self.regs.set(reg, 0, &mut self.events);
        }
        self.bus.reset();
        self.tick_count = 0;
        self.init();
    }
}
