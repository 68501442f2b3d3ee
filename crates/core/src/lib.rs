//! # organ16-core
//!
//! Digital-logic simulation core for the Organ16, a 16-bit word-addressed
//! computer. The machine is not interpreted instruction by instruction:
//! every tick advances the synchronous logic by half a clock cycle, with
//! edge-triggered latches and combinational blocks re-evaluated in the
//! order the hardware settles. Multi-word instructions therefore take
//! their real multi-cycle timings, and in-flight state (a half-finished
//! call, a pending store) is visible between ticks just as on the bench.
//!
//! ## Architecture
//!
//! - [`Machine`] — Top-level machine wiring registers, RAM, clock and bus
//!   together, with an event queue in place of any rendering
//! - [`RegisterFile`] — Eight general-purpose registers plus SP, PC, FLAGS,
//!   the instruction pair IR0/IR1, and the RAM-address latch
//! - [`control`] — Combinational instruction decoder and branch-condition mux
//! - [`alu`] — Combinational 16-bit ALU with zero/negative/carry/overflow
//! - [`PhaseFlags`] — Single-bit latches tracking multi-cycle instruction phases
//! - [`MemoryBus`] — Memory-interface arbitration and the write-request latch
//! - [`Ram`] — 65536 words with a memory-mapped 128×128 RGB565 framebuffer
//! - [`Clock`] — Two-phase clock level and the run-speed knob
//! - [`image`] — Whitespace-separated hex text format for program images
//! - [`savestate`] — Compressed snapshots of the whole machine
//!
//! ## Driving it
//!
//! Call [`Machine::tick`] for a half-cycle or [`Machine::run_frame`] for a
//! frame's worth, then drain [`Machine::take_events`] to learn what changed:
//! register values, pixels, port latches, the clock level, phase flags, and
//! the moving RAM cursor. A machine with no listener runs the same either
//! way; the queue is the only coupling to the outside.

use std::path::Path;
use std::sync::{Arc, Mutex};

pub mod alu;
pub mod control;
pub mod phase;
pub mod registers;
pub mod bus;
pub mod memory;
pub mod clock;
pub mod events;
pub mod cpu;
pub mod image;
pub mod savestate;

pub use alu::AluOut;
pub use bus::{BusAccess, MemoryBus};
pub use clock::Clock;
pub use control::ControlSignals;
pub use events::{Port, SimEvent};
pub use memory::{Ram, FB_BASE, FB_END, RAM_WORDS, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use phase::PhaseFlags;
pub use registers::{Register, RegisterFile};

/// The whole Organ16: sequential state plus the event queue that stands in
/// for a frontend.
pub struct Machine {
    /// Architectural registers.
    pub regs: RegisterFile,
    pub ram: Ram,
    /// Multi-cycle phase latches.
    pub phase: PhaseFlags,
    /// Memory-interface write-request latch.
    bus: MemoryBus,
    pub clock: Clock,
    /// Input port words, written by the host and read by IN.
    in_ports: [u16; 3],
    /// Output port words, latched by OUT.
    out_ports: [u16; 3],
    /// Bus address of the previous tick, driving the RAM-cursor event.
    old_ram_address: u16,
    /// Read-ahead word fetched at the end of the previous tick.
    old_ram_value: u16,
    tick_count: u64,
    events: Vec<SimEvent>,
    /// Print per-tick pipeline state to stderr.
    pub debug: bool,
}

impl Machine {
    /// Create a machine with zeroed RAM, primed and ready to tick.
    pub fn new() -> Self {
        let mut m = Machine {
            regs: RegisterFile::default(),
            ram: Ram::new(),
            phase: PhaseFlags::default(),
            bus: MemoryBus::new(),
            clock: Clock::new(),
            in_ports: [0; 3],
            out_ports: [0; 3],
            old_ram_address: 0,
            old_ram_value: 0,
            tick_count: 0,
            events: Vec::new(),
            debug: false,
        };
        m.init();
        m
    }

    /// Drain the queued frontend events.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Half-cycles executed since power-on or reset.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// True while the current instruction is HLT. The clock level keeps
    /// toggling; nothing downstream of it moves.
    pub fn halted(&self) -> bool {
        control::decode(self.regs.ir0, self.regs.flags).hlt
    }

    pub fn frequency(&self) -> u32 {
        self.clock.frequency()
    }

    pub fn set_frequency(&mut self, frequency: u32) {
        self.clock.set_frequency(frequency);
    }

    /// Host side of an input port: replace the whole word.
    pub fn set_input_port(&mut self, port: Port, value: u16) {
        self.in_ports[port.index()] = value;
    }

    /// Host side of an input port: flip a single bit, like one panel
    /// switch.
    pub fn set_bit_input_port(&mut self, port: Port, bit: u8, on: bool) {
        let mask = 1u16 << (bit & 0xF);
        if on {
            self.in_ports[port.index()] |= mask;
        } else {
            self.in_ports[port.index()] &= !mask;
        }
    }

    pub fn input_port(&self, port: Port) -> u16 {
        self.in_ports[port.index()]
    }

    /// The value last latched onto an output port by OUT.
    pub fn output_port(&self, port: Port) -> u16 {
        self.out_ports[port.index()]
    }

    /// Read a named register, as a frontend register panel would.
    pub fn reg(&self, reg: Register) -> u16 {
        self.regs.get(reg)
    }

    /// Write a named register. Goes through the same path as the machine's
    /// own writes, so the change surfaces as a register event.
    pub fn set_reg(&mut self, reg: Register, value: u16) {
        self.regs.set(reg, value, &mut self.events);
    }

    /// Read a word with bounds checking, for host use. The running machine
    /// itself cannot leave the u16 address space.
    pub fn peek(&self, address: usize) -> Result<u16, String> {
        if address >= RAM_WORDS {
            return Err(format!(
                "address {:#06X} outside the {}-word address space",
                address, RAM_WORDS
            ));
        }
        Ok(self.ram.read(address as u16))
    }

    /// Write a word with bounds checking. Goes through the clocked store
    /// path, so a framebuffer poke emits its pixel event.
    pub fn poke(&mut self, address: usize, value: u16) -> Result<(), String> {
        if address >= RAM_WORDS {
            return Err(format!(
                "address {:#06X} outside the {}-word address space",
                address, RAM_WORDS
            ));
        }
        self.ram.write(address as u16, value, true, &mut self.events);
        Ok(())
    }

    /// Decode the framebuffer region into 0RGB pixels, row-major.
    pub fn framebuffer(&self) -> Vec<u32> {
        self.ram.framebuffer()
    }

    /// Load a program image from its text form: reset, replace RAM, then
    /// re-prime. A rejected image leaves the machine untouched.
    pub fn load_image_str(&mut self, text: &str) -> Result<(), String> {
        let image = image::parse_image(text)?;
        self.reset();
        self.ram.load(&image);
        self.init();
        Ok(())
    }

    /// Load a program image from a file.
    pub fn load_image_file(&mut self, path: &Path) -> Result<(), String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Read error: {}", e))?;
        self.load_image_str(&text)
    }

    /// Dump the architectural registers as text.
    pub fn dump_regs(&self) -> String {
        let mut s = String::new();
        for (i, value) in self.regs.gp.iter().enumerate() {
            s.push_str(&format!("R{}={:04X} ", i, value));
        }
        s.push_str(&format!(
            "\nSP={:04X} PC={:04X} FLAGS={} (0x{:X})",
            self.regs.sp,
            self.regs.pc,
            format_flags(self.regs.flags),
            self.regs.flags
        ));
        s.push_str(&format!(
            "\nIR0={:04X} IR1={:04X} RAM_ADDRESS={:04X}",
            self.regs.ir0, self.regs.ir1, self.regs.ram_address
        ));
        s
    }

    /// Dump a RAM range as hex words, eight per row.
    pub fn dump_ram(&self, start: u16, length: u16) -> String {
        let mut s = String::new();
        let end = (start as usize + length as usize).min(RAM_WORDS);
        let mut addr = start as usize;
        while addr < end {
            let row_end = (addr + 8).min(end);
            s.push_str(&format!("{:04X}:", addr));
            for a in addr..row_end {
                s.push_str(&format!(" {:04X}", self.ram.read(a as u16)));
            }
            s.push('\n');
            addr += 8;
        }
        s
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

/// Render the flag bits as letters, uppercase when set: `vcnZ` means only
/// the zero flag.
pub fn format_flags(flags: u8) -> String {
    let names = ['V', 'C', 'N', 'Z'];
    let mut s = String::with_capacity(4);
    for (i, &f) in names.iter().enumerate() {
        let bit = 3 - i;
        if flags & (1 << bit) != 0 {
            s.push(f);
        } else {
            s.push(f.to_ascii_lowercase());
        }
    }
    s
}

/// Clone-able handle sharing one [`Machine`] between threads, e.g. a
/// simulation thread and a render thread.
#[derive(Clone)]
pub struct SharedMachine(Arc<Mutex<Machine>>);

impl SharedMachine {
    pub fn new(machine: Machine) -> Self {
        SharedMachine(Arc::new(Mutex::new(machine)))
    }

    pub fn tick(&self) {
        self.with(Machine::tick);
    }

    pub fn run_frame(&self) {
        self.with(Machine::run_frame);
    }

    pub fn load_image_str(&self, text: &str) -> Result<(), String> {
        self.with(|m| m.load_image_str(text))
    }

    /// Run a closure against the locked machine. A poisoned lock still
    /// yields the underlying machine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Machine) -> R) -> R {
        let mut guard = self
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
