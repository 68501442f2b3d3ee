//! Simulation events.
//!
//! The machine never calls into a frontend. Everything a visualization
//! layer needs to repaint accumulates in an internal queue during
//! `tick()` and is drained afterwards with `take_events()`, so the core
//! stays independent of any rendering framework.

use crate::phase::PhaseFlags;
use crate::registers::Register;

/// One of the three 16-bit I/O ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
}

impl Port {
    pub const ALL: [Port; 3] = [Port::A, Port::B, Port::C];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A state change a frontend may want to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A named register's stored value changed.
    Register { reg: Register, value: u16 },
    /// The last-accessed memory address moved.
    RamCursor { from: u16, to: u16 },
    /// A clocked store hit the framebuffer region.
    Pixel { x: u8, y: u8, r: u8, g: u8, b: u8 },
    /// The physical clock level toggled.
    ClockLevel { high: bool },
    /// The phase-flag set changed.
    PhaseFlags { flags: PhaseFlags },
    /// An output port latched a new value.
    PortOut { port: Port, value: u16 },
}
