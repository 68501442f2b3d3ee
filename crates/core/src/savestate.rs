//! Save state (quick save / quick load) for the Organ16.
//!
//! Captures the full machine state using bincode serialization with
//! deflate compression, so a session can be parked mid-instruction and
//! resumed later on the exact same half-cycle.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "O16S"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bus::MemoryBus;
use crate::clock::Clock;
use crate::memory::Ram;
use crate::phase::PhaseFlags;
use crate::registers::RegisterFile;
use crate::Machine;

/// Magic bytes identifying an Organ16 save state file.
const MAGIC: &[u8; 4] = b"O16S";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;

/// Everything a [`Machine`] needs to resume: every latch and both
/// sampled bus slots. The event queue and debug switch are host-side and
/// are not captured.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveState {
    pub regs: RegisterFile,
    pub ram: Ram,
    pub phase: PhaseFlags,
    pub bus: MemoryBus,
    pub clock: Clock,
    pub in_ports: [u16; 3],
    pub out_ports: [u16; 3],
    pub old_ram_address: u16,
    pub old_ram_value: u16,
    pub tick_count: u64,
}

impl SaveState {
    /// Snapshot a machine.
    pub fn capture(machine: &Machine) -> SaveState {
        SaveState {
            regs: machine.regs.clone(),
            ram: machine.ram.clone(),
            phase: machine.phase,
            bus: machine.bus.clone(),
            clock: machine.clock,
            in_ports: machine.in_ports,
            out_ports: machine.out_ports,
            old_ram_address: machine.old_ram_address,
            old_ram_value: machine.old_ram_value,
            tick_count: machine.tick_count,
        }
    }

    /// Overwrite a machine with this snapshot. The event queue is left
    /// alone; a host should repaint from `framebuffer()` afterwards.
    pub fn restore(self, machine: &mut Machine) {
        machine.regs = self.regs;
        machine.ram = self.ram;
        machine.phase = self.phase;
        machine.bus = self.bus;
        machine.clock = self.clock;
        machine.in_ports = self.in_ports;
        machine.out_ports = self.out_ports;
        machine.old_ram_address = self.old_ram_address;
        machine.old_ram_value = self.old_ram_value;
        machine.tick_count = self.tick_count;
    }
}

/// Serialize a state to bytes with header and deflate compression.
pub fn encode(state: &SaveState) -> Result<Vec<u8>, String> {
    let payload = bincode::serialize(state)
        .map_err(|e| format!("Serialize error: {}", e))?;

    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Deserialize a state from bytes, verifying magic and version.
pub fn decode(data: &[u8]) -> Result<SaveState, String> {
    if data.len() < 8 {
        return Err("File too small".into());
    }
    if &data[0..4] != MAGIC {
        return Err("Invalid save state file (bad magic)".into());
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(format!(
            "Unsupported save state version {} (expected {})",
            version, FORMAT_VERSION
        ));
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[8..])
        .map_err(|e| format!("Decompress error: {:?}", e))?;

    bincode::deserialize(&decompressed)
        .map_err(|e| format!("Deserialize error: {}", e))
}

impl Machine {
    /// Snapshot the machine to the save state byte format.
    pub fn save_state(&self) -> Result<Vec<u8>, String> {
        encode(&SaveState::capture(self))
    }

    /// Restore from save state bytes. The state is fully decoded before
    /// anything is applied, so a rejected buffer leaves the machine
    /// untouched.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), String> {
        let state = decode(bytes)?;
        state.restore(self);
        Ok(())
    }

    pub fn save_state_file(&self, path: &Path) -> Result<(), String> {
        let bytes = self.save_state()?;
        std::fs::write(path, &bytes).map_err(|e| format!("Write error: {}", e))
    }

    pub fn load_state_file(&mut self, path: &Path) -> Result<(), String> {
        let bytes = std::fs::read(path).map_err(|e| format!("Read error: {}", e))?;
        self.load_state(&bytes)
    }
}
