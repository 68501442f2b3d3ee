//! Word-addressed RAM with a memory-mapped framebuffer.
//!
//! 65536 16-bit words. The region 0x8000..0xC000 doubles as a 128×128
//! RGB565 framebuffer: a store into it whose RAM clock is asserted emits a
//! [`SimEvent::Pixel`] with the decoded channel values. Reads are plain
//! array reads; the address space is exactly the u16 range, so internal
//! accesses can never be out of bounds.

use serde::{Deserialize, Serialize};

use crate::events::SimEvent;

/// Total RAM size in 16-bit words.
pub const RAM_WORDS: usize = 65536;
/// First framebuffer address.
pub const FB_BASE: u16 = 0x8000;
/// One past the last framebuffer address.
pub const FB_END: u16 = 0xC000;
/// Framebuffer width in pixels.
pub const SCREEN_WIDTH: usize = 128;
/// Framebuffer height in pixels.
pub const SCREEN_HEIGHT: usize = 128;

/// Expand an RGB565 word to 8-bit channels.
#[inline(always)]
pub fn rgb565(word: u16) -> (u8, u8, u8) {
    let r5 = (word >> 11) & 0x1F;
    let g6 = (word >> 5) & 0x3F;
    let b5 = word & 0x1F;
    (
        (r5 as u32 * 255 / 31) as u8,
        (g6 as u32 * 255 / 63) as u8,
        (b5 as u32 * 255 / 31) as u8,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ram {
    words: Vec<u16>,
}

impl Ram {
    pub fn new() -> Self {
        Ram {
            words: vec![0; RAM_WORDS],
        }
    }

    #[inline(always)]
    pub fn read(&self, address: u16) -> u16 {
        self.words[address as usize]
    }

    /// Clock-gated store. With `ram_clock` low the store is dropped, which
    /// is how the bus schedules a write for the correct half-cycle. A
    /// clocked store into the framebuffer region emits a pixel event.
    pub fn write(&mut self, address: u16, value: u16, ram_clock: bool, events: &mut Vec<SimEvent>) {
        if !ram_clock {
            return;
        }
        self.words[address as usize] = value;
        if (FB_BASE..FB_END).contains(&address) {
            let rel = (address - FB_BASE) as usize;
            let (r, g, b) = rgb565(value);
            events.push(SimEvent::Pixel {
                x: (rel % SCREEN_WIDTH) as u8,
                y: (rel / SCREEN_WIDTH) as u8,
                r,
                g,
                b,
            });
        }
    }

    /// Replace the whole contents with a loaded image.
    pub fn load(&mut self, image: &[u16; RAM_WORDS]) {
        self.words.copy_from_slice(image);
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u16] {
        &self.words
    }

    /// Render the framebuffer region to 0RGB pixels for direct blitting.
    pub fn framebuffer(&self) -> Vec<u32> {
        self.words[FB_BASE as usize..FB_END as usize]
            .iter()
            .map(|&word| {
                let (r, g, b) = rgb565(word);
                (r as u32) << 16 | (g as u32) << 8 | b as u32
            })
            .collect()
    }
}

impl Default for Ram {
    fn default() -> Self {
        Ram::new()
    }
}
