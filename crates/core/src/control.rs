//! Instruction decoder.
//!
//! Every instruction word carries a 3-bit class in bits 15..13, a 4-bit
//! subopcode in bits 12..9 and a 9-bit operand field in bits 8..0. The
//! operand field always splits into three register selectors (destination,
//! source A, source B) even when the instruction ignores some of them.
//!
//! | class | meaning                                      |
//! |-------|----------------------------------------------|
//! | 0     | three-register ALU operation                 |
//! | 1     | compare (sub 10) / bitwise NOT (sub 11)      |
//! | 2     | load immediate from the extension word       |
//! | 3     | memory access (direct or register-indirect)  |
//! | 4     | conditional branch / JSR / RTS               |
//! | 5     | push (sub 0) / pop (sub 1)                   |
//! | 6     | reserved, decodes to no-op                   |
//! | 7     | halt / port input / port output              |
//!
//! [`decode`] is a pure function from an instruction word and the current
//! flags to the full control-line bundle. It runs combinationally, so the
//! simulator re-evaluates it whenever its inputs may have changed.

/// Bit 4 of [`ControlSignals::alu_data`]: the ALU output enable line.
pub const ALU_ENABLE: u8 = 0b10000;

/// Instruction class, bits 15..13.
#[inline(always)]
pub fn opcode(word: u16) -> u16 {
    word >> 13
}

/// Subopcode, bits 12..9.
#[inline(always)]
pub fn subopcode(word: u16) -> u16 {
    (word >> 9) & 0xF
}

/// Destination register selector, bits 8..6.
#[inline(always)]
pub fn dst_r(word: u16) -> usize {
    ((word >> 6) & 0x7) as usize
}

/// Source A register selector, bits 5..3.
#[inline(always)]
pub fn src_ra(word: u16) -> usize {
    ((word >> 3) & 0x7) as usize
}

/// Source B register selector, bits 2..0.
#[inline(always)]
pub fn src_rb(word: u16) -> usize {
    (word & 0x7) as usize
}

/// Control lines produced by decoding one instruction word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSignals {
    /// A general-purpose register receives a value this instruction.
    pub reg_write: bool,
    /// The next word in memory is an extension word, not an instruction.
    pub is_nxt_ext: bool,
    /// The flags register latches the ALU status bits.
    pub flags_write: bool,
    /// The instruction stores a register to memory.
    pub mem_write: bool,
    /// The register write-back value comes from memory, not the ALU.
    pub mem_to_reg: bool,
    /// The extension word (or branch target) is a memory address. For
    /// branches this already folds in the condition mux, so an untaken
    /// branch reads as false.
    pub contains_address: bool,
    /// A taken branch loads the PC from the extension word.
    pub load_pc: bool,
    /// The stack pointer moves up (pop) rather than down (push).
    pub sp_pop: bool,
    /// The stack pointer moves this instruction.
    pub sp_change: bool,
    /// Jump to subroutine: push the return address, then branch.
    pub jsr: bool,
    /// Return from subroutine: pop the return address into the PC.
    pub rts: bool,
    /// Source B holds the memory address (register-indirect access).
    pub reg_is_address: bool,
    /// Halt: freeze the PC on this instruction.
    pub hlt: bool,
    /// Register write-back value comes from an input port.
    pub use_in: bool,
    /// Source A is driven onto an output port.
    pub use_out: bool,
    /// Which I/O port the instruction touches (0..=2).
    pub io_port: usize,
    /// ALU operation selector in bits 3..0, enable line in bit 4.
    pub alu_data: u8,
}

/// Decode one instruction word against the current flags.
pub fn decode(word: u16, flags: u8) -> ControlSignals {
    let op = opcode(word);
    let sub = subopcode(word);

    let mut s = ControlSignals::default();

    s.reg_write = (op == 5 && sub == 1)
        || (op == 3 && (sub == 0 || sub == 3))
        || op == 2
        || (op == 1 && sub == 11)
        || op == 0
        || (op == 7 && (1..=3).contains(&sub));

    s.is_nxt_ext = op == 2 || op == 4 || (op == 3 && sub < 2) || (op == 5 && sub == 1);

    s.flags_write = op == 1 && sub == 10;
    s.mem_write = op == 3 && (sub == 1 || sub == 2);
    s.mem_to_reg = op == 3 && (sub == 0 || sub == 3);

    s.contains_address = match op {
        3 => true,
        4 => branch_condition(sub, flags),
        5 => sub == 1,
        _ => false,
    };

    s.load_pc = op == 4;
    s.sp_pop = (op == 4 && sub == 12) || (op == 5 && sub == 1);
    s.sp_change = (op == 4 && (sub == 11 || sub == 12)) || op == 5;
    s.jsr = op == 4 && sub == 11;
    s.rts = op == 4 && sub == 12;
    s.reg_is_address = op == 3 && (sub == 2 || sub == 3);

    s.hlt = op == 7 && sub == 0;
    s.use_in = op == 7 && (1..=3).contains(&sub);
    s.use_out = op == 7 && sub >= 4;
    s.io_port = match sub {
        1 | 4 => 0,
        2 | 5 => 1,
        3 | 6 => 2,
        _ => 0,
    };

    s.alu_data = match (op, sub) {
        (0, 0..=9) => ALU_ENABLE | sub as u8,
        (1, 10) => ALU_ENABLE | 10,
        (1, 11) => ALU_ENABLE | 11,
        _ => 0,
    };

    s
}

/// Branch condition mux: true when the branch with the given subopcode is
/// taken under the given flags.
///
/// Flag bits: 0 = zero, 1 = negative, 2 = carry, 3 = overflow. Subopcodes
/// 0 and 11 (JSR) are unconditional; 12 (RTS) and the reserved 13..=15
/// never take the extension-word path.
pub fn branch_condition(sub: u16, flags: u8) -> bool {
    let z = flags & 0b0001 != 0;
    let n = flags & 0b0010 != 0;
    let c = flags & 0b0100 != 0;
    let v = flags & 0b1000 != 0;

    match sub {
        0 | 11 => true,
        1 => z,
        2 => !z,
        3 => c,
        4 => z || c,
        5 => !(z || c),
        6 => !c,
        7 => n != v,
        8 => z || (n != v),
        9 => !(n != v) && !z,
        10 => n != v,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_field_extraction() {
        // class 3, sub 3, dst R5, srcA R1, srcB R2 => 011 0011 101 001 010
        let word = 0x674A;
        assert_eq!(opcode(word), 3);
        assert_eq!(subopcode(word), 3);
        assert_eq!(dst_r(word), 5);
        assert_eq!(src_ra(word), 1);
        assert_eq!(src_rb(word), 2);
    }

    #[test]
    fn test_condition_mux_all_inputs() {
        // Expected taken-set per subopcode, one bit per 4-bit flags value:
        // bit f of EXPECTED[sub] is the mux output for flags == f.
        const EXPECTED: [u16; 16] = [
            0xFFFF, 0xAAAA, 0x5555, 0xF0F0, 0xFAFA, 0x0505, 0x0F0F, 0x33CC,
            0xBBEE, 0x4411, 0x33CC, 0xFFFF, 0x0000, 0x0000, 0x0000, 0x0000,
        ];
        for sub in 0..16u16 {
            for flags in 0..16u8 {
                let expect = EXPECTED[sub as usize] >> flags & 1 == 1;
                assert_eq!(
                    branch_condition(sub, flags),
                    expect,
                    "sub {} flags {:04b}",
                    sub,
                    flags
                );
            }
        }
    }

    #[test]
    fn test_alu_class() {
        // ADD R2, R0, R1 => 000 0000 010 000 001 = 0x0081
        let s = decode(0x0081, 0);
        assert!(s.reg_write);
        assert!(!s.is_nxt_ext);
        assert!(!s.flags_write);
        assert!(!s.mem_write);
        assert_eq!(s.alu_data, ALU_ENABLE);

        // XOR R0, R3, R4 => 000 1001 000 011 100 = 0x121C
        let s = decode(0x121C, 0);
        assert!(s.reg_write);
        assert_eq!(s.alu_data, ALU_ENABLE | 9);

        // Class-0 subopcodes past 9 still decode reg_write, but the ALU
        // stays disabled so nothing reaches the register file.
        for sub in 10..16u16 {
            let s = decode(sub << 9, 0);
            assert!(s.reg_write);
            assert_eq!(s.alu_data, 0);
        }
    }

    #[test]
    fn test_compare_and_not() {
        // CMP R1, R2 => 001 1010 000 001 010 = 0x340A
        let s = decode(0x340A, 0);
        assert!(s.flags_write);
        assert!(!s.reg_write);
        assert_eq!(s.alu_data, ALU_ENABLE | 10);

        // NOT R3, R1 => 001 1011 011 001 000 = 0x36C8
        let s = decode(0x36C8, 0);
        assert!(s.reg_write);
        assert!(!s.flags_write);
        assert_eq!(s.alu_data, ALU_ENABLE | 11);

        // Other class-1 subopcodes are inert.
        let s = decode(0x2000, 0);
        assert!(!s.reg_write);
        assert!(!s.flags_write);
        assert_eq!(s.alu_data, 0);
    }

    #[test]
    fn test_load_immediate() {
        // LDI R0 => 010 0000 000 000 000 = 0x4000
        let s = decode(0x4000, 0);
        assert!(s.reg_write);
        assert!(s.is_nxt_ext);
        assert!(!s.mem_write);
        assert!(!s.contains_address);
        assert_eq!(s.alu_data, 0);
    }

    #[test]
    fn test_memory_class() {
        // LOAD R4, [ext] => 011 0000 100 000 000 = 0x6100
        let s = decode(0x6100, 0);
        assert!(s.reg_write);
        assert!(s.is_nxt_ext);
        assert!(s.mem_to_reg);
        assert!(s.contains_address);
        assert!(!s.mem_write);
        assert!(!s.reg_is_address);

        // STORE [ext], R1 => 011 0001 000 001 000 = 0x6208
        let s = decode(0x6208, 0);
        assert!(s.mem_write);
        assert!(s.is_nxt_ext);
        assert!(s.contains_address);
        assert!(!s.reg_write);
        assert!(!s.reg_is_address);

        // STORE [R2], R1 => 011 0010 000 001 010 = 0x640A
        let s = decode(0x640A, 0);
        assert!(s.mem_write);
        assert!(s.reg_is_address);
        assert!(s.contains_address);
        assert!(!s.is_nxt_ext);
        assert!(!s.reg_write);

        // LOAD R5, [R2] => 011 0011 101 000 010 = 0x6742
        let s = decode(0x6742, 0);
        assert!(s.reg_write);
        assert!(s.mem_to_reg);
        assert!(s.reg_is_address);
        assert!(s.contains_address);
        assert!(!s.is_nxt_ext);
        assert!(!s.mem_write);
    }

    #[test]
    fn test_branch_class() {
        // JMP => 100 0000 000 000 000 = 0x8000
        let s = decode(0x8000, 0);
        assert!(s.load_pc);
        assert!(s.is_nxt_ext);
        assert!(s.contains_address);
        assert!(!s.sp_change);

        // JE => 100 0001 000 000 000 = 0x8200, taken only on zero
        assert!(!decode(0x8200, 0b0000).contains_address);
        assert!(decode(0x8200, 0b0001).contains_address);
        assert!(decode(0x8200, 0).is_nxt_ext);

        // JSR => 100 1011 000 000 000 = 0x9600
        let s = decode(0x9600, 0);
        assert!(s.jsr);
        assert!(s.sp_change);
        assert!(!s.sp_pop);
        assert!(s.contains_address);
        assert!(s.load_pc);
        assert!(!s.rts);

        // RTS => 100 1100 000 000 000 = 0x9800
        let s = decode(0x9800, 0);
        assert!(s.rts);
        assert!(s.sp_change);
        assert!(s.sp_pop);
        assert!(s.load_pc);
        assert!(!s.contains_address);
        assert!(!s.jsr);
    }

    #[test]
    fn test_stack_class() {
        // PUSH R1 => 101 0000 000 001 000 = 0xA008
        let s = decode(0xA008, 0);
        assert!(s.sp_change);
        assert!(!s.sp_pop);
        assert!(!s.reg_write);
        assert!(!s.is_nxt_ext);
        assert!(!s.contains_address);

        // POP R3 => 101 0001 011 000 000 = 0xA2C0
        let s = decode(0xA2C0, 0);
        assert!(s.sp_change);
        assert!(s.sp_pop);
        assert!(s.reg_write);
        assert!(s.is_nxt_ext);
        assert!(s.contains_address);
    }

    #[test]
    fn test_io_class() {
        // HLT => 111 0000 000 000 000 = 0xE000
        let s = decode(0xE000, 0);
        assert!(s.hlt);
        assert!(!s.use_in);
        assert!(!s.use_out);

        // IN R1, A => 111 0001 001 000 000 = 0xE240
        let s = decode(0xE240, 0);
        assert!(s.use_in);
        assert!(s.reg_write);
        assert_eq!(s.io_port, 0);

        // IN R0, C => 111 0011 000 000 000 = 0xE600
        assert_eq!(decode(0xE600, 0).io_port, 2);

        // OUT B, R1 => 111 0101 000 001 000 = 0xEA08
        let s = decode(0xEA08, 0);
        assert!(s.use_out);
        assert!(!s.use_in);
        assert!(!s.reg_write);
        assert_eq!(s.io_port, 1);

        // Subopcodes 7..=15 still drive an output, falling back to port A.
        let s = decode(0xEE00, 0);
        assert!(s.use_out);
        assert_eq!(s.io_port, 0);
    }

    #[test]
    fn test_decode_covers_every_word() {
        // Every word decodes under every flag state, and the derived
        // selectors stay inside the ranges they index.
        for word in 0..=u16::MAX {
            for flags in 0..16u8 {
                let s = decode(word, flags);
                assert!(s.io_port < 3, "word {:04X} flags {:X}", word, flags);
                assert_eq!(s.alu_data & !(ALU_ENABLE | 0xF), 0);
            }
        }
    }

    #[test]
    fn test_reserved_class_is_inert() {
        // class 6 => 110 .... = 0xC000 and friends. The port selector is
        // decoded from the subopcode either way, so only the action
        // signals are checked here.
        for sub in 0..16u16 {
            let s = decode(0xC000 | sub << 9, 0xF);
            assert!(!s.reg_write, "sub {}", sub);
            assert!(!s.is_nxt_ext);
            assert!(!s.flags_write);
            assert!(!s.mem_write);
            assert!(!s.contains_address);
            assert!(!s.load_pc);
            assert!(!s.sp_change);
            assert!(!s.hlt);
            assert!(!s.use_in);
            assert!(!s.use_out);
            assert_eq!(s.alu_data, 0);
        }
    }
}
