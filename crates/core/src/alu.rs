//! Combinational arithmetic/logic unit.
//!
//! [`compute`] models the ALU as a pure function: two 16-bit operands, a
//! 4-bit operation selector, and an enable line in; a 16-bit result and the
//! four status flags out. The enable line models the disconnected output
//! bus — when low, every output reads as zero regardless of the operands.
//!
//! The selector doubles as the class-0 subopcode, so the table below is
//! also the instruction set's arithmetic surface.

/// ALU output bundle: result word plus the four status flags.
///
/// `carry` and `overflow` are meaningful only for the add/subtract
/// selectors; every other operation leaves them false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AluOut {
    pub result: u16,
    pub zero: bool,
    pub negative: bool,
    pub carry: bool,
    pub overflow: bool,
}

/// Evaluate one ALU operation.
///
/// Selectors: 0=ADD, 1=SUB, 2=MUL (mod 2^16), 3=DIV, 4=MOD, 5=AND, 6=OR,
/// 7=NAND, 8=NOR, 9=XOR, 10=SUB (compare alias), 11=NOT(a). Division and
/// modulo by zero yield 0. Reserved selectors yield 0.
pub fn compute(a: u16, b: u16, op: u8, enable: bool) -> AluOut {
    let mut out = AluOut::default();
    if !enable {
        return out;
    }

    let op = op & 0xF;
    out.result = match op {
        0 => (a as u32 + b as u32) as u16,
        1 | 10 => a.wrapping_sub(b),
        2 => (a as u32 * b as u32) as u16,
        3 => {
            if b != 0 {
                a / b
            } else {
                0
            }
        }
        4 => {
            if b != 0 {
                a % b
            } else {
                0
            }
        }
        5 => a & b,
        6 => a | b,
        7 => !(a & b),
        8 => !(a | b),
        9 => a ^ b,
        11 => !a,
        _ => 0,
    };

    out.zero = out.result == 0;
    out.negative = out.result & 0x8000 != 0;

    // Carry/overflow exist only on the add and subtract paths.
    let a_neg = a & 0x8000 != 0;
    let b_neg = b & 0x8000 != 0;
    let r_neg = out.result & 0x8000 != 0;
    match op {
        0 => {
            out.carry = a as u32 + b as u32 > 0xFFFF;
            out.overflow = a_neg == b_neg && a_neg != r_neg;
        }
        1 | 10 => {
            out.carry = a < b;
            out.overflow = a_neg != b_neg && a_neg != r_neg;
        }
        _ => {}
    }

    out
}
