//! Barrel shifter and adder helpers shared by both instruction sets.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftKind {
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => ShiftKind::Lsl,
            1 => ShiftKind::Lsr,
            2 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        }
    }
}

/// Applies a shift and returns `(result, carry_out)`.
///
/// `immediate` selects the encoding rules for a 5-bit immediate amount, where
/// an amount of zero means LSR #32, ASR #32 or RRX. Register-specified amounts
/// use the bottom byte and leave the carry alone when it is zero.
pub fn barrel_shift(kind: ShiftKind, value: u32, amount: u32, carry_in: bool, immediate: bool) -> (u32, bool) {
    let amount = if immediate {
        match (kind, amount & 0x1F) {
            (ShiftKind::Lsl, 0) => return (value, carry_in),
            (ShiftKind::Ror, 0) => return rrx(value, carry_in),
            (ShiftKind::Lsr | ShiftKind::Asr, 0) => 32,
            (_, n) => n,
        }
    } else {
        let n = amount & 0xFF;
        if n == 0 {
            return (value, carry_in);
        }
        n
    };

    match kind {
        ShiftKind::Lsl => lsl(value, amount),
        ShiftKind::Lsr => lsr(value, amount),
        ShiftKind::Asr => asr(value, amount),
        ShiftKind::Ror => ror(value, amount),
    }
}

fn lsl(value: u32, n: u32) -> (u32, bool) {
    match n {
        1..=31 => (value << n, (value >> (32 - n)) & 1 != 0),
        32 => (0, value & 1 != 0),
        _ => (0, false),
    }
}

fn lsr(value: u32, n: u32) -> (u32, bool) {
    match n {
        1..=31 => (value >> n, (value >> (n - 1)) & 1 != 0),
        32 => (0, value >> 31 != 0),
        _ => (0, false),
    }
}

fn asr(value: u32, n: u32) -> (u32, bool) {
    if n < 32 {
        (((value as i32) >> n) as u32, (value >> (n - 1)) & 1 != 0)
    } else {
        let sign = value >> 31 != 0;
        (if sign { u32::MAX } else { 0 }, sign)
    }
}

fn ror(value: u32, n: u32) -> (u32, bool) {
    let result = value.rotate_right(n & 31);
    (result, result >> 31 != 0)
}

fn rrx(value: u32, carry_in: bool) -> (u32, bool) {
    (((carry_in as u32) << 31) | (value >> 1), value & 1 != 0)
}

/// Rotated 8-bit immediate of data-processing and MSR encodings.
pub fn rotated_immediate(opcode: u32, carry_in: bool) -> (u32, bool) {
    let imm8 = opcode & 0xFF;
    let rot = ((opcode >> 8) & 0xF) * 2;
    if rot == 0 {
        (imm8, carry_in)
    } else {
        let value = imm8.rotate_right(rot);
        (value, value >> 31 != 0)
    }
}

/// `a + b + carry`, returning `(result, carry_out, overflow)`.
pub fn add_with_carry(a: u32, b: u32, carry: bool) -> (u32, bool, bool) {
    let sum = a as u64 + b as u64 + carry as u64;
    let result = sum as u32;
    let overflow = (!(a ^ b) & (a ^ result)) >> 31 != 0;
    (result, sum > 0xFFFF_FFFF, overflow)
}

/// `a - b - !carry`; the carry out is the inverted borrow.
pub fn sub_with_carry(a: u32, b: u32, carry: bool) -> (u32, bool, bool) {
    add_with_carry(a, !b, carry)
}

/// Internal multiplier cycles for a multiply by `rs` on ARM7TDMI.
pub fn multiply_cycles(rs: u32) -> i32 {
    let check = |mask: u32| rs & mask == 0 || rs & mask == mask;
    if check(0xFFFF_FF00) {
        1
    } else if check(0xFFFF_0000) {
        2
    } else if check(0xFF00_0000) {
        3
    } else {
        4
    }
}
