use std::fmt;

const FLAG_N: u32 = 1 << 31;
const FLAG_Z: u32 = 1 << 30;
const FLAG_C: u32 = 1 << 29;
const FLAG_V: u32 = 1 << 28;
const FLAG_I: u32 = 1 << 7;
const FLAG_F: u32 = 1 << 6;
const FLAG_T: u32 = 1 << 5;
pub const MODE_MASK: u32 = 0x1F;

/// Instruction encoding the core fetches and decodes.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionMode {
    Arm,
    Thumb,
}

impl ExecutionMode {
    /// Bytes per instruction word.
    pub const fn instruction_width(self) -> u32 {
        match self {
            ExecutionMode::Arm => 4,
            ExecutionMode::Thumb => 2,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrivilegeMode {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
    System,
}

impl PrivilegeMode {
    pub const ALL: [PrivilegeMode; 7] = [
        PrivilegeMode::User,
        PrivilegeMode::Fiq,
        PrivilegeMode::Irq,
        PrivilegeMode::Supervisor,
        PrivilegeMode::Abort,
        PrivilegeMode::Undefined,
        PrivilegeMode::System,
    ];

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits & MODE_MASK {
            0b10000 => Some(PrivilegeMode::User),
            0b10001 => Some(PrivilegeMode::Fiq),
            0b10010 => Some(PrivilegeMode::Irq),
            0b10011 => Some(PrivilegeMode::Supervisor),
            0b10111 => Some(PrivilegeMode::Abort),
            0b11011 => Some(PrivilegeMode::Undefined),
            0b11111 => Some(PrivilegeMode::System),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            PrivilegeMode::User => 0b10000,
            PrivilegeMode::Fiq => 0b10001,
            PrivilegeMode::Irq => 0b10010,
            PrivilegeMode::Supervisor => 0b10011,
            PrivilegeMode::Abort => 0b10111,
            PrivilegeMode::Undefined => 0b11011,
            PrivilegeMode::System => 0b11111,
        }
    }

    pub const fn is_privileged(self) -> bool {
        !matches!(self, PrivilegeMode::User)
    }

    /// Only the five exception modes own a saved status register.
    pub const fn has_spsr(self) -> bool {
        !matches!(self, PrivilegeMode::User | PrivilegeMode::System)
    }
}

impl TryFrom<u32> for PrivilegeMode {
    type Error = u32;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        PrivilegeMode::from_bits(bits).ok_or(bits)
    }
}

/// Program status register in its packed form.
///
/// Bits the accessors do not cover are preserved verbatim, so a value written
/// through [`Psr::set_raw`] reads back unchanged.
#[derive(Copy, Clone, Eq, PartialEq, Default, Hash)]
pub struct Psr(u32);

impl fmt::Debug for Psr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Psr")
            .field("N", &self.n())
            .field("Z", &self.z())
            .field("C", &self.c())
            .field("V", &self.v())
            .field("I", &self.irq_disabled())
            .field("F", &self.fiq_disabled())
            .field("T", &self.t())
            .field("mode", &self.mode())
            .finish()
    }
}

impl Psr {
    pub const fn new(raw: u32) -> Self { Self(raw) }

    pub const fn raw(self) -> u32 { self.0 }
    pub fn set_raw(&mut self, value: u32) { self.0 = value; }

    pub const fn n(self) -> bool { self.0 & FLAG_N != 0 }
    pub const fn z(self) -> bool { self.0 & FLAG_Z != 0 }
    pub const fn c(self) -> bool { self.0 & FLAG_C != 0 }
    pub const fn v(self) -> bool { self.0 & FLAG_V != 0 }
    pub const fn irq_disabled(self) -> bool { self.0 & FLAG_I != 0 }
    pub const fn fiq_disabled(self) -> bool { self.0 & FLAG_F != 0 }
    pub const fn t(self) -> bool { self.0 & FLAG_T != 0 }

    pub fn set_n(&mut self, v: bool) { self.set_bit(FLAG_N, v); }
    pub fn set_z(&mut self, v: bool) { self.set_bit(FLAG_Z, v); }
    pub fn set_c(&mut self, v: bool) { self.set_bit(FLAG_C, v); }
    pub fn set_v(&mut self, v: bool) { self.set_bit(FLAG_V, v); }
    pub fn set_irq_disabled(&mut self, v: bool) { self.set_bit(FLAG_I, v); }
    pub fn set_fiq_disabled(&mut self, v: bool) { self.set_bit(FLAG_F, v); }
    pub fn set_t(&mut self, v: bool) { self.set_bit(FLAG_T, v); }

    fn set_bit(&mut self, mask: u32, set: bool) {
        if set { self.0 |= mask } else { self.0 &= !mask }
    }

    /// Sets N and Z from a result word.
    pub fn set_nz(&mut self, result: u32) {
        self.set_n(result >> 31 != 0);
        self.set_z(result == 0);
    }

    pub const fn mode_bits(self) -> u32 { self.0 & MODE_MASK }

    /// Unrecognised mode bits decode as User.
    pub const fn mode(self) -> PrivilegeMode {
        match PrivilegeMode::from_bits(self.0) {
            Some(mode) => mode,
            None => PrivilegeMode::User,
        }
    }

    pub fn set_mode(&mut self, mode: PrivilegeMode) {
        self.0 = (self.0 & !MODE_MASK) | mode.bits();
    }

    pub const fn execution_mode(self) -> ExecutionMode {
        if self.t() { ExecutionMode::Thumb } else { ExecutionMode::Arm }
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.set_t(matches!(mode, ExecutionMode::Thumb));
    }

    pub fn unpack(self) -> PsrFields {
        PsrFields {
            mode: self.mode(),
            execution_mode: self.execution_mode(),
            fiq_disable: self.fiq_disabled(),
            irq_disable: self.irq_disabled(),
            n: self.n(),
            z: self.z(),
            c: self.c(),
            v: self.v(),
        }
    }

    /// Evaluates a 4-bit condition field against the flags.
    pub const fn condition_passed(self, cond: u32) -> bool {
        let (n, z, c, v) = (self.n(), self.z(), self.c(), self.v());
        match cond & 0xF {
            0x0 => z,
            0x1 => !z,
            0x2 => c,
            0x3 => !c,
            0x4 => n,
            0x5 => !n,
            0x6 => v,
            0x7 => !v,
            0x8 => c && !z,
            0x9 => !c || z,
            0xA => n == v,
            0xB => n != v,
            0xC => !z && (n == v),
            0xD => z || (n != v),
            0xE => true,
            _ => false,
        }
    }
}

impl From<u32> for Psr {
    fn from(raw: u32) -> Self { Psr(raw) }
}

impl From<Psr> for u32 {
    fn from(psr: Psr) -> Self { psr.0 }
}

/// Structured view of a [`Psr`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PsrFields {
    pub mode: PrivilegeMode,
    pub execution_mode: ExecutionMode,
    pub fiq_disable: bool,
    pub irq_disable: bool,
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

impl Default for PsrFields {
    fn default() -> Self {
        Self {
            mode: PrivilegeMode::User,
            execution_mode: ExecutionMode::Arm,
            fiq_disable: false,
            irq_disable: false,
            n: false,
            z: false,
            c: false,
            v: false,
        }
    }
}

impl PsrFields {
    pub fn pack(&self) -> Psr {
        let mut psr = Psr::default();
        psr.set_mode(self.mode);
        psr.set_execution_mode(self.execution_mode);
        psr.set_fiq_disabled(self.fiq_disable);
        psr.set_irq_disabled(self.irq_disable);
        psr.set_n(self.n);
        psr.set_z(self.z);
        psr.set_c(self.c);
        psr.set_v(self.v);
        psr
    }
}

impl From<PsrFields> for Psr {
    fn from(fields: PsrFields) -> Self { fields.pack() }
}
