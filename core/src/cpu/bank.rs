//! Mode-private register storage.
//!
//! Each bank keeps seven slots: r13 and r14 in slots 0 and 1, and r8..r12 in
//! slots 2..=6. Only the FIQ bank has a private r8..r12; while FIQ is live the
//! User/System copies of r8..r12 are parked in the `None` bank's high slots.

use super::psr::{PrivilegeMode, Psr};

pub const BANK_COUNT: usize = 6;
pub const BANK_SLOTS: usize = 7;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum RegisterBank {
    /// Shared by User and System.
    None,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
}

impl RegisterBank {
    pub const ALL: [RegisterBank; BANK_COUNT] = [
        RegisterBank::None,
        RegisterBank::Fiq,
        RegisterBank::Irq,
        RegisterBank::Supervisor,
        RegisterBank::Abort,
        RegisterBank::Undefined,
    ];

    pub const fn for_mode(mode: PrivilegeMode) -> Self {
        match mode {
            PrivilegeMode::User | PrivilegeMode::System => RegisterBank::None,
            PrivilegeMode::Fiq => RegisterBank::Fiq,
            PrivilegeMode::Irq => RegisterBank::Irq,
            PrivilegeMode::Supervisor => RegisterBank::Supervisor,
            PrivilegeMode::Abort => RegisterBank::Abort,
            PrivilegeMode::Undefined => RegisterBank::Undefined,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            RegisterBank::None => 0,
            RegisterBank::Fiq => 1,
            RegisterBank::Irq => 2,
            RegisterBank::Supervisor => 3,
            RegisterBank::Abort => 4,
            RegisterBank::Undefined => 5,
        }
    }

    pub const fn is_privileged(self) -> bool {
        !matches!(self, RegisterBank::None)
    }

    /// Whether `reg` has a private copy in this bank.
    pub const fn banks(self, reg: usize) -> bool {
        match reg {
            13 | 14 => true,
            8..=12 => matches!(self, RegisterBank::Fiq | RegisterBank::None),
            _ => false,
        }
    }

    /// Bank that holds the live r8..r12 while this bank is selected.
    pub(crate) const fn high_bank(self) -> RegisterBank {
        match self {
            RegisterBank::Fiq => RegisterBank::Fiq,
            _ => RegisterBank::None,
        }
    }
}

const fn slot(reg: usize) -> usize {
    match reg {
        13 => 0,
        14 => 1,
        _ => reg - 6,
    }
}

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct BankedRegisters {
    registers: [[u32; BANK_SLOTS]; BANK_COUNT],
    spsrs: [u32; BANK_COUNT],
}

impl BankedRegisters {
    pub fn new() -> Self { Self::default() }

    pub fn register(&self, bank: RegisterBank, reg: usize) -> Option<u32> {
        bank.banks(reg).then(|| self.registers[bank.index()][slot(reg)])
    }

    pub fn set_register(&mut self, bank: RegisterBank, reg: usize, value: u32) {
        if bank.banks(reg) {
            self.registers[bank.index()][slot(reg)] = value;
        }
    }

    pub fn spsr(&self, bank: RegisterBank) -> Psr {
        Psr::new(self.spsrs[bank.index()])
    }

    pub fn set_spsr(&mut self, bank: RegisterBank, value: Psr) {
        self.spsrs[bank.index()] = value.raw();
    }

    pub fn raw_registers(&self) -> &[[u32; BANK_SLOTS]; BANK_COUNT] { &self.registers }
    pub fn raw_spsrs(&self) -> &[u32; BANK_COUNT] { &self.spsrs }

    pub fn from_raw(registers: [[u32; BANK_SLOTS]; BANK_COUNT], spsrs: [u32; BANK_COUNT]) -> Self {
        Self { registers, spsrs }
    }

    /// Parks the live banked registers and saved status of `from`, then brings
    /// in those of `to`. Does nothing when both modes share a bank.
    pub(crate) fn exchange(&mut self, gprs: &mut [u32; 16], spsr: &mut Psr, from: RegisterBank, to: RegisterBank) {
        if from == to {
            return;
        }

        let (out_high, in_high) = (from.high_bank(), to.high_bank());
        if out_high != in_high {
            self.registers[out_high.index()][2..].copy_from_slice(&gprs[8..13]);
            gprs[8..13].copy_from_slice(&self.registers[in_high.index()][2..]);
        }

        let (out, inn) = (from.index(), to.index());
        self.registers[out][0] = gprs[13];
        self.registers[out][1] = gprs[14];
        gprs[13] = self.registers[inn][0];
        gprs[14] = self.registers[inn][1];

        self.spsrs[out] = spsr.raw();
        *spsr = Psr::new(self.spsrs[inn]);
    }
}
