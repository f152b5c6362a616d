//! Plain copy of the CPU's architectural state.

use super::bank::{BankedRegisters, BANK_COUNT, BANK_SLOTS};
use super::psr::Psr;
use super::{Cpu, PC};

#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuSnapshot {
    pub gprs: [u32; 16],
    pub cpsr: u32,
    pub spsr: u32,
    pub banked_registers: [[u32; BANK_SLOTS]; BANK_COUNT],
    pub banked_spsrs: [u32; BANK_COUNT],
    pub cycles: i32,
    pub next_event: i32,
    pub absolute_cycles: u64,
    pub last_cycles: i32,
    pub shifter_operand: u32,
    pub shifter_carry_out: bool,
}

impl Cpu {
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            gprs: self.gprs,
            cpsr: self.cpsr.raw(),
            spsr: self.spsr.raw(),
            banked_registers: *self.banked.raw_registers(),
            banked_spsrs: *self.banked.raw_spsrs(),
            cycles: self.cycles,
            next_event: self.next_event,
            absolute_cycles: self.absolute_cycles,
            last_cycles: self.last_cycles,
            shifter_operand: self.shifter_operand,
            shifter_carry_out: self.shifter_carry_out,
        }
    }

    /// Loads `snapshot` verbatim. The bank matching the restored CPSR is taken
    /// to be the live one, as it was when the snapshot was made.
    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.gprs = snapshot.gprs;
        self.cpsr = Psr::new(snapshot.cpsr);
        self.spsr = Psr::new(snapshot.spsr);
        self.banked = BankedRegisters::from_raw(snapshot.banked_registers, snapshot.banked_spsrs);
        self.privilege_mode = self.cpsr.mode();
        self.execution_mode = self.cpsr.execution_mode();
        self.cycles = snapshot.cycles;
        self.next_event = snapshot.next_event;
        self.absolute_cycles = snapshot.absolute_cycles;
        self.last_cycles = snapshot.last_cycles;
        self.shifter_operand = snapshot.shifter_operand;
        self.shifter_carry_out = snapshot.shifter_carry_out;
        let pc = self.gprs[PC];
        self.write_pc(pc);
    }
}
