//! Platform hooks the core calls back into.
//!
//! Every hook gets the CPU so a board can raise interrupts, inject a mode or
//! emulate a BIOS call in place. The defaults give bare-metal behaviour: SWIs
//! enter the SWI vector and trapped opcodes enter the Undefined vector.

use crate::cpu::Cpu;

pub trait Board {
    /// Called once at the end of [`Cpu::reset`].
    fn reset(&mut self, _cpu: &mut Cpu) {}

    /// Called by the run loop whenever the cycle counter reaches the scheduled
    /// event. Boards that need another call later move `next_event` forward.
    fn process_events(&mut self, _cpu: &mut Cpu) {}

    /// Thumb `SWI #imm8`.
    fn swi16(&mut self, cpu: &mut Cpu, _immediate: u8) {
        cpu.raise_swi();
    }

    /// ARM `SWI #imm24`.
    fn swi32(&mut self, cpu: &mut Cpu, _immediate: u32) {
        cpu.raise_swi();
    }

    /// Opcode the core does not execute: undefined space or a coprocessor
    /// instruction with no coprocessor attached.
    fn hit_stub(&mut self, cpu: &mut Cpu, opcode: u32) {
        log::warn!("undefined opcode {:#010x} near {:#010x}", opcode, cpu.pc());
        cpu.raise_undefined();
    }
}
