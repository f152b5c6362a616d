//! Exception entry and exit.

use super::psr::{ExecutionMode, PrivilegeMode};
use super::{Cpu, LR, PC};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Exception {
    Reset,
    Undefined,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    Irq,
    Fiq,
}

impl Exception {
    pub const ALL: [Exception; 7] = [
        Exception::Reset,
        Exception::Undefined,
        Exception::SoftwareInterrupt,
        Exception::PrefetchAbort,
        Exception::DataAbort,
        Exception::Irq,
        Exception::Fiq,
    ];

    pub const fn vector(self) -> u32 {
        match self {
            Exception::Reset => 0x00,
            Exception::Undefined => 0x04,
            Exception::SoftwareInterrupt => 0x08,
            Exception::PrefetchAbort => 0x0C,
            Exception::DataAbort => 0x10,
            Exception::Irq => 0x18,
            Exception::Fiq => 0x1C,
        }
    }

    pub const fn target_mode(self) -> PrivilegeMode {
        match self {
            Exception::Reset | Exception::SoftwareInterrupt => PrivilegeMode::Supervisor,
            Exception::Undefined => PrivilegeMode::Undefined,
            Exception::PrefetchAbort | Exception::DataAbort => PrivilegeMode::Abort,
            Exception::Irq => PrivilegeMode::Irq,
            Exception::Fiq => PrivilegeMode::Fiq,
        }
    }

    /// IRQs are masked by every exception; FIQs only by Reset and FIQ.
    pub const fn masks_fiq(self) -> bool {
        matches!(self, Exception::Reset | Exception::Fiq)
    }

    /// Value written to the new mode's LR. `next` is the address of the next
    /// instruction to fetch and `width` the size of the current instruction.
    pub const fn link_value(self, next: u32, width: u32) -> u32 {
        match self {
            Exception::Reset | Exception::Undefined | Exception::SoftwareInterrupt => next,
            Exception::PrefetchAbort => next.wrapping_sub(width).wrapping_add(4),
            Exception::DataAbort => next.wrapping_sub(width).wrapping_add(8),
            Exception::Irq | Exception::Fiq => next.wrapping_add(4),
        }
    }
}

impl Cpu {
    /// Enters `exception`. Returns false when an IRQ or FIQ is masked, in
    /// which case nothing changes and the request is dropped.
    pub fn raise_exception(&mut self, exception: Exception) -> bool {
        let cpsr = self.cpsr;
        match exception {
            Exception::Irq if cpsr.irq_disabled() => return false,
            Exception::Fiq if cpsr.fiq_disabled() => return false,
            _ => {}
        }

        let link = exception.link_value(self.gprs[PC], self.execution_mode.instruction_width());
        self.switch_mode(exception.target_mode());
        self.gprs[LR] = link;
        self.spsr = cpsr;

        self.cpsr.set_execution_mode(ExecutionMode::Arm);
        self.execution_mode = ExecutionMode::Arm;
        self.cpsr.set_irq_disabled(true);
        if exception.masks_fiq() {
            self.cpsr.set_fiq_disabled(true);
        }
        self.write_pc(exception.vector());

        log::debug!(
            "{:?} from {:?}: lr={:#010x} cycle={}",
            exception, cpsr.mode(), link, self.absolute_cycles()
        );
        true
    }

    pub fn raise_irq(&mut self) -> bool {
        self.raise_exception(Exception::Irq)
    }

    pub fn raise_fiq(&mut self) -> bool {
        self.raise_exception(Exception::Fiq)
    }

    pub fn raise_swi(&mut self) {
        self.raise_exception(Exception::SoftwareInterrupt);
    }

    pub fn raise_undefined(&mut self) {
        self.raise_exception(Exception::Undefined);
    }

    /// Leaves the current exception mode: CPSR comes back from SPSR, the bank
    /// follows the restored mode and execution resumes at `address`. Outside
    /// an exception mode only the branch happens.
    pub fn return_from_exception(&mut self, address: u32) {
        if self.privilege_mode.has_spsr() {
            let saved = self.spsr;
            self.set_cpsr(saved);
        }
        self.write_pc(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::psr::Psr;

    fn user_cpu() -> Cpu {
        let mut cpu = Cpu::new();
        cpu.set_cpsr(Psr::new(0x6000_0010));
        cpu
    }

    #[test]
    fn vectors_and_modes() {
        let expected = [
            (0x00, PrivilegeMode::Supervisor),
            (0x04, PrivilegeMode::Undefined),
            (0x08, PrivilegeMode::Supervisor),
            (0x0C, PrivilegeMode::Abort),
            (0x10, PrivilegeMode::Abort),
            (0x18, PrivilegeMode::Irq),
            (0x1C, PrivilegeMode::Fiq),
        ];
        for (exception, (vector, mode)) in Exception::ALL.into_iter().zip(expected) {
            assert_eq!(exception.vector(), vector, "{exception:?}");
            assert_eq!(exception.target_mode(), mode, "{exception:?}");
        }
    }

    #[test]
    fn link_values_per_kind() {
        // Instruction at 0x100, so the next fetch is 0x104 (ARM) or 0x102 (Thumb).
        assert_eq!(Exception::SoftwareInterrupt.link_value(0x104, 4), 0x104);
        assert_eq!(Exception::SoftwareInterrupt.link_value(0x102, 2), 0x102);
        assert_eq!(Exception::Undefined.link_value(0x104, 4), 0x104);
        assert_eq!(Exception::PrefetchAbort.link_value(0x104, 4), 0x104);
        assert_eq!(Exception::PrefetchAbort.link_value(0x102, 2), 0x104);
        assert_eq!(Exception::DataAbort.link_value(0x104, 4), 0x108);
        assert_eq!(Exception::DataAbort.link_value(0x102, 2), 0x108);
        assert_eq!(Exception::Irq.link_value(0x104, 4), 0x108);
        assert_eq!(Exception::Fiq.link_value(0x102, 2), 0x106);
    }

    #[test]
    fn swi_from_user_enters_supervisor() {
        let mut cpu = user_cpu();
        cpu.set_pc(0x0800_0104);
        let before = cpu.cpsr();

        cpu.raise_swi();
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::Supervisor);
        assert_eq!(cpu.cpsr().mode(), PrivilegeMode::Supervisor);
        assert_eq!(cpu.pc(), 0x0000_0008);
        assert_eq!(cpu.read_reg(LR), 0x0800_0104);
        assert_eq!(cpu.spsr(), Some(before));
        assert!(cpu.cpsr().irq_disabled());
        assert!(!cpu.cpsr().fiq_disabled());
        assert!(cpu.cpsr().z() && cpu.cpsr().c());
    }

    #[test]
    fn masked_interrupts_are_dropped() {
        let mut cpu = user_cpu();
        let mut cpsr = cpu.cpsr();
        cpsr.set_irq_disabled(true);
        cpsr.set_fiq_disabled(true);
        cpu.set_cpsr(cpsr);
        cpu.set_pc(0x200);

        cpu.write_reg(0, 0x1234);
        let before = cpu.snapshot();

        assert!(!cpu.raise_irq());
        assert!(!cpu.raise_fiq());
        assert_eq!(cpu.snapshot(), before);
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::User);
    }

    #[test]
    fn every_exception_enters_arm_state_at_its_vector() {
        for exception in Exception::ALL {
            let mut cpu = user_cpu();
            cpu.set_execution_mode(ExecutionMode::Thumb);
            cpu.set_pc(0x0300_0102);
            let before = cpu.cpsr();

            assert!(cpu.raise_exception(exception), "{exception:?}");
            let mode = exception.target_mode();
            assert_eq!(cpu.privilege_mode(), mode, "{exception:?}");
            assert_eq!(cpu.cpsr().mode(), mode, "{exception:?}");
            assert_eq!(cpu.pc(), exception.vector(), "{exception:?}");
            assert_eq!(cpu.execution_mode(), ExecutionMode::Arm, "{exception:?}");
            assert!(!cpu.cpsr().t(), "{exception:?}");
            assert_eq!(cpu.read_reg(LR), exception.link_value(0x0300_0102, 2), "{exception:?}");
            assert_eq!(cpu.spsr(), Some(before), "{exception:?}");
            assert!(cpu.cpsr().irq_disabled(), "{exception:?}");
            assert_eq!(
                cpu.cpsr().fiq_disabled(),
                matches!(exception, Exception::Reset | Exception::Fiq),
                "{exception:?}"
            );
        }
    }

    #[test]
    fn fiq_masks_both_and_leaves_thumb() {
        let mut cpu = user_cpu();
        cpu.set_execution_mode(ExecutionMode::Thumb);
        cpu.set_pc(0x0300_0002);
        cpu.write_reg(8, 0x88);

        assert!(cpu.raise_fiq());
        assert_eq!(cpu.execution_mode(), ExecutionMode::Arm);
        assert!(!cpu.cpsr().t());
        assert!(cpu.cpsr().irq_disabled() && cpu.cpsr().fiq_disabled());
        assert_eq!(cpu.pc(), 0x1C);
        assert_eq!(cpu.read_reg(LR), 0x0300_0006);
        assert_eq!(cpu.read_reg(8), 0);
        assert!(cpu.spsr().is_some_and(|s| s.t()));
    }

    #[test]
    fn irq_round_trip_restores_state() {
        let mut cpu = user_cpu();
        cpu.write_reg(13, 0x0300_7F00);
        cpu.set_pc(0x0800_0040);
        let before = cpu.cpsr();

        assert!(cpu.raise_irq());
        cpu.write_reg(13, 0x0300_7FA0);
        let lr = cpu.read_reg(LR);
        cpu.return_from_exception(lr.wrapping_sub(4));

        assert_eq!(cpu.cpsr(), before);
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::User);
        assert_eq!(cpu.read_reg(13), 0x0300_7F00);
        assert_eq!(cpu.pc(), 0x0800_0040);
        assert_eq!(cpu.banked_register(PrivilegeMode::Irq, 13), Some(0x0300_7FA0));
    }

    #[test]
    fn return_outside_exception_mode_only_branches() {
        let mut cpu = user_cpu();
        let before = cpu.cpsr();
        cpu.return_from_exception(0x400);
        assert_eq!(cpu.cpsr(), before);
        assert_eq!(cpu.pc(), 0x400);
    }
}
