use std::fmt;

use crate::board::Board;
use crate::bus::MemoryBus;

pub mod alu;
mod arm;
pub mod bank;
pub mod exception;
pub mod psr;
pub mod snapshot;
mod thumb;

pub use bank::{BankedRegisters, RegisterBank};
pub use exception::Exception;
pub use psr::{ExecutionMode, PrivilegeMode, Psr, PsrFields};
pub use snapshot::CpuSnapshot;

pub const SP: usize = 13;
pub const LR: usize = 14;
pub const PC: usize = 15;

/// Past this the relative counter is rebased against `next_event`.
const REBASE_THRESHOLD: i32 = 1 << 30;

/// Warm-boot register values applied by [`Cpu::reset`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct ResetConfig {
    pub entry_point: u32,
    pub sp_sys: u32,
    pub sp_irq: u32,
    pub sp_svc: u32,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            entry_point: 0x0000_0000,
            sp_sys: 0x0300_7F00,
            sp_irq: 0x0300_7FA0,
            sp_svc: 0x0300_7FE0,
        }
    }
}

pub struct Cpu {
    // r15 holds the address of the next fetch.
    gprs: [u32; 16],
    cpsr: Psr,
    spsr: Psr,
    banked: BankedRegisters,

    cycles: i32,
    next_event: i32,
    absolute_cycles: u64,
    last_cycles: i32,
    // Relative counter at the start of the current step.
    step_start: i32,

    shifter_operand: u32,
    shifter_carry_out: bool,

    // Mirrors of the CPSR fields.
    execution_mode: ExecutionMode,
    privilege_mode: PrivilegeMode,

    // Next fetch must go through the bus instead of the active window.
    refill: bool,
    reset_config: ResetConfig,

    memory: Option<Box<dyn MemoryBus>>,
    board: Option<Box<dyn Board>>,
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("gprs", &format_args!("{:08x?}", self.gprs))
            .field("cpsr", &self.cpsr)
            .field("spsr", &self.spsr)
            .field("cycles", &self.cycles)
            .field("next_event", &self.next_event)
            .field("absolute_cycles", &self.absolute_cycles)
            .finish_non_exhaustive()
    }
}

impl Default for Cpu {
    fn default() -> Self { Self::new() }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            gprs: [0; 16],
            cpsr: Psr::new(PrivilegeMode::User.bits()),
            spsr: Psr::default(),
            banked: BankedRegisters::new(),
            cycles: 0,
            next_event: 0,
            absolute_cycles: 0,
            last_cycles: 0,
            step_start: 0,
            shifter_operand: 0,
            shifter_carry_out: false,
            execution_mode: ExecutionMode::Arm,
            privilege_mode: PrivilegeMode::User,
            refill: true,
            reset_config: ResetConfig::default(),
            memory: None,
            board: None,
        }
    }

    pub fn reset_config(&self) -> ResetConfig { self.reset_config }
    pub fn set_reset_config(&mut self, config: ResetConfig) { self.reset_config = config; }

    /// Attaches `memory`, handing back whatever bus was attached before.
    pub fn associate_memory(&mut self, memory: Box<dyn MemoryBus>) -> Option<Box<dyn MemoryBus>> {
        self.refill = true;
        self.memory.replace(memory)
    }

    pub fn detach_memory(&mut self) -> Option<Box<dyn MemoryBus>> {
        self.memory.take()
    }

    pub fn associate_board(&mut self, board: Box<dyn Board>) -> Option<Box<dyn Board>> {
        self.board.replace(board)
    }

    pub fn detach_board(&mut self) -> Option<Box<dyn Board>> {
        self.board.take()
    }

    pub fn memory(&self) -> Option<&(dyn MemoryBus + 'static)> {
        self.memory.as_deref()
    }

    pub fn memory_mut(&mut self) -> Option<&mut (dyn MemoryBus + 'static)> {
        self.memory.as_deref_mut()
    }

    /// Warm boot: every register cleared, each boot-time stack pointer set in
    /// its own mode, then System mode in ARM state with interrupts enabled.
    pub fn reset(&mut self) {
        let config = self.reset_config;

        self.gprs = [0; 16];
        self.banked = BankedRegisters::new();
        self.spsr = Psr::default();
        self.cpsr = Psr::default();
        self.cpsr.set_mode(PrivilegeMode::Supervisor);
        self.cpsr.set_irq_disabled(true);
        self.cpsr.set_fiq_disabled(true);
        self.privilege_mode = PrivilegeMode::Supervisor;
        self.execution_mode = ExecutionMode::Arm;
        self.gprs[SP] = config.sp_svc;

        self.switch_mode(PrivilegeMode::Irq);
        self.gprs[SP] = config.sp_irq;

        self.switch_mode(PrivilegeMode::System);
        self.gprs[SP] = config.sp_sys;
        self.cpsr.set_irq_disabled(false);
        self.cpsr.set_fiq_disabled(false);

        self.cycles = 0;
        self.next_event = 0;
        self.absolute_cycles = 0;
        self.last_cycles = 0;
        self.shifter_operand = 0;
        self.shifter_carry_out = false;
        self.write_pc(config.entry_point);

        log::info!("cpu reset: entry={:#010x} sp={:#010x}", config.entry_point, config.sp_sys);

        self.with_board(|board, cpu| board.reset(cpu));
    }

    pub fn privilege_mode(&self) -> PrivilegeMode { self.privilege_mode }
    pub fn execution_mode(&self) -> ExecutionMode { self.execution_mode }

    /// Forces a mode change, swapping register banks. Flags, state and masks
    /// are left alone.
    pub fn set_privilege_mode(&mut self, mode: PrivilegeMode) {
        self.switch_mode(mode);
    }

    fn switch_mode(&mut self, mode: PrivilegeMode) {
        let from = RegisterBank::for_mode(self.privilege_mode);
        let to = RegisterBank::for_mode(mode);
        self.banked.exchange(&mut self.gprs, &mut self.spsr, from, to);

        #[cfg(feature = "trace_cpu")]
        log::trace!(target: "cpu", "mode {:?} -> {:?}", self.privilege_mode, mode);

        self.privilege_mode = mode;
        self.cpsr.set_mode(mode);
    }

    pub fn cpsr(&self) -> Psr { self.cpsr }

    /// Replaces the CPSR, switching banks if the mode field changes. The raw
    /// value is kept as written.
    pub fn set_cpsr(&mut self, value: Psr) {
        if PrivilegeMode::try_from(value.mode_bits()).is_err() {
            log::warn!("reserved mode bits {:#04x}, running as User", value.mode_bits());
        }
        self.switch_mode(value.mode());
        self.cpsr = value;
        self.execution_mode = value.execution_mode();
    }

    /// Takes effect at the next fetch.
    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.cpsr.set_execution_mode(mode);
        self.execution_mode = mode;
    }

    /// Saved status of the current mode; `None` in User and System.
    pub fn spsr(&self) -> Option<Psr> {
        self.privilege_mode.has_spsr().then_some(self.spsr)
    }

    pub fn set_spsr(&mut self, value: Psr) {
        if self.privilege_mode.has_spsr() {
            self.spsr = value;
        }
    }

    pub fn read_reg(&self, index: usize) -> u32 { self.gprs[index] }

    pub fn write_reg(&mut self, index: usize, value: u32) {
        if index == PC {
            self.write_pc(value);
        } else {
            self.gprs[index] = value;
        }
    }

    pub fn registers(&self) -> &[u32; 16] { &self.gprs }

    pub fn pc(&self) -> u32 { self.gprs[PC] }
    pub fn set_pc(&mut self, value: u32) { self.write_pc(value); }

    fn write_pc(&mut self, value: u32) {
        let align = self.execution_mode.instruction_width() - 1;
        self.gprs[PC] = value & !align;
        self.refill = true;
    }

    /// Value of `reg` as seen by `mode`, whether or not its bank is live.
    /// `None` when `reg` is not banked for that mode.
    pub fn banked_register(&self, mode: PrivilegeMode, reg: usize) -> Option<u32> {
        let bank = RegisterBank::for_mode(mode);
        if !bank.banks(reg) {
            return None;
        }
        let current = RegisterBank::for_mode(self.privilege_mode);
        let live = match reg {
            8..=12 => current.high_bank() == bank,
            _ => current == bank,
        };
        if live { Some(self.gprs[reg]) } else { self.banked.register(bank, reg) }
    }

    pub fn cycles(&self) -> i32 { self.cycles }
    pub fn next_event(&self) -> i32 { self.next_event }
    pub fn set_next_event(&mut self, cycles: i32) { self.next_event = cycles; }
    pub fn absolute_cycles(&self) -> u64 { self.absolute_cycles }

    /// Cycles charged by the most recent step.
    pub fn last_cycles(&self) -> i32 { self.last_cycles }

    /// Charges cycles spent outside the bus, such as an emulated BIOS call.
    /// Inside a step they also reach the absolute counter.
    pub fn add_cycles(&mut self, cycles: i32) {
        self.cycles = self.cycles.saturating_add(cycles);
    }

    /// Hands the relative counter to the board and restarts it from zero.
    /// Cycles taken mid-step still count towards the absolute counter.
    pub fn take_cycles(&mut self) -> i32 {
        let taken = std::mem::take(&mut self.cycles);
        self.step_start = self.step_start.wrapping_sub(taken);
        taken
    }

    /// Keeps the relative counter in range when no board drains it. The
    /// distance to `next_event` is preserved; `i32::MAX` stays "never".
    fn rebase_cycles(&mut self) {
        if self.cycles < REBASE_THRESHOLD {
            return;
        }
        if self.next_event != i32::MAX {
            self.next_event = self.next_event.saturating_sub(self.cycles);
        }
        self.cycles = 0;
    }

    pub fn shifter_operand(&self) -> u32 { self.shifter_operand }
    pub fn shifter_carry_out(&self) -> bool { self.shifter_carry_out }

    /// Executes one instruction. Without a bus nothing happens.
    pub fn step(&mut self) {
        self.rebase_cycles();
        self.step_start = self.cycles;
        #[cfg(feature = "trace_cpu")]
        let address = self.gprs[PC];
        let Some(opcode) = self.fetch() else {
            return;
        };

        #[cfg(feature = "trace_cpu")]
        log::trace!(target: "cpu", "[{}] {:#010x}: {:08x}", self.absolute_cycles, address, opcode);

        match self.execution_mode {
            ExecutionMode::Arm => self.execute_arm(opcode),
            ExecutionMode::Thumb => self.execute_thumb(opcode as u16),
        }

        let spent = self.cycles.wrapping_sub(self.step_start);
        self.last_cycles = spent;
        self.absolute_cycles += spent.max(0) as u64;
    }

    /// One step, then the board's event hook once the counter reaches the
    /// scheduled event.
    pub fn run(&mut self) {
        if self.memory.is_none() {
            log::warn!("run called with no memory bus attached");
            return;
        }
        self.step();
        if self.cycles >= self.next_event {
            self.process_events();
        }
    }

    /// Runs until at least `cycles` more cycles have elapsed. Returns the
    /// number actually elapsed, which falls short only if a step stalls.
    pub fn run_for(&mut self, cycles: u64) -> u64 {
        let start = self.absolute_cycles;
        while self.absolute_cycles - start < cycles {
            let before = self.absolute_cycles;
            self.run();
            if self.absolute_cycles == before {
                break;
            }
        }
        self.absolute_cycles - start
    }

    pub fn process_events(&mut self) {
        self.with_board(|board, cpu| board.process_events(cpu));
    }

    /// Lends the board to `f` together with the CPU. A board replaced from
    /// inside `f` wins over the one lent out.
    fn with_board<R>(&mut self, f: impl FnOnce(&mut dyn Board, &mut Cpu) -> R) -> Option<R> {
        let mut board = self.board.take()?;
        let result = f(board.as_mut(), self);
        if self.board.is_none() {
            self.board = Some(board);
        }
        Some(result)
    }

    fn swi16(&mut self, immediate: u8) {
        if self.with_board(|board, cpu| board.swi16(cpu, immediate)).is_none() {
            self.raise_swi();
        }
    }

    fn swi32(&mut self, immediate: u32) {
        if self.with_board(|board, cpu| board.swi32(cpu, immediate)).is_none() {
            self.raise_swi();
        }
    }

    fn hit_stub(&mut self, opcode: u32) {
        if self.with_board(|board, cpu| board.hit_stub(cpu, opcode)).is_none() {
            self.raise_undefined();
        }
    }

    fn fetch(&mut self) -> Option<u32> {
        let address = self.gprs[PC];
        let width = self.execution_mode.instruction_width();
        let memory = self.memory.as_deref_mut()?;

        if !memory.active_region().contains(address) {
            memory.set_active_region(address);
            self.refill = true;
        }

        let mut opcode = None;
        if !self.refill {
            let region = memory.active_region();
            opcode = region.read(memory.active_memory(), address, width);
            if opcode.is_some() {
                self.cycles += match width {
                    4 => region.prefetch_cycles32,
                    _ => region.prefetch_cycles16,
                };
            }
        }
        let opcode = match opcode {
            Some(opcode) => opcode,
            None if width == 4 => memory.load32(address, &mut self.cycles),
            None => memory.load_u16(address, &mut self.cycles) as u32,
        };

        self.refill = false;
        self.gprs[PC] = address.wrapping_add(width);
        Some(opcode)
    }

    /// Register value as an operand: PC reads two instructions ahead.
    fn operand(&self, reg: usize) -> u32 {
        if reg == PC {
            self.gprs[PC].wrapping_add(self.execution_mode.instruction_width())
        } else {
            self.gprs[reg]
        }
    }

    fn load32(&mut self, address: u32) -> u32 {
        match self.memory.as_deref_mut() {
            Some(memory) => memory.load32(address, &mut self.cycles),
            None => 0,
        }
    }

    fn load_u16(&mut self, address: u32) -> u16 {
        match self.memory.as_deref_mut() {
            Some(memory) => memory.load_u16(address, &mut self.cycles),
            None => 0,
        }
    }

    fn load16(&mut self, address: u32) -> i16 {
        match self.memory.as_deref_mut() {
            Some(memory) => memory.load16(address, &mut self.cycles),
            None => 0,
        }
    }

    fn load_u8(&mut self, address: u32) -> u8 {
        match self.memory.as_deref_mut() {
            Some(memory) => memory.load_u8(address, &mut self.cycles),
            None => 0,
        }
    }

    fn load8(&mut self, address: u32) -> i8 {
        match self.memory.as_deref_mut() {
            Some(memory) => memory.load8(address, &mut self.cycles),
            None => 0,
        }
    }

    fn store32(&mut self, address: u32, value: u32) {
        if let Some(memory) = self.memory.as_deref_mut() {
            memory.store32(address, value, &mut self.cycles);
        }
    }

    fn store16(&mut self, address: u32, value: u16) {
        if let Some(memory) = self.memory.as_deref_mut() {
            memory.store16(address, value, &mut self.cycles);
        }
    }

    fn store8(&mut self, address: u32, value: u8) {
        if let Some(memory) = self.memory.as_deref_mut() {
            memory.store8(address, value, &mut self.cycles);
        }
    }

    /// Charges a burst of `count` words at `start`. The accesses that follow
    /// go through `burst_load32`/`burst_store32`, which charge nothing.
    fn charge_burst(&mut self, start: u32, count: u32) {
        if let Some(memory) = self.memory.as_deref_mut() {
            self.cycles += memory.wait_multiple(start, count);
        }
    }

    fn burst_load32(&mut self, address: u32) -> u32 {
        let mut discard = 0;
        match self.memory.as_deref_mut() {
            Some(memory) => memory.load32(address, &mut discard),
            None => 0,
        }
    }

    fn burst_store32(&mut self, address: u32, value: u32) {
        let mut discard = 0;
        if let Some(memory) = self.memory.as_deref_mut() {
            memory.store32(address, value, &mut discard);
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::testing::*;
    use super::*;

    const MODES: [PrivilegeMode; 7] = PrivilegeMode::ALL;

    fn fill_visible(cpu: &mut Cpu, tag: u32) {
        for reg in 0..15 {
            cpu.write_reg(reg, tag << 8 | reg as u32);
        }
        cpu.set_spsr(Psr::new(tag << 24 | 0x1F));
    }

    #[test]
    fn switching_away_and_back_restores_banked_state() {
        for a in MODES.into_iter().filter(|m| m.has_spsr()) {
            for b in MODES.into_iter().filter(|&m| m != a) {
                let mut cpu = Cpu::new();
                cpu.set_privilege_mode(a);
                fill_visible(&mut cpu, 0xA);
                let saved_regs = *cpu.registers();
                let saved_spsr = cpu.spsr();

                cpu.set_privilege_mode(b);
                fill_visible(&mut cpu, 0xB);
                cpu.set_privilege_mode(a);

                let bank = RegisterBank::for_mode(a);
                for reg in 8..15 {
                    if bank.banks(reg) {
                        assert_eq!(cpu.read_reg(reg), saved_regs[reg], "{a:?}->{b:?} r{reg}");
                    }
                }
                assert_eq!(cpu.spsr(), saved_spsr, "{a:?}->{b:?}");
                assert_eq!(cpu.cpsr().mode(), a);
            }
        }
    }

    #[test]
    fn user_and_system_share_storage() {
        let mut cpu = Cpu::new();
        cpu.write_reg(SP, 0x1234);
        cpu.set_privilege_mode(PrivilegeMode::System);
        assert_eq!(cpu.read_reg(SP), 0x1234);
        assert_eq!(cpu.spsr(), None);
        cpu.set_privilege_mode(PrivilegeMode::System);
        assert_eq!(cpu.cpsr().mode(), PrivilegeMode::System);
    }

    #[test]
    fn banked_register_reads_live_and_parked_copies() {
        let mut cpu = Cpu::new();
        cpu.write_reg(8, 0x88);
        cpu.write_reg(SP, 0x100);
        cpu.set_privilege_mode(PrivilegeMode::Fiq);
        cpu.write_reg(8, 0xF8);
        assert_eq!(cpu.banked_register(PrivilegeMode::User, 8), Some(0x88));
        assert_eq!(cpu.banked_register(PrivilegeMode::Fiq, 8), Some(0xF8));
        assert_eq!(cpu.banked_register(PrivilegeMode::System, SP), Some(0x100));
        assert_eq!(cpu.banked_register(PrivilegeMode::Irq, 8), None);

        cpu.set_privilege_mode(PrivilegeMode::Irq);
        assert_eq!(cpu.banked_register(PrivilegeMode::User, 8), Some(0x88));
        assert_eq!(cpu.read_reg(8), 0x88);
    }

    #[test]
    fn reset_applies_warm_boot_state() {
        let mut cpu = Cpu::new();
        cpu.set_reset_config(ResetConfig { entry_point: 0x0800_0000, ..ResetConfig::default() });
        cpu.write_reg(3, 7);
        cpu.add_cycles(50);
        cpu.set_next_event(99);
        cpu.reset();

        assert_eq!(cpu.privilege_mode(), PrivilegeMode::System);
        assert_eq!(cpu.execution_mode(), ExecutionMode::Arm);
        assert!(!cpu.cpsr().irq_disabled() && !cpu.cpsr().fiq_disabled());
        assert_eq!(cpu.pc(), 0x0800_0000);
        assert_eq!(cpu.read_reg(3), 0);
        assert_eq!(cpu.read_reg(SP), 0x0300_7F00);
        assert_eq!(cpu.banked_register(PrivilegeMode::Irq, SP), Some(0x0300_7FA0));
        assert_eq!(cpu.banked_register(PrivilegeMode::Supervisor, SP), Some(0x0300_7FE0));
        assert_eq!(cpu.cycles(), 0);
        assert_eq!(cpu.absolute_cycles(), 0);
        assert_eq!(cpu.next_event(), 0);
    }

    #[test]
    fn narrow_to_wide_switch_fetches_a_full_word() {
        // mov r0, #0x1000 at 0x1000 when read as one word; a Thumb fetch at
        // 0x1002 would see only the upper half.
        let mut cpu = arm_cpu(&[]);
        write32(&mut cpu, 0x1000, 0xE3A0_0A01);
        cpu.set_execution_mode(ExecutionMode::Thumb);
        cpu.set_pc(0x1000);

        cpu.set_execution_mode(ExecutionMode::Arm);
        cpu.step();
        assert_eq!(cpu.read_reg(0), 0x1000);
        assert_eq!(cpu.pc(), 0x1004);
    }

    #[test]
    fn fetch_after_branch_goes_through_the_bus() {
        // mov r0, #1 ; mov r1, #2
        let mut cpu = arm_cpu(&[0xE3A0_0001, 0xE3A0_1002]);
        cpu.step();
        assert_eq!(cpu.last_cycles(), LOAD_COST);
        cpu.step();
        assert_eq!(cpu.last_cycles(), PREFETCH_COST);
        assert_eq!(cpu.absolute_cycles(), (LOAD_COST + PREFETCH_COST) as u64);
        assert_eq!(cpu.cycles(), LOAD_COST + PREFETCH_COST);
        assert_eq!(cpu.read_reg(1), 2);
    }

    #[test]
    fn step_without_bus_does_nothing() {
        let mut cpu = Cpu::new();
        cpu.set_pc(0x40);
        cpu.step();
        cpu.run();
        assert_eq!(cpu.pc(), 0x40);
        assert_eq!(cpu.run_for(100), 0);
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<i32>,
        resets: usize,
        swis: Vec<u32>,
        stubs: Vec<u32>,
    }

    struct RecordingBoard(Rc<RefCell<Recorder>>);

    impl Board for RecordingBoard {
        fn reset(&mut self, _cpu: &mut Cpu) {
            self.0.borrow_mut().resets += 1;
        }
        fn process_events(&mut self, cpu: &mut Cpu) {
            let taken = cpu.take_cycles();
            self.0.borrow_mut().events.push(taken);
            cpu.set_next_event(8);
        }
        fn swi32(&mut self, _cpu: &mut Cpu, immediate: u32) {
            self.0.borrow_mut().swis.push(immediate);
        }
        fn hit_stub(&mut self, _cpu: &mut Cpu, opcode: u32) {
            self.0.borrow_mut().stubs.push(opcode);
        }
    }

    fn recorded_cpu(program: &[u32]) -> (Cpu, Rc<RefCell<Recorder>>) {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut cpu = arm_cpu(program);
        cpu.associate_board(Box::new(RecordingBoard(recorder.clone())));
        cpu.reset();
        (cpu, recorder)
    }

    #[test]
    fn events_fire_once_the_counter_reaches_next_event() {
        let (mut cpu, recorder) = recorded_cpu(&[0xE1A0_0000; 16]);
        assert_eq!(recorder.borrow().resets, 1);

        // First step reaches next_event = 0 straight away.
        cpu.run();
        assert_eq!(recorder.borrow().events, [LOAD_COST]);
        assert_eq!(cpu.cycles(), 0);

        for _ in 0..7 {
            cpu.run();
        }
        assert_eq!(recorder.borrow().events, [LOAD_COST]);
        cpu.run();
        assert_eq!(recorder.borrow().events, [LOAD_COST, 8]);
        assert_eq!(cpu.absolute_cycles(), (LOAD_COST + 8) as u64);
    }

    #[test]
    fn run_for_covers_the_requested_cycles() {
        let mut cpu = arm_cpu(&[0xE1A0_0000; 64]);
        let elapsed = cpu.run_for(20);
        assert!(elapsed >= 20);
        assert_eq!(cpu.absolute_cycles(), elapsed);
        assert_eq!(cpu.pc(), 4 * (elapsed as u32 - LOAD_COST as u32 + 1));
    }

    #[test]
    fn swi_and_traps_reach_the_board() {
        // swi #0x060000 ; undefined-space opcode
        let (mut cpu, recorder) = recorded_cpu(&[0xEF06_0000, 0xE7F0_00F0]);
        cpu.step();
        cpu.step();
        assert_eq!(recorder.borrow().swis, [0x06_0000]);
        assert_eq!(recorder.borrow().stubs, [0xE7F0_00F0]);
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::System);
    }

    #[test]
    fn without_board_swi_and_traps_take_their_vectors() {
        let mut cpu = arm_cpu(&[0xEF00_0001]);
        cpu.step();
        assert_eq!(cpu.pc(), 0x08);
        assert_eq!(cpu.read_reg(LR), 0x04);
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::Supervisor);

        let mut cpu = arm_cpu(&[0xE7F0_00F0]);
        cpu.step();
        assert_eq!(cpu.pc(), 0x04);
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::Undefined);
    }

    #[test]
    fn reassociating_returns_previous_collaborators() {
        let mut cpu = Cpu::new();
        assert!(cpu.associate_memory(Box::new(FlatBus::new())).is_none());
        assert!(cpu.associate_memory(Box::new(FlatBus::new())).is_some());
        assert!(cpu.memory().is_some());
        assert!(cpu.detach_memory().is_some());
        assert!(cpu.memory().is_none());

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        assert!(cpu.associate_board(Box::new(RecordingBoard(recorder))).is_none());
        assert!(cpu.detach_board().is_some());
    }

    struct QuietBoard;

    impl Board for QuietBoard {}

    #[test]
    fn counter_stays_in_range_when_nothing_drains_it() {
        // b .
        let mut cpu = arm_cpu(&[0xEAFF_FFFE]);
        cpu.associate_board(Box::new(QuietBoard));
        cpu.add_cycles(i32::MAX - 1);
        cpu.add_cycles(10);
        assert_eq!(cpu.cycles(), i32::MAX);

        cpu.run();
        cpu.run();
        assert_eq!(cpu.cycles() as u64, cpu.absolute_cycles());
        assert!(cpu.next_event() < 0);

        cpu.detach_board();
        cpu.set_next_event(i32::MAX);
        cpu.add_cycles(i32::MAX);
        cpu.run();
        assert_eq!(cpu.next_event(), i32::MAX);
        assert!(cpu.cycles() < REBASE_THRESHOLD);
    }

    struct DrainingBoard;

    impl Board for DrainingBoard {
        fn swi32(&mut self, cpu: &mut Cpu, _immediate: u32) {
            cpu.take_cycles();
            cpu.add_cycles(3);
        }
    }

    #[test]
    fn cycles_taken_inside_a_step_still_count() {
        let mut cpu = arm_cpu(&[0xEF00_0001]);
        cpu.associate_board(Box::new(DrainingBoard));
        cpu.step();
        assert_eq!(cpu.cycles(), 3);
        assert_eq!(cpu.last_cycles(), LOAD_COST + 3);
        assert_eq!(cpu.absolute_cycles(), (LOAD_COST + 3) as u64);
    }
}
