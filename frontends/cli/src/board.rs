//! Board used by the runner: a periodic timer interrupt and high-level
//! emulation of the few BIOS calls that bare programs tend to lean on.

use std::cell::Cell;
use std::rc::Rc;

use arm_core::{Board, Cpu};

const SWI_HALT: u32 = 0x02;
const SWI_STOP: u32 = 0x03;
const SWI_DIV: u32 = 0x06;
const SWI_DIV_ARM: u32 = 0x07;
const SWI_SQRT: u32 = 0x08;

/// With the timer off the board still wakes this often to drain the counter.
const IDLE_PERIOD: i32 = 1 << 24;

/// Counters shared between the board (owned by the CPU) and the runner.
#[derive(Debug, Default)]
pub struct BoardStatus {
    pub halted: Cell<bool>,
    pub timer_irqs: Cell<u64>,
    pub hle_calls: Cell<u64>,
    pub stub_hits: Cell<u64>,
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

pub struct HostBoard {
    timer_period: i32,
    status: Rc<BoardStatus>,
}

impl HostBoard {
    pub fn new(timer_period: i32) -> Self {
        Self { timer_period, status: Rc::default() }
    }

    pub fn status(&self) -> Rc<BoardStatus> {
        Rc::clone(&self.status)
    }

    fn schedule(&self, cpu: &mut Cpu) {
        let next = if self.timer_period > 0 { self.timer_period } else { IDLE_PERIOD };
        cpu.set_next_event(next);
    }

    fn bios_call(&mut self, cpu: &mut Cpu, number: u32) {
        let (r0, r1) = (cpu.read_reg(0), cpu.read_reg(1));
        match number {
            SWI_HALT | SWI_STOP => {
                log::info!("program halted at {:#010x}", cpu.pc());
                self.status.halted.set(true);
            }
            SWI_DIV => divide(cpu, r0, r1),
            SWI_DIV_ARM => divide(cpu, r1, r0),
            SWI_SQRT => cpu.write_reg(0, r0.isqrt()),
            _ => {
                log::debug!("swi {number:#04x} goes to the vector");
                cpu.raise_swi();
                return;
            }
        }
        bump(&self.status.hle_calls);
    }
}

/// BIOS Div: r0 = quotient, r1 = remainder, r3 = |quotient|.
fn divide(cpu: &mut Cpu, numerator: u32, denominator: u32) {
    let (n, d) = (numerator as i32, denominator as i32);
    if d == 0 {
        log::warn!("division by zero at {:#010x}", cpu.pc());
        return;
    }
    let quotient = n.wrapping_div(d);
    cpu.write_reg(0, quotient as u32);
    cpu.write_reg(1, n.wrapping_rem(d) as u32);
    cpu.write_reg(3, quotient.unsigned_abs());
}

impl Board for HostBoard {
    fn reset(&mut self, cpu: &mut Cpu) {
        log::info!("board reset, timer period {}", self.timer_period);
        self.status.halted.set(false);
        self.schedule(cpu);
    }

    fn process_events(&mut self, cpu: &mut Cpu) {
        // Keep the overshoot so ticks do not drift.
        let overshoot = cpu.take_cycles() - cpu.next_event();
        cpu.add_cycles(overshoot.max(0));
        self.schedule(cpu);
        if self.timer_period <= 0 {
            return;
        }
        if cpu.raise_irq() {
            bump(&self.status.timer_irqs);
        } else {
            log::trace!("timer irq masked");
        }
    }

    fn swi16(&mut self, cpu: &mut Cpu, immediate: u8) {
        self.bios_call(cpu, immediate as u32);
    }

    fn swi32(&mut self, cpu: &mut Cpu, immediate: u32) {
        self.bios_call(cpu, immediate >> 16);
    }

    fn hit_stub(&mut self, cpu: &mut Cpu, opcode: u32) {
        bump(&self.status.stub_hits);
        log::warn!("stub opcode {:#010x} at {:#010x}", opcode, cpu.pc());
        cpu.raise_undefined();
    }
}
