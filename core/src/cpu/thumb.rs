//! 16-bit instruction set.

use super::alu::{self, ShiftKind};
use super::psr::ExecutionMode;
use super::{Cpu, LR, PC, SP};

impl Cpu {
    pub(super) fn execute_thumb(&mut self, instr: u16) {
        let instr = instr as u32;
        match instr >> 13 {
            0b000 if (instr >> 11) & 0x3 == 0x3 => self.execute_thumb_add_subtract(instr),
            0b000 => self.execute_thumb_move_shifted_register(instr),
            0b001 => self.execute_thumb_move_compare_add_subtract_immediate(instr),
            0b010 => match (instr >> 10) & 0x7 {
                0b000 => self.execute_thumb_alu_operations(instr),
                0b001 => self.execute_thumb_hi_register_operations_branch_exchange(instr),
                0b010 | 0b011 => self.execute_thumb_pc_relative_load(instr),
                _ if instr & 0x0200 == 0 => self.execute_thumb_load_store_register_offset(instr),
                _ => self.execute_thumb_load_store_sign_extended(instr),
            },
            0b011 => self.execute_thumb_load_store_immediate_offset(instr),
            0b100 if instr & 0x1000 == 0 => self.execute_thumb_load_store_halfword(instr),
            0b100 => self.execute_thumb_sp_relative_load_store(instr),
            0b101 if instr & 0x1000 == 0 => self.execute_thumb_load_address(instr),
            0b101 if instr & 0x0F00 == 0 => self.execute_thumb_add_offset_to_sp(instr),
            0b101 if instr & 0x0600 == 0x0400 => self.execute_thumb_push_pop_registers(instr),
            0b110 if instr & 0x1000 == 0 => self.execute_thumb_multiple_load_store(instr),
            0b110 => match (instr >> 8) & 0xF {
                0xF => self.swi16(instr as u8),
                0xE => self.hit_stub(instr),
                _ => self.execute_thumb_conditional_branch(instr),
            },
            0b111 => match (instr >> 11) & 0x3 {
                0 => self.execute_thumb_unconditional_branch(instr),
                1 => self.hit_stub(instr),
                _ => self.execute_thumb_long_branch_with_link(instr),
            },
            _ => self.hit_stub(instr),
        }
    }

    fn set_arithmetic_flags(&mut self, (result, carry, overflow): (u32, bool, bool)) -> u32 {
        self.cpsr.set_nz(result);
        self.cpsr.set_c(carry);
        self.cpsr.set_v(overflow);
        result
    }

    fn set_shift_flags(&mut self, (result, carry): (u32, bool)) -> u32 {
        self.cpsr.set_nz(result);
        self.cpsr.set_c(carry);
        result
    }

    fn execute_thumb_move_shifted_register(&mut self, instr: u32) {
        let kind = ShiftKind::from_bits(instr >> 11);
        let offset5 = (instr >> 6) & 0x1F;
        let rs = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;

        let shifted = alu::barrel_shift(kind, self.gprs[rs], offset5, self.cpsr.c(), true);
        self.gprs[rd] = self.set_shift_flags(shifted);
    }

    fn execute_thumb_add_subtract(&mut self, instr: u32) {
        let immediate = (instr >> 10) & 1 != 0;
        let subtract = (instr >> 9) & 1 != 0;
        let rn = (instr >> 6) & 0x7;
        let rs = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;

        let a = self.gprs[rs];
        let b = if immediate { rn } else { self.gprs[rn as usize] };
        let sum = if subtract { alu::sub_with_carry(a, b, true) } else { alu::add_with_carry(a, b, false) };
        self.gprs[rd] = self.set_arithmetic_flags(sum);
    }

    fn execute_thumb_move_compare_add_subtract_immediate(&mut self, instr: u32) {
        let op = (instr >> 11) & 0x3; // 00=MOV, 01=CMP, 10=ADD, 11=SUB
        let rd = ((instr >> 8) & 0x7) as usize;
        let imm8 = instr & 0xFF;
        let value = self.gprs[rd];

        match op {
            0 => {
                self.gprs[rd] = imm8;
                self.cpsr.set_nz(imm8);
            }
            1 => {
                self.set_arithmetic_flags(alu::sub_with_carry(value, imm8, true));
            }
            2 => self.gprs[rd] = self.set_arithmetic_flags(alu::add_with_carry(value, imm8, false)),
            _ => self.gprs[rd] = self.set_arithmetic_flags(alu::sub_with_carry(value, imm8, true)),
        }
    }

    fn execute_thumb_alu_operations(&mut self, instr: u32) {
        let op = (instr >> 6) & 0xF;
        let rs = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;
        let (a, b) = (self.gprs[rd], self.gprs[rs]);
        let carry = self.cpsr.c();

        let result = match op {
            0x0 => Some(a & b),                                                             // AND
            0x1 => Some(a ^ b),                                                             // EOR
            0x2 | 0x3 | 0x4 | 0x7 => {
                // LSL, LSR, ASR, ROR by register
                let kind = match op {
                    0x2 => ShiftKind::Lsl,
                    0x3 => ShiftKind::Lsr,
                    0x4 => ShiftKind::Asr,
                    _ => ShiftKind::Ror,
                };
                self.cycles += 1;
                let shifted = alu::barrel_shift(kind, a, b, carry, false);
                self.gprs[rd] = self.set_shift_flags(shifted);
                None
            }
            0x5 => Some(self.set_arithmetic_flags(alu::add_with_carry(a, b, carry))),       // ADC
            0x6 => Some(self.set_arithmetic_flags(alu::sub_with_carry(a, b, carry))),       // SBC
            0x8 => {
                self.cpsr.set_nz(a & b);                                                    // TST
                None
            }
            0x9 => Some(self.set_arithmetic_flags(alu::sub_with_carry(0, b, true))),        // NEG
            0xA => {
                self.set_arithmetic_flags(alu::sub_with_carry(a, b, true));                 // CMP
                None
            }
            0xB => {
                self.set_arithmetic_flags(alu::add_with_carry(a, b, false));                // CMN
                None
            }
            0xC => Some(a | b),                                                             // ORR
            0xD => {
                self.cycles += alu::multiply_cycles(a);                                     // MUL
                Some(a.wrapping_mul(b))
            }
            0xE => Some(a & !b),                                                            // BIC
            _ => Some(!b),                                                                  // MVN
        };

        if let Some(result) = result {
            self.cpsr.set_nz(result);
            self.gprs[rd] = result;
        }
    }

    fn execute_thumb_hi_register_operations_branch_exchange(&mut self, instr: u32) {
        let op = (instr >> 8) & 0x3;
        let rd = ((instr & 0x7) | ((instr >> 4) & 0x8)) as usize;
        let rs = ((instr >> 3) & 0xF) as usize;
        let value = self.operand(rs);

        match op {
            0 => {
                let sum = self.operand(rd).wrapping_add(value);
                self.write_reg(rd, sum);
            }
            1 => {
                self.set_arithmetic_flags(alu::sub_with_carry(self.operand(rd), value, true));
            }
            2 => self.write_reg(rd, value),
            _ => {
                let mode = if value & 1 != 0 { ExecutionMode::Thumb } else { ExecutionMode::Arm };
                self.set_execution_mode(mode);
                self.write_pc(value);
            }
        }
    }

    fn execute_thumb_pc_relative_load(&mut self, instr: u32) {
        let rd = ((instr >> 8) & 0x7) as usize;
        let address = (self.operand(PC) & !3).wrapping_add((instr & 0xFF) << 2);
        self.gprs[rd] = self.load32(address);
        self.cycles += 1;
    }

    fn execute_thumb_load_store_register_offset(&mut self, instr: u32) {
        let load = (instr >> 11) & 1 != 0;
        let byte = (instr >> 10) & 1 != 0;
        let ro = ((instr >> 6) & 0x7) as usize;
        let rb = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;
        let address = self.gprs[rb].wrapping_add(self.gprs[ro]);

        match (load, byte) {
            (false, false) => self.store32(address, self.gprs[rd]),
            (false, true) => self.store8(address, self.gprs[rd] as u8),
            (true, false) => self.thumb_load(rd, address, Cpu::load32),
            (true, true) => self.thumb_load(rd, address, |cpu, a| cpu.load_u8(a) as u32),
        }
    }

    fn execute_thumb_load_store_sign_extended(&mut self, instr: u32) {
        let h = (instr >> 11) & 1 != 0;
        let s = (instr >> 10) & 1 != 0;
        let ro = ((instr >> 6) & 0x7) as usize;
        let rb = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;
        let address = self.gprs[rb].wrapping_add(self.gprs[ro]);

        match (s, h) {
            (false, false) => self.store16(address, self.gprs[rd] as u16),                      // STRH
            (false, true) => self.thumb_load(rd, address, |cpu, a| cpu.load_u16(a) as u32),      // LDRH
            (true, false) => self.thumb_load(rd, address, |cpu, a| cpu.load8(a) as i32 as u32),  // LDSB
            (true, true) => self.thumb_load(rd, address, |cpu, a| cpu.load16(a) as i32 as u32),  // LDSH
        }
    }

    fn execute_thumb_load_store_immediate_offset(&mut self, instr: u32) {
        let byte = (instr >> 12) & 1 != 0;
        let load = (instr >> 11) & 1 != 0;
        let offset5 = (instr >> 6) & 0x1F;
        let rb = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;

        if byte {
            let address = self.gprs[rb].wrapping_add(offset5);
            if load {
                self.thumb_load(rd, address, |cpu, a| cpu.load_u8(a) as u32);
            } else {
                self.store8(address, self.gprs[rd] as u8);
            }
        } else {
            let address = self.gprs[rb].wrapping_add(offset5 << 2);
            if load {
                self.thumb_load(rd, address, Cpu::load32);
            } else {
                self.store32(address, self.gprs[rd]);
            }
        }
    }

    fn execute_thumb_load_store_halfword(&mut self, instr: u32) {
        let load = (instr >> 11) & 1 != 0;
        let offset = ((instr >> 6) & 0x1F) << 1;
        let rb = ((instr >> 3) & 0x7) as usize;
        let rd = (instr & 0x7) as usize;
        let address = self.gprs[rb].wrapping_add(offset);

        if load {
            self.thumb_load(rd, address, |cpu, a| cpu.load_u16(a) as u32);
        } else {
            self.store16(address, self.gprs[rd] as u16);
        }
    }

    fn execute_thumb_sp_relative_load_store(&mut self, instr: u32) {
        let load = (instr >> 11) & 1 != 0;
        let rd = ((instr >> 8) & 0x7) as usize;
        let address = self.gprs[SP].wrapping_add((instr & 0xFF) << 2);

        if load {
            self.thumb_load(rd, address, Cpu::load32);
        } else {
            self.store32(address, self.gprs[rd]);
        }
    }

    fn execute_thumb_load_address(&mut self, instr: u32) {
        let from_sp = (instr >> 11) & 1 != 0;
        let rd = ((instr >> 8) & 0x7) as usize;
        let base = if from_sp { self.gprs[SP] } else { self.operand(PC) & !3 };
        self.gprs[rd] = base.wrapping_add((instr & 0xFF) << 2);
    }

    fn execute_thumb_add_offset_to_sp(&mut self, instr: u32) {
        let offset = (instr & 0x7F) << 2;
        self.gprs[SP] = if instr & 0x80 != 0 {
            self.gprs[SP].wrapping_sub(offset)
        } else {
            self.gprs[SP].wrapping_add(offset)
        };
    }

    fn execute_thumb_push_pop_registers(&mut self, instr: u32) {
        let pop = (instr >> 11) & 1 != 0;
        let extra = (instr >> 8) & 1 != 0; // LR on push, PC on pop
        let list = instr & 0xFF;
        let count = list.count_ones() + extra as u32;
        let sp = self.gprs[SP];

        if pop {
            self.charge_burst(sp, count);
            let mut address = sp;
            for reg in (0..8).filter(|r| list & (1 << r) != 0) {
                self.gprs[reg] = self.burst_load32(address);
                address = address.wrapping_add(4);
            }
            self.gprs[SP] = sp.wrapping_add(4 * count);
            self.cycles += 1;
            if extra {
                let pc = self.burst_load32(address);
                self.write_pc(pc);
            }
        } else {
            let mut address = sp.wrapping_sub(4 * count);
            self.charge_burst(address, count);
            self.gprs[SP] = address;
            for reg in (0..8).filter(|r| list & (1 << r) != 0) {
                self.burst_store32(address, self.gprs[reg]);
                address = address.wrapping_add(4);
            }
            if extra {
                self.burst_store32(address, self.gprs[LR]);
            }
        }
    }

    fn execute_thumb_multiple_load_store(&mut self, instr: u32) {
        let load = (instr >> 11) & 1 != 0;
        let rb = ((instr >> 8) & 0x7) as usize;
        let base = self.gprs[rb];

        // An empty list transfers PC alone and moves the base by 16 words.
        let list = instr & 0xFF;
        if list == 0 {
            self.charge_burst(base, 1);
            self.gprs[rb] = base.wrapping_add(0x40);
            if load {
                let pc = self.burst_load32(base);
                self.write_pc(pc);
            } else {
                let value = self.operand(PC).wrapping_add(2);
                self.burst_store32(base, value);
            }
            return;
        }

        let new_base = base.wrapping_add(4 * list.count_ones());
        let first = list.trailing_zeros() as usize;
        self.charge_burst(base, list.count_ones());

        let mut address = base;
        if load {
            self.gprs[rb] = new_base;
            for reg in (0..8).filter(|r| list & (1 << r) != 0) {
                self.gprs[reg] = self.burst_load32(address);
                address = address.wrapping_add(4);
            }
            self.cycles += 1;
        } else {
            for reg in (0..8).filter(|r| list & (1 << r) != 0) {
                let value = if reg == rb && reg != first { new_base } else { self.gprs[reg] };
                self.burst_store32(address, value);
                address = address.wrapping_add(4);
            }
            self.gprs[rb] = new_base;
        }
    }

    fn execute_thumb_conditional_branch(&mut self, instr: u32) {
        let cond = (instr >> 8) & 0xF;
        if !self.cpsr.condition_passed(cond) {
            return;
        }
        let offset = ((instr as u8 as i8 as i32) << 1) as u32;
        let target = self.operand(PC).wrapping_add(offset);
        self.write_pc(target);
    }

    fn execute_thumb_unconditional_branch(&mut self, instr: u32) {
        let offset = ((((instr & 0x7FF) << 21) as i32) >> 20) as u32;
        let target = self.operand(PC).wrapping_add(offset);
        self.write_pc(target);
    }

    fn execute_thumb_long_branch_with_link(&mut self, instr: u32) {
        let offset11 = instr & 0x7FF;
        if instr & 0x0800 == 0 {
            // High half: stash the upper offset in LR.
            let high = ((((offset11) << 21) as i32) >> 9) as u32;
            self.gprs[LR] = self.operand(PC).wrapping_add(high);
        } else {
            let target = self.gprs[LR].wrapping_add(offset11 << 1);
            self.gprs[LR] = self.gprs[PC] | 1;
            self.write_pc(target);
        }
    }

    /// Load into a low register plus the internal cycle loads take.
    fn thumb_load(&mut self, rd: usize, address: u32, load: impl FnOnce(&mut Cpu, u32) -> u32) {
        let value = load(self, address);
        self.cycles += 1;
        self.gprs[rd] = value;
    }
}
