//! 32-bit instruction set.

use super::alu::{self, ShiftKind};
use super::psr::{ExecutionMode, PrivilegeMode, Psr};
use super::{Cpu, LR, PC};

impl Cpu {
    pub(super) fn execute_arm(&mut self, instr: u32) {
        let cond = (instr >> 28) & 0xF;
        if !self.cpsr.condition_passed(cond) {
            return;
        }

        if instr & 0x0FFF_FFF0 == 0x012F_FF10 {
            self.execute_arm_branch_exchange(instr);
        } else if instr & 0x0FB0_0FF0 == 0x0100_0090 {
            self.execute_arm_swp(instr);
        } else if instr & 0x0FC0_00F0 == 0x0000_0090 {
            self.execute_arm_multiply(instr);
        } else if instr & 0x0F80_00F0 == 0x0080_0090 {
            self.execute_arm_multiply_long(instr);
        } else if instr & 0x0E00_0090 == 0x0000_0090 {
            self.execute_arm_halfword_transfer(instr);
        } else if instr & 0x0FBF_0FFF == 0x010F_0000 {
            self.execute_arm_mrs(instr);
        } else if instr & 0x0FB0_FFF0 == 0x0120_F000 || instr & 0x0FB0_F000 == 0x0320_F000 {
            self.execute_arm_msr(instr);
        } else if instr & 0x0190_0000 == 0x0100_0000 && instr & 0x0C00_0000 == 0 {
            // Compare opcodes without S are the PSR transfer space.
            self.hit_stub(instr);
        } else if instr & 0x0C00_0000 == 0 {
            self.execute_arm_data_processing(instr);
        } else if instr & 0x0E00_0010 == 0x0600_0010 {
            self.hit_stub(instr);
        } else if instr & 0x0C00_0000 == 0x0400_0000 {
            self.execute_arm_single_data_transfer(instr);
        } else if instr & 0x0E00_0000 == 0x0800_0000 {
            self.execute_arm_block_transfer(instr);
        } else if instr & 0x0E00_0000 == 0x0A00_0000 {
            self.execute_arm_branch(instr);
        } else if instr & 0x0F00_0000 == 0x0F00_0000 {
            self.swi32(instr & 0x00FF_FFFF);
        } else {
            // Coprocessor space; nothing is attached.
            self.hit_stub(instr);
        }
    }

    /// Loads the shifter scratch slots from operand 2.
    fn arm_shifter(&mut self, instr: u32) {
        let carry = self.cpsr.c();
        let (value, carry_out) = if instr & 0x0200_0000 != 0 {
            alu::rotated_immediate(instr, carry)
        } else {
            let rm = (instr & 0xF) as usize;
            let kind = ShiftKind::from_bits(instr >> 5);
            if instr & 0x10 != 0 {
                // Register-specified shift: one internal cycle, PC reads 4 further ahead.
                let rs = ((instr >> 8) & 0xF) as usize;
                self.cycles += 1;
                let value = if rm == PC { self.operand(PC).wrapping_add(4) } else { self.gprs[rm] };
                alu::barrel_shift(kind, value, self.gprs[rs], carry, false)
            } else {
                alu::barrel_shift(kind, self.operand(rm), (instr >> 7) & 0x1F, carry, true)
            }
        };
        self.shifter_operand = value;
        self.shifter_carry_out = carry_out;
    }

    fn execute_arm_data_processing(&mut self, instr: u32) {
        let op = (instr >> 21) & 0xF;
        let s = (instr >> 20) & 1 != 0;
        let rn = ((instr >> 16) & 0xF) as usize;
        let rd = ((instr >> 12) & 0xF) as usize;
        let register_shift = instr & 0x0200_0010 == 0x10;

        self.arm_shifter(instr);
        let op1 = if rn == PC && register_shift { self.operand(PC).wrapping_add(4) } else { self.operand(rn) };
        let op2 = self.shifter_operand;
        let carry = self.cpsr.c();

        // Arithmetic ops report (carry, overflow); logical ones take the shifter carry.
        let (result, arithmetic) = match op {
            0x0 | 0x8 => (op1 & op2, None),                                     // AND, TST
            0x1 | 0x9 => (op1 ^ op2, None),                                     // EOR, TEQ
            0x2 | 0xA => split(alu::sub_with_carry(op1, op2, true)),            // SUB, CMP
            0x3 => split(alu::sub_with_carry(op2, op1, true)),                  // RSB
            0x4 | 0xB => split(alu::add_with_carry(op1, op2, false)),           // ADD, CMN
            0x5 => split(alu::add_with_carry(op1, op2, carry)),                 // ADC
            0x6 => split(alu::sub_with_carry(op1, op2, carry)),                 // SBC
            0x7 => split(alu::sub_with_carry(op2, op1, carry)),                 // RSC
            0xC => (op1 | op2, None),                                           // ORR
            0xD => (op2, None),                                                 // MOV
            0xE => (op1 & !op2, None),                                          // BIC
            _ => (!op2, None),                                                  // MVN
        };
        let writes_result = !(0x8..=0xB).contains(&op);

        if rd == PC && s {
            // S with PC as destination copies SPSR back instead of setting flags.
            if writes_result {
                self.return_from_exception(result);
            } else if let Some(spsr) = self.spsr() {
                self.set_cpsr(spsr);
            }
            return;
        }

        if s {
            self.cpsr.set_nz(result);
            match arithmetic {
                Some((c, v)) => {
                    self.cpsr.set_c(c);
                    self.cpsr.set_v(v);
                }
                None => self.cpsr.set_c(self.shifter_carry_out),
            }
        }
        if writes_result {
            self.write_reg(rd, result);
        }
    }

    fn execute_arm_multiply(&mut self, instr: u32) {
        let accumulate = (instr >> 21) & 1 != 0;
        let s = (instr >> 20) & 1 != 0;
        let rd = ((instr >> 16) & 0xF) as usize;
        let rn = ((instr >> 12) & 0xF) as usize;
        let rs = ((instr >> 8) & 0xF) as usize;
        let rm = (instr & 0xF) as usize;

        let multiplier = self.gprs[rs];
        let mut result = self.gprs[rm].wrapping_mul(multiplier);
        let mut internal = alu::multiply_cycles(multiplier);
        if accumulate {
            result = result.wrapping_add(self.gprs[rn]);
            internal += 1;
        }
        self.cycles += internal;
        self.write_reg(rd, result);

        if s {
            // C is left as it was; ARM7 leaves it meaningless.
            self.cpsr.set_nz(result);
        }
    }

    fn execute_arm_multiply_long(&mut self, instr: u32) {
        let signed = (instr >> 22) & 1 != 0;
        let accumulate = (instr >> 21) & 1 != 0;
        let s = (instr >> 20) & 1 != 0;
        let rd_hi = ((instr >> 16) & 0xF) as usize;
        let rd_lo = ((instr >> 12) & 0xF) as usize;
        let rs = ((instr >> 8) & 0xF) as usize;
        let rm = (instr & 0xF) as usize;

        let (a, b) = (self.gprs[rm], self.gprs[rs]);
        let mut result = if signed {
            (a as i32 as i64).wrapping_mul(b as i32 as i64) as u64
        } else {
            (a as u64) * (b as u64)
        };
        let mut internal = alu::multiply_cycles(b) + 1;
        if accumulate {
            let acc = ((self.gprs[rd_hi] as u64) << 32) | self.gprs[rd_lo] as u64;
            result = result.wrapping_add(acc);
            internal += 1;
        }
        self.cycles += internal;
        self.write_reg(rd_lo, result as u32);
        self.write_reg(rd_hi, (result >> 32) as u32);

        if s {
            self.cpsr.set_n(result >> 63 != 0);
            self.cpsr.set_z(result == 0);
        }
    }

    fn execute_arm_mrs(&mut self, instr: u32) {
        let use_spsr = (instr >> 22) & 1 != 0;
        let rd = ((instr >> 12) & 0xF) as usize;
        let value = match (use_spsr, self.spsr()) {
            (true, Some(spsr)) => spsr,
            _ => self.cpsr,
        };
        self.write_reg(rd, value.raw());
    }

    fn execute_arm_msr(&mut self, instr: u32) {
        let use_spsr = (instr >> 22) & 1 != 0;
        let operand = if instr & 0x0200_0000 != 0 {
            alu::rotated_immediate(instr, self.cpsr.c()).0
        } else {
            self.gprs[(instr & 0xF) as usize]
        };

        let mut mask = 0;
        if instr & (1 << 19) != 0 {
            mask |= 0xFF00_0000; // f
        }
        if instr & (1 << 16) != 0 {
            mask |= 0x0000_00FF; // c
        }

        if use_spsr {
            if let Some(spsr) = self.spsr() {
                self.set_spsr(Psr::new((spsr.raw() & !mask) | (operand & mask)));
            }
            return;
        }

        if !self.privilege_mode.is_privileged() {
            mask &= 0xFF00_0000;
        }
        let value = (self.cpsr.raw() & !mask) | (operand & mask);
        self.set_cpsr(Psr::new(value));
    }

    fn execute_arm_single_data_transfer(&mut self, instr: u32) {
        let register_offset = (instr >> 25) & 1 != 0;
        let p = (instr >> 24) & 1 != 0; // pre-index
        let u = (instr >> 23) & 1 != 0; // add offset
        let b = (instr >> 22) & 1 != 0; // byte
        let w = (instr >> 21) & 1 != 0; // write-back
        let l = (instr >> 20) & 1 != 0; // load
        let rn = ((instr >> 16) & 0xF) as usize;
        let rd = ((instr >> 12) & 0xF) as usize;

        let offset = if register_offset {
            let rm = (instr & 0xF) as usize;
            let kind = ShiftKind::from_bits(instr >> 5);
            alu::barrel_shift(kind, self.gprs[rm], (instr >> 7) & 0x1F, self.cpsr.c(), true).0
        } else {
            instr & 0xFFF
        };

        let base = self.operand(rn);
        let indexed = if u { base.wrapping_add(offset) } else { base.wrapping_sub(offset) };
        let address = if p { indexed } else { base };
        let write_back = w || !p;

        if l {
            let value = if b { self.load_u8(address) as u32 } else { self.load32(address) };
            self.cycles += 1;
            if write_back {
                self.write_reg(rn, indexed);
            }
            self.write_reg(rd, value);
        } else {
            let value = if rd == PC { self.operand(PC).wrapping_add(4) } else { self.gprs[rd] };
            if b {
                self.store8(address, value as u8);
            } else {
                self.store32(address, value);
            }
            if write_back {
                self.write_reg(rn, indexed);
            }
        }
    }

    fn execute_arm_halfword_transfer(&mut self, instr: u32) {
        let p = (instr >> 24) & 1 != 0;
        let u = (instr >> 23) & 1 != 0;
        let immediate = (instr >> 22) & 1 != 0;
        let w = (instr >> 21) & 1 != 0;
        let l = (instr >> 20) & 1 != 0;
        let rn = ((instr >> 16) & 0xF) as usize;
        let rd = ((instr >> 12) & 0xF) as usize;
        let sh = (instr >> 5) & 0x3;

        // SH=00 is SWP/multiply space; stores other than STRH do not exist here.
        if sh == 0 || (!l && sh != 1) {
            self.hit_stub(instr);
            return;
        }

        let offset = if immediate {
            ((instr >> 4) & 0xF0) | (instr & 0xF)
        } else {
            self.gprs[(instr & 0xF) as usize]
        };
        let base = self.operand(rn);
        let indexed = if u { base.wrapping_add(offset) } else { base.wrapping_sub(offset) };
        let address = if p { indexed } else { base };
        let write_back = w || !p;

        if l {
            let value = match sh {
                1 => self.load_u16(address) as u32,         // LDRH
                2 => self.load8(address) as i32 as u32,     // LDRSB
                _ => self.load16(address) as i32 as u32,    // LDRSH
            };
            self.cycles += 1;
            if write_back {
                self.write_reg(rn, indexed);
            }
            self.write_reg(rd, value);
        } else {
            let value = if rd == PC { self.operand(PC).wrapping_add(4) } else { self.gprs[rd] };
            self.store16(address, value as u16);
            if write_back {
                self.write_reg(rn, indexed);
            }
        }
    }

    fn execute_arm_swp(&mut self, instr: u32) {
        let byte = (instr >> 22) & 1 != 0;
        let rn = ((instr >> 16) & 0xF) as usize;
        let rd = ((instr >> 12) & 0xF) as usize;
        let rm = (instr & 0xF) as usize;
        let address = self.gprs[rn];
        let source = self.gprs[rm];

        let old = if byte {
            let old = self.load_u8(address) as u32;
            self.store8(address, source as u8);
            old
        } else {
            let old = self.load32(address);
            self.store32(address, source);
            old
        };
        self.cycles += 1;
        self.write_reg(rd, old);
    }

    fn execute_arm_block_transfer(&mut self, instr: u32) {
        let p = (instr >> 24) & 1 != 0; // pre
        let u = (instr >> 23) & 1 != 0; // up
        let s = (instr >> 22) & 1 != 0; // user bank / restore CPSR
        let w = (instr >> 21) & 1 != 0; // write-back
        let l = (instr >> 20) & 1 != 0; // load
        let rn = ((instr >> 16) & 0xF) as usize;

        // An empty list transfers PC alone but moves the base by 16 words.
        let (list, span) = match instr & 0xFFFF {
            0 => (1u32 << PC, 0x40),
            list => (list, 4 * list.count_ones()),
        };
        let base = self.gprs[rn];
        let mut address = match (u, p) {
            (true, false) => base,
            (true, true) => base.wrapping_add(4),
            (false, false) => base.wrapping_sub(span).wrapping_add(4),
            (false, true) => base.wrapping_sub(span),
        };
        let new_base = if u { base.wrapping_add(span) } else { base.wrapping_sub(span) };
        self.charge_burst(address, list.count_ones());

        let loads_pc = l && list & (1 << PC) != 0;
        let user_bank = s && !loads_pc;
        let mode = self.privilege_mode;

        if l {
            if w {
                self.gprs[rn] = new_base;
            }
            if user_bank {
                self.switch_mode(PrivilegeMode::User);
            }
            let mut pc_value = None;
            for reg in (0..16).filter(|r| list & (1 << r) != 0) {
                let value = self.burst_load32(address);
                if reg == PC {
                    pc_value = Some(value);
                } else {
                    self.gprs[reg] = value;
                }
                address = address.wrapping_add(4);
            }
            if user_bank {
                self.switch_mode(mode);
            }
            self.cycles += 1;
            match pc_value {
                Some(pc) if s => self.return_from_exception(pc),
                Some(pc) => self.write_pc(pc),
                None => {}
            }
        } else {
            let first = list.trailing_zeros() as usize;
            if user_bank {
                self.switch_mode(PrivilegeMode::User);
            }
            for reg in (0..16).filter(|r| list & (1 << r) != 0) {
                // A base stored after the first slot already shows the write-back.
                let value = match reg {
                    PC => self.operand(PC).wrapping_add(4),
                    _ if reg == rn && w && reg != first => new_base,
                    _ => self.gprs[reg],
                };
                self.burst_store32(address, value);
                address = address.wrapping_add(4);
            }
            if user_bank {
                self.switch_mode(mode);
            }
            if w {
                self.gprs[rn] = new_base;
            }
        }
    }

    fn execute_arm_branch(&mut self, instr: u32) {
        let link = (instr >> 24) & 1 != 0;
        let offset = (((instr << 8) as i32) >> 6) as u32;
        let target = self.operand(PC).wrapping_add(offset);
        if link {
            self.gprs[LR] = self.gprs[PC];
        }
        self.write_pc(target);
    }

    fn execute_arm_branch_exchange(&mut self, instr: u32) {
        let target = self.operand((instr & 0xF) as usize);
        let mode = if target & 1 != 0 { ExecutionMode::Thumb } else { ExecutionMode::Arm };
        self.set_execution_mode(mode);
        self.write_pc(target);
    }
}

fn split((result, carry, overflow): (u32, bool, bool)) -> (u32, Option<(bool, bool)>) {
    (result, Some((carry, overflow)))
}
