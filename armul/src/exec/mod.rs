//! The emulator: machine state plus the two-latch pipeline and per-opcode
//! execute semantics.
//!
//! Grounded directly in `emulate.c`'s main loop and `execute.c`'s
//! `execute_dp`/`execute_mul`/`execute_sdt`/`execute_brn`. The flag-setting
//! formulas are copied as-is rather than "corrected" to textbook ARM
//! semantics: this instruction subset never sets the V flag at all (no
//! opcode's flag byte ever ORs it in), and the carry computed for
//! arithmetic opcodes is a sign-comparison trick, not a true add/subtract
//! carry-out. Both are preserved for behavioural fidelity.

use crate::bits;
use crate::error::ExecError;
use crate::instr::{Cond, DataOp, DpOperand, Instr, Register, SdtOffset, ShiftAmount, ShiftedRegister};
use crate::memory::Memory;
use crate::registers::Registers;

/// Receives the two effects the emulator core drives but does not own: GPIO
/// accesses as they happen, and the halt-time register/memory dump.
pub trait DebugSink: crate::memory::DebugSink {
    fn halt(&mut self, registers: &Registers, memory: &Memory);
}

impl DebugSink for crate::memory::NullSink {
    fn halt(&mut self, _registers: &Registers, _memory: &Memory) {}
}

/// Prints GPIO accesses and the halt-time dump to stdout, in the exact
/// format `io.c`'s `print_gpio_access`/`print_state` produce.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl crate::memory::DebugSink for StdoutSink {
    fn gpio_access(&mut self, access: crate::memory::GpioAccess) {
        println!("{}", access.message());
    }
}

impl DebugSink for StdoutSink {
    fn halt(&mut self, registers: &Registers, memory: &Memory) {
        println!("Registers:");
        print!("{registers}");
        println!("Non-zero memory:");
        for addr in (0..memory.len() as u32).step_by(4) {
            let word = memory.dump_word_bswap(addr);
            if word != 0 {
                println!("{addr:#010x}: {word:#010x}");
            }
        }
    }
}

/// Registers, memory and the pipeline latches, bundled as the emulator
/// drives them across a run.
#[derive(Debug)]
pub struct Machine {
    pub registers: Registers,
    pub memory: Memory,
    fetched: u32,
    decoded: (Cond, Instr),
}

impl Machine {
    pub fn new(memory: Memory) -> Machine {
        Machine { registers: Registers::default(), memory, fetched: 0, decoded: (Cond::Al, Instr::Hal) }
    }

    /// Runs until the pipeline decodes a halt, matching `emulate.c`'s main
    /// loop: the PC is set up eight bytes ahead of the instruction about to
    /// execute before the loop even starts, and every iteration both
    /// executes the latched instruction and keeps the pipeline two words
    /// ahead of it.
    pub fn run(&mut self, sink: &mut impl DebugSink) -> Result<(), ExecError> {
        self.registers.set_pc(0x8);
        self.fetched = self.memory.read_word(0, sink)?;
        self.decoded = self.decode_at(self.fetched, 0)?;
        self.fetched = self.memory.read_word(0x4, sink)?;

        while self.decoded.1 != Instr::Hal {
            let branched = self.execute(sink)?;
            if !branched {
                let decode_address = self.registers.pc() - 4;
                self.decoded = self.decode_at(self.fetched, decode_address)?;
                self.fetched = self.memory.read_word(self.registers.pc(), sink)?;
            }
            self.registers.increment_pc();
        }
        sink.halt(&self.registers, &self.memory);
        Ok(())
    }

    fn decode_at(&self, word: u32, address: u32) -> Result<(Cond, Instr), ExecError> {
        Instr::decode(word).ok_or(ExecError::UndecodableWord(word, address as u16))
    }

    /// Executes the latched instruction. Returns `true` if it was a taken
    /// branch, whose internal re-fetch already advanced the pipeline (the
    /// caller must not repeat that advance).
    fn execute(&mut self, sink: &mut impl DebugSink) -> Result<bool, ExecError> {
        let (cond, instr) = self.decoded;
        tracing::trace!(pc = self.registers.pc(), ?instr, "executing");
        if !self.registers.test(cond) {
            return Ok(false);
        }
        match instr {
            Instr::Dp { opcode, set_flags, rn, rd, operand2 } => {
                self.execute_dp(opcode, set_flags, rn, rd, operand2)?;
                Ok(false)
            }
            Instr::Mul { accumulate, set_flags, rd, rn, rs, rm } => {
                self.execute_mul(accumulate, set_flags, rd, rn, rs, rm)?;
                Ok(false)
            }
            Instr::Sdt { load, pre_index, up, rn, rd, offset } => {
                self.execute_sdt(load, pre_index, up, rn, rd, offset, sink)?;
                Ok(false)
            }
            Instr::Brn { offset } => {
                self.execute_brn(offset, sink)?;
                Ok(true)
            }
            Instr::Hal => unreachable!("the run loop stops before executing a halt"),
        }
    }

    fn evaluate_shifted_register(&self, sr: ShiftedRegister) -> Result<bits::ShiftResult, ExecError> {
        let rm = self.registers.get(sr.rm)?;
        let amount = match sr.amount {
            ShiftAmount::Constant(n) => n as u32,
            ShiftAmount::Register(rs) => bits::get_byte(self.registers.get(rs)?, 7) as u32,
        };
        Ok(sr.shift_type.apply(rm, amount))
    }

    fn evaluate_dp_operand(&self, operand: DpOperand) -> Result<bits::ShiftResult, ExecError> {
        match operand {
            DpOperand::Immediate(imm) => Ok(imm.evaluate()),
            DpOperand::Register(sr) => self.evaluate_shifted_register(sr),
        }
    }

    fn evaluate_sdt_offset(&self, offset: SdtOffset) -> Result<u32, ExecError> {
        match offset {
            SdtOffset::Immediate(imm) => Ok(imm as u32),
            SdtOffset::Register(sr) => Ok(self.evaluate_shifted_register(sr)?.value),
        }
    }

    fn execute_dp(
        &mut self,
        opcode: DataOp,
        set_flags: bool,
        rn: Register,
        rd: Register,
        operand2: DpOperand,
    ) -> Result<(), ExecError> {
        let barrel = self.evaluate_dp_operand(operand2)?;
        let op2 = barrel.value;
        let rn_val = self.registers.get(rn)?;
        let result = match opcode {
            DataOp::And | DataOp::Tst => rn_val & op2,
            DataOp::Eor | DataOp::Teq => rn_val ^ op2,
            DataOp::Sub | DataOp::Cmp => rn_val.wrapping_add(bits::negate(op2)),
            DataOp::Rsb => op2.wrapping_add(bits::negate(rn_val)),
            DataOp::Add => rn_val.wrapping_add(op2),
            DataOp::Orr => rn_val | op2,
            DataOp::Mov => op2,
        };

        if set_flags {
            let carry = if opcode.is_logical() {
                barrel.carry
            } else {
                (bits::is_negative(rn_val) == bits::is_negative(op2)) != bits::is_negative(result)
            };
            self.registers.set_flags(bits::is_negative(result), result == 0, carry, false);
        }

        if opcode.writes_result() {
            self.registers.set(rd, result)?;
        }
        Ok(())
    }

    fn execute_mul(
        &mut self,
        accumulate: bool,
        set_flags: bool,
        rd: Register,
        rn: Register,
        rs: Register,
        rm: Register,
    ) -> Result<(), ExecError> {
        let rm_val = self.registers.get(rm)? as u64;
        let rs_val = self.registers.get(rs)? as u64;
        let product = rm_val.wrapping_mul(rs_val);
        let wide = if accumulate { product.wrapping_add(self.registers.get(rn)? as u64) } else { product };
        let result = wide as u32;

        if set_flags {
            self.registers.set_flags(
                bits::is_negative(result),
                result == 0,
                self.registers.carry(),
                self.registers.overflow(),
            );
        }
        self.registers.set(rd, result)?;
        Ok(())
    }

    fn execute_sdt(
        &mut self,
        load: bool,
        pre_index: bool,
        up: bool,
        rn: Register,
        rd: Register,
        offset: SdtOffset,
        sink: &mut impl DebugSink,
    ) -> Result<(), ExecError> {
        let offset_val = self.evaluate_sdt_offset(offset)?;
        let base = self.registers.get(rn)?;
        let indexed = if up { base.wrapping_add(offset_val) } else { base.wrapping_sub(offset_val) };
        let address = if pre_index { indexed } else { base };

        if load {
            let value = self.memory.read_word(address, sink)?;
            self.registers.set(rd, value)?;
        } else {
            let value = self.registers.get(rd)?;
            self.memory.write_word(address, value, sink)?;
        }

        if !pre_index {
            self.registers.set(rn, indexed)?;
        }
        Ok(())
    }

    /// Performs the branch's own pipeline re-fetch, matching
    /// `execute_brn`'s choreography exactly: jump, decode the word at the
    /// new PC, advance once more, and pre-fetch the word after that -- so
    /// the run loop's own unconditional `increment_pc` at the end of this
    /// iteration lands the PC back at "decoded address + 8".
    fn execute_brn(&mut self, offset: i32, sink: &mut impl DebugSink) -> Result<(), ExecError> {
        let target = self.registers.pc().wrapping_add_signed(offset);
        self.registers.set_pc(target);
        self.fetched = self.memory.read_word(target, sink)?;
        self.decoded = self.decode_at(self.fetched, target)?;
        self.registers.increment_pc();
        self.fetched = self.memory.read_word(self.registers.pc(), sink)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble;
    use crate::memory::NullSink;

    fn run_source(source: &str) -> Machine {
        let program = assemble(source).expect("assembly should succeed");
        let mut machine = Machine::new(Memory::from_image(&program.image));
        machine.run(&mut NullSink).expect("execution should succeed");
        machine
    }

    #[test]
    fn mov_immediate_loads_a_constant() {
        let machine = run_source("MOV R0,#5\nANDEQ R0,R0,R0\n");
        assert_eq!(machine.registers.get(Register::new(0)).unwrap(), 5);
    }

    #[test]
    fn movs_zero_sets_the_z_flag() {
        let machine = run_source("MOVS R0,#0\nANDEQ R0,R0,R0\n");
        assert!(machine.registers.zero());
        assert!(!machine.registers.negative());
    }

    #[test]
    fn subs_equal_operands_sets_carry_from_the_sign_comparison() {
        let machine = run_source("MOV R0,#5\nSUBS R1,R0,R0\nANDEQ R0,R0,R0\n");
        assert!(machine.registers.zero());
        assert!(machine.registers.carry());
    }

    #[test]
    fn tst_with_zero_clears_n_and_sets_z() {
        let machine = run_source("MOV R0,#0\nTST R0,#8\nANDEQ R0,R0,R0\n");
        assert!(machine.registers.zero());
        assert!(!machine.registers.negative());
    }

    #[test]
    fn mul_never_touches_carry_or_overflow() {
        let machine = run_source("MOV R0,#3\nMOV R1,#4\nMUL R2,R0,R1\nANDEQ R0,R0,R0\n");
        assert_eq!(machine.registers.get(Register::new(2)).unwrap(), 12);
        assert!(!machine.registers.carry());
    }

    #[test]
    fn post_indexed_store_writes_back_the_base() {
        let source = "MOV R0,#0x10\nMOV R1,#7\nSTR R1,[R0],#4\nLDR R2,[R0]\nANDEQ R0,R0,R0\n";
        let machine = run_source(source);
        assert_eq!(machine.registers.get(Register::new(0)).unwrap(), 0x14);
    }

    #[test]
    fn branch_skips_over_a_trap_instruction() {
        let source = "B skip\nMOV R0,#99\nskip:\nMOV R1,#1\nANDEQ R0,R0,R0\n";
        let machine = run_source(source);
        assert_eq!(machine.registers.get(Register::new(0)).unwrap(), 0);
        assert_eq!(machine.registers.get(Register::new(1)).unwrap(), 1);
    }
}
