use crate::bits;
use crate::instr::{
    Cond, DataOp, DpOperand, Instr, Register, RotatedImmediate, SdtOffset, ShiftAmount,
    ShiftType, ShiftedRegister,
};

impl Instr {
    /// Attempts to decode a 32-bit word as a condition plus instruction.
    ///
    /// An all-zero word is the halt instruction (condition `AL`, no operand
    /// bits to speak of). Any word whose condition or instruction-type bits
    /// don't match one of DP/MUL/SDT/BRN/HAL returns `None`.
    pub fn decode(word: u32) -> Option<(Cond, Instr)> {
        if word == 0 {
            return Some((Cond::Al, Instr::Hal));
        }
        let cond = Cond::decode(bits::get_nibble(word, 31))?;
        let instr = Instr::decode_body(word)?;
        Some((cond, instr))
    }

    fn decode_body(word: u32) -> Option<Instr> {
        match bits::get_bits(word, 27, 25) {
            0x0 => {
                if bits::get_bits(word, 7, 4) == 0x9 {
                    Some(Instr::decode_mul(word))
                } else {
                    Instr::decode_dp(word)
                }
            }
            0x1 => Instr::decode_dp(word),
            0x2 | 0x3 => Some(Instr::decode_sdt(word)),
            0x5 => Some(Instr::decode_brn(word)),
            _ => None,
        }
    }

    fn decode_dp(word: u32) -> Option<Instr> {
        let opcode = DataOp::decode(bits::get_nibble(word, 24))?;
        let operand2 = if bits::get_flag(word, 25) {
            DpOperand::Immediate(RotatedImmediate {
                value: (word & 0xFF) as u8,
                rotate: bits::get_bits(word, 11, 8) as u8,
            })
        } else {
            DpOperand::Register(Instr::decode_shifted_register(word))
        };
        Some(Instr::Dp {
            opcode,
            set_flags: bits::get_flag(word, 20),
            rn: Register::new(bits::get_nibble(word, 19)),
            rd: Register::new(bits::get_nibble(word, 15)),
            operand2,
        })
    }

    fn decode_mul(word: u32) -> Instr {
        Instr::Mul {
            accumulate: bits::get_flag(word, 21),
            set_flags: bits::get_flag(word, 20),
            rd: Register::new(bits::get_nibble(word, 19)),
            rn: Register::new(bits::get_nibble(word, 15)),
            rs: Register::new(bits::get_nibble(word, 11)),
            rm: Register::new(bits::get_nibble(word, 3)),
        }
    }

    fn decode_sdt(word: u32) -> Instr {
        let offset = if bits::get_flag(word, 25) {
            SdtOffset::Register(Instr::decode_shifted_register(word))
        } else {
            SdtOffset::Immediate((word & 0xFFF) as u16)
        };
        Instr::Sdt {
            load: bits::get_flag(word, 20),
            pre_index: bits::get_flag(word, 24),
            up: bits::get_flag(word, 23),
            rn: Register::new(bits::get_nibble(word, 19)),
            rd: Register::new(bits::get_nibble(word, 15)),
            offset,
        }
    }

    fn decode_brn(word: u32) -> Instr {
        let raw24 = word & 0x00FF_FFFF;
        let signed = if raw24 & 0x0080_0000 != 0 { raw24 | 0xFF00_0000 } else { raw24 };
        let offset = (signed as i32) << 2;
        Instr::Brn { offset }
    }

    /// Decodes the 12-bit shifted-register operand shared by DP and SDT.
    fn decode_shifted_register(word: u32) -> ShiftedRegister {
        let rm = Register::new(bits::get_nibble(word, 3));
        let shift_type = ShiftType::decode(bits::get_bits(word, 6, 5) as u8);
        let amount = if bits::get_flag(word, 4) {
            ShiftAmount::Register(Register::new(bits::get_nibble(word, 11)))
        } else {
            ShiftAmount::Constant(bits::get_bits(word, 11, 7) as u8)
        };
        ShiftedRegister { rm, shift_type, amount }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::DataOp;

    #[test]
    fn decodes_halt() {
        assert_eq!(Instr::decode(0), Some((Cond::Al, Instr::Hal)));
    }

    #[test]
    fn decodes_mov_immediate() {
        let (cond, instr) = Instr::decode(0xE3A0_1005).unwrap();
        assert_eq!(cond, Cond::Al);
        match instr {
            Instr::Dp { opcode: DataOp::Mov, rd, operand2: DpOperand::Immediate(imm), .. } => {
                assert_eq!(rd, Register::new(1));
                assert_eq!(imm.value, 5);
                assert_eq!(imm.rotate, 0);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_condition() {
        assert_eq!(Instr::decode(0xF000_0000), None);
    }
}
