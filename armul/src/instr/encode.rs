use crate::instr::{Cond, DpOperand, Instr, SdtOffset, ShiftAmount, ShiftedRegister};

/// Errors produced while turning a fully-parsed [`Instr`] into its 32-bit
/// encoding. Parsing already rejects most malformed operands; this only
/// guards the bit-layout invariants the encoder itself must not violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("register R{0} cannot appear in this operand position")]
    InvalidRegister(u8),
    #[error("branch offset {0} does not fit in a 26-bit signed displacement")]
    OffsetTooLarge(i32),
}

fn general(reg: crate::instr::Register) -> Result<u32, EncodeError> {
    if reg.is_general() {
        Ok(reg.index() as u32)
    } else {
        Err(EncodeError::InvalidRegister(reg.index()))
    }
}

fn addressable(reg: crate::instr::Register) -> Result<u32, EncodeError> {
    if reg.is_addressable() {
        Ok(reg.index() as u32)
    } else {
        Err(EncodeError::InvalidRegister(reg.index()))
    }
}

fn encode_shifted_register(sr: ShiftedRegister) -> Result<u32, EncodeError> {
    let rm = addressable(sr.rm)?;
    let mut w = match sr.amount {
        ShiftAmount::Register(rs) => {
            let rs = addressable(rs)?;
            (rs << 1) | 1
        }
        ShiftAmount::Constant(amount) => (amount as u32) << 1,
    };
    w <<= 2;
    w |= sr.shift_type.encode() as u32;
    w <<= 4;
    w |= rm;
    Ok(w)
}

impl Instr {
    /// Encodes this instruction with the given condition into its 32-bit
    /// word, or an all-zero word for the halt instruction.
    pub fn encode(&self, cond: Cond) -> Result<u32, EncodeError> {
        if matches!(self, Instr::Hal) {
            return Ok(0);
        }
        let cond = (cond.encode() as u32) << 28;
        let body = match self {
            Instr::Dp { opcode, set_flags, rn, rd, operand2 } => {
                let (i_bit, operand_bits) = match operand2 {
                    DpOperand::Immediate(imm) => {
                        (1u32, ((imm.rotate as u32) << 8) | imm.value as u32)
                    }
                    DpOperand::Register(sr) => (0u32, encode_shifted_register(*sr)?),
                };
                let mut w = i_bit;
                w = (w << 4) | opcode.encode() as u32;
                w = (w << 1) | (*set_flags as u32);
                w = (w << 4) | general(*rn)?;
                w = (w << 4) | general(*rd)?;
                (w << 12) | operand_bits
            }
            Instr::Mul { accumulate, set_flags, rd, rn, rs, rm } => {
                let mut w = 0u32;
                w = (w << 6) | 0;
                w = (w << 1) | (*accumulate as u32);
                w = (w << 1) | (*set_flags as u32);
                w = (w << 4) | general(*rd)?;
                w = (w << 4) | general(*rn)?;
                w = (w << 4) | general(*rs)?;
                w = (w << 4) | 0x9;
                (w << 4) | general(*rm)?
            }
            Instr::Sdt { load, pre_index, up, rn, rd, offset } => {
                let (i_bit, offset_bits) = match offset {
                    SdtOffset::Immediate(imm) => (0u32, *imm as u32),
                    SdtOffset::Register(sr) => (1u32, encode_shifted_register(*sr)?),
                };
                let mut w = 0b01u32;
                w = (w << 1) | i_bit;
                w = (w << 1) | (*pre_index as u32);
                w = (w << 1) | (*up as u32);
                w = (w << 2) | 0; // two reserved bits between U and L
                w = (w << 1) | (*load as u32);
                w = (w << 4) | addressable(*rn)?;
                w = (w << 4) | addressable(*rd)?;
                (w << 12) | offset_bits
            }
            Instr::Brn { offset } => {
                if !(-0x200_0000..=0x1FF_FFFF).contains(offset) {
                    return Err(EncodeError::OffsetTooLarge(*offset));
                }
                let raw = ((*offset) >> 2) as u32 & 0x00FF_FFFF;
                (0xAu32 << 24) | raw
            }
            Instr::Hal => unreachable!(),
        };
        Ok(cond | body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{DataOp, Register, RotatedImmediate};

    #[test]
    fn encodes_mov_immediate() {
        let instr = Instr::Dp {
            opcode: DataOp::Mov,
            set_flags: false,
            rn: Register::new(0),
            rd: Register::new(1),
            operand2: DpOperand::Immediate(RotatedImmediate { value: 5, rotate: 0 }),
        };
        let word = instr.encode(Cond::Al).unwrap();
        assert_eq!(word, 0xE3A0_1005);
    }

    #[test]
    fn encodes_halt_as_zero() {
        assert_eq!(Instr::Hal.encode(Cond::Al).unwrap(), 0);
    }

    #[test]
    fn encodes_and_decodes_a_pre_indexed_load_symmetrically() {
        let instr = Instr::Sdt {
            load: true,
            pre_index: true,
            up: true,
            rn: Register::new(1),
            rd: Register::new(2),
            offset: SdtOffset::Immediate(4),
        };
        let word = instr.encode(Cond::Al).unwrap();
        let (cond, decoded) = crate::instr::Instr::decode(word).unwrap();
        assert_eq!(cond, Cond::Al);
        assert_eq!(decoded, instr);
    }

    #[test]
    fn rejects_sp_as_dp_register() {
        let instr = Instr::Dp {
            opcode: DataOp::Mov,
            set_flags: false,
            rn: Register::new(0),
            rd: Register::new(13),
            operand2: DpOperand::Immediate(RotatedImmediate { value: 0, rotate: 0 }),
        };
        assert!(instr.encode(Cond::Al).is_err());
    }
}
