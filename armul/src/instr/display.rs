use crate::instr::{Cond, DataOp, DpOperand, Instr, SdtOffset, ShiftAmount, ShiftedRegister};

impl std::fmt::Display for Cond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Cond::Eq => "EQ",
            Cond::Ne => "NE",
            Cond::Ge => "GE",
            Cond::Lt => "LT",
            Cond::Gt => "GT",
            Cond::Le => "LE",
            Cond::Al => "",
        })
    }
}

impl std::fmt::Display for DataOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataOp::And => "AND",
            DataOp::Eor => "EOR",
            DataOp::Sub => "SUB",
            DataOp::Rsb => "RSB",
            DataOp::Add => "ADD",
            DataOp::Tst => "TST",
            DataOp::Teq => "TEQ",
            DataOp::Cmp => "CMP",
            DataOp::Orr => "ORR",
            DataOp::Mov => "MOV",
        })
    }
}

impl std::fmt::Display for ShiftedRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.rm)?;
        match self.amount {
            ShiftAmount::Constant(0) if self.shift_type == crate::instr::ShiftType::Lsl => Ok(()),
            ShiftAmount::Constant(n) => write!(f, ",{} #{n}", self.shift_type),
            ShiftAmount::Register(rs) => write!(f, ",{} {rs}", self.shift_type),
        }
    }
}

impl Instr {
    pub fn write(&self, cond: Cond, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        match self {
            Instr::Dp { opcode, set_flags, rn, rd, operand2 } => {
                write!(f, "{opcode}{cond}")?;
                if *set_flags && opcode.writes_result() {
                    write!(f, "S")?;
                }
                match opcode {
                    DataOp::Mov => write!(f, " {rd}")?,
                    DataOp::Tst | DataOp::Teq | DataOp::Cmp => write!(f, " {rn}")?,
                    _ => write!(f, " {rd},{rn}")?,
                }
                match operand2 {
                    DpOperand::Immediate(imm) => write!(f, ",#{}", imm.evaluate().value)?,
                    DpOperand::Register(sr) => write!(f, ",{sr}")?,
                }
            }
            Instr::Mul { accumulate, set_flags, rd, rn, rs, rm } => {
                write!(f, "{}{cond}", if *accumulate { "MLA" } else { "MUL" })?;
                if *set_flags {
                    write!(f, "S")?;
                }
                write!(f, " {rd},{rm},{rs}")?;
                if *accumulate {
                    write!(f, ",{rn}")?;
                }
            }
            Instr::Sdt { load, pre_index, up, rn, rd, offset } => {
                write!(f, "{}{cond} {rd},[{rn}", if *load { "LDR" } else { "STR" })?;
                if !*pre_index {
                    write!(f, "]")?;
                }
                let sign = if *up { "" } else { "-" };
                match offset {
                    SdtOffset::Immediate(0) => {}
                    SdtOffset::Immediate(n) => write!(f, ",#{sign}{n}")?,
                    SdtOffset::Register(sr) => write!(f, ",{sign}{sr}")?,
                }
                if *pre_index {
                    write!(f, "]")?;
                }
            }
            Instr::Brn { offset } => {
                write!(f, "B{cond} PC+#{offset}")?;
            }
            Instr::Hal => {
                write!(f, "HALT")?;
            }
        }
        Ok(())
    }

    pub fn display(&self, cond: Cond) -> String {
        let mut w = String::new();
        self.write(cond, &mut w).unwrap();
        w
    }
}
