//! Parses one already-tokenized line into an [`Instr`], a label declaration,
//! or a pending literal-pool load.
//!
//! Grounded in the reference `parser.c`'s per-mnemonic `parse_*` functions:
//! the dispatch order (label, then `B`-prefixed branch, then the `LSL`
//! pseudo-op, then the opcode table) and each instruction's operand grammar
//! follow it line for line, adapted to tokens instead of a cursor over raw
//! characters.

use crate::error::AsmError;
use crate::instr::{
    Cond, DataOp, DpOperand, Instr, Register, RotatedImmediate, SdtOffset, ShiftAmount,
    ShiftType, ShiftedRegister,
};

/// What one parsed line amounts to, before the driver assigns it an address.
#[derive(Debug)]
pub enum LineOutcome {
    Label(String),
    Instr(Cond, Instr),
    /// A branch to a label, resolved by the driver against the symbol table
    /// (or the forward-reference table, if the label hasn't been declared
    /// yet) rather than by the parser.
    Branch { cond: Cond, label: String },
    /// `LDR Rd,=value` when `value` doesn't fit a rotated 8-bit immediate:
    /// emitted as `LDR Rd,[PC,#0]` with the real offset patched in once the
    /// literal pool's final position is known.
    PendingLiteral { cond: Cond, rd: Register, value: u32 },
}

pub fn parse_line(tokens: &[String]) -> Result<Option<LineOutcome>, AsmError> {
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() == 2 && tokens[1] == ":" {
        return Ok(Some(LineOutcome::Label(tokens[0].clone())));
    }

    let mnemonic = tokens[0].to_uppercase();
    let rest = &tokens[1..];

    if let Some(suffix) = mnemonic.strip_prefix('B') {
        if let Some(cond) = parse_cond_suffix(suffix) {
            return Ok(Some(parse_branch(cond, rest)?));
        }
    }
    if mnemonic == "LSL" {
        return Ok(Some(parse_lsl(rest)?));
    }
    if mnemonic == "ANDEQ" {
        return Ok(Some(LineOutcome::Instr(Cond::Eq, Instr::Hal)));
    }

    if let Some((op, set_flags)) = dp_mnemonic(&mnemonic) {
        return Ok(Some(parse_dp(op, set_flags, rest)?));
    }
    if mnemonic == "MUL" {
        return Ok(Some(parse_mul(false, rest)?));
    }
    if mnemonic == "MLA" {
        return Ok(Some(parse_mul(true, rest)?));
    }
    if mnemonic == "LDR" {
        return Ok(parse_sdt(true, rest)?);
    }
    if mnemonic == "STR" {
        return Ok(Some(parse_sdt(false, rest)?.expect("STR never yields a pending literal")));
    }

    Err(AsmError::UnknownMnemonic(tokens[0].clone()))
}

/// Matches a data-processing mnemonic, stripping the optional trailing `S`
/// flag-setting suffix on the opcodes that allow one. Returns the opcode and
/// whether the S bit should be set.
fn dp_mnemonic(mnemonic: &str) -> Option<(DataOp, bool)> {
    let (base, suffixable_set_flags) = match mnemonic.strip_suffix('S') {
        Some(base) if matches!(base, "AND" | "EOR" | "SUB" | "RSB" | "ADD" | "ORR" | "MOV") => {
            (base, true)
        }
        _ => (mnemonic, false),
    };
    let op = match base {
        "AND" => DataOp::And,
        "EOR" => DataOp::Eor,
        "SUB" => DataOp::Sub,
        "RSB" => DataOp::Rsb,
        "ADD" => DataOp::Add,
        "TST" => DataOp::Tst,
        "TEQ" => DataOp::Teq,
        "CMP" => DataOp::Cmp,
        "ORR" => DataOp::Orr,
        "MOV" => DataOp::Mov,
        _ => return None,
    };
    // TST/TEQ/CMP always compute flags; they have no writable destination,
    // so the `S` bit is implicit rather than a mnemonic suffix the user sets.
    Some((op, !op.writes_result() || suffixable_set_flags))
}

fn parse_cond_suffix(suffix: &str) -> Option<Cond> {
    match suffix {
        "" => Some(Cond::Al),
        "EQ" => Some(Cond::Eq),
        "NE" => Some(Cond::Ne),
        "GE" => Some(Cond::Ge),
        "LT" => Some(Cond::Lt),
        "GT" => Some(Cond::Gt),
        "LE" => Some(Cond::Le),
        "AL" => Some(Cond::Al),
        _ => None,
    }
}

fn expect<'a>(tokens: &'a [String], idx: usize, what: &'static str) -> Result<&'a str, AsmError> {
    tokens
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| AsmError::UnexpectedEnd(what.to_owned()))
}

fn expect_comma(tokens: &[String], idx: usize) -> Result<(), AsmError> {
    match tokens.get(idx).map(String::as_str) {
        Some(",") => Ok(()),
        Some(other) => Err(AsmError::UnexpectedToken { expected: "','", found: other.to_owned() }),
        None => Err(AsmError::UnexpectedEnd("','".to_owned())),
    }
}

fn parse_register(tok: &str) -> Result<Register, AsmError> {
    let upper = tok.to_uppercase();
    if upper == "PC" {
        return Ok(Register::PC);
    }
    let digits = upper.strip_prefix('R').ok_or_else(|| AsmError::BadRegisterName(tok.to_owned()))?;
    let n: u8 = digits.parse().map_err(|_| AsmError::BadRegisterName(tok.to_owned()))?;
    if n > 15 {
        return Err(AsmError::BadRegisterName(tok.to_owned()));
    }
    Ok(Register::new(n))
}

fn parse_number(tok: &str) -> Result<u32, AsmError> {
    let tok = tok.strip_prefix('#').unwrap_or(tok);
    let (negative, digits) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok),
    };
    let value: u32 = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| AsmError::BadNumber(tok.to_owned()))?
    } else {
        digits.parse().map_err(|_| AsmError::BadNumber(tok.to_owned()))?
    };
    Ok(if negative { value.wrapping_neg() } else { value })
}

fn parse_shift_type(tok: &str) -> Option<ShiftType> {
    match tok.to_uppercase().as_str() {
        "LSL" => Some(ShiftType::Lsl),
        "LSR" => Some(ShiftType::Lsr),
        "ASR" => Some(ShiftType::Asr),
        "ROR" => Some(ShiftType::Ror),
        _ => None,
    }
}

/// Parses a shifted-register operand starting at `tokens[idx]`: a register,
/// optionally followed by `, <shift-name> <amount>`. Returns the operand and
/// the index just past it.
///
/// Operand2 and the SDT register offset are always the last thing before the
/// line ends or the addressing mode's closing bracket, so a comma right
/// after `Rm` always belongs to a shift clause here, never to a caller.
/// `Rm, Rn` with no shift-name token is the ambiguous two-token form in
/// the source grammar; per the resolved reading it's `LSL` shifted by the
/// register `Rn`.
fn parse_shifted_register(tokens: &[String], idx: usize) -> Result<(ShiftedRegister, usize), AsmError> {
    let rm = parse_register(expect(tokens, idx, "a register")?)?;
    let mut idx = idx + 1;
    if tokens.get(idx).map(String::as_str) != Some(",") {
        return Ok((
            ShiftedRegister { rm, shift_type: ShiftType::Lsl, amount: ShiftAmount::Constant(0) },
            idx,
        ));
    }
    let next = expect(tokens, idx + 1, "a shift specifier")?;
    if let Some(shift_type) = parse_shift_type(next) {
        idx += 2;
        let amount_tok = expect(tokens, idx, "a shift amount")?;
        let amount = if amount_tok.starts_with('#') {
            ShiftAmount::Constant(parse_number(amount_tok)? as u8)
        } else {
            ShiftAmount::Register(parse_register(amount_tok)?)
        };
        idx += 1;
        return Ok((ShiftedRegister { rm, shift_type, amount }, idx));
    }
    let rs = parse_register(next)?;
    idx += 2;
    Ok((ShiftedRegister { rm, shift_type: ShiftType::Lsl, amount: ShiftAmount::Register(rs) }, idx))
}

/// Parses data-processing operand 2 starting at `tokens[idx]`: either
/// `#<immediate>` or a shifted register.
fn parse_dp_operand(tokens: &[String], idx: usize) -> Result<(DpOperand, usize), AsmError> {
    let tok = expect(tokens, idx, "an operand")?;
    if tok.starts_with('#') {
        let value = parse_number(tok)?;
        let imm = RotatedImmediate::encode_for(value)
            .ok_or(AsmError::ImmediateNotEncodable(value))?;
        Ok((DpOperand::Immediate(imm), idx + 1))
    } else {
        let (sr, next) = parse_shifted_register(tokens, idx)?;
        Ok((DpOperand::Register(sr), next))
    }
}

fn parse_dp(op: DataOp, set_flags: bool, tokens: &[String]) -> Result<LineOutcome, AsmError> {
    let rd_or_rn = parse_register(expect(tokens, 0, "a destination register")?)?;
    let mut idx = 1;
    expect_comma(tokens, idx)?;
    idx += 1;

    let (rd, rn) = if op == DataOp::Mov {
        (rd_or_rn, Register::new(0))
    } else if !op.writes_result() {
        // TST/TEQ/CMP: only Rn and operand2, no destination.
        (Register::new(0), rd_or_rn)
    } else {
        let rn = parse_register(expect(tokens, idx, "a source register")?)?;
        idx += 1;
        expect_comma(tokens, idx)?;
        idx += 1;
        (rd_or_rn, rn)
    };

    let (operand2, _) = parse_dp_operand(tokens, idx)?;
    Ok(LineOutcome::Instr(Cond::Al, Instr::Dp { opcode: op, set_flags, rn, rd, operand2 }))
}

fn parse_mul(accumulate: bool, tokens: &[String]) -> Result<LineOutcome, AsmError> {
    let rd = parse_register(expect(tokens, 0, "a destination register")?)?;
    expect_comma(tokens, 1)?;
    let rm = parse_register(expect(tokens, 2, "a register")?)?;
    expect_comma(tokens, 3)?;
    let rs = parse_register(expect(tokens, 4, "a register")?)?;
    let rn = if accumulate {
        expect_comma(tokens, 5)?;
        parse_register(expect(tokens, 6, "an accumulator register")?)?
    } else {
        Register::new(0)
    };
    Ok(LineOutcome::Instr(
        Cond::Al,
        Instr::Mul { accumulate, set_flags: false, rd, rn, rs, rm },
    ))
}

fn parse_sdt(load: bool, tokens: &[String]) -> Result<Option<LineOutcome>, AsmError> {
    let rd = parse_register(expect(tokens, 0, "a data register")?)?;
    expect_comma(tokens, 1)?;

    if load {
        if let Some(value_tok) = tokens.get(2).and_then(|t| t.strip_prefix('=')) {
            let value = parse_number(&format!("#{value_tok}"))?;
            return Ok(Some(match RotatedImmediate::encode_for(value) {
                Some(imm) => LineOutcome::Instr(
                    Cond::Al,
                    Instr::Dp {
                        opcode: DataOp::Mov,
                        set_flags: false,
                        rn: Register::new(0),
                        rd,
                        operand2: DpOperand::Immediate(imm),
                    },
                ),
                None => LineOutcome::PendingLiteral { cond: Cond::Al, rd, value },
            }));
        }
    }

    if tokens.get(2).map(String::as_str) != Some("[") {
        return Err(AsmError::UnexpectedToken {
            expected: "'['",
            found: tokens.get(2).cloned().unwrap_or_default(),
        });
    }
    let rn = parse_register(expect(tokens, 3, "a base register")?)?;
    let mut idx = 4;

    let (pre_index, up, offset) = match tokens.get(idx).map(String::as_str) {
        Some("]") => {
            idx += 1;
            // Optional post-indexed offset: `[Rn], #imm` / `[Rn], Rm`.
            if tokens.get(idx).map(String::as_str) == Some(",") {
                idx += 1;
                let (up, offset) = parse_sdt_offset(tokens, idx)?;
                (false, up, offset)
            } else {
                (true, true, SdtOffset::Immediate(0))
            }
        }
        Some(",") => {
            idx += 1;
            let (up, offset) = parse_sdt_offset(tokens, idx)?;
            // Consume the closing bracket and optional write-back `!`.
            idx = find_close_bracket(tokens, idx)?;
            let _ = idx;
            (true, up, offset)
        }
        other => {
            return Err(AsmError::UnexpectedToken {
                expected: "',' or ']'",
                found: other.unwrap_or_default().to_owned(),
            });
        }
    };

    Ok(Some(LineOutcome::Instr(Cond::Al, Instr::Sdt { load, pre_index, up, rn, rd, offset })))
}

fn find_close_bracket(tokens: &[String], mut idx: usize) -> Result<usize, AsmError> {
    while idx < tokens.len() && tokens[idx] != "]" {
        idx += 1;
    }
    if idx >= tokens.len() {
        return Err(AsmError::UnexpectedEnd("']'".to_owned()));
    }
    Ok(idx + 1)
}

/// Parses an SDT offset, returning its `U` (up/down) bit separately from its
/// magnitude -- the encoding stores them as distinct fields, so a signed
/// value has to be split apart here rather than reparsed as one.
fn parse_sdt_offset(tokens: &[String], idx: usize) -> Result<(bool, SdtOffset), AsmError> {
    let tok = expect(tokens, idx, "an offset")?;
    if let Some(imm_tok) = tok.strip_prefix('#') {
        let (up, digits) = match imm_tok.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, imm_tok),
        };
        let value = parse_number(&format!("#{digits}"))?;
        if value > 0xFFF {
            return Err(AsmError::ImmediateNotEncodable(value));
        }
        Ok((up, SdtOffset::Immediate(value as u16)))
    } else {
        // A register offset's sign is a leading `-` glued to the register
        // token itself (e.g. `-R5`); strip it before handing the token on to
        // the shifted-register parser, which doesn't expect it.
        let (up, first) = match tok.strip_prefix('-') {
            Some(rest) => (false, rest.to_owned()),
            None => (true, tok.to_owned()),
        };
        let mut patched = tokens.to_vec();
        patched[idx] = first;
        let (sr, _) = parse_shifted_register(&patched, idx)?;
        Ok((up, SdtOffset::Register(sr)))
    }
}

fn parse_branch(cond: Cond, tokens: &[String]) -> Result<LineOutcome, AsmError> {
    // The actual offset depends on this instruction's eventual address and
    // the label's, neither of which the parser knows; the driver resolves
    // the label against the symbol/reference tables instead.
    let label = expect(tokens, 0, "a branch target")?.to_owned();
    Ok(LineOutcome::Branch { cond, label })
}

/// `lsl Rn, <expr>` expands to `mov Rn, Rn, lsl <expr>`: the shifted
/// register is the same one being written.
fn parse_lsl(tokens: &[String]) -> Result<LineOutcome, AsmError> {
    let rd = parse_register(expect(tokens, 0, "a destination register")?)?;
    expect_comma(tokens, 1)?;
    let amount_tok = expect(tokens, 2, "a shift amount")?;
    let amount = if amount_tok.starts_with('#') {
        ShiftAmount::Constant(parse_number(amount_tok)? as u8)
    } else {
        ShiftAmount::Register(parse_register(amount_tok)?)
    };
    Ok(LineOutcome::Instr(
        Cond::Al,
        Instr::Dp {
            opcode: DataOp::Mov,
            set_flags: false,
            rn: Register::new(0),
            rd,
            operand2: DpOperand::Register(ShiftedRegister { rm: rd, shift_type: ShiftType::Lsl, amount }),
        },
    ))
}
