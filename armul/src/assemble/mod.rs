//! Turns assembly source into a flat byte image: one pass over the lines,
//! a symbol table for labels already seen, and a forward-reference table
//! for branches to labels that haven't been declared yet.
//!
//! Grounded in `assemble.c`'s top-level loop (tokenize, parse, encode,
//! advance the program counter) and `parser.c`'s `parse_label`, which
//! patches every pending reference the instant its label is declared.

pub mod parser;
pub mod tokenizer;

use crate::error::{AsmError, LineError};
use crate::instr::Instr;
use crate::reference::ReferenceTable;
use crate::symbol::SymbolTable;

use parser::LineOutcome;

/// The result of a successful assembly: the emitted byte image plus the
/// resolved label table, useful for tests and tooling.
#[derive(Debug)]
pub struct AssembledProgram {
    pub image: Vec<u8>,
    pub labels: SymbolTable,
}

struct PendingLiteral {
    ldr_address: u32,
    rd: crate::instr::Register,
    cond: crate::instr::Cond,
    value: u32,
}

/// Assembles a whole source file into a byte image.
///
/// Returns every line's error rather than stopping at the first one, so a
/// caller can report all of them at once.
pub fn assemble(source: &str) -> Result<AssembledProgram, Vec<LineError>> {
    let mut words: Vec<u32> = Vec::new();
    let mut symbols = SymbolTable::default();
    let mut references = ReferenceTable::default();
    let mut pending_literals: Vec<PendingLiteral> = Vec::new();
    let mut errors: Vec<LineError> = Vec::new();

    for (line_number, line) in source.lines().enumerate() {
        let line_number = line_number + 1;
        let tokens = tokenizer::tokenize(line);
        let outcome = match parser::parse_line(&tokens) {
            Ok(outcome) => outcome,
            Err(source) => {
                errors.push(report(line_number, source));
                continue;
            }
        };
        let Some(outcome) = outcome else { continue };

        let address = (words.len() * 4) as u32;
        match outcome {
            LineOutcome::Label(label) => {
                if !symbols.declare(&label, address) {
                    errors.push(report(line_number, AsmError::DuplicateLabel(label)));
                    continue;
                }
                for patch in references.take_pending(&label) {
                    match branch_word(patch.cond, patch.address, address) {
                        Ok(word) => words[patch.address as usize / 4] = word,
                        Err(err) => errors.push(report(line_number, err)),
                    }
                }
            }
            LineOutcome::Instr(cond, instr) => match instr.encode(cond) {
                Ok(word) => words.push(word),
                Err(err) => errors.push(report(line_number, err.into())),
            },
            LineOutcome::Branch { cond, label } => {
                if let Some(target) = symbols.resolve(&label) {
                    match branch_word(cond, address, target) {
                        Ok(word) => words.push(word),
                        Err(err) => errors.push(report(line_number, err)),
                    }
                } else {
                    references.request(&label, address, cond);
                    words.push(0);
                }
            }
            LineOutcome::PendingLiteral { cond, rd, value } => {
                pending_literals.push(PendingLiteral { ldr_address: address, rd, cond, value });
                words.push(0);
            }
        }
    }

    for label in references.unresolved_labels().map(str::to_owned).collect::<Vec<_>>() {
        errors.push(report(source.lines().count(), AsmError::UndefinedLabel(label)));
    }

    let pool_base = (words.len() * 4) as u32;
    for (i, literal) in pending_literals.iter().enumerate() {
        let literal_address = pool_base + 4 * i as u32;
        let byte_offset = literal_address as i64 - (literal.ldr_address as i64 + 8);
        let up = byte_offset >= 0;
        let instr = Instr::Sdt {
            load: true,
            pre_index: true,
            up,
            rn: crate::instr::Register::PC,
            rd: literal.rd,
            offset: crate::instr::SdtOffset::Immediate(byte_offset.unsigned_abs() as u16),
        };
        match instr.encode(literal.cond) {
            Ok(word) => words[literal.ldr_address as usize / 4] = word,
            Err(err) => errors.push(report(0, err.into())),
        }
        words.push(literal.value);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut image = Vec::with_capacity(words.len() * 4);
    for word in words {
        image.extend_from_slice(&word.to_le_bytes());
    }
    Ok(AssembledProgram { image, labels: symbols })
}

fn branch_word(cond: crate::instr::Cond, at: u32, target: u32) -> Result<u32, AsmError> {
    let byte_offset = target as i64 - (at as i64 + 8);
    if byte_offset % 4 != 0 {
        return Err(AsmError::BranchOutOfRange);
    }
    let offset = i32::try_from(byte_offset).map_err(|_| AsmError::BranchOutOfRange)?;
    Instr::Brn { offset }.encode(cond).map_err(AsmError::from)
}

fn report(line_number: usize, source: AsmError) -> LineError {
    LineError { line: line_number, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{Cond, Instr};

    #[test]
    fn assembles_a_simple_program() {
        let source = "MOV R0,#5\nADD R1,R0,#1\nANDEQ R0,R0,R0\n";
        let program = assemble(source).expect("assembly should succeed");
        assert_eq!(program.image.len(), 12);
        let word0 = u32::from_le_bytes(program.image[0..4].try_into().unwrap());
        let (cond, instr) = Instr::decode(word0).unwrap();
        assert_eq!(cond, Cond::Al);
        assert!(matches!(instr, Instr::Dp { opcode: crate::instr::DataOp::Mov, .. }));
    }

    #[test]
    fn resolves_a_forward_branch() {
        let source = "B loop\nMOV R0,#1\nloop:\nANDEQ R0,R0,R0\n";
        let program = assemble(source).expect("assembly should succeed");
        let word0 = u32::from_le_bytes(program.image[0..4].try_into().unwrap());
        let (_, instr) = Instr::decode(word0).unwrap();
        assert_eq!(instr, Instr::Brn { offset: 4 });
    }

    #[test]
    fn reports_duplicate_labels() {
        let source = "loop:\nloop:\nANDEQ R0,R0,R0\n";
        let errors = assemble(source).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn reports_undefined_labels() {
        let source = "B nowhere\nANDEQ R0,R0,R0\n";
        let errors = assemble(source).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.source, AsmError::UndefinedLabel(_))));
    }
}
