//! Fixture-driven test procedure for assembly programs under `test/`.
//!
//! Each fixture is assembled, run to its halt, and checked against `;!`
//! directive comments at the top of the file: `;!R3 12` expects R3 to hold
//! 12 (or a declared label's address) once the machine halts. There is no
//! step budget or processor mode to configure here -- this ISA has neither.

use crate::assemble::assemble;
use crate::error::{ExecError, LineError};
use crate::exec::Machine;
use crate::instr::Register;
use crate::memory::{Memory, NullSink};

#[derive(Debug)]
pub enum TestError {
    FileError(String),
    AssemblerError(Vec<LineError>),
    ExecError(ExecError),
    InvalidComment(String),
    InvalidParams(&'static str, String),
}

const REGISTER_NAMES: &[(&str, u8)] = &[
    ("R0", 0),
    ("R1", 1),
    ("R2", 2),
    ("R3", 3),
    ("R4", 4),
    ("R5", 5),
    ("R6", 6),
    ("R7", 7),
    ("R8", 8),
    ("R9", 9),
    ("R10", 10),
    ("R11", 11),
    ("R12", 12),
    ("PC", 15),
];

enum Expectation {
    Register(Register, u32),
    Cpsr(u32),
}

pub fn test(src: &str) -> Result<(), TestError> {
    let program = assemble(src).map_err(TestError::AssemblerError)?;
    println!("assembled into {} bytes", program.image.len());

    let mut expectations = Vec::new();
    for line in src.lines() {
        let Some(comment) = line.trim_start().strip_prefix(";!") else { continue };
        let comment = comment.trim();
        let Some((kwd, params)) = comment.split_once(' ') else {
            return Err(TestError::InvalidComment(comment.to_owned()));
        };
        let kwd = kwd.to_uppercase();
        let value = parse_param(&program, params.trim())?;
        if kwd == "CPSR" {
            expectations.push(Expectation::Cpsr(value));
            continue;
        }
        let Some(&(_, index)) = REGISTER_NAMES.iter().find(|(name, _)| *name == kwd) else {
            return Err(TestError::InvalidComment(comment.to_owned()));
        };
        expectations.push(Expectation::Register(Register::new(index), value));
    }

    let mut machine = Machine::new(Memory::from_image(&program.image));
    machine.run(&mut NullSink).map_err(TestError::ExecError)?;

    println!("halted:\n{}", machine.registers);
    for expectation in expectations {
        match expectation {
            Expectation::Register(reg, value) => {
                let actual = machine.registers.get(reg).map_err(TestError::ExecError)?;
                assert_eq!(actual, value, "mismatch on register {reg}");
            }
            Expectation::Cpsr(value) => {
                assert_eq!(machine.registers.cpsr(), value, "mismatch on CPSR");
            }
        }
    }
    Ok(())
}

fn parse_param(program: &crate::assemble::AssembledProgram, params: &str) -> Result<u32, TestError> {
    if let Some(hex) = params.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16).map_err(|_| TestError::InvalidParams("parameter", params.to_owned()));
    }
    match params.parse::<i64>() {
        Ok(x) => Ok(x as u32),
        Err(_) => program
            .labels
            .resolve(params)
            .ok_or_else(|| TestError::InvalidParams("parameter", params.to_owned())),
    }
}
