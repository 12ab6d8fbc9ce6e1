//! Error types for the assembler and emulator pipelines.
//!
//! Both enums cover what the reference implementation's `error_code` would
//! call `EC_INVALID_PARAM`/`EC_UNSUPPORTED_OP`; `EC_OK` is `Result::Ok` and
//! `EC_SKIP`/`EC_IS_LABEL` never escape their owning module (see
//! `assemble::LineOutcome`).

use crate::instr::Register;

/// Failures that can occur while assembling a single line of source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: &'static str, found: String },
    #[error("expected another token after '{0}'")]
    UnexpectedEnd(String),
    #[error("register R{0} cannot appear in this position")]
    InvalidRegister(u8),
    #[error("'{0}' is not a valid register name")]
    BadRegisterName(String),
    #[error("condition suffix '{0}' is not recognised")]
    BadCondition(String),
    #[error("'{0}' is not a valid number")]
    BadNumber(String),
    #[error("immediate value {0:#x} cannot be encoded as a rotated 8-bit constant")]
    ImmediateNotEncodable(u32),
    #[error("label '{0}' is declared more than once")]
    DuplicateLabel(String),
    #[error("label '{0}' is never declared")]
    UndefinedLabel(String),
    #[error("branch target is out of range of a 26-bit signed displacement")]
    BranchOutOfRange,
    #[error(transparent)]
    Encode(#[from] crate::instr::encode::EncodeError),
}

/// A single assembler diagnostic, tagged with the source line it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}: {source}")]
pub struct LineError {
    pub line: usize,
    #[source]
    pub source: AsmError,
}

/// Failures that can occur while decoding or executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("word {0:#010x} at address {1:#06x} does not decode to a known instruction")]
    UndecodableWord(u32, u16),
    #[error("register R{0} is not a valid operand register")]
    InvalidRegister(u8),
    #[error("address {0:#06x} is outside the {1}-byte address space")]
    OutOfBounds(u32, usize),
}

impl ExecError {
    pub fn invalid_register(reg: Register) -> ExecError {
        ExecError::InvalidRegister(reg.index())
    }
}
