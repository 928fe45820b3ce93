use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("insufficient state: {0}")]
    InsufficientState(#[from] InsufficientState),
    #[error("invalid field layout: {0}")]
    Layout(String),
    #[error("invalid module registration: {0}")]
    Registration(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The snapshot does not carry what a module needs. Always recovered locally as "no finding".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsufficientState {
    #[error("{mnemonic} at pc={pc} needs {required} stack operands, found {available}")]
    StackUnderflow {
        pc: usize,
        mnemonic: &'static str,
        required: usize,
        available: usize,
    },
    #[error("expected {expected} at pc={pc}, got opcode 0x{opcode:02x}")]
    UnexpectedInstruction {
        pc: usize,
        opcode: u8,
        expected: &'static str,
    },
    #[error("undefined opcode 0x{opcode:02x} at pc={pc}")]
    UndefinedOpcode { pc: usize, opcode: u8 },
    #[error("no executing transaction at pc={pc}")]
    NoTransaction { pc: usize },
    #[error("storage read of slot {slot} did not yield a bit-vector")]
    UnreadableStorage { slot: String },
    #[error("operand `{operand}` is {actual} bits wide, expected {expected}")]
    OperandWidth {
        operand: &'static str,
        expected: u32,
        actual: u32,
    },
}
