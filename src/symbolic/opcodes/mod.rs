//! Opcode facts for hook registration and operand extraction, read off revm's own table.
//!
//! Hook registration speaks mnemonics; snapshots carry raw opcode bytes.

use revm::interpreter::opcode::OpCode;

pub use revm::interpreter::opcode::{KECCAK256, SLOAD, SSTORE};

/// Defined opcode for `byte`, with its name and stack arity.
pub fn info(byte: u8) -> Option<OpCode> {
    OpCode::new(byte)
}

pub fn mnemonic(byte: u8) -> Option<&'static str> {
    info(byte).map(OpCode::as_str)
}

/// Case-insensitive; accepts the legacy `SHA3` alias for KECCAK256.
pub fn from_mnemonic(name: &str) -> Option<u8> {
    let upper = name.trim().to_ascii_uppercase();
    if upper == "SHA3" {
        return Some(KECCAK256);
    }
    (0..=u8::MAX).find(|byte| mnemonic(*byte) == Some(upper.as_str()))
}
