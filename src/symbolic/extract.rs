//! Typed reads out of a [`StateSnapshot`].
//!
//! Every accessor is side-effect free and fails with [`InsufficientState`] instead of
//! fabricating a value, so a miswired hook degrades to "no finding" rather than a false one.

use alloy::primitives::U256;
use z3::ast::BV;

use crate::error::{DetectorError, InsufficientState, Result};
use crate::symbolic::opcodes;
use crate::symbolic::state::StateSnapshot;
use crate::symbolic::z3_ext::{bv_from_u256, ADDRESS_BITS, WORD_BITS};

/// A contiguous bit range inside a 256-bit storage word.
///
/// Solidity packs small state variables into one slot, so a detector has to isolate the
/// exact sub-field it reasons about. Offsets count from the least significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    offset_bits: u32,
    width_bits: u32,
}

impl FieldLayout {
    pub fn new(offset_bits: u32, width_bits: u32) -> Result<Self> {
        if width_bits == 0 {
            return Err(DetectorError::Layout("field width must be non-zero".to_string()));
        }
        match offset_bits.checked_add(width_bits) {
            Some(end) if end <= WORD_BITS => Ok(Self {
                offset_bits,
                width_bits,
            }),
            _ => Err(DetectorError::Layout(format!(
                "field [{offset_bits}, {offset_bits}+{width_bits}) exceeds the {WORD_BITS}-bit word"
            ))),
        }
    }

    /// A 20-byte account identity packed `byte_offset` bytes above the slot's low end.
    pub fn address_at_byte(byte_offset: u32) -> Result<Self> {
        let offset_bits = byte_offset
            .checked_mul(8)
            .ok_or_else(|| DetectorError::Layout(format!("byte offset {byte_offset} overflows")))?;
        Self::new(offset_bits, ADDRESS_BITS)
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn width_bits(&self) -> u32 {
        self.width_bits
    }

    /// Extract this field from a full word; the result is `width_bits` wide.
    pub fn slice<'ctx>(&self, word: &BV<'ctx>) -> std::result::Result<BV<'ctx>, InsufficientState> {
        let actual = word.get_size();
        if actual != WORD_BITS {
            return Err(InsufficientState::OperandWidth {
                operand: "storage word",
                expected: WORD_BITS,
                actual,
            });
        }
        let high = self.offset_bits + self.width_bits - 1;
        Ok(word.extract(high, self.offset_bits))
    }
}

/// A protected storage variable: the slot it lives in and where it sits inside that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectedField {
    pub slot: U256,
    pub layout: FieldLayout,
}

/// Operands of a storage write, as seen right before it executes.
#[derive(Debug, Clone)]
pub struct StoreOperands<'ctx> {
    pub slot: BV<'ctx>,
    pub value: BV<'ctx>,
}

/// Top `count` stack operands, top first. Fails if the stack is shallower than `count` or
/// than the current instruction's own arity.
pub fn stack_operands<'ctx>(
    snapshot: &StateSnapshot<'ctx>,
    count: usize,
) -> std::result::Result<Vec<BV<'ctx>>, InsufficientState> {
    let instruction = snapshot.instruction;
    let Some(op) = opcodes::info(instruction.opcode) else {
        return Err(InsufficientState::UndefinedOpcode {
            pc: instruction.address,
            opcode: instruction.opcode,
        });
    };
    let mnemonic = op.as_str();
    let required = count.max(usize::from(op.inputs()));
    if snapshot.stack.len() < required {
        return Err(InsufficientState::StackUnderflow {
            pc: instruction.address,
            mnemonic,
            required,
            available: snapshot.stack.len(),
        });
    }
    (0..count)
        .map(|offset| {
            snapshot
                .stack
                .peek(offset)
                .cloned()
                .ok_or(InsufficientState::StackUnderflow {
                    pc: instruction.address,
                    mnemonic,
                    required,
                    available: snapshot.stack.len(),
                })
        })
        .collect()
}

/// SSTORE operands: slot on top of the stack, value to be written right below it.
pub fn store_operands<'ctx>(
    snapshot: &StateSnapshot<'ctx>,
) -> std::result::Result<StoreOperands<'ctx>, InsufficientState> {
    let instruction = snapshot.instruction;
    if instruction.opcode != opcodes::SSTORE {
        return Err(InsufficientState::UnexpectedInstruction {
            pc: instruction.address,
            opcode: instruction.opcode,
            expected: "SSTORE",
        });
    }
    let mut operands = stack_operands(snapshot, 2)?.into_iter();
    match (operands.next(), operands.next()) {
        (Some(slot), Some(value)) => {
            check_word("store slot", &slot)?;
            check_word("store value", &value)?;
            Ok(StoreOperands { slot, value })
        }
        _ => Err(InsufficientState::StackUnderflow {
            pc: instruction.address,
            mnemonic: "SSTORE",
            required: 2,
            available: snapshot.stack.len(),
        }),
    }
}

/// Current (pre-instruction) value of a concrete storage slot of the active account.
pub fn storage_cell<'ctx>(
    snapshot: &StateSnapshot<'ctx>,
    slot: U256,
) -> std::result::Result<BV<'ctx>, InsufficientState> {
    let key = bv_from_u256(snapshot.ctx, slot);
    let word = snapshot
        .storage_read(&key)
        .ok_or_else(|| InsufficientState::UnreadableStorage {
            slot: format!("{slot:#x}"),
        })?;
    check_word("storage word", &word)?;
    Ok(word)
}

fn check_word(operand: &'static str, word: &BV) -> std::result::Result<(), InsufficientState> {
    let actual = word.get_size();
    if actual == WORD_BITS {
        Ok(())
    } else {
        Err(InsufficientState::OperandWidth {
            operand,
            expected: WORD_BITS,
            actual,
        })
    }
}
