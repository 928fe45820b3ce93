use alloy::primitives::{Address, Bytes, U256};
use z3::ast::{Array, Ast, Bool, BV};
use z3::{Context, Sort};

use crate::symbolic::opcodes;
use crate::symbolic::utils::math::{val, zero};
use crate::symbolic::z3_ext::{bv_from_u256, ADDRESS_BITS, WORD_BITS};

#[derive(Debug, Clone)]
pub struct SymbolicStack<'ctx> {
    pub ctx: &'ctx Context,
    pub stack: Vec<BV<'ctx>>,
}

impl<'ctx> SymbolicStack<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
        }
    }
    pub fn push(&mut self, val: BV<'ctx>) {
        self.stack.push(val);
    }
    /// `offset` 0 is the top of the stack. Underflow is reported, never papered over with zero.
    pub fn peek(&self, offset: usize) -> Option<&BV<'ctx>> {
        if self.stack.len() <= offset {
            return None;
        }
        self.stack.get(self.stack.len() - 1 - offset)
    }
    pub fn len(&self) -> usize {
        self.stack.len()
    }
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionMeta {
    /// Program counter of the instruction within the active account's code.
    pub address: usize,
    pub opcode: u8,
}

impl InstructionMeta {
    pub fn new(address: usize, opcode: u8) -> Self {
        Self { address, opcode }
    }

    pub fn mnemonic(&self) -> Option<&'static str> {
        opcodes::mnemonic(self.opcode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub address: Address,
    pub contract_name: String,
    pub code: Bytes,
}

#[derive(Debug, Clone)]
pub struct Environment<'ctx> {
    /// 256-bit sender word of the transaction currently executing.
    pub sender: BV<'ctx>,
    pub active_account: AccountView,
    pub active_function_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GasBounds {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    ContractCreation,
    MessageCall,
}

/// One transaction of the explored path, with its inputs left symbolic.
#[derive(Debug, Clone)]
pub struct SymbolicTransaction<'ctx> {
    pub id: usize,
    pub kind: TransactionKind,
    pub target: Address,
    pub sender: BV<'ctx>,
    pub call_value: BV<'ctx>,
    /// Byte-typed calldata (BV<256> -> BV<8>) and its symbolic length.
    pub calldata: Array<'ctx>,
    pub calldata_size: BV<'ctx>,
}

impl<'ctx> SymbolicTransaction<'ctx> {
    /// Fresh inputs named `sender_{id}`, `call_value_{id}`, `calldata_{id}`, `calldatasize_{id}`.
    pub fn new(ctx: &'ctx Context, id: usize, kind: TransactionKind, target: Address) -> Self {
        let index = Sort::bitvector(ctx, WORD_BITS);
        let byte = Sort::bitvector(ctx, 8);
        Self {
            id,
            kind,
            target,
            sender: BV::new_const(ctx, format!("sender_{id}"), WORD_BITS),
            call_value: BV::new_const(ctx, format!("call_value_{id}"), WORD_BITS),
            calldata: Array::new_const(ctx, format!("calldata_{id}"), &index, &byte),
            calldata_size: BV::new_const(ctx, format!("calldatasize_{id}"), WORD_BITS),
        }
    }

    /// CALLDATALOAD semantics: bytes at or past `calldata_size` read as zero.
    pub fn calldata_word(&self, offset: u64) -> BV<'ctx> {
        let ctx = self.sender.get_ctx();
        let mut word: Option<BV<'ctx>> = None;
        for i in 0..32u64 {
            let idx = val(ctx, offset + i);
            let raw = select_byte(&self.calldata, &idx);
            let byte = idx
                .bvult(&self.calldata_size)
                .ite(&raw, &BV::from_u64(ctx, 0, 8));
            word = Some(match word {
                Some(acc) => acc.concat(&byte),
                None => byte,
            });
        }
        word.unwrap_or_else(|| zero(ctx))
    }

    /// Constraints every real transaction satisfies: the sender is a 160-bit account and the
    /// calldata fits in `max_calldata_bytes`.
    pub fn well_formedness(&self, max_calldata_bytes: u64) -> Vec<Bool<'ctx>> {
        let ctx = self.sender.get_ctx();
        let high_bits = self.sender.extract(WORD_BITS - 1, ADDRESS_BITS);
        vec![
            high_bits._eq(&BV::from_u64(ctx, 0, WORD_BITS - ADDRESS_BITS)),
            self.calldata_size.bvule(&val(ctx, max_calldata_bytes)),
        ]
    }
}

fn select_byte<'ctx>(bytes: &Array<'ctx>, idx: &BV<'ctx>) -> BV<'ctx> {
    bytes
        .select(idx)
        .as_bv()
        .unwrap_or_else(|| BV::from_u64(idx.get_ctx(), 0, 8))
}

/// Storage array with every slot unconstrained.
pub fn symbolic_storage<'ctx>(ctx: &'ctx Context, name: &str) -> Array<'ctx> {
    let domain = Sort::bitvector(ctx, WORD_BITS);
    Array::new_const(ctx, name, &domain, &domain)
}

/// Read-only view of the host engine's state at one hook point.
///
/// The host owns the snapshot; detection modules borrow it for the length of a single
/// invocation and must not retain any term taken from it.
#[derive(Debug, Clone)]
pub struct StateSnapshot<'ctx> {
    pub ctx: &'ctx Context,
    pub stack: SymbolicStack<'ctx>,
    /// Storage of the active account (BV<256> -> BV<256>) before the current instruction.
    pub storage: Array<'ctx>,
    pub instruction: InstructionMeta,
    pub environment: Environment<'ctx>,
    pub gas: GasBounds,
    /// Path constraints accumulated so far.
    pub constraints: Vec<Bool<'ctx>>,
    /// Transactions of the explored path, oldest first. The last one is executing.
    pub transactions: Vec<SymbolicTransaction<'ctx>>,
}

impl<'ctx> StateSnapshot<'ctx> {
    /// Snapshot with an empty stack, unconstrained storage and no path constraints.
    pub fn new(
        ctx: &'ctx Context,
        instruction: InstructionMeta,
        environment: Environment<'ctx>,
    ) -> Self {
        let storage_name = format!("storage_{:#x}", environment.active_account.address);
        Self {
            ctx,
            stack: SymbolicStack::new(ctx),
            storage: symbolic_storage(ctx, &storage_name),
            instruction,
            environment,
            gas: GasBounds::default(),
            constraints: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn storage_read(&self, slot: &BV<'ctx>) -> Option<BV<'ctx>> {
        self.storage.select(slot).as_bv()
    }

    pub fn set_storage_word(&mut self, slot: U256, value: &BV<'ctx>) {
        let key = bv_from_u256(self.ctx, slot);
        self.storage = self.storage.store(&key, value);
    }

    pub fn constrain(&mut self, constraint: Bool<'ctx>) {
        self.constraints.push(constraint);
    }

    pub fn current_transaction(&self) -> Option<&SymbolicTransaction<'ctx>> {
        self.transactions.last()
    }
}
