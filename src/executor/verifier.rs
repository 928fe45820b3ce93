//! Concrete replay of solver witnesses.
//!
//! A witness is only as good as its replay: deploy the runtime code with the initial storage
//! into an in-memory revm database, run the witness transactions in order, and record every
//! storage write the interpreter actually performs.

use alloy::primitives::{Address, Bytes, U256};
use anyhow::anyhow;
use revm::db::InMemoryDB;
use revm::interpreter::Interpreter;
use revm::primitives::{AccountInfo, Bytecode, ExecutionResult, TransactTo};
use revm::{Database, Evm, EvmContext, Inspector};

use crate::solver::outcome::TransactionSequence;
use crate::symbolic::opcodes;
use crate::symbolic::state::TransactionKind;
use crate::symbolic::z3_ext::{alloy_to_revm, revm_to_alloy, u256_from_revm, u256_to_revm};
use crate::utils::hex::encode_prefixed;

const REPLAY_GAS_LIMIT: u64 = 10_000_000;

/// One SSTORE the interpreter executed, operands as read right before it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHit {
    /// Index of the replayed transaction within the witness.
    pub tx_index: usize,
    pub pc: usize,
    pub address: Address,
    pub caller: Address,
    pub slot: U256,
    pub value: U256,
}

/// revm inspector that records every SSTORE.
#[derive(Debug, Default)]
pub struct StoreRecorder {
    pub hits: Vec<StoreHit>,
    tx_index: usize,
}

impl<DB: Database> Inspector<DB> for StoreRecorder {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        if interp.current_opcode() != opcodes::SSTORE {
            return;
        }
        let (Ok(slot), Ok(value)) = (interp.stack().peek(0), interp.stack().peek(1)) else {
            return;
        };
        self.hits.push(StoreHit {
            tx_index: self.tx_index,
            pc: interp.program_counter(),
            address: revm_to_alloy(interp.contract.target_address),
            caller: revm_to_alloy(interp.contract.caller),
            slot: u256_from_revm(slot),
            value: u256_from_revm(value),
        });
    }
}

/// World state a witness is replayed against.
#[derive(Debug, Clone)]
pub struct ReplaySetup {
    pub target: Address,
    /// Runtime bytecode of the target account.
    pub code: Bytes,
    pub storage: Vec<(U256, U256)>,
    /// Slot whose final value the report carries.
    pub watched_slot: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStep {
    pub tx_index: usize,
    pub caller: Address,
    pub success: bool,
    pub gas_used: u64,
    /// Revert data or halt reason when the step failed.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub steps: Vec<ReplayStep>,
    pub store_hits: Vec<StoreHit>,
    pub final_watched_value: U256,
}

impl ReplayReport {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|step| step.success)
    }

    /// Writes to `slot` made by `caller`.
    pub fn stores_to(&self, slot: U256, caller: Address) -> impl Iterator<Item = &StoreHit> {
        self.store_hits
            .iter()
            .filter(move |hit| hit.slot == slot && hit.caller == caller)
    }
}

pub fn replay_witness(
    setup: &ReplaySetup,
    sequence: &TransactionSequence,
) -> anyhow::Result<ReplayReport> {
    let mut db = InMemoryDB::default();
    let target = alloy_to_revm(setup.target);
    let bytecode = Bytecode::new_raw(revm::primitives::Bytes::copy_from_slice(&setup.code));
    db.insert_account_info(
        target,
        AccountInfo::new(
            revm::primitives::U256::ZERO,
            1,
            bytecode.hash_slow(),
            bytecode,
        ),
    );
    for (slot, value) in &setup.storage {
        db.insert_account_storage(target, u256_to_revm(*slot), u256_to_revm(*value))
            .map_err(|err| anyhow!("seeding storage slot {slot:#x} failed: {err:?}"))?;
    }

    let mut recorder = StoreRecorder::default();
    let mut steps = Vec::with_capacity(sequence.len());

    for (tx_index, tx) in sequence.iter().enumerate() {
        if tx.kind == TransactionKind::ContractCreation {
            tracing::debug!(
                "[REPLAY] tx {} is a contract creation; runtime code is deployed directly",
                tx.id
            );
            continue;
        }

        let caller = alloy_to_revm(tx.caller);
        // Gas is free on replay; the caller only needs to cover the call value.
        db.insert_account_info(
            caller,
            AccountInfo::from_balance(u256_to_revm(tx.call_value)),
        );
        recorder.tx_index = tx_index;

        let result = {
            let mut evm = Evm::builder()
                .with_db(&mut db)
                .with_external_context(&mut recorder)
                .append_handler_register(revm::inspector_handle_register)
                .modify_tx_env(|env| {
                    env.caller = caller;
                    env.transact_to = TransactTo::Call(alloy_to_revm(tx.target));
                    env.data = revm::primitives::Bytes::copy_from_slice(&tx.calldata);
                    env.value = u256_to_revm(tx.call_value);
                    env.gas_limit = REPLAY_GAS_LIMIT;
                    env.gas_price = revm::primitives::U256::ZERO;
                })
                .build();
            evm.transact_commit()
        }
        .map_err(|err| anyhow!("replay of tx {} rejected: {err:?}", tx.id))?;

        let step = match result {
            ExecutionResult::Success { gas_used, .. } => ReplayStep {
                tx_index,
                caller: tx.caller,
                success: true,
                gas_used,
                failure: None,
            },
            ExecutionResult::Revert { gas_used, output } => ReplayStep {
                tx_index,
                caller: tx.caller,
                success: false,
                gas_used,
                failure: Some(format!("revert: {}", encode_prefixed(output.as_ref()))),
            },
            ExecutionResult::Halt { reason, gas_used } => ReplayStep {
                tx_index,
                caller: tx.caller,
                success: false,
                gas_used,
                failure: Some(format!("halt: {reason:?}")),
            },
        };
        tracing::debug!(
            "[REPLAY] tx {} from {:#x}: success={} gas_used={}",
            tx.id,
            tx.caller,
            step.success,
            step.gas_used
        );
        steps.push(step);
    }

    let final_watched_value = db
        .storage(target, u256_to_revm(setup.watched_slot))
        .map(u256_from_revm)
        .map_err(|err| anyhow!("reading watched slot failed: {err:?}"))?;

    Ok(ReplayReport {
        steps,
        store_hits: recorder.hits,
        final_watched_value,
    })
}
