use alloy::primitives::{Bytes, U256};
use std::collections::BTreeMap;
use std::time::Instant;
use z3::ast::{Ast, Bool, BV};
use z3::{Model, SatResult, Solver};

use crate::solver::outcome::{SolverOutcome, TransactionSequence, Witness, WitnessTransaction};
use crate::symbolic::state::{StateSnapshot, SymbolicTransaction};
use crate::symbolic::utils::math::val;
use crate::symbolic::z3_ext::{configure_solver, u256_from_bv, u256_to_address, SolverLimits};
use crate::utils::config::DetectorConfig;

/// The solver surface consumed by detection modules.
///
/// "Given constraint set C, is it satisfiable; if so, produce a transaction-sequence witness."
/// Implementations never panic on solver trouble; they report it as `SolverError`.
pub trait TransactionSolver: Send + Sync {
    fn transaction_sequence<'ctx>(
        &self,
        snapshot: &StateSnapshot<'ctx>,
        constraints: &[Bool<'ctx>],
    ) -> SolverOutcome;
}

/// Z3-backed adapter. Every query runs on a fresh `Solver` in the snapshot's context, so
/// queries never observe each other's assertions.
#[derive(Debug, Clone)]
pub struct Z3TransactionSolver {
    limits: SolverLimits,
    max_calldata_bytes: usize,
}

impl Default for Z3TransactionSolver {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}

impl Z3TransactionSolver {
    pub fn new(limits: SolverLimits, max_calldata_bytes: usize) -> Self {
        Self {
            limits,
            max_calldata_bytes,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.solver, config.witness_max_calldata_bytes)
    }
}

impl TransactionSolver for Z3TransactionSolver {
    fn transaction_sequence<'ctx>(
        &self,
        snapshot: &StateSnapshot<'ctx>,
        constraints: &[Bool<'ctx>],
    ) -> SolverOutcome {
        let solver = Solver::new(snapshot.ctx);
        configure_solver(snapshot.ctx, &solver, &self.limits);
        for constraint in constraints {
            solver.assert(constraint);
        }
        // Witnesses must be expressible as real transactions.
        for tx in &snapshot.transactions {
            for bound in tx.well_formedness(self.max_calldata_bytes as u64) {
                solver.assert(&bound);
            }
        }

        let started = Instant::now();
        let verdict = solver.check();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "[SOLVER] pc={} constraints={} verdict={:?} elapsed_ms={}",
            snapshot.instruction.address,
            constraints.len(),
            verdict,
            elapsed_ms
        );

        match verdict {
            SatResult::Unsat => SolverOutcome::Unsatisfiable,
            SatResult::Unknown => SolverOutcome::SolverError(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            SatResult::Sat => match solver.get_model() {
                Some(model) => match model_to_witness(&model, snapshot, self.max_calldata_bytes) {
                    Ok(witness) => SolverOutcome::Satisfiable(witness),
                    Err(reason) => SolverOutcome::SolverError(reason),
                },
                None => SolverOutcome::SolverError("sat verdict without a model".to_string()),
            },
        }
    }
}

/// Translate a model into concrete transactions, one per symbolic transaction of the path.
fn model_to_witness<'ctx>(
    model: &Model<'ctx>,
    snapshot: &StateSnapshot<'ctx>,
    max_calldata_bytes: usize,
) -> Result<Witness, String> {
    if snapshot.transactions.is_empty() {
        return Err("path has no transactions to concretize".to_string());
    }
    let mut assignments = BTreeMap::new();
    let mut steps = Vec::with_capacity(snapshot.transactions.len());

    for tx in &snapshot.transactions {
        steps.push(concretize_transaction(
            model,
            tx,
            max_calldata_bytes,
            &mut assignments,
        )?);
    }

    Ok(Witness {
        model: assignments,
        transactions: TransactionSequence::new(steps),
    })
}

fn concretize_transaction<'ctx>(
    model: &Model<'ctx>,
    tx: &SymbolicTransaction<'ctx>,
    max_calldata_bytes: usize,
    assignments: &mut BTreeMap<String, U256>,
) -> Result<WitnessTransaction, String> {
    let sender = eval_word(model, &tx.sender, &format!("sender_{}", tx.id))?;
    let call_value = eval_word(model, &tx.call_value, &format!("call_value_{}", tx.id))?;
    let calldata_size = eval_word(model, &tx.calldata_size, &format!("calldatasize_{}", tx.id))?;

    let len = usize::try_from(calldata_size)
        .ok()
        .filter(|len| *len <= max_calldata_bytes)
        .ok_or_else(|| {
            format!(
                "tx {} calldata length {calldata_size} exceeds witness bound {max_calldata_bytes}",
                tx.id
            )
        })?;

    let ctx = tx.sender.get_ctx();
    let mut calldata = Vec::with_capacity(len);
    for i in 0..len {
        let byte = tx
            .calldata
            .select(&val(ctx, i as u64))
            .as_bv()
            .ok_or_else(|| format!("tx {} calldata is not byte-typed", tx.id))?;
        let concrete = model
            .eval::<BV>(&byte, true)
            .and_then(|v| u256_from_bv(&v))
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| format!("tx {} calldata byte {i} has no concrete value", tx.id))?;
        calldata.push(concrete);
    }

    assignments.insert(format!("sender_{}", tx.id), sender);
    assignments.insert(format!("call_value_{}", tx.id), call_value);
    assignments.insert(format!("calldatasize_{}", tx.id), calldata_size);

    Ok(WitnessTransaction {
        id: tx.id,
        kind: tx.kind,
        caller: u256_to_address(sender),
        target: tx.target,
        calldata: Bytes::from(calldata),
        call_value,
    })
}

fn eval_word<'ctx>(model: &Model<'ctx>, term: &BV<'ctx>, name: &str) -> Result<U256, String> {
    model
        .eval::<BV>(term, true)
        .and_then(|v| u256_from_bv(&v))
        .ok_or_else(|| format!("model has no concrete value for {name}"))
}
