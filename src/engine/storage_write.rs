use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::conditions::{conjoin, ConditionTerm, WriteView};
use crate::engine::{DetectionModule, ModuleRegistration};
use crate::error::InsufficientState;
use crate::report::{Finding, FindingTemplate};
use crate::solver::outcome::SolverOutcome;
use crate::solver::query::TransactionSolver;
use crate::symbolic::state::StateSnapshot;
use z3::ast::{Ast, Bool};

/// Reports a storage write whenever the conjunction of `terms` is reachable on the current path.
pub struct StorageWriteDetector {
    registration: ModuleRegistration,
    template: FindingTemplate,
    terms: Vec<Box<dyn ConditionTerm>>,
    solver: Arc<dyn TransactionSolver>,
    findings: Mutex<Vec<Finding>>,
}

impl fmt::Debug for StorageWriteDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageWriteDetector")
            .field("name", &self.registration.name)
            .field("terms", &self.terms)
            .finish_non_exhaustive()
    }
}

impl StorageWriteDetector {
    pub fn new(
        registration: ModuleRegistration,
        template: FindingTemplate,
        terms: Vec<Box<dyn ConditionTerm>>,
        solver: Arc<dyn TransactionSolver>,
    ) -> Self {
        Self {
            registration,
            template,
            terms,
            solver,
            findings: Mutex::new(Vec::new()),
        }
    }

    pub fn terms(&self) -> &[Box<dyn ConditionTerm>] {
        &self.terms
    }

    /// Pure analysis of one snapshot: at most one finding, nothing recorded.
    pub fn analyze_state(&self, snapshot: &StateSnapshot<'_>) -> Option<Finding> {
        let name = &self.registration.name;
        let pc = snapshot.instruction.address;

        let caller_binding = match bind_caller(snapshot) {
            Ok(binding) => binding,
            Err(err) => {
                tracing::debug!("[DETECT] {name}: skipping pc={pc}: {err}");
                return None;
            }
        };
        let view = match WriteView::from_snapshot(snapshot) {
            Ok(view) => view,
            Err(err) => {
                tracing::debug!("[DETECT] {name}: skipping pc={pc}: {err}");
                return None;
            }
        };
        let condition = match conjoin(&self.terms, &view) {
            Ok(condition) => condition,
            Err(err) => {
                tracing::debug!("[DETECT] {name}: skipping pc={pc}: {err}");
                return None;
            }
        };

        let mut constraints = snapshot.constraints.clone();
        constraints.push(caller_binding);
        constraints.push(condition.into_expr());

        match self.solver.transaction_sequence(snapshot, &constraints) {
            SolverOutcome::Satisfiable(witness) if witness.transactions.is_empty() => {
                tracing::warn!("[DETECT] {name}: witness at pc={pc} has no transactions");
                None
            }
            SolverOutcome::Satisfiable(witness) => {
                tracing::info!(
                    "[DETECT] {name}: {} reachable at pc={pc} in {} ({} tx)",
                    self.template.title,
                    snapshot.environment.active_account.contract_name,
                    witness.transactions.len()
                );
                Some(Finding::from_witness(&self.template, snapshot, witness))
            }
            SolverOutcome::Unsatisfiable => {
                tracing::debug!("[DETECT] {name}: vulnerable conditions unsatisfiable at pc={pc}");
                None
            }
            SolverOutcome::SolverError(reason) => {
                tracing::warn!("[DETECT] {name}: solver gave up at pc={pc}: {reason}");
                None
            }
        }
    }

    fn lock_findings(&self) -> MutexGuard<'_, Vec<Finding>> {
        match self.findings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The sender the terms reason about must be the caller the witness reports, i.e. the sender
/// of the executing transaction.
fn bind_caller<'ctx>(snapshot: &StateSnapshot<'ctx>) -> Result<Bool<'ctx>, InsufficientState> {
    let pc = snapshot.instruction.address;
    let tx = snapshot
        .current_transaction()
        .ok_or(InsufficientState::NoTransaction { pc })?;
    let sender = &snapshot.environment.sender;
    if sender.get_size() != tx.sender.get_size() {
        return Err(InsufficientState::OperandWidth {
            operand: "sender",
            expected: tx.sender.get_size(),
            actual: sender.get_size(),
        });
    }
    Ok(sender._eq(&tx.sender))
}

impl DetectionModule for StorageWriteDetector {
    fn registration(&self) -> &ModuleRegistration {
        &self.registration
    }

    fn execute(&self, snapshot: &StateSnapshot<'_>) {
        if let Some(finding) = self.analyze_state(snapshot) {
            self.lock_findings().push(finding);
        }
    }

    fn findings(&self) -> Vec<Finding> {
        self.lock_findings().clone()
    }

    fn drain_findings(&self) -> Vec<Finding> {
        std::mem::take(&mut *self.lock_findings())
    }

    fn reset(&self) {
        self.lock_findings().clear();
    }
}
