use alloy::primitives::{Address, Bytes, U256};
use std::collections::BTreeMap;

use crate::symbolic::state::TransactionKind;

/// One concrete, replayable transaction of a witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessTransaction {
    pub id: usize,
    pub kind: TransactionKind,
    pub caller: Address,
    pub target: Address,
    pub calldata: Bytes,
    pub call_value: U256,
}

/// Ordered transactions that, replayed from the initial world state, reach the hook point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSequence {
    pub steps: Vec<WitnessTransaction>,
}

impl TransactionSequence {
    pub fn new(steps: Vec<WitnessTransaction>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&WitnessTransaction> {
        self.steps.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WitnessTransaction> {
        self.steps.iter()
    }
}

/// What a satisfiable query hands back: the concrete values the model chose for the path's
/// inputs, and those values arranged as transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub model: BTreeMap<String, U256>,
    pub transactions: TransactionSequence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    Satisfiable(Witness),
    Unsatisfiable,
    /// Timeout, resource exhaustion, or a model that could not be turned into transactions.
    SolverError(String),
}

impl SolverOutcome {
    /// Panics unless satisfiable: asking a failed query for a witness is a bug in the caller.
    pub fn into_witness(self) -> Witness {
        match self {
            Self::Satisfiable(witness) => witness,
            Self::Unsatisfiable => panic!("into_witness called on an unsatisfiable outcome"),
            Self::SolverError(reason) => {
                panic!("into_witness called on a solver error outcome: {reason}")
            }
        }
    }
}
