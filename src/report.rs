//! Findings handed from detection modules to the host's reporting layer.

use alloy::primitives::Bytes;
use std::fmt;

use crate::solver::outcome::{TransactionSequence, Witness};
use crate::symbolic::state::{GasBounds, StateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(label)
    }
}

/// The fixed, human-readable part of every finding a module emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingTemplate {
    pub swc_id: String,
    pub title: String,
    pub severity: Severity,
    pub description_head: String,
    pub description_tail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub contract: String,
    pub function_name: String,
    /// Program counter of the hooked instruction.
    pub address: usize,
    pub swc_id: String,
    pub bytecode: Bytes,
    pub title: String,
    pub severity: Severity,
    pub description_head: String,
    pub description_tail: String,
    pub transaction_sequence: TransactionSequence,
    pub gas_used: GasBounds,
}

impl Finding {
    /// The only constructor. A `Witness` exists only for satisfiable queries, so a finding
    /// cannot be built from an unsatisfiable or failed one.
    pub fn from_witness(
        template: &FindingTemplate,
        snapshot: &StateSnapshot<'_>,
        witness: Witness,
    ) -> Self {
        let account = &snapshot.environment.active_account;
        Self {
            contract: account.contract_name.clone(),
            function_name: snapshot.environment.active_function_name.clone(),
            address: snapshot.instruction.address,
            swc_id: template.swc_id.clone(),
            bytecode: account.code.clone(),
            title: template.title.clone(),
            severity: template.severity,
            description_head: template.description_head.clone(),
            description_tail: template.description_tail.clone(),
            transaction_sequence: witness.transactions,
            gas_used: snapshot.gas,
        }
    }

    pub fn description(&self) -> String {
        if self.description_tail.is_empty() {
            self.description_head.clone()
        } else {
            format!("{}\n{}", self.description_head, self.description_tail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::outcome::WitnessTransaction;
    use crate::symbolic::opcodes;
    use crate::symbolic::state::{AccountView, Environment, InstructionMeta, TransactionKind};
    use alloy::primitives::{Address, U256};
    use std::collections::BTreeMap;
    use z3::ast::BV;
    use z3::{Config, Context};

    fn template() -> FindingTemplate {
        FindingTemplate {
            swc_id: "000".to_string(),
            title: "Ownership Takeover".to_string(),
            severity: Severity::High,
            description_head: "head".to_string(),
            description_tail: String::new(),
        }
    }

    #[test]
    fn test_finding_copies_snapshot_identity() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let environment = Environment {
            sender: BV::new_const(&ctx, "sender_1", 256),
            active_account: AccountView {
                address: Address::new([0xBB; 20]),
                contract_name: "Ownable".to_string(),
                code: Bytes::from_static(&[0x60, 0x00, 0x55]),
            },
            active_function_name: "claim()".to_string(),
        };
        let mut snapshot =
            StateSnapshot::new(&ctx, InstructionMeta::new(5, opcodes::SSTORE), environment);
        snapshot.gas = GasBounds { min: 100, max: 250 };

        let witness = Witness {
            model: BTreeMap::new(),
            transactions: TransactionSequence::new(vec![WitnessTransaction {
                id: 1,
                kind: TransactionKind::MessageCall,
                caller: Address::new([0xAA; 20]),
                target: Address::new([0xBB; 20]),
                calldata: Bytes::new(),
                call_value: U256::ZERO,
            }]),
        };

        let finding = Finding::from_witness(&template(), &snapshot, witness);
        assert_eq!(finding.contract, "Ownable");
        assert_eq!(finding.function_name, "claim()");
        assert_eq!(finding.address, 5);
        assert_eq!(finding.bytecode.len(), 3);
        assert_eq!(finding.gas_used, GasBounds { min: 100, max: 250 });
        assert_eq!(finding.severity.to_string(), "High");
        assert_eq!(finding.description(), "head");
        assert_eq!(finding.transaction_sequence.len(), 1);
    }
}
