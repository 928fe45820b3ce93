//! Ownership takeover: an attacker-sent transaction writes the attacker into the owner field.

use std::sync::Arc;

use crate::engine::conditions::{
    ConditionTerm, SenderIs, StoredFieldIsNot, WriteTargetIs, WrittenFieldIs,
};
use crate::engine::storage_write::StorageWriteDetector;
use crate::engine::{EntryPoint, ModuleRegistration, PluginMetadata};
use crate::error::Result;
use crate::report::{FindingTemplate, Severity};
use crate::solver::query::TransactionSolver;
use crate::symbolic::actors::{ActorIdentity, Actors};
use crate::symbolic::extract::{FieldLayout, ProtectedField};
use crate::utils::config::DetectorConfig;

pub const MODULE_NAME: &str = "Detects ownership takeover vulnerabilities";
pub const TITLE: &str = "Ownership Takeover";
pub const SWC_ID: &str = "000";

pub fn registration() -> Result<ModuleRegistration> {
    ModuleRegistration::new(
        MODULE_NAME,
        "Finds any way for an attacker to write their own address into the owner variable. \
         The owner is assumed to be a 20-byte address at a configurable slot and byte offset.",
        SWC_ID,
        Severity::High,
        EntryPoint::Callback,
        &["SSTORE"],
        &[],
        PluginMetadata {
            author: "dark_detector".to_string(),
            license: "MIT".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            plugin_type: "Detection Module".to_string(),
            description: "Ownership takeover detection over symbolic storage writes.".to_string(),
        },
    )
}

pub fn template() -> FindingTemplate {
    FindingTemplate {
        swc_id: SWC_ID.to_string(),
        title: TITLE.to_string(),
        severity: Severity::High,
        description_head: "An attacker can take over ownership of this contract.".to_string(),
        description_tail: String::new(),
    }
}

/// The four conjoined terms for `attacker` taking over `owner`.
pub fn terms(owner: ProtectedField, attacker: ActorIdentity) -> Vec<Box<dyn ConditionTerm>> {
    vec![
        Box::new(WriteTargetIs { slot: owner.slot }),
        Box::new(StoredFieldIsNot {
            field: owner,
            actor: attacker,
        }),
        Box::new(WrittenFieldIs {
            layout: owner.layout,
            actor: attacker,
        }),
        Box::new(SenderIs { actor: attacker }),
    ]
}

/// The owner field described by `OWNERSHIP_SLOT` / `OWNERSHIP_BYTE_OFFSET`.
pub fn owner_field(config: &DetectorConfig) -> Result<ProtectedField> {
    Ok(ProtectedField {
        slot: config.ownership_slot,
        layout: FieldLayout::address_at_byte(config.ownership_byte_offset)?,
    })
}

pub fn ownership_takeover(
    config: &DetectorConfig,
    solver: Arc<dyn TransactionSolver>,
) -> Result<StorageWriteDetector> {
    let owner = owner_field(config)?;
    tracing::debug!(
        "[DETECT] ownership field: slot={:#x} offset_bits={}",
        owner.slot,
        owner.layout.offset_bits()
    );
    Ok(StorageWriteDetector::new(
        registration()?,
        template(),
        terms(owner, Actors::ATTACKER),
        solver,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DetectionModule, HookPhase};
    use crate::solver::query::Z3TransactionSolver;
    use alloy::primitives::U256;

    #[test]
    fn test_registration_hooks_sstore_before_execution() {
        let registration = registration().unwrap();
        assert_eq!(registration.hooks(HookPhase::Pre), ["SSTORE"]);
        assert!(registration.hooks(HookPhase::Post).is_empty());
        assert_eq!(registration.entry_point, EntryPoint::Callback);
        assert_eq!(registration.default_severity, Severity::High);
        assert!(registration.enabled_by_default);
    }

    #[test]
    fn test_owner_field_follows_config() {
        let config = DetectorConfig {
            ownership_slot: U256::from(3_u64),
            ownership_byte_offset: 2,
            ..DetectorConfig::default()
        };
        let field = owner_field(&config).unwrap();
        assert_eq!(field.slot, U256::from(3_u64));
        assert_eq!(field.layout.offset_bits(), 16);
        assert_eq!(field.layout.width_bits(), 160);

        let detector =
            ownership_takeover(&config, Arc::new(Z3TransactionSolver::from_config(&config)))
                .unwrap();
        assert_eq!(detector.terms().len(), 4);
        assert_eq!(detector.registration().name, MODULE_NAME);
    }
}
