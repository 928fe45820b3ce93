
use alloy::primitives::U256;
use dark_detector::engine::ownership::ownership_takeover;
use dark_detector::engine::storage_write::StorageWriteDetector;
use dark_detector::solver::query::Z3TransactionSolver;
use dark_detector::symbolic::actors::Actors;
use dark_detector::utils::config::DetectorConfig;
use detector_utils::{address_word, StoreScenario};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, TestCaseError, TestRunner};
use std::sync::Arc;
use z3::{Config as Z3Config, Context};

const CASES: u32 = 48;

const ADDRESS_MASK: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);

fn detector() -> StorageWriteDetector {
    let config = DetectorConfig::default();
    ownership_takeover(&config, Arc::new(Z3TransactionSolver::from_config(&config))).unwrap()
}

fn runner() -> TestRunner {
    TestRunner::new(ProptestConfig {
        cases: CASES,
        ..ProptestConfig::default()
    })
}

fn word_strategy() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(U256::from_be_bytes)
}

fn attacker_word() -> U256 {
    address_word(Actors::ATTACKER.address)
}

fn expect_no_finding(
    detector: &StorageWriteDetector,
    ctx: &Context,
    scenario: &StoreScenario,
) -> Result<(), TestCaseError> {
    match detector.analyze_state(&scenario.snapshot(ctx)) {
        None => Ok(()),
        Some(finding) => Err(TestCaseError::fail(format!(
            "unexpected finding for {scenario:?}: {:?}",
            finding.transaction_sequence
        ))),
    }
}

#[test]
fn test_owner_already_attacker_never_reports() {
    let cfg = Z3Config::new();
    let ctx = Context::new(&cfg);
    let detector = detector();

    // Whatever sits above the owner field, the field itself already holds the attacker.
    let strategy = word_strategy().prop_map(|dirty| (dirty & !ADDRESS_MASK) | attacker_word());
    let result = runner().run(&strategy, |prior_word| {
        let scenario = StoreScenario {
            prior_word: Some(prior_word),
            ..StoreScenario::unguarded_setter()
        };
        expect_no_finding(&detector, &ctx, &scenario)
    });
    if let Err(err) = result {
        panic!("owner-already-attacker property failed: {err}");
    }
}

#[test]
fn test_non_attacker_write_never_reports() {
    let cfg = Z3Config::new();
    let ctx = Context::new(&cfg);
    let detector = detector();

    let strategy =
        word_strategy().prop_filter("written field is the attacker", |word| {
            (*word & ADDRESS_MASK) != attacker_word()
        });
    let result = runner().run(&strategy, |written| {
        let scenario = StoreScenario {
            written: Some(written),
            ..StoreScenario::unguarded_setter()
        };
        expect_no_finding(&detector, &ctx, &scenario)
    });
    if let Err(err) = result {
        panic!("non-attacker-write property failed: {err}");
    }
}

#[test]
fn test_write_to_other_slot_never_reports() {
    let cfg = Z3Config::new();
    let ctx = Context::new(&cfg);
    let detector = detector();

    let strategy = word_strategy().prop_filter("slot is the owner slot", |slot| !slot.is_zero());
    let result = runner().run(&strategy, |slot| {
        let scenario = StoreScenario {
            slot: Some(slot),
            ..StoreScenario::unguarded_setter()
        };
        expect_no_finding(&detector, &ctx, &scenario)
    });
    if let Err(err) = result {
        panic!("other-slot property failed: {err}");
    }
}

#[test]
fn test_non_attacker_sender_never_reports() {
    let cfg = Z3Config::new();
    let ctx = Context::new(&cfg);
    let detector = detector();

    let strategy = any::<[u8; 20]>()
        .prop_filter("sender is the attacker", |bytes| {
            bytes != Actors::ATTACKER.address.as_slice()
        })
        .prop_map(|bytes| U256::from_be_slice(&bytes));
    let result = runner().run(&strategy, |sender| {
        let scenario = StoreScenario {
            sender: Some(sender),
            ..StoreScenario::unguarded_setter()
        };
        expect_no_finding(&detector, &ctx, &scenario)
    });
    if let Err(err) = result {
        panic!("non-attacker-sender property failed: {err}");
    }
}

#[test]
fn test_symbolic_prior_owner_is_still_takeable() {
    let cfg = Z3Config::new();
    let ctx = Context::new(&cfg);
    let detector = detector();

    // Unconstrained storage: the solver is free to pick a non-attacker prior owner.
    let scenario = StoreScenario {
        prior_word: None,
        ..StoreScenario::unguarded_setter()
    };
    assert!(detector.analyze_state(&scenario.snapshot(&ctx)).is_some());
}
