use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::engine::ownership::ownership_takeover;
use crate::engine::{DetectionModule, EntryPoint, HookPhase};
use crate::error::{DetectorError, Result};
use crate::report::Finding;
use crate::solver::query::TransactionSolver;
use crate::symbolic::state::StateSnapshot;
use crate::utils::config::DetectorConfig;

/// What one dispatch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: Vec<String>,
    /// Modules that panicked, with the panic message.
    pub panicked: Vec<(String, String)>,
}

/// The modules a host run drives, keyed by name.
#[derive(Default)]
pub struct ModuleCatalog {
    modules: Vec<Arc<dyn DetectionModule>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in modules, filtered by the configured allow/deny lists.
    pub fn with_defaults(
        config: &DetectorConfig,
        solver: Arc<dyn TransactionSolver>,
    ) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.register(Arc::new(ownership_takeover(config, solver)?))?;
        Ok(catalog.filtered(config))
    }

    pub fn register(&mut self, module: Arc<dyn DetectionModule>) -> Result<()> {
        let name = &module.registration().name;
        if self.modules.iter().any(|m| &m.registration().name == name) {
            return Err(DetectorError::Registration(format!(
                "module `{name}` is already registered"
            )));
        }
        self.modules.push(module);
        Ok(())
    }

    /// Drop every module the configuration disables.
    pub fn filtered(mut self, config: &DetectorConfig) -> Self {
        self.modules.retain(|module| {
            let registration = module.registration();
            let enabled =
                config.is_module_enabled(&registration.name, registration.enabled_by_default);
            if !enabled {
                tracing::info!("[CATALOG] module disabled: {}", registration.name);
            }
            enabled
        });
        self
    }

    pub fn modules(&self) -> &[Arc<dyn DetectionModule>] {
        &self.modules
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules
            .iter()
            .map(|m| m.registration().name.as_str())
            .collect()
    }

    /// Every mnemonic some module hooks in `phase`, so the host knows where to stop.
    pub fn hooked_mnemonics(&self, phase: HookPhase) -> HashSet<&'static str> {
        self.modules
            .iter()
            .filter(|m| m.registration().entry_point == EntryPoint::Callback)
            .flat_map(|m| m.registration().hooks(phase).iter().copied())
            .collect()
    }

    /// Run every callback module hooked on the snapshot's instruction for `phase`.
    pub fn dispatch(&self, phase: HookPhase, snapshot: &StateSnapshot<'_>) -> DispatchReport {
        let Some(mnemonic) = snapshot.instruction.mnemonic() else {
            return DispatchReport::default();
        };
        let hooked = self
            .modules
            .iter()
            .filter(|m| m.registration().is_hooked(phase, mnemonic));
        run_isolated(hooked, snapshot)
    }

    /// Run post-exploration modules once against a final snapshot.
    pub fn run_post(&self, snapshot: &StateSnapshot<'_>) -> DispatchReport {
        let post = self
            .modules
            .iter()
            .filter(|m| m.registration().entry_point == EntryPoint::Post);
        run_isolated(post, snapshot)
    }

    pub fn drain_findings(&self) -> Vec<Finding> {
        self.modules
            .iter()
            .flat_map(|m| m.drain_findings())
            .collect()
    }

    pub fn reset(&self) {
        for module in &self.modules {
            module.reset();
        }
    }
}

fn run_isolated<'a>(
    modules: impl Iterator<Item = &'a Arc<dyn DetectionModule>>,
    snapshot: &StateSnapshot<'_>,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for module in modules {
        let name = module.registration().name.clone();
        match catch_unwind(AssertUnwindSafe(|| module.execute(snapshot))) {
            Ok(()) => report.invoked.push(name),
            Err(payload) => {
                let message = panic_payload_to_string(payload);
                tracing::warn!(
                    "[CATALOG] module `{}` panicked at pc={}: {}",
                    name,
                    snapshot.instruction.address,
                    message
                );
                report.panicked.push((name, message));
            }
        }
    }
    report
}

fn panic_payload_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "panic (unknown payload)".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ModuleRegistration, PluginMetadata};
    use crate::report::Severity;
    use crate::solver::query::Z3TransactionSolver;
    use crate::symbolic::opcodes;
    use crate::symbolic::state::{AccountView, Environment, InstructionMeta};
    use alloy::primitives::{Address, Bytes};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use z3::ast::BV;
    use z3::{Config, Context};

    struct Probe {
        registration: ModuleRegistration,
        calls: AtomicUsize,
        explode: bool,
    }

    impl Probe {
        fn new(name: &str, entry_point: EntryPoint, pre_hooks: &[&str], explode: bool) -> Self {
            let registration = ModuleRegistration::new(
                name,
                "probe",
                "000",
                Severity::Low,
                entry_point,
                pre_hooks,
                &[],
                PluginMetadata {
                    author: "tests".to_string(),
                    license: "MIT".to_string(),
                    version: "0.0.1".to_string(),
                    plugin_type: "Detection Module".to_string(),
                    description: String::new(),
                },
            )
            .unwrap();
            Self {
                registration,
                calls: AtomicUsize::new(0),
                explode,
            }
        }
    }

    impl DetectionModule for Probe {
        fn registration(&self) -> &ModuleRegistration {
            &self.registration
        }

        fn execute(&self, _snapshot: &StateSnapshot<'_>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.explode {
                panic!("probe exploded");
            }
        }

        fn findings(&self) -> Vec<Finding> {
            Vec::new()
        }

        fn drain_findings(&self) -> Vec<Finding> {
            Vec::new()
        }

        fn reset(&self) {}
    }

    fn snapshot_at(ctx: &Context, opcode: u8) -> StateSnapshot<'_> {
        let environment = Environment {
            sender: BV::new_const(ctx, "sender_1", 256),
            active_account: AccountView {
                address: Address::new([0xBB; 20]),
                contract_name: "Target".to_string(),
                code: Bytes::new(),
            },
            active_function_name: "fallback".to_string(),
        };
        StateSnapshot::new(ctx, InstructionMeta::new(0, opcode), environment)
    }

    #[test]
    fn test_dispatch_matches_phase_and_mnemonic() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let store = Arc::new(Probe::new("store", EntryPoint::Callback, &["SSTORE"], false));
        let load = Arc::new(Probe::new("load", EntryPoint::Callback, &["SLOAD"], false));
        let post = Arc::new(Probe::new("post", EntryPoint::Post, &[], false));

        let mut catalog = ModuleCatalog::new();
        catalog.register(store.clone()).unwrap();
        catalog.register(load.clone()).unwrap();
        catalog.register(post.clone()).unwrap();

        let report = catalog.dispatch(HookPhase::Pre, &snapshot_at(&ctx, opcodes::SSTORE));
        assert_eq!(report.invoked, vec!["store".to_string()]);
        catalog.dispatch(HookPhase::Post, &snapshot_at(&ctx, opcodes::SSTORE));
        catalog.dispatch(HookPhase::Pre, &snapshot_at(&ctx, 0x0c));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(load.calls.load(Ordering::SeqCst), 0);
        assert_eq!(post.calls.load(Ordering::SeqCst), 0);

        catalog.run_post(&snapshot_at(&ctx, 0x00));
        assert_eq!(post.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            catalog.hooked_mnemonics(HookPhase::Pre),
            HashSet::from(["SSTORE", "SLOAD"])
        );
    }

    #[test]
    fn test_panicking_module_is_isolated() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let bomb = Arc::new(Probe::new("bomb", EntryPoint::Callback, &["SSTORE"], true));
        let steady = Arc::new(Probe::new("steady", EntryPoint::Callback, &["SSTORE"], false));

        let mut catalog = ModuleCatalog::new();
        catalog.register(bomb).unwrap();
        catalog.register(steady.clone()).unwrap();

        let report = catalog.dispatch(HookPhase::Pre, &snapshot_at(&ctx, opcodes::SSTORE));
        assert_eq!(report.invoked, vec!["steady".to_string()]);
        assert_eq!(
            report.panicked,
            vec![("bomb".to_string(), "probe exploded".to_string())]
        );
        assert_eq!(steady.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_names_rejected_and_filters_applied() {
        let mut catalog = ModuleCatalog::new();
        catalog
            .register(Arc::new(Probe::new("a", EntryPoint::Callback, &["SSTORE"], false)))
            .unwrap();
        assert!(catalog
            .register(Arc::new(Probe::new("a", EntryPoint::Callback, &[], false)))
            .is_err());
        catalog
            .register(Arc::new(Probe::new("b", EntryPoint::Callback, &[], false)))
            .unwrap();

        let config = DetectorConfig {
            module_denylist: vec!["a".to_string()],
            ..DetectorConfig::default()
        };
        assert_eq!(catalog.filtered(&config).names(), vec!["b"]);
    }

    #[test]
    fn test_default_catalog_honors_denylist() {
        let solver: Arc<dyn TransactionSolver> = Arc::new(Z3TransactionSolver::default());
        let open = ModuleCatalog::with_defaults(&DetectorConfig::default(), solver.clone()).unwrap();
        assert_eq!(open.names(), vec![crate::engine::ownership::MODULE_NAME]);

        let config = DetectorConfig {
            module_denylist: vec![crate::engine::ownership::MODULE_NAME.to_string()],
            ..DetectorConfig::default()
        };
        let closed = ModuleCatalog::with_defaults(&config, solver).unwrap();
        assert!(closed.modules().is_empty());
    }
}
