//! Detection modules and the registration contract the host engine drives them through.

pub mod conditions;
pub mod module_catalog;
pub mod ownership;
pub mod storage_write;

use crate::error::{DetectorError, Result};
use crate::report::{Finding, Severity};
use crate::symbolic::opcodes;
use crate::symbolic::state::StateSnapshot;

/// Whether the host calls the module on every hooked instruction, or once after exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    Post,
    Callback,
}

/// Before or after the hooked instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Pre,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub author: String,
    pub license: String,
    pub version: String,
    pub plugin_type: String,
    pub description: String,
}

/// Everything the host needs to know about a module before running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRegistration {
    pub name: String,
    pub description: String,
    pub swc_id: String,
    pub default_severity: Severity,
    pub enabled_by_default: bool,
    pub entry_point: EntryPoint,
    pre_hooks: Vec<&'static str>,
    post_hooks: Vec<&'static str>,
    pub metadata: PluginMetadata,
}

impl ModuleRegistration {
    /// Hook mnemonics are resolved against the opcode table; unknown ones are rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        swc_id: impl Into<String>,
        default_severity: Severity,
        entry_point: EntryPoint,
        pre_hooks: &[&str],
        post_hooks: &[&str],
        metadata: PluginMetadata,
    ) -> Result<Self> {
        let name = name.into();
        let pre_hooks = resolve_hooks(&name, pre_hooks)?;
        let post_hooks = resolve_hooks(&name, post_hooks)?;
        if entry_point == EntryPoint::Post && !(pre_hooks.is_empty() && post_hooks.is_empty()) {
            return Err(DetectorError::Registration(format!(
                "module `{name}` runs post-exploration and cannot declare instruction hooks"
            )));
        }
        Ok(Self {
            name,
            description: description.into(),
            swc_id: swc_id.into(),
            default_severity,
            enabled_by_default: true,
            entry_point,
            pre_hooks,
            post_hooks,
            metadata,
        })
    }

    pub fn with_enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }

    pub fn hooks(&self, phase: HookPhase) -> &[&'static str] {
        match phase {
            HookPhase::Pre => &self.pre_hooks,
            HookPhase::Post => &self.post_hooks,
        }
    }

    pub fn is_hooked(&self, phase: HookPhase, mnemonic: &str) -> bool {
        self.entry_point == EntryPoint::Callback && self.hooks(phase).contains(&mnemonic)
    }
}

fn resolve_hooks(module: &str, hooks: &[&str]) -> Result<Vec<&'static str>> {
    hooks
        .iter()
        .map(|hook| {
            opcodes::from_mnemonic(hook)
                .and_then(opcodes::mnemonic)
                .ok_or_else(|| {
                    DetectorError::Registration(format!(
                        "module `{module}` hooks unknown instruction `{hook}`"
                    ))
                })
        })
        .collect()
}

/// A vulnerability query the host invokes at hook points.
///
/// Modules are stateless across invocations apart from their accumulated findings, which the
/// host drains once the run is over.
pub trait DetectionModule: Send + Sync {
    fn registration(&self) -> &ModuleRegistration;

    /// Inspect one snapshot. Never fails: every problem degrades to "no finding".
    fn execute(&self, snapshot: &StateSnapshot<'_>);

    fn findings(&self) -> Vec<Finding>;

    fn drain_findings(&self) -> Vec<Finding>;

    fn reset(&self);
}
