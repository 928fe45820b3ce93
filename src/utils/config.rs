use crate::error::{DetectorError, Result};
use crate::symbolic::z3_ext::SolverLimits;
use alloy::primitives::U256;
use std::env;

const DEFAULT_WITNESS_MAX_CALLDATA_BYTES: usize = 4096;

/// Runtime knobs for detection modules and the solver adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    pub solver: SolverLimits,
    /// Upper bound on calldata bytes materialized per witness transaction.
    pub witness_max_calldata_bytes: usize,
    pub ownership_slot: U256,
    pub ownership_byte_offset: u32,
    pub module_allowlist: Option<Vec<String>>,
    pub module_denylist: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            solver: SolverLimits::default(),
            witness_max_calldata_bytes: DEFAULT_WITNESS_MAX_CALLDATA_BYTES,
            ownership_slot: U256::ZERO,
            ownership_byte_offset: 0,
            module_allowlist: None,
            module_denylist: Vec::new(),
        }
    }
}

impl DetectorConfig {
    /// Lenient loader: malformed variables are logged and replaced by defaults.
    pub fn from_env() -> Self {
        match Self::try_from_env() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("[CONFIG] {err}; falling back to default detector configuration");
                Self::default()
            }
        }
    }

    pub fn try_from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let solver = SolverLimits {
            timeout_ms: parse_or(&read, "SOLVER_TIMEOUT_MS", defaults.solver.timeout_ms)?,
            rlimit: parse_or(&read, "SOLVER_RLIMIT", defaults.solver.rlimit)?,
            random_seed: parse_or(&read, "SOLVER_RANDOM_SEED", defaults.solver.random_seed)?,
        };
        if solver.timeout_ms == 0 {
            return Err(DetectorError::Config(
                "SOLVER_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        let witness_max_calldata_bytes = parse_or(
            &read,
            "WITNESS_MAX_CALLDATA_BYTES",
            defaults.witness_max_calldata_bytes,
        )?;

        let ownership_slot = match read("OWNERSHIP_SLOT") {
            Some(raw) => crate::utils::hex::to_u256(&raw).ok_or_else(|| {
                DetectorError::Config(format!(
                    "OWNERSHIP_SLOT must be a decimal or 0x-prefixed word, got `{raw}`"
                ))
            })?,
            None => defaults.ownership_slot,
        };
        let ownership_byte_offset =
            parse_or(&read, "OWNERSHIP_BYTE_OFFSET", defaults.ownership_byte_offset)?;
        if ownership_byte_offset > 12 {
            return Err(DetectorError::Config(format!(
                "OWNERSHIP_BYTE_OFFSET must be at most 12, got {ownership_byte_offset}"
            )));
        }

        Ok(Self {
            solver,
            witness_max_calldata_bytes,
            ownership_slot,
            ownership_byte_offset,
            module_allowlist: read("DETECTOR_ALLOWLIST").map(|raw| split_list(&raw)),
            module_denylist: read("DETECTOR_DENYLIST")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        })
    }

    /// Denylist wins; an allowlist (when present) replaces the module's enabled default.
    pub fn is_module_enabled(&self, name: &str, enabled_by_default: bool) -> bool {
        if self.module_denylist.iter().any(|entry| entry == name) {
            return false;
        }
        match &self.module_allowlist {
            Some(allowed) => allowed.iter().any(|entry| entry == name),
            None => enabled_by_default,
        }
    }
}

fn parse_or<T, R>(read: &R, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    R: Fn(&str) -> Option<String>,
{
    match read(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            DetectorError::Config(format!("{key} must be a valid number, got `{raw}`"))
        }),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
