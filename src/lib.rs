//! Dark Detector library surface.
//!
//! Detection modules are driven by a host symbolic engine: at every registered hook point the
//! host hands a module a read-only [`symbolic::state::StateSnapshot`], the module builds a
//! vulnerability predicate over it and asks the solver whether the predicate is reachable.
//! Satisfiable queries become [`report::Finding`]s carrying a replayable transaction witness.

pub mod engine;
pub mod error;
pub mod executor;
pub mod report;
pub mod solver;
pub mod symbolic;
pub mod utils;
