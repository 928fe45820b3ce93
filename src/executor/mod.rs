pub mod verifier;

pub use verifier::{replay_witness, ReplayReport, ReplaySetup, StoreHit};
