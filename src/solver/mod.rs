pub mod outcome;
pub mod query;

pub use outcome::{SolverOutcome, TransactionSequence, Witness, WitnessTransaction};
pub use query::{TransactionSolver, Z3TransactionSolver};
