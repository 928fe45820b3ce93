pub mod actors;
pub mod extract;
pub mod opcodes;
pub mod state;
pub mod utils;
pub mod z3_ext;
