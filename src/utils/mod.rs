pub mod config;
pub mod hex;
pub mod logging;
