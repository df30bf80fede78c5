//! Configuration for the EMP monitoring client.
//!
//! Settings come from a TOML file (`EMP_CONFIG`) or individual `EMP_*`
//! environment variables, with defaults for everything except the
//! contract address.

mod client;

pub use client::{env, ClientConfig, ConfigError};
