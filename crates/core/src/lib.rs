//! EMP monitoring client core.
//!
//! This crate provides:
//! - Fixed-point undercollateralization check over exact integers
//! - Snapshot builder that rebuilds sponsors, positions and live liquidations
//! - Background poller publishing each complete snapshot atomically
//! - Synchronous query surface over the latest snapshot
//!
//! Contract access goes through [`emp_client_chain::ContractGateway`].

mod builder;
mod client;
pub mod config;
pub mod fixed_point;
mod poller;
mod snapshot;
#[cfg(test)]
mod testing;

pub use builder::{BuilderConfig, Clock, RefreshError, SnapshotBuilder, SystemClock};
pub use client::EmpClient;
pub use config::{ClientConfig, ConfigError};
pub use fixed_point::{is_undercollateralized, FIXED_POINT_SCALE};
pub use poller::{Poller, PollerStats, DEFAULT_POLL_INTERVAL};
pub use snapshot::{Liquidation, LiquidationState, Position, RiskParameters, Snapshot, SnapshotStore};
