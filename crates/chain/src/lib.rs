//! EMP chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for the expiring multi-party position contract
//! - The [`ContractGateway`] trait the snapshot engine reads through
//! - An Alloy HTTP implementation of that gateway
//!
//! Everything here is read-only: point-in-time view calls and historical
//! event log retrieval.

pub mod contracts;
mod gateway;
mod provider;

pub use contracts::{liquidation_status, IExpiringMultiParty};
pub use gateway::{ContractGateway, GatewayError, GatewayResult, RawLiquidation, RawPosition};
pub use provider::{block_ranges, AlloyGateway};
