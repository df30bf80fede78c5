//! Gateway abstraction over the EMP contract.
//!
//! The snapshot engine only ever talks to the contract through
//! [`ContractGateway`], so alternative strategies (cursor-based log
//! tailing, batched multicalls, in-memory fixtures) can be swapped in
//! without touching callers.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The configured RPC endpoint could not be parsed.
    #[error("invalid rpc url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Transport failure, node error or reverted call.
    #[error("{call} failed: {message}")]
    Rpc { call: &'static str, message: String },

    /// The node answered but the payload did not have the expected shape.
    #[error("{call} returned malformed data: {message}")]
    Decode { call: &'static str, message: String },
}

impl GatewayError {
    pub fn rpc(call: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            call,
            message: err.to_string(),
        }
    }

    pub fn decode(call: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            call,
            message: err.to_string(),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Raw `positions(sponsor)` fields, all fixed-point values unwrapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPosition {
    pub tokens_outstanding: U256,
    pub withdrawal_request_pass_timestamp: U256,
    pub withdrawal_request_amount: U256,
    pub raw_collateral: U256,
}

/// One entry of `getLiquidations(sponsor)`, in contract order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLiquidation {
    /// `Status` discriminant (see [`crate::liquidation_status`])
    pub state: u8,
    pub sponsor: Address,
    pub tokens_outstanding: U256,
    pub liquidated_collateral: U256,
    /// Unix seconds
    pub liquidation_time: U256,
}

/// Read-only access to a single EMP contract.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Contract address being monitored.
    fn address(&self) -> Address;

    /// `collateralRequirement()` as a 1e18-scaled fixed-point value.
    async fn collateral_requirement(&self) -> GatewayResult<U256>;

    /// `liquidationLiveness()` in seconds.
    async fn liquidation_liveness(&self) -> GatewayResult<U256>;

    /// Sponsor field of every `NewSponsor` log from `from_block` to latest,
    /// in log order. Duplicates are returned as emitted.
    async fn new_sponsor_records(&self, from_block: u64) -> GatewayResult<Vec<Address>>;

    /// Current `positions(sponsor)` entry.
    async fn position(&self, sponsor: Address) -> GatewayResult<RawPosition>;

    /// `getCollateral(sponsor)`.
    async fn collateral(&self, sponsor: Address) -> GatewayResult<U256>;

    /// Full liquidation history of `sponsor`.
    async fn liquidations(&self, sponsor: Address) -> GatewayResult<Vec<RawLiquidation>>;
}
