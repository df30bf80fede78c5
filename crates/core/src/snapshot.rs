//! Snapshot data structures and the published snapshot slot.

use alloy::primitives::{Address, U256};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use emp_client_chain::liquidation_status;

/// Global risk parameters read once per refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskParameters {
    /// Collateral requirement (1e18-scaled, e.g. 1.2e18 = 120%)
    pub collateral_requirement: U256,
    /// Dispute window after a liquidation, in seconds
    pub liquidation_liveness: u64,
}

/// One sponsor's open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub sponsor: Address,
    /// Synthetic tokens outstanding (1e18-scaled)
    pub num_tokens: U256,
    /// Collateral after fees, from `getCollateral` (1e18-scaled)
    pub amount_collateral: U256,
    pub withdrawal_request_amount: U256,
    /// Unix seconds; zero when no withdrawal request is pending
    pub request_pass_timestamp: U256,
    pub has_pending_withdrawal: bool,
}

/// Lifecycle state of a liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LiquidationState {
    Uninitialized,
    PreDispute,
    PendingDispute,
    DisputeSucceeded,
    DisputeFailed,
    /// Discriminant not known to this client
    Unknown(u8),
}

impl LiquidationState {
    pub fn from_code(code: u8) -> Self {
        match code {
            liquidation_status::UNINITIALIZED => Self::Uninitialized,
            liquidation_status::PRE_DISPUTE => Self::PreDispute,
            liquidation_status::PENDING_DISPUTE => Self::PendingDispute,
            liquidation_status::DISPUTE_SUCCEEDED => Self::DisputeSucceeded,
            liquidation_status::DISPUTE_FAILED => Self::DisputeFailed,
            other => Self::Unknown(other),
        }
    }

    /// Only pre-dispute liquidations can still be disputed.
    pub fn is_pre_dispute(&self) -> bool {
        matches!(self, Self::PreDispute)
    }
}

/// A liquidation still inside its dispute window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Liquidation {
    pub sponsor: Address,
    /// Index into the sponsor's liquidation history
    pub id: String,
    pub num_tokens: U256,
    /// Liquidated collateral (1e18-scaled)
    pub amount_collateral: U256,
    /// Unix seconds
    pub liquidation_time: U256,
}

impl Liquidation {
    /// Whether the dispute window is still open at `now` (unix seconds).
    pub fn is_within_liveness(&self, liveness: u64, now: u64) -> bool {
        Self::window_open(self.liquidation_time, liveness, now)
    }

    /// `liquidation_time + liveness > now`.
    pub fn window_open(liquidation_time: U256, liveness: u64, now: u64) -> bool {
        liquidation_time.saturating_add(U256::from(liveness)) > U256::from(now)
    }
}

/// A complete, internally consistent view of the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub sponsors: Vec<Address>,
    pub positions: Vec<Position>,
    pub undisputed_liquidations: Vec<Liquidation>,
    pub risk_parameters: RiskParameters,
    /// Wall-clock seconds used for the liveness filter; zero before the first refresh
    pub refreshed_at: u64,
}

impl Snapshot {
    /// Whether this snapshot came from a completed refresh.
    pub fn is_populated(&self) -> bool {
        self.refreshed_at > 0
    }
}

/// Single-writer, multi-reader slot holding the latest snapshot.
///
/// Publishing replaces the `Arc` in one step; readers clone the `Arc`
/// and keep a consistent view for as long as they hold it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Replace the published snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        *self.current.write() = next;
    }
}
