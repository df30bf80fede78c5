//! One refresh cycle: read the contract and assemble a [`Snapshot`].
//!
//! Nothing shared is touched here. The builder returns either a complete
//! snapshot or an error, never a partial result.

use alloy::primitives::{Address, U256};
use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::snapshot::{Liquidation, LiquidationState, Position, RiskParameters, Snapshot};
use emp_client_chain::{ContractGateway, GatewayError, RawLiquidation, RawPosition};

/// Why a refresh cycle was discarded.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to fetch risk parameters: {0}")]
    RiskParameters(#[source] GatewayError),

    #[error("liquidation liveness {0} does not fit in u64 seconds")]
    MalformedLiveness(U256),

    #[error("failed to enumerate sponsors: {0}")]
    Sponsors(#[source] GatewayError),

    #[error("failed to fetch state for sponsor {sponsor}: {source}")]
    Sponsor {
        sponsor: Address,
        #[source]
        source: GatewayError,
    },
}

/// Wall-clock source for the liveness filter.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Builder settings.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// First block scanned for `NewSponsor` records
    pub from_block: u64,
    /// Cap on concurrent per-sponsor fetches (`None` = all at once)
    pub max_concurrent_fetches: Option<usize>,
}

/// Everything fetched for one sponsor during a cycle.
#[derive(Debug, Clone)]
struct SponsorState {
    sponsor: Address,
    position: RawPosition,
    collateral: U256,
    liquidations: Vec<RawLiquidation>,
}

/// Rebuilds the full contract view from scratch.
pub struct SnapshotBuilder {
    gateway: Arc<dyn ContractGateway>,
    clock: Arc<dyn Clock>,
    config: BuilderConfig,
}

impl SnapshotBuilder {
    pub fn new(gateway: Arc<dyn ContractGateway>, config: BuilderConfig) -> Self {
        Self::with_clock(gateway, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        gateway: Arc<dyn ContractGateway>,
        clock: Arc<dyn Clock>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            gateway,
            clock,
            config,
        }
    }

    /// Run one full refresh.
    #[instrument(skip(self), fields(emp = %self.gateway.address()))]
    pub async fn build(&self) -> Result<Snapshot, RefreshError> {
        let risk_parameters = self.fetch_risk_parameters().await?;
        let sponsors = self.fetch_sponsors().await?;
        let accounts = self.fetch_accounts(&sponsors).await?;

        // Sampled after every read so the window reflects the data just fetched.
        let now = self.clock.now();

        let undisputed_liquidations =
            collect_undisputed_liquidations(&accounts, risk_parameters.liquidation_liveness, now);
        let positions = collect_positions(&accounts);

        debug!(
            sponsors = sponsors.len(),
            positions = positions.len(),
            liquidations = undisputed_liquidations.len(),
            "Snapshot assembled"
        );

        Ok(Snapshot {
            sponsors,
            positions,
            undisputed_liquidations,
            risk_parameters,
            refreshed_at: now,
        })
    }

    async fn fetch_risk_parameters(&self) -> Result<RiskParameters, RefreshError> {
        let (collateral_requirement, liveness) = tokio::try_join!(
            self.gateway.collateral_requirement(),
            self.gateway.liquidation_liveness(),
        )
        .map_err(RefreshError::RiskParameters)?;

        if liveness > U256::from(u64::MAX) {
            return Err(RefreshError::MalformedLiveness(liveness));
        }

        Ok(RiskParameters {
            collateral_requirement,
            liquidation_liveness: liveness.to::<u64>(),
        })
    }

    async fn fetch_sponsors(&self) -> Result<Vec<Address>, RefreshError> {
        let records = self
            .gateway
            .new_sponsor_records(self.config.from_block)
            .await
            .map_err(RefreshError::Sponsors)?;

        let sponsors = dedupe_sponsors(records);
        debug!(count = sponsors.len(), "Sponsors enumerated");
        Ok(sponsors)
    }

    async fn fetch_accounts(&self, sponsors: &[Address]) -> Result<Vec<SponsorState>, RefreshError> {
        match self.config.max_concurrent_fetches {
            None => try_join_all(sponsors.iter().map(|s| self.fetch_account(*s))).await,
            Some(limit) => {
                stream::iter(sponsors.iter().copied())
                    .map(|s| self.fetch_account(s))
                    .buffered(limit.max(1))
                    .try_collect()
                    .await
            }
        }
    }

    async fn fetch_account(&self, sponsor: Address) -> Result<SponsorState, RefreshError> {
        let (position, collateral, liquidations) = tokio::try_join!(
            self.gateway.position(sponsor),
            self.gateway.collateral(sponsor),
            self.gateway.liquidations(sponsor),
        )
        .map_err(|source| RefreshError::Sponsor { sponsor, source })?;

        Ok(SponsorState {
            sponsor,
            position,
            collateral,
            liquidations,
        })
    }
}

/// Collapse repeated sponsors, keeping first-seen order.
fn dedupe_sponsors(records: Vec<Address>) -> Vec<Address> {
    let mut seen = HashSet::with_capacity(records.len());
    records.into_iter().filter(|a| seen.insert(*a)).collect()
}

fn collect_undisputed_liquidations(
    accounts: &[SponsorState],
    liveness: u64,
    now: u64,
) -> Vec<Liquidation> {
    accounts
        .iter()
        .flat_map(|account| account.liquidations.iter().enumerate())
        .filter(|(_, raw)| {
            LiquidationState::from_code(raw.state).is_pre_dispute()
                && Liquidation::window_open(raw.liquidation_time, liveness, now)
        })
        .map(|(index, raw)| Liquidation {
            sponsor: raw.sponsor,
            id: index.to_string(),
            num_tokens: raw.tokens_outstanding,
            amount_collateral: raw.liquidated_collateral,
            liquidation_time: raw.liquidation_time,
        })
        .collect()
}

fn collect_positions(accounts: &[SponsorState]) -> Vec<Position> {
    accounts
        .iter()
        // zero raw collateral means the position is closed
        .filter(|account| !account.position.raw_collateral.is_zero())
        .map(|account| Position {
            sponsor: account.sponsor,
            num_tokens: account.position.tokens_outstanding,
            amount_collateral: account.collateral,
            withdrawal_request_amount: account.position.withdrawal_request_amount,
            request_pass_timestamp: account.position.withdrawal_request_pass_timestamp,
            has_pending_withdrawal: !account.position.withdrawal_request_pass_timestamp.is_zero(),
        })
        .collect()
}
