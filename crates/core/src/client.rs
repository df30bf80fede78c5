//! Query surface over the latest published snapshot.
//!
//! Every read clones the current `Arc<Snapshot>` and works on that, so
//! reads never wait on a refresh and never see a half-updated view.

use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::builder::{BuilderConfig, Clock, SnapshotBuilder, SystemClock};
use crate::config::ClientConfig;
use crate::fixed_point::is_undercollateralized;
use crate::poller::{Poller, PollerStats};
use crate::snapshot::{Liquidation, Position, RiskParameters, Snapshot, SnapshotStore};
use emp_client_chain::ContractGateway;

struct RunningPoller {
    handle: JoinHandle<()>,
    stats: Arc<PollerStats>,
}

/// Read-only EMP monitoring client.
///
/// Cheap to clone; all clones share one snapshot and one poller.
#[derive(Clone)]
pub struct EmpClient {
    store: Arc<SnapshotStore>,
    gateway: Arc<dyn ContractGateway>,
    clock: Arc<dyn Clock>,
    builder_config: BuilderConfig,
    poll_interval: Duration,
    cancel: CancellationToken,
    poller: Arc<Mutex<Option<RunningPoller>>>,
}

impl EmpClient {
    /// Create a client. Nothing is fetched until [`EmpClient::start`].
    pub fn new(gateway: Arc<dyn ContractGateway>, config: &ClientConfig) -> Self {
        Self::with_clock(gateway, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        gateway: Arc<dyn ContractGateway>,
        clock: Arc<dyn Clock>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            store: Arc::new(SnapshotStore::new()),
            gateway,
            clock,
            builder_config: config.builder_config(),
            poll_interval: config.poll_interval(),
            cancel: CancellationToken::new(),
            poller: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the background poller. Calling it again while running, or after
    /// [`EmpClient::shutdown`], is a no-op.
    pub fn start(&self) {
        if self.cancel.is_cancelled() {
            warn!("EMP client already shut down, not starting poller");
            return;
        }

        let mut slot = self.poller.lock();
        if slot.is_some() {
            warn!("EMP client already started");
            return;
        }

        let builder = SnapshotBuilder::with_clock(
            self.gateway.clone(),
            self.clock.clone(),
            self.builder_config.clone(),
        );
        let poller = Poller::new(builder, self.store.clone(), self.poll_interval);
        let stats = poller.stats();
        let handle = poller.spawn(self.cancel.child_token());

        info!(emp = %self.gateway.address(), "EMP client started");
        *slot = Some(RunningPoller { handle, stats });
    }

    /// Token that stops the poller when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the poller and wait for it to exit. The last snapshot stays readable.
    ///
    /// Shutdown is final; a later `start` does nothing.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let running = self.poller.lock().take();
        if let Some(running) = running {
            if let Err(e) = running.handle.await {
                warn!(error = %e, "EMP poller task ended abnormally");
            }
        }
    }

    /// Cycle counters, once started.
    pub fn stats(&self) -> Option<Arc<PollerStats>> {
        self.poller.lock().as_ref().map(|p| p.stats.clone())
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// All sponsors that ever opened a position.
    pub fn all_sponsors(&self) -> Vec<Address> {
        self.store.current().sponsors.clone()
    }

    /// Open positions with non-zero collateral.
    pub fn all_positions(&self) -> Vec<Position> {
        self.store.current().positions.clone()
    }

    /// Positions undercollateralized at `token_redemption_value` (1e18-scaled),
    /// using the snapshot's collateral requirement.
    pub fn under_collateralized_positions(&self, token_redemption_value: U256) -> Vec<Position> {
        let snapshot = self.store.current();
        let requirement = snapshot.risk_parameters.collateral_requirement;
        snapshot
            .positions
            .iter()
            .filter(|p| {
                is_undercollateralized(
                    p.num_tokens,
                    p.amount_collateral,
                    token_redemption_value,
                    requirement,
                )
            })
            .cloned()
            .collect()
    }

    /// Pre-dispute liquidations still inside the liveness window.
    pub fn undisputed_liquidations(&self) -> Vec<Liquidation> {
        self.store.current().undisputed_liquidations.clone()
    }

    /// Whether `liquidation` can be disputed.
    ///
    /// `token_redemption_value` must be the value at `liquidation.liquidation_time`;
    /// the client does not look up historical prices.
    pub fn is_disputable(&self, liquidation: &Liquidation, token_redemption_value: U256) -> bool {
        let requirement = self.store.current().risk_parameters.collateral_requirement;
        !is_undercollateralized(
            liquidation.num_tokens,
            liquidation.amount_collateral,
            token_redemption_value,
            requirement,
        )
    }

    pub fn risk_parameters(&self) -> RiskParameters {
        self.store.current().risk_parameters
    }

    /// Unix seconds of the last successful refresh, if any.
    pub fn last_update_time(&self) -> Option<u64> {
        let snapshot = self.store.current();
        snapshot.is_populated().then_some(snapshot.refreshed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{from_decimal_str, FIXED_POINT_SCALE};
    use crate::testing::{raw_liquidation, FixedClock, MockGateway};
    use emp_client_chain::RawPosition;

    const T: u64 = 1_700_000_000;

    fn fp(s: &str) -> U256 {
        from_decimal_str(s).unwrap()
    }

    fn client(gateway: Arc<MockGateway>, clock: Arc<FixedClock>) -> EmpClient {
        EmpClient::with_clock(gateway, clock, &ClientConfig::default())
    }

    /// Sponsor A: closed position. Sponsor B: 100 tokens on 50 collateral.
    fn scenario() -> (Arc<MockGateway>, Address, Address) {
        let a = Address::repeat_byte(0xA);
        let b = Address::repeat_byte(0xB);
        let gateway = Arc::new(MockGateway::new(fp("1.2"), 7200));
        gateway.set_sponsor_records(vec![a, b, a]);
        gateway.set_position(
            a,
            RawPosition {
                tokens_outstanding: fp("10"),
                withdrawal_request_pass_timestamp: U256::from(T),
                withdrawal_request_amount: fp("1"),
                raw_collateral: U256::ZERO,
            },
            fp("3"),
        );
        gateway.set_position(
            b,
            RawPosition {
                tokens_outstanding: fp("100"),
                raw_collateral: fp("50"),
                ..Default::default()
            },
            fp("50"),
        );
        (gateway, a, b)
    }

    async fn wait_for_refresh(client: &EmpClient) {
        while client.last_update_time().is_none() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_reads_before_start_are_empty() {
        let (gateway, _, _) = scenario();
        let client = client(gateway, Arc::new(FixedClock::new(T)));

        assert!(client.all_sponsors().is_empty());
        assert!(client.all_positions().is_empty());
        assert!(client.undisputed_liquidations().is_empty());
        assert!(client.under_collateralized_positions(FIXED_POINT_SCALE).is_empty());
        assert_eq!(client.risk_parameters(), RiskParameters::default());
        assert_eq!(client.last_update_time(), None);
        assert!(client.stats().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_queries() {
        let (gateway, _a, b) = scenario();
        let client = client(gateway, Arc::new(FixedClock::new(T)));
        client.start();
        wait_for_refresh(&client).await;

        assert_eq!(client.all_sponsors().len(), 2);
        let positions = client.all_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].sponsor, b);

        let under = client.under_collateralized_positions(fp("1"));
        assert_eq!(under.len(), 1);
        assert_eq!(under[0].sponsor, b);

        // at price 0.4: 100 * 0.4 * 1.2 = 48 < 50
        assert!(client.under_collateralized_positions(fp("0.4")).is_empty());

        assert_eq!(client.risk_parameters().collateral_requirement, fp("1.2"));
        assert_eq!(client.last_update_time(), Some(T));

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_disputable_negates_comparator() {
        let a = Address::repeat_byte(0xA);
        let gateway = Arc::new(MockGateway::new(fp("1.2"), 7200));
        gateway.set_sponsor_records(vec![a]);
        let mut raw = raw_liquidation(a, 1, T - 10);
        raw.tokens_outstanding = fp("100");
        raw.liquidated_collateral = fp("120");
        gateway.set_liquidations(a, vec![raw]);

        let client = client(gateway, Arc::new(FixedClock::new(T)));
        client.start();
        wait_for_refresh(&client).await;

        let liquidations = client.undisputed_liquidations();
        assert_eq!(liquidations.len(), 1);
        let liquidation = &liquidations[0];
        assert_eq!(liquidation.id, "0");

        let requirement = client.risk_parameters().collateral_requirement;
        for price in ["0.5", "1", "1.0000001", "2"] {
            let v = fp(price);
            assert_eq!(
                client.is_disputable(liquidation, v),
                !is_undercollateralized(
                    liquidation.num_tokens,
                    liquidation.amount_collateral,
                    v,
                    requirement
                ),
                "price {price}"
            );
        }
        // exactly at the requirement the liquidation was not justified
        assert!(client.is_disputable(liquidation, fp("1")));
        assert!(!client.is_disputable(liquidation, fp("2")));

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_is_invisible_to_readers() {
        let (gateway, _, _) = scenario();
        let client = client(gateway.clone(), Arc::new(FixedClock::new(T)));
        client.start();
        wait_for_refresh(&client).await;

        let sponsors = client.all_sponsors();
        let positions = client.all_positions();
        let liquidations = client.undisputed_liquidations();

        gateway.set_collateral_requirement(fp("5"));
        gateway.fail_on("positions");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(client.stats().unwrap().cycles_failed(), 1);
        assert_eq!(client.all_sponsors(), sponsors);
        assert_eq!(client.all_positions(), positions);
        assert_eq!(client.undisputed_liquidations(), liquidations);
        assert_eq!(client.risk_parameters().collateral_requirement, fp("1.2"));

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_liquidation_expires_between_cycles() {
        let a = Address::repeat_byte(0xA);
        let gateway = Arc::new(MockGateway::new(fp("1.2"), 7200));
        gateway.set_sponsor_records(vec![a]);
        gateway.set_liquidations(a, vec![raw_liquidation(a, 1, T)]);

        let clock = Arc::new(FixedClock::new(T + 7199));
        let client = client(gateway, clock.clone());
        client.start();
        wait_for_refresh(&client).await;
        assert_eq!(client.undisputed_liquidations().len(), 1);

        clock.set(T + 7201);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(client.undisputed_liquidations().is_empty());

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_shutdown_stops() {
        let (gateway, _, _) = scenario();
        let client = client(gateway.clone(), Arc::new(FixedClock::new(T)));
        client.start();
        client.start();
        wait_for_refresh(&client).await;
        assert_eq!(gateway.requirement_calls(), 1);

        client.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.requirement_calls(), 1);
        // last snapshot is still served
        assert_eq!(client.all_positions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_shutdown_is_ignored() {
        let (gateway, _, _) = scenario();
        let client = client(gateway.clone(), Arc::new(FixedClock::new(T)));
        client.start();
        wait_for_refresh(&client).await;
        client.shutdown().await;

        client.start();
        assert!(client.stats().is_none());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.requirement_calls(), 1);
    }
}
