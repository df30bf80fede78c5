//! In-memory gateway and clock used by the unit tests.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::builder::Clock;
use emp_client_chain::{ContractGateway, GatewayError, GatewayResult, RawLiquidation, RawPosition};

pub fn raw_liquidation(sponsor: Address, state: u8, liquidation_time: u64) -> RawLiquidation {
    RawLiquidation {
        state,
        sponsor,
        tokens_outstanding: U256::from(1u64),
        liquidated_collateral: U256::from(1u64),
        liquidation_time: U256::from(liquidation_time),
    }
}

#[derive(Default)]
struct MockState {
    collateral_requirement: U256,
    liveness: U256,
    sponsor_records: Vec<Address>,
    positions: HashMap<Address, RawPosition>,
    collateral: HashMap<Address, U256>,
    liquidations: HashMap<Address, Vec<RawLiquidation>>,
    failing: HashSet<&'static str>,
    last_from_block: Option<u64>,
}

/// Contract fixture with per-call failure injection.
/// Call names match the on-chain function names.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
    requirement_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new(collateral_requirement: U256, liveness: u64) -> Self {
        let gateway = Self::default();
        {
            let mut state = gateway.state.lock();
            state.collateral_requirement = collateral_requirement;
            state.liveness = U256::from(liveness);
        }
        gateway
    }

    pub fn set_collateral_requirement(&self, value: U256) {
        self.state.lock().collateral_requirement = value;
    }

    pub fn set_liveness(&self, value: U256) {
        self.state.lock().liveness = value;
    }

    pub fn set_sponsor_records(&self, records: Vec<Address>) {
        self.state.lock().sponsor_records = records;
    }

    pub fn set_position(&self, sponsor: Address, position: RawPosition, collateral: U256) {
        let mut state = self.state.lock();
        state.positions.insert(sponsor, position);
        state.collateral.insert(sponsor, collateral);
    }

    pub fn set_liquidations(&self, sponsor: Address, liquidations: Vec<RawLiquidation>) {
        self.state.lock().liquidations.insert(sponsor, liquidations);
    }

    pub fn fail_on(&self, call: &'static str) {
        self.state.lock().failing.insert(call);
    }

    pub fn recover(&self) {
        self.state.lock().failing.clear();
    }

    pub fn last_from_block(&self) -> Option<u64> {
        self.state.lock().last_from_block
    }

    /// Number of `collateralRequirement` reads, i.e. cycles started.
    pub fn requirement_calls(&self) -> usize {
        self.requirement_calls.load(Ordering::SeqCst)
    }

    fn check(&self, call: &'static str) -> GatewayResult<()> {
        if self.state.lock().failing.contains(call) {
            return Err(GatewayError::rpc(call, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContractGateway for MockGateway {
    fn address(&self) -> Address {
        Address::repeat_byte(0xEE)
    }

    async fn collateral_requirement(&self) -> GatewayResult<U256> {
        self.requirement_calls.fetch_add(1, Ordering::SeqCst);
        self.check("collateralRequirement")?;
        Ok(self.state.lock().collateral_requirement)
    }

    async fn liquidation_liveness(&self) -> GatewayResult<U256> {
        self.check("liquidationLiveness")?;
        Ok(self.state.lock().liveness)
    }

    async fn new_sponsor_records(&self, from_block: u64) -> GatewayResult<Vec<Address>> {
        self.check("NewSponsor")?;
        let mut state = self.state.lock();
        state.last_from_block = Some(from_block);
        Ok(state.sponsor_records.clone())
    }

    async fn position(&self, sponsor: Address) -> GatewayResult<RawPosition> {
        self.check("positions")?;
        Ok(self
            .state
            .lock()
            .positions
            .get(&sponsor)
            .cloned()
            .unwrap_or_default())
    }

    async fn collateral(&self, sponsor: Address) -> GatewayResult<U256> {
        self.check("getCollateral")?;
        Ok(self
            .state
            .lock()
            .collateral
            .get(&sponsor)
            .copied()
            .unwrap_or_default())
    }

    async fn liquidations(&self, sponsor: Address) -> GatewayResult<Vec<RawLiquidation>> {
        self.check("getLiquidations")?;
        Ok(self
            .state
            .lock()
            .liquidations
            .get(&sponsor)
            .cloned()
            .unwrap_or_default())
    }
}

/// Settable clock.
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
