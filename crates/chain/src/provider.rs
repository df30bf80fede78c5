//! Alloy-backed [`ContractGateway`] over HTTP JSON-RPC.
//! Uses typed `sol!` bindings instead of manual JSON-RPC.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::contracts::IExpiringMultiParty;
use crate::gateway::{ContractGateway, GatewayError, GatewayResult, RawLiquidation, RawPosition};

/// Split `[from, to]` into inclusive windows of at most `chunk` blocks.
pub fn block_ranges(from: u64, to: u64, chunk: u64) -> Vec<(u64, u64)> {
    let chunk = chunk.max(1);
    let mut ranges = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(chunk - 1).min(to);
        ranges.push((start, end));
        if end == to {
            break;
        }
        start = end + 1;
    }
    ranges
}

fn call_error(call: &'static str, err: alloy::contract::Error) -> GatewayError {
    if matches!(err, alloy::contract::Error::AbiError(_)) {
        GatewayError::decode(call, err)
    } else {
        GatewayError::rpc(call, err)
    }
}

/// HTTP gateway for one EMP contract.
#[derive(Debug, Clone)]
pub struct AlloyGateway {
    /// JSON-RPC endpoint
    rpc_url: Url,
    /// EMP contract address
    address: Address,
    /// Block span per `eth_getLogs` request (`None` = single request)
    log_chunk_size: Option<u64>,
}

impl AlloyGateway {
    /// Create a gateway without touching the network.
    pub fn new(rpc_url: &str, address: Address) -> GatewayResult<Self> {
        let parsed = rpc_url.parse::<Url>().map_err(|e| GatewayError::InvalidUrl {
            url: rpc_url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            rpc_url: parsed,
            address,
            log_chunk_size: None,
        })
    }

    /// Create a gateway and verify the endpoint answers.
    pub async fn connect(rpc_url: &str, address: Address) -> GatewayResult<Self> {
        let gateway = Self::new(rpc_url, address)?;

        info!(rpc = rpc_url, emp = %address, "Initializing EMP gateway");

        let block = gateway.block_number().await?;
        info!(block = block, "Provider connection verified");

        Ok(gateway)
    }

    /// Limit each `eth_getLogs` request to `chunk` blocks.
    pub fn with_log_chunk_size(mut self, chunk: Option<u64>) -> Self {
        self.log_chunk_size = chunk;
        self
    }

    pub fn log_chunk_size(&self) -> Option<u64> {
        self.log_chunk_size
    }

    fn provider(&self) -> impl Provider {
        ProviderBuilder::new().on_http(self.rpc_url.clone())
    }

    /// Get current block number.
    pub async fn block_number(&self) -> GatewayResult<u64> {
        self.provider()
            .get_block_number()
            .await
            .map_err(|e| GatewayError::rpc("eth_blockNumber", e))
    }

    async fn new_sponsor_logs(&self, from_block: u64) -> GatewayResult<Vec<Log>> {
        let provider = self.provider();
        let base = Filter::new()
            .address(self.address)
            .event_signature(IExpiringMultiParty::NewSponsor::SIGNATURE_HASH);

        let Some(chunk) = self.log_chunk_size else {
            let filter = base.from_block(from_block).to_block(BlockNumberOrTag::Latest);
            return provider
                .get_logs(&filter)
                .await
                .map_err(|e| GatewayError::rpc("eth_getLogs", e));
        };

        let latest = provider
            .get_block_number()
            .await
            .map_err(|e| GatewayError::rpc("eth_blockNumber", e))?;

        let mut logs = Vec::new();
        for (start, end) in block_ranges(from_block, latest, chunk) {
            let filter = base.clone().from_block(start).to_block(end);
            let batch = provider
                .get_logs(&filter)
                .await
                .map_err(|e| GatewayError::rpc("eth_getLogs", e))?;
            debug!(from = start, to = end, count = batch.len(), "Fetched NewSponsor log window");
            logs.extend(batch);
        }
        Ok(logs)
    }
}

#[async_trait]
impl ContractGateway for AlloyGateway {
    fn address(&self) -> Address {
        self.address
    }

    async fn collateral_requirement(&self) -> GatewayResult<U256> {
        let provider = self.provider();
        let emp = IExpiringMultiParty::new(self.address, &provider);
        let requirement = emp
            .collateralRequirement()
            .call()
            .await
            .map_err(|e| call_error("collateralRequirement", e))?;
        Ok(requirement._0.rawValue)
    }

    async fn liquidation_liveness(&self) -> GatewayResult<U256> {
        let provider = self.provider();
        let emp = IExpiringMultiParty::new(self.address, &provider);
        let liveness = emp
            .liquidationLiveness()
            .call()
            .await
            .map_err(|e| call_error("liquidationLiveness", e))?;
        Ok(liveness._0)
    }

    async fn new_sponsor_records(&self, from_block: u64) -> GatewayResult<Vec<Address>> {
        let logs = self.new_sponsor_logs(from_block).await?;

        let sponsors = logs
            .iter()
            .map(|log| {
                log.log_decode::<IExpiringMultiParty::NewSponsor>()
                    .map(|decoded| decoded.inner.data.sponsor)
                    .map_err(|e| GatewayError::decode("NewSponsor", e))
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        debug!(from_block = from_block, records = sponsors.len(), "Fetched NewSponsor records");
        Ok(sponsors)
    }

    async fn position(&self, sponsor: Address) -> GatewayResult<RawPosition> {
        let provider = self.provider();
        let emp = IExpiringMultiParty::new(self.address, &provider);
        let position = emp
            .positions(sponsor)
            .call()
            .await
            .map_err(|e| call_error("positions", e))?;

        Ok(RawPosition {
            tokens_outstanding: position.tokensOutstanding.rawValue,
            withdrawal_request_pass_timestamp: position.withdrawalRequestPassTimestamp,
            withdrawal_request_amount: position.withdrawalRequestAmount.rawValue,
            raw_collateral: position.rawCollateral.rawValue,
        })
    }

    async fn collateral(&self, sponsor: Address) -> GatewayResult<U256> {
        let provider = self.provider();
        let emp = IExpiringMultiParty::new(self.address, &provider);
        let collateral = emp
            .getCollateral(sponsor)
            .call()
            .await
            .map_err(|e| call_error("getCollateral", e))?;
        Ok(collateral._0.rawValue)
    }

    async fn liquidations(&self, sponsor: Address) -> GatewayResult<Vec<RawLiquidation>> {
        let provider = self.provider();
        let emp = IExpiringMultiParty::new(self.address, &provider);
        let history = emp
            .getLiquidations(sponsor)
            .call()
            .await
            .map_err(|e| call_error("getLiquidations", e))?;

        Ok(history
            ._0
            .into_iter()
            .map(|l| RawLiquidation {
                state: l.state,
                sponsor: l.sponsor,
                tokens_outstanding: l.tokensOutstanding.rawValue,
                liquidated_collateral: l.liquidatedCollateral.rawValue,
                liquidation_time: l.liquidationTime,
            })
            .collect())
    }
}
