// Stacks node API client used by the collector.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{off_thread, StacksBlock, StacksChain};
use crate::chain::{HttpTimeouts, JsonHttp};
use crate::clarity::ClarityValue;
use crate::error::{EngineError, EngineResult};
use crate::types::{iso_millis, MicroStx};

const POX_CONTRACT: &str = "SP000000000000000000002Q6VF78";
const THRESHOLD_HELPER: &str = "SP2PABAF9FTAJYNFZH93XENAJ8FVY99RRM50D2JG9";
/// Participation threshold parameter of the helper contract.
const THRESHOLD_SCALE: u128 = 4200;

#[derive(Debug, Deserialize)]
struct BlockByBurnHeight {
    height: u64,
    burn_block_height: u64,
    #[serde(with = "iso_millis")]
    block_time_iso: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PoxCycle {
    total_stacked_amount: MicroStx,
}

#[derive(Debug, Deserialize)]
struct BlockSummary {
    index_block_hash: String,
}

#[derive(Debug, Serialize)]
struct ReadOnlyCall<'a> {
    sender: &'a str,
    arguments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReadOnlyResult {
    #[serde(default)]
    okay: bool,
    result: Option<String>,
    cause: Option<String>,
}

#[derive(Clone)]
pub struct StacksNodeClient {
    http: JsonHttp,
}

impl StacksNodeClient {
    pub fn new(node_url: impl Into<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            http: JsonHttp::new(node_url, timeouts),
        }
    }

    fn liquid_supply(http: &JsonHttp, tip: &str) -> EngineResult<u128> {
        let path = format!(
            "/v2/contracts/call-read/{POX_CONTRACT}/pox-4/get-pox-info?tip={}",
            tip.trim_start_matches("0x")
        );
        let call = ReadOnlyCall {
            sender: POX_CONTRACT,
            arguments: Vec::new(),
        };
        let response: ReadOnlyResult = http.post(&path, &call)?;
        let raw = response.result.ok_or_else(|| {
            EngineError::upstream(http.url(&path), response.cause.unwrap_or_else(|| "empty result".into()))
        })?;
        ClarityValue::from_hex(&raw)
            .and_then(|v| v.unwrap_ok()?.tuple_field("total-liquid-supply-ustx")?.expect_uint())
            .map_err(|e| EngineError::upstream(http.url(&path), e))
    }

    fn threshold_blocking(http: &JsonHttp, total_stacked: MicroStx, stacks_height: u64) -> EngineResult<u64> {
        let block: BlockSummary = http.get(&format!("/extended/v2/blocks/{stacks_height}"))?;
        let liquid = Self::liquid_supply(http, &block.index_block_hash)?;

        let path = format!("/v2/contracts/call-read/{THRESHOLD_HELPER}/pox3-info-helper-v2/get-threshold-from-participation");
        let call = ReadOnlyCall {
            sender: THRESHOLD_HELPER,
            arguments: vec![
                ClarityValue::UInt(liquid).to_hex(),
                ClarityValue::UInt(total_stacked.0).to_hex(),
                ClarityValue::UInt(THRESHOLD_SCALE).to_hex(),
            ],
        };
        let response: ReadOnlyResult = http.post(&path, &call)?;
        let Some(raw) = response.result.filter(|_| response.okay) else {
            warn!(
                "threshold call at stacks height {stacks_height} returned no result ({}), using 0",
                response.cause.as_deref().unwrap_or("no cause")
            );
            return Ok(0);
        };
        let value = ClarityValue::from_hex(&raw).map_err(|e| EngineError::upstream(http.url(&path), e))?;
        let inner = match &value {
            ClarityValue::ResponseOk(inner) => inner.as_ref(),
            other => other,
        };
        let threshold = inner.expect_uint().map_err(|e| EngineError::upstream(http.url(&path), e))?;
        u64::try_from(threshold).map_err(|_| EngineError::domain(format!("threshold {threshold} exceeds u64")))
    }
}

#[async_trait]
impl StacksChain for StacksNodeClient {
    async fn block_at_burn_height(&self, burn_height: u64) -> EngineResult<Option<StacksBlock>> {
        let http = self.http.clone();
        let found: Option<BlockByBurnHeight> = off_thread(move || {
            http.get_optional(&format!("/extended/v1/block/by_burn_block_height/{burn_height}"))
        })
        .await?;
        Ok(found.map(|b| StacksBlock {
            height: b.height,
            burn_block_height: b.burn_block_height,
            block_time: b.block_time_iso,
        }))
    }

    async fn total_stacked(&self, cycle: u64) -> EngineResult<MicroStx> {
        let http = self.http.clone();
        let pox: PoxCycle = off_thread(move || http.get(&format!("/extended/v2/pox/cycles/{cycle}"))).await?;
        debug!("cycle {cycle} total stacked {}", pox.total_stacked_amount);
        Ok(pox.total_stacked_amount)
    }

    async fn threshold(&self, total_stacked: MicroStx, stacks_height: u64) -> EngineResult<u64> {
        let http = self.http.clone();
        off_thread(move || Self::threshold_blocking(&http, total_stacked, stacks_height)).await
    }
}
