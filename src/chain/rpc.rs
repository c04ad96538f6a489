// Sui JSON-RPC client
// Thin wrapper over the shared reqwest client; only the calls the faucet
// needs: liveness, balance, gas-coin listing, transfer build, execution.

use serde_json::{json, Value};

use super::ChainError;

/// Outcome of an executed transaction block
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub digest: String,
    pub success: bool,
    pub error: Option<String>,
    pub gas_used: Option<u64>,
}

/// A SUI coin object usable as gas
#[derive(Debug, Clone)]
pub struct GasCoin {
    pub object_id: String,
    pub balance: u64,
}

pub struct SuiRpcClient {
    http: reqwest::Client,
    url: String,
}

impl SuiRpcClient {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        SuiRpcClient { http, url: url.to_string() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("{}: {}", method, e)))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("{}: invalid response: {}", method, e)))?;

        if let Some(err) = payload.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error");
            return Err(ChainError::Rpc(format!("{}: {}", method, message)));
        }
        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Liveness probe: fetch the latest system state and return the epoch
    pub async fn latest_epoch(&self) -> Result<u64, ChainError> {
        let state = self.call("sui_getLatestSuiSystemState", json!([])).await?;
        Ok(state
            .get("epoch")
            .and_then(Value::as_str)
            .and_then(|e| e.parse::<u64>().ok())
            .unwrap_or(0))
    }

    /// SUI balance of an address, in base units
    pub async fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        let result = self
            .call("suix_getBalance", json!([address, "0x2::sui::SUI"]))
            .await?;
        let total = result
            .get("totalBalance")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::Rpc("suix_getBalance: missing totalBalance".to_string()))?;
        total
            .parse::<u128>()
            .map(|v| v.min(u64::MAX as u128) as u64)
            .map_err(|_| ChainError::Rpc(format!("suix_getBalance: bad balance {:?}", total)))
    }

    /// SUI coin objects owned by an address, largest first
    pub async fn get_gas_coins(&self, owner: &str) -> Result<Vec<GasCoin>, ChainError> {
        let result = self
            .call("suix_getCoins", json!([owner, "0x2::sui::SUI", Value::Null, 50]))
            .await?;
        let mut coins: Vec<GasCoin> = result
            .get("data")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|coin| {
                        Some(GasCoin {
                            object_id: coin.get("coinObjectId")?.as_str()?.to_string(),
                            balance: coin
                                .get("balance")?
                                .as_str()
                                .and_then(|b| b.parse::<u64>().ok())?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        coins.sort_by(|a, b| b.balance.cmp(&a.balance));
        Ok(coins)
    }

    /// Build an unsigned TransferSui transaction that splits `amount` off
    /// the gas coin; returns the base64 BCS transaction bytes
    pub async fn build_transfer(
        &self,
        signer: &str,
        gas_coin: &str,
        recipient: &str,
        amount: u64,
        gas_budget: u64,
    ) -> Result<String, ChainError> {
        let result = self
            .call(
                "unsafe_transferSui",
                json!([
                    signer,
                    gas_coin,
                    gas_budget.to_string(),
                    recipient,
                    amount.to_string()
                ]),
            )
            .await?;
        result
            .get("txBytes")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChainError::Rpc("unsafe_transferSui: missing txBytes".to_string()))
    }

    /// Submit a signed transaction and wait for its effects
    pub async fn execute_transaction(
        &self,
        tx_bytes_b64: &str,
        signature_b64: &str,
    ) -> Result<ExecutionResult, ChainError> {
        let result = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    tx_bytes_b64,
                    [signature_b64],
                    { "showEffects": true },
                    "WaitForLocalExecution"
                ]),
            )
            .await?;

        let digest = result
            .get("digest")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = result
            .pointer("/effects/status/status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let error = result
            .pointer("/effects/status/error")
            .and_then(Value::as_str)
            .map(str::to_string);
        let gas_used = result
            .pointer("/effects/gasUsed/computationCost")
            .and_then(Value::as_str)
            .and_then(|c| c.parse::<u64>().ok());

        Ok(ExecutionResult {
            digest,
            success: status == "success",
            error,
            gas_used,
        })
    }
}
