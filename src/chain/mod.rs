// Chain dispatcher
// All blockchain interaction lives behind this module: local wallet-mode
// transfers (build via RPC, sign in process, submit) and sdk-mode delegation
// to the network's public faucet. Mode selection is dynamic, but a failing
// wallet never silently falls back to sdk mode mid-request; masking an
// exhausted funded wallet is worse than a visible error.

pub mod rpc;
pub mod upstream;
pub mod wallet;

pub use wallet::validate_address;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

use crate::config::FaucetConfig;
use rpc::SuiRpcClient;
use upstream::UpstreamFaucetClient;
use wallet::LocalWallet;

/// Gas reserved on top of the dispensed amount for the transfer itself
pub const GAS_BUDGET: u64 = 10_000_000;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),
    #[error("requested amount {requested} exceeds the maximum {max}")]
    AmountTooLarge { requested: u64, max: u64 },
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("wallet mode is enabled but no private key is configured")]
    WalletUnavailable,
    #[error("faucet wallet balance {balance} below required {required}")]
    InsufficientBalance { balance: u64, required: u64 },
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction execution failed: {0}")]
    Execution(String),
    #[error("upstream faucet error: {0}")]
    Upstream(String),
    #[error("upstream faucet temporarily unavailable: {0}")]
    UpstreamTransient(String),
    #[error("upstream faucet rate limited: {0}")]
    UpstreamRateLimited(String),
}

/// Dispatch mode for outgoing tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaucetMode {
    /// Sign and submit a transfer from the locally held wallet
    Wallet,
    /// Delegate to the network's public faucet
    Sdk,
}

impl FaucetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaucetMode::Wallet => "wallet",
            FaucetMode::Sdk => "sdk",
        }
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub tx_hash: String,
    pub gas_used: Option<u64>,
}

/// Dispatcher owning the RPC client, the optional signing wallet, and the
/// upstream faucet client
pub struct FaucetDispatcher {
    rpc: SuiRpcClient,
    upstream: UpstreamFaucetClient,
    wallet: Option<Arc<LocalWallet>>,
    max_amount: u64,
    ready: AtomicBool,
}

impl FaucetDispatcher {
    /// Parse the configured key (if any) and wire up the chain clients.
    /// The signing key is immutable from here on.
    pub fn new(config: &FaucetConfig, http: reqwest::Client) -> Result<Self, ChainError> {
        let wallet = match &config.private_key {
            Some(encoded) => {
                let wallet = LocalWallet::from_encoded(encoded)?;
                tracing::info!(address = wallet.address(), "Faucet wallet loaded");
                Some(Arc::new(wallet))
            }
            None => None,
        };

        Ok(FaucetDispatcher {
            rpc: SuiRpcClient::new(http.clone(), &config.rpc_url),
            upstream: UpstreamFaucetClient::new(http, &config.network.faucet_url()),
            wallet,
            max_amount: config.max_amount,
            ready: AtomicBool::new(false),
        })
    }

    /// Verify RPC connectivity; the dispatcher reports not-ready until this
    /// succeeds once
    pub async fn initialize(&self) -> Result<(), ChainError> {
        let epoch = self.rpc.latest_epoch().await?;
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!(epoch, rpc = self.rpc.url(), "Chain RPC reachable");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn faucet_address(&self) -> Option<&str> {
        self.wallet.as_deref().map(LocalWallet::address)
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    /// Resolve the dispatch mode from the dynamic setting; defaults to
    /// wallet when a key is configured and sdk otherwise
    pub fn resolve_mode(&self, configured: Option<&str>) -> FaucetMode {
        match configured {
            Some("wallet") => FaucetMode::Wallet,
            Some("sdk") => FaucetMode::Sdk,
            _ => {
                if self.wallet.is_some() {
                    FaucetMode::Wallet
                } else {
                    FaucetMode::Sdk
                }
            }
        }
    }

    /// Current faucet wallet balance in base units. Without a wallet (sdk
    /// only) this reports a sentinel so balance gates never trip.
    pub async fn wallet_balance(&self) -> Result<u64, ChainError> {
        match self.faucet_address() {
            Some(address) => self.rpc.get_balance(address).await,
            None => Ok(u64::MAX),
        }
    }

    /// Dispatch `amount` base units to `recipient` using the given mode
    pub async fn send_tokens(
        &self,
        recipient: &str,
        amount: u64,
        request_id: &str,
        mode: FaucetMode,
    ) -> Result<SendOutcome, ChainError> {
        let recipient = validate_address(recipient)
            .ok_or_else(|| ChainError::InvalidAddress(recipient.to_string()))?;
        if amount > self.max_amount {
            return Err(ChainError::AmountTooLarge { requested: amount, max: self.max_amount });
        }

        let outcome = match mode {
            FaucetMode::Wallet => self.send_from_wallet(&recipient, amount).await?,
            FaucetMode::Sdk => {
                let digest = self.upstream.request_tokens(&recipient).await?;
                SendOutcome { tx_hash: digest, gas_used: None }
            }
        };

        tracing::info!(
            request_id,
            tx_hash = %outcome.tx_hash,
            from = self.faucet_address().unwrap_or("upstream"),
            to = %recipient,
            amount,
            gas_used = outcome.gas_used,
            "Tokens dispatched"
        );
        Ok(outcome)
    }

    async fn send_from_wallet(
        &self,
        recipient: &str,
        amount: u64,
    ) -> Result<SendOutcome, ChainError> {
        let wallet = self.wallet.as_ref().ok_or(ChainError::WalletUnavailable)?;
        let sender = wallet.address();
        let required = amount + GAS_BUDGET;

        // Balance is re-read at dispatch time; rate-limit checks may have
        // observed a stale value
        let balance = self.rpc.get_balance(sender).await?;
        if balance < required {
            return Err(ChainError::InsufficientBalance { balance, required });
        }

        let coins = self.rpc.get_gas_coins(sender).await?;
        let gas_coin = coins
            .iter()
            .find(|coin| coin.balance >= required)
            .ok_or(ChainError::InsufficientBalance { balance, required })?;

        let tx_bytes = self
            .rpc
            .build_transfer(sender, &gas_coin.object_id, recipient, amount, GAS_BUDGET)
            .await?;
        let raw = BASE64
            .decode(&tx_bytes)
            .map_err(|e| ChainError::Rpc(format!("unsafe_transferSui: bad txBytes: {}", e)))?;
        let signature = wallet.sign_transaction(&raw);

        let result = self.rpc.execute_transaction(&tx_bytes, &signature).await?;
        if !result.success {
            return Err(ChainError::Execution(
                result.error.unwrap_or_else(|| "transaction effects reported failure".into()),
            ));
        }
        Ok(SendOutcome { tx_hash: result.digest, gas_used: result.gas_used })
    }

    /// Health summary for the probes
    pub async fn health_check(&self) -> (bool, serde_json::Value) {
        let rpc_ok = self.rpc.latest_epoch().await.is_ok();
        let details = serde_json::json!({
            "rpc": if rpc_ok { "ok" } else { "unreachable" },
            "rpcUrl": self.rpc.url(),
            "walletConfigured": self.has_wallet(),
            "faucetAddress": self.faucet_address(),
            "upstreamUrl": self.upstream.url(),
        });
        (rpc_ok, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    fn test_config(private_key: Option<String>) -> FaucetConfig {
        FaucetConfig {
            host: "127.0.0.1".into(),
            http_port: 0,
            cors_origin: None,
            environment: "development".into(),
            api_key: "test".into(),
            jwt_secret: "secret".into(),
            admin_username: "admin".into(),
            admin_password: "admin".into(),
            network: Network::Testnet,
            rpc_url: Network::Testnet.default_rpc_url(),
            private_key,
            default_amount: 100_000_000,
            max_amount: 1_000_000_000,
            min_wallet_balance: 1_000_000_000,
            cache_url: None,
            cache_prefix: "suifx:".into(),
            db_url: None,
            rate_window_ms: 3_600_000,
            max_per_wallet: 1,
            max_per_ip: 10,
            max_per_global: 10_000,
            log_level: "info".into(),
        }
    }

    const SEED_HEX: &str =
        "9bf49a6a0755f953811fce125f2683d50429c3bb49e074147e0089a52eae155f";

    #[test]
    fn mode_defaults_follow_key_presence() {
        let http = reqwest::Client::new();
        let with_key =
            FaucetDispatcher::new(&test_config(Some(SEED_HEX.into())), http.clone()).unwrap();
        assert_eq!(with_key.resolve_mode(None), FaucetMode::Wallet);
        assert_eq!(with_key.resolve_mode(Some("sdk")), FaucetMode::Sdk);

        let keyless = FaucetDispatcher::new(&test_config(None), http).unwrap();
        assert_eq!(keyless.resolve_mode(None), FaucetMode::Sdk);
        assert_eq!(keyless.resolve_mode(Some("garbage")), FaucetMode::Sdk);
    }

    #[tokio::test]
    async fn keyless_balance_is_sentinel() {
        let dispatcher =
            FaucetDispatcher::new(&test_config(None), reqwest::Client::new()).unwrap();
        assert_eq!(dispatcher.wallet_balance().await.unwrap(), u64::MAX);
        assert!(dispatcher.faucet_address().is_none());
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected_before_any_io() {
        let dispatcher =
            FaucetDispatcher::new(&test_config(None), reqwest::Client::new()).unwrap();
        let err = dispatcher
            .send_tokens(
                "0xa7f1d92a82c8d8fe434d98558ce2b347171198542f112d0558f56bd68807999a",
                2_000_000_000,
                "req-1",
                FaucetMode::Sdk,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::AmountTooLarge { .. }));
    }

    #[tokio::test]
    async fn bad_address_is_rejected_before_any_io() {
        let dispatcher =
            FaucetDispatcher::new(&test_config(None), reqwest::Client::new()).unwrap();
        let err = dispatcher
            .send_tokens("0xzz", 1, "req-1", FaucetMode::Sdk)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn wallet_mode_without_key_errors_instead_of_falling_back() {
        let dispatcher =
            FaucetDispatcher::new(&test_config(None), reqwest::Client::new()).unwrap();
        let err = dispatcher
            .send_tokens(
                "0xa7f1d92a82c8d8fe434d98558ce2b347171198542f112d0558f56bd68807999a",
                1,
                "req-1",
                FaucetMode::Wallet,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::WalletUnavailable));
    }
}
