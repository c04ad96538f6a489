// Request admission pipeline
// Runs strictly in order: authentication, address validation, amount
// validation, rate limits (wallet, ip, client, global), balance/mode
// pre-check, dispatch, outcome recording. The first failing step aborts the
// request; the outcome is a tagged Result rather than an exception thrown
// through the stack.

use std::sync::Arc;

use chrono::Utc;

use crate::cache::CacheService;
use crate::chain::{ChainError, FaucetDispatcher, FaucetMode};
use crate::config::FaucetConfig;
use crate::db::repositories::{MetricsDelta, NewTransaction};
use crate::db::Storage;
use crate::entity::api_clients;
use crate::error::{FaucetError, FaucetResult};
use crate::models::FaucetSuccessData;
use crate::services::constant_time_eq;
use crate::services::settings::{RateLimitSnapshot, SettingsService};

/// Who is asking: the legacy master key, a registered client, or an admin
/// session (admin-invoked endpoints only)
#[derive(Debug, Clone)]
pub enum Caller {
    Master,
    Client(api_clients::Model),
    Admin(String),
}

impl Caller {
    pub fn rate_limit_override(&self) -> Option<u32> {
        match self {
            Caller::Client(client) => {
                client.rate_limit_override.and_then(|v| u32::try_from(v).ok())
            }
            _ => None,
        }
    }
}

/// Per-request context assembled at the HTTP boundary
#[derive(Debug, Clone)]
pub struct FaucetRequestContext {
    pub request_id: String,
    pub address: String,
    pub amount: Option<u64>,
    pub client_ip: String,
    pub user_agent: Option<String>,
}

pub struct AdmissionPipeline {
    config: FaucetConfig,
    cache: Arc<CacheService>,
    storage: Storage,
    settings: Arc<SettingsService>,
    dispatcher: Arc<FaucetDispatcher>,
}

impl AdmissionPipeline {
    pub fn new(
        config: FaucetConfig,
        cache: Arc<CacheService>,
        storage: Storage,
        settings: Arc<SettingsService>,
        dispatcher: Arc<FaucetDispatcher>,
    ) -> Self {
        AdmissionPipeline { config, cache, storage, settings, dispatcher }
    }

    /// Step 1: resolve the normalized credential into a caller
    pub async fn authenticate(&self, credential: Option<&str>) -> FaucetResult<Caller> {
        let Some(key) = credential else {
            return Err(FaucetError::MissingApiKey);
        };
        if constant_time_eq(key, &self.config.api_key) {
            return Ok(Caller::Master);
        }
        match self.storage.find_api_client_by_key(key).await {
            Ok(Some(client)) => {
                if !client.is_active {
                    return Err(FaucetError::InactiveClient);
                }
                Ok(Caller::Client(client))
            }
            Ok(None) => Err(FaucetError::InvalidApiKey),
            Err(e) => {
                tracing::warn!("Client lookup failed during authentication: {}", e);
                Err(FaucetError::InvalidApiKey)
            }
        }
    }

    /// Steps 2-7 for an already-authenticated caller
    pub async fn admit(
        &self,
        caller: &Caller,
        ctx: &FaucetRequestContext,
    ) -> FaucetResult<FaucetSuccessData> {
        // Step 2: address validation
        let address = crate::chain::validate_address(&ctx.address)
            .ok_or_else(|| FaucetError::InvalidAddress(ctx.address.clone()))?;

        // Step 3: amount validation, defaulting from config
        let amount = ctx.amount.unwrap_or(self.config.default_amount);
        if amount == 0 {
            return Err(FaucetError::InvalidAmount("amount must be positive".to_string()));
        }
        if amount > self.config.max_amount {
            return Err(FaucetError::InvalidAmount(format!(
                "amount exceeds the maximum of {}",
                self.config.max_amount
            )));
        }

        let snapshot = self.settings.snapshot().await;

        // Step 4: rate limits, first dimension over its cap aborts
        if snapshot.enabled {
            self.enforce_rate_limits(caller, &address, &ctx.client_ip, &snapshot).await?;
        }

        // Step 5: balance/mode pre-check (wallet mode only)
        let mode = self.dispatcher.resolve_mode(snapshot.faucet_mode.as_deref());
        if mode == FaucetMode::Wallet {
            match self.dispatcher.wallet_balance().await {
                Ok(balance) if balance < self.config.min_wallet_balance => {
                    return Err(FaucetError::FaucetEmpty);
                }
                Ok(_) => {}
                Err(e) => {
                    // Fail open; the dispatcher re-reads before submitting
                    tracing::warn!(request_id = %ctx.request_id, "Balance pre-check failed: {}", e);
                }
            }
        }

        // Step 6: dispatch and record the outcome
        match self
            .dispatcher
            .send_tokens(&address, amount, &ctx.request_id, mode)
            .await
        {
            Ok(outcome) => {
                self.record_success(ctx, &address, amount, &outcome.tx_hash, &snapshot).await;
                Ok(FaucetSuccessData {
                    explorer_url: self.config.explorer_tx_url(&outcome.tx_hash),
                    transaction_hash: outcome.tx_hash,
                    amount: amount.to_string(),
                    wallet_address: address,
                    network: self.config.network.as_str().to_string(),
                })
            }
            Err(err) => Err(self.record_failure(ctx, &address, amount, err).await),
        }
    }

    async fn enforce_rate_limits(
        &self,
        caller: &Caller,
        address: &str,
        client_ip: &str,
        snapshot: &RateLimitSnapshot,
    ) -> FaucetResult<()> {
        let window_ms = snapshot.window_ms;
        let override_limit = caller.rate_limit_override();

        // Wallet dimension
        let wallet_limit = override_limit.unwrap_or(snapshot.max_per_wallet);
        let hit = self.cache.incr_rate("wallet", address, window_ms).await;
        if hit.count > wallet_limit as u64 {
            return Err(self.deny("wallet", hit.ttl_seconds).await);
        }

        // Wallet cooldown: wall-clock gap since the last successful
        // dispatch, independent of window position
        let cooldown_secs = snapshot.effective_cooldown_seconds();
        if cooldown_secs > 0 {
            if let Some(last_ms) = self.cache.get_last_request(address).await {
                let now_ms = Utc::now().timestamp_millis().max(0) as u64;
                let elapsed_ms = now_ms.saturating_sub(last_ms);
                let cooldown_ms = cooldown_secs * 1000;
                if elapsed_ms < cooldown_ms {
                    let retry_after = (cooldown_ms - elapsed_ms).div_ceil(1000);
                    return Err(self.deny("cooldown", retry_after).await);
                }
            }
        }

        // IP dimension; emergency mode swaps in the stricter cap
        let ip_limit = override_limit.unwrap_or(snapshot.effective_max_per_ip());
        let hit = self.cache.incr_rate("ip", client_ip, window_ms).await;
        if hit.count > ip_limit as u64 {
            return Err(self.deny("ip", hit.ttl_seconds).await);
        }

        // Client dimension, registered clients only
        if let Caller::Client(client) = caller {
            let limit = override_limit.unwrap_or(snapshot.api_max_requests_per_window);
            let hit = self.cache.incr_rate("client", &client.client_id, window_ms).await;
            if hit.count > limit as u64 {
                return Err(self.deny("client", hit.ttl_seconds).await);
            }
        }

        // Global dimension always applies, even with a client override
        let hit = self.cache.incr_rate("global", "global", window_ms).await;
        if hit.count > self.config.max_per_global as u64 {
            return Err(self.deny("global", hit.ttl_seconds).await);
        }

        Ok(())
    }

    async fn deny(&self, dimension: &str, retry_after: u64) -> FaucetError {
        self.cache.add_metric("rate_limit_hits", 1).await;
        FaucetError::RateLimitExceeded {
            retry_after: retry_after.max(1),
            detail: dimension.to_string(),
        }
    }

    /// Step 7 bookkeeping for a delivered dispatch. The last-request marker
    /// is only set here so a failed attempt never imposes a cooldown.
    async fn record_success(
        &self,
        ctx: &FaucetRequestContext,
        address: &str,
        amount: u64,
        tx_hash: &str,
        snapshot: &RateLimitSnapshot,
    ) {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        let marker_ttl_ms =
            snapshot.window_ms.max(snapshot.effective_cooldown_seconds() * 1000);
        self.cache.track_last_request(address, now_ms, marker_ttl_ms).await;

        self.cache.add_metric("requests_total", 1).await;
        self.cache.add_metric("requests_success", 1).await;

        self.journal(
            ctx,
            address,
            amount,
            Some(tx_hash.to_string()),
            None,
            MetricsDelta::success(amount),
        )
        .await;
    }

    /// Map a dispatch failure to its API error. Balance outages are not
    /// journaled; everything else is. Counters stay incremented: the
    /// attempt was made.
    async fn record_failure(
        &self,
        ctx: &FaucetRequestContext,
        address: &str,
        amount: u64,
        err: ChainError,
    ) -> FaucetError {
        self.cache.add_metric("requests_total", 1).await;
        self.cache.add_metric("requests_failed", 1).await;

        match err {
            ChainError::InvalidAddress(addr) => FaucetError::InvalidAddress(addr),
            ChainError::AmountTooLarge { requested, max } => FaucetError::InvalidAmount(
                format!("amount {} exceeds the maximum of {}", requested, max),
            ),
            // Operator-visible outage, not a journaled transaction
            ChainError::InsufficientBalance { balance, required } => {
                FaucetError::InsufficientBalance(format!(
                    "balance {} below required {}",
                    balance, required
                ))
            }
            ChainError::UpstreamRateLimited(message) => {
                self.journal(
                    ctx,
                    address,
                    amount,
                    None,
                    Some(message.clone()),
                    MetricsDelta::upstream_rate_limited(),
                )
                .await;
                FaucetError::UpstreamRateLimited(message)
            }
            ChainError::Rpc(message) | ChainError::UpstreamTransient(message) => {
                self.journal(
                    ctx,
                    address,
                    amount,
                    None,
                    Some(message.clone()),
                    MetricsDelta::network_error(),
                )
                .await;
                FaucetError::TransactionFailed(message)
            }
            other => {
                let message = other.to_string();
                self.journal(
                    ctx,
                    address,
                    amount,
                    None,
                    Some(message.clone()),
                    MetricsDelta::failure(),
                )
                .await;
                FaucetError::TransactionFailed(message)
            }
        }
    }

    /// Persist the journal row and the daily metrics delta. A failed write
    /// is logged and swallowed; it never fails the dispatch it records.
    async fn journal(
        &self,
        ctx: &FaucetRequestContext,
        address: &str,
        amount: u64,
        tx_hash: Option<String>,
        error_message: Option<String>,
        delta: MetricsDelta,
    ) {
        let success = tx_hash.is_some();
        let record = NewTransaction {
            request_id: ctx.request_id.clone(),
            wallet_address: address.to_string(),
            amount,
            tx_hash,
            success,
            error_message,
            client_ip: ctx.client_ip.clone(),
            user_agent: ctx.user_agent.clone(),
        };
        if let Err(e) = self.storage.save_transaction(record).await {
            tracing::error!(request_id = %ctx.request_id, "Failed to journal transaction: {}", e);
        }
        if let Err(e) = self
            .storage
            .upsert_daily_metrics(Utc::now().date_naive(), delta)
            .await
        {
            tracing::error!(request_id = %ctx.request_id, "Failed to update daily metrics: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    fn test_config() -> FaucetConfig {
        FaucetConfig {
            host: "127.0.0.1".into(),
            http_port: 0,
            cors_origin: None,
            environment: "development".into(),
            api_key: "suisuisui".into(),
            jwt_secret: "a-test-secret-at-least-32-bytes-long".into(),
            admin_username: "admin".into(),
            admin_password: "admin".into(),
            network: Network::Testnet,
            rpc_url: "http://localhost:9000".into(),
            private_key: None,
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

    async fn test_pipeline() -> AdmissionPipeline {
        let config = test_config();
        let storage = Storage::disabled();
        AdmissionPipeline::new(
            config.clone(),
            Arc::new(CacheService::new(None, &config.cache_prefix).await),
            storage.clone(),
            Arc::new(SettingsService::new(config.clone(), storage)),
            Arc::new(FaucetDispatcher::new(&config, reqwest::Client::new()).unwrap()),
        )
    }

    const ADDR: &str = "0xa7f1d92a82c8d8fe434d98558ce2b347171198542f112d0558f56bd68807999a";

    fn ctx(address: &str) -> FaucetRequestContext {
        FaucetRequestContext {
            request_id: "req-test".into(),
            address: address.into(),
            amount: None,
            client_ip: "10.0.0.1".into(),
            user_agent: Some("test-agent".into()),
        }
    }

    #[tokio::test]
    async fn master_key_authenticates_constant_time() {
        let pipeline = test_pipeline().await;
        assert!(matches!(
            pipeline.authenticate(Some("suisuisui")).await.unwrap(),
            Caller::Master
        ));
        assert!(matches!(
            pipeline.authenticate(Some("wrong")).await.unwrap_err(),
            FaucetError::InvalidApiKey
        ));
        assert!(matches!(
            pipeline.authenticate(None).await.unwrap_err(),
            FaucetError::MissingApiKey
        ));
    }

    #[tokio::test]
    async fn invalid_address_rejected_without_side_effects() {
        let pipeline = test_pipeline().await;
        let err = pipeline.admit(&Caller::Master, &ctx("0xzz")).await.unwrap_err();
        assert!(matches!(err, FaucetError::InvalidAddress(_)));
        // no counter was touched
        assert_eq!(pipeline.cache.get_rate("wallet", "0xzz").await, None);
    }

    #[tokio::test]
    async fn zero_and_oversized_amounts_rejected() {
        let pipeline = test_pipeline().await;
        let mut context = ctx(ADDR);
        context.amount = Some(0);
        assert!(matches!(
            pipeline.admit(&Caller::Master, &context).await.unwrap_err(),
            FaucetError::InvalidAmount(_)
        ));
        context.amount = Some(2_000_000_000);
        assert!(matches!(
            pipeline.admit(&Caller::Master, &context).await.unwrap_err(),
            FaucetError::InvalidAmount(_)
        ));
    }

    #[tokio::test]
    async fn wallet_dimension_denies_second_request() {
        let pipeline = test_pipeline().await;
        let snapshot = pipeline.settings.snapshot().await;

        pipeline
            .enforce_rate_limits(&Caller::Master, ADDR, "10.0.0.1", &snapshot)
            .await
            .unwrap();
        let err = pipeline
            .enforce_rate_limits(&Caller::Master, ADDR, "10.0.0.1", &snapshot)
            .await
            .unwrap_err();
        match err {
            FaucetError::RateLimitExceeded { retry_after, detail } => {
                assert_eq!(detail, "wallet");
                assert!(retry_after > 0 && retry_after <= 3600);
            }
            other => panic!("expected rate limit denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cooldown_denies_even_with_fresh_window() {
        let pipeline = test_pipeline().await;
        let snapshot = pipeline.settings.snapshot().await;
        let now_ms = Utc::now().timestamp_millis() as u64;
        pipeline.cache.track_last_request(ADDR, now_ms, 3_600_000).await;

        let err = pipeline
            .enforce_rate_limits(&Caller::Master, ADDR, "10.0.0.1", &snapshot)
            .await
            .unwrap_err();
        match err {
            FaucetError::RateLimitExceeded { detail, retry_after } => {
                assert_eq!(detail, "cooldown");
                assert!(retry_after <= 3600);
            }
            other => panic!("expected cooldown denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ip_dimension_counts_across_wallets() {
        let pipeline = test_pipeline().await;
        let snapshot = pipeline.settings.snapshot().await;

        for i in 0..10u32 {
            let address = format!("0x{:064x}", i + 1);
            pipeline
                .enforce_rate_limits(&Caller::Master, &address, "10.9.9.9", &snapshot)
                .await
                .unwrap();
        }
        let err = pipeline
            .enforce_rate_limits(&Caller::Master, &format!("0x{:064x}", 99), "10.9.9.9", &snapshot)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FaucetError::RateLimitExceeded { ref detail, .. } if detail == "ip"
        ));
    }

    #[tokio::test]
    async fn client_override_replaces_wallet_and_ip_limits() {
        let pipeline = test_pipeline().await;
        let snapshot = pipeline.settings.snapshot().await;
        let client = api_clients::Model {
            id: 1,
            client_id: "suifx_client".into(),
            api_key: "suifx_key".into(),
            client_secret: "secret".into(),
            name: "partner".into(),
            description: None,
            homepage_url: None,
            callback_url: None,
            is_active: true,
            rate_limit_override: Some(3),
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
        };
        let caller = Caller::Client(client);

        // default wallet limit is 1, but the override of 3 governs
        for _ in 0..3 {
            pipeline
                .enforce_rate_limits(&caller, ADDR, "10.0.0.2", &snapshot)
                .await
                .unwrap();
        }
        let err = pipeline
            .enforce_rate_limits(&caller, ADDR, "10.0.0.2", &snapshot)
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::RateLimitExceeded { .. }));
    }
}
