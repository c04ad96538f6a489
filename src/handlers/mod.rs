// API endpoint handlers implementation

mod admin;
mod clients;
mod faucet;
mod health;
mod status;

use std::sync::Arc;
use std::time::Instant;

use crate::cache::CacheService;
use crate::chain::FaucetDispatcher;
use crate::config::FaucetConfig;
use crate::db::Storage;
use crate::services::admission::AdmissionPipeline;
use crate::services::clients::ClientRegistry;
use crate::services::session::SessionService;
use crate::services::settings::SettingsService;

// Handler function re-exports
pub use admin::{
    admin_activities, admin_bulk_settings, admin_cache_flush, admin_config, admin_dashboard,
    admin_deactivate_client, admin_list_clients, admin_list_settings, admin_login, admin_logout,
    admin_regenerate_client, admin_test_transaction, admin_transactions, admin_update_setting,
};
pub use clients::{get_client, register_client};
pub use faucet::{faucet_mode, faucet_status, request_tokens};
pub use health::{health_check, health_live, health_ready};
pub use status::{keepalive, status_page};

/// Application state shared across handlers; every dependency is explicit
#[derive(Clone)]
pub struct AppState {
    pub config: FaucetConfig,
    pub cache: Arc<CacheService>,
    pub storage: Storage,
    pub settings: Arc<SettingsService>,
    pub dispatcher: Arc<FaucetDispatcher>,
    pub sessions: Arc<SessionService>,
    pub registry: Arc<ClientRegistry>,
    pub admission: Arc<AdmissionPipeline>,
    pub started_at: Instant,
}

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
