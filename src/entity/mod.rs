// Database entity definitions

pub mod admin_activities;
pub mod admin_users;
pub mod api_client_usage;
pub mod api_clients;
pub mod faucet_metrics;
pub mod prelude;
pub mod rate_limit_settings;
pub mod transactions;
