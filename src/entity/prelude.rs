pub use super::admin_activities::Entity as AdminActivities;
pub use super::admin_users::Entity as AdminUsers;
pub use super::api_client_usage::Entity as ApiClientUsage;
pub use super::api_clients::Entity as ApiClients;
pub use super::faucet_metrics::Entity as FaucetMetrics;
pub use super::rate_limit_settings::Entity as RateLimitSettings;
pub use super::transactions::Entity as Transactions;
