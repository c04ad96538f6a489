// Database repository management

mod admin_repository;
mod api_client_repository;
mod metrics_repository;
mod settings_repository;
mod transaction_repository;

pub use admin_repository::AdminRepository;
pub use api_client_repository::{ApiClientRepository, NewApiClient};
pub use metrics_repository::{MetricsDelta, MetricsRepository};
pub use settings_repository::SettingsRepository;
pub use transaction_repository::{NewTransaction, TransactionRepository, TransactionStats};

use sea_orm::DatabaseConnection;

/// Container for all database repositories
#[derive(Clone)]
pub struct Repositories {
    pub transactions: TransactionRepository,
    pub metrics: MetricsRepository,
    pub clients: ApiClientRepository,
    pub admins: AdminRepository,
    pub settings: SettingsRepository,
}

impl Repositories {
    /// Creates a new repositories container with database connection
    pub fn new(conn: DatabaseConnection) -> Self {
        Repositories {
            transactions: TransactionRepository::new(conn.clone()),
            metrics: MetricsRepository::new(conn.clone()),
            clients: ApiClientRepository::new(conn.clone()),
            admins: AdminRepository::new(conn.clone()),
            settings: SettingsRepository::new(conn),
        }
    }
}
