// Daily metrics database operations
// The upsert is a single database-level ON CONFLICT statement so concurrent
// writers cannot double-count.

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::error::DbError;
use crate::entity::faucet_metrics;

/// Additive changes applied to one date's row
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsDelta {
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub amount: i64,
    pub rate_limit_errors: i64,
    pub network_errors: i64,
}

impl MetricsDelta {
    pub fn success(amount: u64) -> Self {
        MetricsDelta {
            total: 1,
            successful: 1,
            amount: amount as i64,
            ..Default::default()
        }
    }

    pub fn failure() -> Self {
        MetricsDelta { total: 1, failed: 1, ..Default::default() }
    }

    pub fn upstream_rate_limited() -> Self {
        MetricsDelta { total: 1, failed: 1, rate_limit_errors: 1, ..Default::default() }
    }

    pub fn network_error() -> Self {
        MetricsDelta { total: 1, failed: 1, network_errors: 1, ..Default::default() }
    }
}

/// Repository for daily metrics operations
#[derive(Clone)]
pub struct MetricsRepository {
    conn: DatabaseConnection,
}

impl MetricsRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        MetricsRepository { conn }
    }

    /// Atomically add the delta to the given date's row, inserting it on
    /// first touch
    pub async fn upsert(&self, date: NaiveDate, delta: MetricsDelta) -> Result<(), DbError> {
        let now = Utc::now();
        let row = faucet_metrics::ActiveModel {
            date: Set(date),
            total_requests: Set(delta.total),
            successful_requests: Set(delta.successful),
            failed_requests: Set(delta.failed),
            total_amount_distributed: Set(delta.amount),
            rate_limit_errors: Set(delta.rate_limit_errors),
            network_errors: Set(delta.network_errors),
            updated_at: Set(now),
            ..Default::default()
        };

        faucet_metrics::Entity::insert(row)
            .on_conflict(
                OnConflict::column(faucet_metrics::Column::Date)
                    .values([
                        (
                            faucet_metrics::Column::TotalRequests,
                            Expr::col(faucet_metrics::Column::TotalRequests).add(delta.total),
                        ),
                        (
                            faucet_metrics::Column::SuccessfulRequests,
                            Expr::col(faucet_metrics::Column::SuccessfulRequests)
                                .add(delta.successful),
                        ),
                        (
                            faucet_metrics::Column::FailedRequests,
                            Expr::col(faucet_metrics::Column::FailedRequests).add(delta.failed),
                        ),
                        (
                            faucet_metrics::Column::TotalAmountDistributed,
                            Expr::col(faucet_metrics::Column::TotalAmountDistributed)
                                .add(delta.amount),
                        ),
                        (
                            faucet_metrics::Column::RateLimitErrors,
                            Expr::col(faucet_metrics::Column::RateLimitErrors)
                                .add(delta.rate_limit_errors),
                        ),
                        (
                            faucet_metrics::Column::NetworkErrors,
                            Expr::col(faucet_metrics::Column::NetworkErrors)
                                .add(delta.network_errors),
                        ),
                        (faucet_metrics::Column::UpdatedAt, Expr::value(now)),
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Rows for the last n days, oldest first
    pub async fn list_recent(&self, days: u32) -> Result<Vec<faucet_metrics::Model>, DbError> {
        let since = Utc::now().date_naive() - chrono::Days::new(days.saturating_sub(1) as u64);
        faucet_metrics::Entity::find()
            .filter(faucet_metrics::Column::Date.gte(since))
            .order_by_asc(faucet_metrics::Column::Date)
            .all(&self.conn)
            .await
            .map_err(Into::into)
    }

    pub async fn get_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<faucet_metrics::Model>, DbError> {
        faucet_metrics::Entity::find()
            .filter(faucet_metrics::Column::Date.eq(date))
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    /// Total base units ever dispensed; one row per day keeps this cheap
    pub async fn total_distributed(&self) -> Result<i64, DbError> {
        let rows = faucet_metrics::Entity::find().all(&self.conn).await?;
        Ok(rows.iter().map(|r| r.total_amount_distributed).sum())
    }
}
