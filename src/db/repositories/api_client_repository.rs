// API client registry database operations

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::error::DbError;
use crate::entity::{api_client_usage, api_clients};

/// Credential material and metadata for a freshly registered client
#[derive(Debug, Clone)]
pub struct NewApiClient {
    pub client_id: String,
    pub api_key: String,
    pub client_secret: String,
    pub name: String,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub callback_url: Option<String>,
}

/// Repository for API client operations
#[derive(Clone)]
pub struct ApiClientRepository {
    conn: DatabaseConnection,
}

impl ApiClientRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        ApiClientRepository { conn }
    }

    pub async fn create(&self, client: NewApiClient) -> Result<api_clients::Model, DbError> {
        let row = api_clients::ActiveModel {
            client_id: Set(client.client_id),
            api_key: Set(client.api_key),
            client_secret: Set(client.client_secret),
            name: Set(client.name),
            description: Set(client.description),
            homepage_url: Set(client.homepage_url),
            callback_url: Set(client.callback_url),
            is_active: Set(true),
            rate_limit_override: Set(None),
            usage_count: Set(0),
            last_used_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(&self.conn).await.map_err(Into::into)
    }

    pub async fn find_by_api_key(
        &self,
        api_key: &str,
    ) -> Result<Option<api_clients::Model>, DbError> {
        api_clients::Entity::find()
            .filter(api_clients::Column::ApiKey.eq(api_key))
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<api_clients::Model>, DbError> {
        api_clients::Entity::find()
            .filter(api_clients::Column::ClientId.eq(client_id))
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<api_clients::Model>, u64), DbError> {
        let total = api_clients::Entity::find().count(&self.conn).await?;
        let rows = api_clients::Entity::find()
            .order_by_desc(api_clients::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.conn)
            .await?;
        Ok((rows, total))
    }

    /// Returns false when no such client exists
    pub async fn deactivate(&self, client_id: &str) -> Result<bool, DbError> {
        let result = api_clients::Entity::update_many()
            .col_expr(api_clients::Column::IsActive, Expr::value(false))
            .filter(api_clients::Column::ClientId.eq(client_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Replace the api key, invalidating the previous one
    pub async fn set_api_key(
        &self,
        client_id: &str,
        new_key: &str,
    ) -> Result<Option<api_clients::Model>, DbError> {
        let result = api_clients::Entity::update_many()
            .col_expr(api_clients::Column::ApiKey, Expr::value(new_key))
            .filter(api_clients::Column::ClientId.eq(client_id))
            .exec(&self.conn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_client_id(client_id).await
    }

    /// Append one usage row and bump the client's counters
    pub async fn record_usage(
        &self,
        client_id: &str,
        endpoint: &str,
        method: &str,
        response_status: i32,
        response_time_ms: i64,
    ) -> Result<(), DbError> {
        let row = api_client_usage::ActiveModel {
            client_id: Set(client_id.to_string()),
            endpoint: Set(endpoint.to_string()),
            method: Set(method.to_string()),
            response_status: Set(response_status),
            response_time_ms: Set(response_time_ms),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(&self.conn).await?;

        api_clients::Entity::update_many()
            .col_expr(
                api_clients::Column::UsageCount,
                Expr::col(api_clients::Column::UsageCount).add(1),
            )
            .col_expr(api_clients::Column::LastUsedAt, Expr::value(Some(Utc::now())))
            .filter(api_clients::Column::ClientId.eq(client_id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
