// Admin user and audit-log database operations

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::error::DbError;
use crate::entity::{admin_activities, admin_users};

/// Repository for admin accounts and their activity journal
#[derive(Clone)]
pub struct AdminRepository {
    conn: DatabaseConnection,
}

impl AdminRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        AdminRepository { conn }
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<admin_users::Model>, DbError> {
        admin_users::Entity::find()
            .filter(admin_users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    /// Seed the bootstrap super admin if the account does not exist yet
    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), DbError> {
        if self.find_by_username(username).await?.is_some() {
            return Ok(());
        }
        let row = admin_users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set("super_admin".to_string()),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(&self.conn).await?;
        tracing::info!(username, "Bootstrap super admin created");
        Ok(())
    }

    /// Verify credentials against the stored bcrypt hash; updates last_login
    /// on success. The hash comparison runs off the async executor.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<admin_users::Model>, DbError> {
        let Some(user) = self.find_by_username(username).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let hash = user.password_hash.clone();
        let candidate = password.to_string();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash))
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?
            .unwrap_or(false);
        if !valid {
            return Ok(None);
        }

        let mut active: admin_users::ActiveModel = user.into();
        active.last_login = Set(Some(Utc::now()));
        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    /// Append one audit row; the log is append-only
    pub async fn save_activity(
        &self,
        admin_username: &str,
        action: &str,
        details: Option<String>,
        client_ip: &str,
    ) -> Result<(), DbError> {
        let row = admin_activities::ActiveModel {
            admin_username: Set(admin_username.to_string()),
            action: Set(action.to_string()),
            details: Set(details),
            client_ip: Set(client_ip.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(&self.conn).await?;
        Ok(())
    }

    pub async fn list_activities(
        &self,
        limit: u64,
    ) -> Result<Vec<admin_activities::Model>, DbError> {
        admin_activities::Entity::find()
            .order_by_desc(admin_activities::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .map_err(Into::into)
    }
}
