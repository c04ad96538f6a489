// Dynamic rate-limit settings database operations

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::DbError;
use crate::entity::rate_limit_settings;

/// Repository for rate-limit settings
#[derive(Clone)]
pub struct SettingsRepository {
    conn: DatabaseConnection,
}

impl SettingsRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        SettingsRepository { conn }
    }

    pub async fn get(
        &self,
        name: &str,
    ) -> Result<Option<rate_limit_settings::Model>, DbError> {
        rate_limit_settings::Entity::find()
            .filter(rate_limit_settings::Column::SettingName.eq(name))
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    pub async fn all(&self) -> Result<Vec<rate_limit_settings::Model>, DbError> {
        rate_limit_settings::Entity::find()
            .all(&self.conn)
            .await
            .map_err(Into::into)
    }

    /// Update an existing setting's value; returns None when the setting row
    /// does not exist (unknown names are rejected upstream)
    pub async fn update_value(
        &self,
        name: &str,
        value: &str,
        actor: &str,
    ) -> Result<Option<rate_limit_settings::Model>, DbError> {
        let result = rate_limit_settings::Entity::update_many()
            .col_expr(rate_limit_settings::Column::SettingValue, Expr::value(value))
            .col_expr(
                rate_limit_settings::Column::UpdatedBy,
                Expr::value(Some(actor.to_string())),
            )
            .col_expr(rate_limit_settings::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(rate_limit_settings::Column::SettingName.eq(name))
            .exec(&self.conn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get(name).await
    }

    /// Insert any recognized setting that is missing, with its default value
    pub async fn seed(&self, defaults: &[(&str, &str, &str)]) -> Result<(), DbError> {
        for (name, value, value_type) in defaults {
            if self.get(name).await?.is_some() {
                continue;
            }
            let row = rate_limit_settings::ActiveModel {
                setting_name: Set(name.to_string()),
                setting_value: Set(value.to_string()),
                value_type: Set(value_type.to_string()),
                is_active: Set(true),
                updated_by: Set(None),
                updated_at: Set(Utc::now()),
                ..Default::default()
            };
            row.insert(&self.conn).await?;
        }
        Ok(())
    }
}
