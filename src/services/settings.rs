// Dynamic rate-limit settings
// Bootstrap-seeded, admin-mutated, and read on every admission decision
// through a short-lived snapshot cache so changes take effect within a
// second without hitting the database per request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::config::FaucetConfig;
use crate::db::Storage;
use crate::entity::rate_limit_settings;

const SNAPSHOT_TTL: Duration = Duration::from_secs(1);

/// Value type of a recognized setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Number,
    Boolean,
    Text,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Number => "number",
            SettingType::Boolean => "boolean",
            SettingType::Text => "string",
        }
    }
}

/// A recognized setting with its default
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub name: &'static str,
    pub value_type: SettingType,
    pub default: &'static str,
}

/// Every setting the admission pipeline understands; unknown names are
/// rejected at write time
pub const RECOGNIZED_SETTINGS: &[SettingDef] = &[
    SettingDef { name: "rate_limit_enabled", value_type: SettingType::Boolean, default: "true" },
    SettingDef { name: "rate_limit_window_ms", value_type: SettingType::Number, default: "3600000" },
    SettingDef { name: "faucet_max_per_wallet", value_type: SettingType::Number, default: "1" },
    SettingDef { name: "faucet_max_per_ip", value_type: SettingType::Number, default: "10" },
    SettingDef { name: "faucet_cooldown_seconds", value_type: SettingType::Number, default: "3600" },
    SettingDef { name: "api_max_requests_per_window", value_type: SettingType::Number, default: "1000" },
    SettingDef { name: "api_burst_limit", value_type: SettingType::Number, default: "20" },
    SettingDef { name: "wallet_daily_limit", value_type: SettingType::Number, default: "5" },
    SettingDef { name: "wallet_weekly_limit", value_type: SettingType::Number, default: "10" },
    SettingDef { name: "emergency_mode", value_type: SettingType::Boolean, default: "false" },
    SettingDef { name: "emergency_max_per_ip", value_type: SettingType::Number, default: "1" },
    SettingDef { name: "emergency_cooldown", value_type: SettingType::Number, default: "7200" },
    SettingDef { name: "faucet_mode", value_type: SettingType::Text, default: "wallet" },
];

pub fn find_setting(name: &str) -> Option<&'static SettingDef> {
    RECOGNIZED_SETTINGS.iter().find(|def| def.name == name)
}

/// (name, default, type) tuples for the persistence seed
pub fn setting_defaults() -> Vec<(&'static str, &'static str, &'static str)> {
    RECOGNIZED_SETTINGS
        .iter()
        .map(|def| (def.name, def.default, def.value_type.as_str()))
        .collect()
}

/// Validate a proposed value against the setting's type; returns the
/// canonical string stored in the database
pub fn validate_value(
    def: &SettingDef,
    value: &serde_json::Value,
) -> Result<String, String> {
    match def.value_type {
        SettingType::Number => {
            let number = match value {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.parse::<i64>().ok(),
                _ => None,
            };
            match number {
                Some(n) if n >= 0 => Ok(n.to_string()),
                _ => Err(format!("{} must be a non-negative integer", def.name)),
            }
        }
        SettingType::Boolean => {
            let flag = match value {
                serde_json::Value::Bool(b) => Some(*b),
                serde_json::Value::String(s) => match s.as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                },
                _ => None,
            };
            match flag {
                Some(flag) => Ok(flag.to_string()),
                None => Err(format!("{} must be a boolean", def.name)),
            }
        }
        SettingType::Text => match value {
            serde_json::Value::String(s) if !s.is_empty() => {
                if def.name == "faucet_mode" && s != "wallet" && s != "sdk" {
                    return Err("faucet_mode must be \"wallet\" or \"sdk\"".to_string());
                }
                Ok(s.clone())
            }
            _ => Err(format!("{} must be a non-empty string", def.name)),
        },
    }
}

/// Effective rate-limit values the admission pipeline reads
#[derive(Debug, Clone)]
pub struct RateLimitSnapshot {
    pub enabled: bool,
    pub window_ms: u64,
    pub max_per_wallet: u32,
    pub max_per_ip: u32,
    pub cooldown_seconds: u64,
    pub api_max_requests_per_window: u32,
    pub api_burst_limit: u32,
    pub wallet_daily_limit: u32,
    pub wallet_weekly_limit: u32,
    pub emergency_mode: bool,
    pub emergency_max_per_ip: u32,
    pub emergency_cooldown: u64,
    pub faucet_mode: Option<String>,
}

impl RateLimitSnapshot {
    /// Start from environment configuration plus table defaults; database
    /// rows override these when present
    fn base(config: &FaucetConfig) -> Self {
        RateLimitSnapshot {
            enabled: true,
            window_ms: config.rate_window_ms,
            max_per_wallet: config.max_per_wallet,
            max_per_ip: config.max_per_ip,
            cooldown_seconds: 3_600,
            api_max_requests_per_window: 1_000,
            api_burst_limit: 20,
            wallet_daily_limit: 5,
            wallet_weekly_limit: 10,
            emergency_mode: false,
            emergency_max_per_ip: 1,
            emergency_cooldown: 7_200,
            faucet_mode: None,
        }
    }

    fn apply(&mut self, row: &rate_limit_settings::Model) {
        if !row.is_active {
            return;
        }
        let value = row.setting_value.as_str();
        match row.setting_name.as_str() {
            "rate_limit_enabled" => self.enabled = value == "true",
            "rate_limit_window_ms" => apply_number(&mut self.window_ms, value),
            "faucet_max_per_wallet" => apply_number(&mut self.max_per_wallet, value),
            "faucet_max_per_ip" => apply_number(&mut self.max_per_ip, value),
            "faucet_cooldown_seconds" => apply_number(&mut self.cooldown_seconds, value),
            "api_max_requests_per_window" => {
                apply_number(&mut self.api_max_requests_per_window, value)
            }
            "api_burst_limit" => apply_number(&mut self.api_burst_limit, value),
            "wallet_daily_limit" => apply_number(&mut self.wallet_daily_limit, value),
            "wallet_weekly_limit" => apply_number(&mut self.wallet_weekly_limit, value),
            "emergency_mode" => self.emergency_mode = value == "true",
            "emergency_max_per_ip" => apply_number(&mut self.emergency_max_per_ip, value),
            "emergency_cooldown" => apply_number(&mut self.emergency_cooldown, value),
            "faucet_mode" => self.faucet_mode = Some(value.to_string()),
            _ => {}
        }
    }

    /// IP cap with the emergency value swapped in when active
    pub fn effective_max_per_ip(&self) -> u32 {
        if self.emergency_mode {
            self.emergency_max_per_ip
        } else {
            self.max_per_ip
        }
    }

    /// Cooldown with the emergency value swapped in when active
    pub fn effective_cooldown_seconds(&self) -> u64 {
        if self.emergency_mode {
            self.emergency_cooldown
        } else {
            self.cooldown_seconds
        }
    }
}

fn apply_number<T: TryFrom<i64>>(slot: &mut T, value: &str) {
    if let Ok(parsed) = value.parse::<i64>() {
        if let Ok(converted) = T::try_from(parsed) {
            *slot = converted;
        }
    }
}

/// Settings service with a 1s read-through snapshot cache
pub struct SettingsService {
    config: FaucetConfig,
    storage: Storage,
    cached: RwLock<Option<(Instant, Arc<RateLimitSnapshot>)>>,
}

impl SettingsService {
    pub fn new(config: FaucetConfig, storage: Storage) -> Self {
        SettingsService { config, storage, cached: RwLock::new(None) }
    }

    /// Current effective snapshot; at most one second stale
    pub async fn snapshot(&self) -> Arc<RateLimitSnapshot> {
        {
            let cached = self.cached.read().await;
            if let Some((at, snapshot)) = cached.as_ref() {
                if at.elapsed() < SNAPSHOT_TTL {
                    return snapshot.clone();
                }
            }
        }

        let snapshot = Arc::new(self.load().await);
        *self.cached.write().await = Some((Instant::now(), snapshot.clone()));
        snapshot
    }

    async fn load(&self) -> RateLimitSnapshot {
        let mut snapshot = RateLimitSnapshot::base(&self.config);
        match self.storage.list_settings().await {
            Ok(rows) => {
                for row in &rows {
                    snapshot.apply(row);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to load rate-limit settings, using defaults: {}", e);
            }
        }
        snapshot
    }

    /// Drop the cached snapshot so the next read sees fresh values
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    pub async fn list(&self) -> Result<Vec<rate_limit_settings::Model>, crate::db::DbError> {
        self.storage.list_settings().await
    }

    /// Validate and persist one setting; Err carries the per-setting
    /// message used by the bulk endpoint's partial-success response
    pub async fn update(
        &self,
        name: &str,
        value: &serde_json::Value,
        actor: &str,
    ) -> Result<rate_limit_settings::Model, String> {
        let def = find_setting(name).ok_or_else(|| "Setting not found".to_string())?;
        let canonical = validate_value(def, value)?;

        // Degraded persistence accepts the write as a no-op
        if self.storage.is_degraded() {
            return Ok(rate_limit_settings::Model {
                id: 0,
                setting_name: def.name.to_string(),
                setting_value: canonical,
                value_type: def.value_type.as_str().to_string(),
                is_active: true,
                updated_by: Some(actor.to_string()),
                updated_at: chrono::Utc::now(),
            });
        }

        let updated = self
            .storage
            .update_setting(name, &canonical, actor)
            .await
            .map_err(|e| format!("Failed to persist setting: {}", e))?
            .ok_or_else(|| "Setting not found".to_string())?;
        self.invalidate().await;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str) -> &'static SettingDef {
        find_setting(name).unwrap()
    }

    #[test]
    fn recognized_table_matches_defaults() {
        assert_eq!(RECOGNIZED_SETTINGS.len(), 13);
        assert_eq!(def("faucet_max_per_wallet").default, "1");
        assert_eq!(def("emergency_cooldown").default, "7200");
        assert!(find_setting("nonexistent").is_none());
    }

    #[test]
    fn number_values_accept_int_and_string() {
        assert_eq!(validate_value(def("faucet_max_per_ip"), &json!(5)).unwrap(), "5");
        assert_eq!(validate_value(def("faucet_max_per_ip"), &json!("7")).unwrap(), "7");
        assert!(validate_value(def("faucet_max_per_ip"), &json!(-1)).is_err());
        assert!(validate_value(def("faucet_max_per_ip"), &json!(true)).is_err());
    }

    #[test]
    fn boolean_values_accept_bool_and_string() {
        assert_eq!(validate_value(def("emergency_mode"), &json!(true)).unwrap(), "true");
        assert_eq!(
            validate_value(def("emergency_mode"), &json!("false")).unwrap(),
            "false"
        );
        assert!(validate_value(def("emergency_mode"), &json!(1)).is_err());
    }

    #[test]
    fn faucet_mode_is_constrained() {
        assert_eq!(validate_value(def("faucet_mode"), &json!("sdk")).unwrap(), "sdk");
        assert!(validate_value(def("faucet_mode"), &json!("turbo")).is_err());
    }

    #[test]
    fn emergency_mode_swaps_ip_cap_and_cooldown() {
        let config = crate::config::FaucetConfig {
            host: "0.0.0.0".into(),
            http_port: 3000,
            cors_origin: None,
            environment: "development".into(),
            api_key: "k".into(),
            jwt_secret: "s".into(),
            admin_username: "admin".into(),
            admin_password: "admin".into(),
            network: crate::config::Network::Testnet,
            rpc_url: "http://localhost".into(),
            private_key: None,
            default_amount: 1,
            max_amount: 2,
            min_wallet_balance: 1,
            cache_url: None,
            cache_prefix: "suifx:".into(),
            db_url: None,
            rate_window_ms: 3_600_000,
            max_per_wallet: 1,
            max_per_ip: 10,
            max_per_global: 100,
            log_level: "info".into(),
        };
        let mut snapshot = RateLimitSnapshot::base(&config);
        assert_eq!(snapshot.effective_max_per_ip(), 10);
        assert_eq!(snapshot.effective_cooldown_seconds(), 3_600);

        snapshot.emergency_mode = true;
        assert_eq!(snapshot.effective_max_per_ip(), 1);
        assert_eq!(snapshot.effective_cooldown_seconds(), 7_200);
    }

    #[test]
    fn inactive_rows_do_not_override() {
        let config_row = rate_limit_settings::Model {
            id: 1,
            setting_name: "faucet_max_per_ip".into(),
            setting_value: "99".into(),
            value_type: "number".into(),
            is_active: false,
            updated_by: None,
            updated_at: chrono::Utc::now(),
        };
        let config = crate::config::FaucetConfig {
            host: "0.0.0.0".into(),
            http_port: 3000,
            cors_origin: None,
            environment: "development".into(),
            api_key: "k".into(),
            jwt_secret: "s".into(),
            admin_username: "admin".into(),
            admin_password: "admin".into(),
            network: crate::config::Network::Testnet,
            rpc_url: "http://localhost".into(),
            private_key: None,
            default_amount: 1,
            max_amount: 2,
            min_wallet_balance: 1,
            cache_url: None,
            cache_prefix: "suifx:".into(),
            db_url: None,
            rate_window_ms: 3_600_000,
            max_per_wallet: 1,
            max_per_ip: 10,
            max_per_global: 100,
            log_level: "info".into(),
        };
        let mut snapshot = RateLimitSnapshot::base(&config);
        snapshot.apply(&config_row);
        assert_eq!(snapshot.max_per_ip, 10);
    }
}
