// Configuration Module
// Loads typed settings from environment variables and validates them at startup

use dotenv::dotenv;
use std::env;

/// Target Sui network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Testnet,
    Devnet,
    Mainnet,
}

impl Network {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "testnet" => Some(Network::Testnet),
            "devnet" => Some(Network::Devnet),
            "mainnet" => Some(Network::Mainnet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Mainnet => "mainnet",
        }
    }

    /// Default fullnode JSON-RPC endpoint for this network
    pub fn default_rpc_url(&self) -> String {
        format!("https://fullnode.{}.sui.io:443", self.as_str())
    }

    /// Public faucet endpoint used in sdk dispatch mode
    pub fn faucet_url(&self) -> String {
        format!("https://faucet.{}.sui.io/v2/gas", self.as_str())
    }
}

/// Configuration error listing every missing or invalid key
#[derive(Debug)]
pub struct ConfigError {
    pub problems: Vec<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "invalid configuration:")?;
        for problem in &self.problems {
            writeln!(f, "  - {}", problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// Immutable configuration for the faucet service
#[derive(Debug, Clone)]
pub struct FaucetConfig {
    // Server configuration
    pub host: String,
    pub http_port: u16,
    pub cors_origin: Option<String>,
    pub environment: String,

    // Auth
    pub api_key: String,
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,

    // Chain
    pub network: Network,
    pub rpc_url: String,
    pub private_key: Option<String>,
    pub default_amount: u64,
    pub max_amount: u64,
    pub min_wallet_balance: u64,

    // Stores
    pub cache_url: Option<String>,
    pub cache_prefix: String,
    pub db_url: Option<String>,

    // Rate limiting
    pub rate_window_ms: u64,
    pub max_per_wallet: u32,
    pub max_per_ip: u32,
    pub max_per_global: u32,

    // Logging
    pub log_level: String,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    default: T,
    problems: &mut Vec<String>,
) -> T {
    match optional(key) {
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                problems.push(format!("{} is not a valid value: {:?}", key, raw));
                default
            }
        },
        None => default,
    }
}

impl FaucetConfig {
    /// Load configuration from environment variables, failing fast with a
    /// human-readable list of every missing or invalid key
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let mut problems = Vec::new();

        let environment =
            optional("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let development = environment == "development";

        let host = optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let http_port = parse_or("HTTP_PORT", 3000u16, &mut problems);

        let api_key = match optional("API_KEY") {
            Some(key) => key,
            None => {
                problems.push("API_KEY is required".to_string());
                String::new()
            }
        };

        let jwt_secret = match optional("JWT_SECRET") {
            Some(secret) => {
                if secret.len() < 32 {
                    problems.push("JWT_SECRET must be at least 32 bytes".to_string());
                }
                secret
            }
            None if development => {
                tracing::warn!("JWT_SECRET not set, using development secret");
                "suifx-development-secret-do-not-use-in-prod".to_string()
            }
            None => {
                problems.push("JWT_SECRET is required outside development".to_string());
                String::new()
            }
        };

        let admin_username = optional("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string());
        let admin_password = match optional("ADMIN_PASSWORD") {
            Some(password) => password,
            None if development => "admin".to_string(),
            None => {
                problems.push("ADMIN_PASSWORD is required outside development".to_string());
                String::new()
            }
        };

        let network_raw = optional("NETWORK").unwrap_or_else(|| "testnet".to_string());
        let network = match Network::parse(&network_raw) {
            Some(network) => network,
            None => {
                problems.push(format!(
                    "NETWORK must be one of testnet|devnet|mainnet, got {:?}",
                    network_raw
                ));
                Network::Testnet
            }
        };

        let rpc_url = optional("RPC_URL").unwrap_or_else(|| network.default_rpc_url());
        let private_key = optional("PRIVATE_KEY");

        let default_amount = parse_or("DEFAULT_AMOUNT", 100_000_000u64, &mut problems);
        let max_amount = parse_or("MAX_AMOUNT", 1_000_000_000u64, &mut problems);
        if max_amount < default_amount {
            problems.push(format!(
                "MAX_AMOUNT ({}) must be >= DEFAULT_AMOUNT ({})",
                max_amount, default_amount
            ));
        }
        let min_wallet_balance = parse_or("MIN_WALLET_BALANCE", 1_000_000_000u64, &mut problems);

        let cache_url = optional("CACHE_URL");
        let cache_prefix = optional("CACHE_PREFIX").unwrap_or_else(|| "suifx:".to_string());
        let db_url = optional("DB_URL");

        let rate_window_ms = parse_or("RATE_WINDOW_MS", 3_600_000u64, &mut problems);
        let max_per_wallet = parse_or("MAX_PER_WALLET", 1u32, &mut problems);
        let max_per_ip = parse_or("MAX_PER_IP", 10u32, &mut problems);
        let max_per_global = parse_or("MAX_PER_GLOBAL", 10_000u32, &mut problems);

        let log_level = optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let cors_origin = optional("CORS_ORIGIN");

        if !problems.is_empty() {
            return Err(ConfigError { problems });
        }

        Ok(FaucetConfig {
            host,
            http_port,
            cors_origin,
            environment,
            api_key,
            jwt_secret,
            admin_username,
            admin_password,
            network,
            rpc_url,
            private_key,
            default_amount,
            max_amount,
            min_wallet_balance,
            cache_url,
            cache_prefix,
            db_url,
            rate_window_ms,
            max_per_wallet,
            max_per_ip,
            max_per_global,
            log_level,
        })
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Compose the block-explorer URL for a transaction digest
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("https://suiscan.xyz/{}/tx/{}", self.network.as_str(), tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parses_known_names() {
        assert_eq!(Network::parse("testnet"), Some(Network::Testnet));
        assert_eq!(Network::parse("devnet"), Some(Network::Devnet));
        assert_eq!(Network::parse("mainnet"), Some(Network::Mainnet));
        assert_eq!(Network::parse("localnet"), None);
    }

    #[test]
    fn network_urls() {
        assert_eq!(
            Network::Testnet.default_rpc_url(),
            "https://fullnode.testnet.sui.io:443"
        );
        assert_eq!(
            Network::Devnet.faucet_url(),
            "https://faucet.devnet.sui.io/v2/gas"
        );
    }

    #[test]
    fn config_error_lists_all_problems() {
        let err = ConfigError {
            problems: vec!["A is required".to_string(), "B is invalid".to_string()],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("A is required"));
        assert!(rendered.contains("B is invalid"));
    }
}
