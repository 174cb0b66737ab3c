//! # Application State
//!
//! Shared state for the Axum application: the reconciliation engine
//! with its injected stores, plus server configuration.

use pay_core::{BoxedOrderStore, BoxedPaymentStore, InMemoryOrderStore, InMemoryPaymentStore};
use pay_gateway::{GatewayConfig, ReconciliationEngine};
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for the return and webhook callbacks
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Browser-return URL the gateway redirects back to
    pub fn response_url(&self) -> String {
        format!("{}/checkout/return", self.base_url)
    }

    /// Server-to-server webhook URL
    pub fn callback_url(&self) -> String {
        format!("{}/webhook/gateway", self.base_url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Reconciliation engine (validation + ledger + order effects)
    pub engine: Arc<ReconciliationEngine>,
    /// Order store handle (checkout creation writes here)
    pub orders: Arc<InMemoryOrderStore>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create an AppState from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let gateway = GatewayConfig::load()
            .map_err(|e| anyhow::anyhow!("Failed to load gateway config: {}", e))?;
        Ok(Self::with_gateway(config, gateway))
    }

    /// Wire the state with explicit configs (tests, embedding)
    pub fn with_gateway(config: AppConfig, gateway: GatewayConfig) -> Self {
        let orders = Arc::new(InMemoryOrderStore::new());
        let payments = Arc::new(InMemoryPaymentStore::new());
        let engine = Arc::new(ReconciliationEngine::new(
            gateway,
            orders.clone() as BoxedOrderStore,
            payments as BoxedPaymentStore,
        ));

        Self {
            engine,
            orders,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        // Clear env vars for test
        std::env::remove_var("HOST");
        std::env::remove_var("PORT");
        std::env::remove_var("BASE_URL");

        let config = AppConfig::from_env();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_callback_urls() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "https://shop.example".to_string(),
            environment: "test".to_string(),
        };

        assert_eq!(config.response_url(), "https://shop.example/checkout/return");
        assert_eq!(config.callback_url(), "https://shop.example/webhook/gateway");
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
    }
}
