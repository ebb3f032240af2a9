//! Configuration for the backend client.

use std::env;

/// Configuration for connecting to the shopping-agent backend.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the backend HTTP server (e.g., "http://localhost:8000").
    pub base_url: String,
}

impl AgentConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `CARTWHEEL_API_URL` - backend base URL (default: http://localhost:8000)
    pub fn from_env() -> Self {
        let base_url =
            env::var("CARTWHEEL_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(base_url)
    }

    pub fn search_url(&self) -> String {
        format!("{}/api/search", self.base_url)
    }

    pub fn purchase_url(&self) -> String {
        format!("{}/api/purchase", self.base_url)
    }

    pub fn shipping_url(&self) -> String {
        format!("{}/api/purchases/shipping", self.base_url)
    }

    pub fn tracking_status_url(&self) -> String {
        format!("{}/api/tracking/status", self.base_url)
    }

    pub fn heartbeat_url(&self) -> String {
        format!("{}/api/tracking/heartbeat", self.base_url)
    }

    pub fn purchase_alerts_url(&self) -> String {
        format!("{}/api/tracking/purchase-alerts", self.base_url)
    }

    pub fn dismiss_alert_url(&self, product_id: &str) -> String {
        format!(
            "{}/api/tracking/purchase-alerts/{}",
            self.base_url,
            urlencoding::encode(product_id)
        )
    }

    pub fn checkout_url(&self) -> String {
        format!("{}/api/auto-checkout", self.base_url)
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/api/auto-checkout/cancel", self.base_url)
    }

    pub fn spending_url(&self) -> String {
        format!("{}/api/spending", self.base_url)
    }

    pub fn coupons_url(&self, product_id: &str) -> String {
        format!(
            "{}/api/coupons/{}",
            self.base_url,
            urlencoding::encode(product_id)
        )
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}
