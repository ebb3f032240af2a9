//! HTTP client for the shopping-agent backend.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api_types::{
    AlertsResponse, CouponsResponse, HeartbeatResponse, ProfileSnapshot, PurchaseAlert,
    PurchaseRequest, PurchaseResponse, SearchRequest, SearchResponse, Shipment, ShipmentsResponse,
    SpendingOverview, TrackingStatus,
};
use crate::config::AgentConfig;
use crate::error::ClientError;
use shopper_core::{HistoryEntry, UserProfile};

/// Timeout for plain request/response calls. Streaming checkout
/// requests are issued without one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client for the backend gateway.
#[derive(Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    config: AgentConfig,
}

impl AgentClient {
    pub fn new(config: AgentConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The underlying HTTP client, for streaming callers that need
    /// requests without the default timeout.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.http.post(url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Run a product search with the caller's profile and recent history.
    pub async fn search(
        &self,
        query: &str,
        profile: &UserProfile,
        history: Vec<HistoryEntry>,
    ) -> Result<SearchResponse, ClientError> {
        debug!(query, history_len = history.len(), "sending search");
        let request = SearchRequest {
            query: query.to_string(),
            user_profile: ProfileSnapshot::from_profile(profile),
            conversation_history: history,
        };
        self.post_json(&self.config.search_url(), &request).await
    }

    /// Report a simulated purchase so the backend can track its price.
    pub async fn record_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> Result<PurchaseResponse, ClientError> {
        self.post_json(&self.config.purchase_url(), request).await
    }

    /// Current shipping status for every tracked purchase.
    pub async fn shipping_statuses(&self) -> Result<Vec<Shipment>, ClientError> {
        let response: ShipmentsResponse = self.get_json(&self.config.shipping_url()).await?;
        Ok(response.shipments)
    }

    pub async fn tracking_status(&self) -> Result<TrackingStatus, ClientError> {
        self.get_json(&self.config.tracking_status_url()).await
    }

    /// Price-drop alerts for past purchases.
    pub async fn purchase_alerts(&self) -> Result<Vec<PurchaseAlert>, ClientError> {
        let response: AlertsResponse = self.get_json(&self.config.purchase_alerts_url()).await?;
        Ok(response.alerts)
    }

    pub async fn dismiss_purchase_alert(&self, product_id: &str) -> Result<(), ClientError> {
        let url = self.config.dismiss_alert_url(product_id);
        let response = self.http.delete(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Signal user activity so backend tracking stays in its active cadence.
    pub async fn heartbeat(&self) -> Result<HeartbeatResponse, ClientError> {
        let response = self.http.post(&self.config.heartbeat_url()).send().await?;
        Self::read_json(response).await
    }

    pub async fn spending(&self) -> Result<SpendingOverview, ClientError> {
        self.get_json(&self.config.spending_url()).await
    }

    pub async fn coupons(&self, product_id: &str) -> Result<Vec<crate::Coupon>, ClientError> {
        let response: CouponsResponse =
            self.get_json(&self.config.coupons_url(product_id)).await?;
        Ok(response.coupons)
    }

    /// Spawn a background task that sends a heartbeat on a fixed interval.
    /// The first beat goes out immediately so liveness tracking sees the
    /// client as soon as it starts. Failures are logged and the loop
    /// keeps going.
    pub fn start_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();
        info!(interval_secs = interval.as_secs(), "starting heartbeat loop");
        tokio::spawn(async move {
            loop {
                if let Err(e) = client.heartbeat().await {
                    debug!("heartbeat failed: {}", e);
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Accept one connection and answer it with an empty JSON body.
    async fn one_shot_server() -> (std::net::SocketAddr, tokio::sync::oneshot::Receiver<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\n\r\n{}",
                )
                .await;
            let _ = tx.send(());
        });
        (addr, rx)
    }

    #[tokio::test]
    async fn test_heartbeat_loop_beats_immediately() {
        let (addr, request_seen) = one_shot_server().await;
        let client = AgentClient::new(AgentConfig::new(format!("http://{addr}"))).unwrap();

        // With a long interval, only an up-front beat can reach the
        // server within the timeout.
        let handle = client.start_heartbeat(Duration::from_secs(600));
        tokio::time::timeout(Duration::from_secs(2), request_seen)
            .await
            .expect("no heartbeat before the first interval elapsed")
            .unwrap();
        handle.abort();
    }
}
