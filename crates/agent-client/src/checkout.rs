//! Auto-checkout stream consumer.
//!
//! The backend streams checkout progress as server-sent events, one
//! JSON status per `data:` line. [`EventLineParser`] handles the
//! framing incrementally so events survive arbitrary chunk boundaries,
//! and [`CheckoutSession`] owns the live stream plus the accumulated
//! status log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::client::AgentClient;
use crate::error::ClientError;
use crate::CheckoutRequest;

/// Sentinel step the backend emits as its final event. It terminates
/// the session and is never surfaced as a status.
pub const STREAM_END_STEP: &str = "stream_end";

/// One progress event from the checkout stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutStatus {
    pub step: String,
    pub message: String,
    #[serde(default)]
    pub product_title: Option<String>,
}

/// Incremental parser for the event stream's line framing.
///
/// Bytes arrive in chunks that do not respect line boundaries; the
/// parser buffers the trailing partial line between calls so each
/// event is parsed exactly once.
#[derive(Debug, Default)]
pub struct EventLineParser {
    buf: String,
}

impl EventLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every complete event it finished.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<CheckoutStatus> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();
        while let Some(newline) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=newline).collect();
            if let Some(status) = Self::parse_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(status);
            }
        }
        events
    }

    /// Parse whatever remains in the buffer as a final unterminated line.
    pub fn drain(&mut self) -> Option<CheckoutStatus> {
        let line = std::mem::take(&mut self.buf);
        Self::parse_line(line.trim_end_matches('\r'))
    }

    fn parse_line(line: &str) -> Option<CheckoutStatus> {
        let payload = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
        match serde_json::from_str(payload.trim()) {
            Ok(status) => Some(status),
            Err(e) => {
                debug!("skipping malformed event line: {}", e);
                None
            }
        }
    }
}

/// A live auto-checkout run.
///
/// The stream is consumed by a background task; callers either await
/// statuses one at a time with [`next_status`](Self::next_status) or
/// poll the accumulated log.
pub struct CheckoutSession {
    statuses: Arc<RwLock<Vec<CheckoutStatus>>>,
    done: Arc<AtomicBool>,
    error: Arc<RwLock<Option<String>>>,
    rx: mpsc::UnboundedReceiver<CheckoutStatus>,
    http: reqwest::Client,
    cancel_url: String,
}

impl CheckoutSession {
    /// POST the checkout request and begin consuming its event stream.
    pub async fn start(
        client: &AgentClient,
        request: &CheckoutRequest,
    ) -> Result<Self, ClientError> {
        let response = client
            .http_client()
            .post(&client.config().checkout_url())
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!(product = %request.product_name, "checkout stream opened");

        let statuses = Arc::new(RwLock::new(Vec::new()));
        let done = Arc::new(AtomicBool::new(false));
        let error = Arc::new(RwLock::new(None));
        let (tx, rx) = mpsc::unbounded_channel();

        let session = Self {
            statuses: statuses.clone(),
            done: done.clone(),
            error: error.clone(),
            rx,
            http: client.http_client().clone(),
            cancel_url: client.config().checkout_cancel_url(),
        };

        tokio::spawn(async move {
            let mut parser = EventLineParser::new();
            let mut stream = response.bytes_stream();
            'read: loop {
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        for status in parser.feed(&chunk) {
                            if status.step == STREAM_END_STEP {
                                break 'read;
                            }
                            statuses.write().await.push(status.clone());
                            let _ = tx.send(status);
                        }
                    }
                    Some(Err(e)) => {
                        warn!("checkout stream failed: {}", e);
                        let status = CheckoutStatus {
                            step: "error".to_string(),
                            message: format!("Stream interrupted: {e}"),
                            product_title: None,
                        };
                        statuses.write().await.push(status.clone());
                        let _ = tx.send(status);
                        *error.write().await = Some(e.to_string());
                        break;
                    }
                    None => {
                        if let Some(status) = parser.drain() {
                            if status.step != STREAM_END_STEP {
                                statuses.write().await.push(status.clone());
                                let _ = tx.send(status);
                            }
                        }
                        break;
                    }
                }
            }
            done.store(true, Ordering::SeqCst);
        });

        Ok(session)
    }

    /// Await the next status. Returns `None` once the stream ends.
    pub async fn next_status(&mut self) -> Option<CheckoutStatus> {
        self.rx.recv().await
    }

    /// Every status received so far, oldest first.
    pub async fn statuses(&self) -> Vec<CheckoutStatus> {
        self.statuses.read().await.clone()
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        !self.is_done()
    }

    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    /// Ask the backend to abort the run. Best effort; the stream task
    /// notices the resulting close on its own.
    pub async fn cancel(&self) {
        if let Err(e) = self.http.post(&self.cancel_url).send().await {
            debug!("checkout cancel failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_line(step: &str, message: &str) -> String {
        format!("data: {{\"step\": \"{step}\", \"message\": \"{message}\"}}\n\n")
    }

    #[test]
    fn test_single_event() {
        let mut parser = EventLineParser::new();
        let events = parser.feed(status_line("searching", "Looking it up").as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, "searching");
        assert_eq!(events[0].message, "Looking it up");
    }

    #[test]
    fn test_event_split_across_chunks_parses_once() {
        let mut parser = EventLineParser::new();
        let line = status_line("filling_form", "Entering address");
        let (head, tail) = line.as_bytes().split_at(17);
        assert!(parser.feed(head).is_empty());
        let events = parser.feed(tail);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, "filling_form");
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = EventLineParser::new();
        let chunk = format!(
            "{}{}",
            status_line("searching", "one"),
            status_line("adding_to_cart", "two")
        );
        let events = parser.feed(chunk.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].step, "adding_to_cart");
    }

    #[test]
    fn test_non_data_and_malformed_lines_skipped() {
        let mut parser = EventLineParser::new();
        let chunk = b": keep-alive\ndata: not json\nevent: ping\ndata: {\"step\": \"ok\", \"message\": \"m\"}\n";
        let events = parser.feed(chunk);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, "ok");
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = EventLineParser::new();
        let events =
            parser.feed(b"data: {\"step\": \"searching\", \"message\": \"m\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_drain_parses_unterminated_tail() {
        let mut parser = EventLineParser::new();
        assert!(parser
            .feed(b"data: {\"step\": \"confirming\", \"message\": \"m\"}")
            .is_empty());
        let status = parser.drain().unwrap();
        assert_eq!(status.step, "confirming");
        assert!(parser.drain().is_none());
    }

    #[test]
    fn test_product_title_optional() {
        let mut parser = EventLineParser::new();
        let events = parser.feed(
            b"data: {\"step\": \"complete\", \"message\": \"done\", \"product_title\": \"Shell\"}\n",
        );
        assert_eq!(events[0].product_title.as_deref(), Some("Shell"));
    }
}
