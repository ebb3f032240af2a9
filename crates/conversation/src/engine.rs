//! The conversation engine.
//!
//! Owns the chat transcript and drives each user turn: merge any
//! pending clarification, call the backend, fold learned preferences
//! into the profile, refresh watchlist prices from fresh results, and
//! persist the lot.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use agent_client::{
    AgentClient, ClientError, PurchaseRequest, PurchaseResponse, SearchResponse, Shipment,
};
use cartwheel_database::{state, Database};
use shopper_core::{
    history_window, ChatMessage, HistoryEntry, PurchaseEntry, UiProduct, UserProfile, WatchOutcome,
};

use crate::error::Result;
use crate::store::ProfileStore;

/// How many prior messages accompany each search, newest last.
/// Follow-up prompts are not counted; they are questions the agent
/// asked, not conversation the model should re-read.
pub const HISTORY_WINDOW: usize = 8;

/// The backend calls the engine makes, behind a trait so tests can
/// script responses.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        profile: &UserProfile,
        history: Vec<HistoryEntry>,
    ) -> std::result::Result<SearchResponse, ClientError>;

    async fn record_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> std::result::Result<PurchaseResponse, ClientError>;

    async fn shipping_statuses(&self) -> std::result::Result<Vec<Shipment>, ClientError>;
}

#[async_trait]
impl SearchBackend for AgentClient {
    async fn search(
        &self,
        query: &str,
        profile: &UserProfile,
        history: Vec<HistoryEntry>,
    ) -> std::result::Result<SearchResponse, ClientError> {
        AgentClient::search(self, query, profile, history).await
    }

    async fn record_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> std::result::Result<PurchaseResponse, ClientError> {
        AgentClient::record_purchase(self, request).await
    }

    async fn shipping_statuses(&self) -> std::result::Result<Vec<Shipment>, ClientError> {
        AgentClient::shipping_statuses(self).await
    }
}

/// What a call to [`ConversationEngine::send`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Empty or whitespace-only input; nothing was sent.
    Ignored,
    /// A send was already in flight; this one was dropped.
    Busy,
    /// The agent asked a clarifying question instead of searching.
    FollowUp {
        question: String,
        options: Vec<String>,
    },
    /// The agent returned results.
    Results { count: usize },
    /// The backend call failed; an error bubble was appended.
    Failed { message: String },
}

pub struct ConversationEngine<B> {
    backend: B,
    store: ProfileStore,
    db: Database,
    messages: RwLock<Vec<ChatMessage>>,
    /// The original query held open while a clarifying question is
    /// unanswered. The next send is merged into it.
    pending: RwLock<Option<String>>,
    sending: AtomicBool,
}

impl<B: SearchBackend> ConversationEngine<B> {
    /// Restore the transcript and hand the engine its collaborators.
    pub async fn new(backend: B, store: ProfileStore, db: Database) -> Result<Self> {
        let messages = state::load_messages(db.pool()).await?;
        debug!(messages = messages.len(), "transcript restored");
        Ok(Self {
            backend,
            store,
            db,
            messages: RwLock::new(messages),
            pending: RwLock::new(None),
            sending: AtomicBool::new(false),
        })
    }

    /// Run one user turn. Only one send may be in flight at a time; a
    /// second call while the first is running returns
    /// [`SendOutcome::Busy`] without side effects.
    ///
    /// Never fails: backend errors become the apology message and
    /// persistence failures are logged, leaving the in-memory chat
    /// state current.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        if self.sending.swap(true, Ordering::SeqCst) {
            debug!("send ignored, another is in flight");
            return SendOutcome::Busy;
        }
        let outcome = self.send_inner(text).await;
        self.sending.store(false, Ordering::SeqCst);
        outcome
    }

    async fn send_inner(&self, text: &str) -> SendOutcome {
        // The reply to a clarifying question extends the original
        // query rather than replacing it.
        let query = match self.pending.write().await.take() {
            Some(original) => format!("{original} - {text}"),
            None => text.to_string(),
        };

        // History is captured before this turn's user message so the
        // query is not sent twice.
        let history = history_window(&self.messages.read().await, HISTORY_WINDOW);

        let id = self.next_message_id().await;
        self.push_message(ChatMessage::user(id, text)).await;

        let profile = self.store.get().await;
        info!(%query, "searching");
        let response = match self.backend.search(&query, &profile, history).await {
            Ok(response) => response,
            Err(e) => {
                warn!("search failed: {}", e);
                let id = self.next_message_id().await;
                self.push_message(ChatMessage::agent(
                    id,
                    "Sorry, I ran into a problem with that search. Please try again.",
                ))
                .await;
                return SendOutcome::Failed {
                    message: e.to_string(),
                };
            }
        };

        if let Some(learned) = &response.learned_preferences {
            if !learned.is_empty() {
                self.store
                    .update(|mut p| {
                        p.learned.merge(learned);
                        p
                    })
                    .await;
            }
        }

        if let Some(follow_up) = response.follow_up_question {
            // Hold the (possibly already merged) query open for the
            // user's answer.
            *self.pending.write().await = Some(query);
            let id = self.next_message_id().await;
            self.push_message(ChatMessage::follow_up(
                id,
                follow_up.question.clone(),
                follow_up.options.clone(),
            ))
            .await;
            return SendOutcome::FollowUp {
                question: follow_up.question,
                options: follow_up.options,
            };
        }

        let products: Vec<UiProduct> = response
            .products
            .into_iter()
            .map(UiProduct::from_backend)
            .collect();
        let count = products.len();

        self.store
            .update(|mut p| {
                for product in &products {
                    if let Some(WatchOutcome::Updated { previous, current }) =
                        p.watchlist.observe_price(&product.id, product.price)
                    {
                        info!(
                            product = %product.title,
                            previous, current, "watched price moved"
                        );
                    }
                }
                // The history entry keeps what the user typed this
                // turn, not the merged request.
                p.record_search(text, count);
                p
            })
            .await;

        let id = self.next_message_id().await;
        let mut message = ChatMessage::agent(id, response.agent_message);
        message.thinking = response.thinking;
        if !products.is_empty() {
            message.products = Some(products.clone());
        }
        self.push_message(message).await;

        if let Err(e) = state::save_product_cache(self.db.pool(), &products).await {
            warn!("failed to persist product cache: {}", e);
        }
        if let Err(e) = state::set_has_searched(self.db.pool(), true).await {
            warn!("failed to persist search flag: {}", e);
        }

        SendOutcome::Results { count }
    }

    /// Allocate the next message id. Falls back to one past the last
    /// in-memory id when the persisted counter is unreachable, so a
    /// turn still produces ordered messages.
    async fn next_message_id(&self) -> u64 {
        match state::next_message_id(self.db.pool()).await {
            Ok(id) => id,
            Err(e) => {
                warn!("message id counter unavailable: {}", e);
                self.messages
                    .read()
                    .await
                    .last()
                    .map(|m| m.id)
                    .unwrap_or(0)
                    + 1
            }
        }
    }

    async fn push_message(&self, message: ChatMessage) {
        let mut messages = self.messages.write().await;
        messages.push(message);
        if let Err(e) = state::save_messages(self.db.pool(), &messages).await {
            warn!("failed to persist messages: {}", e);
        }
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    pub async fn pending_query(&self) -> Option<String> {
        self.pending.read().await.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    pub async fn profile(&self) -> UserProfile {
        self.store.get().await
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Add a product to the watchlist.
    pub async fn watch(&self, product: &UiProduct) -> WatchOutcome {
        let mut outcome = WatchOutcome::AlreadyWatching;
        self.store
            .update(|mut p| {
                outcome = p.watchlist.watch(product);
                p
            })
            .await;
        outcome
    }

    /// Remove a product from the watchlist. Returns false when it was
    /// not being watched.
    pub async fn unwatch(&self, product_id: &str) -> bool {
        let mut removed = false;
        self.store
            .update(|mut p| {
                removed = p.watchlist.remove(product_id);
                p
            })
            .await;
        removed
    }

    pub async fn set_target_price(&self, product_id: &str, target: Option<f64>) -> bool {
        let mut set = false;
        self.store
            .update(|mut p| {
                set = p.watchlist.set_target_price(product_id, target);
                p
            })
            .await;
        set
    }

    /// Record a simulated purchase locally and report it to the
    /// backend for shipping and price-drop tracking. The local record
    /// is written even when the backend call fails.
    pub async fn record_purchase(
        &self,
        product: &UiProduct,
        card_nickname: &str,
    ) -> PurchaseEntry {
        let request = PurchaseRequest {
            product_id: product.id.clone(),
            product_name: product.title.clone(),
            price: product.price,
            brand: product.brand.clone(),
            category: product.category.clone(),
            card_nickname: card_nickname.to_string(),
        };
        let record = match self.backend.record_purchase(&request).await {
            Ok(response) => response.record,
            Err(e) => {
                warn!("failed to report purchase to backend: {}", e);
                Default::default()
            }
        };
        let entry = PurchaseEntry {
            product_id: product.id.clone(),
            title: product.title.clone(),
            price: product.price,
            category: product.category.clone(),
            card_used: card_nickname.to_string(),
            timestamp: chrono::Utc::now(),
            order_id: record.order_id,
            shipping_status: record.shipping_status,
        };
        self.store
            .update(|mut p| {
                p.record_purchase(entry.clone());
                p
            })
            .await;
        entry
    }

    /// Pull current shipping statuses and fold them into the purchase
    /// history. Returns how many entries changed.
    pub async fn refresh_shipping(&self) -> Result<usize> {
        let shipments = self.backend.shipping_statuses().await?;
        let mut updated = 0;
        self.store
            .update(|mut p| {
                for shipment in &shipments {
                    for entry in p
                        .purchase_history
                        .iter_mut()
                        .filter(|e| e.product_id == shipment.product_id)
                    {
                        if entry.shipping_status.as_deref() != Some(&shipment.shipping_status) {
                            entry.shipping_status = Some(shipment.shipping_status.clone());
                            updated += 1;
                        }
                    }
                }
                p
            })
            .await;
        Ok(updated)
    }

    pub async fn has_searched(&self) -> Result<bool> {
        Ok(state::has_searched(self.db.pool()).await?)
    }

    pub async fn cached_products(&self) -> Result<Vec<UiProduct>> {
        Ok(state::load_product_cache(self.db.pool()).await?)
    }

    /// Wipe everything: transcript, profile, product cache, search
    /// flag, and the message id counter.
    pub async fn reset(&self) -> Result<()> {
        state::reset(self.db.pool()).await?;
        self.messages.write().await.clear();
        *self.pending.write().await = None;
        self.store.replace(UserProfile::default()).await;
        info!("client state reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    use agent_client::api_types::PurchaseRecordInfo;
    use agent_client::{FollowUpQuestion, PurchaseResponse};
    use shopper_core::{BackendProduct, LearnedPreferences, Role};

    #[derive(Default)]
    struct MockBackend {
        responses: Mutex<VecDeque<SearchResponse>>,
        seen_queries: Mutex<Vec<String>>,
        seen_histories: Mutex<Vec<Vec<HistoryEntry>>>,
        shipments: Vec<Shipment>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl MockBackend {
        fn with_responses(responses: Vec<SearchResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SearchBackend for MockBackend {
        async fn search(
            &self,
            query: &str,
            _profile: &UserProfile,
            history: Vec<HistoryEntry>,
        ) -> std::result::Result<SearchResponse, ClientError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ClientError::Api {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.seen_queries.lock().await.push(query.to_string());
            self.seen_histories.lock().await.push(history);
            Ok(self.responses.lock().await.pop_front().expect("scripted response"))
        }

        async fn record_purchase(
            &self,
            _request: &PurchaseRequest,
        ) -> std::result::Result<PurchaseResponse, ClientError> {
            Ok(PurchaseResponse {
                record: PurchaseRecordInfo {
                    order_id: Some("ord-1".to_string()),
                    shipping_status: Some("processing".to_string()),
                },
            })
        }

        async fn shipping_statuses(&self) -> std::result::Result<Vec<Shipment>, ClientError> {
            Ok(self.shipments.clone())
        }
    }

    fn results_response(message: &str, products: Vec<BackendProduct>) -> SearchResponse {
        SearchResponse {
            agent_message: message.to_string(),
            thinking: None,
            products,
            follow_up_question: None,
            learned_preferences: None,
        }
    }

    fn follow_up_response(question: &str, options: &[&str]) -> SearchResponse {
        SearchResponse {
            agent_message: String::new(),
            thinking: None,
            products: Vec::new(),
            follow_up_question: Some(FollowUpQuestion {
                question: question.to_string(),
                options: options.iter().map(|s| s.to_string()).collect(),
            }),
            learned_preferences: None,
        }
    }

    fn product(id: &str, name: &str, price: f64) -> BackendProduct {
        BackendProduct {
            id: id.to_string(),
            name: name.to_string(),
            price,
            ..Default::default()
        }
    }

    async fn engine_with(backend: MockBackend) -> ConversationEngine<MockBackend> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let store = ProfileStore::load(db.clone()).await.unwrap();
        ConversationEngine::new(backend, store, db).await.unwrap()
    }

    #[tokio::test]
    async fn test_send_with_results() {
        let backend = MockBackend::with_responses(vec![results_response(
            "Found one.",
            vec![product("p1", "Shell Jacket", 99.0)],
        )]);
        let engine = engine_with(backend).await;

        let outcome = engine.send("warm jacket").await;
        assert_eq!(outcome, SendOutcome::Results { count: 1 });

        let messages = engine.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Agent);
        assert_eq!(messages[1].products.as_ref().unwrap().len(), 1);

        let profile = engine.profile().await;
        assert_eq!(profile.search_history[0].query, "warm jacket");
        assert_eq!(profile.search_history[0].result_count, 1);
        assert!(engine.has_searched().await.unwrap());
        assert_eq!(engine.cached_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_merges_into_next_send() {
        let backend = MockBackend::with_responses(vec![
            follow_up_response("For what kind of weather?", &["Cold", "Mild"]),
            results_response("Here you go.", vec![product("p1", "Shell", 80.0)]),
        ]);
        let engine = engine_with(backend).await;

        let outcome = engine.send("warm jacket").await;
        assert!(matches!(outcome, SendOutcome::FollowUp { .. }));
        assert_eq!(engine.pending_query().await.as_deref(), Some("warm jacket"));

        engine.send("Cold").await;
        assert!(engine.pending_query().await.is_none());

        let queries = engine.backend.seen_queries.lock().await;
        assert_eq!(queries[1], "warm jacket - Cold");

        // History keeps the raw reply, not the merged request.
        let profile = engine.profile().await;
        assert_eq!(profile.search_history[0].query, "Cold");
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_in_memory_chat() {
        let backend = MockBackend::with_responses(vec![results_response(
            "Found one.",
            vec![product("p1", "Shell", 99.0)],
        )]);
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let store = ProfileStore::load(db.clone()).await.unwrap();
        let engine = ConversationEngine::new(backend, store, db.clone())
            .await
            .unwrap();

        // Every persistence call fails from here on.
        db.close().await;

        let outcome = engine.send("warm jacket").await;
        assert_eq!(outcome, SendOutcome::Results { count: 1 });

        // The turn is fully visible in memory despite the dead store,
        // with ids allocated from the in-memory fallback.
        let messages = engine.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, 1);
        assert_eq!(messages[1].id, 2);
        assert_eq!(engine.profile().await.search_history[0].query, "warm jacket");
    }

    #[tokio::test]
    async fn test_storage_failure_still_appends_apology_on_backend_error() {
        let backend = MockBackend {
            fail: true,
            ..Default::default()
        };
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let store = ProfileStore::load(db.clone()).await.unwrap();
        let engine = ConversationEngine::new(backend, store, db.clone())
            .await
            .unwrap();
        db.close().await;

        let outcome = engine.send("warm jacket").await;
        assert!(matches!(outcome, SendOutcome::Failed { .. }));
        let messages = engine.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Agent);
    }

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() {
        let engine = engine_with(MockBackend::default()).await;
        assert_eq!(engine.send("   ").await, SendOutcome::Ignored);
        assert!(engine.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_chained_follow_ups_keep_merging() {
        let backend = MockBackend::with_responses(vec![
            follow_up_response("Weather?", &[]),
            follow_up_response("Budget?", &[]),
            results_response("Done.", vec![]),
        ]);
        let engine = engine_with(backend).await;

        engine.send("jacket").await;
        engine.send("cold").await;
        assert_eq!(
            engine.pending_query().await.as_deref(),
            Some("jacket - cold")
        );

        engine.send("under $100").await;
        let queries = engine.backend.seen_queries.lock().await;
        assert_eq!(queries[2], "jacket - cold - under $100");
    }

    #[tokio::test]
    async fn test_second_send_while_in_flight_is_busy() {
        let mut backend = MockBackend::with_responses(vec![results_response("ok", vec![])]);
        backend.delay = Some(Duration::from_millis(100));
        let engine = Arc::new(engine_with(backend).await);

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.send("jacket").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = engine.send("boots").await;
        assert_eq!(second, SendOutcome::Busy);

        let first = first.await.unwrap();
        assert_eq!(first, SendOutcome::Results { count: 0 });
        // The dropped send must leave no trace in the transcript.
        assert_eq!(engine.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn test_backend_error_appends_error_bubble() {
        let backend = MockBackend {
            fail: true,
            ..Default::default()
        };
        let engine = engine_with(backend).await;

        let outcome = engine.send("jacket").await;
        assert!(matches!(outcome, SendOutcome::Failed { .. }));

        let messages = engine.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Agent);
        assert!(messages[1].text.contains("try again"));
        assert!(!engine.has_searched().await.unwrap());
    }

    #[tokio::test]
    async fn test_learned_preferences_fold_into_profile() {
        let mut response = results_response("ok", vec![]);
        response.learned_preferences = Some(LearnedPreferences {
            style: Some("outdoorsy".to_string()),
            interests: vec!["hiking".to_string()],
            ..Default::default()
        });
        let engine = engine_with(MockBackend::with_responses(vec![response])).await;

        engine.send("jacket").await;
        let profile = engine.profile().await;
        assert_eq!(profile.learned.style.as_deref(), Some("outdoorsy"));
        assert_eq!(profile.learned.interests, vec!["hiking"]);
    }

    #[tokio::test]
    async fn test_results_refresh_watched_prices() {
        let backend = MockBackend::with_responses(vec![
            results_response("first", vec![product("p1", "Shell", 50.0)]),
            results_response("again", vec![product("p1", "Shell", 40.0)]),
        ]);
        let engine = engine_with(backend).await;

        engine.send("jacket").await;
        let cached = engine.cached_products().await.unwrap();
        engine.watch(&cached[0]).await;

        engine.send("jacket again").await;
        let profile = engine.profile().await;
        let item = profile.watchlist.get("p1").unwrap();
        assert_eq!(item.current_price, 40.0);
        assert_eq!(item.price_history.len(), 2);
    }

    #[tokio::test]
    async fn test_history_window_excludes_follow_up_prompts() {
        let backend = MockBackend::with_responses(vec![
            follow_up_response("Weather?", &[]),
            results_response("ok", vec![]),
            results_response("ok", vec![]),
        ]);
        let engine = engine_with(backend).await;

        engine.send("jacket").await;
        engine.send("cold").await;
        engine.send("boots").await;

        let histories = engine.backend.seen_histories.lock().await;
        let last = histories.last().unwrap();
        assert!(last.iter().all(|entry| entry.role != "follow_up"));
        // user "jacket", user "cold", agent "ok" precede the last turn.
        assert_eq!(last.len(), 3);
    }

    #[tokio::test]
    async fn test_record_purchase_writes_local_entry() {
        let engine = engine_with(MockBackend::default()).await;
        let product = UiProduct {
            id: "p1".to_string(),
            title: "Shell".to_string(),
            price: 99.0,
            category: "jackets".to_string(),
            ..Default::default()
        };

        let entry = engine.record_purchase(&product, "everyday").await;
        assert_eq!(entry.order_id.as_deref(), Some("ord-1"));

        let profile = engine.profile().await;
        assert_eq!(profile.purchase_history.len(), 1);
        assert_eq!(profile.purchase_history[0].card_used, "everyday");
        assert_eq!(profile.total_spent(), 99.0);
    }

    #[tokio::test]
    async fn test_refresh_shipping_updates_matching_entries() {
        let backend = MockBackend {
            shipments: vec![Shipment {
                product_id: "p1".to_string(),
                shipping_status: "delivered".to_string(),
            }],
            ..Default::default()
        };
        let engine = engine_with(backend).await;
        let product = UiProduct {
            id: "p1".to_string(),
            title: "Shell".to_string(),
            price: 99.0,
            ..Default::default()
        };
        engine.record_purchase(&product, "everyday").await;

        let updated = engine.refresh_shipping().await.unwrap();
        assert_eq!(updated, 1);
        let profile = engine.profile().await;
        assert_eq!(
            profile.purchase_history[0].shipping_status.as_deref(),
            Some("delivered")
        );
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let backend = MockBackend::with_responses(vec![results_response(
            "ok",
            vec![product("p1", "Shell", 50.0)],
        )]);
        let engine = engine_with(backend).await;
        engine.send("jacket").await;

        engine.reset().await.unwrap();

        assert!(engine.messages().await.is_empty());
        assert!(engine.pending_query().await.is_none());
        assert_eq!(engine.profile().await, UserProfile::default());
        assert!(!engine.has_searched().await.unwrap());
        assert!(engine.cached_products().await.unwrap().is_empty());
    }
}
