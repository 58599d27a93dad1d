//! ============================================================================
//! Messaging - Conversations between hunters and landowners
//! ============================================================================
//! Messages only exist on the live backend. In simulated mode fetches return
//! nothing and sends are no-ops.
//!
//! The background poller refreshes the signed-in user's messages on a fixed
//! interval and hands each batch to a `MessageSink`. The default sink,
//! `DiscardMessages`, drops the batch: polled messages are not applied to any
//! visible state.
//! ============================================================================

use chrono::{DateTime, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::{Backend, MessageRow, NewMessageRow, ProfileRow};
use crate::config::{Connection, DEFAULT_POLL_INTERVAL_SECS};
use crate::types::{
    avatar_placeholder, Conversation, ConversationParticipants, Message, TimberError, User,
    UserRole,
};

const UNTITLED_LISTING: &str = "Listing";

/// Milliseconds since the epoch for a backend timestamp, 0 when unparseable
pub fn parse_timestamp(raw: &str) -> i64 {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.timestamp_millis();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(ts) => ts.and_utc().timestamp_millis(),
        Err(_) => 0,
    }
}

fn profile_name(profile: Option<&ProfileRow>, fallback: &str) -> String {
    profile
        .and_then(|p| p.full_name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Group a user's message rows into one conversation per listing and
/// counterpart, most recently active first. Rows must be oldest first.
pub fn conversations_for(user: &User, rows: Vec<MessageRow>) -> Vec<Conversation> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut threads: HashMap<(String, String), Conversation> = HashMap::new();
    let user_is_landowner = user.role == Some(UserRole::Landowner);

    for row in rows {
        let outgoing = row.sender_id == user.id;
        if !outgoing && row.receiver_id != user.id {
            debug!("Skipping message {} not addressed to {}", row.id, user.id);
            continue;
        }

        let (counterpart_id, counterpart_profile) = if outgoing {
            (row.receiver_id.clone(), row.receiver.as_ref())
        } else {
            (row.sender_id.clone(), row.sender.as_ref())
        };
        let key = (row.listing_id.clone(), counterpart_id.clone());

        let conversation = threads.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            let counterpart_name = profile_name(counterpart_profile, "User");
            let counterpart_avatar = counterpart_profile
                .and_then(|p| p.avatar_url.clone())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| avatar_placeholder(&counterpart_id));

            let participants = if user_is_landowner {
                ConversationParticipants {
                    hunter_id: counterpart_id.clone(),
                    hunter_name: counterpart_name,
                    landowner_id: user.id.clone(),
                    landowner_name: user.name.clone(),
                    landowner_avatar: avatar_placeholder(&user.id),
                }
            } else {
                ConversationParticipants {
                    hunter_id: user.id.clone(),
                    hunter_name: user.name.clone(),
                    landowner_id: counterpart_id.clone(),
                    landowner_name: counterpart_name,
                    landowner_avatar: counterpart_avatar,
                }
            };

            Conversation {
                id: format!("{}:{}", row.listing_id, counterpart_id),
                participants,
                listing_id: row.listing_id.clone(),
                listing_title: row
                    .listing
                    .as_ref()
                    .and_then(|l| l.title.clone())
                    .unwrap_or_else(|| UNTITLED_LISTING.to_string()),
                last_message: None,
                messages: Vec::new(),
            }
        });

        conversation.last_message = Some(row.content.clone());
        conversation.messages.push(Message {
            timestamp: row.created_at.as_deref().map(parse_timestamp).unwrap_or(0),
            id: row.id,
            sender_id: row.sender_id,
            text: row.content,
        });
    }

    let mut conversations: Vec<Conversation> = order
        .into_iter()
        .filter_map(|key| threads.remove(&key))
        .collect();
    // stable: ties keep first-contact order
    conversations.sort_by_key(|c| {
        std::cmp::Reverse(c.messages.last().map(|m| m.timestamp).unwrap_or(0))
    });
    conversations
}

/// Message reads and writes against the live backend
pub struct MessageService {
    connection: Arc<Connection>,
    backend: Option<Arc<dyn Backend>>,
}

impl MessageService {
    pub fn new(connection: Arc<Connection>, backend: Option<Arc<dyn Backend>>) -> Self {
        Self {
            connection,
            backend,
        }
    }

    fn live_backend(&self) -> Option<&Arc<dyn Backend>> {
        if self.connection.is_connected() {
            self.backend.as_ref()
        } else {
            None
        }
    }

    pub fn is_live(&self) -> bool {
        self.live_backend().is_some()
    }

    /// Raw rows for a user; empty when simulated or on failure
    pub async fn fetch_rows(&self, user_id: &str) -> Vec<MessageRow> {
        let Some(backend) = self.live_backend() else {
            return Vec::new();
        };
        match backend.select_messages(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to fetch messages for {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    pub async fn conversations(&self, user: &User) -> Vec<Conversation> {
        let rows = self.fetch_rows(&user.id).await;
        conversations_for(user, rows)
    }

    /// Post a message. Returns false without sending in simulated mode.
    pub async fn send(
        &self,
        sender: &User,
        listing_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<bool, TimberError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(TimberError::InvalidInput("message is empty".into()));
        }
        if receiver_id == sender.id {
            return Err(TimberError::InvalidInput(
                "cannot message yourself".into(),
            ));
        }

        let Some(backend) = self.live_backend() else {
            debug!("Simulated mode: message on {} not sent", listing_id);
            return Ok(false);
        };

        let row = NewMessageRow {
            listing_id: listing_id.to_string(),
            sender_id: sender.id.clone(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
        };
        backend.insert_message(&row).await?;
        Ok(true)
    }
}

/// Destination for polled message batches
pub trait MessageSink: Send + Sync {
    fn deliver(&self, user: &User, rows: Vec<MessageRow>);
}

/// Drops every polled batch
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardMessages;

impl MessageSink for DiscardMessages {
    fn deliver(&self, user: &User, rows: Vec<MessageRow>) {
        debug!("Discarding {} polled messages for {}", rows.len(), user.id);
    }
}

/// Handle to a running poller; stopping or dropping it cancels the task
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    polls: Arc<AtomicU64>,
}

impl PollerHandle {
    /// Number of completed polls
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal shutdown and wait for the task to exit
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Message poller ended abnormally: {}", e);
                }
            }
        }
        info!("Message poller stopped after {} polls", self.polls());
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Periodic message refresh for whoever is signed in
pub struct MessagePoller;

impl MessagePoller {
    /// Poll every `interval` while a user is signed in and the backend is
    /// live. The first poll happens one interval after spawning. A zero
    /// interval falls back to the default.
    pub fn spawn(
        service: Arc<MessageService>,
        session: watch::Receiver<Option<User>>,
        interval: Duration,
        sink: Arc<dyn MessageSink>,
    ) -> PollerHandle {
        let interval = if interval.is_zero() {
            warn!("Zero poll interval, using {}s", DEFAULT_POLL_INTERVAL_SECS);
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        } else {
            interval
        };
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let polls = Arc::new(AtomicU64::new(0));
        let counter = polls.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let user = session.borrow().clone();
                        let Some(user) = user else { continue };
                        if !service.is_live() {
                            continue;
                        }
                        let rows = service.fetch_rows(&user.id).await;
                        sink.deliver(&user, rows);
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        debug!("Message poller started ({:?} interval)", interval);
        PollerHandle {
            shutdown_tx,
            handle: Some(handle),
            polls,
        }
    }
}
