//! Session context: everything that lives between sign-in and sign-out
//!
//! A [`Session`] owns the mailbox mirror, the label catalog and the
//! latest-error slot. It is created once the access token is available and
//! consumed by [`Session::sign_out`]. Mutations go through
//! [`Session::dispatcher`] and label CRUD through [`Session::label_manager`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::auth::{self, AccessToken};
use crate::catalog::{LabelCatalog, LabelManager};
use crate::client::{GmailClient, ProductionGmailClient};
use crate::config::Config;
use crate::dispatcher::MutationDispatcher;
use crate::error::{MailError, RemoteOperation, Result};
use crate::mirror::{self, Mirror};
use crate::models::{Label, Message};
use crate::view::{self, ViewSelection};

/// The single error shown to the user; a new one replaces the old
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub operation: Option<RemoteOperation>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl SessionError {
    fn from_error(error: &MailError) -> Self {
        Self {
            operation: error.operation(),
            message: error.user_message(),
            occurred_at: Utc::now(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub struct Session {
    pub(crate) client: Arc<dyn GmailClient>,
    pub(crate) config: Config,
    pub(crate) mirror: RwLock<Mirror>,
    pub(crate) catalog: RwLock<LabelCatalog>,
    last_error: RwLock<Option<SessionError>>,
    message_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    refreshing: AtomicUsize,
}

/// Counts one in-flight refresh until dropped, however the refresh ends
struct RefreshingGuard<'a>(&'a AtomicUsize);

impl<'a> RefreshingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Session {
    /// Start an empty session over an authenticated client
    pub fn new(client: Arc<dyn GmailClient>, config: Config) -> Self {
        Self {
            client,
            config,
            mirror: RwLock::new(Mirror::new()),
            catalog: RwLock::new(LabelCatalog::default()),
            last_error: RwLock::new(None),
            message_locks: Mutex::new(HashMap::new()),
            refreshing: AtomicUsize::new(0),
        }
    }

    /// Build the production client from a bearer token and start a session
    pub fn connect(token: &AccessToken, config: Config) -> Result<Self> {
        config.validate()?;
        let hub = auth::connect(token)?;
        let client = ProductionGmailClient::from_config(hub, &config);
        info!("Session started for user '{}'", config.api.user_id);
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> MutationDispatcher<'_> {
        MutationDispatcher::new(self)
    }

    pub fn label_manager(&self) -> LabelManager<'_> {
        LabelManager::new(self)
    }

    /// Refresh mailbox and labels concurrently
    ///
    /// Both refreshes run to completion; the first failure (mailbox first) is
    /// returned and every failure is recorded. A successful mailbox refresh
    /// clears only errors recorded before it started.
    pub async fn refresh(&self) -> Result<()> {
        let started = Utc::now();
        let manager = self.label_manager();
        let (mailbox, labels) = tokio::join!(self.load_mailbox(), manager.load());

        if mailbox.is_ok() {
            self.clear_error_before(started).await;
        }
        if let Err(e) = &labels {
            self.record_error(e).await;
        }
        if let Err(e) = &mailbox {
            self.record_error(e).await;
        }

        mailbox?;
        labels?;
        Ok(())
    }

    /// Replace the mirror with a fresh snapshot; returns the message count
    pub async fn refresh_mailbox(&self) -> Result<usize> {
        let started = Utc::now();
        let count = self.report(self.load_mailbox().await).await?;
        self.clear_error_before(started).await;
        Ok(count)
    }

    async fn load_mailbox(&self) -> Result<usize> {
        let _guard = RefreshingGuard::enter(&self.refreshing);

        let mailbox = &self.config.mailbox;
        let messages = mirror::fetch_snapshot(
            self.client.as_ref(),
            mailbox.max_results,
            mailbox.fetch_concurrency,
            mailbox.refresh_timeout(),
        )
        .await?;

        let mut mirror = self.mirror.write().await;
        mirror.replace_all(messages);
        info!(
            "Mirror refreshed: {} messages (generation {})",
            mirror.len(),
            mirror.generation()
        );
        Ok(mirror.len())
    }

    /// True while any mailbox refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst) > 0
    }

    /// Snapshot of the mirror in refresh order
    pub async fn messages(&self) -> Vec<Message> {
        self.mirror.read().await.all().to_vec()
    }

    pub async fn message(&self, id: &str) -> Result<Message> {
        self.mirror.read().await.get(id).cloned()
    }

    /// User labels currently in the catalog
    pub async fn labels(&self) -> Vec<Label> {
        self.catalog.read().await.all().to_vec()
    }

    pub async fn visible(&self, selection: &ViewSelection) -> Vec<Message> {
        let mirror = self.mirror.read().await;
        view::visible(&mirror, selection)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn last_error(&self) -> Option<SessionError> {
        self.last_error.read().await.clone()
    }

    pub async fn clear_error(&self) {
        self.last_error.write().await.take();
    }

    /// Clear the slot unless its error was recorded at or after `started`
    async fn clear_error_before(&self, started: DateTime<Utc>) {
        let mut slot = self.last_error.write().await;
        if slot.as_ref().is_some_and(|e| e.occurred_at < started) {
            debug!("Clearing error superseded by refresh");
            slot.take();
        }
    }

    /// End the session, discarding mirror and catalog
    pub fn sign_out(self) {
        let mirror = self.mirror.into_inner();
        info!("Signing out; discarding {} cached messages", mirror.len());
    }

    pub(crate) async fn record_error(&self, error: &MailError) {
        warn!("{}", error);
        let entry = SessionError::from_error(error);
        *self.last_error.write().await = Some(entry);
    }

    /// Record a failed result in the latest-error slot and pass it through
    pub(crate) async fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.record_error(e).await;
        }
        result
    }

    /// Serialize mutations on one message
    ///
    /// The guard is held across the optimistic apply, the remote call and the
    /// commit or revert.
    pub(crate) async fn lock_message(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.message_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        debug!("Waiting for message lock on {}", id);
        lock.lock_owned().await
    }
}
