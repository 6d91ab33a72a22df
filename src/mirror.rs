//! Mailbox mirror: the bounded, in-memory snapshot of message metadata
//!
//! A [`Mirror`] is replaced wholesale by a refresh and patched in place by
//! label deltas. Iteration order is the order the provider listed the ids,
//! most recent first.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::GmailClient;
use crate::error::{MailError, RemoteOperation, Result};
use crate::models::Message;

/// Labels to add to and remove from one message
///
/// Applied as `(labels ∪ add) \ remove`, so a label named in both ends up removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDelta {
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

impl LabelDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adding(mut self, label_id: impl Into<String>) -> Self {
        self.add.insert(label_id.into());
        self
    }

    pub fn removing(mut self, label_id: impl Into<String>) -> Self {
        self.remove.insert(label_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn apply_to(&self, labels: &mut BTreeSet<String>) {
        labels.extend(self.add.iter().cloned());
        labels.retain(|label| !self.remove.contains(label));
    }

    /// Label ids in request form
    pub fn add_ids(&self) -> Vec<String> {
        self.add.iter().cloned().collect()
    }

    pub fn remove_ids(&self) -> Vec<String> {
        self.remove.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mirror {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
    generation: u64,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mirror from provider order; a repeated id keeps its first occurrence
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut mirror = Self::new();
        mirror.fill(messages);
        mirror
    }

    fn fill(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            if self.index.contains_key(&message.id) {
                debug!("Skipping duplicate message id {}", message.id);
                continue;
            }
            self.index.insert(message.id.clone(), self.messages.len());
            self.messages.push(message);
        }
    }

    /// Swap in a freshly fetched snapshot and bump the generation
    pub fn replace_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.clear();
        self.index.clear();
        self.fill(messages);
        self.generation += 1;
    }

    /// Incremented every time the whole snapshot is replaced
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &str) -> Result<&Message> {
        self.index
            .get(id)
            .map(|&i| &self.messages[i])
            .ok_or_else(|| MailError::MessageNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Message> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.messages[i]),
            None => Err(MailError::MessageNotFound(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn apply_label_delta(&mut self, id: &str, delta: &LabelDelta) -> Result<&Message> {
        let message = self.get_mut(id)?;
        delta.apply_to(&mut message.labels);
        Ok(message)
    }

    /// Overwrite a message's label set, used for reverts and provider reconciliation
    pub fn replace_labels(&mut self, id: &str, labels: BTreeSet<String>) -> Result<&Message> {
        let message = self.get_mut(id)?;
        message.labels = labels;
        Ok(message)
    }

    /// Remove `label_id` from every cached message; returns how many changed
    pub fn strip_label(&mut self, label_id: &str) -> usize {
        self.messages
            .iter_mut()
            .map(|m| m.labels.remove(label_id))
            .filter(|removed| *removed)
            .count()
    }
}

/// List up to `limit` ids, then fetch their metadata with bounded concurrency
///
/// All-or-nothing: the first failed fetch fails the whole snapshot, and so does
/// exceeding `timeout`. Results keep the listing order.
pub async fn fetch_snapshot(
    client: &dyn GmailClient,
    limit: u32,
    concurrency: usize,
    timeout: Duration,
) -> Result<Vec<Message>> {
    let fetch = async {
        let ids = client.list_message_ids(limit).await?;
        debug!("Fetching metadata for {} messages", ids.len());

        let requests: Vec<_> = ids.iter().map(|id| client.get_message(id)).collect();
        stream::iter(requests)
            .buffered(concurrency.max(1))
            .try_collect::<Vec<_>>()
            .await
    };

    let messages = match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result.map_err(|e| MailError::remote(RemoteOperation::FetchMessages, e))?,
        Err(_) => {
            warn!("Mailbox refresh timed out after {:?}", timeout);
            return Err(MailError::remote(
                RemoteOperation::FetchMessages,
                MailError::NetworkError(format!("Refresh timed out after {:?}", timeout)),
            ));
        }
    };

    info!("Fetched {} messages", messages.len());
    Ok(messages)
}
