//! Optimistic message mutations with revert on failure
//!
//! Every label mutation runs the same sequence under the message's lock:
//!
//! 1. compute a [`LabelDelta`] from the current message
//! 2. apply it to the mirror immediately
//! 3. send the matching modify request
//! 4. on success adopt the provider's label ids when it reports them,
//!    otherwise keep the optimistic state; on failure restore the snapshot
//!
//! If a refresh replaced the mirror while the request was in flight, a
//! successful request is laid over the refreshed message and a failed one
//! leaves the refreshed state alone.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::compose::OutgoingMessage;
use crate::error::{MailError, RemoteOperation, Result};
use crate::mirror::LabelDelta;
use crate::models::system_labels::{INBOX, STARRED, TRASH};
use crate::models::Message;
use crate::session::Session;

pub struct MutationDispatcher<'a> {
    session: &'a Session,
}

impl<'a> MutationDispatcher<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Toggle STARRED
    pub async fn star(&self, message_id: &str) -> Result<()> {
        let result = self
            .mutate(message_id, RemoteOperation::StarMessage, |message| {
                if message.starred() {
                    LabelDelta::new().removing(STARRED)
                } else {
                    LabelDelta::new().adding(STARRED)
                }
            })
            .await;
        self.session.report(result).await
    }

    pub async fn add_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        let result = if label_id.trim().is_empty() {
            Err(MailError::ValidationError(
                "Label id cannot be empty".to_string(),
            ))
        } else {
            self.mutate(message_id, RemoteOperation::AddLabelToMessage, |_| {
                LabelDelta::new().adding(label_id)
            })
            .await
        };
        self.session.report(result).await
    }

    /// Remove INBOX and nothing else
    pub async fn archive(&self, message_id: &str) -> Result<()> {
        let result = self
            .mutate(message_id, RemoteOperation::ArchiveMessage, |_| {
                LabelDelta::new().removing(INBOX)
            })
            .await;
        self.session.report(result).await
    }

    /// Move to trash: add TRASH and remove INBOX, locally and remotely
    pub async fn delete(&self, message_id: &str) -> Result<()> {
        let result = self
            .mutate(message_id, RemoteOperation::DeleteMessage, |_| {
                LabelDelta::new().adding(TRASH).removing(INBOX)
            })
            .await;
        self.session.report(result).await
    }

    /// Validate, encode and submit; the mirror is not touched
    pub async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let result = self.send_inner(message).await;
        self.session.report(result).await
    }

    async fn send_inner(&self, message: &OutgoingMessage) -> Result<()> {
        let raw = message.encode_raw()?;
        self.session
            .client
            .send_raw(&raw)
            .await
            .map_err(|e| MailError::remote(RemoteOperation::SendMessage, e))?;
        info!("Sent message to {}", message.to);
        Ok(())
    }

    async fn mutate<F>(&self, message_id: &str, operation: RemoteOperation, plan: F) -> Result<()>
    where
        F: FnOnce(&Message) -> LabelDelta,
    {
        let _guard = self.session.lock_message(message_id).await;

        let (delta, snapshot, generation) = {
            let mut mirror = self.session.mirror.write().await;
            let current = mirror.get(message_id)?;
            let delta = plan(current);
            let snapshot = current.labels.clone();
            let generation = mirror.generation();
            mirror.apply_label_delta(message_id, &delta)?;
            (delta, snapshot, generation)
        };
        debug!(
            "Optimistic {} on {}: add {:?}, remove {:?}",
            operation, message_id, delta.add, delta.remove
        );

        let response = self
            .session
            .client
            .modify_labels(message_id, &delta.add_ids(), &delta.remove_ids())
            .await;

        let mut mirror = self.session.mirror.write().await;
        if mirror.generation() != generation {
            // The refreshed snapshot may predate the remote change
            debug!(
                "Mirror refreshed during {} on {}; reconciling with refreshed state",
                operation, message_id
            );
            let labels = response.map_err(|e| MailError::remote(operation, e))?;
            if mirror.contains(message_id) {
                match labels {
                    Some(labels) => {
                        mirror.replace_labels(message_id, labels.into_iter().collect())?;
                    }
                    None => {
                        mirror.apply_label_delta(message_id, &delta)?;
                    }
                }
            }
            return Ok(());
        }

        match response {
            Ok(Some(labels)) => {
                let labels: BTreeSet<String> = labels.into_iter().collect();
                mirror.replace_labels(message_id, labels)?;
                debug!("Committed {} on {} with provider labels", operation, message_id);
                Ok(())
            }
            Ok(None) => {
                debug!("Committed {} on {}", operation, message_id);
                Ok(())
            }
            Err(e) => {
                mirror.replace_labels(message_id, snapshot)?;
                warn!("Reverted {} on {}", operation, message_id);
                Err(MailError::remote(operation, e))
            }
        }
    }
}
