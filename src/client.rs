//! Gmail API client with bounded concurrency and request timeouts

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use google_gmail1::api::{Label as ApiLabel, Message as ApiMessage, ModifyMessageRequest};
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::auth::{GmailHub, MODIFY_SCOPE, READONLY_SCOPE, SEND_SCOPE};
use crate::config::Config;
use crate::error::{MailError, Result};
use crate::models::{Label, LabelType, Message, NewLabel};

/// Trait defining the remote provider operations the mirror depends on
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// Ids of the `max_results` most recent messages, newest first
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>>;

    /// From/Subject/Date headers and label ids for one message
    async fn get_message(&self, id: &str) -> Result<Message>;

    /// Add and remove labels on a message
    ///
    /// Returns the message's label ids after the change when the provider
    /// reports them.
    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<Option<Vec<String>>>;

    /// Submit a base64url-encoded RFC 2822 message
    async fn send_raw(&self, raw: &str) -> Result<()>;

    /// List all labels, system and user
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a label; returns the provider's stored representation
    async fn create_label(&self, label: &NewLabel) -> Result<Label>;

    /// Rename a label; returns the provider's stored representation
    async fn rename_label(&self, label_id: &str, name: &str) -> Result<Label>;

    /// Delete a label by ID
    async fn delete_label(&self, label_id: &str) -> Result<()>;
}

/// Production Gmail client backed by the `google-gmail1` hub
///
/// - Semaphore bounding in-flight requests
/// - Per-request timeout
/// - Retry with exponential backoff for metadata fetches only; mutations
///   are never retried
pub struct ProductionGmailClient {
    hub: GmailHub,
    rate_limiter: Arc<Semaphore>,
    user_id: String,
    request_timeout: Duration,
    metadata_retries: u32,
}

impl ProductionGmailClient {
    /// Create a client with default timeouts
    ///
    /// # Arguments
    /// * `hub` - Gmail API hub instance
    /// * `max_concurrent` - Maximum concurrent requests
    pub fn new(hub: GmailHub, max_concurrent: usize) -> Self {
        let defaults = Config::default();
        let request_timeout = defaults.api.request_timeout();
        Self {
            hub,
            rate_limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            user_id: defaults.api.user_id,
            request_timeout,
            metadata_retries: defaults.mailbox.metadata_retries,
        }
    }

    pub fn from_config(hub: GmailHub, config: &Config) -> Self {
        Self {
            hub,
            rate_limiter: Arc::new(Semaphore::new(config.mailbox.fetch_concurrency.max(1))),
            user_id: config.api.user_id.clone(),
            request_timeout: config.api.request_timeout(),
            metadata_retries: config.mailbox.metadata_retries,
        }
    }

    /// Get the inner hub reference
    pub fn hub(&self) -> &GmailHub {
        &self.hub
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.rate_limiter
            .acquire()
            .await
            .map_err(|e| MailError::NetworkError(format!("Failed to acquire permit: {}", e)))
    }

    /// Run one API call under a permit and the request timeout
    async fn call<T, Fut>(&self, operation_name: &str, api_call: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        let _permit = self.acquire_permit().await?;
        debug!("Calling Gmail API: {}", operation_name);

        match tokio::time::timeout(self.request_timeout, api_call).await {
            Ok(result) => result.map_err(MailError::from),
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation_name, self.request_timeout
                );
                Err(MailError::NetworkError(format!(
                    "API call timed out after {:?}",
                    self.request_timeout
                )))
            }
        }
    }

    /// Check if an error is retryable
    fn should_retry(error: &MailError) -> bool {
        matches!(
            error,
            MailError::ServerError { .. }
                | MailError::RateLimitExceeded { .. }
                | MailError::NetworkError(_)
        )
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        initial_delay: Duration,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = initial_delay;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(5));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_metadata(&self, id: &str) -> Result<Message> {
        let api_call = self
            .hub
            .users()
            .messages_get(&self.user_id, id)
            .format("metadata")
            .add_metadata_headers("From")
            .add_metadata_headers("Subject")
            .add_metadata_headers("Date")
            .add_scope(READONLY_SCOPE)
            .doit();

        let (_, msg) = self.call("messages.get", api_call).await?;
        parse_message_metadata(msg)
    }
}

/// Parse a metadata-format Gmail message into our Message
fn parse_message_metadata(msg: ApiMessage) -> Result<Message> {
    let id = msg
        .id
        .ok_or_else(|| MailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let mut message = Message::new(id).with_labels(msg.label_ids.unwrap_or_default());

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default();

    for header in headers {
        if let (Some(name), Some(value)) = (header.name, header.value) {
            match name.to_lowercase().as_str() {
                "from" => message.from = value,
                "subject" if !value.is_empty() => message.subject = value,
                "date" => message.date = value,
                _ => {}
            }
        }
    }

    Ok(message)
}

fn label_from_api(label: ApiLabel) -> Option<Label> {
    Some(Label {
        id: label.id?,
        name: label.name?,
        label_type: LabelType::from_provider(label.type_.as_deref()),
        label_list_visibility: label.label_list_visibility,
        message_list_visibility: label.message_list_visibility,
    })
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        let api_call = self
            .hub
            .users()
            .messages_list(&self.user_id)
            .max_results(max_results)
            .add_scope(READONLY_SCOPE)
            .doit();

        let (_, response) = self.call("messages.list", api_call).await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        debug!("Listed {} message ids", ids.len());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        Self::with_retry(
            "messages.get",
            self.metadata_retries,
            Duration::from_millis(100),
            move || self.fetch_metadata(id),
        )
        .await
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<Option<Vec<String>>> {
        let request = ModifyMessageRequest {
            add_label_ids: Some(add_label_ids.to_vec()),
            remove_label_ids: Some(remove_label_ids.to_vec()),
        };

        let api_call = self
            .hub
            .users()
            .messages_modify(request, &self.user_id, message_id)
            .add_scope(MODIFY_SCOPE)
            .doit();

        let (_, msg) = self.call("messages.modify", api_call).await?;
        Ok(msg.label_ids)
    }

    async fn send_raw(&self, raw: &str) -> Result<()> {
        // The hub uploads RFC 822 bytes as a media upload rather than a `raw` field
        let rfc822 = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|e| MailError::InvalidMessageFormat(format!("Invalid raw message: {}", e)))?;
        let mime_type: mime::Mime = "message/rfc822"
            .parse()
            .map_err(|e| MailError::InvalidMessageFormat(format!("Invalid mime type: {}", e)))?;

        let api_call = self
            .hub
            .users()
            .messages_send(ApiMessage::default(), &self.user_id)
            .add_scope(SEND_SCOPE)
            .upload(Cursor::new(rfc822), mime_type);

        let (_, sent) = self.call("messages.send", api_call).await?;
        debug!("Sent message {}", sent.id.unwrap_or_default());
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let api_call = self
            .hub
            .users()
            .labels_list(&self.user_id)
            .add_scope(MODIFY_SCOPE)
            .doit();

        let (_, response) = self.call("labels.list", api_call).await?;

        let labels: Vec<Label> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(label_from_api)
            .collect();

        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, label: &NewLabel) -> Result<Label> {
        let request = ApiLabel {
            name: Some(label.name.clone()),
            label_list_visibility: Some(label.label_list_visibility.clone()),
            message_list_visibility: Some(label.message_list_visibility.clone()),
            ..Default::default()
        };

        let api_call = self
            .hub
            .users()
            .labels_create(request, &self.user_id)
            .add_scope(MODIFY_SCOPE)
            .doit();

        let (_, created) = self.call("labels.create", api_call).await?;
        label_from_api(created).ok_or_else(|| {
            MailError::InvalidMessageFormat("Created label has no ID or name".to_string())
        })
    }

    async fn rename_label(&self, label_id: &str, name: &str) -> Result<Label> {
        let request = ApiLabel {
            name: Some(name.to_string()),
            ..Default::default()
        };

        let api_call = self
            .hub
            .users()
            .labels_patch(request, &self.user_id, label_id)
            .add_scope(MODIFY_SCOPE)
            .doit();

        let (_, updated) = self.call("labels.patch", api_call).await?;
        label_from_api(updated).ok_or_else(|| {
            MailError::InvalidMessageFormat("Updated label has no ID or name".to_string())
        })
    }

    async fn delete_label(&self, label_id: &str) -> Result<()> {
        let api_call = self
            .hub
            .users()
            .labels_delete(&self.user_id, label_id)
            .add_scope(MODIFY_SCOPE)
            .doit();

        self.call("labels.delete", api_call).await?;
        Ok(())
    }
}
