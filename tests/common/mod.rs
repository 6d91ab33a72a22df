//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use mail_mirror::client::GmailClient;
use mail_mirror::error::{MailError, Result};
use mail_mirror::models::{Label, LabelType, Message, NewLabel};
use mockall::mock;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Install a test-writer subscriber; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mail_mirror=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Create a test message with default values
pub fn create_test_message(id: &str, from: &str, subject: &str, labels: &[&str]) -> Message {
    let mut message = Message::new(id).with_labels(labels.iter().copied());
    message.from = from.to_string();
    message.subject = subject.to_string();
    message.date = "Mon, 1 Jan 2024 10:00:00 -0800".to_string();
    message
}

pub fn system_label(id: &str) -> Label {
    Label {
        label_type: LabelType::System,
        ..Label::user(id, id)
    }
}

/// Create mock Gmail API message response (JSON)
pub fn mock_gmail_message_response(
    id: &str,
    from: &str,
    subject: &str,
    label_ids: &[&str],
) -> serde_json::Value {
    json!({
        "id": id,
        "threadId": format!("thread_{}", id),
        "labelIds": label_ids,
        "snippet": "Email snippet...",
        "payload": {
            "mimeType": "text/plain",
            "headers": [
                {"name": "From", "value": from},
                {"name": "Subject", "value": subject},
                {"name": "Date", "value": "Mon, 1 Jan 2024 10:00:00 -0800"}
            ]
        },
        "sizeEstimate": 1234
    })
}

/// Create mock Gmail list messages response (JSON)
pub fn mock_gmail_list_response(message_ids: &[&str]) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = message_ids
        .iter()
        .map(|id| json!({"id": id, "threadId": format!("thread_{}", id)}))
        .collect();

    json!({
        "messages": messages,
        "resultSizeEstimate": messages.len()
    })
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>>;
        async fn get_message(&self, id: &str) -> Result<Message>;
        async fn modify_labels(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<Option<Vec<String>>>;
        async fn send_raw(&self, raw: &str) -> Result<()>;
        async fn list_labels(&self) -> Result<Vec<Label>>;
        async fn create_label(&self, label: &NewLabel) -> Result<Label>;
        async fn rename_label(&self, label_id: &str, name: &str) -> Result<Label>;
        async fn delete_label(&self, label_id: &str) -> Result<()>;
    }
}

/// A recorded modify request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyCall {
    pub message_id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

#[derive(Default)]
struct ProviderState {
    messages: Vec<Message>,
    labels: Vec<Label>,
    next_label: u32,
    modify_calls: Vec<ModifyCall>,
    sent: Vec<String>,
    fail_listing: bool,
    fail_gets: HashSet<String>,
    fail_modify: bool,
    fail_labels: bool,
    get_delay: Option<Duration>,
}

/// In-memory provider that behaves like the remote mailbox
///
/// Modify requests can be held at a gate so a test can observe the
/// optimistic state while the request is in flight.
pub struct FakeProvider {
    state: Mutex<ProviderState>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    modify_started: Notify,
}

impl FakeProvider {
    pub fn new(messages: Vec<Message>, labels: Vec<Label>) -> Self {
        Self {
            state: Mutex::new(ProviderState {
                messages,
                labels,
                next_label: 100,
                ..Default::default()
            }),
            gate: Mutex::new(None),
            modify_started: Notify::new(),
        }
    }

    pub fn stored_message(&self, id: &str) -> Option<Message> {
        let state = self.state.lock().unwrap();
        state.messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn set_message_labels(&self, id: &str, labels: &[&str]) {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.messages.iter_mut().find(|m| m.id == id) {
            message.labels = labels.iter().map(|s| s.to_string()).collect();
        }
    }

    pub fn modify_calls(&self) -> Vec<ModifyCall> {
        self.state.lock().unwrap().modify_calls.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_listing = fail;
    }

    pub fn fail_get(&self, id: &str) {
        self.state.lock().unwrap().fail_gets.insert(id.to_string());
    }

    pub fn fail_modify(&self, fail: bool) {
        self.state.lock().unwrap().fail_modify = fail;
    }

    pub fn fail_labels(&self, fail: bool) {
        self.state.lock().unwrap().fail_labels = fail;
    }

    pub fn delay_gets(&self, delay: Duration) {
        self.state.lock().unwrap().get_delay = Some(delay);
    }

    /// Hold every modify request until [`FakeProvider::release_modify`]
    pub fn gate_modifies(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one held modify request through
    pub fn release_modify(&self) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(1);
        }
    }

    /// Resolves once a modify request has reached the gate
    pub async fn wait_for_modify(&self) {
        self.modify_started.notified().await;
    }

    fn unavailable() -> MailError {
        MailError::ServerError {
            status: 503,
            message: "Service Unavailable".to_string(),
        }
    }
}

#[async_trait]
impl GmailClient for FakeProvider {
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(Self::unavailable());
        }
        Ok(state
            .messages
            .iter()
            .take(max_results as usize)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        let delay = self.state.lock().unwrap().get_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_gets.contains(id) {
            return Err(MailError::NotFound(id.to_string()));
        }
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(id.to_string()))
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<Option<Vec<String>>> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.modify_started.notify_one();
            gate.acquire()
                .await
                .map_err(|e| MailError::NetworkError(e.to_string()))?
                .forget();
        }

        let mut state = self.state.lock().unwrap();
        state.modify_calls.push(ModifyCall {
            message_id: message_id.to_string(),
            add: add_label_ids.to_vec(),
            remove: remove_label_ids.to_vec(),
        });
        if state.fail_modify {
            return Err(Self::unavailable());
        }

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| MailError::NotFound(message_id.to_string()))?;
        message.labels.extend(add_label_ids.iter().cloned());
        message.labels.retain(|l| !remove_label_ids.contains(l));
        Ok(Some(message.labels.iter().cloned().collect()))
    }

    async fn send_raw(&self, raw: &str) -> Result<()> {
        self.state.lock().unwrap().sent.push(raw.to_string());
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(Self::unavailable());
        }
        Ok(state.labels.clone())
    }

    async fn create_label(&self, label: &NewLabel) -> Result<Label> {
        let mut state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(Self::unavailable());
        }
        if state
            .labels
            .iter()
            .any(|l| l.name.eq_ignore_ascii_case(&label.name))
        {
            return Err(MailError::BadRequest("Label name exists or conflicts".to_string()));
        }

        state.next_label += 1;
        let created = Label {
            label_list_visibility: Some(label.label_list_visibility.clone()),
            message_list_visibility: Some(label.message_list_visibility.clone()),
            ..Label::user(format!("Label_{}", state.next_label), label.name.clone())
        };
        state.labels.push(created.clone());
        Ok(created)
    }

    async fn rename_label(&self, label_id: &str, name: &str) -> Result<Label> {
        let mut state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(Self::unavailable());
        }
        let label = state
            .labels
            .iter_mut()
            .find(|l| l.id == label_id)
            .ok_or_else(|| MailError::NotFound(label_id.to_string()))?;
        label.name = name.to_string();
        Ok(label.clone())
    }

    async fn delete_label(&self, label_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(Self::unavailable());
        }
        let before = state.labels.len();
        state.labels.retain(|l| l.id != label_id);
        if state.labels.len() == before {
            return Err(MailError::NotFound(label_id.to_string()));
        }
        for message in state.messages.iter_mut() {
            message.labels.remove(label_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "Alice <a@x.com>", "Hello", &["INBOX"]);
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.sender().1, "a@x.com");
        assert!(msg.has_label("INBOX"));
        assert!(msg.received_at().is_some());
    }

    #[test]
    fn test_mock_gmail_list_response() {
        let response = mock_gmail_list_response(&["msg1", "msg2"]);
        assert_eq!(response["messages"].as_array().unwrap().len(), 2);
        assert_eq!(response["resultSizeEstimate"], 2);
    }

    #[tokio::test]
    async fn test_fake_provider_applies_modify() {
        let provider = FakeProvider::new(
            vec![create_test_message("1", "a@x.com", "s", &["INBOX"])],
            vec![],
        );
        let labels = provider
            .modify_labels("1", &["STARRED".to_string()], &["INBOX".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(labels, vec!["STARRED".to_string()]);
        assert_eq!(provider.modify_calls().len(), 1);
    }
}
