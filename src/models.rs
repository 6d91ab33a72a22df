use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Well-known label identifiers managed by the provider
pub mod system_labels {
    pub const INBOX: &str = "INBOX";
    pub const SENT: &str = "SENT";
    pub const STARRED: &str = "STARRED";
    pub const TRASH: &str = "TRASH";
    pub const SPAM: &str = "SPAM";
}

/// Placeholder used when the provider reports no Subject header
pub const NO_SUBJECT: &str = "(No Subject)";

/// Message metadata mirrored from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub subject: String,
    /// Provider-supplied Date header, kept verbatim
    pub date: String,
    pub labels: BTreeSet<String>,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: String::new(),
            subject: NO_SUBJECT.to_string(),
            date: String::new(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.labels.contains(label_id)
    }

    /// Derived from the label set; there is no separate starred flag to drift
    pub fn starred(&self) -> bool {
        self.has_label(system_labels::STARRED)
    }

    /// Parsed `date`, if the provider sent something recognizable
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.date)
    }

    /// Splits `from` into (display name, address)
    pub fn sender(&self) -> (String, String) {
        match parse_email_header(&self.from) {
            Some(parts) => parts,
            None => (String::new(), self.from.trim().to_string()),
        }
    }
}

/// Whether a label was created by the user or is managed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    System,
    #[default]
    User,
}

impl LabelType {
    /// Provider sends "user" or "system"; anything unrecognized is treated as system
    pub fn from_provider(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("user") => LabelType::User,
            _ => LabelType::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub label_type: LabelType,
    /// Passed through to the provider, never interpreted locally
    #[serde(default)]
    pub label_list_visibility: Option<String>,
    #[serde(default)]
    pub message_list_visibility: Option<String>,
}

impl Label {
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            label_type: LabelType::User,
            label_list_visibility: None,
            message_list_visibility: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.label_type == LabelType::User
    }
}

/// Request body for creating a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLabel {
    pub name: String,
    pub label_list_visibility: String,
    pub message_list_visibility: String,
}

/// Parse email header in "Name <email@example.com>" format
pub(crate) fn parse_email_header(header: &str) -> Option<(String, String)> {
    let start = header.find('<')?;
    let end = header[start..].find('>')? + start;
    let name = header[..start].trim().trim_matches('"').to_string();
    let email = header[start + 1..end].trim().to_string();
    Some((name, email))
}

/// Parse an RFC 2822 date, falling back to RFC 3339
pub(crate) fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
