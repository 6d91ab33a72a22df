//! Folder-like views derived from the flat label set

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MailError;
use crate::mirror::Mirror;
use crate::models::system_labels::{INBOX, SENT, SPAM, TRASH};
use crate::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tab {
    #[default]
    Inbox,
    Sent,
    Starred,
    Archive,
    Trash,
    Spam,
}

impl Tab {
    /// Drawer order
    pub const ALL: [Tab; 6] = [
        Tab::Inbox,
        Tab::Sent,
        Tab::Starred,
        Tab::Archive,
        Tab::Trash,
        Tab::Spam,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tab::Inbox => "Inbox",
            Tab::Sent => "Sent",
            Tab::Starred => "Starred",
            Tab::Archive => "Archive",
            Tab::Trash => "Trash",
            Tab::Spam => "Spam",
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Tab::Inbox => message.has_label(INBOX),
            Tab::Sent => message.has_label(SENT),
            Tab::Starred => message.starred(),
            // Fallen off every primary system label
            Tab::Archive => [INBOX, SENT, TRASH, SPAM]
                .iter()
                .all(|label| !message.has_label(label)),
            Tab::Trash => message.has_label(TRASH),
            Tab::Spam => message.has_label(SPAM),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tab {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tab::ALL
            .into_iter()
            .find(|tab| tab.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MailError::ValidationError(format!("Unknown tab: '{}'", s)))
    }
}

/// Ephemeral view state: tab, search text and an optional label filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSelection {
    pub tab: Tab,
    pub search: String,
    pub label_filter: Option<String>,
}

impl ViewSelection {
    pub fn new(tab: Tab) -> Self {
        Self {
            tab,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search = query.into();
        self
    }

    pub fn with_label_filter(mut self, label_id: impl Into<String>) -> Self {
        self.label_filter = Some(label_id.into());
        self
    }

    pub fn without_label_filter(mut self) -> Self {
        self.label_filter = None;
        self
    }
}

/// Messages visible under `selection`, in mirror order
///
/// The tab predicate runs first, then the case-insensitive substring search
/// over `from` and `subject`, then the label filter. Nothing is re-sorted.
pub fn visible<'a>(mirror: &'a Mirror, selection: &ViewSelection) -> Vec<&'a Message> {
    let query = selection.search.trim().to_lowercase();

    mirror
        .all()
        .iter()
        .filter(|m| selection.tab.matches(m))
        .filter(|m| query.is_empty() || matches_search(m, &query))
        .filter(|m| match &selection.label_filter {
            Some(label_id) => m.has_label(label_id),
            None => true,
        })
        .collect()
}

fn matches_search(message: &Message, lowered_query: &str) -> bool {
    message.from.to_lowercase().contains(lowered_query)
        || message.subject.to_lowercase().contains(lowered_query)
}
