//! Gmail Mailbox Mirror
//!
//! An in-memory mirror of a Gmail mailbox with optimistic, revertible message
//! mutations and folder-like views derived from the flat label set.
//!
//! # Overview
//!
//! - **Mailbox Mirror**: bounded snapshot of message metadata, refreshed wholesale
//! - **Label Catalog**: user-created labels with remote create/rename/delete
//! - **View Filter**: Inbox/Sent/Starred/Archive/Trash/Spam tabs, search and label filter
//! - **Mutation Dispatcher**: star, add label, archive, delete and send
//!
//! The OAuth handshake happens elsewhere; this crate starts from a bearer token.
//!
//! # Example Usage
//!
//! ```no_run
//! use mail_mirror::{AccessToken, Config, Session, Tab, ViewSelection};
//!
//! #[tokio::main]
//! async fn main() -> mail_mirror::Result<()> {
//!     let config = Config::load("mail-mirror.toml".as_ref()).await?;
//!     let token = AccessToken::new(std::env::var("GMAIL_TOKEN").unwrap_or_default())?;
//!
//!     let session = Session::connect(&token, config)?;
//!     session.refresh().await?;
//!
//!     for message in session.visible(&ViewSelection::new(Tab::Inbox)).await {
//!         println!("{} | {}", message.from, message.subject);
//!     }
//!
//!     if let Some(first) = session.messages().await.first() {
//!         session.dispatcher().star(&first.id).await?;
//!     }
//!
//!     session.sign_out();
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Access token and Gmail hub construction
//! - [`catalog`] - Label catalog and label CRUD
//! - [`client`] - Gmail API client trait and production implementation
//! - [`compose`] - Plain-text message composition and encoding
//! - [`config`] - Configuration management
//! - [`dispatcher`] - Optimistic message mutations
//! - [`error`] - Error types and result aliases
//! - [`mirror`] - Mailbox mirror and refresh
//! - [`models`] - Core data structures
//! - [`session`] - Session context and latest-error slot
//! - [`view`] - Tabs and visible-message filtering

pub mod auth;
pub mod catalog;
pub mod client;
pub mod compose;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mirror;
pub mod models;
pub mod session;
pub mod view;

// Re-export commonly used types for convenience
pub use error::{MailError, RemoteOperation, Result};

// Core data models
pub use models::{system_labels, Label, LabelType, Message, NewLabel};

pub use auth::AccessToken;
pub use config::{ApiConfig, Config, LabelConfig, MailboxConfig};

// Client traits
pub use client::{GmailClient, ProductionGmailClient};

pub use catalog::{LabelCatalog, LabelManager};
pub use compose::OutgoingMessage;
pub use dispatcher::MutationDispatcher;
pub use mirror::{LabelDelta, Mirror};
pub use session::{Session, SessionError};
pub use view::{visible, Tab, ViewSelection};
