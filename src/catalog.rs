//! Label catalog: the cached set of user-created labels and its remote CRUD
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{MailError, RemoteOperation, Result};
use crate::models::{Label, LabelType, NewLabel};
use crate::session::Session;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trim and collapse internal whitespace; an empty result is rejected
pub fn normalize_label_name(name: &str) -> Result<String> {
    let normalized = WHITESPACE_RUN.replace_all(name.trim(), " ").to_string();
    if normalized.is_empty() {
        return Err(MailError::ValidationError(
            "Label name cannot be empty".to_string(),
        ));
    }
    Ok(normalized)
}

/// User labels in provider order; system labels are never stored here
#[derive(Debug, Clone, Default)]
pub struct LabelCatalog {
    labels: Vec<Label>,
}

impl LabelCatalog {
    /// Keep only user-created labels from a full provider listing
    pub fn from_remote(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            labels: labels.into_iter().filter(Label::is_user).collect(),
        }
    }

    pub fn all(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Label> {
        self.labels
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| MailError::LabelNotFound(id.to_string()))
    }

    /// Case-insensitive name lookup
    pub fn find_by_name(&self, name: &str) -> Option<&Label> {
        let wanted = name.trim().to_lowercase();
        self.labels.iter().find(|l| l.name.to_lowercase() == wanted)
    }

    /// Append, or overwrite an entry with the same id
    pub fn insert(&mut self, label: Label) {
        match self.labels.iter_mut().find(|l| l.id == label.id) {
            Some(existing) => *existing = label,
            None => self.labels.push(label),
        }
    }

    /// Overwrite the entry with `label.id`, keeping its position
    pub fn replace(&mut self, label: Label) -> Result<()> {
        let existing = self
            .labels
            .iter_mut()
            .find(|l| l.id == label.id)
            .ok_or_else(|| MailError::LabelNotFound(label.id.clone()))?;
        *existing = label;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Label> {
        let position = self.labels.iter().position(|l| l.id == id)?;
        Some(self.labels.remove(position))
    }
}

/// Remote label CRUD that commits to the session's catalog on success only
pub struct LabelManager<'a> {
    session: &'a Session,
}

impl<'a> LabelManager<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Replace the catalog with the provider's user labels
    pub async fn refresh(&self) -> Result<usize> {
        self.session.report(self.load().await).await
    }

    pub(crate) async fn load(&self) -> Result<usize> {
        let labels = self
            .session
            .client
            .list_labels()
            .await
            .map_err(|e| MailError::remote(RemoteOperation::FetchLabels, e))?;

        let total = labels.len();
        let catalog = LabelCatalog::from_remote(labels);
        let count = catalog.len();
        *self.session.catalog.write().await = catalog;

        info!("Loaded {} user labels ({} total)", count, total);
        Ok(count)
    }

    /// Create a label with the configured visibility flags
    pub async fn create(&self, name: &str) -> Result<Label> {
        self.session.report(self.create_inner(name).await).await
    }

    async fn create_inner(&self, name: &str) -> Result<Label> {
        let name = normalize_label_name(name)?;
        let visibility = &self.session.config.labels;
        let request = NewLabel {
            name: name.clone(),
            label_list_visibility: visibility.label_list_visibility.clone(),
            message_list_visibility: visibility.message_list_visibility.clone(),
        };

        info!("Creating label: {}", name);
        let mut created = self
            .session
            .client
            .create_label(&request)
            .await
            .map_err(|e| MailError::remote(RemoteOperation::CreateLabel, e))?;
        // Only user labels can be created
        created.label_type = LabelType::User;

        self.session.catalog.write().await.insert(created.clone());
        info!(
            "Successfully created label '{}' with ID: {}",
            created.name, created.id
        );
        Ok(created)
    }

    /// Rename a catalog label; the provider's returned form replaces the entry
    pub async fn rename(&self, label_id: &str, new_name: &str) -> Result<Label> {
        self.session
            .report(self.rename_inner(label_id, new_name).await)
            .await
    }

    async fn rename_inner(&self, label_id: &str, new_name: &str) -> Result<Label> {
        let name = normalize_label_name(new_name)?;
        let previous = self.session.catalog.read().await.get(label_id)?.name.clone();

        debug!("Renaming label {} from '{}' to '{}'", label_id, previous, name);
        let mut updated = self
            .session
            .client
            .rename_label(label_id, &name)
            .await
            .map_err(|e| MailError::remote(RemoteOperation::UpdateLabel, e))?;
        updated.label_type = LabelType::User;

        let mut catalog = self.session.catalog.write().await;
        if catalog.replace(updated.clone()).is_err() {
            // Dropped by a concurrent refresh; the provider still has it
            catalog.insert(updated.clone());
        }
        info!("Renamed label {} to '{}'", updated.id, updated.name);
        Ok(updated)
    }

    /// Delete a label; optionally strips it from every cached message
    pub async fn delete(&self, label_id: &str) -> Result<()> {
        self.session.report(self.delete_inner(label_id).await).await
    }

    async fn delete_inner(&self, label_id: &str) -> Result<()> {
        if label_id.trim().is_empty() {
            return Err(MailError::ValidationError(
                "Label id cannot be empty".to_string(),
            ));
        }

        self.session
            .client
            .delete_label(label_id)
            .await
            .map_err(|e| MailError::remote(RemoteOperation::DeleteLabel, e))?;

        let removed = self.session.catalog.write().await.remove(label_id);
        info!(
            "Deleted label {} ({})",
            label_id,
            removed.map(|l| l.name).unwrap_or_default()
        );

        if self.session.config.labels.cascade_delete {
            let stripped = self.session.mirror.write().await.strip_label(label_id);
            debug!("Stripped label {} from {} cached messages", label_id, stripped);
        }
        Ok(())
    }
}
