//! Minimal plain-text message composition

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::error::{MailError, Result};

/// A new plain-text message waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// All three fields are required; header fields must be single-line
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("to", &self.to), ("subject", &self.subject), ("body", &self.body)] {
            if value.trim().is_empty() {
                return Err(MailError::ValidationError(format!(
                    "Please fill in the '{}' field.",
                    field
                )));
            }
        }

        for (field, value) in [("to", &self.to), ("subject", &self.subject)] {
            if value.contains(|c: char| c == '\r' || c == '\n') {
                return Err(MailError::ValidationError(format!(
                    "The '{}' field cannot contain line breaks.",
                    field
                )));
            }
        }

        Ok(())
    }

    pub fn to_rfc2822(&self) -> String {
        format!(
            "Content-Type: text/plain; charset=\"UTF-8\"\nMIME-Version: 1.0\nTo: {}\nSubject: {}\n\n{}",
            self.to, self.subject, self.body
        )
    }

    /// Validate, render and base64url-encode for the provider's `raw` field
    pub fn encode_raw(&self) -> Result<String> {
        self.validate()?;
        Ok(base64url(self.to_rfc2822().as_bytes()))
    }
}

/// Base64 with `-` and `_` in place of `+` and `/`, no padding
pub fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
