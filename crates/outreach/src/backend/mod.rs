//! Backend API access
//!
//! This module provides:
//! - The [`Backend`] trait describing every endpoint the client consumes
//! - An HTTPS implementation over `ureq` ([`HttpBackend`])
//! - An in-memory fake with the same observable behavior ([`InMemoryBackend`])
//! - Request/response payload types

mod http;
mod memory;
mod multipart;
mod traits;

pub use http::HttpBackend;
pub use memory::{Failure, InMemoryBackend};
pub use multipart::MultipartForm;
pub use traits::Backend;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{EmailRecord, Stage, TemplateId, UserProfile};

/// Credential attached to authenticated requests.
///
/// The backend identifies callers by their email address, so the bearer
/// value is the signed-in email itself. Values are only handed out by an
/// authenticated [`Session`](crate::Session).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bearer(String);

impl Bearer {
    pub(crate) fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    /// Email address this credential identifies
    pub fn email(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Bearer").field(&"<redacted>").finish()
    }
}

/// How emails are produced from the contact list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMethod {
    /// Let the backend write each email with AI
    Ai,
    /// Fill in a stored template
    Template(TemplateId),
}

/// Sender details copied from the profile into the generation form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderDetails {
    pub your_name: Option<String>,
    pub your_position: Option<String>,
    pub company_name: Option<String>,
    pub your_contact: Option<String>,
}

impl SenderDetails {
    pub fn from_profile(profile: &UserProfile) -> Self {
        fn non_empty(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }

        Self {
            your_name: non_empty(&profile.full_name),
            your_position: non_empty(&profile.position),
            company_name: non_empty(&profile.company_name),
            your_contact: Some(profile.email.clone()).filter(|e| !e.is_empty()),
        }
    }
}

/// Multipart request for the generate endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Name of the uploaded CSV file
    pub file_name: String,
    /// Raw CSV contents
    pub csv: Vec<u8>,
    pub stage: Stage,
    pub method: GenerationMethod,
    pub avoid_duplicates: bool,
    pub sender: SenderDetails,
}

impl GenerateRequest {
    /// Encode as a multipart form
    pub fn to_form(&self) -> MultipartForm {
        let mut form = MultipartForm::new();
        form.file("file", &self.file_name, "text/csv", self.csv.clone());
        form.text("use_ai", bool_field(self.method == GenerationMethod::Ai));
        form.text("stage", self.stage.as_str());
        form.text("avoid_duplicates", bool_field(self.avoid_duplicates));

        let sender = [
            ("your_name", &self.sender.your_name),
            ("your_position", &self.sender.your_position),
            ("company_name", &self.sender.company_name),
            ("your_contact", &self.sender.your_contact),
        ];
        for (name, value) in sender {
            if let Some(value) = value {
                form.text(name, value);
            }
        }

        if let GenerationMethod::Template(id) = self.method {
            form.text("template_id", id.to_string());
        }
        form
    }
}

fn bool_field(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// An email produced by the generate endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

/// Response of the generate endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub emails: Vec<GeneratedEmail>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// State of the backend's generation cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub status: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_cleared: Option<String>,
}

/// Response of sharing toggles and friend removal
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct UpdatedEmails {
    #[serde(default)]
    pub updated_emails: Vec<EmailRecord>,
}
