//! User profile model

use serde::{Deserialize, Serialize};

/// Default days between a sent outreach email and its follow-up
pub const DEFAULT_FOLLOWUP_INTERVAL_DAYS: u32 = 3;
/// Default days between a sent outreach email and the last-chance reminder
pub const DEFAULT_LASTCHANCE_INTERVAL_DAYS: u32 = 6;

fn default_followup_interval() -> u32 {
    DEFAULT_FOLLOWUP_INTERVAL_DAYS
}

fn default_lastchance_interval() -> u32 {
    DEFAULT_LASTCHANCE_INTERVAL_DAYS
}

/// Profile of the signed-in user
///
/// Only `email` is guaranteed; every other field may be missing from a
/// backend response and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_description: Option<String>,
    /// Present once the user has connected Gmail
    #[serde(default)]
    pub gmail_access_token: Option<String>,
    #[serde(default = "default_followup_interval")]
    pub followup_interval_days: u32,
    #[serde(default = "default_lastchance_interval")]
    pub lastchance_interval_days: u32,
}

impl UserProfile {
    /// Placeholder profile holding only the email, used until the full
    /// profile has been fetched
    pub fn pending(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: None,
            position: None,
            company_name: None,
            company_description: None,
            gmail_access_token: None,
            followup_interval_days: DEFAULT_FOLLOWUP_INTERVAL_DAYS,
            lastchance_interval_days: DEFAULT_LASTCHANCE_INTERVAL_DAYS,
        }
    }

    /// Whether a Gmail access token is present and non-empty
    pub fn has_gmail(&self) -> bool {
        self.gmail_access_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Merge the fields present in an update response.
    ///
    /// Fields absent from the patch keep their current value. The email
    /// identifies the session and is never replaced.
    pub fn merge(&mut self, patch: &ProfilePatch) {
        if let Some(v) = &patch.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(v) = &patch.position {
            self.position = Some(v.clone());
        }
        if let Some(v) = &patch.company_name {
            self.company_name = Some(v.clone());
        }
        if let Some(v) = &patch.company_description {
            self.company_description = Some(v.clone());
        }
        if let Some(v) = &patch.gmail_access_token {
            self.gmail_access_token = Some(v.clone());
        }
        if let Some(v) = patch.followup_interval_days {
            self.followup_interval_days = v;
        }
        if let Some(v) = patch.lastchance_interval_days {
            self.lastchance_interval_days = v;
        }
    }
}

/// Authoritative profile fields echoed back by a settings update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_description: Option<String>,
    #[serde(default)]
    pub gmail_access_token: Option<String>,
    #[serde(default)]
    pub followup_interval_days: Option<u32>,
    #[serde(default)]
    pub lastchance_interval_days: Option<u32>,
}

/// Changed profile fields sent to the settings endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_description: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.position.is_none()
            && self.company_name.is_none()
            && self.company_description.is_none()
    }
}
