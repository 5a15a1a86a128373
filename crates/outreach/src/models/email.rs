//! Email record model for generated outreach emails

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::timestamp;

/// Backend identifier of a generated email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(pub i64);

impl EmailId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for EmailId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an email in the outreach cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Outreach,
    Followup,
    Lastchance,
}

impl Stage {
    /// All stages in cadence order
    pub const ALL: [Stage; 3] = [Stage::Outreach, Stage::Followup, Stage::Lastchance];

    /// Wire name used in paths and form fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Outreach => "outreach",
            Stage::Followup => "followup",
            Stage::Lastchance => "lastchance",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Outreach => "Initial Outreach",
            Stage::Followup => "Follow Up",
            Stage::Lastchance => "Last Chance",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stage name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}' (expected outreach, followup or lastchance)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outreach" => Ok(Stage::Outreach),
            "followup" | "follow-up" => Ok(Stage::Followup),
            "lastchance" | "last-chance" => Ok(Stage::Lastchance),
            _ => Err(UnknownStage(s.to_string())),
        }
    }
}

/// Send status of an email.
///
/// The backend owns the status vocabulary; statuses this client does not
/// know are kept verbatim in [`EmailStatus::Other`] so they round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmailStatus {
    Draft,
    OutreachSent,
    FollowupDue,
    LastchanceDue,
    SentByFriend,
    Sent,
    Completed,
    Other(String),
}

impl EmailStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EmailStatus::Draft => "draft",
            EmailStatus::OutreachSent => "outreach_sent",
            EmailStatus::FollowupDue => "followup_due",
            EmailStatus::LastchanceDue => "lastchance_due",
            EmailStatus::SentByFriend => "sent by friend",
            EmailStatus::Sent => "sent",
            EmailStatus::Completed => "completed",
            EmailStatus::Other(s) => s,
        }
    }

    /// Sort rank within a stage list: sent first, then drafts, then
    /// emails already sent by a friend, then everything else.
    pub fn rank(&self) -> u8 {
        match self {
            EmailStatus::OutreachSent => 0,
            EmailStatus::Draft => 1,
            EmailStatus::SentByFriend => 2,
            _ => 3,
        }
    }
}

impl From<String> for EmailStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "draft" => EmailStatus::Draft,
            "outreach_sent" => EmailStatus::OutreachSent,
            "followup_due" => EmailStatus::FollowupDue,
            "lastchance_due" => EmailStatus::LastchanceDue,
            "sent by friend" => EmailStatus::SentByFriend,
            "sent" => EmailStatus::Sent,
            "completed" => EmailStatus::Completed,
            _ => EmailStatus::Other(s),
        }
    }
}

impl From<&str> for EmailStatus {
    fn from(s: &str) -> Self {
        EmailStatus::from(s.to_string())
    }
}

impl From<EmailStatus> for String {
    fn from(status: EmailStatus) -> Self {
        match status {
            EmailStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated email as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: EmailId,
    /// Recipient address
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub status: EmailStatus,
    pub stage: Stage,
    /// When the follow-up for this email becomes due
    #[serde(default, with = "timestamp::option")]
    pub followup_due_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub lastchance_due_at: Option<DateTime<Utc>>,
    /// Friend whose shared cache marked this email as already sent
    #[serde(default)]
    pub shared_by: Option<String>,
}

impl EmailRecord {
    /// Create a draft record (mostly useful for tests and fakes)
    pub fn new(id: impl Into<EmailId>, to: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: id.into(),
            to: to.into(),
            subject: String::new(),
            body: String::new(),
            status: EmailStatus::Draft,
            stage,
            followup_due_at: None,
            lastchance_due_at: None,
            shared_by: None,
        }
    }

    pub fn with_status(mut self, status: EmailStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_followup_due_at(mut self, due: DateTime<Utc>) -> Self {
        self.followup_due_at = Some(due);
        self
    }

    /// A sent outreach email with a due date shows up as a pending follow-up
    pub fn is_pending_followup(&self) -> bool {
        self.status == EmailStatus::OutreachSent && self.followup_due_at.is_some()
    }
}
