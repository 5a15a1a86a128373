//! Error types for client operations
//!
//! Failures fall into three families: local validation (no request was
//! made), no response (timeout or network down), and server rejection (a
//! response arrived with a non-success status).

use std::time::Duration;

use crate::models::Stage;

/// Result alias used across the client
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Input rejected locally, before any request is issued
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter your email address")]
    EmptyEmail,

    #[error("Please enter the 6-digit code")]
    MalformedCode,

    #[error("You cannot send a friend request to yourself")]
    SelfFriendRequest,

    #[error("You are already friends with this user")]
    AlreadyFriends,

    #[error("You already have a pending friend request with this user")]
    PendingFriendRequest,

    #[error("No friend with id {0}")]
    UnknownFriend(i64),

    #[error("No email with id {0}")]
    UnknownEmail(i64),

    #[error("Gmail not connected. Please connect your Gmail account in Settings first.")]
    GmailNotConnected,

    #[error("Please select a CSV file.")]
    MissingContactFile,

    #[error("Please select a template.")]
    MissingTemplate,

    #[error("Name and content are required")]
    TemplateIncomplete,

    #[error("Maximum of {limit} templates allowed per category. You already have {limit} templates in the '{category}' category.")]
    TemplateLimitReached { category: Stage, limit: usize },

    #[error("No {0} emails to export.")]
    NothingToExport(Stage),

    #[error("Email content too long for mailto link ({0} characters)")]
    MailtoTooLong(usize),

    #[error("{field} must be between {min} and {max} days (got {value})")]
    IntervalOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("Authentication required")]
    NotAuthenticated,
}

/// Errors produced by client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("no response from server: {0}")]
    Transport(String),

    #[error("server rejected request with status {status}{}", .detail.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    Rejected { status: u16, detail: Option<String> },

    #[error("failed to decode server response: {0}")]
    Decode(String),

    #[error("refusing non-HTTPS URL: {0}")]
    InsecureUrl(String),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// True when no response was received at all
    pub fn is_no_response(&self) -> bool {
        matches!(self, ClientError::Timeout(_) | ClientError::Transport(_))
    }

    /// True when the server explicitly refused the credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Rejected { status: 401, .. })
    }

    /// The structured `detail` message of a server rejection, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Text suitable for a banner.
    ///
    /// Server rejections show the backend's detail when present and
    /// `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Validation(v) => v.to_string(),
            ClientError::Timeout(_) => "Request timed out. Please try again.".to_string(),
            ClientError::Transport(_) => {
                "No response from server. Please check your connection.".to_string()
            }
            ClientError::Rejected {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            ClientError::Rejected { .. } | ClientError::Decode(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ClientError {
    fn from(e: anyhow::Error) -> Self {
        ClientError::Storage(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_detail() {
        let err = ClientError::Rejected {
            status: 400,
            detail: Some("Invalid or expired code".to_string()),
        };
        assert_eq!(err.user_message("fallback"), "Invalid or expired code");
        assert_eq!(err.detail(), Some("Invalid or expired code"));
    }

    #[test]
    fn test_user_message_falls_back_without_detail() {
        let err = ClientError::Rejected {
            status: 500,
            detail: None,
        };
        assert_eq!(err.user_message("Server error occurred."), "Server error occurred.");
        assert_eq!(err.to_string(), "server rejected request with status 500");
    }

    #[test]
    fn test_no_response_is_distinct_from_rejection() {
        let timeout = ClientError::Timeout(Duration::from_secs(30));
        assert!(timeout.is_no_response());
        assert!(timeout.user_message("x").contains("timed out"));

        let down = ClientError::Transport("connection refused".to_string());
        assert!(down.is_no_response());
        assert!(down.user_message("x").contains("No response"));

        let rejected = ClientError::Rejected {
            status: 401,
            detail: None,
        };
        assert!(!rejected.is_no_response());
        assert!(rejected.is_unauthorized());
    }

    #[test]
    fn test_validation_message() {
        let err = ClientError::from(ValidationError::TemplateLimitReached {
            category: Stage::Followup,
            limit: 3,
        });
        assert!(err.user_message("x").contains("'followup'"));
    }
}
