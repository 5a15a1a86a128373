//! Friend and friend-request models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::timestamp;

/// User id of a friend (or of the sender of a friend request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FriendId(pub i64);

impl FriendId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for FriendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An accepted friend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: FriendId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Whether contact caches are shared with this friend
    #[serde(default)]
    pub combine_contacts: bool,
}

/// A pending friend request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: FriendId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Answer to a pending friend request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDecision {
    Accepted,
    Rejected,
}

impl RequestDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestDecision::Accepted => "accepted",
            RequestDecision::Rejected => "rejected",
        }
    }
}

/// Case-insensitive email comparison
pub(crate) fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
