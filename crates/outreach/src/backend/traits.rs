//! Backend trait definition

use super::{Bearer, CacheInfo, GenerateRequest, GenerateResponse};
use crate::error::Result;
use crate::models::{
    EmailId, EmailRecord, EmailStatus, Friend, FriendId, FriendRequest, ProfilePatch,
    ProfileUpdate, RequestDecision, Stage, Template, TemplateDraft, TemplateId,
    TemplatesByCategory, UserProfile,
};

/// Trait for the remote outreach backend
///
/// This trait abstracts over the HTTPS client and the in-memory fake.
/// Every call is a single request/response; implementations never retry.
pub trait Backend: Send + Sync {
    // === Authentication ===

    /// Ask the backend to email a one-time code
    fn request_code(&self, email: &str) -> Result<()>;

    /// Exchange a one-time code for the user's profile
    fn verify_code(&self, email: &str, code: &str) -> Result<UserProfile>;

    // === Profile ===

    /// Fetch the full profile of the caller
    fn fetch_profile(&self, bearer: &Bearer) -> Result<UserProfile>;

    /// Update changed profile fields; returns the authoritative fields
    fn update_settings(&self, bearer: &Bearer, update: &ProfileUpdate) -> Result<ProfilePatch>;

    /// Update follow-up and last-chance delays (days)
    fn update_intervals(&self, bearer: &Bearer, followup_days: u32, lastchance_days: u32)
    -> Result<()>;

    // === Emails ===

    /// List the emails the backend files under a stage
    fn emails_by_stage(&self, bearer: &Bearer, stage: Stage) -> Result<Vec<EmailRecord>>;

    fn update_email_status(&self, bearer: &Bearer, id: EmailId, status: &EmailStatus)
    -> Result<()>;

    fn delete_email(&self, bearer: &Bearer, id: EmailId) -> Result<()>;

    /// Generate emails from an uploaded contact list
    fn generate_emails(&self, bearer: &Bearer, request: &GenerateRequest)
    -> Result<GenerateResponse>;

    /// Send an email through the user's connected Gmail account
    fn send_via_gmail(&self, bearer: &Bearer, id: EmailId) -> Result<()>;

    /// Authorization URL that starts the Gmail OAuth flow
    fn gmail_auth_url(&self, bearer: &Bearer) -> Result<String>;

    fn cache_info(&self, bearer: &Bearer) -> Result<CacheInfo>;

    fn clear_cache(&self, bearer: &Bearer) -> Result<()>;

    // === Templates ===

    /// Templates of one stage
    fn templates(&self, bearer: &Bearer, category: Stage) -> Result<Vec<Template>>;

    /// All templates grouped by stage
    fn templates_by_category(&self, bearer: &Bearer) -> Result<TemplatesByCategory>;

    fn default_template(&self, bearer: &Bearer, category: Stage) -> Result<Option<Template>>;

    fn create_template(&self, bearer: &Bearer, draft: &TemplateDraft) -> Result<Template>;

    fn update_template(&self, bearer: &Bearer, id: TemplateId, draft: &TemplateDraft)
    -> Result<Template>;

    fn set_default_template(&self, bearer: &Bearer, id: TemplateId) -> Result<Template>;

    fn delete_template(&self, bearer: &Bearer, id: TemplateId) -> Result<()>;

    // === Friends ===

    fn friends(&self, bearer: &Bearer) -> Result<Vec<Friend>>;

    /// Pending requests addressed to the caller
    fn friend_requests(&self, bearer: &Bearer) -> Result<Vec<FriendRequest>>;

    fn send_friend_request(&self, bearer: &Bearer, email: &str) -> Result<()>;

    fn respond_to_friend_request(
        &self,
        bearer: &Bearer,
        request_id: FriendId,
        decision: RequestDecision,
    ) -> Result<()>;

    /// Enable or disable contact sharing; returns emails changed as a side effect
    fn set_sharing(&self, bearer: &Bearer, friend_id: FriendId, enabled: bool)
    -> Result<Vec<EmailRecord>>;

    /// Remove a friend; returns emails changed as a side effect
    fn remove_friend(&self, bearer: &Bearer, friend_id: FriendId) -> Result<Vec<EmailRecord>>;
}
