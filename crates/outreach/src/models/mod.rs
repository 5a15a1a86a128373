//! Domain models for outreach entities

mod email;
mod friend;
mod profile;
mod template;
pub mod timestamp;

pub use email::{EmailId, EmailRecord, EmailStatus, Stage, UnknownStage};
pub(crate) use friend::same_email;
pub use friend::{Friend, FriendId, FriendRequest, RequestDecision};
pub use profile::{
    DEFAULT_FOLLOWUP_INTERVAL_DAYS, DEFAULT_LASTCHANCE_INTERVAL_DAYS, ProfilePatch,
    ProfileUpdate, UserProfile,
};
pub use template::{Template, TemplateDraft, TemplateId, TemplatesByCategory};
