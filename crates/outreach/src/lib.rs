//! Outreach crate - Client logic for the personalized outreach service
//!
//! This crate provides everything a front end needs to drive the service:
//! - Domain models (EmailRecord, Template, Friend, UserProfile)
//! - The backend API behind a trait, over HTTPS or in memory
//! - Session management with a persisted identity
//! - Stage views of generated emails, kept in sync by an in-process broadcast
//! - Gmail connection, friends and sharing, templates, settings
//!
//! All calls are blocking and the crate has no UI dependencies.

pub mod backend;
pub mod banner;
pub mod code_input;
pub mod config;
pub mod confirm;
pub mod error;
pub mod events;
pub mod export;
pub mod friends;
pub mod generate;
pub mod identity;
pub mod models;
pub mod oauth;
pub mod session;
pub mod settings;
pub mod stages;
pub mod templates;

pub use backend::{
    Backend, Bearer, CacheInfo, Failure, GenerateRequest, GenerateResponse, GeneratedEmail,
    GenerationMethod, HttpBackend, InMemoryBackend, SenderDetails,
};
pub use banner::{Banner, BannerKind, BannerMessage};
pub use code_input::{CODE_LENGTH, CodeInput, is_valid_code};
pub use config::{ApiBaseUrl, ClientConfig, PollSettings};
pub use confirm::{AlwaysConfirm, Confirm, NeverConfirm, Outcome};
pub use error::{ClientError, Result, ValidationError};
pub use events::{EmailBus, EmailsUpdated, Subscription};
pub use export::{MAX_MAILTO_LENGTH, export_file_name, export_stage, mailto_link};
pub use friends::FriendPanel;
pub use generate::{ContactFile, GenerateOptions, build_request};
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use models::{
    EmailId, EmailRecord, EmailStatus, Friend, FriendId, FriendRequest, ProfilePatch,
    ProfileUpdate, RequestDecision, Stage, Template, TemplateDraft, TemplateId,
    TemplatesByCategory, UserProfile,
};
pub use oauth::{ConnectState, GmailConnect, SystemOpener, UrlOpener};
pub use session::{AuthStep, Session};
pub use settings::{ProfileForm, SettingsPanel, validate_intervals};
pub use stages::{ActionKind, LastAction, StageBoard, StageView, reconcile};
pub use templates::{MAX_TEMPLATES_PER_CATEGORY, StageTemplates, TemplateManager, render_preview};
