//! In-memory backend implementation
//!
//! Behaves like the remote service for the endpoints the client uses,
//! keeps a log of every call, and can be told to fail the next call to an
//! endpoint. Used by tests and for offline runs of the CLI.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use super::{
    Backend, Bearer, CacheInfo, GenerateRequest, GenerateResponse, GeneratedEmail,
    GenerationMethod,
};
use crate::error::{ClientError, Result};
use crate::models::{
    EmailId, EmailRecord, EmailStatus, Friend, FriendId, FriendRequest, ProfilePatch,
    ProfileUpdate, RequestDecision, Stage, Template, TemplateDraft, TemplateId,
    TemplatesByCategory, UserProfile, same_email,
};

/// Templates allowed per category by the service
const TEMPLATE_LIMIT: usize = 3;

/// A failure to inject into the next call of an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No response before the deadline
    Timeout,
    /// Network-level failure
    Transport,
    /// Non-success status with an optional `detail`
    Rejected(u16, Option<String>),
}

impl Failure {
    fn into_error(self) -> ClientError {
        match self {
            Failure::Timeout => ClientError::Timeout(Duration::from_secs(30)),
            Failure::Transport => ClientError::Transport("connection refused".to_string()),
            Failure::Rejected(status, detail) => ClientError::Rejected { status, detail },
        }
    }
}

#[derive(Default)]
struct Account {
    profile: Option<UserProfile>,
    user_id: i64,
    emails: Vec<EmailRecord>,
    templates: Vec<Template>,
    friends: Vec<Friend>,
    /// Recipients known to each friend's contact cache
    friend_contacts: HashMap<FriendId, Vec<String>>,
    requests: Vec<FriendRequest>,
    outgoing: Vec<String>,
    /// Gmail becomes connected after this many more profile fetches
    gmail_after_fetches: Option<usize>,
    sent_via_gmail: Vec<EmailId>,
    cache_size: u64,
    cache_last_cleared: Option<String>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    codes: HashMap<String, String>,
    next_code: Option<String>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn account_mut(&mut self, email: &str) -> &mut Account {
        let key = email.trim().to_ascii_lowercase();
        if !self.accounts.contains_key(&key) {
            let user_id = self.next_id();
            self.accounts.insert(
                key.clone(),
                Account {
                    user_id,
                    ..Account::default()
                },
            );
        }
        // Inserted above when missing
        self.accounts.entry(key).or_default()
    }

    /// Resolve the caller; unknown bearers are rejected like the real service
    fn caller(&mut self, bearer: &Bearer) -> Result<&mut Account> {
        self.accounts
            .get_mut(&bearer.email().trim().to_ascii_lowercase())
            .filter(|account| account.profile.is_some())
            .ok_or_else(|| ClientError::Rejected {
                status: 401,
                detail: Some("Unauthorized - Missing credentials".to_string()),
            })
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::Rejected {
        status: 404,
        detail: Some(format!("{} not found", what)),
    }
}

fn bad_request(detail: &str) -> ClientError {
    ClientError::Rejected {
        status: 400,
        detail: Some(detail.to_string()),
    }
}

/// In-memory implementation of [`Backend`]
///
/// Seed it with users, emails, templates and friends, then drive the
/// client components against it.
pub struct InMemoryBackend {
    state: RwLock<State>,
    calls: RwLock<Vec<String>>,
    failures: RwLock<HashMap<String, VecDeque<Failure>>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            calls: RwLock::new(Vec::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    fn state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and apply any injected failure
    fn enter(&self, endpoint: &str) -> Result<()> {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(endpoint.to_string());

        let failure = self
            .failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    // === Seeding ===

    /// Register a verified user
    pub fn add_user(&self, profile: UserProfile) {
        let email = profile.email.clone();
        self.state().account_mut(&email).profile = Some(profile);
    }

    /// Code handed out by the next `request_code` call
    pub fn set_next_code(&self, code: &str) {
        self.state().next_code = Some(code.to_string());
    }

    /// Most recent code issued to an email
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.state()
            .codes
            .get(&email.trim().to_ascii_lowercase())
            .cloned()
    }

    pub fn add_email(&self, owner: &str, record: EmailRecord) {
        let mut state = self.state();
        state.next_id = state.next_id.max(record.id.as_i64());
        state.account_mut(owner).emails.push(record);
    }

    pub fn add_template(&self, owner: &str, template: Template) {
        let mut state = self.state();
        state.next_id = state.next_id.max(template.id.0);
        state.account_mut(owner).templates.push(template);
    }

    /// Add a friend whose contact cache holds `contacts`
    pub fn add_friend(&self, owner: &str, friend: Friend, contacts: &[&str]) {
        let mut state = self.state();
        state.next_id = state.next_id.max(friend.id.0);
        let account = state.account_mut(owner);
        account.friend_contacts.insert(
            friend.id,
            contacts.iter().map(|c| c.to_string()).collect(),
        );
        account.friends.push(friend);
    }

    /// Add a pending request addressed to `owner`
    pub fn add_friend_request(&self, owner: &str, request: FriendRequest) {
        let mut state = self.state();
        state.next_id = state.next_id.max(request.id.0);
        state.account_mut(owner).requests.push(request);
    }

    /// Connect Gmail for `email` once its profile has been fetched `fetches` more times
    pub fn grant_gmail_after_fetches(&self, email: &str, fetches: usize) {
        self.state().account_mut(email).gmail_after_fetches = Some(fetches);
    }

    /// Set the generation cache size reported for `email`
    pub fn set_cache_size(&self, email: &str, size: u64) {
        self.state().account_mut(email).cache_size = size;
    }

    // === Inspection ===

    /// Emails currently stored for `owner`
    pub fn emails_of(&self, owner: &str) -> Vec<EmailRecord> {
        self.state().account_mut(owner).emails.clone()
    }

    pub fn templates_of(&self, owner: &str) -> Vec<Template> {
        self.state().account_mut(owner).templates.clone()
    }

    pub fn friends_of(&self, owner: &str) -> Vec<Friend> {
        self.state().account_mut(owner).friends.clone()
    }

    pub fn profile_of(&self, email: &str) -> Option<UserProfile> {
        self.state().account_mut(email).profile.clone()
    }

    /// Recipients of friend requests sent by `owner`
    pub fn outgoing_requests_of(&self, owner: &str) -> Vec<String> {
        self.state().account_mut(owner).outgoing.clone()
    }

    /// Emails sent through Gmail by `owner`
    pub fn sent_via_gmail_of(&self, owner: &str) -> Vec<EmailId> {
        self.state().account_mut(owner).sent_via_gmail.clone()
    }

    // === Call log and failure injection ===

    /// Fail the next call to `endpoint` (the [`Backend`] method name)
    pub fn fail_next(&self, endpoint: &str, failure: Failure) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(endpoint.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Every call made so far, by method name, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.as_str() == endpoint)
            .count()
    }

    /// Forget the call log
    pub fn reset_calls(&self) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Which records the service lists under a stage
fn listed_under(record: &EmailRecord, stage: Stage) -> bool {
    match stage {
        Stage::Followup => {
            record.stage == Stage::Followup
                || record.status == EmailStatus::FollowupDue
                || record.is_pending_followup()
        }
        other => record.stage == other,
    }
}

/// Recipient addresses of a CSV upload: the `email` column, or the first column
fn csv_recipients(csv: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(csv);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let column = header
        .split(',')
        .position(|h| h.trim().eq_ignore_ascii_case("email"))
        .unwrap_or(0);

    lines
        .filter_map(|line| line.split(',').nth(column))
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .filter(|cell| cell.contains('@'))
        .collect()
}

fn apply_template_default(templates: &mut [Template], category: Stage, keep: TemplateId) {
    for template in templates.iter_mut().filter(|t| t.category == category) {
        template.is_default = template.id == keep;
    }
}

impl Backend for InMemoryBackend {
    fn request_code(&self, email: &str) -> Result<()> {
        self.enter("request_code")?;
        let key = email.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(bad_request("Email is required"));
        }

        let mut state = self.state();
        let code = state.next_code.take().unwrap_or_else(|| "123456".to_string());
        state.account_mut(&key);
        state.codes.insert(key, code);
        Ok(())
    }

    fn verify_code(&self, email: &str, code: &str) -> Result<UserProfile> {
        self.enter("verify_code")?;
        let key = email.trim().to_ascii_lowercase();
        let mut state = self.state();
        if !state.accounts.contains_key(&key) {
            return Err(not_found("User"));
        }
        if state.codes.get(&key).map(String::as_str) != Some(code) {
            return Err(bad_request("Invalid or expired verification code"));
        }
        state.codes.remove(&key);

        let account = state.account_mut(&key);
        let profile = account
            .profile
            .get_or_insert_with(|| UserProfile::pending(email.trim()))
            .clone();
        Ok(profile)
    }

    fn fetch_profile(&self, bearer: &Bearer) -> Result<UserProfile> {
        self.enter("fetch_profile")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;

        if let Some(remaining) = account.gmail_after_fetches {
            if remaining == 0 {
                account.gmail_after_fetches = None;
                if let Some(profile) = account.profile.as_mut() {
                    profile.gmail_access_token = Some("ya29.fake-token".to_string());
                }
            } else {
                account.gmail_after_fetches = Some(remaining - 1);
            }
        }

        account.profile.clone().ok_or_else(|| not_found("User"))
    }

    fn update_settings(&self, bearer: &Bearer, update: &ProfileUpdate) -> Result<ProfilePatch> {
        self.enter("update_settings")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let profile = account.profile.as_mut().ok_or_else(|| not_found("User"))?;

        let patch = ProfilePatch {
            full_name: update.full_name.clone(),
            position: update.position.clone(),
            company_name: update.company_name.clone(),
            company_description: update.company_description.clone(),
            ..ProfilePatch::default()
        };
        profile.merge(&patch);

        Ok(ProfilePatch {
            email: Some(profile.email.clone()),
            full_name: profile.full_name.clone(),
            position: profile.position.clone(),
            company_name: profile.company_name.clone(),
            company_description: profile.company_description.clone(),
            ..ProfilePatch::default()
        })
    }

    fn update_intervals(
        &self,
        bearer: &Bearer,
        followup_days: u32,
        lastchance_days: u32,
    ) -> Result<()> {
        self.enter("update_intervals")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let profile = account.profile.as_mut().ok_or_else(|| not_found("User"))?;
        profile.followup_interval_days = followup_days;
        profile.lastchance_interval_days = lastchance_days;
        Ok(())
    }

    fn emails_by_stage(&self, bearer: &Bearer, stage: Stage) -> Result<Vec<EmailRecord>> {
        self.enter("emails_by_stage")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        Ok(account
            .emails
            .iter()
            .filter(|record| listed_under(record, stage))
            .cloned()
            .collect())
    }

    fn update_email_status(
        &self,
        bearer: &Bearer,
        id: EmailId,
        status: &EmailStatus,
    ) -> Result<()> {
        self.enter("update_email_status")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let (followup_days, lastchance_days) = account
            .profile
            .as_ref()
            .map(|p| (p.followup_interval_days, p.lastchance_interval_days))
            .unwrap_or_default();

        let record = account
            .emails
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("Email"))?;

        record.status = status.clone();
        match status {
            EmailStatus::OutreachSent => {
                let now = Utc::now();
                record.followup_due_at = Some(now + ChronoDuration::days(followup_days.into()));
                record.lastchance_due_at =
                    Some(now + ChronoDuration::days(lastchance_days.into()));
            }
            EmailStatus::Draft => {
                record.followup_due_at = None;
                record.lastchance_due_at = None;
            }
            _ => {}
        }
        Ok(())
    }

    fn delete_email(&self, bearer: &Bearer, id: EmailId) -> Result<()> {
        self.enter("delete_email")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let before = account.emails.len();
        account.emails.retain(|r| r.id != id);
        if account.emails.len() == before {
            return Err(not_found("Email"));
        }
        Ok(())
    }

    fn generate_emails(
        &self,
        bearer: &Bearer,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        self.enter("generate_emails")?;
        let mut state = self.state();
        state.caller(bearer)?;

        let recipients = csv_recipients(&request.csv);
        if recipients.is_empty() {
            return Err(bad_request("No valid email addresses found in CSV"));
        }

        let template = match request.method {
            GenerationMethod::Template(id) => Some(
                state
                    .caller(bearer)?
                    .templates
                    .iter()
                    .find(|t| t.id == id)
                    .cloned()
                    .ok_or_else(|| not_found("Template"))?,
            ),
            GenerationMethod::Ai => None,
        };

        let mut generated = Vec::new();
        for to in recipients {
            let duplicate = state
                .caller(bearer)?
                .emails
                .iter()
                .any(|r| r.stage == request.stage && same_email(&r.to, &to));
            if request.avoid_duplicates && duplicate {
                continue;
            }

            let subject = format!("{} for {}", request.stage.display_name(), to);
            let content = match &template {
                Some(template) => template.content.clone(),
                None => format!("Hello {},\n\nI wanted to reach out.", to),
            };

            let id = EmailId(state.next_id());
            let account = state.caller(bearer)?;
            account.emails.push(
                EmailRecord::new(id, to.clone(), request.stage)
                    .with_subject(subject.clone())
                    .with_body(content.clone()),
            );
            account.cache_size += 1;
            generated.push(GeneratedEmail {
                to,
                subject,
                content,
            });
        }

        Ok(GenerateResponse {
            message: Some(format!("Generated {} emails", generated.len())),
            count: Some(generated.len()),
            emails: generated,
        })
    }

    fn send_via_gmail(&self, bearer: &Bearer, id: EmailId) -> Result<()> {
        self.enter("send_via_gmail")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        if !account.profile.as_ref().is_some_and(UserProfile::has_gmail) {
            return Err(bad_request("Gmail not connected"));
        }
        if !account.emails.iter().any(|r| r.id == id) {
            return Err(not_found("Email"));
        }
        account.sent_via_gmail.push(id);
        Ok(())
    }

    fn gmail_auth_url(&self, bearer: &Bearer) -> Result<String> {
        self.enter("gmail_auth_url")?;
        let mut state = self.state();
        state.caller(bearer)?;
        Ok(format!(
            "https://accounts.google.com/o/oauth2/auth?login_hint={}",
            urlencoding::encode(bearer.email())
        ))
    }

    fn cache_info(&self, bearer: &Bearer) -> Result<CacheInfo> {
        self.enter("cache_info")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        Ok(CacheInfo {
            status: "active".to_string(),
            size: account.cache_size,
            last_cleared: account.cache_last_cleared.clone(),
        })
    }

    fn clear_cache(&self, bearer: &Bearer) -> Result<()> {
        self.enter("clear_cache")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        account.cache_size = 0;
        account.cache_last_cleared = Some(Utc::now().to_rfc3339());
        Ok(())
    }

    fn templates(&self, bearer: &Bearer, category: Stage) -> Result<Vec<Template>> {
        self.enter("templates")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        Ok(account
            .templates
            .iter()
            .filter(|t| t.category == category)
            .cloned()
            .collect())
    }

    fn templates_by_category(&self, bearer: &Bearer) -> Result<TemplatesByCategory> {
        self.enter("templates_by_category")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let mut grouped = TemplatesByCategory::default();
        for template in &account.templates {
            grouped.get_mut(template.category).push(template.clone());
        }
        Ok(grouped)
    }

    fn default_template(&self, bearer: &Bearer, category: Stage) -> Result<Option<Template>> {
        self.enter("default_template")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        Ok(account
            .templates
            .iter()
            .find(|t| t.category == category && t.is_default)
            .cloned())
    }

    fn create_template(&self, bearer: &Bearer, draft: &TemplateDraft) -> Result<Template> {
        self.enter("create_template")?;
        let mut state = self.state();
        let existing = state
            .caller(bearer)?
            .templates
            .iter()
            .filter(|t| t.category == draft.category)
            .count();
        if existing >= TEMPLATE_LIMIT {
            return Err(bad_request(&format!(
                "Maximum of {} templates allowed per category",
                TEMPLATE_LIMIT
            )));
        }

        let id = TemplateId(state.next_id());
        let account = state.caller(bearer)?;
        let template = Template {
            id,
            name: draft.name.clone(),
            content: draft.content.clone(),
            category: draft.category,
            is_default: draft.is_default,
            created_at: Some(Utc::now()),
        };
        account.templates.push(template.clone());
        if template.is_default {
            apply_template_default(&mut account.templates, template.category, id);
        }
        Ok(template)
    }

    fn update_template(
        &self,
        bearer: &Bearer,
        id: TemplateId,
        draft: &TemplateDraft,
    ) -> Result<Template> {
        self.enter("update_template")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let template = account
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("Template"))?;

        template.name = draft.name.clone();
        template.content = draft.content.clone();
        template.category = draft.category;
        template.is_default = draft.is_default;
        let updated = template.clone();

        if updated.is_default {
            apply_template_default(&mut account.templates, updated.category, id);
        }
        Ok(updated)
    }

    fn set_default_template(&self, bearer: &Bearer, id: TemplateId) -> Result<Template> {
        self.enter("set_default_template")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let category = account
            .templates
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.category)
            .ok_or_else(|| not_found("Template"))?;

        apply_template_default(&mut account.templates, category, id);
        account
            .templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found("Template"))
    }

    fn delete_template(&self, bearer: &Bearer, id: TemplateId) -> Result<()> {
        self.enter("delete_template")?;
        let mut state = self.state();
        let account = state.caller(bearer)?;
        let before = account.templates.len();
        account.templates.retain(|t| t.id != id);
        if account.templates.len() == before {
            return Err(not_found("Template"));
        }
        Ok(())
    }

    fn friends(&self, bearer: &Bearer) -> Result<Vec<Friend>> {
        self.enter("friends")?;
        let mut state = self.state();
        Ok(state.caller(bearer)?.friends.clone())
    }

    fn friend_requests(&self, bearer: &Bearer) -> Result<Vec<FriendRequest>> {
        self.enter("friend_requests")?;
        let mut state = self.state();
        Ok(state.caller(bearer)?.requests.clone())
    }

    fn send_friend_request(&self, bearer: &Bearer, email: &str) -> Result<()> {
        self.enter("send_friend_request")?;
        let mut state = self.state();
        let target = email.trim().to_ascii_lowercase();
        let target_known = state
            .accounts
            .get(&target)
            .is_some_and(|a| a.profile.is_some());
        if !target_known {
            return Err(not_found("User"));
        }

        let caller = state.caller(bearer)?;
        if caller.friends.iter().any(|f| same_email(&f.email, &target)) {
            return Err(bad_request("Already friends with this user"));
        }
        if caller.outgoing.iter().any(|e| same_email(e, &target)) {
            return Err(bad_request("Friend request already sent"));
        }
        caller.outgoing.push(target.clone());
        let sender_id = caller.user_id;
        let sender_name = caller.profile.as_ref().and_then(|p| p.full_name.clone());

        state.account_mut(&target).requests.push(FriendRequest {
            id: FriendId(sender_id),
            email: bearer.email().to_string(),
            name: sender_name,
            created_at: Some(Utc::now()),
        });
        Ok(())
    }

    fn respond_to_friend_request(
        &self,
        bearer: &Bearer,
        request_id: FriendId,
        decision: RequestDecision,
    ) -> Result<()> {
        self.enter("respond_to_friend_request")?;
        let mut state = self.state();
        let caller = state.caller(bearer)?;
        let position = caller
            .requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or_else(|| not_found("Friend request"))?;
        let request = caller.requests.remove(position);

        if decision == RequestDecision::Accepted {
            caller.friends.push(Friend {
                id: request.id,
                email: request.email.clone(),
                name: request.name.clone(),
                combine_contacts: false,
            });
        }
        Ok(())
    }

    fn set_sharing(
        &self,
        bearer: &Bearer,
        friend_id: FriendId,
        enabled: bool,
    ) -> Result<Vec<EmailRecord>> {
        self.enter("set_sharing")?;
        let mut state = self.state();
        let caller = state.caller(bearer)?;
        let friend = caller
            .friends
            .iter_mut()
            .find(|f| f.id == friend_id)
            .ok_or_else(|| not_found("Friend"))?;
        friend.combine_contacts = enabled;
        let friend_email = friend.email.clone();

        let contacts = caller
            .friend_contacts
            .get(&friend_id)
            .cloned()
            .unwrap_or_default();

        let mut updated = Vec::new();
        for record in caller.emails.iter_mut() {
            let shared = contacts.iter().any(|c| same_email(c, &record.to));
            if !shared {
                continue;
            }
            if enabled && record.status == EmailStatus::Draft {
                record.status = EmailStatus::SentByFriend;
                record.shared_by = Some(friend_email.clone());
                updated.push(record.clone());
            } else if !enabled && record.status == EmailStatus::SentByFriend {
                record.status = EmailStatus::Draft;
                record.shared_by = None;
                updated.push(record.clone());
            }
        }
        Ok(updated)
    }

    fn remove_friend(&self, bearer: &Bearer, friend_id: FriendId) -> Result<Vec<EmailRecord>> {
        self.enter("remove_friend")?;
        let mut state = self.state();
        let caller = state.caller(bearer)?;
        let before = caller.friends.len();
        caller.friends.retain(|f| f.id != friend_id);
        if caller.friends.len() == before {
            return Err(not_found("Friend"));
        }
        caller.friend_contacts.remove(&friend_id);
        Ok(Vec::new())
    }
}
