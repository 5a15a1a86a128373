//! Session manager
//!
//! Owns the sign-in flow (email, then one-time code, then profile) and the
//! signed-in user's profile. Every other component needs a [`Bearer`], and
//! only an authenticated session hands one out.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::backend::{Backend, Bearer};
use crate::code_input::is_valid_code;
use crate::error::{ClientError, Result, ValidationError};
use crate::identity::IdentityStore;
use crate::models::{ProfileUpdate, UserProfile};
use crate::settings::validate_intervals;

/// Where the user is in the sign-in flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStep {
    /// Waiting for an email address
    #[default]
    Email,
    /// A code was sent; waiting for it to be entered
    Code,
    /// Signed in
    Profile,
}

/// The signed-in state of the client
pub struct Session {
    backend: Arc<dyn Backend>,
    identity: Arc<dyn IdentityStore>,
    email: String,
    step: AuthStep,
    authenticated: bool,
    profile: Option<UserProfile>,
    profile_stale: bool,
}

impl Session {
    /// A signed-out session
    pub fn new(backend: Arc<dyn Backend>, identity: Arc<dyn IdentityStore>) -> Self {
        Self {
            backend,
            identity,
            email: String::new(),
            step: AuthStep::Email,
            authenticated: false,
            profile: None,
            profile_stale: false,
        }
    }

    /// Resume from the persisted identity, if any.
    ///
    /// A persisted email signs the session in immediately with a placeholder
    /// profile. Call [`Session::refresh_profile`] to fetch the real one.
    pub fn restore(backend: Arc<dyn Backend>, identity: Arc<dyn IdentityStore>) -> Self {
        let mut session = Self::new(backend, identity);
        match session.identity.load() {
            Ok(Some(email)) => {
                info!("Restoring session for {}", email);
                session.profile = Some(UserProfile::pending(email.clone()));
                session.email = email;
                session.step = AuthStep::Profile;
                session.authenticated = true;
                session.profile_stale = true;
            }
            Ok(None) => debug!("No persisted identity"),
            Err(e) => warn!("Failed to load persisted identity: {}", e),
        }
        session
    }

    // === Sign-in flow ===

    /// Ask the backend to email a one-time code.
    ///
    /// On success the email is kept and the flow moves to [`AuthStep::Code`].
    /// On failure nothing changes.
    pub fn request_auth_code(&mut self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail.into());
        }

        if let Err(e) = self.backend.request_code(email) {
            warn!("Failed to request code for {}: {}", email, e);
            return Err(e);
        }

        info!("Verification code sent to {}", email);
        self.email = email.to_string();
        self.step = AuthStep::Code;
        Ok(())
    }

    /// Exchange a one-time code for a signed-in session.
    ///
    /// The code must be exactly six digits; anything else is refused without
    /// a request. On failure the flow stays at [`AuthStep::Code`].
    pub fn verify_auth_code(&mut self, email: &str, code: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail.into());
        }
        if !is_valid_code(code) {
            return Err(ValidationError::MalformedCode.into());
        }

        let profile = match self.backend.verify_code(email, code) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Code verification failed for {}: {}", email, e);
                return Err(e);
            }
        };

        if let Err(e) = self.identity.save(email) {
            warn!("Failed to persist identity: {}", e);
        }

        info!("Signed in as {}", email);
        self.email = email.to_string();
        self.authenticated = true;
        self.step = AuthStep::Profile;
        self.profile = Some(profile);
        self.profile_stale = true;

        if let Err(e) = self.refresh_profile() {
            warn!("Signed in, but the profile could not be loaded: {}", e);
        }
        Ok(())
    }

    /// Go back to entering an email address
    pub fn restart(&mut self) {
        if !self.authenticated {
            self.step = AuthStep::Email;
        }
    }

    /// Fetch the full profile.
    ///
    /// A 401 signs the session out. Any other failure keeps the current
    /// profile and leaves it marked stale.
    pub fn refresh_profile(&mut self) -> Result<&UserProfile> {
        let bearer = self.require_bearer()?;
        match self.backend.fetch_profile(&bearer) {
            Ok(profile) => {
                debug!("Profile loaded for {}", profile.email);
                self.profile_stale = false;
                Ok(&*self.profile.insert(profile))
            }
            Err(e) if e.is_unauthorized() => {
                warn!("Stored identity was refused; signing out");
                self.logout();
                Err(e)
            }
            Err(e) => {
                warn!("Failed to fetch profile: {}", e);
                self.profile_stale = true;
                Err(e)
            }
        }
    }

    /// Sign out and forget the persisted identity. Safe to call repeatedly.
    pub fn logout(&mut self) {
        if let Err(e) = self.identity.clear() {
            warn!("Failed to clear persisted identity: {}", e);
        }
        if self.authenticated {
            info!("Signed out {}", self.email);
        }
        self.email.clear();
        self.step = AuthStep::Email;
        self.authenticated = false;
        self.profile = None;
        self.profile_stale = false;
    }

    // === Profile ===

    /// Send the fields of `update` that differ from the current profile.
    ///
    /// Returns `false` without a request when nothing changed. Fields the
    /// backend leaves out of its response keep their local value.
    pub fn update_user_profile(&mut self, update: ProfileUpdate) -> Result<bool> {
        let bearer = self.require_bearer()?;
        let update = match &self.profile {
            Some(profile) => changed_fields(profile, update),
            None => update,
        };
        if update.is_empty() {
            debug!("Profile unchanged; nothing to send");
            return Ok(false);
        }

        let patch = self.backend.update_settings(&bearer, &update).map_err(|e| {
            warn!("Failed to update profile: {}", e);
            e
        })?;

        let profile = self
            .profile
            .get_or_insert_with(|| UserProfile::pending(bearer.email()));
        profile.merge(&patch);
        info!("Profile updated");
        Ok(true)
    }

    /// Change the follow-up and last-chance delays
    pub fn update_intervals(&mut self, followup_days: u32, lastchance_days: u32) -> Result<()> {
        validate_intervals(followup_days, lastchance_days)?;
        let bearer = self.require_bearer()?;
        self.backend
            .update_intervals(&bearer, followup_days, lastchance_days)
            .map_err(|e| {
                warn!("Failed to update intervals: {}", e);
                e
            })?;

        if let Some(profile) = self.profile.as_mut() {
            profile.followup_interval_days = followup_days;
            profile.lastchance_interval_days = lastchance_days;
        }
        Ok(())
    }

    /// Replace the profile with a freshly fetched one
    pub fn set_profile(&mut self, profile: UserProfile) {
        if self.authenticated {
            self.profile = Some(profile);
            self.profile_stale = false;
        }
    }

    // === Accessors ===

    /// Credential for authenticated calls, if signed in
    pub fn bearer(&self) -> Option<Bearer> {
        self.authenticated.then(|| Bearer::new(self.email.clone()))
    }

    /// Credential for authenticated calls, or a validation error
    pub fn require_bearer(&self) -> Result<Bearer> {
        self.bearer()
            .ok_or(ClientError::Validation(ValidationError::NotAuthenticated))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn step(&self) -> AuthStep {
        self.step
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// True until a profile fetch has succeeded
    pub fn is_profile_stale(&self) -> bool {
        self.profile_stale
    }
}

/// Drop fields whose value already matches the profile
fn changed_fields(profile: &UserProfile, update: ProfileUpdate) -> ProfileUpdate {
    fn keep(new: Option<String>, current: &Option<String>) -> Option<String> {
        new.filter(|value| Some(value) != current.as_ref())
    }

    ProfileUpdate {
        full_name: keep(update.full_name, &profile.full_name),
        position: keep(update.position, &profile.position),
        company_name: keep(update.company_name, &profile.company_name),
        company_description: keep(update.company_description, &profile.company_description),
    }
}
