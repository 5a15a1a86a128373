//! Command handlers
//!
//! Each command builds the panel it needs from the restored session, runs
//! one operation and prints the result. Server and validation failures are
//! reported with the same text the panel put on its banner.

use anyhow::{Context, anyhow, bail};
use chrono::Local;
use log::debug;
use outreach::{
    AlwaysConfirm, Banner, BannerKind, Bearer, ClientConfig, ClientError, Confirm, ConnectState,
    ContactFile, EmailBus, EmailId, EmailRecord, FileIdentityStore, FriendId, FriendPanel,
    GenerateOptions, GmailConnect, HttpBackend, Outcome, ProfileUpdate, RequestDecision,
    Session, SettingsPanel, Stage, StageBoard, SystemOpener, TemplateDraft, TemplateId,
    TemplateManager, UserProfile, ValidationError, build_request, export_file_name,
    render_preview,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::prompt::{self, StdinConfirm};

/// Wrong codes tolerated before `login` gives up
const CODE_ATTEMPTS: usize = 3;

type CliResult = anyhow::Result<()>;

pub struct App {
    config: ClientConfig,
    session: Session,
    confirm: Box<dyn Confirm>,
}

impl App {
    /// Load settings and restore the remembered sign-in
    pub fn open(config_path: Option<&Path>, assume_yes: bool) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::load().context(
                "No API URL configured. Set OUTREACH_API_URL or create ~/.config/outreach/client.json",
            )?,
        };
        debug!("Using API at {}", config.api_url);

        let backend = Arc::new(HttpBackend::new(&config));
        let identity = Arc::new(FileIdentityStore::default_location()?);
        let session = Session::restore(backend, identity);

        let confirm: Box<dyn Confirm> = if assume_yes {
            Box::new(AlwaysConfirm)
        } else {
            Box::new(StdinConfirm)
        };

        Ok(Self {
            config,
            session,
            confirm,
        })
    }

    fn bearer(&self) -> anyhow::Result<Bearer> {
        self.session
            .require_bearer()
            .map_err(|_| anyhow!("Not signed in. Run `outreach login <email>` first."))
    }

    fn profile(&mut self) -> anyhow::Result<UserProfile> {
        self.bearer()?;
        self.session
            .refresh_profile()
            .cloned()
            .map_err(|e| failure(e, "Failed to load your profile."))
    }

    fn board(&self) -> anyhow::Result<StageBoard> {
        let mut board = StageBoard::new(self.session.backend().clone(), self.bearer()?);
        board.refresh().map_err(|e| reported(e, board.banner()))?;
        Ok(board)
    }

    fn templates(&self) -> anyhow::Result<TemplateManager> {
        let mut manager = TemplateManager::new(self.session.backend().clone(), self.bearer()?);
        manager.load().map_err(|e| reported(e, manager.banner()))?;
        Ok(manager)
    }

    fn friends(&self) -> anyhow::Result<FriendPanel> {
        let mut panel =
            FriendPanel::new(self.session.backend().clone(), self.bearer()?, EmailBus::new());
        panel.load().map_err(|e| reported(e, panel.banner()))?;
        Ok(panel)
    }

    // === Session ===

    pub fn login(&mut self, email: &str) -> CliResult {
        self.session.restart();
        self.session
            .request_auth_code(email)
            .map_err(|e| failure(e, "Failed to send the sign-in code."))?;
        println!("A sign-in code was sent to {}", email.trim());

        for _ in 0..CODE_ATTEMPTS {
            let Some(code) = prompt::read_code()? else {
                bail!("Sign-in cancelled");
            };
            match self.session.verify_auth_code(email, &code) {
                Ok(()) => {
                    println!("Signed in as {}", self.session.email());
                    return Ok(());
                }
                Err(e @ ClientError::Rejected { .. }) => {
                    println!("{}", e.user_message("Invalid or expired verification code"));
                }
                Err(e) => return Err(failure(e, "Verification failed.")),
            }
        }
        bail!("Too many wrong codes. Run `outreach login` to get a new one.")
    }

    pub fn logout(&mut self) -> CliResult {
        self.session.logout();
        println!("Signed out");
        Ok(())
    }

    pub fn whoami(&mut self) -> CliResult {
        let profile = self.profile()?;
        println!("{}", profile.email);
        let fields = [
            ("Name", &profile.full_name),
            ("Position", &profile.position),
            ("Company", &profile.company_name),
            ("About", &profile.company_description),
        ];
        for (label, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                println!("  {:<10} {}", label, value);
            }
        }
        println!(
            "  {:<10} {}",
            "Gmail",
            if profile.has_gmail() { "connected" } else { "not connected" }
        );
        println!(
            "  {:<10} follow-up after {} days, last chance after {} days",
            "Cadence", profile.followup_interval_days, profile.lastchance_interval_days
        );
        Ok(())
    }

    // === Emails ===

    pub fn list_emails(&self, stage: Option<Stage>) -> CliResult {
        let board = self.board()?;
        let stages = stage.map_or(Stage::ALL.to_vec(), |s| vec![s]);
        for stage in stages {
            let view = board.view(stage);
            println!("{} ({})", stage.display_name(), view.len());
            for record in view.sorted() {
                print_email(record);
            }
            println!();
        }
        Ok(())
    }

    pub fn mark_sent(&self, id: i64) -> CliResult {
        let mut board = self.board()?;
        board
            .mark_sent(EmailId(id))
            .map_err(|e| reported(e, board.banner()))?;
        println!("Email {} marked as sent", id);
        Ok(())
    }

    pub fn unmark(&self, id: i64) -> CliResult {
        let mut board = self.board()?;
        board
            .unmark_sent(EmailId(id))
            .map_err(|e| reported(e, board.banner()))?;
        println!("Email {} is a draft again", id);
        Ok(())
    }

    pub fn delete_email(&self, id: i64) -> CliResult {
        let mut board = self.board()?;
        let outcome = board
            .delete(EmailId(id), self.confirm.as_ref())
            .map_err(|e| reported(e, board.banner()))?;
        print_outcome(outcome, &format!("Email {} deleted", id));
        Ok(())
    }

    pub fn send(&mut self, id: i64) -> CliResult {
        let profile = self.profile()?;
        let mut board = self.board()?;
        board
            .send_via_gmail(EmailId(id), &profile)
            .map_err(|e| reported(e, board.banner()))?;
        println!("Email {} sent via Gmail", id);
        Ok(())
    }

    pub fn mailto(&self, id: i64) -> CliResult {
        let mut board = self.board()?;
        let link = board
            .mailto(EmailId(id))
            .map_err(|e| reported(e, board.banner()))?;
        println!("{}", link);
        Ok(())
    }

    pub fn export(&self, stage: Stage, output: Option<PathBuf>) -> CliResult {
        let board = self.board()?;
        let text = board.export(stage).map_err(|e| failure(e, ""))?;
        let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(stage)));
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported {} emails to {}", board.view(stage).len(), path.display());
        Ok(())
    }

    pub fn generate(
        &mut self,
        file: &Path,
        stage: Stage,
        template: Option<i64>,
        default_template: bool,
        avoid_duplicates: bool,
    ) -> CliResult {
        let profile = self.profile()?;
        let options = if let Some(id) = template {
            GenerateOptions::template(stage, Some(TemplateId(id)))
        } else if default_template {
            let mut manager = self.templates()?;
            let selected = manager
                .for_stage(stage)
                .map_err(|e| reported(e, manager.banner()))?
                .selected;
            GenerateOptions::template(stage, selected)
        } else {
            GenerateOptions::ai(stage)
        }
        .avoid_duplicates(avoid_duplicates);

        let contacts = ContactFile::read(file).map_err(|e| failure(e, ""))?;
        let request =
            build_request(Some(&contacts), &options, &profile).map_err(|e| failure(e, ""))?;

        let mut board = self.board()?;
        let response = board
            .generate(&request)
            .map_err(|e| reported(e, board.banner()))?;
        for email in &response.emails {
            println!("  {:<32} {}", email.to, email.subject);
        }
        report(board.banner());
        Ok(())
    }

    pub fn connect_gmail(&mut self) -> CliResult {
        let bearer = self.bearer()?;
        let mut connect = GmailConnect::new(
            self.session.backend().clone(),
            bearer,
            Arc::new(SystemOpener),
            self.config.poll,
        );
        connect
            .connect()
            .map_err(|e| failure(e, "Failed to start Gmail connection."))?;
        println!("Finish the authorization in your browser. Waiting...");

        match connect.wait() {
            ConnectState::Connected => {
                if let Some(profile) = connect.latest_profile() {
                    self.session.set_profile(profile);
                }
                println!("Gmail connected");
                Ok(())
            }
            ConnectState::TimedOut => bail!("Timed out waiting for Gmail authorization"),
            state => bail!("Gmail connection stopped ({:?})", state),
        }
    }

    // === Templates ===

    pub fn list_templates(&self, stage: Option<Stage>) -> CliResult {
        let manager = self.templates()?;
        let stages = stage.map_or(Stage::ALL.to_vec(), |s| vec![s]);
        for stage in stages {
            println!("{}", stage.display_name());
            for template in manager.templates().get(stage) {
                let marker = if template.is_default { " (default)" } else { "" };
                println!("  {:>6}  {}{}", template.id.0, template.name, marker);
            }
        }
        Ok(())
    }

    pub fn create_template(
        &self,
        stage: Stage,
        name: String,
        content: String,
        default: bool,
    ) -> CliResult {
        let mut manager = self.templates()?;
        let mut draft = TemplateDraft::new(name, content, stage);
        draft.is_default = default;
        let template = manager
            .create(&draft)
            .map_err(|e| reported(e, manager.banner()))?;
        println!("Created template {}", template.id);
        Ok(())
    }

    pub fn update_template(&self, id: i64, name: String, content: String) -> CliResult {
        let mut manager = self.templates()?;
        let id = TemplateId(id);
        let current = manager
            .templates()
            .find(id)
            .cloned()
            .ok_or_else(|| anyhow!("No template with id {}", id))?;
        let mut draft = TemplateDraft::new(name, content, current.category);
        draft.is_default = current.is_default;
        manager
            .update(id, &draft)
            .map_err(|e| reported(e, manager.banner()))?;
        report(manager.banner());
        Ok(())
    }

    pub fn set_default_template(&self, id: i64) -> CliResult {
        let mut manager = self.templates()?;
        manager
            .set_default(TemplateId(id))
            .map_err(|e| reported(e, manager.banner()))?;
        report(manager.banner());
        Ok(())
    }

    pub fn delete_template(&self, id: i64) -> CliResult {
        let mut manager = self.templates()?;
        let outcome = manager
            .delete(TemplateId(id), self.confirm.as_ref())
            .map_err(|e| reported(e, manager.banner()))?;
        print_outcome(outcome, &format!("Template {} deleted", id));
        Ok(())
    }

    pub fn preview_template(&self, id: i64) -> CliResult {
        let manager = self.templates()?;
        let template = manager
            .templates()
            .find(TemplateId(id))
            .ok_or_else(|| anyhow!("No template with id {}", id))?;
        println!("{}", render_preview(&template.content));
        Ok(())
    }

    // === Friends ===

    pub fn list_friends(&self) -> CliResult {
        let panel = self.friends()?;
        println!("Friends ({})", panel.friends().len());
        for friend in panel.friends() {
            let sharing = if friend.combine_contacts { "sharing" } else { "" };
            println!(
                "  {:>6}  {:<32} {:<20} {}",
                friend.id.0,
                friend.email,
                friend.name.as_deref().unwrap_or_default(),
                sharing
            );
        }
        println!("Requests ({})", panel.requests().len());
        for request in panel.requests() {
            println!("  {:>6}  {}", request.id.0, request.email);
        }
        Ok(())
    }

    pub fn add_friend(&self, email: &str) -> CliResult {
        let mut panel = self.friends()?;
        panel
            .send_request(email)
            .map_err(|e| reported(e, panel.banner()))?;
        report(panel.banner());
        Ok(())
    }

    pub fn respond(&self, id: i64, decision: RequestDecision) -> CliResult {
        let mut panel = self.friends()?;
        panel
            .respond(FriendId(id), decision)
            .map_err(|e| reported(e, panel.banner()))?;
        report(panel.banner());
        Ok(())
    }

    pub fn share(&self, id: i64, enabled: bool) -> CliResult {
        let mut panel = self.friends()?;
        let updated = panel
            .toggle_sharing(FriendId(id), enabled)
            .map_err(|e| reported(e, panel.banner()))?;
        let verb = if enabled { "Sharing with" } else { "Stopped sharing with" };
        println!("{} friend {} ({} emails updated)", verb, id, updated);
        Ok(())
    }

    pub fn remove_friend(&self, id: i64) -> CliResult {
        let mut panel = self.friends()?;
        let outcome = panel
            .remove_friend(FriendId(id), self.confirm.as_ref())
            .map_err(|e| reported(e, panel.banner()))?;
        if outcome == Outcome::Cancelled {
            println!("Cancelled");
        } else {
            report(panel.banner());
        }
        Ok(())
    }

    // === Settings ===

    pub fn update_profile(
        &mut self,
        full_name: Option<String>,
        position: Option<String>,
        company_name: Option<String>,
        company_description: Option<String>,
    ) -> CliResult {
        self.profile()?;
        let update = ProfileUpdate {
            full_name,
            position,
            company_name,
            company_description,
        };
        let changed = self
            .session
            .update_user_profile(update)
            .map_err(|e| failure(e, "Failed to update profile. Please try again."))?;
        println!("{}", if changed { "Profile updated" } else { "Nothing to update" });
        Ok(())
    }

    pub fn set_intervals(&mut self, followup: u32, lastchance: u32) -> CliResult {
        self.session
            .update_intervals(followup, lastchance)
            .map_err(|e| failure(e, "Failed to update intervals. Please try again."))?;
        println!(
            "Follow-up after {} days, last chance after {} days",
            followup, lastchance
        );
        Ok(())
    }

    pub fn cache(&self, clear: bool) -> CliResult {
        let mut panel = SettingsPanel::new(self.session.backend().clone(), self.bearer()?);
        let result = if clear {
            panel.clear_cache()
        } else {
            panel.load_cache_info().map(|_| ())
        };
        result.map_err(|e| reported(e, panel.banner()))?;

        if let Some(cache) = panel.cache() {
            println!("Status:        {}", cache.status);
            println!("Entries:       {}", cache.size);
            println!(
                "Last cleared:  {}",
                cache.last_cleared.as_deref().unwrap_or("never")
            );
        }
        Ok(())
    }
}

fn print_email(record: &EmailRecord) {
    let due = record
        .followup_due_at
        .filter(|_| record.is_pending_followup())
        .map(|due| format!("  due {}", due.with_timezone(&Local).format("%Y-%m-%d")))
        .unwrap_or_default();
    println!(
        "  {:>6}  {:<15} {:<32} {}{}",
        record.id.0, record.status.as_str(), record.to, record.subject, due
    );
}

fn print_outcome(outcome: Outcome, done: &str) {
    match outcome {
        Outcome::Done => println!("{}", done),
        Outcome::Cancelled => println!("Cancelled"),
    }
}

/// Print a success banner, if one is showing
fn report(banner: &Banner) {
    if let Some(message) = banner.current().filter(|m| m.kind == BannerKind::Success) {
        println!("{}", message.text);
    }
}

/// Error carrying the text a panel showed on its banner
fn reported(e: ClientError, banner: &Banner) -> anyhow::Error {
    match banner.current().filter(|m| m.kind == BannerKind::Error) {
        Some(message) => anyhow!(message.text.clone()),
        None => failure(e, ""),
    }
}

/// Error with the user-facing message for `e`
fn failure(e: ClientError, fallback: &str) -> anyhow::Error {
    match e {
        ClientError::Validation(ValidationError::NotAuthenticated) => {
            anyhow!("Not signed in. Run `outreach login <email>` first.")
        }
        ClientError::Rejected { status: 401, .. } => {
            anyhow!("Your sign-in has expired. Run `outreach login <email>` again.")
        }
        e if fallback.is_empty() => anyhow!(e.user_message(&e.to_string())),
        e => anyhow!(e.user_message(fallback)),
    }
}
