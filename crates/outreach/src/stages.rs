//! Email stage views
//!
//! One view per stage (outreach, follow-up, last chance). The board
//! fetches every stage, moves sent outreach emails that have a follow-up
//! date into the follow-up list, and re-fetches after every change it
//! makes. Changes made elsewhere arrive through the [`EmailBus`].

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{Backend, Bearer};
use crate::banner::Banner;
use crate::confirm::{Confirm, Outcome};
use crate::error::{ClientError, Result, ValidationError};
use crate::events::{EmailBus, EmailsUpdated, Subscription};
use crate::export;
use crate::models::{EmailId, EmailRecord, EmailStatus, Stage, UserProfile};

const LOAD_FAILED: &str = "Failed to load emails. Please try again.";
const DELETE_PROMPT: &str = "Are you sure you want to permanently delete this email?";

/// Emails shown for one stage
#[derive(Debug, Clone)]
pub struct StageView {
    stage: Stage,
    /// In fetch order
    records: Vec<EmailRecord>,
}

impl StageView {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            records: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Records in fetch order
    pub fn records(&self) -> &[EmailRecord] {
        &self.records
    }

    /// Records in display order: by status rank, stable within a rank
    pub fn sorted(&self) -> Vec<&EmailRecord> {
        let mut sorted: Vec<&EmailRecord> = self.records.iter().collect();
        sorted.sort_by_key(|r| r.status.rank());
        sorted
    }

    pub fn get(&self, id: EmailId) -> Option<&EmailRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn replace(&mut self, records: Vec<EmailRecord>) {
        self.records = records;
    }

    /// Replace records of this stage with the same id, in place.
    ///
    /// Returns how many entries changed. Records not already in the view
    /// are ignored.
    pub fn apply_updates(&mut self, event: &EmailsUpdated) -> usize {
        let mut changed = 0;
        for update in event.for_stage(self.stage) {
            if let Some(existing) = self.records.iter_mut().find(|r| r.id == update.id) {
                *existing = update.clone();
                changed += 1;
            }
        }
        changed
    }
}

/// Move sent outreach emails with a follow-up date to the follow-up list.
///
/// Moved records are appended to `followup` unless a record with the same
/// id is already there.
pub fn reconcile(
    outreach: Vec<EmailRecord>,
    mut followup: Vec<EmailRecord>,
) -> (Vec<EmailRecord>, Vec<EmailRecord>) {
    let (pending, outreach): (Vec<_>, Vec<_>) = outreach
        .into_iter()
        .partition(EmailRecord::is_pending_followup);

    for record in pending {
        if !followup.iter().any(|r| r.id == record.id) {
            followup.push(record);
        }
    }
    (outreach, followup)
}

/// What the last status change did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Sent,
    Unmarked,
}

/// Last status change, kept for highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastAction {
    pub id: EmailId,
    pub kind: ActionKind,
}

/// The three stage views of the signed-in user
pub struct StageBoard {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) bearer: Bearer,
    views: [StageView; 3],
    pub(crate) banner: Banner,
    last_action: Option<LastAction>,
}

impl StageBoard {
    pub fn new(backend: Arc<dyn Backend>, bearer: Bearer) -> Self {
        Self {
            backend,
            bearer,
            views: Stage::ALL.map(StageView::new),
            banner: Banner::new(),
            last_action: None,
        }
    }

    fn index(stage: Stage) -> usize {
        match stage {
            Stage::Outreach => 0,
            Stage::Followup => 1,
            Stage::Lastchance => 2,
        }
    }

    pub fn view(&self, stage: Stage) -> &StageView {
        &self.views[Self::index(stage)]
    }

    fn view_mut(&mut self, stage: Stage) -> &mut StageView {
        &mut self.views[Self::index(stage)]
    }

    /// Find an email in any view
    pub fn find(&self, id: EmailId) -> Option<&EmailRecord> {
        self.views.iter().find_map(|view| view.get(id))
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn last_action(&self) -> Option<LastAction> {
        self.last_action
    }

    /// Fetch every stage.
    ///
    /// Stages load independently: a failed stage keeps its previous list
    /// and the others still update. The first failure is returned after
    /// all stages were tried.
    pub fn refresh(&mut self) -> Result<()> {
        let mut first_error = None;
        let mut fetched = Stage::ALL.map(|stage| {
            match self.backend.emails_by_stage(&self.bearer, stage) {
                Ok(records) => {
                    debug!("Loaded {} {} emails", records.len(), stage);
                    Some(records)
                }
                Err(e) => {
                    warn!("Failed to load {} emails: {}", stage, e);
                    first_error.get_or_insert(e);
                    None
                }
            }
        });

        let outreach = fetched[Self::index(Stage::Outreach)].take();
        let followup = fetched[Self::index(Stage::Followup)].take();
        match (outreach, followup) {
            (Some(outreach), followup) => {
                let followup =
                    followup.unwrap_or_else(|| self.view(Stage::Followup).records.clone());
                let (outreach, followup) = reconcile(outreach, followup);
                self.view_mut(Stage::Outreach).replace(outreach);
                self.view_mut(Stage::Followup).replace(followup);
            }
            (None, Some(followup)) => self.view_mut(Stage::Followup).replace(followup),
            (None, None) => {}
        }
        if let Some(lastchance) = fetched[Self::index(Stage::Lastchance)].take() {
            self.view_mut(Stage::Lastchance).replace(lastchance);
        }

        match first_error {
            Some(e) => {
                self.banner.error(e.user_message(LOAD_FAILED));
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Refresh after a change; load failures are already on the banner
    pub(crate) fn refresh_after_change(&mut self) {
        if self.refresh().is_err() {
            debug!("Lists may be out of date until the next refresh");
        }
    }

    fn set_status(
        &mut self,
        id: EmailId,
        status: EmailStatus,
        kind: ActionKind,
        failure: &str,
    ) -> Result<()> {
        let result = self.backend.update_email_status(&self.bearer, id, &status);

        if let Err(e) = result {
            warn!("Failed to set email {} to {}: {}", id, status, e);
            self.banner.error(e.user_message(failure));
            return Err(e);
        }

        info!("Email {} is now {}", id, status);
        self.last_action = Some(LastAction { id, kind });
        self.refresh_after_change();
        Ok(())
    }

    /// Mark an email as sent
    pub fn mark_sent(&mut self, id: EmailId) -> Result<()> {
        self.set_status(
            id,
            EmailStatus::OutreachSent,
            ActionKind::Sent,
            "Failed to update email status.",
        )
    }

    /// Put a sent email back to draft
    pub fn unmark_sent(&mut self, id: EmailId) -> Result<()> {
        self.set_status(
            id,
            EmailStatus::Draft,
            ActionKind::Unmarked,
            "Failed to unmark email.",
        )
    }

    /// Delete an email after confirmation
    pub fn delete(&mut self, id: EmailId, confirm: &dyn Confirm) -> Result<Outcome> {
        if !confirm.confirm(DELETE_PROMPT) {
            debug!("Delete of email {} cancelled", id);
            return Ok(Outcome::Cancelled);
        }

        let result = self.backend.delete_email(&self.bearer, id);

        if let Err(e) = result {
            warn!("Failed to delete email {}: {}", id, e);
            self.banner
                .error(e.user_message("Failed to delete email. Please try again."));
            return Err(e);
        }

        info!("Deleted email {}", id);
        self.refresh_after_change();
        Ok(Outcome::Done)
    }

    /// Send through the connected Gmail account, then mark as sent
    pub fn send_via_gmail(&mut self, id: EmailId, profile: &UserProfile) -> Result<()> {
        if !profile.has_gmail() {
            let err = ClientError::from(ValidationError::GmailNotConnected);
            self.banner.error(err.to_string());
            return Err(err);
        }

        let result = self.backend.send_via_gmail(&self.bearer, id);

        if let Err(e) = result {
            warn!("Failed to send email {} via Gmail: {}", id, e);
            self.banner.error(
                e.user_message("Failed to send email via Gmail. Please try again."),
            );
            return Err(e);
        }

        info!("Sent email {} via Gmail", id);
        self.mark_sent(id)
    }

    /// `mailto:` link for an email. The email is marked as sent once the
    /// link has been built.
    pub fn mailto(&mut self, id: EmailId) -> Result<String> {
        let record = self
            .find(id)
            .ok_or(ValidationError::UnknownEmail(id.as_i64()))?;
        let link = export::mailto_link(record).inspect_err(|e| {
            warn!("Cannot build mailto link for email {}: {}", id, e);
        })?;

        self.mark_sent(id)?;
        Ok(link)
    }

    /// Plain-text export of a stage in display order
    pub fn export(&self, stage: Stage) -> Result<String> {
        export::export_stage(stage, &self.view(stage).sorted())
    }

    /// Apply a broadcast batch to every view
    pub fn apply_updates(&mut self, event: &EmailsUpdated) -> usize {
        self.views
            .iter_mut()
            .map(|view| view.apply_updates(event))
            .sum()
    }

    /// Subscribe a shared board to the bus.
    ///
    /// Handlers lock the board, so do not publish while holding its lock.
    pub fn attach(board: &Arc<Mutex<StageBoard>>, bus: &EmailBus) -> Subscription {
        let board = Arc::downgrade(board);
        bus.subscribe(move |event| {
            if let Some(board) = board.upgrade() {
                let changed = board
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply_updates(event);
                debug!("Applied {} broadcast updates", changed);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Failure, InMemoryBackend};
    use crate::confirm::{AlwaysConfirm, NeverConfirm};
    use chrono::Utc;

    const USER: &str = "a@x.com";

    fn board_with(records: Vec<EmailRecord>) -> (Arc<InMemoryBackend>, StageBoard) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_user(UserProfile::pending(USER));
        for record in records {
            backend.add_email(USER, record);
        }
        let board = StageBoard::new(backend.clone(), Bearer::new(USER));
        (backend, board)
    }

    fn ids(records: &[&EmailRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn test_sort_by_status_rank_is_stable() {
        let mut view = StageView::new(Stage::Outreach);
        view.replace(vec![
            EmailRecord::new(1, "a", Stage::Outreach).with_status("completed".into()),
            EmailRecord::new(2, "b", Stage::Outreach),
            EmailRecord::new(3, "c", Stage::Outreach).with_status(EmailStatus::SentByFriend),
            EmailRecord::new(4, "d", Stage::Outreach).with_status(EmailStatus::OutreachSent),
            EmailRecord::new(5, "e", Stage::Outreach),
        ]);
        assert_eq!(ids(&view.sorted()), vec![4, 2, 5, 3, 1]);
        // Fetch order is untouched
        assert_eq!(view.records()[0].id, EmailId(1));
    }

    #[test]
    fn test_reconcile_moves_pending_followups() {
        let pending = EmailRecord::new(1, "a", Stage::Outreach)
            .with_status(EmailStatus::OutreachSent)
            .with_followup_due_at(Utc::now());
        let sent_no_date =
            EmailRecord::new(2, "b", Stage::Outreach).with_status(EmailStatus::OutreachSent);
        let existing = EmailRecord::new(3, "c", Stage::Followup);

        let (outreach, followup) =
            reconcile(vec![pending.clone(), sent_no_date], vec![existing]);
        assert_eq!(outreach.iter().map(|r| r.id.0).collect::<Vec<_>>(), vec![2]);
        assert_eq!(followup.iter().map(|r| r.id.0).collect::<Vec<_>>(), vec![3, 1]);

        // Already listed under follow-up: not duplicated
        let (_, followup) = reconcile(vec![pending.clone()], vec![pending]);
        assert_eq!(followup.len(), 1);
    }

    #[test]
    fn test_apply_updates_replaces_in_place() {
        let mut view = StageView::new(Stage::Outreach);
        view.replace(vec![
            EmailRecord::new(1, "a", Stage::Outreach),
            EmailRecord::new(2, "b", Stage::Outreach),
            EmailRecord::new(3, "c", Stage::Outreach),
        ]);
        let event = EmailsUpdated::new(vec![
            EmailRecord::new(2, "b", Stage::Outreach).with_status(EmailStatus::SentByFriend),
            EmailRecord::new(3, "c", Stage::Followup).with_status(EmailStatus::SentByFriend),
            EmailRecord::new(9, "z", Stage::Outreach),
        ]);

        assert_eq!(view.apply_updates(&event), 1);
        assert_eq!(view.records().iter().map(|r| r.id.0).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(view.records()[1].status, EmailStatus::SentByFriend);
        assert_eq!(view.records()[2].status, EmailStatus::Draft);
    }

    #[test]
    fn test_refresh_reconciles_across_stages() {
        let (_, mut board) = board_with(vec![
            EmailRecord::new(1, "a@acme.com", Stage::Outreach)
                .with_status(EmailStatus::OutreachSent)
                .with_followup_due_at(Utc::now()),
            EmailRecord::new(2, "b@acme.com", Stage::Outreach),
            EmailRecord::new(3, "c@acme.com", Stage::Lastchance),
        ]);

        board.refresh().unwrap();
        assert_eq!(ids(&board.view(Stage::Outreach).sorted()), vec![2]);
        assert_eq!(ids(&board.view(Stage::Followup).sorted()), vec![1]);
        assert_eq!(ids(&board.view(Stage::Lastchance).sorted()), vec![3]);
    }

    #[test]
    fn test_one_failed_stage_does_not_block_others() {
        let (backend, mut board) = board_with(vec![
            EmailRecord::new(2, "b@acme.com", Stage::Outreach),
            EmailRecord::new(3, "c@acme.com", Stage::Lastchance),
        ]);
        backend.fail_next("emails_by_stage", Failure::Rejected(500, None));

        assert!(board.refresh().is_err());
        assert!(board.view(Stage::Outreach).is_empty());
        assert_eq!(board.view(Stage::Lastchance).len(), 1);
        assert_eq!(
            board.banner().current().map(|m| m.text.as_str()),
            Some(LOAD_FAILED)
        );
    }

    #[test]
    fn test_mark_sent_refetches_and_tracks_action() {
        let (backend, mut board) =
            board_with(vec![EmailRecord::new(1, "a@acme.com", Stage::Outreach)]);
        board.refresh().unwrap();
        backend.reset_calls();

        board.mark_sent(EmailId(1)).unwrap();
        assert_eq!(backend.call_count("update_email_status"), 1);
        assert_eq!(backend.call_count("emails_by_stage"), 3);
        assert_eq!(
            board.last_action(),
            Some(LastAction {
                id: EmailId(1),
                kind: ActionKind::Sent
            })
        );
        // Sent with a due date: now a pending follow-up
        assert!(board.view(Stage::Outreach).is_empty());
        assert_eq!(board.view(Stage::Followup).len(), 1);

        board.unmark_sent(EmailId(1)).unwrap();
        assert_eq!(board.view(Stage::Outreach).len(), 1);
        assert_eq!(board.last_action().map(|a| a.kind), Some(ActionKind::Unmarked));
    }

    #[test]
    fn test_failed_status_change_shows_banner() {
        let (backend, mut board) =
            board_with(vec![EmailRecord::new(1, "a@acme.com", Stage::Outreach)]);
        backend.fail_next("update_email_status", Failure::Rejected(500, None));

        assert!(board.mark_sent(EmailId(1)).is_err());
        assert!(board.last_action().is_none());
        assert_eq!(
            board.banner().current().map(|m| m.text.as_str()),
            Some("Failed to update email status.")
        );
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (backend, mut board) =
            board_with(vec![EmailRecord::new(1, "a@acme.com", Stage::Outreach)]);

        assert_eq!(board.delete(EmailId(1), &NeverConfirm).unwrap(), Outcome::Cancelled);
        assert_eq!(backend.call_count("delete_email"), 0);

        let prompts = Mutex::new(Vec::new());
        let recorder = |prompt: &str| {
            prompts.lock().unwrap().push(prompt.to_string());
            true
        };
        assert_eq!(board.delete(EmailId(1), &recorder).unwrap(), Outcome::Done);
        assert_eq!(*prompts.lock().unwrap(), vec![DELETE_PROMPT.to_string()]);
        assert!(backend.emails_of(USER).is_empty());
    }

    #[test]
    fn test_failed_delete_keeps_email_and_shows_banner() {
        let (backend, mut board) =
            board_with(vec![EmailRecord::new(1, "a@acme.com", Stage::Outreach)]);
        backend.fail_next("delete_email", Failure::Transport);

        let err = board.delete(EmailId(1), &AlwaysConfirm).unwrap_err();
        assert!(err.is_no_response());
        assert_eq!(board.view(Stage::Outreach).len(), 1);
        assert_eq!(backend.emails_of(USER).len(), 1);
        assert_eq!(
            board.banner().current().map(|m| m.text.as_str()),
            Some("No response from server. Please check your connection.")
        );
    }

    #[test]
    fn test_gmail_send_requires_token() {
        let (backend, mut board) =
            board_with(vec![EmailRecord::new(1, "a@acme.com", Stage::Outreach)]);
        let mut profile = UserProfile::pending(USER);

        let err = board.send_via_gmail(EmailId(1), &profile).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::GmailNotConnected)
        ));
        assert_eq!(backend.call_count("send_via_gmail"), 0);

        profile.gmail_access_token = Some("token".to_string());
        backend.add_user(profile.clone());
        board.send_via_gmail(EmailId(1), &profile).unwrap();
        assert_eq!(backend.sent_via_gmail_of(USER), vec![EmailId(1)]);
        assert_eq!(backend.emails_of(USER)[0].status, EmailStatus::OutreachSent);
    }

    #[test]
    fn test_mailto_marks_sent() {
        let (backend, mut board) = board_with(vec![
            EmailRecord::new(1, "a@acme.com", Stage::Outreach).with_subject("Hi"),
        ]);
        board.refresh().unwrap();

        let link = board.mailto(EmailId(1)).unwrap();
        assert!(link.starts_with("mailto:a@acme.com?subject=Hi"));
        assert_eq!(backend.emails_of(USER)[0].status, EmailStatus::OutreachSent);

        assert!(matches!(
            board.mailto(EmailId(42)),
            Err(ClientError::Validation(ValidationError::UnknownEmail(42)))
        ));
    }

    #[test]
    fn test_attached_board_receives_broadcasts() {
        let (_, mut board) = board_with(vec![EmailRecord::new(1, "a@acme.com", Stage::Outreach)]);
        board.refresh().unwrap();
        let board = Arc::new(Mutex::new(board));
        let bus = EmailBus::new();
        let _subscription = StageBoard::attach(&board, &bus);

        bus.publish(&EmailsUpdated::new(vec![
            EmailRecord::new(1, "a@acme.com", Stage::Outreach)
                .with_status(EmailStatus::SentByFriend),
        ]));
        let board = board.lock().unwrap();
        assert_eq!(
            board.view(Stage::Outreach).records()[0].status,
            EmailStatus::SentByFriend
        );
    }
}
