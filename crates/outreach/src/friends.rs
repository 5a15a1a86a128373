//! Friends and contact sharing
//!
//! Sharing contact caches with a friend changes which of the user's emails
//! count as already sent. Those changes come back from the backend and are
//! broadcast on the [`EmailBus`] so stage views pick them up.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::backend::{Backend, Bearer};
use crate::banner::Banner;
use crate::confirm::{Confirm, Outcome};
use crate::error::{ClientError, Result, ValidationError};
use crate::events::{EmailBus, EmailsUpdated};
use crate::models::{Friend, FriendId, FriendRequest, RequestDecision, same_email};

const REMOVE_PROMPT: &str = "Are you sure you want to remove this friend?";

/// Friend list, pending requests and sharing toggles
pub struct FriendPanel {
    backend: Arc<dyn Backend>,
    bearer: Bearer,
    bus: EmailBus,
    friends: Vec<Friend>,
    requests: Vec<FriendRequest>,
    /// Requests sent from this panel; the backend does not list them
    sent: Vec<String>,
    banner: Banner,
}

impl FriendPanel {
    pub fn new(backend: Arc<dyn Backend>, bearer: Bearer, bus: EmailBus) -> Self {
        Self {
            backend,
            bearer,
            bus,
            friends: Vec::new(),
            requests: Vec::new(),
            sent: Vec::new(),
            banner: Banner::new(),
        }
    }

    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    /// Incoming requests
    pub fn requests(&self) -> &[FriendRequest] {
        &self.requests
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    fn friend(&self, id: FriendId) -> Result<&Friend> {
        self.friends
            .iter()
            .find(|f| f.id == id)
            .ok_or(ClientError::Validation(ValidationError::UnknownFriend(id.0)))
    }

    /// Fetch friends and incoming requests
    pub fn load(&mut self) -> Result<()> {
        let friends = self.backend.friends(&self.bearer);
        let requests = self.backend.friend_requests(&self.bearer);

        let mut first_error = None;
        match friends {
            Ok(friends) => self.friends = friends,
            Err(e) => {
                warn!("Failed to load friends: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match requests {
            Ok(requests) => self.requests = requests,
            Err(e) => {
                warn!("Failed to load friend requests: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                self.banner.error(e.user_message("Failed to load friends data"));
                Err(e)
            }
            None => {
                debug!(
                    "Loaded {} friends and {} requests",
                    self.friends.len(),
                    self.requests.len()
                );
                Ok(())
            }
        }
    }

    fn check_request_target(&self, email: &str) -> Result<(), ValidationError> {
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        if same_email(email, self.bearer.email()) {
            return Err(ValidationError::SelfFriendRequest);
        }
        if self.friends.iter().any(|f| same_email(&f.email, email)) {
            return Err(ValidationError::AlreadyFriends);
        }
        let pending = self.requests.iter().any(|r| same_email(&r.email, email))
            || self.sent.iter().any(|s| same_email(s, email));
        if pending {
            return Err(ValidationError::PendingFriendRequest);
        }
        Ok(())
    }

    /// Send a friend request.
    ///
    /// Refused without a request when the address is the user's own, an
    /// existing friend, or already has a pending request.
    pub fn send_request(&mut self, email: &str) -> Result<()> {
        let email = email.trim();
        if let Err(invalid) = self.check_request_target(email) {
            self.banner.error(invalid.to_string());
            return Err(invalid.into());
        }

        match self.backend.send_friend_request(&self.bearer, email) {
            Ok(()) => {
                info!("Friend request sent to {}", email);
                self.sent.push(email.to_string());
                self.banner.success("Friend request sent successfully");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send friend request to {}: {}", email, e);
                self.banner.error(e.user_message("Failed to send friend request"));
                Err(e)
            }
        }
    }

    /// Accept or reject an incoming request, then reload both lists
    pub fn respond(&mut self, request_id: FriendId, decision: RequestDecision) -> Result<()> {
        let result = self
            .backend
            .respond_to_friend_request(&self.bearer, request_id, decision);

        match &result {
            Ok(()) => {
                info!("Friend request {} {}", request_id, decision.as_str());
                self.banner.success(format!("Friend request {}", decision.as_str()));
            }
            Err(e) => {
                warn!("Failed to answer friend request {}: {}", request_id, e);
                let fallback = match decision {
                    RequestDecision::Accepted => "Failed to accept friend request",
                    RequestDecision::Rejected => "Failed to reject friend request",
                };
                self.banner.error(e.user_message(fallback));
            }
        }

        if let Err(e) = self.load() {
            debug!("Reload after responding failed: {}", e);
        }
        result
    }

    /// Turn contact sharing with a friend on or off and broadcast the
    /// emails it changed. Returns how many emails changed.
    pub fn toggle_sharing(&mut self, friend_id: FriendId, enabled: bool) -> Result<usize> {
        self.friend(friend_id)?;

        let updated = self
            .backend
            .set_sharing(&self.bearer, friend_id, enabled)
            .map_err(|e| {
                warn!("Failed to set sharing for friend {}: {}", friend_id, e);
                self.banner
                    .error(e.user_message("Failed to update sharing settings"));
                e
            })?;

        if let Some(friend) = self.friends.iter_mut().find(|f| f.id == friend_id) {
            friend.combine_contacts = enabled;
        }

        let changed = updated.len();
        info!(
            "Sharing with friend {} {}; {} emails changed",
            friend_id,
            if enabled { "enabled" } else { "disabled" },
            changed
        );
        self.bus.publish(&EmailsUpdated::new(updated));
        Ok(changed)
    }

    /// Remove a friend after confirmation.
    ///
    /// Sharing is switched off first when enabled, so its email changes are
    /// broadcast before the friendship goes away.
    pub fn remove_friend(&mut self, friend_id: FriendId, confirm: &dyn Confirm) -> Result<Outcome> {
        let sharing = self.friend(friend_id)?.combine_contacts;
        if !confirm.confirm(REMOVE_PROMPT) {
            return Ok(Outcome::Cancelled);
        }

        if sharing {
            self.toggle_sharing(friend_id, false)?;
        }

        let updated = self
            .backend
            .remove_friend(&self.bearer, friend_id)
            .map_err(|e| {
                warn!("Failed to remove friend {}: {}", friend_id, e);
                self.banner.error(e.user_message("Failed to remove friend"));
                e
            })?;

        self.friends.retain(|f| f.id != friend_id);
        self.bus.publish(&EmailsUpdated::new(updated));
        info!("Removed friend {}", friend_id);
        self.banner.success("Friend removed successfully");
        Ok(Outcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Failure, InMemoryBackend};
    use crate::confirm::{AlwaysConfirm, NeverConfirm};
    use crate::models::{EmailRecord, EmailStatus, Stage, UserProfile};
    use std::sync::Mutex;

    const USER: &str = "me@x.com";

    fn friend(id: i64, email: &str, sharing: bool) -> Friend {
        Friend {
            id: FriendId(id),
            email: email.to_string(),
            name: None,
            combine_contacts: sharing,
        }
    }

    fn panel() -> (Arc<InMemoryBackend>, EmailBus, FriendPanel) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_user(UserProfile::pending(USER));
        backend.add_user(UserProfile::pending("new@x.com"));
        backend.add_friend(USER, friend(10, "pal@x.com", false), &["lead@acme.com"]);
        backend.add_friend_request(
            USER,
            FriendRequest {
                id: FriendId(20),
                email: "asker@x.com".to_string(),
                name: None,
                created_at: None,
            },
        );
        let bus = EmailBus::new();
        let mut panel = FriendPanel::new(backend.clone(), Bearer::new(USER), bus.clone());
        panel.load().unwrap();
        (backend, bus, panel)
    }

    #[test]
    fn test_invalid_requests_make_no_call() {
        let (backend, _, mut panel) = panel();
        backend.reset_calls();

        let cases = [
            ("ME@x.com", ValidationError::SelfFriendRequest),
            ("pal@x.com", ValidationError::AlreadyFriends),
            ("asker@x.com", ValidationError::PendingFriendRequest),
        ];
        for (email, expected) in cases {
            match panel.send_request(email) {
                Err(ClientError::Validation(v)) => assert_eq!(v, expected),
                other => panic!("unexpected result for {}: {:?}", email, other),
            }
            assert_eq!(
                panel.banner().current().map(|m| m.text.clone()),
                Some(expected.to_string())
            );
        }
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_request_sent_once() {
        let (backend, _, mut panel) = panel();
        panel.send_request("new@x.com").unwrap();
        assert_eq!(
            panel.banner().current().map(|m| m.text.as_str()),
            Some("Friend request sent successfully")
        );

        let err = panel.send_request("new@x.com").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::PendingFriendRequest)
        ));
        assert_eq!(backend.call_count("send_friend_request"), 1);
    }

    #[test]
    fn test_respond_reloads_even_on_failure() {
        let (backend, _, mut panel) = panel();
        backend.reset_calls();
        backend.fail_next("respond_to_friend_request", Failure::Rejected(404, None));

        assert!(panel.respond(FriendId(20), RequestDecision::Accepted).is_err());
        assert_eq!(backend.call_count("friends"), 1);
        assert_eq!(backend.call_count("friend_requests"), 1);

        panel.respond(FriendId(20), RequestDecision::Accepted).unwrap();
        assert!(panel.requests().is_empty());
        assert!(panel.friends().iter().any(|f| f.email == "asker@x.com"));
    }

    #[test]
    fn test_toggle_sharing_broadcasts_changes() {
        let (backend, bus, mut panel) = panel();
        backend.add_email(USER, EmailRecord::new(1, "lead@acme.com", Stage::Outreach));
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let _sub = bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        assert_eq!(panel.toggle_sharing(FriendId(10), true).unwrap(), 1);
        assert!(panel.friends()[0].combine_contacts);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].records[0].status, EmailStatus::SentByFriend);
    }

    #[test]
    fn test_unknown_friend_is_local_error() {
        let (backend, _, mut panel) = panel();
        backend.reset_calls();
        assert!(matches!(
            panel.toggle_sharing(FriendId(99), true),
            Err(ClientError::Validation(ValidationError::UnknownFriend(99)))
        ));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_remove_disables_sharing_first() {
        let (backend, bus, mut panel) = panel();
        backend.add_email(USER, EmailRecord::new(1, "lead@acme.com", Stage::Outreach));
        panel.toggle_sharing(FriendId(10), true).unwrap();

        let events = Arc::new(Mutex::new(0));
        let counter = events.clone();
        let _sub = bus.subscribe(move |_| *counter.lock().unwrap() += 1);
        backend.reset_calls();

        assert_eq!(
            panel.remove_friend(FriendId(10), &AlwaysConfirm).unwrap(),
            Outcome::Done
        );
        assert_eq!(backend.calls(), vec!["set_sharing", "remove_friend"]);
        assert_eq!(*events.lock().unwrap(), 1);
        assert_eq!(backend.emails_of(USER)[0].status, EmailStatus::Draft);
        assert!(panel.friends().is_empty());
    }

    #[test]
    fn test_remove_cancelled() {
        let (backend, _, mut panel) = panel();
        backend.reset_calls();
        assert_eq!(
            panel.remove_friend(FriendId(10), &NeverConfirm).unwrap(),
            Outcome::Cancelled
        );
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_load_failure_banner() {
        let (backend, _, mut panel) = panel();
        backend.fail_next("friends", Failure::Rejected(500, None));
        assert!(panel.load().is_err());
        assert_eq!(
            panel.banner().current().map(|m| m.text.as_str()),
            Some("Failed to load friends data")
        );
    }
}
