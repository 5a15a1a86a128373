//! Integration tests for the outreach crate
//!
//! These tests drive the public API end to end against the in-memory
//! backend: sign-in, stage views, sharing broadcasts and Gmail polling.

use chrono::{Duration as ChronoDuration, Utc};
use outreach::{
    AlwaysConfirm, AuthStep, ClientError, CodeInput, ConnectState, EmailBus, EmailId,
    EmailRecord, EmailStatus, FileIdentityStore, Friend, FriendId, FriendPanel, FriendRequest,
    GmailConnect, IdentityStore, InMemoryBackend, MemoryIdentityStore, PollSettings, Session,
    Stage, StageBoard, UrlOpener, UserProfile, ValidationError,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const USER: &str = "a@x.com";

struct NoBrowser;

impl UrlOpener for NoBrowser {
    fn open(&self, _url: &str) {}
}

/// Backend with one registered user
fn backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    let mut profile = UserProfile::pending(USER);
    profile.full_name = Some("Ada Lovelace".to_string());
    backend.add_user(profile);
    backend
}

/// Session signed in through the code flow
fn signed_in(backend: &Arc<InMemoryBackend>) -> Session {
    let mut session = Session::new(backend.clone(), Arc::new(MemoryIdentityStore::new()));
    backend.set_next_code("424242");
    session.request_auth_code(USER).unwrap();
    session.verify_auth_code(USER, "424242").unwrap();
    session
}

fn friend(id: i64, email: &str) -> Friend {
    Friend {
        id: FriendId(id),
        email: email.to_string(),
        name: Some("Pal".to_string()),
        combine_contacts: false,
    }
}

#[test]
fn test_typed_and_pasted_codes_agree() {
    for n in (0..1_000_000u32).step_by(7_919) {
        let code = format!("{:06}", n);

        let mut typed = CodeInput::new();
        for (i, ch) in code.chars().enumerate() {
            assert!(typed.enter(i, ch));
        }
        let mut pasted = CodeInput::new();
        assert!(pasted.paste(&code));

        assert_eq!(typed.complete_code().as_deref(), Some(code.as_str()));
        assert_eq!(pasted.complete_code().as_deref(), Some(code.as_str()));
    }
}

#[test]
fn test_invalid_paste_leaves_cells_unchanged() {
    let mut input = CodeInput::new();
    input.enter(0, '9');
    input.enter(1, '8');
    let before = input.clone();

    for text in ["", "1", "12345", "1234567", "12 456", "abcdef", "12345x"] {
        assert!(!input.paste(text));
        assert_eq!(input, before);
    }
}

#[test]
fn test_sign_in_scenario() {
    let backend = backend();
    let dir = TempDir::new().unwrap();
    let identity = Arc::new(FileIdentityStore::at(dir.path().join("session.json")));
    let mut session = Session::new(backend.clone(), identity.clone());

    backend.set_next_code("135790");
    session.request_auth_code(USER).unwrap();
    assert_eq!(session.step(), AuthStep::Code);

    let err = session.verify_auth_code(USER, "000000").unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
    assert_eq!(session.step(), AuthStep::Code);
    assert!(!session.is_authenticated());
    assert_eq!(session.email(), USER);

    session.verify_auth_code(USER, "135790").unwrap();
    assert_eq!(session.step(), AuthStep::Profile);
    assert!(session.is_authenticated());
    assert_eq!(identity.load().unwrap().as_deref(), Some(USER));
    assert_eq!(
        session.profile().and_then(|p| p.full_name.as_deref()),
        Some("Ada Lovelace")
    );

    // A new process picks the identity up again
    let restored = Session::restore(backend, identity);
    assert!(restored.is_authenticated());
    assert_eq!(restored.email(), USER);
}

#[test]
fn test_verify_failure_keeps_email_and_stays_signed_out() {
    let backend = backend();
    let mut session = Session::new(backend.clone(), Arc::new(MemoryIdentityStore::new()));
    session.request_auth_code(USER).unwrap();

    backend.fail_next("verify_code", outreach::Failure::Timeout);
    let err = session.verify_auth_code(USER, "123456").unwrap_err();
    assert!(err.is_no_response());
    assert!(!session.is_authenticated());
    assert_eq!(session.email(), USER);
    assert!(session.bearer().is_none());
}

#[test]
fn test_sent_outreach_with_due_date_listed_under_followup() {
    let backend = backend();
    backend.add_email(
        USER,
        EmailRecord::new(7, "lead@acme.com", Stage::Outreach)
            .with_status(EmailStatus::OutreachSent)
            .with_followup_due_at(Utc::now() + ChronoDuration::days(3)),
    );
    let session = signed_in(&backend);
    let mut board = StageBoard::new(backend.clone(), session.require_bearer().unwrap());

    board.refresh().unwrap();
    assert!(board.view(Stage::Outreach).get(EmailId(7)).is_none());
    assert!(board.view(Stage::Followup).get(EmailId(7)).is_some());
    assert_eq!(board.view(Stage::Followup).len(), 1);
}

#[test]
fn test_sharing_updates_reach_stage_views() {
    let backend = backend();
    backend.add_email(USER, EmailRecord::new(1, "lead@acme.com", Stage::Outreach));
    backend.add_email(USER, EmailRecord::new(2, "other@acme.com", Stage::Outreach));
    backend.add_email(USER, EmailRecord::new(3, "lead@acme.com", Stage::Lastchance));
    backend.add_friend(USER, friend(50, "pal@x.com"), &["lead@acme.com"]);

    let session = signed_in(&backend);
    let bearer = session.require_bearer().unwrap();
    let bus = EmailBus::new();

    let mut board = StageBoard::new(backend.clone(), bearer.clone());
    board.refresh().unwrap();
    let board = Arc::new(Mutex::new(board));
    let _subscription = StageBoard::attach(&board, &bus);

    let mut panel = FriendPanel::new(backend.clone(), bearer, bus);
    panel.load().unwrap();
    backend.reset_calls();

    assert_eq!(panel.toggle_sharing(FriendId(50), true).unwrap(), 2);
    // No refetch: the views were patched from the broadcast
    assert_eq!(backend.call_count("emails_by_stage"), 0);

    let board = board.lock().unwrap();
    let outreach = board.view(Stage::Outreach);
    assert_eq!(outreach.get(EmailId(1)).unwrap().status, EmailStatus::SentByFriend);
    assert_eq!(outreach.get(EmailId(2)).unwrap().status, EmailStatus::Draft);
    assert_eq!(
        board.view(Stage::Lastchance).get(EmailId(3)).unwrap().shared_by.as_deref(),
        Some("pal@x.com")
    );
}

#[test]
fn test_remove_sharing_friend_restores_drafts() {
    let backend = backend();
    backend.add_email(USER, EmailRecord::new(1, "lead@acme.com", Stage::Outreach));
    backend.add_friend(USER, friend(50, "pal@x.com"), &["lead@acme.com"]);

    let session = signed_in(&backend);
    let bearer = session.require_bearer().unwrap();
    let bus = EmailBus::new();
    let mut board = StageBoard::new(backend.clone(), bearer.clone());
    board.refresh().unwrap();
    let board = Arc::new(Mutex::new(board));
    let _subscription = StageBoard::attach(&board, &bus);

    let mut panel = FriendPanel::new(backend.clone(), bearer, bus);
    panel.load().unwrap();
    panel.toggle_sharing(FriendId(50), true).unwrap();
    panel.remove_friend(FriendId(50), &AlwaysConfirm).unwrap();

    let board = board.lock().unwrap();
    assert_eq!(
        board.view(Stage::Outreach).get(EmailId(1)).unwrap().status,
        EmailStatus::Draft
    );
    assert!(backend.friends_of(USER).is_empty());
}

#[test]
fn test_invalid_friend_requests_issue_no_calls() {
    let backend = backend();
    backend.add_friend(USER, friend(50, "pal@x.com"), &[]);
    backend.add_friend_request(
        USER,
        FriendRequest {
            id: FriendId(60),
            email: "asker@x.com".to_string(),
            name: None,
            created_at: None,
        },
    );
    let session = signed_in(&backend);
    let mut panel = FriendPanel::new(backend.clone(), session.require_bearer().unwrap(), EmailBus::new());
    panel.load().unwrap();
    backend.reset_calls();

    let expectations = [
        (USER, ValidationError::SelfFriendRequest),
        ("Pal@X.com", ValidationError::AlreadyFriends),
        ("asker@x.com", ValidationError::PendingFriendRequest),
    ];
    for (email, expected) in expectations {
        let err = panel.send_request(email).unwrap_err();
        assert!(matches!(&err, ClientError::Validation(v) if *v == expected));
        assert_eq!(err.user_message(""), expected.to_string());
    }
    assert!(backend.calls().is_empty());
}

#[test]
fn test_gmail_poll_stops_once_connected() {
    let backend = backend();
    let session = signed_in(&backend);
    backend.grant_gmail_after_fetches(USER, 3);

    let poll = PollSettings {
        interval: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
    };
    let mut connect = GmailConnect::new(
        backend.clone(),
        session.require_bearer().unwrap(),
        Arc::new(NoBrowser),
        poll,
    );
    connect.connect().unwrap();
    assert_eq!(connect.wait(), ConnectState::Connected);

    let fetches = backend.call_count("fetch_profile");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(backend.call_count("fetch_profile"), fetches);
    assert_eq!(connect.live_loops(), 0);
}

#[test]
fn test_gmail_poll_stops_at_ceiling() {
    let backend = backend();
    let session = signed_in(&backend);

    let poll = PollSettings {
        interval: Duration::from_millis(5),
        timeout: Duration::from_millis(80),
    };
    let mut connect = GmailConnect::new(
        backend.clone(),
        session.require_bearer().unwrap(),
        Arc::new(NoBrowser),
        poll,
    );
    connect.connect().unwrap();
    assert_eq!(connect.wait(), ConnectState::TimedOut);

    let fetches = backend.call_count("fetch_profile");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(backend.call_count("fetch_profile"), fetches);
}

#[test]
fn test_second_connect_leaves_single_loop() {
    let backend = backend();
    let session = signed_in(&backend);
    let poll = PollSettings {
        interval: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
    };
    let mut connect = GmailConnect::new(
        backend.clone(),
        session.require_bearer().unwrap(),
        Arc::new(NoBrowser),
        poll,
    );

    connect.connect().unwrap();
    thread::sleep(Duration::from_millis(20));
    connect.connect().unwrap();
    assert_eq!(connect.live_loops(), 1);
    assert_eq!(connect.state(), ConnectState::Connecting);

    drop(connect);
    let fetches = backend.call_count("fetch_profile");
    thread::sleep(Duration::from_millis(30));
    assert_eq!(backend.call_count("fetch_profile"), fetches);
}
