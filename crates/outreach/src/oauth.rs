//! Gmail connection flow
//!
//! `connect()` fetches the Google authorization URL, opens it in the
//! browser and starts a background poll of the profile. The poll ends when
//! the profile carries a Gmail access token, when the ceiling is reached,
//! when a newer `connect()` supersedes it, or when the flow is dropped.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::backend::{Backend, Bearer};
use crate::config::PollSettings;
use crate::error::Result;
use crate::models::UserProfile;

/// Progress of a Gmail connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectState {
    #[default]
    Idle,
    Connecting,
    Connected,
    TimedOut,
}

impl ConnectState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectState::Connected | ConnectState::TimedOut)
    }
}

/// Opens the authorization URL for the user
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Opens URLs with the system browser
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) {
        if let Err(e) = open::that(url) {
            warn!("Could not open browser ({}); visit {} manually", e, url);
        }
    }
}

struct Shared {
    state: Mutex<ConnectState>,
    polls: AtomicUsize,
    live_loops: AtomicUsize,
    profile: Mutex<Option<UserProfile>>,
}

impl Shared {
    fn set_state(&self, state: ConnectState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> ConnectState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Worker {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

/// The Gmail connection flow of the signed-in user
pub struct GmailConnect {
    backend: Arc<dyn Backend>,
    bearer: Bearer,
    opener: Arc<dyn UrlOpener>,
    poll: PollSettings,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl GmailConnect {
    pub fn new(
        backend: Arc<dyn Backend>,
        bearer: Bearer,
        opener: Arc<dyn UrlOpener>,
        poll: PollSettings,
    ) -> Self {
        Self {
            backend,
            bearer,
            opener,
            poll,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectState::Idle),
                polls: AtomicUsize::new(0),
                live_loops: AtomicUsize::new(0),
                profile: Mutex::new(None),
            }),
            worker: None,
        }
    }

    /// Start (or restart) the connection flow.
    ///
    /// Any poll still running from a previous call is stopped first. If the
    /// authorization URL cannot be fetched the flow goes back to idle.
    pub fn connect(&mut self) -> Result<()> {
        self.cancel();

        let url = match self.backend.gmail_auth_url(&self.bearer) {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to start Gmail authorization: {}", e);
                self.shared.set_state(ConnectState::Idle);
                return Err(e);
            }
        };

        info!("Opening Gmail authorization page");
        self.opener.open(&url);
        self.shared.set_state(ConnectState::Connecting);
        self.spawn_poll();
        Ok(())
    }

    fn spawn_poll(&mut self) {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let backend = self.backend.clone();
        let bearer = self.bearer.clone();
        let shared = self.shared.clone();
        let poll = self.poll;

        shared.live_loops.fetch_add(1, Ordering::SeqCst);
        let handle = thread::spawn(move || {
            let deadline = Instant::now() + poll.timeout;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    info!("Gmail connection timed out after {:?}", poll.timeout);
                    shared.set_state(ConnectState::TimedOut);
                    break;
                }

                match cancelled.recv_timeout(poll.interval.min(deadline - now)) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("Gmail poll cancelled");
                        break;
                    }
                }
                if Instant::now() >= deadline {
                    continue;
                }

                shared.polls.fetch_add(1, Ordering::SeqCst);
                match backend.fetch_profile(&bearer) {
                    Ok(profile) if profile.has_gmail() => {
                        info!("Gmail connected");
                        *shared.profile.lock().unwrap_or_else(PoisonError::into_inner) =
                            Some(profile);
                        shared.set_state(ConnectState::Connected);
                        break;
                    }
                    Ok(_) => debug!("Gmail not connected yet"),
                    Err(e) => warn!("Gmail status check failed: {}", e),
                }
            }
            shared.live_loops.fetch_sub(1, Ordering::SeqCst);
        });

        self.worker = Some(Worker { cancel, handle });
    }

    /// Stop a running poll. A flow still connecting goes back to idle.
    pub fn cancel(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // A send error means the loop already ended
        let _ = worker.cancel.send(());
        if worker.handle.join().is_err() {
            warn!("Gmail poll thread panicked");
        }
        if !self.shared.state().is_terminal() {
            self.shared.set_state(ConnectState::Idle);
        }
    }

    /// Block until the running poll ends and return the final state
    pub fn wait(&mut self) -> ConnectState {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                warn!("Gmail poll thread panicked");
            }
        }
        self.shared.state()
    }

    pub fn state(&self) -> ConnectState {
        self.shared.state()
    }

    /// Profile checks made so far, across all connection attempts
    pub fn poll_count(&self) -> usize {
        self.shared.polls.load(Ordering::SeqCst)
    }

    /// Poll loops currently running
    pub fn live_loops(&self) -> usize {
        self.shared.live_loops.load(Ordering::SeqCst)
    }

    /// Profile that first showed the Gmail token
    pub fn latest_profile(&self) -> Option<UserProfile> {
        self.shared
            .profile
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for GmailConnect {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Failure, InMemoryBackend};
    use std::time::Duration;

    const USER: &str = "a@x.com";

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) {
            self.opened.lock().unwrap().push(url.to_string());
        }
    }

    fn fast_poll(timeout_ms: u64) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn flow(poll: PollSettings) -> (Arc<InMemoryBackend>, Arc<RecordingOpener>, GmailConnect) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_user(UserProfile::pending(USER));
        let opener = Arc::new(RecordingOpener::default());
        let connect = GmailConnect::new(backend.clone(), Bearer::new(USER), opener.clone(), poll);
        (backend, opener, connect)
    }

    #[test]
    fn test_connects_when_token_appears() {
        let (backend, opener, mut connect) = flow(fast_poll(5_000));
        backend.grant_gmail_after_fetches(USER, 2);

        connect.connect().unwrap();
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
        assert_eq!(connect.wait(), ConnectState::Connected);
        assert_eq!(connect.poll_count(), 3);
        assert!(connect.latest_profile().unwrap().has_gmail());
        assert_eq!(connect.live_loops(), 0);
    }

    #[test]
    fn test_times_out() {
        let (_, _, mut connect) = flow(fast_poll(60));
        connect.connect().unwrap();
        assert_eq!(connect.wait(), ConnectState::TimedOut);
        assert_eq!(connect.live_loops(), 0);

        // No polling after the terminal state
        let polls = connect.poll_count();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(connect.poll_count(), polls);
    }

    #[test]
    fn test_poll_errors_keep_polling() {
        let (backend, _, mut connect) = flow(fast_poll(5_000));
        backend.fail_next("fetch_profile", Failure::Transport);
        backend.grant_gmail_after_fetches(USER, 1);

        connect.connect().unwrap();
        assert_eq!(connect.wait(), ConnectState::Connected);
    }

    #[test]
    fn test_supersession_leaves_one_loop() {
        let (_, opener, mut connect) = flow(fast_poll(5_000));
        connect.connect().unwrap();
        connect.connect().unwrap();
        assert_eq!(connect.live_loops(), 1);
        assert_eq!(opener.opened.lock().unwrap().len(), 2);

        connect.cancel();
        assert_eq!(connect.live_loops(), 0);
        assert_eq!(connect.state(), ConnectState::Idle);
    }

    #[test]
    fn test_cancel_keeps_terminal_state() {
        assert!(ConnectState::Connected.is_terminal());
        assert!(ConnectState::TimedOut.is_terminal());
        assert!(!ConnectState::Connecting.is_terminal());

        let (_, _, mut connect) = flow(fast_poll(30));
        connect.connect().unwrap();
        thread::sleep(Duration::from_millis(80));
        connect.cancel();
        assert_eq!(connect.state(), ConnectState::TimedOut);
    }

    #[test]
    fn test_failed_auth_url_stays_idle() {
        let (backend, opener, mut connect) = flow(fast_poll(5_000));
        backend.fail_next("gmail_auth_url", Failure::Rejected(500, None));

        assert!(connect.connect().is_err());
        assert_eq!(connect.state(), ConnectState::Idle);
        assert!(opener.opened.lock().unwrap().is_empty());
        assert_eq!(connect.live_loops(), 0);
    }

    #[test]
    fn test_drop_stops_polling() {
        let (backend, _, mut connect) = flow(fast_poll(5_000));
        connect.connect().unwrap();
        drop(connect);

        let calls = backend.call_count("fetch_profile");
        thread::sleep(Duration::from_millis(40));
        assert_eq!(backend.call_count("fetch_profile"), calls);
    }
}
