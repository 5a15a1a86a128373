//! Transient success/error banner
//!
//! A banner shows one message at a time and clears itself three seconds
//! after it was shown. Showing a new message restarts the clock, so an
//! older message's expiry never dismisses a newer one.

use std::time::{Duration, Instant};

/// How long a message stays visible
pub const BANNER_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerMessage {
    pub kind: BannerKind,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Banner {
    current: Option<(BannerMessage, Instant)>,
}

impl Banner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, kind: BannerKind, text: impl Into<String>) {
        self.show_at(kind, text, Instant::now());
    }

    /// Show a message as of `now`, replacing any pending one
    pub fn show_at(&mut self, kind: BannerKind, text: impl Into<String>, now: Instant) {
        let message = BannerMessage {
            kind,
            text: text.into(),
        };
        self.current = Some((message, now + BANNER_TTL));
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.show(BannerKind::Error, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.show(BannerKind::Success, text);
    }

    /// Visible message, if it has not expired
    pub fn current(&self) -> Option<&BannerMessage> {
        self.current_at(Instant::now())
    }

    pub fn current_at(&self, now: Instant) -> Option<&BannerMessage> {
        self.current
            .as_ref()
            .filter(|(_, expires)| now < *expires)
            .map(|(message, _)| message)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_expires() {
        let start = Instant::now();
        let mut banner = Banner::new();
        banner.show_at(BannerKind::Error, "Failed", start);

        assert_eq!(banner.current_at(start).map(|m| m.text.as_str()), Some("Failed"));
        assert!(banner.current_at(start + Duration::from_millis(2999)).is_some());
        assert!(banner.current_at(start + BANNER_TTL).is_none());
    }

    #[test]
    fn test_newer_message_is_not_cleared_early() {
        let start = Instant::now();
        let mut banner = Banner::new();
        banner.show_at(BannerKind::Error, "first", start);
        banner.show_at(BannerKind::Success, "second", start + Duration::from_secs(2));

        // The first message's clear time has passed
        let message = banner.current_at(start + Duration::from_secs(4)).unwrap();
        assert_eq!(message.text, "second");
        assert_eq!(message.kind, BannerKind::Success);
        assert!(banner.current_at(start + Duration::from_secs(5)).is_none());
    }
}
