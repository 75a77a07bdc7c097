use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single current-session record. There is exactly one per process,
/// owned by the engine task, and transitions replace it wholesale instead of
/// patching fields, so a missed clear can't leak a stale start point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Idle,
    Tracking {
        domain: String,
        source_url: String,
        /// Wall-clock point accumulation restarts from; `None` while paused
        /// (window unfocused) so a later flush can't double-count.
        started_at: Option<DateTime<Utc>>,
        is_active: bool,
    },
}

impl Session {
    /// Starts tracking a domain. When the owning window isn't focused the
    /// session begins paused; the timer first starts on focus gain, so only
    /// focused wall-clock time is ever attributed.
    pub fn tracking(
        domain: String,
        source_url: String,
        now: DateTime<Utc>,
        window_focused: bool,
    ) -> Self {
        Self::Tracking {
            domain,
            source_url,
            started_at: window_focused.then_some(now),
            is_active: window_focused,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Tracking { domain, .. } => Some(domain),
        }
    }

    pub fn is_tracking(&self, candidate: &str) -> bool {
        self.domain() == Some(candidate)
    }

    /// Stops the timer without leaving the domain, used on focus loss.
    pub fn pause(&mut self) {
        if let Self::Tracking {
            started_at,
            is_active,
            ..
        } = self
        {
            *started_at = None;
            *is_active = false;
        }
    }

    /// Restarts the timer at `now`, used on focus gain for the same domain
    /// and after a periodic flush.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Self::Tracking {
            started_at,
            is_active,
            ..
        } = self
        {
            *started_at = Some(now);
            *is_active = true;
        }
    }

    /// Moves the accounting point to `now` without touching focus state.
    /// Called the moment an interval has been banked, so a flush that fails
    /// in a later step can't count the same seconds again.
    pub fn rebase(&mut self, now: DateTime<Utc>) {
        if let Self::Tracking {
            started_at: Some(at),
            ..
        } = self
        {
            *at = now;
        }
    }

    /// The open interval to account for, if any.
    pub fn open_interval(&self) -> Option<(&str, &str, DateTime<Utc>)> {
        match self {
            Self::Tracking {
                domain,
                source_url,
                started_at: Some(started),
                ..
            } => Some((domain, source_url, *started)),
            _ => None,
        }
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(
            self,
            Self::Tracking {
                started_at: Some(_),
                is_active: true,
                ..
            }
        )
    }

    pub fn snapshot(&self) -> CurrentSession {
        match self {
            Self::Idle => CurrentSession::default(),
            Self::Tracking {
                domain,
                source_url,
                started_at,
                is_active,
            } => CurrentSession {
                domain: Some(domain.clone()),
                url: Some(source_url.clone()),
                start_time: started_at.map(|at| at.timestamp_millis()),
                is_active: *is_active,
            },
        }
    }
}

/// Answer to the `getCurrentSession` query from the popup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentSession {
    pub domain: Option<String>,
    pub url: Option<String>,
    /// Epoch milliseconds of the last start/resume point.
    pub start_time: Option<i64>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::Session;

    #[test]
    fn pause_clears_start_point_but_keeps_domain() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap();
        let mut session = Session::tracking("a.com".into(), "https://a.com/".into(), now, true);
        assert!(session.is_accumulating());

        session.pause();
        assert!(session.is_tracking("a.com"));
        assert!(!session.is_accumulating());
        assert_eq!(session.open_interval(), None);

        let later = now + chrono::Duration::seconds(30);
        session.resume(later);
        assert_eq!(
            session.open_interval().map(|(d, _, at)| (d.to_owned(), at)),
            Some(("a.com".to_owned(), later))
        );
    }

    #[test]
    fn idle_snapshot_is_empty() {
        let snapshot = Session::Idle.snapshot();
        assert_eq!(snapshot.domain, None);
        assert_eq!(snapshot.start_time, None);
        assert!(!snapshot.is_active);
    }

    #[test]
    fn rebase_moves_only_an_open_interval() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap();
        let mut session = Session::tracking("a.com".into(), "https://a.com/".into(), now, true);

        let later = now + chrono::Duration::seconds(10);
        session.rebase(later);
        assert_eq!(session.open_interval().map(|(_, _, at)| at), Some(later));
        assert!(session.is_accumulating());

        session.pause();
        session.rebase(later + chrono::Duration::seconds(10));
        assert_eq!(session.open_interval(), None);
    }

    #[test]
    fn unfocused_start_begins_paused() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap();
        let session = Session::tracking("a.com".into(), "https://a.com/".into(), now, false);
        assert!(session.is_tracking("a.com"));
        assert!(!session.is_accumulating());
        assert_eq!(session.open_interval(), None);
    }
}
