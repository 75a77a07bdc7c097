use anyhow::Result;
use tracing::{debug, info};

use crate::{
    host::messages::{HostPort, OutboundMessage},
    store::{entities::VisitEntry, state_store::StateStore},
    utils::clock::Clock,
};

use super::{
    classify::classify,
    reminder::ReminderEngine,
    retention::{advisory_threshold_bytes, RetentionManager},
    session::Session,
};

/// Owns the single current-session record and the whole accounting path.
/// Everything that reads or writes the ledger goes through this type, on one
/// task, which is what rules out lost updates between interleaved handlers.
pub struct SessionTracker<S, P> {
    session: Session,
    store: S,
    port: P,
    retention: RetentionManager,
    clock: Box<dyn Clock>,
    advisory_threshold: u64,
    storage_advisory_sent: bool,
}

impl<S: StateStore, P: HostPort> SessionTracker<S, P> {
    pub fn new(store: S, port: P, clock: Box<dyn Clock>) -> Self {
        Self {
            session: Session::Idle,
            store,
            port,
            retention: RetentionManager::default(),
            clock,
            advisory_threshold: advisory_threshold_bytes(),
            storage_advisory_sent: false,
        }
    }

    pub fn set_advisory_threshold(&mut self, bytes: u64) {
        self.advisory_threshold = bytes;
    }

    /// A trackable (or untrackable) URL became the active one. `domain` is the
    /// classifier's verdict for `url`.
    pub async fn on_domain_observed(
        &mut self,
        domain: Option<&str>,
        url: &str,
        window_focused: bool,
    ) -> Result<()> {
        let settings = self.store.load_settings().await?;
        let no_track = domain.is_some_and(|d| settings.is_no_track(d, url));

        if let Some(d) = domain {
            // Re-navigation within the tracked domain keeps the timer running,
            // unless the domain has meanwhile landed on the no-track list.
            if self.session.is_tracking(d) && !no_track {
                return Ok(());
            }
        }

        self.flush().await?;

        let Some(domain) = domain.filter(|_| !no_track) else {
            if no_track {
                debug!("Domain is on the no-track list, going idle");
            }
            self.session = Session::Idle;
            return Ok(());
        };

        let now = self.clock.time();
        self.session = Session::tracking(domain.to_owned(), url.to_owned(), now, window_focused);
        info!("Tracking {domain}");

        let mut starts = self.store.load_session_starts().await?;
        if starts.mark_first(domain, now.date_naive(), now.timestamp_millis()) {
            self.store.save_session_starts(&starts).await?;
        }
        Ok(())
    }

    /// The browser lost focus: account for time up to this instant, then
    /// pause the timer without leaving the domain.
    pub async fn on_focus_lost(&mut self) -> Result<()> {
        self.flush().await?;
        self.session.pause();
        Ok(())
    }

    /// The browser regained focus with `url` active. Resuming the tracked
    /// domain restarts the timer in place; anything else is a full
    /// transition. A missing URL means the active tab vanished mid-query;
    /// the session is left as it was.
    pub async fn on_focus_gained(&mut self, url: Option<&str>) -> Result<()> {
        let Some(url) = url else {
            return Ok(());
        };
        let domain = classify(url);
        if let Some(d) = &domain {
            if self.session.is_tracking(d) {
                self.session.resume(self.clock.time());
                return Ok(());
            }
        }
        self.on_domain_observed(domain.as_deref(), url, true).await
    }

    /// Periodic reconciliation: persist the open interval, so long sessions
    /// reach the ledger incrementally and reminders fire promptly instead of
    /// only at domain-switch time. The flush itself restarts the timer once
    /// the interval is banked.
    pub async fn on_periodic_tick(&mut self) -> Result<()> {
        if !self.session.is_accumulating() {
            return Ok(());
        }
        self.flush().await
    }

    pub async fn run_retention(&mut self) -> Result<()> {
        let report = self.retention.run(&self.store, self.clock.today()).await?;
        if report.persisted_bytes > self.advisory_threshold && !self.storage_advisory_sent {
            ReminderEngine::storage_advisory(&mut self.port, report.persisted_bytes).await;
            self.storage_advisory_sent = true;
        }
        Ok(())
    }

    pub fn on_day_rollover(&mut self) {
        self.storage_advisory_sent = false;
    }

    pub async fn on_install(&self) -> Result<()> {
        self.store.ensure_initialized().await
    }

    pub async fn on_startup(&mut self, url: Option<&str>, window_focused: bool) -> Result<()> {
        match url {
            Some(url) => {
                self.on_domain_observed(classify(url).as_deref(), url, window_focused)
                    .await
            }
            None => Ok(()),
        }
    }

    pub async fn send_current_session(&mut self) -> Result<()> {
        let session = self.session.snapshot();
        self.port
            .send(OutboundMessage::CurrentSession { session })
            .await
    }

    pub async fn notify_note_state(&mut self, key: &str) -> Result<()> {
        let notes = self.store.load_notes().await?;
        self.port
            .send(OutboundMessage::NoteUpdated {
                has_note: notes.has_note(key),
            })
            .await
    }

    /// Final flush before the process goes away, so an open interval
    /// survives a clean shutdown.
    pub async fn finalize(&mut self) -> Result<()> {
        self.flush().await
    }

    /// Accumulate-and-clear: add the open interval's whole seconds to the
    /// ledger, refresh the visit history, then run both reminder checks.
    /// The session's start point moves forward as soon as the ledger write
    /// lands; a failure in any later step then degrades that one flush
    /// without the next tick counting the banked interval again.
    async fn flush(&mut self) -> Result<()> {
        let Some((domain, url, started)) = self
            .session
            .open_interval()
            .map(|(d, u, at)| (d.to_owned(), u.to_owned(), at))
        else {
            return Ok(());
        };

        let now = self.clock.time();
        let elapsed = (now - started).num_seconds();
        // Guards against clock skew and zero-duration flushes.
        if elapsed <= 0 {
            return Ok(());
        }
        let today = now.date_naive();

        let mut ledger = self.store.load_ledger().await?;
        let total_today = ledger.add(&domain, today, elapsed as u64);
        self.store.save_ledger(&ledger).await?;
        // The interval is durable now; restart the timer before anything
        // else can fail.
        self.session.rebase(now);
        debug!("Flushed {elapsed}s for {domain}, {total_today}s today");

        let mut visits = self.store.load_visits().await?;
        visits.record(VisitEntry {
            domain: domain.clone(),
            url,
            last_visit: now.timestamp_millis(),
            today_seconds: total_today,
        });
        self.store.save_visits(&visits).await?;

        let settings = self.store.load_settings().await?;
        let now_ms = now.timestamp_millis();

        let mut limit_marks = self.store.load_limit_marks().await?;
        if ReminderEngine::check_site_limit(
            &mut self.port,
            &settings,
            &domain,
            total_today,
            today,
            now_ms,
            &mut limit_marks,
        )
        .await?
        {
            self.store.save_limit_marks(&limit_marks).await?;
        }

        let mut goal_marks = self.store.load_goal_marks().await?;
        if ReminderEngine::check_daily_goal(
            &mut self.port,
            &settings,
            &ledger,
            today,
            now_ms,
            &mut goal_marks,
        )
        .await?
        {
            self.store.save_goal_marks(&goal_marks).await?;
        }
        Ok(())
    }
}
