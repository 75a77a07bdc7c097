use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    host::{
        messages::{BrowserEvent, HostPort},
        EventPump, StdioHost,
    },
    store::state_store::{JsonStateStore, StateStore},
    utils::clock::DefaultClock,
};

pub mod classify;
pub mod reminder;
pub mod retention;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod tracker;

use classify::classify;
use scheduler::{TickKind, TickTask};
use tracker::SessionTracker;

/// Everything the engine task reacts to: browser events off the wire and
/// ticks from the reconciliation scheduler, serialized on one channel.
#[derive(Debug)]
pub enum EngineMessage {
    Event(BrowserEvent),
    Tick(TickKind),
}

/// The single-writer task. It owns the [SessionTracker] and with it every
/// read-modify-write against persistent state; a handler error degrades that
/// one message and the loop keeps going.
pub struct Engine<S, P> {
    receiver: mpsc::Receiver<EngineMessage>,
    tracker: SessionTracker<S, P>,
}

impl<S: StateStore, P: HostPort> Engine<S, P> {
    pub fn new(receiver: mpsc::Receiver<EngineMessage>, tracker: SessionTracker<S, P>) -> Self {
        Self { receiver, tracker }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(message) = self.receiver.recv().await {
            debug!("Handling {:?}", message);
            if let Err(e) = self.handle(message).await {
                // Next tick re-derives elapsed time, so one failed flush
                // never corrupts the ledger's long-run totals.
                error!("Error handling engine message: {e:?}");
            }
        }

        let result = self.tracker.finalize().await;
        self.receiver.close();
        result
    }

    async fn handle(&mut self, message: EngineMessage) -> Result<()> {
        match message {
            EngineMessage::Event(event) => self.handle_event(event).await,
            EngineMessage::Tick(TickKind::Flush) | EngineMessage::Tick(TickKind::BackupFlush) => {
                self.tracker.on_periodic_tick().await
            }
            EngineMessage::Tick(TickKind::Retention) => self.tracker.run_retention().await,
            EngineMessage::Tick(TickKind::DayRollover) => {
                self.tracker.on_day_rollover();
                Ok(())
            }
        }
    }

    async fn handle_event(&mut self, event: BrowserEvent) -> Result<()> {
        match event {
            BrowserEvent::TabActivated {
                url,
                window_focused,
            } => {
                self.tracker
                    .on_domain_observed(classify(&url).as_deref(), &url, window_focused)
                    .await
            }
            BrowserEvent::TabUpdated {
                url,
                active,
                window_focused,
            } => {
                if !active {
                    return Ok(());
                }
                self.tracker
                    .on_domain_observed(classify(&url).as_deref(), &url, window_focused)
                    .await
            }
            BrowserEvent::WindowFocusChanged { focused: false, .. } => {
                self.tracker.on_focus_lost().await
            }
            BrowserEvent::WindowFocusChanged { focused: true, url } => {
                self.tracker.on_focus_gained(url.as_deref()).await
            }
            BrowserEvent::GetCurrentSession => self.tracker.send_current_session().await,
            BrowserEvent::Install => self.tracker.on_install().await,
            BrowserEvent::Startup {
                url,
                window_focused,
            } => {
                self.tracker
                    .on_startup(url.as_deref(), window_focused)
                    .await
            }
            BrowserEvent::NotesChanged { key } => self.tracker.notify_note_state(&key).await,
        }
    }
}

/// Represents the starting point for the daemon: wires the stdio event pump,
/// the tick tasks and the engine together and runs them to completion.
pub async fn start_engine(dir: PathBuf) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<EngineMessage>(16);

    let store = JsonStateStore::new(dir.join("state"))?;
    store.ensure_initialized().await?;

    let shutdown_token = CancellationToken::new();

    let tracker = SessionTracker::new(store, StdioHost::new(), Box::new(DefaultClock));
    let engine = Engine::new(receiver, tracker);
    let pump = EventPump::new(tokio::io::stdin(), sender.clone(), shutdown_token.clone());

    let [flush, backup, retention, rollover] = TickKind::all().map(|kind| {
        TickTask::new(
            kind,
            sender.clone(),
            shutdown_token.clone(),
            Box::new(DefaultClock),
        )
    });
    // The engine stops once every sender is gone; this one must not linger.
    drop(sender);

    let (_, pump_result, engine_result, f, b, r, d) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        pump.run(),
        engine.run(),
        flush.run(),
        backup.run(),
        retention.run(),
        rollover.run(),
    );

    for (name, result) in [
        ("event pump", pump_result),
        ("engine", engine_result),
        ("flush tick", f),
        ("backup tick", b),
        ("retention tick", r),
        ("rollover tick", d),
    ] {
        if let Err(e) = result {
            error!("{name} finished with an error {e:?}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod engine_tests {
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use crate::{
        host::messages::{BrowserEvent, MockHostPort, OutboundMessage},
        store::state_store::{JsonStateStore, StateStore},
        utils::{
            clock::{test_support::ManualClock, Clock},
            logging::TEST_LOGGING,
        },
    };

    use super::{
        scheduler::TickKind, tracker::SessionTracker, Engine, EngineMessage,
    };

    /// Drives the whole message loop the way the event pump and tick tasks
    /// would, checking that events become durable ledger entries.
    #[tokio::test]
    async fn smoke_test_engine_pipeline() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::starting_at_test_date();
        let today = clock.time().date_naive();

        let mut port = MockHostPort::new();
        port.expect_send()
            .withf(|m| {
                matches!(m, OutboundMessage::CurrentSession { session }
                    if session.domain.as_deref() == Some("a.com"))
            })
            .times(1)
            .returning(|_| Ok(()));

        let store = JsonStateStore::new(dir.path().to_owned())?;
        let tracker = SessionTracker::new(store, port, Box::new(clock.clone()));
        let (sender, receiver) = mpsc::channel::<EngineMessage>(16);
        let engine = Engine::new(receiver, tracker);

        let driver_clock = clock.clone();
        let driver = async move {
            let step = || tokio::time::sleep(Duration::from_millis(20));
            sender
                .send(EngineMessage::Event(BrowserEvent::Install))
                .await?;
            sender
                .send(EngineMessage::Event(BrowserEvent::TabActivated {
                    url: "https://a.com/".into(),
                    window_focused: true,
                }))
                .await?;
            step().await;
            driver_clock.advance_secs(5);
            sender.send(EngineMessage::Tick(TickKind::Flush)).await?;
            step().await;
            sender
                .send(EngineMessage::Event(BrowserEvent::GetCurrentSession))
                .await?;
            step().await;
            drop(sender);
            anyhow::Ok(())
        };

        let (driver_result, engine_result) = tokio::join!(driver, engine.run());
        driver_result?;
        engine_result?;

        let store = JsonStateStore::new(dir.path().to_owned())?;
        assert_eq!(store.load_ledger().await?.total_for("a.com", today), 5);
        assert!(dir.path().join("settings.json").exists());
        Ok(())
    }
}
