//! Periodic reconciliation: every cadence is its own task feeding the engine
//! channel, so tick handling serializes with event handling instead of
//! racing it.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::utils::clock::Clock;

use super::EngineMessage;

/// Flush cadence; also sizes the reminder detection window.
pub const FAST_TICK: Duration = Duration::from_secs(5);
/// Backup flush in case the fast cadence is reconfigured away.
pub const BACKUP_TICK: Duration = Duration::from_secs(60);
pub const RETENTION_TICK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DAY_ROLLOVER_TICK: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Flush the active session and restart its timer.
    Flush,
    /// Same effect as [TickKind::Flush], slower cadence.
    BackupFlush,
    /// Run the retention manager.
    Retention,
    /// Reset day-scoped in-memory flags.
    DayRollover,
}

impl TickKind {
    pub fn period(self) -> Duration {
        match self {
            Self::Flush => FAST_TICK,
            Self::BackupFlush => BACKUP_TICK,
            Self::Retention => RETENTION_TICK,
            Self::DayRollover => DAY_ROLLOVER_TICK,
        }
    }

    pub fn all() -> [TickKind; 4] {
        [
            Self::Flush,
            Self::BackupFlush,
            Self::Retention,
            Self::DayRollover,
        ]
    }
}

pub struct TickTask {
    kind: TickKind,
    next: mpsc::Sender<EngineMessage>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl TickTask {
    pub fn new(
        kind: TickKind,
        next: mpsc::Sender<EngineMessage>,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            kind,
            next,
            shutdown,
            clock,
        }
    }

    /// Executes the tick loop until shutdown or until the engine goes away.
    pub async fn run(self) -> Result<()> {
        let mut deadline = self.clock.instant() + self.kind.period();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = self.clock.sleep_until(deadline) => {}
            }
            deadline += self.kind.period();

            debug!("Tick {:?}", self.kind);
            if self.next.send(EngineMessage::Tick(self.kind)).await.is_err() {
                // Engine channel closed, nothing left to drive.
                return Ok(());
            }
        }
    }
}
