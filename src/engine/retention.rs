use anyhow::Result;
use chrono::{Days, NaiveDate};
use tracing::info;

use crate::store::state_store::StateStore;

/// How far back dated ledger entries are kept.
pub const RETENTION_DAYS: u64 = 365;
/// Most notes kept per key, newest first.
pub const NOTE_CAP: usize = 50;
/// Matches the storage quota the extension side lives under.
pub const STORAGE_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

/// Usage above this fraction of the quota raises the one-time advisory.
pub fn advisory_threshold_bytes() -> u64 {
    STORAGE_QUOTA_BYTES / 10 * 8
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub pruned_dates: usize,
    pub pruned_domains: usize,
    pub trimmed_note_keys: usize,
    pub persisted_bytes: u64,
}

/// Prunes expired ledger entries and over-long note histories. Runs weekly,
/// and re-running with nothing expired is a no-op.
pub struct RetentionManager {
    retention_days: u64,
    note_cap: usize,
}

impl Default for RetentionManager {
    fn default() -> Self {
        Self {
            retention_days: RETENTION_DAYS,
            note_cap: NOTE_CAP,
        }
    }
}

impl RetentionManager {
    pub async fn run<S: StateStore>(&self, store: &S, today: NaiveDate) -> Result<RetentionReport> {
        let cutoff = today
            .checked_sub_days(Days::new(self.retention_days))
            .unwrap_or(NaiveDate::MIN);

        let mut report = RetentionReport::default();

        let mut ledger = store.load_ledger().await?;
        let (pruned_dates, pruned_domains) = ledger.prune_before(cutoff);
        report.pruned_dates = pruned_dates;
        report.pruned_domains = pruned_domains;
        if pruned_dates > 0 {
            store.save_ledger(&ledger).await?;
        }

        let mut notes = store.load_notes().await?;
        report.trimmed_note_keys = notes.cap_each(self.note_cap);
        if report.trimmed_note_keys > 0 {
            store.save_notes(&notes).await?;
        }

        report.persisted_bytes = store.persisted_bytes().await?;

        info!(
            "Cleanup: removed {} old dates ({} domains), trimmed {} note histories, {} bytes in use",
            report.pruned_dates, report.pruned_domains, report.trimmed_note_keys, report.persisted_bytes
        );
        Ok(report)
    }
}
