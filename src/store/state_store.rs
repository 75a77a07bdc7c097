use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::entities::{
    GoalMarks, Ledger, LimitMarks, Notes, SessionStarts, Settings, VisitHistory,
};

pub const LEDGER_KEY: &str = "timeData";
pub const VISITS_KEY: &str = "lastVisits";
pub const SESSION_STARTS_KEY: &str = "sessionStarts";
pub const SETTINGS_KEY: &str = "settings";
pub const LIMIT_MARKS_KEY: &str = "lastNotifications";
pub const GOAL_MARKS_KEY: &str = "dailyGoalNotifications";
pub const NOTES_KEY: &str = "notes";

/// Interface for abstracting persistence of the accounting state.
/// Each logical key lives in its own document; a missing document reads as the
/// type's default so first-run works without any setup step.
pub trait StateStore {
    fn load_ledger(&self) -> impl Future<Output = Result<Ledger>> + Send;
    fn save_ledger(&self, ledger: &Ledger) -> impl Future<Output = Result<()>> + Send;

    fn load_visits(&self) -> impl Future<Output = Result<VisitHistory>> + Send;
    fn save_visits(&self, visits: &VisitHistory) -> impl Future<Output = Result<()>> + Send;

    fn load_session_starts(&self) -> impl Future<Output = Result<SessionStarts>> + Send;
    fn save_session_starts(&self, starts: &SessionStarts)
        -> impl Future<Output = Result<()>> + Send;

    /// Settings are written by the UI collaborator; the core only reads them.
    fn load_settings(&self) -> impl Future<Output = Result<Settings>> + Send;

    fn load_limit_marks(&self) -> impl Future<Output = Result<LimitMarks>> + Send;
    fn save_limit_marks(&self, marks: &LimitMarks) -> impl Future<Output = Result<()>> + Send;

    fn load_goal_marks(&self) -> impl Future<Output = Result<GoalMarks>> + Send;
    fn save_goal_marks(&self, marks: &GoalMarks) -> impl Future<Output = Result<()>> + Send;

    fn load_notes(&self) -> impl Future<Output = Result<Notes>> + Send;
    fn save_notes(&self, notes: &Notes) -> impl Future<Output = Result<()>> + Send;

    /// Seeds default documents on first install so the UI finds every key.
    fn ensure_initialized(&self) -> impl Future<Output = Result<()>> + Send;

    /// Bytes currently used by persisted state, for the quota advisory.
    fn persisted_bytes(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// The main realization of [StateStore]: one JSON file per key under a state
/// directory, guarded by advisory file locks so the CLI can touch the same
/// files while a daemon is running.
pub struct JsonStateStore {
    state_dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(state_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self { state_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.state_dir.join(format!("{key}.json"))
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let path = self.path_for(key);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut contents = String::new();
        read_locked(file, &mut contents).await?;

        match serde_json::from_str(&contents) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Might happen after a shutdown cut a write short. Accounting
                // restarts from an empty document rather than failing.
                warn!("Corrupt state document {path:?}, starting fresh: {e}");
                Ok(T::default())
            }
        }
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key);
        debug!("Writing state document {path:?}");
        let file = File::options()
            .write(true)
            .create(true)
            .open(&path)
            .await?;
        // Semi-safe acquire-release for a file. Truncation waits until the
        // exclusive lock is held, so a shared-lock reader can't observe an
        // emptied document in between.
        file.lock_exclusive()?;
        let buffer = serde_json::to_vec(value)?;
        write_locked(file, &buffer).await
    }

    async fn exists(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }
}

async fn read_locked(mut file: File, contents: &mut String) -> Result<()> {
    let read = file.read_to_string(contents).await;
    file.unlock_async().await?;
    read?;
    Ok(())
}

async fn write_locked(mut file: File, buffer: &[u8]) -> Result<()> {
    let written = async {
        file.set_len(0).await?;
        file.write_all(buffer).await?;
        file.flush().await
    }
    .await;
    file.unlock_async().await?;
    written?;
    Ok(())
}

impl StateStore for JsonStateStore {
    async fn load_ledger(&self) -> Result<Ledger> {
        self.read_json(LEDGER_KEY).await
    }

    async fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        self.write_json(LEDGER_KEY, ledger).await
    }

    async fn load_visits(&self) -> Result<VisitHistory> {
        self.read_json(VISITS_KEY).await
    }

    async fn save_visits(&self, visits: &VisitHistory) -> Result<()> {
        self.write_json(VISITS_KEY, visits).await
    }

    async fn load_session_starts(&self) -> Result<SessionStarts> {
        self.read_json(SESSION_STARTS_KEY).await
    }

    async fn save_session_starts(&self, starts: &SessionStarts) -> Result<()> {
        self.write_json(SESSION_STARTS_KEY, starts).await
    }

    async fn load_settings(&self) -> Result<Settings> {
        self.read_json(SETTINGS_KEY).await
    }

    async fn load_limit_marks(&self) -> Result<LimitMarks> {
        self.read_json(LIMIT_MARKS_KEY).await
    }

    async fn save_limit_marks(&self, marks: &LimitMarks) -> Result<()> {
        self.write_json(LIMIT_MARKS_KEY, marks).await
    }

    async fn load_goal_marks(&self) -> Result<GoalMarks> {
        self.read_json(GOAL_MARKS_KEY).await
    }

    async fn save_goal_marks(&self, marks: &GoalMarks) -> Result<()> {
        self.write_json(GOAL_MARKS_KEY, marks).await
    }

    async fn load_notes(&self) -> Result<Notes> {
        self.read_json(NOTES_KEY).await
    }

    async fn save_notes(&self, notes: &Notes) -> Result<()> {
        self.write_json(NOTES_KEY, notes).await
    }

    async fn ensure_initialized(&self) -> Result<()> {
        if !self.exists(SETTINGS_KEY).await {
            self.write_json(SETTINGS_KEY, &Settings::default()).await?;
        }
        if !self.exists(VISITS_KEY).await {
            self.save_visits(&VisitHistory::default()).await?;
        }
        if !self.exists(SESSION_STARTS_KEY).await {
            self.save_session_starts(&SessionStarts::default()).await?;
        }
        Ok(())
    }

    async fn persisted_bytes(&self) -> Result<u64> {
        dir_json_bytes(&self.state_dir).await
    }
}

async fn dir_json_bytes(dir: &Path) -> Result<u64> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut total = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            total += entry.metadata().await?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::store::entities::{Ledger, Settings};

    use super::{JsonStateStore, StateStore, LEDGER_KEY};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn ledger_round_trips_through_disk() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStateStore::new(dir.path().to_owned())?;

        let mut ledger = Ledger::default();
        ledger.add("a.com", day(11), 42);
        ledger.add("b.com", day(12), 7);
        store.save_ledger(&ledger).await?;

        let reloaded = store.load_ledger().await?;
        assert_eq!(reloaded, ledger);
        Ok(())
    }

    #[tokio::test]
    async fn rewriting_a_document_leaves_no_stale_tail() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStateStore::new(dir.path().to_owned())?;

        let mut big = Ledger::default();
        for i in 0..20u64 {
            big.add(&format!("domain-{i}.example.com"), day(11), 1000 + i);
        }
        store.save_ledger(&big).await?;

        // the shorter rewrite must not leave bytes of the old document
        // behind, or the next read parses garbage and defaults
        let mut small = Ledger::default();
        small.add("a.com", day(11), 1);
        store.save_ledger(&small).await?;

        assert_eq!(store.load_ledger().await?, small);
        Ok(())
    }

    #[tokio::test]
    async fn missing_documents_read_as_defaults() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStateStore::new(dir.path().to_owned())?;

        assert_eq!(store.load_ledger().await?, Ledger::default());
        assert_eq!(store.load_settings().await?, Settings::default());
        assert!(store.load_settings().await?.reminders_enabled);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_document_reads_as_default() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStateStore::new(dir.path().to_owned())?;
        std::fs::write(dir.path().join(format!("{LEDGER_KEY}.json")), b"{\"a.co")?;

        assert_eq!(store.load_ledger().await?, Ledger::default());
        Ok(())
    }

    #[tokio::test]
    async fn ensure_initialized_seeds_defaults_once() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStateStore::new(dir.path().to_owned())?;
        store.ensure_initialized().await?;

        assert!(dir.path().join("settings.json").exists());
        assert!(dir.path().join("lastVisits.json").exists());

        // a later install event must not clobber user settings
        let custom = std::fs::read_to_string(dir.path().join("settings.json"))?
            .replace("true", "false");
        std::fs::write(dir.path().join("settings.json"), custom)?;
        store.ensure_initialized().await?;
        assert!(!store.load_settings().await?.reminders_enabled);
        Ok(())
    }

    #[tokio::test]
    async fn persisted_bytes_counts_state_documents() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStateStore::new(dir.path().to_owned())?;
        assert_eq!(store.persisted_bytes().await?, 0);

        let mut ledger = Ledger::default();
        ledger.add("a.com", day(11), 42);
        store.save_ledger(&ledger).await?;

        assert!(store.persisted_bytes().await? > 0);
        Ok(())
    }
}
