//! Serde shapes for everything sitetime persists. Field names follow the
//! storage layout the browser extension already uses, so an exported state
//! directory stays readable by both sides.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-domain, per-day accumulated seconds. The only writer is the engine
/// task, and the only mutation besides explicit deletion is adding a
/// whole-second delta from a closed session interval.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger(pub BTreeMap<String, BTreeMap<NaiveDate, u64>>);

impl Ledger {
    /// Adds a delta and returns the new total for that (domain, date).
    pub fn add(&mut self, domain: &str, date: NaiveDate, seconds: u64) -> u64 {
        let total = self
            .0
            .entry(domain.to_owned())
            .or_default()
            .entry(date)
            .or_insert(0);
        *total += seconds;
        *total
    }

    pub fn total_for(&self, domain: &str, date: NaiveDate) -> u64 {
        self.0
            .get(domain)
            .and_then(|days| days.get(&date))
            .copied()
            .unwrap_or(0)
    }

    /// Sum across every domain for one day, used by the daily-goal check.
    pub fn day_total(&self, date: NaiveDate) -> u64 {
        self.0
            .values()
            .filter_map(|days| days.get(&date))
            .sum()
    }

    /// Removes a single day for a single domain, dropping the domain once it
    /// has no dated entries left. Returns true when something was removed.
    pub fn delete_day(&mut self, domain: &str, date: NaiveDate) -> bool {
        let Some(days) = self.0.get_mut(domain) else {
            return false;
        };
        let removed = days.remove(&date).is_some();
        if days.is_empty() {
            self.0.remove(domain);
        }
        removed
    }

    /// Drops every entry dated strictly before `cutoff` and returns how many
    /// (dates, domains) were pruned.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> (usize, usize) {
        let domains_before = self.0.len();
        let mut pruned_dates = 0;
        self.0.retain(|_, days| {
            let before = days.len();
            days.retain(|date, _| *date >= cutoff);
            pruned_dates += before - days.len();
            !days.is_empty()
        });
        (pruned_dates, domains_before - self.0.len())
    }
}

/// One row of the recent-visit list shown in the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitEntry {
    pub domain: String,
    pub url: String,
    /// Epoch milliseconds of the flush that produced this entry.
    pub last_visit: i64,
    pub today_seconds: u64,
}

pub const VISIT_HISTORY_CAP: usize = 10;

/// Most-recent-first list of visited domains, deduplicated by domain and
/// capped at [VISIT_HISTORY_CAP] entries.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitHistory(pub Vec<VisitEntry>);

impl VisitHistory {
    pub fn record(&mut self, entry: VisitEntry) {
        self.0.retain(|v| v.domain != entry.domain);
        self.0.insert(0, entry);
        self.0.truncate(VISIT_HISTORY_CAP);
    }

    pub fn remove(&mut self, domain: &str) {
        self.0.retain(|v| v.domain != domain);
    }
}

/// First session start per (domain, day), written once and kept for display.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarts(pub BTreeMap<String, BTreeMap<NaiveDate, i64>>);

impl SessionStarts {
    /// Records `at_epoch_ms` only if this is the first session of the day for
    /// the domain. Returns true when a write happened.
    pub fn mark_first(&mut self, domain: &str, date: NaiveDate, at_epoch_ms: i64) -> bool {
        let days = self.0.entry(domain.to_owned()).or_default();
        if days.contains_key(&date) {
            return false;
        }
        days.insert(date, at_epoch_ms);
        true
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteScope {
    #[default]
    Domain,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntity {
    pub id: String,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub scope: NoteScope,
}

/// Notes keyed by domain or full URL. The engine never edits note text; it
/// only enforces the retention cap and answers "does this key have notes".
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes(pub BTreeMap<String, Vec<NoteEntity>>);

impl Notes {
    pub fn has_note(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|list| !list.is_empty())
    }

    /// Keeps at most `cap` entries per key, newest timestamps first. Returns
    /// how many keys were trimmed.
    pub fn cap_each(&mut self, cap: usize) -> usize {
        let mut trimmed = 0;
        for list in self.0.values_mut() {
            if list.len() > cap {
                list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                list.truncate(cap);
                trimmed += 1;
            }
        }
        trimmed
    }
}

/// User configuration, consumed read-only by the accounting core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub reminders_enabled: bool,
    pub note_scope: NoteScope,
    /// Per-domain daily limit in minutes.
    pub limits: BTreeMap<String, u64>,
    /// Domains or URL substrings excluded from all accounting.
    pub no_track_list: Vec<String>,
    /// Daily goal in minutes across all domains; 0 disables the check.
    pub daily_goal: u64,
    /// Page-indicator visibility, owned by the UI and round-tripped here.
    pub hidden_indicators: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reminders_enabled: true,
            note_scope: NoteScope::default(),
            limits: BTreeMap::new(),
            no_track_list: Vec::new(),
            daily_goal: 0,
            hidden_indicators: Vec::new(),
        }
    }
}

impl Settings {
    /// No-track matches on exact domain or URL substring.
    pub fn is_no_track(&self, domain: &str, url: &str) -> bool {
        self.no_track_list
            .iter()
            .any(|entry| domain == entry || url.contains(entry.as_str()))
    }
}

/// Date each domain was last notified about its limit.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitMarks(pub BTreeMap<String, NaiveDate>);

impl LimitMarks {
    pub fn is_marked(&self, domain: &str, date: NaiveDate) -> bool {
        self.0.get(domain) == Some(&date)
    }

    pub fn mark(&mut self, domain: &str, date: NaiveDate) {
        self.0.insert(domain.to_owned(), date);
    }
}

/// Days on which the daily-goal notification already fired.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalMarks(pub BTreeMap<NaiveDate, bool>);

impl GoalMarks {
    pub fn is_marked(&self, date: NaiveDate) -> bool {
        self.0.get(&date).copied().unwrap_or(false)
    }

    pub fn mark(&mut self, date: NaiveDate) {
        self.0.insert(date, true);
    }
}
