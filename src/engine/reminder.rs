//! Threshold checks that run after every flush: per-domain limits and the
//! global daily goal, each firing at most once per calendar day.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    host::messages::{HostPort, OutboundMessage},
    store::entities::{GoalMarks, Ledger, LimitMarks, Settings},
    utils::time::describe_minutes,
};

use super::scheduler::FAST_TICK;

/// A threshold counts as "just crossed" while the total sits inside
/// `[threshold, threshold + window)`. The window spans two fast ticks so
/// jitter can't skip it, and the persisted marks keep repeat observations
/// inside the window from notifying twice.
pub const DETECTION_WINDOW_SECS: u64 = 2 * FAST_TICK.as_secs();

fn just_crossed(total_seconds: u64, threshold_minutes: u64) -> bool {
    let threshold = threshold_minutes * 60;
    total_seconds >= threshold && total_seconds < threshold + DETECTION_WINDOW_SECS
}

pub struct ReminderEngine;

impl ReminderEngine {
    /// Per-domain limit check. Returns true when a new mark was recorded and
    /// needs persisting.
    pub async fn check_site_limit<P: HostPort>(
        port: &mut P,
        settings: &Settings,
        domain: &str,
        total_seconds: u64,
        today: NaiveDate,
        now_epoch_ms: i64,
        marks: &mut LimitMarks,
    ) -> Result<bool> {
        if !settings.reminders_enabled {
            return Ok(false);
        }
        let Some(&limit_minutes) = settings.limits.get(domain) else {
            return Ok(false);
        };
        if limit_minutes == 0 || !just_crossed(total_seconds, limit_minutes) {
            return Ok(false);
        }
        if marks.is_marked(domain, today) {
            debug!("Limit for {domain} already notified today");
            return Ok(false);
        }

        let spelled = describe_minutes(limit_minutes);
        dispatch(
            port,
            OutboundMessage::Notification {
                id: format!("reminder-{domain}-{now_epoch_ms}"),
                title: "Time Reminder".into(),
                message: format!(
                    "You've reached your {spelled} goal on {domain} today. \
                     Great work staying mindful of your time!"
                ),
            },
        )
        .await;

        // Marked even when dispatch failed, so a flaky notification channel
        // can't turn into a notification storm.
        marks.mark(domain, today);
        info!("Site reminder sent for {domain}: {spelled}");
        Ok(true)
    }

    /// Daily-goal check across all domains. Returns true when a new mark was
    /// recorded and needs persisting.
    pub async fn check_daily_goal<P: HostPort>(
        port: &mut P,
        settings: &Settings,
        ledger: &Ledger,
        today: NaiveDate,
        now_epoch_ms: i64,
        marks: &mut GoalMarks,
    ) -> Result<bool> {
        if !settings.reminders_enabled || settings.daily_goal == 0 {
            return Ok(false);
        }
        let total = ledger.day_total(today);
        if !just_crossed(total, settings.daily_goal) {
            return Ok(false);
        }
        if marks.is_marked(today) {
            return Ok(false);
        }

        let spelled = describe_minutes(settings.daily_goal);
        dispatch(
            port,
            OutboundMessage::Notification {
                id: format!("daily-goal-{now_epoch_ms}"),
                title: "Daily Goal Achieved!".into(),
                message: format!(
                    "Congratulations! You've completed your {spelled} productivity \
                     goal for today. Keep up the great work!"
                ),
            },
        )
        .await;

        marks.mark(today);
        info!("Daily goal notification sent: {spelled}");
        Ok(true)
    }

    /// One-time advisory when persisted state approaches the storage quota.
    pub async fn storage_advisory<P: HostPort>(port: &mut P, used_bytes: u64) {
        let mib = used_bytes as f64 / 1024.0 / 1024.0;
        dispatch(
            port,
            OutboundMessage::Notification {
                id: "storage-warning".into(),
                title: "Storage Notice".into(),
                message: format!(
                    "Storage is {mib:.2} MB. Consider exporting and clearing old data in Settings."
                ),
            },
        )
        .await;
    }
}

/// Notification dispatch is fire-and-forget: a failed send is logged and
/// never retried, and it never blocks the accounting path.
async fn dispatch<P: HostPort>(port: &mut P, message: OutboundMessage) {
    if let Err(e) = port.send(message).await {
        warn!("Notification dispatch failed: {e:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::{just_crossed, DETECTION_WINDOW_SECS};

    #[test]
    fn window_is_half_open_above_the_threshold() {
        assert_eq!(DETECTION_WINDOW_SECS, 10);
        assert!(!just_crossed(59, 1));
        assert!(just_crossed(60, 1));
        assert!(just_crossed(69, 1));
        assert!(!just_crossed(70, 1));
        assert!(!just_crossed(0, 1));
    }
}
