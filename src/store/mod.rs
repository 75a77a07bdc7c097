//! Persistence for the accounting state.
//! The basic idea is:
//!  - There is one state directory.
//!  - Every logical key from the extension's storage layout gets its own JSON
//!    document inside it.
//!  - Reads tolerate missing and corrupt documents by falling back to empty
//!    defaults; the next flush re-derives anything lost.

pub mod entities;
pub mod state_store;

use anyhow::Result;
use chrono::NaiveDate;

use state_store::StateStore;

/// Explicit user deletion: removes `today`'s entry for one domain from the
/// ledger and drops the domain from the visit history. Other dates and other
/// domains stay untouched. Returns true when anything changed.
pub async fn delete_today<S: StateStore>(
    store: &S,
    domain: &str,
    today: NaiveDate,
) -> Result<bool> {
    let mut ledger = store.load_ledger().await?;
    let removed = ledger.delete_day(domain, today);
    if removed {
        store.save_ledger(&ledger).await?;
    }

    let mut visits = store.load_visits().await?;
    let listed = visits.0.iter().any(|v| v.domain == domain);
    if listed {
        visits.remove(domain);
        store.save_visits(&visits).await?;
    }

    Ok(removed || listed)
}
