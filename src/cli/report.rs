use ansi_term::{Colour, Style};
use chrono::NaiveDate;

use crate::{store::entities::Ledger, utils::time::date_key};

/// Compact duration used in report rows, for example "1h 02m 03s".
pub fn format_seconds(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Renders one day of the ledger, busiest domains first.
pub fn render_day_report(date: NaiveDate, ledger: &Ledger) -> String {
    let mut rows: Vec<(&str, u64)> = ledger
        .0
        .iter()
        .filter_map(|(domain, days)| days.get(&date).map(|secs| (domain.as_str(), *secs)))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    if rows.is_empty() {
        return format!("No activity recorded for {}", date_key(date));
    }

    let width = rows
        .iter()
        .map(|(domain, _)| domain.len())
        .max()
        .unwrap_or(0)
        .max("total".len());

    let mut out = format!("{}\n", Style::new().bold().paint(date_key(date)));
    let mut total = 0u64;
    for (domain, secs) in &rows {
        total += secs;
        out.push_str(&format!(
            "{domain:width$}  {}\n",
            Colour::Green.paint(format_seconds(*secs))
        ));
    }
    out.push_str(&format!(
        "{:width$}  {}\n",
        Style::new().bold().paint("total"),
        Colour::Cyan.paint(format_seconds(total))
    ));
    out
}
