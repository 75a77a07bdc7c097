use chrono::NaiveDate;

/// This is the standard way of converting a date to a storage key in sitetime.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// Spells a minute count the way reminder notifications phrase it, for example
/// "1 hour and 30 minutes".
pub fn describe_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    match (hours, mins) {
        (0, m) => plural(m, "minute"),
        (h, 0) => plural(h, "hour"),
        (h, m) => format!("{} and {}", plural(h, "hour"), plural(m, "minute")),
    }
}
