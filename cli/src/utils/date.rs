use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::America::New_York;

/// Parse a market date string (YYYY-MM-DD) to UTC midnight
pub fn parse_date(date_str: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")?;
    let datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid time components"))?;
    Ok(datetime.and_utc())
}

/// Format a DateTime as a market date string (YYYY-MM-DD)
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar date on the US exchanges right now
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}

/// Compact date stamp (YYYYMMDD) used in report file names
pub fn report_stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Convert a bar timestamp to the exchange-local trading date
pub fn trading_date_from_timestamp(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.with_timezone(&New_York).date_naive())
}

/// Check if it's weekend (Saturday or Sunday)
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

/// Latest weekday on or before `date`
pub fn latest_trading_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        chrono::Weekday::Sun => date - chrono::Duration::days(2),
        chrono::Weekday::Sat => date - chrono::Duration::days(1),
        _ => date,
    }
}

/// Data is stale when its last bar is older than the previous trading day.
/// Today's bar is usually not published until the close.
pub fn is_data_stale(last_bar: &str, today: NaiveDate) -> bool {
    let Ok(last) = NaiveDate::parse_from_str(last_bar, "%Y-%m-%d") else {
        return true;
    };
    let previous = latest_trading_day(today - chrono::Duration::days(1));
    last < previous
}

/// Weekdays between two dates, inclusive
pub fn trading_days_between(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect()
}

/// Format duration for logging
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.1}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0).floor();
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}
