use chrono::{DateTime, Datelike, NaiveDate};

pub const MIN_AGE: i32 = 18;

pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

pub fn is_adult(birth: NaiveDate, today: NaiveDate) -> bool {
    age_on(birth, today) >= MIN_AGE
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, keeping its date part.
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}
