use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// This is the standard way of writing a date everywhere in the crate,
/// including the persisted JSON.
pub const ISO_DATE: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_DATE).to_string()
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), ISO_DATE).ok()
}

/// Number of days from `start` to `end`, counting both endpoints.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("january 1st exists for every year")
}

/// Most recent Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Consecutive days around `centre`, `before` days back through `after`
/// days forward.
pub fn date_window(centre: NaiveDate, before: i64, after: i64) -> Vec<NaiveDate> {
    (-before..=after)
        .map(|offset| centre + Duration::days(offset))
        .collect()
}

/// Represents an entity responsible for providing the current moment, so
/// stores can be driven by a fixed time in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant. Intended for tests and deterministic
/// replays.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
