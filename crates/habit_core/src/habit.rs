use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Intensities above this value count as a completed day. Anything at or
/// below it, including missing records, reads as not completed; the band in
/// between 0 and 1 only affects heatmap shading.
pub const COMPLETION_THRESHOLD: f64 = 0.5;

/// One tracked behaviour together with its sparse day-by-day history.
///
/// Serialises to the on-disk JSON shape: camelCase field names, dates as
/// `YYYY-MM-DD`, `completionData` as an object keyed by day. The ordered
/// map keeps the serialised form deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredHabit")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub completion_data: BTreeMap<NaiveDate, f64>,
}

impl Habit {
    /// Recorded intensity for `date`; an absent record reads as zero.
    pub fn intensity_on(&self, date: NaiveDate) -> f64 {
        self.completion_data.get(&date).copied().unwrap_or(0.0)
    }

    pub fn completed_on(&self, date: NaiveDate) -> bool {
        self.intensity_on(date) > COMPLETION_THRESHOLD
    }

    /// Whether the habit is scheduled at all on `date`: on or after the
    /// start, and not strictly after the end when one is set.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }
}

/// On-disk shape of a habit. Early versions persisted records without
/// explicit date ranges, so those fields stay optional here and get
/// defaulted during deserialisation: `startDate` falls back to the date
/// portion of `createdAt`, `createdAt` itself to the moment of loading.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredHabit {
    id: String,
    name: String,
    icon: String,
    color: String,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completion_data: BTreeMap<NaiveDate, f64>,
}

impl From<StoredHabit> for Habit {
    fn from(stored: StoredHabit) -> Self {
        let created_at = stored.created_at.unwrap_or_else(Utc::now);
        Self {
            id: stored.id,
            name: stored.name,
            icon: stored.icon,
            color: stored.color,
            start_date: stored
                .start_date
                .unwrap_or_else(|| created_at.date_naive()),
            end_date: stored.end_date,
            created_at,
            completion_data: stored.completion_data,
        }
    }
}

/// Caller-chosen fields for a new habit; the store allocates the id and
/// timestamps. A missing start date means "starts today".
#[derive(Debug, Clone)]
pub struct HabitDraft {
    pub name: String,
    pub icon: String,
    pub color: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Partial metadata update. `None` leaves a field untouched; the nested
/// option on `end_date` distinguishes clearing the end date from leaving
/// it alone.
#[derive(Debug, Clone, Default)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
}
