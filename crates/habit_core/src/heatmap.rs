use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::dates::{start_of_year, week_start};
use crate::habit::Habit;

/// Columns in the calendar-year layout. 53 weeks always covers a full year
/// regardless of which weekday January 1st falls on.
pub const GRID_WEEKS: usize = 53;

pub const DAYS_PER_WEEK: usize = 7;

/// Window length of the legacy rolling layout: 52 whole weeks.
pub const DEFAULT_WINDOW_DAYS: usize = 364;

/// Neutral grid colour for in-range days without any recorded intensity.
pub const EMPTY_SHADE: &str = "#1A1A1A";

/// Resolved cell colour. `Transparent` marks placeholder cells outside the
/// anchor year; they carry no data. `Color` holds the habit colour, with a
/// two-digit hex alpha suffix for the partial-opacity bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Shade {
    Transparent,
    Empty,
    Color(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub in_year: bool,
    pub intensity: f64,
    pub shade: Shade,
}

/// One column per week, oldest first; each column runs Sunday-first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapGrid {
    pub weeks: Vec<Vec<HeatmapCell>>,
}

impl HeatmapGrid {
    pub fn cell_count(&self) -> usize {
        self.weeks.iter().map(Vec::len).sum()
    }
}

/// Canonical layout: the current calendar year, anchored so the first
/// column is the week containing January 1st. The leading column may reach
/// back into the previous year; those cells (and any trailing next-year
/// cells) render as transparent placeholders and never consult the data.
pub fn calendar_year_grid(habit: &Habit, today: NaiveDate) -> HeatmapGrid {
    let anchor = start_of_year(today);
    let grid_start = week_start(anchor);

    let weeks = (0..GRID_WEEKS)
        .map(|week| {
            (0..DAYS_PER_WEEK)
                .map(|day| {
                    let date =
                        grid_start + Duration::days((week * DAYS_PER_WEEK + day) as i64);
                    if date.year() != anchor.year() {
                        return HeatmapCell {
                            date,
                            in_year: false,
                            intensity: 0.0,
                            shade: Shade::Transparent,
                        };
                    }
                    let intensity = habit.intensity_on(date);
                    HeatmapCell {
                        date,
                        in_year: true,
                        intensity,
                        shade: shade_for(&habit.color, intensity),
                    }
                })
                .collect()
        })
        .collect();

    HeatmapGrid { weeks }
}

/// Legacy layout: the last `days` days ending at `today`, packed into
/// 7-day columns oldest-to-newest. No year anchoring; every cell is in
/// range and gets shaded.
pub fn rolling_window_grid(habit: &Habit, today: NaiveDate, days: usize) -> HeatmapGrid {
    let days = days.max(1);
    let start = today - Duration::days(days as i64 - 1);

    let dates: Vec<NaiveDate> = (0..days)
        .map(|offset| start + Duration::days(offset as i64))
        .collect();
    let weeks = dates
        .chunks(DAYS_PER_WEEK)
        .map(|chunk| {
            chunk
                .iter()
                .map(|&date| {
                    let intensity = habit.intensity_on(date);
                    HeatmapCell {
                        date,
                        in_year: true,
                        intensity,
                        shade: shade_for(&habit.color, intensity),
                    }
                })
                .collect()
        })
        .collect();

    HeatmapGrid { weeks }
}

/// Maps an intensity to the banded opacity of the habit colour. The band
/// edges (0, 0.1, 0.6, 0.8) match the mobile renderer exactly; a non-hex
/// colour is passed through untinted.
pub fn shade_for(color: &str, intensity: f64) -> Shade {
    if intensity == 0.0 {
        return Shade::Empty;
    }
    if !color.starts_with('#') {
        return Shade::Color(color.to_string());
    }
    if intensity > 0.8 {
        Shade::Color(color.to_string())
    } else if intensity > 0.6 {
        Shade::Color(format!("{color}CC"))
    } else if intensity > 0.1 {
        Shade::Color(format!("{color}66"))
    } else {
        Shade::Color(format!("{color}33"))
    }
}
