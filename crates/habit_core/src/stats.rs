use chrono::NaiveDate;

use crate::dates::days_inclusive;
use crate::habit::{Habit, COMPLETION_THRESHOLD};

/// Share of completed days across the habit's active range so far, as a
/// whole percentage.
///
/// The range runs from the start date to the end date or `today`,
/// whichever comes first, so records dated after the habit ended or in the
/// future never count even when they exist. Halves round away from zero
/// (`Math.round` semantics for non-negative input).
pub fn completion_percentage(habit: &Habit, today: NaiveDate) -> u8 {
    let start = habit.start_date;
    let effective_end = match habit.end_date {
        Some(end) if end < today => end,
        _ => today,
    };
    if effective_end < start {
        return 0;
    }

    let days_in_range = days_inclusive(start, effective_end).max(1);
    let completed = habit
        .completion_data
        .range(start..=effective_end)
        .filter(|(_, intensity)| **intensity > COMPLETION_THRESHOLD)
        .count();

    (completed as f64 / days_in_range as f64 * 100.0).round() as u8
}
