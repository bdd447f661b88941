use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dates::start_of_year;
use crate::habit::Habit;

/// Builds the collection a fresh install starts with. Injected into the
/// store builder; the engine itself never seeds.
pub trait Seeder: Send + Sync {
    fn seed(&self, today: NaiveDate) -> Vec<Habit>;
}

/// Demo catalogue shown on first launch: a handful of sample habits with a
/// year of plausible-looking completion history. The RNG is seeded, so the
/// same seed and day always produce the same collection.
pub struct DemoSeeder {
    seed: u64,
}

impl DemoSeeder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

/// name, icon, colour, daily completion probability, base intensity.
const DEMO_HABITS: &[(&str, &str, &str, f64, f64)] = &[
    ("Morning Meditation", "self-improvement", "#FBBF24", 0.92, 0.8),
    ("Gym Session", "fitness-center", "#EF4444", 0.65, 0.9),
    ("Read Book", "menu-book", "#3B82F6", 0.85, 0.7),
    ("Drink Water", "water-drop", "#60A5FA", 0.95, 1.0),
    ("Coding", "code", "#8B5CF6", 0.80, 0.85),
    ("Healthy Meal", "restaurant", "#10B981", 0.88, 0.9),
    ("Journaling", "create", "#6366F1", 0.70, 0.6),
    ("Stretch", "directions-run", "#14B8A6", 0.82, 0.75),
];

impl Seeder for DemoSeeder {
    fn seed(&self, today: NaiveDate) -> Vec<Habit> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let year_start = start_of_year(today);
        let created_at = Utc.from_utc_datetime(
            &year_start
                .and_hms_opt(0, 0, 0)
                .expect("midnight exists on every day"),
        );

        DEMO_HABITS
            .iter()
            .enumerate()
            .map(|(index, &(name, icon, color, probability, base))| Habit {
                id: (index + 1).to_string(),
                name: name.to_string(),
                icon: icon.to_string(),
                color: color.to_string(),
                start_date: year_start,
                end_date: None,
                created_at,
                completion_data: completion_history(&mut rng, year_start, probability, base),
            })
            .collect()
    }
}

/// Generates records for the whole current year. Completion probability
/// dips on weekends; completed days sit around the base intensity with
/// some noise, the rest have a 30% chance of a low partial record.
fn completion_history(
    rng: &mut StdRng,
    year_start: NaiveDate,
    probability: f64,
    base_intensity: f64,
) -> BTreeMap<NaiveDate, f64> {
    let mut data = BTreeMap::new();
    for offset in 0..366 {
        let date = year_start + Duration::days(offset);
        if date.year() != year_start.year() {
            break;
        }

        let mut adjusted = probability;
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            adjusted -= 0.1;
        }

        if rng.random::<f64>() < adjusted {
            let noise = (rng.random::<f64>() - 0.5) * 0.4;
            data.insert(date, (base_intensity + noise).clamp(0.4, 1.0));
        } else if rng.random::<f64>() < 0.3 {
            data.insert(date, rng.random::<f64>() * 0.3);
        }
    }
    data
}
