pub mod dates;
pub mod error;
pub mod habit;
pub mod heatmap;
pub mod seed;
pub mod stats;
pub mod storage;
pub mod store;

pub use crate::error::StoreError;
pub use crate::habit::{Habit, HabitDraft, HabitPatch};
pub use crate::store::{HabitStore, HabitStoreBuilder};
