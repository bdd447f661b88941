use std::collections::BTreeMap;

use chrono::NaiveDate;
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::dates::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::habit::{Habit, HabitDraft, HabitPatch, COMPLETION_THRESHOLD};
use crate::seed::Seeder;
use crate::storage::KeyValueStore;

/// Storage key the whole serialised collection lives under.
pub const HABITS_KEY: &str = "habits";

/// Observers registered on the store; told about every successful mutation
/// after the write-back completes, with a consistent snapshot.
pub trait ChangeListener: Send + Sync {
    fn habits_changed(&self, habits: &[Habit]);
}

/// Owns the habit collection. Every mutation updates memory, rewrites the
/// full collection through the storage backend and then notifies
/// listeners; the write lock is held across the read-modify-write and the
/// persistence call so concurrent callers serialise.
pub struct HabitStore {
    storage: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    listeners: Vec<Box<dyn ChangeListener>>,
    habits: RwLock<Vec<Habit>>,
}

pub struct HabitStoreBuilder {
    storage: Option<Box<dyn KeyValueStore>>,
    clock: Box<dyn Clock>,
    seeder: Option<Box<dyn Seeder>>,
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl HabitStoreBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            clock: Box::new(SystemClock),
            seeder: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_storage(mut self, storage: Box<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Collection to start from when the backend holds no prior data.
    pub fn with_seeder(mut self, seeder: Box<dyn Seeder>) -> Self {
        self.seeder = Some(seeder);
        self
    }

    pub fn add_listener(mut self, listener: Box<dyn ChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Result<HabitStore> {
        let storage = self
            .storage
            .ok_or_else(|| StoreError::Storage(anyhow::anyhow!("no storage backend configured")))?;
        let store = HabitStore {
            storage,
            clock: self.clock,
            listeners: self.listeners,
            habits: RwLock::new(Vec::new()),
        };
        store.load(self.seeder.as_deref())?;
        Ok(store)
    }
}

impl Default for HabitStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitStore {
    pub fn builder() -> HabitStoreBuilder {
        HabitStoreBuilder::new()
    }

    /// Consistent snapshot of the whole collection.
    pub fn habits(&self) -> Vec<Habit> {
        self.habits.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Habit> {
        self.habits.read().iter().find(|habit| habit.id == id).cloned()
    }

    /// Allocates an id, stamps the creation time and appends the habit.
    /// A blank name is rejected before any state changes.
    pub fn create(&self, draft: HabitDraft) -> Result<Habit> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let now = self.clock.now();
        let mut habits = self.habits.write();
        let habit = Habit {
            id: Self::allocate_id(&habits, now.timestamp_millis()),
            name,
            icon: draft.icon,
            color: draft.color,
            start_date: draft.start_date.unwrap_or_else(|| now.date_naive()),
            end_date: draft.end_date,
            created_at: now,
            completion_data: BTreeMap::new(),
        };
        debug!(id = %habit.id, name = %habit.name, "creating habit");
        habits.push(habit.clone());
        self.commit(habits)?;
        Ok(habit)
    }

    /// Merges the patch into the habit's metadata. Unknown ids are
    /// reported as [`StoreError::NotFound`] and leave storage untouched.
    pub fn update(&self, id: &str, patch: HabitPatch) -> Result<()> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(StoreError::EmptyName);
            }
        }

        let mut habits = self.habits.write();
        let habit = habits
            .iter_mut()
            .find(|habit| habit.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(name) = patch.name {
            habit.name = name.trim().to_string();
        }
        if let Some(icon) = patch.icon {
            habit.icon = icon;
        }
        if let Some(color) = patch.color {
            habit.color = color;
        }
        if let Some(start) = patch.start_date {
            habit.start_date = start;
        }
        if let Some(end) = patch.end_date {
            habit.end_date = end;
        }

        self.commit(habits)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let mut habits = self.habits.write();
        let before = habits.len();
        habits.retain(|habit| habit.id != id);
        if habits.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        debug!(id, "removed habit");
        self.commit(habits)
    }

    /// Flips the completion record for one day: anything above the
    /// completion threshold drops to 0, everything else (partial records
    /// included) jumps to 1.
    pub fn toggle_completion(&self, id: &str, date: NaiveDate) -> Result<()> {
        let mut habits = self.habits.write();
        let habit = habits
            .iter_mut()
            .find(|habit| habit.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let current = habit.intensity_on(date);
        let next = if current > COMPLETION_THRESHOLD { 0.0 } else { 1.0 };
        habit.completion_data.insert(date, next);
        debug!(id, %date, previous = current, next, "toggled completion");
        self.commit(habits)
    }

    /// Reads the persisted collection. Missing data seeds the initial
    /// collection and persists it right away; unreadable data is logged
    /// and recovered from by falling back in memory, never propagated.
    fn load(&self, seeder: Option<&dyn Seeder>) -> Result<()> {
        match self.storage.get(HABITS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Habit>>(&raw) {
                Ok(loaded) => {
                    debug!(count = loaded.len(), "loaded habits");
                    *self.habits.write() = loaded;
                }
                Err(err) => {
                    warn!(%err, "stored habit data is unreadable, falling back");
                    *self.habits.write() = self.initial_collection(seeder);
                }
            },
            Ok(None) => {
                let initial = self.initial_collection(seeder);
                debug!(count = initial.len(), "no stored habits, seeding");
                self.persist(&initial)?;
                *self.habits.write() = initial;
            }
            Err(err) => {
                warn!(%err, "unable to read stored habits, falling back");
                *self.habits.write() = self.initial_collection(seeder);
            }
        }
        Ok(())
    }

    fn initial_collection(&self, seeder: Option<&dyn Seeder>) -> Vec<Habit> {
        seeder
            .map(|seeder| seeder.seed(self.clock.today()))
            .unwrap_or_default()
    }

    /// Persists the collection and notifies listeners. The guard is held
    /// through the write so observers only ever see post-write state; if
    /// the write fails, memory has already changed and the caller learns
    /// about the divergence through the error.
    fn commit(&self, habits: RwLockWriteGuard<'_, Vec<Habit>>) -> Result<()> {
        self.persist(&habits)?;
        let snapshot: Vec<Habit> = habits.clone();
        drop(habits);
        for listener in &self.listeners {
            listener.habits_changed(&snapshot);
        }
        Ok(())
    }

    fn persist(&self, habits: &[Habit]) -> Result<()> {
        let payload = serde_json::to_string(habits)
            .map_err(|err| StoreError::Storage(err.into()))?;
        self.storage.set(HABITS_KEY, &payload)?;
        Ok(())
    }

    fn allocate_id(habits: &[Habit], stamp_millis: i64) -> String {
        let mut candidate = stamp_millis;
        while habits.iter().any(|habit| habit.id == candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    use crate::dates::FixedClock;
    use crate::seed::DemoSeeder;
    use crate::storage::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixed_clock() -> Box<FixedClock> {
        Box::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ))
    }

    fn draft(name: &str) -> HabitDraft {
        HabitDraft {
            name: name.into(),
            icon: "stars".into(),
            color: "#3B82F6".into(),
            start_date: Some(date(2024, 1, 1)),
            end_date: None,
        }
    }

    /// Backend that counts writes so tests can pin down persistence
    /// behaviour exactly.
    #[derive(Default)]
    struct CountingStore {
        entries: Mutex<HashMap<String, String>>,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn raw(&self, key: &str) -> Option<String> {
            self.entries.lock().get(key).cloned()
        }
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.entries.lock().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    /// Backend whose writes always fail.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Ok(Some("[]".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("storage is read-only")
        }
    }

    struct RecordingListener {
        seen: Mutex<Vec<usize>>,
    }

    impl ChangeListener for Arc<RecordingListener> {
        fn habits_changed(&self, habits: &[Habit]) {
            self.seen.lock().push(habits.len());
        }
    }

    fn store_with(backend: Arc<CountingStore>) -> HabitStore {
        HabitStore::builder()
            .with_storage(Box::new(backend))
            .with_clock(fixed_clock())
            .build()
            .expect("build store")
    }

    #[test]
    fn create_appends_persists_and_returns_the_habit() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend.clone());
        let writes_before = backend.writes();

        let habit = store.create(draft("Read Book")).unwrap();
        assert_eq!(habit.name, "Read Book");
        assert_eq!(habit.start_date, date(2024, 1, 1));
        assert!(habit.completion_data.is_empty());
        assert_eq!(store.habits().len(), 1);
        assert_eq!(backend.writes(), writes_before + 1);
        assert!(backend.raw(HABITS_KEY).unwrap().contains("Read Book"));
    }

    #[test]
    fn create_defaults_the_start_date_to_today() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);

        let habit = store
            .create(HabitDraft {
                start_date: None,
                ..draft("Gym Session")
            })
            .unwrap();
        assert_eq!(habit.start_date, date(2024, 6, 15));
    }

    #[test]
    fn blank_names_are_rejected_without_a_write() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend.clone());
        let writes_before = backend.writes();

        let err = store.create(draft("   ")).unwrap_err();
        assert!(matches!(err, StoreError::EmptyName));
        assert!(store.habits().is_empty());
        assert_eq!(backend.writes(), writes_before);
    }

    #[test]
    fn ids_are_unique_even_with_a_frozen_clock() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);

        let first = store.create(draft("One")).unwrap();
        let second = store.create(draft("Two")).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn update_merges_only_the_provided_fields() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);
        let habit = store.create(draft("Read Book")).unwrap();

        store
            .update(
                &habit.id,
                HabitPatch {
                    name: Some("Read More".into()),
                    color: Some("#EF4444".into()),
                    ..HabitPatch::default()
                },
            )
            .unwrap();

        let updated = store.get(&habit.id).unwrap();
        assert_eq!(updated.name, "Read More");
        assert_eq!(updated.color, "#EF4444");
        assert_eq!(updated.icon, habit.icon);
        assert_eq!(updated.start_date, habit.start_date);
        assert_eq!(updated.created_at, habit.created_at);
    }

    #[test]
    fn update_can_set_and_clear_the_end_date() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);
        let habit = store.create(draft("Read Book")).unwrap();

        store
            .update(
                &habit.id,
                HabitPatch {
                    end_date: Some(Some(date(2024, 12, 31))),
                    ..HabitPatch::default()
                },
            )
            .unwrap();
        assert_eq!(store.get(&habit.id).unwrap().end_date, Some(date(2024, 12, 31)));

        store
            .update(
                &habit.id,
                HabitPatch {
                    end_date: Some(None),
                    ..HabitPatch::default()
                },
            )
            .unwrap();
        assert_eq!(store.get(&habit.id).unwrap().end_date, None);
    }

    #[test]
    fn mutations_on_unknown_ids_report_not_found_without_writing() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend.clone());
        store.create(draft("Read Book")).unwrap();
        let writes_before = backend.writes();
        let snapshot = store.habits();

        assert!(matches!(
            store.update("missing", HabitPatch::default()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.remove("missing"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.toggle_completion("missing", date(2024, 6, 1)),
            Err(StoreError::NotFound(_))
        ));

        assert_eq!(store.habits(), snapshot);
        assert_eq!(backend.writes(), writes_before);
    }

    #[test]
    fn remove_deletes_by_id() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);
        let keep = store.create(draft("Keep")).unwrap();
        let gone = store.create(draft("Drop")).unwrap();

        store.remove(&gone.id).unwrap();
        let remaining = store.habits();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[test]
    fn toggle_flips_between_zero_and_one() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);
        let habit = store.create(draft("Read Book")).unwrap();
        let day = date(2024, 6, 1);

        // Missing record counts as not completed, so the first toggle
        // completes the day.
        store.toggle_completion(&habit.id, day).unwrap();
        assert_eq!(store.get(&habit.id).unwrap().intensity_on(day), 1.0);

        store.toggle_completion(&habit.id, day).unwrap();
        assert_eq!(store.get(&habit.id).unwrap().intensity_on(day), 0.0);

        store.toggle_completion(&habit.id, day).unwrap();
        assert_eq!(store.get(&habit.id).unwrap().intensity_on(day), 1.0);
    }

    #[test]
    fn toggle_collapses_partial_intensities_to_complete() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend);
        let habit = store.create(draft("Read Book")).unwrap();
        let day = date(2024, 6, 1);

        {
            let mut habits = store.habits.write();
            habits[0].completion_data.insert(day, 0.3);
        }
        store.toggle_completion(&habit.id, day).unwrap();
        assert_eq!(store.get(&habit.id).unwrap().intensity_on(day), 1.0);

        // 0.55 is above the threshold, so the next toggle clears it.
        {
            let mut habits = store.habits.write();
            habits[0].completion_data.insert(day, 0.55);
        }
        store.toggle_completion(&habit.id, day).unwrap();
        assert_eq!(store.get(&habit.id).unwrap().intensity_on(day), 0.0);
    }

    #[test]
    fn empty_backend_is_seeded_and_persisted_immediately() {
        let backend = Arc::new(CountingStore::default());
        let store = HabitStore::builder()
            .with_storage(Box::new(backend.clone()))
            .with_clock(fixed_clock())
            .with_seeder(Box::new(DemoSeeder::new(42)))
            .build()
            .unwrap();

        assert!(!store.habits().is_empty());
        assert_eq!(backend.writes(), 1);
        let raw = backend.raw(HABITS_KEY).unwrap();
        assert_eq!(raw, serde_json::to_string(&store.habits()).unwrap());
    }

    #[test]
    fn unreadable_data_falls_back_without_propagating() {
        let backend = Arc::new(CountingStore::default());
        backend.set(HABITS_KEY, "{ not json").unwrap();
        let writes_before = backend.writes();

        let store = store_with(backend.clone());
        assert!(store.habits().is_empty());
        // The corrupt payload is left alone until the next mutation.
        assert_eq!(backend.writes(), writes_before);
    }

    #[test]
    fn persisted_collections_round_trip_byte_for_byte() {
        let backend = Arc::new(CountingStore::default());
        let store = store_with(backend.clone());
        store.create(draft("Read Book")).unwrap();
        store
            .toggle_completion(&store.habits()[0].id, date(2024, 6, 1))
            .unwrap();
        let stored = backend.raw(HABITS_KEY).unwrap();

        let reloaded = store_with(backend);
        assert_eq!(serde_json::to_string(&reloaded.habits()).unwrap(), stored);
    }

    #[test]
    fn listeners_see_every_successful_mutation_after_the_write() {
        let backend = Arc::new(CountingStore::default());
        let listener = Arc::new(RecordingListener {
            seen: Mutex::new(Vec::new()),
        });
        let store = HabitStore::builder()
            .with_storage(Box::new(backend))
            .with_clock(fixed_clock())
            .add_listener(Box::new(listener.clone()))
            .build()
            .unwrap();

        let habit = store.create(draft("Read Book")).unwrap();
        store.toggle_completion(&habit.id, date(2024, 6, 1)).unwrap();
        store.remove(&habit.id).unwrap();
        let _ = store.remove("missing");

        // Three successful mutations, each reported with the post-write
        // collection size; the failed one stays silent.
        assert_eq!(*listener.seen.lock(), vec![1, 1, 0]);
    }

    #[test]
    fn failed_writes_surface_and_leave_memory_ahead_of_storage() {
        let store = HabitStore::builder()
            .with_storage(Box::new(ReadOnlyStore))
            .with_clock(fixed_clock())
            .build()
            .unwrap();

        let err = store.create(draft("Read Book")).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        // Known consistency gap: the in-memory collection already holds
        // the habit even though the write failed.
        assert_eq!(store.habits().len(), 1);
    }
}
