use crate::enrichment::EnrichmentRecord;
use crate::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Day details shipped with the application.
pub const SEED_DATA: &str = include_str!("../data/namenstage_2026.json");

/// Cached day details by ISO date key, ordered by date.
pub type Entries = BTreeMap<String, EnrichmentRecord>;

/// A single slot of durable storage holding the serialized cache.
pub trait Storage: Send + Sync {
    /// Reads the stored contents, `None` if nothing was stored yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replaces the stored contents.
    fn write(&self, contents: &str) -> Result<()>;
}

impl<T> Storage for Arc<T>
where
    T: Storage + ?Sized,
{
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> Result<()> {
        (**self).write(contents)
    }
}

/// Stores the cache in a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> FileStorage {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target and rename, so a crash never leaves a truncated file behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps the serialized cache in memory only. Used when no cache file is configured.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl Storage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_owned());
        Ok(())
    }
}

/// Append-only store of day details, written through to storage on every change.
pub struct DayDetailCache {
    entries: Entries,
    storage: Box<dyn Storage>,
}

impl DayDetailCache {
    /// Creates an empty cache. Nothing is read from `storage`.
    pub fn new<S>(storage: S) -> DayDetailCache
    where
        S: Storage + 'static,
    {
        DayDetailCache {
            entries: Entries::new(),
            storage: Box::new(storage),
        }
    }

    /// Hydrates the cache from `seed` and whatever `storage` holds. Stored entries win over seed
    /// entries with the same key. Unreadable stored contents are logged and ignored.
    pub fn load<S>(storage: S, seed: &str) -> Result<DayDetailCache>
    where
        S: Storage + 'static,
    {
        let mut entries = parse_entries(seed)?;

        match storage.read() {
            Ok(Some(contents)) => match parse_entries(&contents) {
                Ok(stored) => {
                    log::info!("loaded {} cached day details", stored.len());
                    entries.extend(stored);
                }
                Err(err) => log::warn!("ignoring unreadable day detail cache: {err}"),
            },
            Ok(None) => log::debug!("no cached day details stored yet"),
            Err(err) => log::warn!("failed to read day detail cache: {err}"),
        }

        Ok(DayDetailCache {
            entries,
            storage: Box::new(storage),
        })
    }

    pub fn get(&self, key: &str) -> Option<&EnrichmentRecord> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Adds a record and flushes the cache to storage.
    ///
    /// Existing entries are never replaced; returns `false` if `key` was already present. The
    /// entry stays in memory even if flushing fails.
    pub fn put(&mut self, key: impl Into<String>, record: EnrichmentRecord) -> Result<bool> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Ok(false);
        }

        self.entries.insert(key, record);
        self.flush()?;
        Ok(true)
    }

    /// Writes all entries to storage.
    pub fn flush(&self) -> Result<()> {
        self.storage.write(&self.to_json()?)
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact JSON object of all entries, the storage format.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    /// Pretty printed entries in the format of the bundled seed file, for promoting fetched
    /// details into the seed data.
    pub fn seed_snippet(&self) -> Result<String> {
        let mut snippet = serde_json::to_string_pretty(&self.entries)?;
        snippet.push('\n');
        Ok(snippet)
    }
}

/// Parses a JSON object of ISO date key to day details.
pub fn parse_entries(json: &str) -> Result<Entries> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(namenstag: &str) -> EnrichmentRecord {
        EnrichmentRecord::new(namenstag, format!("Inspiration für {namenstag}"))
    }

    #[test]
    fn seed_is_loaded() {
        let cache = DayDetailCache::load(MemoryStorage::default(), SEED_DATA).unwrap();

        assert_eq!(cache.len(), 5);
        assert!(cache.has("2026-10-26"));
        assert_eq!(
            cache.get("2026-12-24").unwrap().namenstag,
            "Adam und Eva"
        );
        assert_eq!(
            cache.get("2026-01-01").unwrap().inspiration,
            "Ein neues Jahr ist wie ein unbeschriebenes Blatt – beginne es mit Hoffnung."
        );
        assert!(!cache.has("2026-10-27"));
    }

    #[test]
    fn put_flushes_and_never_overwrites() {
        let storage = Arc::new(MemoryStorage::default());
        let mut cache = DayDetailCache::new(storage.clone());

        assert_eq!(storage.read().unwrap(), None);
        assert!(cache.put("2026-03-19", record("Josef")).unwrap());
        assert_eq!(
            storage.read().unwrap().unwrap(),
            r#"{"2026-03-19":{"namenstag":"Josef","inspiration":"Inspiration für Josef"}}"#
        );

        assert!(!cache.put("2026-03-19", record("Anderer")).unwrap());
        assert_eq!(cache.get("2026-03-19").unwrap().namenstag, "Josef");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn round_trip_through_storage() {
        let storage = Arc::new(MemoryStorage::default());
        let mut cache = DayDetailCache::new(storage.clone());
        cache.put("2026-05-01", record("Josef der Arbeiter")).unwrap();
        cache.put("2026-02-14", record("Valentin")).unwrap();
        cache.put("2026-11-11", record("Martin")).unwrap();

        let reloaded = DayDetailCache::load(storage, "{}").unwrap();
        assert_eq!(reloaded.entries(), cache.entries());
    }

    #[test]
    fn stored_entries_win_over_seed() {
        let storage = MemoryStorage::default();
        storage
            .write(r#"{"2026-10-26":{"namenstag":"Amandus","inspiration":"Frei."}}"#)
            .unwrap();

        let cache = DayDetailCache::load(storage, SEED_DATA).unwrap();
        assert_eq!(cache.len(), 5);
        assert_eq!(
            cache.get("2026-10-26"),
            Some(&EnrichmentRecord::new("Amandus", "Frei."))
        );
    }

    #[test]
    fn corrupt_storage_falls_back_to_seed() {
        let storage = MemoryStorage::default();
        storage.write("not json").unwrap();

        let cache = DayDetailCache::load(storage, SEED_DATA).unwrap();
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn seed_snippet_matches_seed_file() {
        let cache = DayDetailCache::load(MemoryStorage::default(), SEED_DATA).unwrap();
        assert_eq!(cache.seed_snippet().unwrap(), SEED_DATA);
    }

    #[test]
    fn file_storage() {
        let dir = std::env::temp_dir().join(format!("kalender-cache-test-{}", std::process::id()));
        let storage = FileStorage::new(dir.join("nested").join("namenstage.json"));

        assert_eq!(storage.read().unwrap(), None);
        storage.write("{}").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some("{}"));
        assert!(storage.path().exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
