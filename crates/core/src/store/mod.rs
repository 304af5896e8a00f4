use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::{
    alignment::{AlignmentTable, VerseAlignment},
    config::AlignmentConfig,
    Result, SyncError,
};

/// Backing resource that serves raw alignment documents by filename.
#[async_trait]
pub trait AlignmentSource: Send + Sync {
    async fn fetch(&self, filename: &str) -> Result<Vec<u8>>;
}

/// Serves alignment files from a local directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AlignmentSource for DirectorySource {
    async fn fetch(&self, filename: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.root.join(filename)).await?)
    }
}

/// Loads and caches per-reciter alignment tables for the session.
///
/// Reciter ids are matched case-insensitively. A table that fails to load
/// is remembered and never refetched until [`AlignmentStore::clear_cache`].
pub struct AlignmentStore {
    reciters: BTreeMap<String, String>,
    source: Arc<dyn AlignmentSource>,
    tables: Mutex<HashMap<String, Arc<AlignmentTable>>>,
    failures: Mutex<HashMap<String, SyncError>>,
}

impl AlignmentStore {
    pub fn new(reciters: BTreeMap<String, String>, source: Arc<dyn AlignmentSource>) -> Self {
        Self {
            reciters: reciters
                .into_iter()
                .map(|(id, file)| (id.to_lowercase(), file))
                .collect(),
            source,
            tables: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Store backed by the configured data directory.
    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self::new(
            config.normalized_reciters(),
            Arc::new(DirectorySource::new(config.data_dir.clone())),
        )
    }

    /// Static capability check; never touches the backing resource.
    pub fn has_alignment(&self, reciter_id: &str) -> bool {
        self.reciters.contains_key(&reciter_id.to_lowercase())
    }

    pub fn reciters(&self) -> impl Iterator<Item = &str> {
        self.reciters.keys().map(String::as_str)
    }

    /// Returns the reciter's table, fetching and parsing it on first use.
    pub async fn load_alignment(&self, reciter_id: &str) -> Result<Arc<AlignmentTable>> {
        let key = reciter_id.to_lowercase();
        let filename = self
            .reciters
            .get(&key)
            .ok_or_else(|| SyncError::NotFound {
                reciter: reciter_id.to_string(),
            })?
            .clone();

        let cached = self.lock_tables()?.get(&key).cloned();
        if let Some(table) = cached {
            tracing::debug!(reciter = %key, "alignment cache hit");
            return Ok(table);
        }
        let failed = self.lock_failures()?.get(&key).cloned();
        if let Some(err) = failed {
            return Err(err);
        }

        match self.fetch_table(&key, &filename).await {
            Ok(table) => {
                tracing::info!(reciter = %key, verses = table.len(), "loaded alignment table");
                let mut tables = self.lock_tables()?;
                let cached = tables.entry(key).or_insert_with(|| Arc::new(table));
                Ok(cached.clone())
            }
            Err(err) => {
                tracing::warn!(reciter = %key, error = %err, "alignment unavailable for session");
                self.lock_failures()?.insert(key, err.clone());
                Err(err)
            }
        }
    }

    /// Looks up one verse. Every failure, including an unregistered
    /// reciter, collapses to `None` so callers fall back to unsynchronised
    /// behaviour.
    pub async fn verse_alignment(
        &self,
        reciter_id: &str,
        chapter: u32,
        verse: u32,
    ) -> Option<VerseAlignment> {
        match self.load_alignment(reciter_id).await {
            Ok(table) => table.verse(chapter, verse).cloned(),
            Err(err) => {
                if !err.is_not_found() {
                    tracing::debug!(reciter = reciter_id, chapter, verse, error = %err, "no verse alignment");
                }
                None
            }
        }
    }

    /// Drops every cached table and remembered failure.
    pub fn clear_cache(&self) -> Result<()> {
        self.lock_tables()?.clear();
        self.lock_failures()?.clear();
        Ok(())
    }

    async fn fetch_table(&self, key: &str, filename: &str) -> Result<AlignmentTable> {
        let bytes = self
            .source
            .fetch(filename)
            .await
            .map_err(|err| SyncError::Load {
                reciter: key.to_string(),
                message: err.to_string(),
            })?;

        AlignmentTable::from_json(&bytes).map_err(|err| SyncError::Load {
            reciter: key.to_string(),
            message: format!("malformed {filename}: {err}"),
        })
    }

    fn lock_tables(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<AlignmentTable>>>> {
        self.tables
            .lock()
            .map_err(|_| SyncError::msg("alignment cache has been poisoned"))
    }

    fn lock_failures(&self) -> Result<MutexGuard<'_, HashMap<String, SyncError>>> {
        self.failures
            .lock()
            .map_err(|_| SyncError::msg("alignment failure log has been poisoned"))
    }
}

impl std::fmt::Debug for AlignmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentStore")
            .field("reciters", &self.reciters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct MemorySource {
        files: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl MemorySource {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AlignmentSource for MemorySource {
        async fn fetch(&self, filename: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(filename)
                .cloned()
                .ok_or_else(|| SyncError::msg(format!("{filename} missing")))
        }
    }

    const TABLE: &str = r#"[{"surah": 1, "ayah": 1, "segments": [[0, 1, 60, 610], [1, 2, 620, 1310]]}]"#;

    fn store_with(source: Arc<MemorySource>) -> AlignmentStore {
        let reciters = BTreeMap::from([
            ("ar.alafasy".to_string(), "Alafasy.json".to_string()),
            ("ar.broken".to_string(), "Broken.json".to_string()),
            ("ar.absent".to_string(), "Absent.json".to_string()),
        ]);
        AlignmentStore::new(reciters, source)
    }

    #[test]
    fn capability_check_is_case_insensitive() {
        let store = store_with(Arc::new(MemorySource::new(&[])));
        assert!(store.has_alignment("AR.Alafasy"));
        assert!(!store.has_alignment("ar.sudais"));
        assert_eq!(store.reciters().count(), 3);
    }

    #[tokio::test]
    async fn caches_tables_after_first_load() {
        let source = Arc::new(MemorySource::new(&[("Alafasy.json", TABLE)]));
        let store = store_with(source.clone());

        let first = store.load_alignment("ar.alafasy").await.unwrap();
        let second = store.load_alignment("AR.ALAFASY").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_reciter_is_not_found() {
        let store = store_with(Arc::new(MemorySource::new(&[])));
        let err = store.load_alignment("ar.nobody").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn load_failures_are_remembered_without_retry() {
        let source = Arc::new(MemorySource::new(&[("Broken.json", "{not json")]));
        let store = store_with(source.clone());

        let err = store.load_alignment("ar.broken").await.unwrap_err();
        assert!(matches!(err, SyncError::Load { .. }));
        let again = store.load_alignment("ar.broken").await.unwrap_err();
        assert!(matches!(again, SyncError::Load { .. }));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        assert!(matches!(
            store.load_alignment("ar.absent").await,
            Err(SyncError::Load { .. })
        ));
    }

    #[tokio::test]
    async fn clearing_the_cache_allows_a_refetch() {
        let source = Arc::new(MemorySource::new(&[("Alafasy.json", TABLE)]));
        let store = store_with(source.clone());

        store.load_alignment("ar.alafasy").await.unwrap();
        store.clear_cache().unwrap();
        store.load_alignment("ar.alafasy").await.unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn verse_lookup_degrades_to_none() {
        let source = Arc::new(MemorySource::new(&[("Alafasy.json", TABLE)]));
        let store = store_with(source);

        let verse = store.verse_alignment("ar.alafasy", 1, 1).await.unwrap();
        assert_eq!(verse.segments.len(), 2);
        assert!(store.verse_alignment("ar.alafasy", 1, 2).await.is_none());
        assert!(store.verse_alignment("ar.broken", 1, 1).await.is_none());
        assert!(store.verse_alignment("ar.nobody", 1, 1).await.is_none());
    }

    #[tokio::test]
    async fn reads_tables_from_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Alafasy.json"), TABLE).unwrap();

        let store = AlignmentStore::new(
            BTreeMap::from([("ar.alafasy".to_string(), "Alafasy.json".to_string())]),
            Arc::new(DirectorySource::new(dir.path())),
        );

        let table = store.load_alignment("ar.alafasy").await.unwrap();
        assert!(table.verse(1, 1).is_some());
    }
}
