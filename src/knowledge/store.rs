//! Collection Store - 컬렉션 생성/로드/삭제
//!
//! 컬렉션 하나 = 벡터 인덱스 디렉토리 + 키워드 인덱스 디렉토리 + 카탈로그 레코드.
//! 저장 위치: `<data_dir>/collections/<name>/`, `<data_dir>/keyword-index/<name>/`,
//! `<data_dir>/collections.json`
//!
//! 생성은 트랜잭션이 아닙니다. 중간에 프로세스가 죽으면 인덱스 일부만 남을 수 있고,
//! 삭제는 그런 상태에서도 에러 없이 남은 것을 정리합니다.
//! 같은 이름에 대한 생성/삭제는 이름별 쓰기 잠금으로, 로드는 읽기 잠금으로 직렬화합니다.
//! 이름별 잠금은 프로세스 안의 `RwLock`과 `<data_dir>/locks/<name>.lock` 파일 잠금 두 겹입니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::catalog::{Catalog, CollectionRecord};
use super::chunker::{ChunkConfig, TokenTextSplitter};
use super::ingest::{DocumentBatch, SourceType};
use super::keyword::{KeywordIndex, KEYWORD_DB_FILE};
use super::keywords::{KeywordExtractor, LlmKeywordExtractor};
use super::lance::LanceVectorIndex;
use super::lock::{FileLock, LockMode};
use super::passage::{MetadataMode, Passage};
use crate::config::{RetrievalConfig, StorageConfig};
use crate::error::{RagError, Result};
use crate::models::UserModels;

/// 키워드 추출 동시 요청 수
const KEYWORD_CONCURRENCY: usize = 4;

/// 컬렉션 이름 최대 길이
const MAX_NAME_LEN: usize = 63;

/// 이름이 비었을 때 쓰는 이름
const FALLBACK_NAME: &str = "default_name";

// ============================================================================
// Name Sanitizing
// ============================================================================

/// 저장소 키로 쓸 수 있는 컬렉션 이름으로 변환
///
/// 1. 앞뒤 공백 제거
/// 2. `[a-zA-Z0-9_-]` 외 문자는 `_`로 치환
/// 3. 앞뒤의 영숫자가 아닌 문자 제거
/// 4. 비었으면 `default_name`, 아니면 63자로 자름
pub fn format_collection_name(name: &str) -> String {
    let invalid = Regex::new(r"[^a-zA-Z0-9_-]").expect("valid name regex");

    let replaced = invalid.replace_all(name.trim(), "_");
    let trimmed = replaced.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    let collapsed = trimmed.replace("..", "_");

    if collapsed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        collapsed.chars().take(MAX_NAME_LEN).collect()
    }
}

/// 파일 시스템 경로로 써도 안전한 이름인지
fn is_storage_safe(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 입력 파일 이름에서 컬렉션 이름 추출 (첫 `.` 앞부분)
pub fn collection_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    format_collection_name(stem)
}

// ============================================================================
// Types
// ============================================================================

/// 로드된 컬렉션
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    pub record: CollectionRecord,
    pub vector: Arc<LanceVectorIndex>,
    pub keyword: Arc<KeywordIndex>,
}

/// 이름별 잠금을 쥐고 있는 동안 살아 있는 guard
///
/// drop되면 잠금을 풀고, 아무도 기다리지 않는 이름은 잠금 표에서 지웁니다.
struct NameGuard<'a> {
    locks: &'a Mutex<HashMap<String, Arc<RwLock<()>>>>,
    name: String,
    read_guard: Option<OwnedRwLockReadGuard<()>>,
    write_guard: Option<OwnedRwLockWriteGuard<()>>,
    file_lock: Option<FileLock>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.file_lock.take();
        self.read_guard.take();
        self.write_guard.take();

        if let Ok(mut locks) = self.locks.lock() {
            if locks
                .get(&self.name)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(&self.name);
            }
        }
    }
}

/// 저장소 통계
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub collection_count: usize,
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
}

// ============================================================================
// CollectionStore
// ============================================================================

/// 컬렉션 저장소
pub struct CollectionStore {
    storage: StorageConfig,
    retrieval: RetrievalConfig,
    catalog: Catalog,
    name_locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl CollectionStore {
    /// 저장소 열기 (디렉토리가 없으면 생성)
    pub fn open(storage: &StorageConfig, retrieval: &RetrievalConfig) -> Result<Self> {
        std::fs::create_dir_all(storage.vector_root())?;
        std::fs::create_dir_all(storage.keyword_root())?;
        std::fs::create_dir_all(storage.lock_root())?;

        tracing::debug!("Collection store at {:?}", storage.data_dir);

        Ok(Self {
            storage: storage.clone(),
            retrieval: retrieval.clone(),
            catalog: Catalog::new(storage.catalog_path()),
            name_locks: Mutex::new(HashMap::new()),
        })
    }

    fn name_lock(&self, name: &str) -> Result<Arc<RwLock<()>>> {
        let mut locks = self
            .name_locks
            .lock()
            .map_err(|e| RagError::Lock(e.to_string()))?;
        Ok(locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone())
    }

    /// 이름별 잠금 파일 경로 (경로로 못 쓰는 이름은 해시)
    fn name_lock_path(&self, name: &str) -> PathBuf {
        let file_stem = if is_storage_safe(name) {
            name.to_string()
        } else {
            format!("{:x}", Sha256::digest(name.as_bytes()))
        };
        self.storage.lock_root().join(format!("{}.lock", file_stem))
    }

    /// 이름별 잠금 획득 (프로세스 안 → 프로세스 사이 순서)
    async fn lock_name(&self, name: &str, mode: LockMode) -> Result<NameGuard<'_>> {
        let lock = self.name_lock(name)?;
        let mut guard = NameGuard {
            locks: &self.name_locks,
            name: name.to_string(),
            read_guard: None,
            write_guard: None,
            file_lock: None,
        };

        match mode {
            LockMode::Shared => guard.read_guard = Some(lock.read_owned().await),
            LockMode::Exclusive => guard.write_guard = Some(lock.write_owned().await),
        }
        guard.file_lock = Some(FileLock::acquire(&self.name_lock_path(name), mode).await?);

        Ok(guard)
    }

    fn vector_dir(&self, name: &str) -> PathBuf {
        self.storage.vector_root().join(name)
    }

    fn keyword_dir(&self, name: &str) -> PathBuf {
        self.storage.keyword_root().join(name)
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// JSON 입력 파일로 컬렉션 생성
    ///
    /// 컬렉션 이름은 파일 이름(첫 `.` 앞)을 정리해서 씁니다.
    pub async fn create_new_collection(
        &self,
        models: &UserModels,
        path: &Path,
        source_type: SourceType,
    ) -> Result<CollectionRecord> {
        let name = collection_name_from_path(path);
        let batch = DocumentBatch::from_file(path)?;
        tracing::info!("Creating collection '{}' from {} ({})", name, path.display(), source_type);
        self.create(&name, &batch, models).await
    }

    /// 배치로 컬렉션 생성
    ///
    /// 같은 이름의 레코드가 이미 있으면 입력 에러입니다.
    pub async fn create(
        &self,
        name: &str,
        batch: &DocumentBatch,
        models: &UserModels,
    ) -> Result<CollectionRecord> {
        let name = format_collection_name(name);
        let _guard = self.lock_name(&name, LockMode::Exclusive).await?;

        if self.catalog.find(&name)?.is_some() {
            return Err(RagError::input(format!("Collection '{}' already exists", name)));
        }

        let splitter = TokenTextSplitter::new(ChunkConfig {
            chunk_size: self.retrieval.chunk_size,
            chunk_overlap: self.retrieval.chunk_overlap,
        });
        let passages = batch.split_into_passages(&splitter)?;

        // 이전에 실패한 생성이 남긴 인덱스 정리
        self.remove_index_dirs(&name).await;

        let record = CollectionRecord {
            name: name.clone(),
            description: batch.description.clone(),
            embedding_name: models.embedding.name().to_string(),
            created_at: Some(Utc::now()),
        };

        let result = async {
            self.build_indices(&name, &passages, models).await?;
            self.catalog
                .update(|records| {
                    if records.iter().any(|r| r.name == record.name) {
                        return Err(RagError::input(format!(
                            "Collection '{}' already exists",
                            record.name
                        )));
                    }
                    records.push(record.clone());
                    Ok((true, ()))
                })
                .await
        }
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to create collection '{}': {}", name, e);
            self.remove_index_dirs(&name).await;
            return Err(e);
        }

        tracing::info!(
            "Created collection '{}' ({} passages, embedding '{}')",
            name,
            passages.len(),
            record.embedding_name
        );

        Ok(record)
    }

    async fn build_indices(
        &self,
        name: &str,
        passages: &[Passage],
        models: &UserModels,
    ) -> Result<()> {
        tracing::info!("Creating {} vector index ...", name);
        let texts: Vec<String> = passages
            .iter()
            .map(|p| p.content(MetadataMode::Embed))
            .collect();
        let embeddings = models.embedding.embed_batch(&texts).await?;
        LanceVectorIndex::create(
            &self.vector_dir(name),
            passages,
            &embeddings,
            models.embedding.dimension(),
        )
        .await?;

        tracing::info!("Creating {} keyword index ...", name);
        let extractor =
            LlmKeywordExtractor::new(models.llm.clone(), self.retrieval.max_keywords_per_chunk);
        let extractor = &extractor;
        let keywords: Vec<Vec<String>> = futures::stream::iter(passages)
            .map(|p| async move { extractor.extract(&p.content(MetadataMode::Llm)).await })
            .buffered(KEYWORD_CONCURRENCY)
            .try_collect()
            .await?;

        let entries: Vec<(Passage, Vec<String>)> =
            passages.iter().cloned().zip(keywords).collect();
        KeywordIndex::create(&self.keyword_dir(name), &entries)?;

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    /// 컬렉션 로드
    ///
    /// 카탈로그 레코드가 없으면 `Ok(None)`, 레코드는 있는데 인덱스가 없으면
    /// `RagError::IncompleteCollection`입니다.
    pub async fn load(&self, name: &str) -> Result<Option<CollectionHandle>> {
        let _guard = self.lock_name(name, LockMode::Shared).await?;

        let record = match self.catalog.find(name)? {
            Some(record) => record,
            None => {
                tracing::debug!("Collection '{}' not found in catalog", name);
                return Ok(None);
            }
        };

        if !is_storage_safe(name) {
            return Err(RagError::input(format!("Invalid collection name: {}", name)));
        }

        let vector_dir = self.vector_dir(name);
        if !vector_dir.is_dir() {
            return Err(RagError::IncompleteCollection {
                name: name.to_string(),
                missing: "vector index".to_string(),
            });
        }

        let keyword_dir = self.keyword_dir(name);
        if !keyword_dir.join(KEYWORD_DB_FILE).is_file() {
            return Err(RagError::IncompleteCollection {
                name: name.to_string(),
                missing: "keyword index".to_string(),
            });
        }

        let vector = LanceVectorIndex::open(&vector_dir).await?;
        let keyword = KeywordIndex::open(&keyword_dir)?;

        tracing::info!("Loaded collection '{}'", name);

        Ok(Some(CollectionHandle {
            record,
            vector: Arc::new(vector),
            keyword: Arc::new(keyword),
        }))
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    /// 컬렉션 삭제 (없는 부분은 건너뜀)
    ///
    /// 카탈로그 레코드를 지웠으면 `true`를 반환합니다.
    pub async fn delete_by_name(&self, name: &str) -> Result<bool> {
        let _guard = self.lock_name(name, LockMode::Exclusive).await?;

        if is_storage_safe(name) {
            self.remove_index_dirs(name).await;
        } else {
            tracing::warn!("Skipping index removal for unsafe collection name: {:?}", name);
        }

        let removed = self
            .catalog
            .update(|records| {
                let before = records.len();
                records.retain(|r| r.name != name);
                let removed = records.len() != before;
                Ok((removed, removed))
            })
            .await?;

        if removed {
            tracing::info!("Deleted collection '{}'", name);
        } else {
            tracing::info!("Collection '{}' had no catalog record", name);
        }

        Ok(removed)
    }

    async fn remove_index_dirs(&self, name: &str) {
        for dir in [self.vector_dir(name), self.keyword_dir(name)] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => tracing::debug!("Removed {:?}", dir),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", dir, e),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Catalog reads
    // ------------------------------------------------------------------------

    /// 전체 카탈로그 레코드
    pub fn get_all(&self) -> Result<Vec<CollectionRecord>> {
        self.catalog.read()
    }

    /// 이름 목록에 해당하는 레코드 (카탈로그 순서)
    pub fn get_by_names(&self, names: &[String]) -> Result<Vec<CollectionRecord>> {
        Ok(self
            .catalog
            .read()?
            .into_iter()
            .filter(|r| names.contains(&r.name))
            .collect())
    }

    /// 전체 컬렉션 이름
    pub fn get_names(&self) -> Result<Vec<String>> {
        Ok(self.catalog.read()?.into_iter().map(|r| r.name).collect())
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            collection_count: self.catalog.read()?.len(),
            data_dir: self.storage.data_dir.clone(),
            catalog_path: self.catalog.path().to_path_buf(),
        })
    }

    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_models, FailingLlm, HashEmbedding};
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> CollectionStore {
        let storage = StorageConfig {
            data_dir: dir.path().to_path_buf(),
        };
        CollectionStore::open(&storage, &RetrievalConfig::default()).unwrap()
    }

    fn batch() -> DocumentBatch {
        DocumentBatch::from_json(
            r#"{
                "description": "Rust async runtimes",
                "data": [
                    {"Name": "Tokio", "Link": "https://tokio.rs", "Content": "Tokio is an asynchronous runtime for Rust with a work stealing scheduler."},
                    {"Name": "LanceDB", "Link": "https://lancedb.com", "Content": "LanceDB stores embeddings in columnar lance files for vector search."}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_format_collection_name() {
        assert_eq!(format_collection_name("  my papers  "), "my_papers");
        assert_eq!(format_collection_name("__rust-docs__"), "rust-docs");
        assert_eq!(format_collection_name("a.b"), "a_b");
        assert_eq!(format_collection_name("한글"), FALLBACK_NAME);
        assert_eq!(format_collection_name(""), FALLBACK_NAME);
        assert_eq!(format_collection_name(&"x".repeat(100)).len(), 63);
    }

    #[test]
    fn test_collection_name_from_path() {
        assert_eq!(
            collection_name_from_path(Path::new("/tmp/rust papers.v2.json")),
            "rust_papers"
        );
    }

    #[test]
    fn test_is_storage_safe() {
        assert!(is_storage_safe("papers_2024-v1"));
        assert!(!is_storage_safe("../etc"));
        assert!(!is_storage_safe(""));
    }

    #[tokio::test]
    async fn test_create_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let models = test_models();

        let record = store.create("rust", &batch(), &models).await.unwrap();
        assert_eq!(record.name, "rust");
        assert_eq!(record.description, "Rust async runtimes");
        assert_eq!(record.embedding_name, HashEmbedding::NAME);

        let handle = store.load("rust").await.unwrap().expect("collection exists");
        assert_eq!(handle.record.name, "rust");
        assert_eq!(handle.vector.count().await.unwrap(), 2);
        assert_eq!(handle.keyword.passage_count().unwrap(), 2);

        assert_eq!(store.get_names().unwrap(), vec!["rust"]);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.create("rust", &batch(), &test_models()).await.unwrap();

        let first = store.load("rust").await.unwrap().unwrap();
        let second = store.load("rust").await.unwrap().unwrap();

        assert_eq!(first.record, second.record);
        assert_eq!(first.vector.path(), second.vector.path());
        assert_eq!(first.keyword.db_path(), second.keyword.db_path());
        assert_eq!(
            first.vector.count().await.unwrap(),
            second.vector.count().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.load("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let models = test_models();

        store.create("rust", &batch(), &models).await.unwrap();
        let err = store.create("rust", &batch(), &models).await.unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_create_same_name() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let models = test_models();
        let batch = batch();

        let (first, second) = tokio::join!(
            store.create("rust", &batch, &models),
            store.create("rust", &batch, &models)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(RagError::Input(_)))));
        assert_eq!(store.get_all().unwrap().len(), 1);
        assert!(store.load("rust").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_create_across_store_instances() {
        let dir = TempDir::new().unwrap();
        // 같은 data_dir을 여는 두 저장소 (CLI 프로세스 두 개와 같음)
        let store_a = open_store(&dir);
        let store_b = open_store(&dir);
        let models = test_models();
        let batch = batch();

        let (a, b) = tokio::join!(
            store_a.create("rust", &batch, &models),
            store_b.create("rust", &batch, &models)
        );

        assert!(a.is_ok() != b.is_ok());
        assert!(matches!(
            if a.is_ok() { b } else { a },
            Err(RagError::Input(_))
        ));
        assert_eq!(store_a.get_all().unwrap().len(), 1);

        let (c, d) = tokio::join!(
            store_a.create("tokio", &batch, &models),
            store_b.create("lance", &batch, &models)
        );
        c.unwrap();
        d.unwrap();
        assert_eq!(store_b.get_names().unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_racing_delete_sees_whole_collection_or_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let models = test_models();

        for _ in 0..3 {
            store.create("rust", &batch(), &models).await.unwrap();

            let (deleted, loaded) =
                tokio::join!(store.delete_by_name("rust"), store.load("rust"));

            assert!(deleted.unwrap());
            if let Some(handle) = loaded.unwrap() {
                assert_eq!(handle.record.name, "rust");
            }
            assert!(store.load("rust").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_name_locks_released() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.create("rust", &batch(), &test_models()).await.unwrap();
        store.load("rust").await.unwrap();
        store.delete_by_name("rust").await.unwrap();
        store.load("ghost").await.unwrap();

        assert!(store.name_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_catalog_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.create("rust", &batch(), &test_models()).await.unwrap();

        let catalog_path = StorageConfig {
            data_dir: dir.path().to_path_buf(),
        }
        .catalog_path();
        let before = std::fs::read_to_string(&catalog_path).unwrap();

        assert!(!store.delete_by_name("ghost").await.unwrap());

        let after = std::fs::read_to_string(&catalog_path).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_delete_partial_collection() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.create("rust", &batch(), &test_models()).await.unwrap();

        // 키워드 인덱스만 먼저 사라진 상태
        std::fs::remove_dir_all(store.keyword_dir("rust")).unwrap();
        let err = store.load("rust").await.unwrap_err();
        assert!(matches!(err, RagError::IncompleteCollection { .. }));

        assert!(store.delete_by_name("rust").await.unwrap());
        assert!(!store.vector_dir("rust").exists());
        assert!(store.load("rust").await.unwrap().is_none());

        // 두 번째 삭제도 에러 없음
        assert!(!store.delete_by_name("rust").await.unwrap());
    }

    #[tokio::test]
    async fn test_orphaned_indices_not_loaded() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.create("rust", &batch(), &test_models()).await.unwrap();

        // 레코드만 지우고 인덱스는 남김
        store
            .catalog
            .update(|records| {
                records.clear();
                Ok((true, ()))
            })
            .await
            .unwrap();

        assert!(store.vector_dir("rust").exists());
        assert!(store.load("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_create_cleans_up() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let models = UserModels::new(Arc::new(FailingLlm::network()), Arc::new(HashEmbedding::new()));

        let err = store.create("rust", &batch(), &models).await.unwrap_err();
        assert!(matches!(err, RagError::Provider { .. }));
        assert!(!store.vector_dir("rust").exists());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_new_collection_from_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let input = dir.path().join("Async Rust.json");
        std::fs::write(&input, serde_json::to_string(&batch()).unwrap()).unwrap();

        let record = store
            .create_new_collection(&test_models(), &input, SourceType::Webpages)
            .await
            .unwrap();
        assert_eq!(record.name, "Async_Rust");
    }

    #[tokio::test]
    async fn test_get_by_names() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let models = test_models();

        store.create("a", &batch(), &models).await.unwrap();
        store.create("b", &batch(), &models).await.unwrap();

        let records = store
            .get_by_names(&["b".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b");
        assert_eq!(store.stats().unwrap().collection_count, 2);
    }
}
