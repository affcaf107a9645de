//! 컬렉션 메타데이터 카탈로그 (`collections.json`)
//!
//! 카탈로그에 기록이 있는 컬렉션만 존재하는 것으로 취급합니다.
//! 쓰기는 임시 파일에 쓴 뒤 rename으로 교체하므로 읽는 쪽은 잠금 없이
//! 항상 완전한 목록을 봅니다. 읽기-수정-쓰기는 `update`가 프로세스 안에서는
//! 뮤텍스로, 프로세스 사이에서는 `collections.lock` 파일 잠금으로 직렬화합니다.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::lock::{FileLock, LockMode};
use crate::error::Result;

/// 카탈로그 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    pub description: String,
    /// 인덱스를 만들 때 쓴 임베딩 모델 표시 이름
    pub embedding_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// 파일 기반 카탈로그
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// 전체 레코드 읽기 (파일이 없으면 빈 목록)
    pub fn read(&self) -> Result<Vec<CollectionRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(vec![]),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    /// 이름으로 레코드 찾기
    pub fn find(&self, name: &str) -> Result<Option<CollectionRecord>> {
        Ok(self.read()?.into_iter().find(|r| r.name == name))
    }

    /// 직렬화된 읽기-수정-쓰기
    ///
    /// 클로저가 `Ok((true, _))`를 돌려줄 때만 파일을 다시 씁니다.
    pub async fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<CollectionRecord>) -> Result<(bool, T)>,
    {
        let _guard = self.write_lock.lock().await;
        let _file_lock = FileLock::acquire(&self.lock_path(), LockMode::Exclusive).await?;

        let mut records = self.read()?;
        let (changed, value) = mutate(&mut records)?;
        if changed {
            self.write_atomic(&records)?;
        }

        Ok(value)
    }

    fn write_atomic(&self, records: &[CollectionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // 프로세스마다 다른 임시 파일
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        std::fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!("Catalog written: {} record(s)", records.len());
        Ok(())
    }
}
