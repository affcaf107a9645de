//! 프로세스 간 advisory 파일 잠금
//!
//! CLI 명령은 각자 별도 프로세스로 실행되므로, 카탈로그 갱신과 같은 이름에 대한
//! 생성/삭제는 파일 잠금으로 직렬화합니다. 값이 drop되어 파일이 닫히면 풀립니다.
//! 잠금 파일은 지우지 않습니다 (기다리는 쪽이 다른 inode를 잡게 됨).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::{RagError, Result};

/// 잠금 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// 잡고 있는 파일 잠금
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// 잠금 획득 (다른 프로세스가 잡고 있으면 풀릴 때까지 대기)
    pub async fn acquire(path: &Path, mode: LockMode) -> Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path, mode))
            .await
            .map_err(|e| RagError::Lock(e.to_string()))?
    }

    fn acquire_blocking(path: PathBuf, mode: LockMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match mode {
            LockMode::Shared => file.lock_shared()?,
            LockMode::Exclusive => file.lock_exclusive()?,
        }

        tracing::trace!("Acquired {:?} lock on {:?}", mode, path);
        Ok(Self {
            _file: file,
            path,
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_lock_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks").join("rust.lock");

        let lock = FileLock::acquire(&path, LockMode::Exclusive).await.unwrap();
        assert!(path.is_file());
        assert_eq!(lock.path(), path);
        assert_eq!(lock.mode(), LockMode::Exclusive);
    }

    #[tokio::test]
    async fn test_shared_locks_coexist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.lock");

        let first = FileLock::acquire(&path, LockMode::Shared).await.unwrap();
        let second = tokio::time::timeout(
            Duration::from_secs(5),
            FileLock::acquire(&path, LockMode::Shared),
        )
        .await
        .expect("shared lock should not wait")
        .unwrap();
        drop((first, second));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exclusive_waits_for_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.lock");

        let held = FileLock::acquire(&path, LockMode::Exclusive).await.unwrap();

        let waiter = tokio::spawn({
            let path = path.clone();
            async move { FileLock::acquire(&path, LockMode::Exclusive).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let acquired = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("lock should be granted after release")
            .unwrap();
        assert!(acquired.is_ok());
    }
}
