//! Keyword Index - rusqlite 기반 키워드 → Passage 매핑
//!
//! 컬렉션마다 디렉토리 하나(`keyword-index/<name>/`)에 `keywords.db`를 둡니다.
//! - `passages`: Passage 본문과 메타데이터 (인덱싱 순서 포함)
//! - `keyword_table`: (keyword, node_id) 쌍
//!
//! 검색은 매칭된 쿼리 키워드 수 내림차순, 동률이면 인덱싱 순서입니다.
//! 키워드 검색 결과에는 스코어가 없습니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};

use super::passage::{Passage, PassageMetadata, ScoredPassage};
use crate::error::{RagError, Result};

/// 키워드 DB 파일 이름
pub const KEYWORD_DB_FILE: &str = "keywords.db";

// ============================================================================
// KeywordIndex
// ============================================================================

/// 키워드 인덱스
pub struct KeywordIndex {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl std::fmt::Debug for KeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordIndex")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl KeywordIndex {
    /// 새 인덱스 생성
    ///
    /// # Arguments
    /// * `dir` - 컬렉션 키워드 디렉토리 (없으면 생성)
    /// * `entries` - Passage와 그 키워드
    pub fn create(dir: &Path, entries: &[(Passage, Vec<String>)]) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(KEYWORD_DB_FILE);
        if db_path.exists() {
            std::fs::remove_file(&db_path)?;
        }

        let mut conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE passages (
                node_id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                name TEXT NOT NULL,
                link TEXT NOT NULL
            );

            CREATE TABLE keyword_table (
                keyword TEXT NOT NULL,
                node_id TEXT NOT NULL REFERENCES passages(node_id),
                PRIMARY KEY (keyword, node_id)
            );

            CREATE INDEX idx_keyword_table_node ON keyword_table(node_id);
            "#,
        )?;

        let tx = conn.transaction()?;
        let mut keyword_rows = 0usize;
        {
            let mut insert_passage = tx.prepare(
                "INSERT OR IGNORE INTO passages (node_id, position, text, name, link)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut insert_keyword = tx.prepare(
                "INSERT OR IGNORE INTO keyword_table (keyword, node_id) VALUES (?1, ?2)",
            )?;

            for (passage, keywords) in entries {
                insert_passage.execute(params![
                    passage.id,
                    passage.position as i64,
                    passage.text,
                    passage.metadata.name,
                    passage.metadata.link,
                ])?;

                for keyword in keywords {
                    keyword_rows += insert_keyword.execute(params![keyword, passage.id])?;
                }
            }
        }
        tx.commit()?;

        tracing::debug!(
            "Created keyword index at {:?} ({} passages, {} keyword rows)",
            db_path,
            entries.len(),
            keyword_rows
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// 기존 인덱스 열기 (읽기 전용)
    pub fn open(dir: &Path) -> Result<Self> {
        let db_path = dir.join(KEYWORD_DB_FILE);
        if !db_path.is_file() {
            return Err(RagError::Index(format!(
                "Keyword index not found: {}",
                db_path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| RagError::Lock(e.to_string()))
    }

    /// 키워드 검색
    ///
    /// 쿼리 키워드 중 하나 이상과 매칭된 Passage를 최대 `limit`개 반환합니다.
    pub fn search(&self, keywords: &[String], limit: usize) -> Result<Vec<ScoredPassage>> {
        if keywords.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let conn = self.lock()?;

        let placeholders = vec!["?"; keywords.len()].join(", ");
        let sql = format!(
            r#"
            SELECT p.node_id, p.position, p.text, p.name, p.link, COUNT(*) AS hits
            FROM keyword_table k
            JOIN passages p ON p.node_id = k.node_id
            WHERE k.keyword IN ({})
            GROUP BY p.node_id
            ORDER BY hits DESC, p.position ASC
            LIMIT ?
            "#,
            placeholders
        );

        let mut values: Vec<Value> = keywords.iter().map(|k| Value::Text(k.clone())).collect();
        values.push(Value::Integer(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let results = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(ScoredPassage::unscored(Passage {
                    id: row.get(0)?,
                    position: row.get::<_, i64>(1)?.max(0) as usize,
                    text: row.get(2)?,
                    metadata: PassageMetadata {
                        name: row.get(3)?,
                        link: row.get(4)?,
                    },
                }))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(results)
    }

    /// 저장된 Passage 수
    pub fn passage_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Passage 하나의 키워드 (알파벳순)
    pub fn keywords_for(&self, node_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT keyword FROM keyword_table WHERE node_id = ?1 ORDER BY keyword",
        )?;
        let keywords = stmt
            .query_map(params![node_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keywords)
    }
}

// ============================================================================
// Tests
// ============================================================================
