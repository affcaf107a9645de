//! LanceDB Vector Index - 컬렉션별 벡터 인덱스
//!
//! 컬렉션마다 디렉토리 하나(`collections/<name>/`)를 쓰고 그 안에 `passages` 테이블을 둡니다.
//! 검색은 코사인 거리로 하고 `1 - distance`를 유사도 스코어로 돌려줍니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::passage::{Passage, PassageMetadata, ScoredPassage};
use crate::error::{RagError, Result};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "passages";

// ============================================================================
// LanceVectorIndex
// ============================================================================

/// LanceDB 벡터 인덱스
///
/// 생성 후에는 읽기 전용입니다.
pub struct LanceVectorIndex {
    table: lancedb::table::Table,
    path: PathBuf,
}

impl std::fmt::Debug for LanceVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceVectorIndex")
            .field("path", &self.path)
            .finish()
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| RagError::input(format!("Invalid path encoding: {}", path.display())))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| RagError::Index(format!("Missing {} column", name)))
}

impl LanceVectorIndex {
    /// 새 인덱스 생성
    ///
    /// # Arguments
    /// * `path` - 컬렉션 디렉토리
    /// * `passages` - 인덱싱할 Passage 목록
    /// * `embeddings` - Passage와 같은 순서의 임베딩
    /// * `dimension` - 임베딩 차원 (임베딩 프로바이더에서)
    pub async fn create(
        path: &Path,
        passages: &[Passage],
        embeddings: &[Vec<f32>],
        dimension: usize,
    ) -> Result<Self> {
        let batch = Self::passages_to_batch(passages, embeddings, dimension)?;
        let schema = batch.schema();

        tokio::fs::create_dir_all(path).await?;
        let db = lancedb::connect(path_str(path)?).execute().await?;

        // RecordBatchIterator로 감싸서 전달
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        let table = db.create_table(TABLE_NAME, batches).execute().await?;

        tracing::debug!(
            "Created vector index at {} ({} passages, dim {})",
            path.display(),
            passages.len(),
            dimension
        );

        Ok(Self {
            table,
            path: path.to_path_buf(),
        })
    }

    /// 기존 인덱스 열기
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(RagError::Index(format!(
                "Vector index directory not found: {}",
                path.display()
            )));
        }

        let db = lancedb::connect(path_str(path)?).execute().await?;

        let names = db.table_names().execute().await?;
        if !names.iter().any(|n| n == TABLE_NAME) {
            return Err(RagError::Index(format!(
                "Vector index at {} has no '{}' table",
                path.display(),
                TABLE_NAME
            )));
        }

        let table = db.open_table(TABLE_NAME).execute().await?;

        Ok(Self {
            table,
            path: path.to_path_buf(),
        })
    }

    /// 테이블 스키마
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("node_id", DataType::Utf8, false),
            Field::new("position", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("link", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// Passage들을 Arrow RecordBatch로 변환
    fn passages_to_batch(
        passages: &[Passage],
        embeddings: &[Vec<f32>],
        dimension: usize,
    ) -> Result<RecordBatch> {
        if passages.is_empty() {
            return Err(RagError::input("Cannot create a vector index without passages"));
        }
        if passages.len() != embeddings.len() {
            return Err(RagError::input(format!(
                "Passage/embedding count mismatch: {} vs {}",
                passages.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(RagError::input(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                dimension,
                bad.len()
            )));
        }

        let dim = i32::try_from(dimension)
            .map_err(|_| RagError::input(format!("Embedding dimension too large: {}", dimension)))?;

        let node_ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        let positions: Vec<i64> = passages.iter().map(|p| p.position as i64).collect();
        let names: Vec<&str> = passages.iter().map(|p| p.metadata.name.as_str()).collect();
        let links: Vec<&str> = passages.iter().map(|p| p.metadata.link.as_str()).collect();
        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let flat: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dim,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dim)),
            vec![
                Arc::new(StringArray::from(node_ids)),
                Arc::new(Int64Array::from(positions)),
                Arc::new(StringArray::from(names)),
                Arc::new(StringArray::from(links)),
                Arc::new(StringArray::from(texts)),
                Arc::new(embeddings_list),
            ],
        )?;

        Ok(batch)
    }

    /// 코사인 유사도 상위 `limit`개 검색 (유사도 내림차순)
    pub async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredPassage>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let stream = self
            .table
            .vector_search(query_embedding.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        let mut results = Vec::new();

        for batch in batches {
            let node_ids = column::<StringArray>(&batch, "node_id")?;
            let positions = column::<Int64Array>(&batch, "position")?;
            let names = column::<StringArray>(&batch, "name")?;
            let links = column::<StringArray>(&batch, "link")?;
            let texts = column::<StringArray>(&batch, "text")?;
            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = column::<Float32Array>(&batch, "_distance")?;

            for i in 0..batch.num_rows() {
                let passage = Passage {
                    id: node_ids.value(i).to_string(),
                    position: positions.value(i).max(0) as usize,
                    text: texts.value(i).to_string(),
                    metadata: PassageMetadata {
                        name: names.value(i).to_string(),
                        link: links.value(i).to_string(),
                    },
                };
                let similarity = 1.0 - distances.value(i);
                results.push(ScoredPassage::new(passage, Some(similarity)));
            }
        }

        // 배치 경계를 넘어서도 유사도 순서 보장 (동률은 인덱싱 순서)
        results.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or(f32::MIN), b.score.unwrap_or(f32::MIN));
            sb.total_cmp(&sa)
                .then(a.passage.position.cmp(&b.passage.position))
        });
        results.truncate(limit);

        Ok(results)
    }

    /// 저장된 Passage 수
    pub async fn count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// Tests
// ============================================================================
