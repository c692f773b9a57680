//! SQLite-backed [`VectorStore`].
//!
//! Embeddings are stored as little-endian f32 BLOBs next to the chunk text.
//! Queries load every vector and score it with cosine similarity; the
//! index is meant for a few thousand chunks, not millions.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use doc_assistant_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use doc_assistant_core::models::Chunk;
use doc_assistant_core::store::{rank_hits, VectorHit, VectorRecord, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Chunk counts per source, sorted by source name.
    pub async fn source_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS chunks FROM chunks GROUP BY source ORDER BY source",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("source"), row.get("chunks")))
            .collect())
    }

    /// Most recent `created_at` across all chunks, if any.
    pub async fn last_indexed_at(&self) -> Result<Option<i64>> {
        let ts: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(ts)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let chunk = &record.chunk;
            sqlx::query(
                r#"
                INSERT INTO chunks
                    (key, source, chunk_id, locator, text, overlap_text, hash, model, dims, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    locator = excluded.locator,
                    text = excluded.text,
                    overlap_text = excluded.overlap_text,
                    hash = excluded.hash,
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at
                "#,
            )
            .bind(chunk.key())
            .bind(&chunk.source)
            .bind(chunk.chunk_id)
            .bind(&chunk.locator)
            .bind(&chunk.text)
            .bind(&chunk.overlap_text)
            .bind(&chunk.hash)
            .bind(&record.model)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT seq, source, chunk_id, locator, text, overlap_text, hash, embedding
            FROM chunks
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<VectorHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(vector, &blob_to_vec(&blob));
                VectorHit {
                    chunk: Chunk {
                        source: row.get("source"),
                        chunk_id: row.get("chunk_id"),
                        locator: row.get("locator"),
                        text: row.get("text"),
                        overlap_text: row.get("overlap_text"),
                        hash: row.get("hash"),
                    },
                    score,
                    seq: row.get("seq"),
                }
            })
            .collect();

        rank_hits(&mut hits, k);
        Ok(hits)
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::migrate_pool;

    async fn store() -> (tempfile::TempDir, SqliteVectorStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("test.sqlite")).await.unwrap();
        migrate_pool(&pool).await.unwrap();
        (tmp, SqliteVectorStore::new(pool))
    }

    fn record(source: &str, id: i64, text: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            chunk: Chunk {
                source: source.into(),
                chunk_id: id,
                locator: format!("{} (chunk {})", source, id),
                text: text.into(),
                overlap_text: String::new(),
                hash: format!("h{}", id),
            },
            vector,
            model: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_score_then_insertion() {
        let (_tmp, store) = store().await;
        store
            .upsert(&[
                record("a.txt", 0, "first", vec![1.0, 0.0]),
                record("a.txt", 1, "second", vec![0.0, 1.0]),
                record("b.txt", 0, "third", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 3).await.unwrap();
        let keys: Vec<String> = hits.iter().map(|h| h.chunk.key()).collect();
        assert_eq!(keys, vec!["a.txt_0", "b.txt_0", "a.txt_1"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(store.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_sequence() {
        let (_tmp, store) = store().await;
        store
            .upsert(&[
                record("a.txt", 0, "old", vec![1.0, 0.0]),
                record("b.txt", 0, "other", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        store
            .upsert(&[record("a.txt", 0, "new", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let hits = store.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].chunk.key(), "a.txt_0");
        assert_eq!(hits[0].chunk.text, "new");
    }

    #[tokio::test]
    async fn test_source_counts_and_empty() {
        let (_tmp, store) = store().await;
        assert!(store.is_empty().await.unwrap());
        assert!(store.last_indexed_at().await.unwrap().is_none());
        assert!(store.query(&[1.0], 5).await.unwrap().is_empty());

        store
            .upsert(&[
                record("b.txt", 0, "x", vec![1.0]),
                record("a.txt", 0, "y", vec![1.0]),
                record("a.txt", 1, "z", vec![1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(
            store.source_counts().await.unwrap(),
            vec![("a.txt".to_string(), 2), ("b.txt".to_string(), 1)]
        );
        assert!(store.last_indexed_at().await.unwrap().is_some());
    }
}
