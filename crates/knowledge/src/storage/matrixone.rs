//! MatrixOne-backed durable vector store.
//!
//! MatrixOne speaks the MySQL wire protocol and provides a `VECF32(D)` column
//! type together with `cosine_similarity`/`l2_norm` functions, so the store
//! is a thin layer of SQL over an `sqlx` MySQL pool. Every operation checks a
//! connection out of the pool; nothing is shared between callers.

use super::{cosine_similarity, l2_norm, rank, validate_record, StorageBackend};
use crate::source::content_hash;
use crate::types::{Metadata, RetrievedChunk, SourceSummary, VectorRecord};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use ragvault_core::config::{MatrixOneConfig, SimilarityMode};
use ragvault_core::{AppError, AppResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Connection, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const INDEX_NAME: &str = "idx_embedding";

/// Durable vector store on a MatrixOne database.
#[derive(Debug)]
pub struct MatrixOneStore {
    pool: MySqlPool,
    table: String,
    dimensions: usize,
    similarity: SimilarityMode,
    closed: AtomicBool,
}

impl MatrixOneStore {
    /// Connect and make sure the database, table and (best effort) vector
    /// index exist.
    ///
    /// Any failure before the table is in place is returned to the caller
    /// after releasing whatever connections were opened. Index creation
    /// failures only log a warning.
    pub async fn connect(config: &MatrixOneConfig, dimensions: usize) -> AppResult<Self> {
        validate_identifier(&config.database, "database")?;
        validate_identifier(&config.table, "table")?;
        if dimensions == 0 {
            return Err(AppError::Storage(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        let timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
        let password = config.resolve_password();
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&password);

        tracing::debug!(
            "Connecting to MatrixOne at {}:{} as '{}'",
            config.host,
            config.port,
            config.user
        );

        ensure_database(&options, &config.database, timeout).await?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect_with(options.database(&config.database))
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to open connection pool to database '{}': {}",
                    config.database, e
                ))
            })?;

        if let Err(e) = sqlx::raw_sql(&create_table_sql(&config.table, dimensions))
            .execute(&pool)
            .await
        {
            pool.close().await;
            return Err(AppError::Storage(format!(
                "Failed to create table '{}': {}",
                config.table, e
            )));
        }

        let store = Self {
            pool,
            table: config.table.clone(),
            dimensions,
            similarity: config.similarity,
            closed: AtomicBool::new(false),
        };

        if config.create_index {
            if let Err(e) = store.ensure_index(&config.database, config.index_lists).await {
                tracing::warn!(
                    "Vector index creation on '{}' failed, queries will run unindexed: {}",
                    config.table,
                    e
                );
            }
        }

        tracing::info!(
            "Connected to MatrixOne {}:{}/{} (table '{}', {} dimensions, {:?} similarity)",
            config.host,
            config.port,
            config.database,
            config.table,
            dimensions,
            config.similarity
        );

        Ok(store)
    }

    async fn ensure_index(&self, database: &str, lists: u32) -> Result<(), sqlx::Error> {
        sqlx::raw_sql("SET GLOBAL experimental_ivf_index = 1")
            .execute(&self.pool)
            .await?;

        let existing: i64 = sqlx::query(
            "SELECT COUNT(*) FROM information_schema.statistics \
             WHERE table_schema = ? AND table_name = ? AND index_name = ?",
        )
        .bind(database)
        .bind(&self.table)
        .bind(INDEX_NAME)
        .fetch_one(&self.pool)
        .await?
        .try_get(0)?;

        if existing == 0 {
            sqlx::raw_sql(&create_index_sql(&self.table, lists.max(1)))
                .execute(&self.pool)
                .await?;
            tracing::info!("Created vector index {} on '{}'", INDEX_NAME, self.table);
        }

        Ok(())
    }

    /// Insert unless the unique `(source_id, content_hash)` key already
    /// holds the chunk. Returns the number of rows written.
    async fn insert(&self, record: &VectorRecord) -> Result<u64, sqlx::Error> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let done = sqlx::query(&insert_sql(&self.table))
            .bind(&record.source_id)
            .bind(&record.content)
            .bind(content_hash(&record.content))
            .bind(vector_literal(&record.embedding))
            .bind(metadata)
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected())
    }

    async fn rank_in_database(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, sqlx::Error> {
        // A zero query is orthogonal to everything: every score is 0 and the
        // ranking degenerates to insertion order.
        if l2_norm(query_embedding) == 0.0 {
            let rows = sqlx::query(&format!(
                "SELECT source_id, content, metadata FROM {} ORDER BY id ASC LIMIT {}",
                self.table, top_k
            ))
            .fetch_all(&self.pool)
            .await?;

            return rows.iter().map(|row| decode_chunk(row, 0.0)).collect();
        }

        let rows = sqlx::query(&similarity_sql(&self.table, self.dimensions, top_k))
            .bind(vector_literal(query_embedding))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| decode_chunk(row, decode_score(row)))
            .collect()
    }

    async fn rank_by_scan(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT source_id, content, metadata, embedding FROM {} ORDER BY id ASC",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        let scanned = rows
            .iter()
            .map(|row| -> Result<ScannedRow, sqlx::Error> {
                Ok(ScannedRow {
                    source_id: row.try_get("source_id")?,
                    content: row.try_get("content")?,
                    metadata: row.try_get("metadata")?,
                    embedding: row.try_get_unchecked("embedding")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(score_scanned(query_embedding, scanned, top_k))
    }
}

/// A row read back for client-side scoring, embedding still in text form.
#[derive(Debug, Clone)]
struct ScannedRow {
    source_id: String,
    content: String,
    metadata: Option<String>,
    embedding: String,
}

/// Score scanned rows against the query and rank them.
///
/// Rows must arrive in insertion order for ties to keep it. Unparseable
/// embeddings score 0.
fn score_scanned(
    query_embedding: &[f32],
    rows: Vec<ScannedRow>,
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let scored = rows
        .into_iter()
        .map(|row| {
            let score = match parse_vector_text(&row.embedding) {
                Some(embedding) => cosine_similarity(query_embedding, &embedding),
                None => {
                    tracing::warn!(
                        "Unparseable embedding for source '{}', scoring 0",
                        row.source_id
                    );
                    0.0
                }
            };
            RetrievedChunk::new(
                row.source_id,
                row.content,
                decode_metadata(row.metadata.as_deref()),
                score,
            )
        })
        .collect();

    rank(scored, top_k)
}

#[async_trait]
impl StorageBackend for MatrixOneStore {
    fn backend_name(&self) -> &str {
        "matrixone"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn store(&self, record: &VectorRecord) -> AppResult<bool> {
        validate_record(record, self.dimensions)?;

        match self.insert(record).await {
            Ok(1) => Ok(true),
            Ok(_) => {
                tracing::debug!(
                    "Skipping duplicate chunk for source '{}'",
                    record.source_id
                );
                Ok(false)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to store chunk for source '{}': {}",
                    record.source_id,
                    e
                );
                Ok(false)
            }
        }
    }

    async fn retrieve_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Vec<RetrievedChunk> {
        if top_k == 0 {
            return Vec::new();
        }

        let result = match self.similarity {
            SimilarityMode::Database => self.rank_in_database(query_embedding, top_k).await,
            SimilarityMode::Scan => self.rank_by_scan(query_embedding, top_k).await,
        };

        match result {
            Ok(chunks) => {
                tracing::debug!(
                    "Retrieved {} chunks from MatrixOne (requested top-{})",
                    chunks.len(),
                    top_k
                );
                chunks
            }
            Err(e) => {
                tracing::error!("Failed to retrieve similar chunks: {}", e);
                Vec::new()
            }
        }
    }

    async fn delete(&self, source_id: &str) -> bool {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE source_id = ?", self.table))
            .bind(source_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                tracing::debug!(
                    "Deleted {} chunks for source '{}' from MatrixOne",
                    done.rows_affected(),
                    source_id
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to delete source '{}': {}", source_id, e);
                false
            }
        }
    }

    async fn count(&self) -> AppResult<usize> {
        let count: i64 = sqlx::query(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get(0))
            .map_err(|e| AppError::Storage(format!("Failed to count rows: {}", e)))?;

        Ok(count.max(0) as usize)
    }

    async fn list_sources(&self) -> AppResult<Vec<SourceSummary>> {
        let rows = sqlx::query(&sources_sql(&self.table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list sources: {}", e)))?;

        rows.iter()
            .map(|row| -> Result<SourceSummary, sqlx::Error> {
                let source_id: String = row.try_get("source_id")?;
                let chunks: i64 = row.try_get("chunks")?;
                Ok(SourceSummary {
                    source_id,
                    chunks: chunks.max(0) as usize,
                    first_stored_at: decode_timestamp(row, "first_stored_at"),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| AppError::Storage(format!("Failed to decode source listing: {}", e)))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;
        tracing::debug!("Closed MatrixOne connection pool");
    }
}

/// Create the database over a short-lived connection.
async fn ensure_database(
    options: &MySqlConnectOptions,
    database: &str,
    timeout: Duration,
) -> AppResult<()> {
    let mut conn = match tokio::time::timeout(timeout, MySqlConnection::connect_with(options)).await
    {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            return Err(AppError::Storage(format!(
                "Failed to connect to MatrixOne: {}",
                e
            )))
        }
        Err(_) => {
            return Err(AppError::Storage(format!(
                "Timed out connecting to MatrixOne after {}s",
                timeout.as_secs()
            )))
        }
    };

    let created = sqlx::raw_sql(&format!("CREATE DATABASE IF NOT EXISTS {}", database))
        .execute(&mut conn)
        .await;

    if let Err(e) = conn.close().await {
        tracing::debug!("Bootstrap connection did not close cleanly: {}", e);
    }

    created.map(|_| ()).map_err(|e| {
        AppError::Storage(format!("Failed to create database '{}': {}", database, e))
    })
}

/// Database and table names are interpolated into SQL, so only plain
/// identifiers are accepted.
fn validate_identifier(name: &str, what: &str) -> AppResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 64 {
        Ok(())
    } else {
        Err(AppError::Storage(format!(
            "Invalid {} name '{}': use letters, digits and underscores",
            what, name
        )))
    }
}

/// `[x,y,z]` text form accepted for `VECF32` values.
fn vector_literal(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

fn parse_vector_text(raw: &str) -> Option<Vec<f32>> {
    serde_json::from_str(raw.trim()).ok()
}

// `content` is TEXT and cannot carry a key, so uniqueness is enforced on
// its SHA-256 instead.
fn create_table_sql(table: &str, dimensions: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         id BIGINT AUTO_INCREMENT PRIMARY KEY, \
         source_id VARCHAR(512) NOT NULL, \
         content TEXT NOT NULL, \
         content_hash CHAR(64) NOT NULL, \
         embedding VECF32({}), \
         metadata TEXT, \
         created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
         UNIQUE KEY uq_source_content (source_id, content_hash))",
        table, dimensions
    )
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT IGNORE INTO {} (source_id, content, content_hash, embedding, metadata) \
         VALUES (?, ?, ?, ?, ?)",
        table
    )
}

fn create_index_sql(table: &str, lists: u32) -> String {
    format!(
        "CREATE INDEX {} USING IVFFLAT ON {}(embedding) LISTS={} OP_TYPE \"vector_cosine_ops\"",
        INDEX_NAME, table, lists
    )
}

fn sources_sql(table: &str) -> String {
    format!(
        "SELECT source_id, COUNT(*) AS chunks, MIN(created_at) AS first_stored_at, \
         MIN(id) AS first_id FROM {} GROUP BY source_id ORDER BY first_id ASC",
        table
    )
}

// Zero-norm rows are pinned to 0 so the database never divides by zero.
fn similarity_sql(table: &str, dimensions: usize, top_k: usize) -> String {
    format!(
        "SELECT source_id, content, metadata, \
         CASE WHEN l2_norm(embedding) = 0 THEN 0.0 \
         ELSE cosine_similarity(embedding, CAST(? AS VECF32({}))) END AS score \
         FROM {} ORDER BY score DESC, id ASC LIMIT {}",
        dimensions, table, top_k
    )
}

fn decode_metadata(raw: Option<&str>) -> Metadata {
    match raw.map(serde_json::from_str::<serde_json::Value>) {
        Some(Ok(serde_json::Value::Object(map))) => map,
        Some(Ok(_)) | None => Metadata::new(),
        Some(Err(e)) => {
            tracing::warn!("Discarding unparseable chunk metadata: {}", e);
            Metadata::new()
        }
    }
}

fn decode_score(row: &MySqlRow) -> f32 {
    row.try_get::<f64, _>("score")
        .map(|s| s as f32)
        .or_else(|_| row.try_get::<f32, _>("score"))
        .unwrap_or_else(|e| {
            tracing::warn!("Unreadable similarity score, using 0: {}", e);
            0.0
        })
}

// TIMESTAMP decodes as UTC; some server versions report aggregates over it
// as DATETIME, which carries no zone.
fn decode_timestamp(row: &MySqlRow, column: &str) -> Option<DateTime<Utc>> {
    row.try_get::<Option<DateTime<Utc>>, _>(column)
        .or_else(|_| {
            row.try_get::<Option<NaiveDateTime>, _>(column)
                .map(|naive| naive.map(|n| n.and_utc()))
        })
        .unwrap_or_else(|e| {
            tracing::debug!("Unreadable timestamp in '{}': {}", column, e);
            None
        })
}

fn decode_chunk(row: &MySqlRow, score: f32) -> Result<RetrievedChunk, sqlx::Error> {
    let source_id: String = row.try_get("source_id")?;
    let content: String = row.try_get("content")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(RetrievedChunk::new(
        source_id,
        content,
        decode_metadata(metadata.as_deref()),
        score.clamp(-1.0, 1.0),
    ))
}
