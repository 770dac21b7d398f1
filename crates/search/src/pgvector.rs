//! Vector similarity search using pgvector
//!
//! Expects a table named after the configured collection:
//!
//! ```sql
//! CREATE TABLE research_papers (
//!     id        TEXT PRIMARY KEY,
//!     payload   JSONB NOT NULL,   -- chunk_text, title, authors, year
//!     embedding VECTOR(768) NOT NULL
//! );
//! ```

use async_trait::async_trait;
use quro_common::db::DbPool;
use quro_common::errors::{AppError, Result};
use quro_common::retrieval::{VectorHit, VectorIndex};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, QueryResult, Statement};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Vector index backed by a Postgres table with a pgvector column
pub struct PgVectorIndex {
    db: Arc<DbPool>,
    table: String,
}

impl PgVectorIndex {
    /// Create an index over `table`; the name must be a plain identifier
    pub fn new(db: Arc<DbPool>, table: &str) -> Result<Self> {
        let valid = !table.is_empty()
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !table.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(AppError::Configuration {
                message: format!("Invalid pgvector table name: {}", table),
            });
        }

        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    /// Build the similarity query; the vector, floor and limit are bound
    /// as $1, $2 and $3
    fn build_query(&self) -> String {
        format!(
            r#"
            SELECT
                id::text AS id,
                payload,
                1 - (embedding <=> $1::vector) AS score
            FROM {table}
            WHERE 1 - (embedding <=> $1::vector) >= $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            "#,
            table = self.table
        )
    }
}

/// pgvector text literal for an embedding
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

/// Read one result row; a missing or mistyped `id` or `score` is an error
fn decode_row(row: &QueryResult) -> std::result::Result<VectorHit, DbErr> {
    let id: String = row.try_get("", "id")?;
    let score: f64 = row.try_get("", "score")?;
    let payload = match row.try_get::<Option<Value>>("", "payload")? {
        Some(Value::Object(map)) => map,
        _ => Default::default(),
    };

    Ok(VectorHit {
        id,
        score: score as f32,
        payload,
    })
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn search(&self, vector: &[f32], limit: usize, min_score: f32) -> Result<Vec<VectorHit>> {
        let sql = self.build_query();

        let rows = self
            .db
            .connection()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    vector_literal(vector).into(),
                    (min_score as f64).into(),
                    (limit as i64).into(),
                ],
            ))
            .await
            .map_err(|e| AppError::Retrieval {
                message: format!("Vector search failed: {}", e),
            })?;

        let hits: Vec<VectorHit> = rows
            .iter()
            .filter_map(|row| match decode_row(row) {
                Ok(hit) => Some(hit),
                Err(e) => {
                    warn!(table = %self.table, error = %e, "Skipping undecodable pgvector row");
                    None
                }
            })
            .collect();

        debug!(table = %self.table, hits = hits.len(), "pgvector search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "pgvector"
    }
}
