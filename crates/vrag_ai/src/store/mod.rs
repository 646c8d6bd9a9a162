//! Persistent similarity index over embedded chunks.
//!
//! Entries live in `store.sqlite` under the store directory. The embedding
//! model name and vector width are recorded on first write; any later add or
//! query with a different model or width is rejected, since vectors from
//! different embedding functions are not comparable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use vrag_core::db;
use vrag_core::error::{codes, AppError};

use crate::embeddings::Embedder;
use crate::knowledge::Chunk;

mod similarity;

use similarity::{cosine_similarity, decode_vector, encode_vector, l2_norm};

pub const STORE_FILE: &str = "store.sqlite";

const META_MODEL: &str = "embedding_model";
const META_DIMS: &str = "embedding_dims";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AddSummary {
    pub inserted: u32,
    pub updated: u32,
    /// Entries whose text was already stored; not re-embedded.
    pub unchanged: u32,
    /// Stale chunks past the new end of a re-ingested source.
    #[serde(default)]
    pub removed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub entry_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    /// 1-based.
    pub rank: u32,
    pub entry_id: String,
    pub score: f32,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.text.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    root: PathBuf,
    model: String,
}

impl VectorStore {
    /// Bind a store directory to the embedding model used for both writes and queries.
    /// Nothing touches disk until the first `add`.
    pub fn open(root: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            model: model.into(),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn db_path(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    fn connect_for_write(&self) -> Result<Connection, AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new(codes::STORE_FAILED, "Failed to create store directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })?;
        let mut conn = db::open(&self.db_path())?;
        db::migrate(&mut conn)?;
        Ok(conn)
    }

    fn connect_existing(&self) -> Result<Connection, AppError> {
        let path = self.db_path();
        if !path.is_file() {
            return Err(self.not_found());
        }
        let mut conn = db::open(&path)?;
        db::migrate(&mut conn)?;
        Ok(conn)
    }

    fn not_found(&self) -> AppError {
        AppError::new(
            codes::STORE_NOT_FOUND,
            "Vector store has no data; run ingestion first",
        )
        .with_details(format!("path={}", self.root.display()))
    }

    fn check_model(&self, stored: Option<&str>) -> Result<(), AppError> {
        match stored {
            Some(m) if m != self.model => Err(AppError::new(
                codes::STORE_EMBEDDING_MISMATCH,
                "Store was built with a different embedding model",
            )
            .with_details(format!("stored={m}; requested={}", self.model))),
            _ => Ok(()),
        }
    }

    /// Embed and upsert chunks. Entries are keyed by (topic, source id, chunk index);
    /// re-adding identical text is a no-op. A batch carries whole sources: stored
    /// chunks of a batch source whose index is at or past its new chunk count are
    /// deleted. All-or-nothing: nothing is written unless every embedding succeeds.
    pub fn add(&self, embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<AddSummary, AppError> {
        if chunks.is_empty() {
            return Ok(AddSummary::default());
        }

        let mut conn = self.connect_for_write()?;
        let tx = conn
            .transaction()
            .map_err(store_err("Failed to start store transaction"))?;

        let stored_model = read_meta(&tx, META_MODEL)?;
        self.check_model(stored_model.as_deref())?;
        let mut dims = read_dims(&tx)?;
        let ingested_at = now_rfc3339_utc()?;

        let mut summary = AddSummary::default();
        let mut source_lengths: BTreeMap<(String, String), u32> = BTreeMap::new();
        for chunk in chunks {
            let entry_id = entry_id_for(chunk);
            let text_sha256 = sha256_hex(chunk.text.as_bytes());
            let source_id = source_id_for(chunk);
            let len = source_lengths
                .entry((chunk.topic().to_string(), source_id.clone()))
                .or_insert(0);
            *len = (*len).max(chunk.index + 1);

            let existing: Option<String> = tx
                .query_row(
                    "SELECT text_sha256 FROM entries WHERE entry_id = ?1",
                    [&entry_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("Failed to look up store entry"))?;
            if existing.as_deref() == Some(text_sha256.as_str()) {
                summary.unchanged += 1;
                continue;
            }

            let v = embedder.embed(&self.model, &chunk.text).map_err(|e| {
                AppError::new(codes::EMBEDDINGS_FAILED, "Failed to compute embeddings")
                    .with_details(format!("entry_id={entry_id}; err={e}"))
                    .with_retryable(e.retryable)
            })?;
            let this_dims = v.len() as u32;
            if this_dims == 0 {
                return Err(AppError::new(
                    codes::EMBEDDINGS_FAILED,
                    "Embedder returned an empty vector",
                )
                .with_details(format!("entry_id={entry_id}")));
            }
            match dims {
                Some(d) if d != this_dims => {
                    return Err(dims_mismatch(d, this_dims).with_details(format!(
                        "expected={d}; got={this_dims}; entry_id={entry_id}"
                    )));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }

            let metadata_json = serde_json::to_string(&chunk.metadata).map_err(|e| {
                AppError::new(codes::STORE_FAILED, "Failed to encode chunk metadata")
                    .with_details(e.to_string())
            })?;

            tx.execute(
                r#"
                INSERT INTO entries(entry_id, topic, source_id, chunk_index, text, text_sha256,
                                    metadata_json, embedding, dims, ingested_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(entry_id) DO UPDATE SET
                  text = excluded.text,
                  text_sha256 = excluded.text_sha256,
                  metadata_json = excluded.metadata_json,
                  embedding = excluded.embedding,
                  dims = excluded.dims,
                  ingested_at = excluded.ingested_at
                "#,
                params![
                    entry_id,
                    chunk.topic(),
                    source_id,
                    chunk.index,
                    chunk.text,
                    text_sha256,
                    metadata_json,
                    encode_vector(&v),
                    this_dims,
                    ingested_at,
                ],
            )
            .map_err(store_err("Failed to write store entry"))?;

            if existing.is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }

        for ((topic, source_id), len) in &source_lengths {
            let removed = tx
                .execute(
                    "DELETE FROM entries WHERE topic = ?1 AND source_id = ?2 AND chunk_index >= ?3",
                    params![topic, source_id, len],
                )
                .map_err(store_err("Failed to remove stale store entries"))?;
            summary.removed += removed as u32;
        }

        if stored_model.is_none() {
            write_meta(&tx, META_MODEL, &self.model)?;
        }
        if let Some(d) = dims {
            write_meta(&tx, META_DIMS, &d.to_string())?;
        }
        tx.commit()
            .map_err(store_err("Failed to commit store transaction"))?;

        tracing::debug!(
            path = %self.root.display(),
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            removed = summary.removed,
            "store add complete"
        );
        Ok(summary)
    }

    /// Top-`k` entries by cosine similarity to `text`, best first. Equal scores keep
    /// insertion order. Zero-norm vectors (query or stored) score 0.0 rather than
    /// dropping out, so a store with at least `k` entries always yields `k` hits.
    pub fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: u32,
    ) -> Result<RetrievalResult, AppError> {
        if k == 0 {
            return Err(AppError::config("Retrieval k must be at least 1"));
        }
        let q = text.trim();
        if q.is_empty() {
            return Err(AppError::new(
                codes::RETRIEVAL_FAILED,
                "Query must not be empty",
            ));
        }

        let conn = self.connect_existing()?;
        let stored_model = read_meta(&conn, META_MODEL)?.ok_or_else(|| self.not_found())?;
        self.check_model(Some(&stored_model))?;
        let dims = read_dims(&conn)?.ok_or_else(|| self.not_found())?;

        let qv = embedder.embed(&self.model, q)?;
        if qv.len() as u32 != dims {
            return Err(dims_mismatch(dims, qv.len() as u32));
        }
        let qnorm = l2_norm(&qv);
        if qnorm == 0.0 {
            tracing::debug!("query embedding has zero norm; every entry scores 0.0");
        }

        let mut scored: Vec<(i64, f32)> = Vec::new();
        {
            let mut stmt = conn
                .prepare("SELECT seq, embedding FROM entries ORDER BY seq ASC")
                .map_err(store_err("Failed to scan store entries"))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
                .map_err(store_err("Failed to scan store entries"))?;
            for row in rows {
                let (seq, blob) = row.map_err(store_err("Failed to read store entry"))?;
                let v = decode_vector(&blob);
                if v.len() as u32 != dims {
                    return Err(dims_mismatch(dims, v.len() as u32)
                        .with_details(format!("seq={seq}; expected={dims}; got={}", v.len())));
                }
                let vnorm = l2_norm(&v);
                scored.push((seq, cosine_similarity(&qv, &v, qnorm, vnorm)));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k as usize);

        let mut hits = Vec::with_capacity(scored.len());
        for (i, (seq, score)) in scored.into_iter().enumerate() {
            let (entry_id, text, metadata_json): (String, String, String) = conn
                .query_row(
                    "SELECT entry_id, text, metadata_json FROM entries WHERE seq = ?1",
                    [seq],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .map_err(store_err("Failed to read store entry"))?;
            let metadata: BTreeMap<String, String> =
                serde_json::from_str(&metadata_json).map_err(|e| {
                    AppError::new(codes::STORE_FAILED, "Failed to decode chunk metadata")
                        .with_details(format!("entry_id={entry_id}; err={e}"))
                })?;
            hits.push(RetrievalHit {
                rank: i as u32 + 1,
                entry_id,
                score,
                text,
                metadata,
            });
        }

        tracing::debug!(k, returned = hits.len(), "store query complete");
        Ok(RetrievalResult { hits })
    }

    pub fn status(&self) -> Result<StoreStatus, AppError> {
        let path = self.db_path();
        if !path.is_file() {
            return Ok(StoreStatus {
                ready: false,
                model: None,
                dims: None,
                entry_count: 0,
            });
        }
        let conn = self.connect_existing()?;
        let model = read_meta(&conn, META_MODEL)?;
        let dims = read_dims(&conn)?;
        let entry_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(store_err("Failed to count store entries"))?;
        Ok(StoreStatus {
            ready: model.is_some() && entry_count > 0,
            model,
            dims,
            entry_count: entry_count.max(0) as u64,
        })
    }

    pub fn count(&self) -> Result<u64, AppError> {
        Ok(self.status()?.entry_count)
    }
}

/// Stable key for a chunk: content hash of (topic, source id, chunk index).
pub fn entry_id_for(chunk: &Chunk) -> String {
    let source = source_id_for(chunk);
    sha256_hex(format!("v1|{}|{}|{}", chunk.topic(), source, chunk.index).as_bytes())
}

/// PMID when known, otherwise the text hash.
fn source_id_for(chunk: &Chunk) -> String {
    chunk
        .source_id()
        .map(str::to_string)
        .unwrap_or_else(|| sha256_hex(chunk.text.as_bytes()))
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    conn.query_row("SELECT value FROM store_meta WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(store_err("Failed to read store metadata"))
}

fn read_dims(conn: &Connection) -> Result<Option<u32>, AppError> {
    match read_meta(conn, META_DIMS)? {
        None => Ok(None),
        Some(raw) => raw.parse::<u32>().map(Some).map_err(|e| {
            AppError::new(codes::STORE_FAILED, "Stored embedding dims are corrupt")
                .with_details(format!("value={raw}; err={e}"))
        }),
    }
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO store_meta(key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )
    .map_err(store_err("Failed to write store metadata"))?;
    Ok(())
}

fn dims_mismatch(expected: u32, got: u32) -> AppError {
    AppError::new(
        codes::STORE_EMBEDDING_MISMATCH,
        "Embedding dimensions do not match the store",
    )
    .with_details(format!("expected={expected}; got={got}"))
}

fn store_err(message: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::new(codes::STORE_FAILED, message).with_details(e.to_string())
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new(codes::STORE_FAILED, "Failed to format time").with_details(e.to_string())
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
