use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::types::{FeatureVector, Piece};

/// BLAKE3 of the piece's metadata and events as JSON, truncated to 128
/// bits, hex-encoded. The piece id is not part of the content.
pub fn content_hash(piece: &Piece) -> Result<String> {
    let bytes = serde_json::to_vec(&(&piece.metadata, &piece.events))
        .context("serializing piece for hashing")?;
    let hash = blake3::hash(&bytes);
    Ok(hex::encode(&hash.as_bytes()[..16]))
}

/// SQLite-backed cache of extracted feature vectors.
///
/// Keyed by `(content_hash, version)`; bumping the extraction version turns
/// every older entry into a miss.
pub struct FeatureCache {
    connection: Mutex<Connection>,
}

impl FeatureCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        let connection = Connection::open(db_path)
            .with_context(|| format!("opening feature cache db {}", db_path.display()))?;
        Self::init(connection)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("opening in-memory feature cache")?)
    }

    fn init(connection: Connection) -> Result<Self> {
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS features (
                    content_hash TEXT NOT NULL,
                    version      INTEGER NOT NULL,
                    created_at   TEXT NOT NULL,
                    vector_json  TEXT NOT NULL,
                    PRIMARY KEY (content_hash, version)
                );",
            )
            .context("creating feature cache table")?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn get(&self, content_hash: &str, version: u32) -> Result<Option<FeatureVector>> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;

        let mut stmt = conn.prepare_cached(
            "SELECT vector_json FROM features WHERE content_hash = ?1 AND version = ?2",
        )?;

        let result = stmt.query_row(rusqlite::params![content_hash, version], |row| {
            row.get::<_, String>(0)
        });

        match result {
            Ok(json) => {
                let fv: FeatureVector =
                    serde_json::from_str(&json).context("deserializing cached feature vector")?;
                Ok(Some(fv))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("querying feature cache"),
        }
    }

    pub fn put(&self, content_hash: &str, version: u32, fv: &FeatureVector) -> Result<()> {
        let json = serde_json::to_string(fv).context("serializing feature vector for cache")?;
        let now = chrono::Utc::now().to_rfc3339();

        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;

        conn.execute(
            "INSERT OR REPLACE INTO features (content_hash, version, created_at, vector_json)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![content_hash, version, now, json],
        )?;

        Ok(())
    }

    /// Drop entries written by other extraction versions.
    pub fn prune_stale(&self, current_version: u32) -> Result<usize> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;

        let removed = conn
            .execute(
                "DELETE FROM features WHERE version != ?1",
                rusqlite::params![current_version],
            )
            .context("pruning stale feature cache entries")?;
        Ok(removed)
    }
}
