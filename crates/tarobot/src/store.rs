//! SQLite history of card readings
//!
//! One row per reading. The first five cards are stored by ordinal in their
//! own columns; `cards_json` holds the full ordinal list.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use tarot::{card, CardReading};

/// Number of card columns in the reading table
pub const CARD_COLUMNS: usize = 5;

pub struct ReadingStore {
    conn: Connection,
}

impl ReadingStore {
    /// Open or create the database
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(busy_timeout)?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reading (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                generation_id TEXT NOT NULL,
                spread_type TEXT NOT NULL,
                card_one INTEGER,
                card_two INTEGER,
                card_three INTEGER,
                card_four INTEGER,
                card_five INTEGER,
                cards_json TEXT NOT NULL,
                seeker TEXT,
                teller TEXT,
                parameters_json TEXT NOT NULL,
                prompt TEXT NOT NULL,
                response TEXT NOT NULL,
                summary TEXT,
                model TEXT NOT NULL,
                created_ts TEXT NOT NULL,
                response_ms INTEGER NOT NULL,
                max_tokens INTEGER,
                prompt_tokens INTEGER NOT NULL,
                completion_tokens INTEGER NOT NULL,
                total_tokens INTEGER NOT NULL,
                temperature REAL,
                top_p REAL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reading_spread ON reading(spread_type);
            CREATE INDEX IF NOT EXISTS idx_reading_created ON reading(created_ts);
            "#,
        )?;
        Ok(())
    }

    /// Insert a reading and return its row id
    pub fn record(&self, reading: &CardReading) -> Result<i64> {
        let all_ordinals: Vec<usize> = reading.cards.iter().map(|c| card::ordinal(*c)).collect();
        if all_ordinals.len() > CARD_COLUMNS {
            warn!(
                cards = all_ordinals.len(),
                "only the first {} cards get their own column; see cards_json for the rest",
                CARD_COLUMNS
            );
        }

        let mut ordinals: [Option<i64>; CARD_COLUMNS] = [None; CARD_COLUMNS];
        for (slot, ordinal) in ordinals.iter_mut().zip(&all_ordinals) {
            *slot = Some(*ordinal as i64);
        }
        let cards_json = serde_json::to_string(&all_ordinals)?;

        let parameters = serde_json::to_string(&reading.parameters)?;
        let meta = &reading.metadata;

        self.conn.execute(
            r#"
            INSERT INTO reading (
                generation_id, spread_type,
                card_one, card_two, card_three, card_four, card_five, cards_json,
                seeker, teller, parameters_json, prompt, response, summary,
                model, created_ts, response_ms, max_tokens,
                prompt_tokens, completion_tokens, total_tokens,
                temperature, top_p, recorded_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
            )
            "#,
            params![
                meta.generation_id,
                reading.spread_type,
                ordinals[0],
                ordinals[1],
                ordinals[2],
                ordinals[3],
                ordinals[4],
                cards_json,
                reading.parameter("seeker"),
                reading.parameter("teller"),
                parameters,
                reading.prompt,
                reading.response,
                reading.summary,
                meta.model,
                meta.created_at.to_rfc3339(),
                meta.response_ms as i64,
                meta.max_tokens,
                meta.usage.prompt_tokens,
                meta.usage.completion_tokens,
                meta.usage.total_tokens,
                meta.temperature.map(f64::from),
                meta.top_p.map(f64::from),
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }
}
