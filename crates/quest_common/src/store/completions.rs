// Completion records: one per (participant, item), never changed

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quest_shared::{CompletionRecord, ParticipantId};
use rusqlite::{params, Connection};

/// Insert a completion record. Returns false when the pair already exists;
/// a duplicate is not an error.
pub fn record_completion(
    conn: &Connection,
    participant_id: ParticipantId,
    item_id: &str,
    completed_at: DateTime<Utc>,
) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO completion_records (participant_id, item_id, completed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(participant_id, item_id) DO NOTHING",
            params![participant_id, item_id, completed_at],
        )
        .context("Failed to insert completion record")?;
    Ok(inserted == 1)
}

pub fn completions_for(conn: &Connection, participant_id: ParticipantId) -> Result<Vec<CompletionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT participant_id, item_id, completed_at
         FROM completion_records WHERE participant_id = ?1
         ORDER BY completed_at ASC, item_id ASC",
    )?;
    let records = stmt
        .query_map(params![participant_id], |row| {
            Ok(CompletionRecord {
                participant_id: row.get(0)?,
                item_id: row.get(1)?,
                completed_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
