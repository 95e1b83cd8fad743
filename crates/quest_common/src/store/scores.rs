// Score events (append-only)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quest_shared::{CohortId, ParticipantId, ScoreEvent};
use rusqlite::{params, Connection};

/// Append a score event, returning its row id
pub fn append_score(conn: &Connection, event: &ScoreEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO score_events (participant_id, cohort_id, score, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![event.participant_id, event.cohort_id, event.score, event.recorded_at],
    )
    .context("Failed to append score event")?;
    Ok(conn.last_insert_rowid())
}

/// Every score event of a cohort, in insertion order
pub fn cohort_events(conn: &Connection, cohort_id: CohortId) -> Result<Vec<ScoreEvent>> {
    let mut stmt = conn.prepare(
        "SELECT participant_id, cohort_id, score, recorded_at
         FROM score_events WHERE cohort_id = ?1 ORDER BY id ASC",
    )?;
    let events = stmt
        .query_map(params![cohort_id], |row| {
            Ok(ScoreEvent {
                participant_id: row.get(0)?,
                cohort_id: row.get(1)?,
                score: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Timestamps of a participant's score events across all cohorts
pub fn participant_score_times(conn: &Connection, participant_id: ParticipantId) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare("SELECT recorded_at FROM score_events WHERE participant_id = ?1")?;
    let times: Vec<DateTime<Utc>> = stmt
        .query_map(params![participant_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(times)
}
