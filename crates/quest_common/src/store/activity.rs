// Activity events (append-only)

use anyhow::{Context, Result};
use quest_shared::{ActivityEvent, ParticipantId};
use rusqlite::{params, Connection};

pub fn append_activity(conn: &Connection, event: &ActivityEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO activity_events (participant_id, name, delta, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![event.participant_id, event.name, event.delta, event.recorded_at],
    )
    .context("Failed to append activity event")?;
    Ok(conn.last_insert_rowid())
}

pub fn participant_activity(conn: &Connection, participant_id: ParticipantId) -> Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT participant_id, name, delta, recorded_at
         FROM activity_events WHERE participant_id = ?1 ORDER BY id ASC",
    )?;
    let events = stmt
        .query_map(params![participant_id], |row| {
            Ok(ActivityEvent {
                participant_id: row.get(0)?,
                name: row.get(1)?,
                delta: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}
