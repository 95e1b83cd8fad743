// Participant rows

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quest_shared::{AccountId, CohortId, Participant, ParticipantId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        account_id: row.get(1)?,
        display_name: row.get(2)?,
        enrolled_at: row.get(3)?,
    })
}

/// Enroll a new participant under `account_id`
pub fn insert_participant(
    conn: &Connection,
    account_id: AccountId,
    display_name: &str,
    enrolled_at: DateTime<Utc>,
) -> Result<Participant> {
    conn.execute(
        "INSERT INTO participants (account_id, display_name, enrolled_at) VALUES (?1, ?2, ?3)",
        params![account_id, display_name, enrolled_at],
    )
    .context("Failed to insert participant")?;

    Ok(Participant::new(
        conn.last_insert_rowid(),
        account_id,
        display_name,
        enrolled_at,
    ))
}

pub fn get_participant(conn: &Connection, id: ParticipantId) -> Result<Option<Participant>> {
    let participant = conn
        .query_row(
            "SELECT id, account_id, display_name, enrolled_at FROM participants WHERE id = ?1",
            params![id],
            from_row,
        )
        .optional()?;
    Ok(participant)
}

/// Lowest-id participant owned by the account
pub fn first_for_account(conn: &Connection, account_id: AccountId) -> Result<Option<Participant>> {
    let participant = conn
        .query_row(
            "SELECT id, account_id, display_name, enrolled_at FROM participants
             WHERE account_id = ?1 ORDER BY id ASC LIMIT 1",
            params![account_id],
            from_row,
        )
        .optional()?;
    Ok(participant)
}

pub fn list_for_account(conn: &Connection, account_id: AccountId) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, display_name, enrolled_at FROM participants
         WHERE account_id = ?1 ORDER BY id ASC",
    )?;
    let participants = stmt
        .query_map(params![account_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(participants)
}

/// Display names of everyone with at least one score event in the cohort
pub fn cohort_display_names(conn: &Connection, cohort_id: CohortId) -> Result<HashMap<ParticipantId, String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT p.id, p.display_name
         FROM participants p
         JOIN score_events s ON s.participant_id = p.id
         WHERE s.cohort_id = ?1",
    )?;
    let names: HashMap<ParticipantId, String> = stmt
        .query_map(params![cohort_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    Ok(names)
}
