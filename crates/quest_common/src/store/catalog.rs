// Catalog of completable items (read-mostly, written by catalog import)

use anyhow::{Context, Result};
use quest_shared::{CompletableItem, Condition, ItemKind};
use rusqlite::{params, Connection};
use tracing::warn;

/// Insert or replace one catalog row
pub fn upsert_item(conn: &Connection, item: &CompletableItem) -> Result<()> {
    conn.execute(
        "INSERT INTO catalog_items (id, kind, title, description, condition)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             title = excluded.title,
             description = excluded.description,
             condition = excluded.condition",
        params![
            item.id,
            item.kind.as_str(),
            item.title,
            item.description,
            item.condition.to_string(),
        ],
    )
    .with_context(|| format!("Failed to store catalog item {}", item.id))?;
    Ok(())
}

/// Load the catalog ordered by id. Rows whose kind or condition no longer
/// parse are skipped with a warning so one bad row cannot hide the rest.
pub fn load_catalog(conn: &Connection) -> Result<Vec<CompletableItem>> {
    let mut stmt =
        conn.prepare("SELECT id, kind, title, description, condition FROM catalog_items ORDER BY id ASC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = Vec::with_capacity(rows.len());
    for (id, kind, title, description, condition) in rows {
        let parsed = kind
            .parse::<ItemKind>()
            .and_then(|kind| Ok((kind, condition.parse::<Condition>()?)));
        match parsed {
            Ok((kind, condition)) => items.push(CompletableItem {
                id,
                kind,
                title,
                description,
                condition,
            }),
            Err(e) => warn!(item = %id, "Skipping malformed catalog row: {}", e),
        }
    }
    Ok(items)
}
