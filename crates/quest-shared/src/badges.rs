//! Plain ASCII rendering of completed badges and challenges.

use crate::completion::{CompletableItem, CompletionReport, ItemKind};

/// Compact `[Title]` tag for an item
pub fn badge_tag(item: &CompletableItem) -> String {
    format!("[{}]", item.title)
}

/// One line of satisfied items, capped at `max_display`
pub fn format_badges(report: &CompletionReport, max_display: usize) -> String {
    let unlocked: Vec<_> = report.satisfied().collect();
    if unlocked.is_empty() {
        return String::new();
    }

    let tags: Vec<String> = unlocked
        .iter()
        .take(max_display)
        .map(|e| badge_tag(&e.item))
        .collect();
    let line = tags.join(" ");

    if unlocked.len() > max_display {
        format!("{} +{} more", line, unlocked.len() - max_display)
    } else {
        line
    }
}

/// Notification line for a freshly unlocked item
pub fn format_unlock(item: &CompletableItem) -> String {
    let kind = match item.kind {
        ItemKind::Badge => "Badge",
        ItemKind::Challenge => "Challenge",
    };
    if item.description.is_empty() {
        format!("{} {} unlocked: {}", badge_tag(item), kind, item.title)
    } else {
        format!(
            "{} {} unlocked: {} - {}",
            badge_tag(item),
            kind,
            item.title,
            item.description
        )
    }
}
