//! Command handlers for questctl.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quest_common::{CatalogFile, ProgressionService, RequestContext, StaticIdentity};
use quest_shared::badges::{format_badges, format_unlock};
use quest_shared::{CohortId, CompletionStatus, ItemKind, ParticipantId, Standing};
use serde::Serialize;
use std::path::Path;

/// Badges shown on one summary line before "+N more"
const MAX_BADGES_SHOWN: usize = 5;

pub struct Session {
    pub service: ProgressionService<StaticIdentity>,
    pub request: RequestContext,
    pub json: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_kv(key: &str, value: &str) {
    println!("{:14} {}", key, value);
}

fn print_standing(s: &Standing) {
    println!(
        "{:>4}  {:<24} {:>8}  ({} events)",
        s.rank, s.display_name, s.total_score, s.events
    );
}

impl Session {
    pub async fn enroll(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        let participant = self.service.enroll(&self.request, name, at).await?;
        if self.json {
            return print_json(&participant);
        }
        println!(
            "Enrolled {} as participant {}",
            participant.display_name, participant.id
        );
        Ok(())
    }

    pub async fn participants(&self) -> Result<()> {
        let list = self.service.participants(&self.request).await?;
        if self.json {
            return print_json(&list);
        }
        if list.is_empty() {
            println!("No participants enrolled");
        }
        for p in &list {
            println!(
                "{:>6}  {:<24} enrolled {}",
                p.id,
                p.display_name,
                p.enrolled_at.format("%Y-%m-%d")
            );
        }
        Ok(())
    }

    pub async fn score(
        &self,
        participant: Option<ParticipantId>,
        cohort: CohortId,
        score: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let event = self
            .service
            .record_score(&self.request, participant, cohort, score, at)
            .await?;
        if self.json {
            return print_json(&event);
        }
        println!(
            "Recorded {} points for participant {} in cohort {}",
            event.score, event.participant_id, event.cohort_id
        );
        Ok(())
    }

    pub async fn activity(
        &self,
        participant: Option<ParticipantId>,
        name: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let event = self
            .service
            .record_activity(&self.request, participant, name, delta, at)
            .await?;
        if self.json {
            return print_json(&event);
        }
        println!(
            "Recorded {} {:+} for participant {}",
            event.name, event.delta, event.participant_id
        );
        Ok(())
    }

    pub async fn cycle(&self, participant: Option<ParticipantId>, at: DateTime<Utc>) -> Result<()> {
        let pos = self
            .service
            .cycle_position(&self.request, participant, at)
            .await?;
        if self.json {
            return print_json(&pos);
        }
        print_kv("year", &pos.programme_year.to_string());
        print_kv("week", &pos.week_of_programme_year.to_string());
        print_kv("month", &pos.month_of_programme_year.to_string());
        print_kv("week_start", &pos.start_of_current_week.to_string());
        print_kv("total_weeks", &pos.total_weeks.to_string());
        Ok(())
    }

    pub async fn leaderboard(&self, cohort: CohortId, top: Option<usize>) -> Result<()> {
        let rows = self.service.leaderboard(&self.request, cohort, top).await?;
        if self.json {
            return print_json(&rows);
        }
        if rows.is_empty() {
            println!("No scores recorded for cohort {}", cohort);
        }
        rows.iter().for_each(print_standing);
        Ok(())
    }

    pub async fn rank(&self, participant: Option<ParticipantId>, cohort: CohortId) -> Result<()> {
        let standing = self
            .service
            .rank_of(&self.request, participant, cohort)
            .await?;
        if self.json {
            return print_json(&standing);
        }
        match standing {
            Some(s) => print_standing(&s),
            None => println!("No scores recorded in cohort {}", cohort),
        }
        Ok(())
    }

    pub async fn evaluate(
        &self,
        participant: Option<ParticipantId>,
        kind: Option<ItemKind>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let report = self
            .service
            .evaluate_completions(&self.request, participant, kind, at)
            .await?;
        if self.json {
            return print_json(&report);
        }

        for eval in &report.items {
            if eval.status == CompletionStatus::NewlySatisfied {
                println!("{}", format_unlock(&eval.item));
            }
        }
        for eval in report.failures() {
            if let CompletionStatus::Failed(reason) = &eval.status {
                eprintln!("warning: {} could not be evaluated: {}", eval.item.id, reason);
            }
        }

        let line = format_badges(&report, MAX_BADGES_SHOWN);
        if line.is_empty() {
            println!("Nothing unlocked yet");
        } else {
            println!("{}", line);
        }
        Ok(())
    }

    pub async fn progress(&self, participant: Option<ParticipantId>, at: DateTime<Utc>) -> Result<()> {
        let report = self
            .service
            .progress_report(&self.request, participant, at)
            .await?;
        if self.json {
            return print_json(&report);
        }

        print_kv("participant", &format!("{} ({})", report.participant.display_name, report.participant.id));
        print_kv(
            "cycle",
            &format!(
                "year {} week {} month {}",
                report.cycle.programme_year,
                report.cycle.week_of_programme_year,
                report.cycle.month_of_programme_year
            ),
        );
        print_kv(
            "streak",
            &format!(
                "{} days (best {}, {} active)",
                report.streak.current_streak, report.streak.best_streak, report.streak.active_days
            ),
        );
        print_kv("completions", &report.completions.len().to_string());
        for record in &report.completions {
            println!(
                "  {}  {}",
                record.completed_at.format("%Y-%m-%d"),
                record.item_id
            );
        }
        Ok(())
    }

    pub async fn import_catalog(&self, path: &Path) -> Result<()> {
        let file = CatalogFile::load(path)?;
        let count = self
            .service
            .import_catalog(file)
            .await
            .with_context(|| format!("Rejected catalog {}", path.display()))?;
        if self.json {
            return print_json(&serde_json::json!({ "imported": count }));
        }
        println!("Imported {} items from {}", count, path.display());
        Ok(())
    }

    pub async fn list_catalog(&self) -> Result<()> {
        let items = self.service.catalog().await?;
        if self.json {
            return print_json(&items);
        }
        for item in &items {
            println!(
                "{:<20} {:<10} {:<24} {}",
                item.id,
                item.kind.as_str(),
                item.title,
                item.condition
            );
        }
        Ok(())
    }
}
