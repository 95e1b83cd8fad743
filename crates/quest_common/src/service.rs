//! Progression service.
//!
//! The only component that talks to the store and the identity provider.
//! Each call loads the rows it needs inside one store transaction, hands
//! them to the pure computations in `quest_shared`, commits any new
//! completion records and returns plain data.

use crate::catalog_file::CatalogFile;
use crate::config::QuestConfig;
use crate::identity::{IdentityProvider, RequestContext};
use crate::store::{activity, catalog, completions, participants, scores, QuestStore};
use chrono::{DateTime, Utc};
use quest_shared::activity::{BADGES_COMPLETED, CHALLENGES_COMPLETED};
use quest_shared::completion::evaluate;
use quest_shared::cycle::compute_cycle;
use quest_shared::streaks::streaks_from_timestamps;
use quest_shared::{
    AccountId, ActivityEvent, ActivitySnapshot, CohortId, CompletableItem, CompletionRecord,
    CompletionReport, CompletionStatus, CyclePosition, ItemKind, Leaderboard, Participant,
    ParticipantId, QuestError, QuestResult, ScoreEvent, Standing, StreakStats,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-child progress summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub participant: Participant,
    pub cycle: CyclePosition,
    pub completions: Vec<CompletionRecord>,
    pub streak: StreakStats,
}

fn store_err(e: anyhow::Error) -> QuestError {
    QuestError::Store(format!("{:#}", e))
}

fn check_cohort(cohort_id: CohortId) -> QuestResult<()> {
    if cohort_id <= 0 {
        return Err(QuestError::invalid(format!("invalid cohort id {}", cohort_id)));
    }
    Ok(())
}

pub struct ProgressionService<P: IdentityProvider> {
    store: Arc<QuestStore>,
    identity: P,
    config: QuestConfig,
}

impl<P: IdentityProvider> ProgressionService<P> {
    pub fn new(store: Arc<QuestStore>, identity: P, config: QuestConfig) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    fn account(&self, request: &RequestContext) -> QuestResult<AccountId> {
        self.identity
            .identify(request)
            .account_id()
            .ok_or(QuestError::Unauthenticated)
    }

    /// Resolve the participant a request is about.
    ///
    /// Without an explicit id this falls back to the account's first
    /// participant. An explicit id must belong to the authenticated account.
    pub async fn resolve_participant(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
    ) -> QuestResult<Participant> {
        let account = self.account(request)?;
        if let Some(id) = participant {
            if id <= 0 {
                return Err(QuestError::invalid(format!("invalid participant id {}", id)));
            }
        }

        let found = self
            .store
            .execute(move |conn| match participant {
                Some(id) => participants::get_participant(conn, id),
                None => participants::first_for_account(conn, account),
            })
            .await
            .map_err(store_err)?;

        match (participant, found) {
            (_, Some(p)) if p.account_id == account => Ok(p),
            (_, Some(p)) => Err(QuestError::invalid(format!(
                "participant {} does not belong to account {}",
                p.id, account
            ))),
            (Some(id), None) => Err(QuestError::invalid(format!("unknown participant {}", id))),
            (None, None) => Err(QuestError::invalid(format!(
                "account {} has no participants",
                account
            ))),
        }
    }

    /// Enroll a new participant under the authenticated account
    pub async fn enroll(
        &self,
        request: &RequestContext,
        display_name: &str,
        enrolled_at: DateTime<Utc>,
    ) -> QuestResult<Participant> {
        let account = self.account(request)?;
        let name = display_name.trim().to_string();
        if name.is_empty() {
            return Err(QuestError::invalid("display name is empty"));
        }

        let participant = self
            .store
            .execute(move |conn| participants::insert_participant(conn, account, &name, enrolled_at))
            .await
            .map_err(store_err)?;
        info!(participant = participant.id, account, "Enrolled participant");
        Ok(participant)
    }

    /// Participants owned by the authenticated account
    pub async fn participants(&self, request: &RequestContext) -> QuestResult<Vec<Participant>> {
        let account = self.account(request)?;
        self.store
            .execute(move |conn| participants::list_for_account(conn, account))
            .await
            .map_err(store_err)
    }

    pub async fn cycle_position(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
        now: DateTime<Utc>,
    ) -> QuestResult<CyclePosition> {
        let participant = self.resolve_participant(request, participant).await?;
        compute_cycle(participant.enrolled_at, now)
    }

    async fn load_leaderboard(&self, cohort_id: CohortId) -> QuestResult<Leaderboard> {
        let (events, names) = self
            .store
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let events = scores::cohort_events(&tx, cohort_id)?;
                let names = participants::cohort_display_names(&tx, cohort_id)?;
                tx.commit()?;
                Ok((events, names))
            })
            .await
            .map_err(store_err)?;

        debug!(cohort = cohort_id, events = events.len(), "Aggregating cohort");
        Leaderboard::from_events(cohort_id, &events, &names)
    }

    /// Top standings of a cohort; `None` uses the configured default size
    pub async fn leaderboard(
        &self,
        request: &RequestContext,
        cohort_id: CohortId,
        top_n: Option<usize>,
    ) -> QuestResult<Vec<Standing>> {
        self.account(request)?;
        check_cohort(cohort_id)?;
        let top_n = top_n.unwrap_or(self.config.leaderboard.default_top_n);

        let board = self.load_leaderboard(cohort_id).await?;
        Ok(board.checked_top(top_n)?.to_vec())
    }

    /// Rank over the whole cohort. `Ok(None)` when the participant has no
    /// score events there.
    pub async fn rank_of(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
        cohort_id: CohortId,
    ) -> QuestResult<Option<Standing>> {
        check_cohort(cohort_id)?;
        let participant = self.resolve_participant(request, participant).await?;
        let board = self.load_leaderboard(cohort_id).await?;
        Ok(board.rank_of(participant.id).cloned())
    }

    pub async fn record_score(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
        cohort_id: CohortId,
        score: i64,
        at: DateTime<Utc>,
    ) -> QuestResult<ScoreEvent> {
        check_cohort(cohort_id)?;
        ScoreEvent::check_score(score)?;
        let participant = self.resolve_participant(request, participant).await?;
        let event = ScoreEvent::new(participant.id, cohort_id, score).at(at);

        let stored = event.clone();
        self.store
            .execute(move |conn| scores::append_score(conn, &stored))
            .await
            .map_err(store_err)?;
        debug!(participant = participant.id, cohort = cohort_id, score, "Recorded score event");
        Ok(event)
    }

    /// Append an activity delta against a declared counter or flag
    pub async fn record_activity(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
        name: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> QuestResult<ActivityEvent> {
        if !self.config.activity.is_recordable(name) {
            return Err(QuestError::invalid(format!("undeclared activity '{}'", name)));
        }
        ActivityEvent::check_delta(delta)?;
        let participant = self.resolve_participant(request, participant).await?;

        let event = ActivityEvent {
            participant_id: participant.id,
            name: name.to_string(),
            delta,
            recorded_at: at,
        };
        let stored = event.clone();
        self.store
            .execute(move |conn| activity::append_activity(conn, &stored))
            .await
            .map_err(store_err)?;
        debug!(participant = participant.id, name, delta, "Recorded activity");
        Ok(event)
    }

    /// Fold activity events into a snapshot of the declared names. Events
    /// for names no longer declared are skipped.
    fn activity_snapshot(&self, events: &[ActivityEvent]) -> QuestResult<ActivitySnapshot> {
        let mut snapshot = self.config.activity.empty_snapshot();
        for event in events {
            match snapshot.apply(&event.name, event.delta) {
                Ok(()) => {}
                Err(QuestError::UnknownCounter(name)) => {
                    warn!(name = %name, "Ignoring activity for undeclared name");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(snapshot)
    }

    /// Evaluate the catalog (optionally one kind) for a participant and
    /// commit any newly satisfied items.
    ///
    /// Newly satisfied items feed the derived completion counters, so the
    /// evaluation repeats until nothing new unlocks.
    pub async fn evaluate_completions(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
        kind: Option<ItemKind>,
        now: DateTime<Utc>,
    ) -> QuestResult<CompletionReport> {
        let participant = self.resolve_participant(request, participant).await?;
        let pid = participant.id;

        let (full_catalog, records, events) = self
            .store
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let items = catalog::load_catalog(&tx)?;
                let records = completions::completions_for(&tx, pid)?;
                let events = activity::participant_activity(&tx, pid)?;
                tx.commit()?;
                Ok((items, records, events))
            })
            .await
            .map_err(store_err)?;

        let kinds: HashMap<String, ItemKind> = full_catalog
            .iter()
            .map(|item| (item.id.clone(), item.kind))
            .collect();
        let scoped: Vec<CompletableItem> = full_catalog
            .into_iter()
            .filter(|item| kind.map_or(true, |k| item.kind == k))
            .collect();

        let recorded: HashSet<String> = records.into_iter().map(|r| r.item_id).collect();
        let base = self.activity_snapshot(&events)?;

        let mut pending: HashSet<String> = HashSet::new();
        let report = loop {
            let done: HashSet<String> = recorded.union(&pending).cloned().collect();
            let snapshot = with_completion_counters(base.clone(), &done, &kinds);
            let report = evaluate(pid, &scoped, &done, &snapshot);

            let fresh: Vec<String> = report
                .newly_satisfied()
                .into_iter()
                .map(String::from)
                .collect();
            if fresh.is_empty() {
                break report;
            }
            pending.extend(fresh);
        };

        let report = mark_pending(report, &pending);
        if pending.is_empty() {
            return Ok(report);
        }

        let mut to_commit: Vec<String> = pending.into_iter().collect();
        to_commit.sort();
        let inserted = self
            .store
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = Vec::new();
                for item_id in &to_commit {
                    if completions::record_completion(&tx, pid, item_id, now)? {
                        inserted.push(item_id.clone());
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
            .map_err(store_err)?;

        for item_id in &inserted {
            info!(participant = pid, item = %item_id, "Completion recorded");
        }
        let already = report.newly_satisfied().len().saturating_sub(inserted.len());
        if already > 0 {
            debug!(participant = pid, already, "Completions were already recorded concurrently");
        }

        Ok(report)
    }

    /// Cycle position, completions and streak for one participant
    pub async fn progress_report(
        &self,
        request: &RequestContext,
        participant: Option<ParticipantId>,
        now: DateTime<Utc>,
    ) -> QuestResult<ProgressReport> {
        let participant = self.resolve_participant(request, participant).await?;
        let cycle = compute_cycle(participant.enrolled_at, now)?;
        let pid = participant.id;

        let (completions, mut times, events) = self
            .store
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let records = completions::completions_for(&tx, pid)?;
                let times = scores::participant_score_times(&tx, pid)?;
                let events = activity::participant_activity(&tx, pid)?;
                tx.commit()?;
                Ok((records, times, events))
            })
            .await
            .map_err(store_err)?;

        times.extend(events.iter().map(|e| e.recorded_at));
        let streak = streaks_from_timestamps(&times, now.date_naive());

        Ok(ProgressReport {
            participant,
            cycle,
            completions,
            streak,
        })
    }

    /// Validate and store a catalog file. Returns the number of items written.
    pub async fn import_catalog(&self, file: CatalogFile) -> QuestResult<usize> {
        let declared = self.config.activity.empty_snapshot();
        file.validate(&declared)
            .map_err(|e| QuestError::InvalidCondition(format!("{:#}", e)))?;

        let count = file.items.len();
        self.store
            .execute(move |conn| {
                let tx = conn.transaction()?;
                for item in &file.items {
                    catalog::upsert_item(&tx, item)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(store_err)?;
        info!(items = count, "Catalog imported");
        Ok(count)
    }

    pub async fn catalog(&self) -> QuestResult<Vec<CompletableItem>> {
        self.store
            .execute(|conn| catalog::load_catalog(conn))
            .await
            .map_err(store_err)
    }
}

/// Set the derived counters from the completed item ids
fn with_completion_counters(
    mut snapshot: ActivitySnapshot,
    done: &HashSet<String>,
    kinds: &HashMap<String, ItemKind>,
) -> ActivitySnapshot {
    let count = |kind: ItemKind| {
        done.iter()
            .filter(|id| kinds.get(id.as_str()) == Some(&kind))
            .count() as i64
    };
    snapshot.set_counter(BADGES_COMPLETED, count(ItemKind::Badge));
    snapshot.set_counter(CHALLENGES_COMPLETED, count(ItemKind::Challenge));
    snapshot
}

/// Items unlocked during this call were evaluated as already complete on
/// the final pass; report them as newly satisfied.
fn mark_pending(mut report: CompletionReport, pending: &HashSet<String>) -> CompletionReport {
    for eval in &mut report.items {
        if pending.contains(&eval.item.id) {
            eval.status = CompletionStatus::NewlySatisfied;
        }
    }
    report
}
