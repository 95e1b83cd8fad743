//! End-to-end tests for the progression service against a real SQLite file.

use chrono::{DateTime, Duration, TimeZone, Utc};
use quest_common::store::{activity, catalog, completions, scores};
use quest_common::{
    CatalogFile, DbLocation, ProgressionService, QuestConfig, QuestStore, RequestContext,
    StaticIdentity,
};
use quest_shared::{
    ActivityEvent, CompletableItem, CompletionStatus, Condition, ItemKind, QuestError, ScoreEvent,
};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const CATALOG: &str = r#"
[[item]]
id = "search_5"
kind = "badge"
title = "Curious Mind"
condition = "search_count >= 5"

[[item]]
id = "reader_2"
kind = "badge"
title = "Bookworm"
condition = "topics_read >= 2"

[[item]]
id = "first_badge"
kind = "challenge"
title = "Collector"
condition = "badges_completed >= 1"
"#;

struct Fixture {
    _dir: TempDir,
    path: std::path::PathBuf,
    service: ProgressionService<StaticIdentity>,
}

fn req() -> RequestContext {
    RequestContext::anonymous()
}

fn t(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, day, 12, 0, 0).unwrap()
}

async fn service_for(path: &std::path::Path, account: i64) -> ProgressionService<StaticIdentity> {
    let store = QuestStore::open(DbLocation::Custom(path.to_path_buf())).await.unwrap();
    ProgressionService::new(Arc::new(store), StaticIdentity::account(account), QuestConfig::default())
}

async fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quest.db");
    let service = service_for(&path, 1).await;
    service
        .import_catalog(CatalogFile::parse(CATALOG).unwrap())
        .await
        .unwrap();
    Fixture {
        _dir: dir,
        path,
        service,
    }
}

#[tokio::test]
async fn falls_back_to_first_participant_of_account() {
    let fx = fixture().await;
    let first = fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    fx.service.enroll(&req(), "Ben", t(2)).await.unwrap();

    let resolved = fx.service.resolve_participant(&req(), None).await.unwrap();
    assert_eq!(resolved.id, first.id);
    assert_eq!(resolved.display_name, "Ada");
}

#[tokio::test]
async fn rejects_foreign_and_missing_participants() {
    let fx = fixture().await;
    let other_account = service_for(&fx.path, 2).await;
    let foreign = other_account.enroll(&req(), "Zed", t(1)).await.unwrap();

    let err = fx.service.resolve_participant(&req(), Some(foreign.id)).await.unwrap_err();
    assert!(matches!(err, QuestError::InvalidInput(_)));

    let err = fx.service.resolve_participant(&req(), Some(9999)).await.unwrap_err();
    assert!(matches!(err, QuestError::InvalidInput(_)));

    let err = fx.service.resolve_participant(&req(), None).await.unwrap_err();
    assert!(matches!(err, QuestError::InvalidInput(_)));
}

#[tokio::test]
async fn anonymous_requests_are_rejected() {
    let dir = tempdir().unwrap();
    let store = QuestStore::open(DbLocation::Custom(dir.path().join("q.db"))).await.unwrap();
    let service = ProgressionService::new(Arc::new(store), StaticIdentity::anonymous(), QuestConfig::default());

    assert_eq!(service.leaderboard(&req(), 1, None).await.unwrap_err(), QuestError::Unauthenticated);
    assert_eq!(
        service.cycle_position(&req(), None, t(1)).await.unwrap_err(),
        QuestError::Unauthenticated
    );
}

#[tokio::test]
async fn cycle_position_uses_enrollment_date() {
    let fx = fixture().await;
    let enrolled = Utc.with_ymd_and_hms(2023, 11, 2, 19, 12, 24).unwrap();
    let p = fx.service.enroll(&req(), "Ada", enrolled).await.unwrap();

    let same_day = Utc.with_ymd_and_hms(2023, 11, 2, 23, 0, 0).unwrap();
    let pos = fx.service.cycle_position(&req(), Some(p.id), same_day).await.unwrap();
    assert_eq!((pos.programme_year, pos.week_of_programme_year, pos.month_of_programme_year), (1, 1, 1));

    let before = enrolled - Duration::days(1);
    let err = fx.service.cycle_position(&req(), Some(p.id), before).await.unwrap_err();
    assert!(matches!(err, QuestError::InvalidInput(_)));
}

#[tokio::test]
async fn leaderboard_ranks_ties_and_reports_missing() {
    let fx = fixture().await;
    let ada = fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    let ben = fx.service.enroll(&req(), "Ben", t(1)).await.unwrap();
    let cleo = fx.service.enroll(&req(), "Cleo", t(1)).await.unwrap();
    let dev = fx.service.enroll(&req(), "Dev", t(1)).await.unwrap();

    for (p, score) in [(ada.id, 30), (ben.id, 20), (ben.id, 10), (cleo.id, 25)] {
        fx.service.record_score(&req(), Some(p), 7, score, t(3)).await.unwrap();
    }
    // Other cohort must not leak in
    fx.service.record_score(&req(), Some(dev.id), 8, 500, t(3)).await.unwrap();

    let board = fx.service.leaderboard(&req(), 7, Some(10)).await.unwrap();
    let rows: Vec<(&str, i64, u32)> = board
        .iter()
        .map(|s| (s.display_name.as_str(), s.total_score, s.rank))
        .collect();
    assert_eq!(rows, vec![("Ada", 30, 1), ("Ben", 30, 1), ("Cleo", 25, 3)]);

    let top1 = fx.service.leaderboard(&req(), 7, Some(1)).await.unwrap();
    assert_eq!(top1.len(), 1);

    let cleo_rank = fx.service.rank_of(&req(), Some(cleo.id), 7).await.unwrap().unwrap();
    assert_eq!((cleo_rank.rank, cleo_rank.total_score), (3, 25));

    assert!(fx.service.rank_of(&req(), Some(dev.id), 7).await.unwrap().is_none());
}

#[tokio::test]
async fn leaderboard_rejects_bad_arguments() {
    let fx = fixture().await;
    assert!(matches!(
        fx.service.leaderboard(&req(), 0, None).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(matches!(
        fx.service.leaderboard(&req(), 3, Some(0)).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(fx.service.leaderboard(&req(), 3, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_badge_unlocks_and_stays_unlocked() {
    let fx = fixture().await;
    let p = fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();

    fx.service.record_activity(&req(), None, "search_count", 4, t(2)).await.unwrap();
    let report = fx
        .service
        .evaluate_completions(&req(), None, Some(ItemKind::Badge), t(2))
        .await
        .unwrap();
    assert!(!report.get("search_5").unwrap().satisfied());

    fx.service.record_activity(&req(), None, "search_count", 1, t(3)).await.unwrap();
    let report = fx
        .service
        .evaluate_completions(&req(), None, Some(ItemKind::Badge), t(3))
        .await
        .unwrap();
    assert_eq!(report.get("search_5").unwrap().status, CompletionStatus::NewlySatisfied);

    // Data correction drops the counter below the threshold
    fx.service.record_activity(&req(), None, "search_count", -3, t(4)).await.unwrap();
    let report = fx.service.evaluate_completions(&req(), None, None, t(4)).await.unwrap();
    assert_eq!(report.get("search_5").unwrap().status, CompletionStatus::AlreadyComplete);

    let progress = fx.service.progress_report(&req(), Some(p.id), t(4)).await.unwrap();
    let search = progress
        .completions
        .iter()
        .find(|r| r.item_id == "search_5")
        .unwrap();
    assert_eq!(search.completed_at, t(3));
}

#[tokio::test]
async fn badge_unlock_cascades_into_challenge() {
    let fx = fixture().await;
    fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    fx.service.record_activity(&req(), None, "topics_read", 2, t(2)).await.unwrap();

    let report = fx.service.evaluate_completions(&req(), None, None, t(2)).await.unwrap();
    let mut newly = report.newly_satisfied();
    newly.sort();
    assert_eq!(newly, vec!["first_badge", "reader_2"]);

    let again = fx.service.evaluate_completions(&req(), None, None, t(3)).await.unwrap();
    assert!(again.newly_satisfied().is_empty());
    assert_eq!(again.satisfied().count(), 2);
}

#[tokio::test]
async fn unknown_counter_fails_one_item_only() {
    let fx = fixture().await;
    let p = fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    fx.service.record_activity(&req(), None, "search_count", 5, t(2)).await.unwrap();

    // Written behind the importer's back, as an external authoring tool might
    let typo = CompletableItem::new("typo", ItemKind::Badge, "Typo", Condition::at_least("serch_count", 1));
    let store = QuestStore::open(DbLocation::Custom(fx.path.clone())).await.unwrap();
    store.execute(move |conn| catalog::upsert_item(conn, &typo)).await.unwrap();

    let report = fx.service.evaluate_completions(&req(), Some(p.id), None, t(2)).await.unwrap();
    assert!(matches!(report.get("typo").unwrap().status, CompletionStatus::Failed(_)));
    assert_eq!(report.get("search_5").unwrap().status, CompletionStatus::NewlySatisfied);
}

#[tokio::test]
async fn import_rejects_unknown_counters() {
    let fx = fixture().await;
    let bad = CatalogFile::parse(
        r#"
        [[item]]
        id = "ghost"
        kind = "badge"
        title = "Ghost"
        condition = "ghosts_seen >= 1"
        "#,
    )
    .unwrap();
    assert!(matches!(
        fx.service.import_catalog(bad).await,
        Err(QuestError::InvalidCondition(_))
    ));
    assert_eq!(fx.service.catalog().await.unwrap().len(), 3);
}

#[tokio::test]
async fn undeclared_activity_is_invalid_input() {
    let fx = fixture().await;
    fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    assert!(matches!(
        fx.service.record_activity(&req(), None, "dragons", 1, t(2)).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(matches!(
        fx.service.record_activity(&req(), None, "search_count", 0, t(2)).await,
        Err(QuestError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn out_of_range_values_are_rejected_at_record_time() {
    let fx = fixture().await;
    fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();

    assert!(matches!(
        fx.service.record_score(&req(), None, 7, i64::MAX, t(2)).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(matches!(
        fx.service.record_activity(&req(), None, "search_count", i64::MIN, t(2)).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(fx.service.leaderboard(&req(), 7, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn overflowing_stored_totals_are_errors_not_panics() {
    let fx = fixture().await;
    let p = fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();

    // Rows written directly, bypassing the service bounds
    let pid = p.id;
    let store = QuestStore::open(DbLocation::Custom(fx.path.clone())).await.unwrap();
    store
        .execute(move |conn| {
            for _ in 0..2 {
                scores::append_score(conn, &ScoreEvent::new(pid, 7, i64::MAX).at(t(2)))?;
                let mut event = ActivityEvent::new(pid, "search_count", i64::MAX);
                event.recorded_at = t(2);
                activity::append_activity(conn, &event)?;
            }
            Ok(())
        })
        .await
        .unwrap();

    assert!(matches!(
        fx.service.leaderboard(&req(), 7, None).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(matches!(
        fx.service.rank_of(&req(), None, 7).await,
        Err(QuestError::InvalidInput(_))
    ));
    assert!(matches!(
        fx.service.evaluate_completions(&req(), None, None, t(3)).await,
        Err(QuestError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn duplicate_completion_write_is_a_no_op() {
    let fx = fixture().await;
    let p = fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    let store = QuestStore::open(DbLocation::Custom(fx.path.clone())).await.unwrap();

    let pid = p.id;
    let (first, second) = store
        .execute(move |conn| {
            let a = completions::record_completion(conn, pid, "search_5", t(2))?;
            let b = completions::record_completion(conn, pid, "search_5", t(3))?;
            Ok((a, b))
        })
        .await
        .unwrap();
    assert!(first);
    assert!(!second);

    let records = store
        .execute(move |conn| completions::completions_for(conn, pid))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].completed_at, t(2));
}

#[tokio::test]
async fn concurrent_evaluations_record_once() {
    let fx = fixture().await;
    fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    fx.service.record_activity(&req(), None, "search_count", 9, t(2)).await.unwrap();

    // Separate connections to the same file
    let a = service_for(&fx.path, 1).await;
    let b = service_for(&fx.path, 1).await;
    let (req_a, req_b) = (req(), req());
    let (ra, rb) = tokio::join!(
        a.evaluate_completions(&req_a, None, Some(ItemKind::Badge), t(2)),
        b.evaluate_completions(&req_b, None, Some(ItemKind::Badge), t(2)),
    );
    assert!(ra.unwrap().get("search_5").unwrap().satisfied());
    assert!(rb.unwrap().get("search_5").unwrap().satisfied());

    let progress = fx.service.progress_report(&req(), None, t(2)).await.unwrap();
    let count = progress
        .completions
        .iter()
        .filter(|r| r.item_id == "search_5")
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn score_events_are_append_only() {
    let fx = fixture().await;
    fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    fx.service.record_score(&req(), None, 7, 10, t(2)).await.unwrap();

    let store = QuestStore::open(DbLocation::Custom(fx.path.clone())).await.unwrap();
    let update = store
        .execute(|conn| Ok(conn.execute("UPDATE score_events SET score = 99", [])?))
        .await;
    assert!(update.is_err());
    let delete = store
        .execute(|conn| Ok(conn.execute("DELETE FROM score_events", [])?))
        .await;
    assert!(delete.is_err());

    fx.service.record_activity(&req(), None, "search_count", 5, t(3)).await.unwrap();
    fx.service.evaluate_completions(&req(), None, None, t(3)).await.unwrap();
    let rewrite = store
        .execute(|conn| Ok(conn.execute("UPDATE completion_records SET completed_at = completed_at", [])?))
        .await;
    assert!(rewrite.is_err());
}

#[tokio::test]
async fn progress_report_tracks_streaks() {
    let fx = fixture().await;
    fx.service.enroll(&req(), "Ada", t(1)).await.unwrap();
    fx.service.record_score(&req(), None, 7, 5, t(2)).await.unwrap();
    fx.service.record_activity(&req(), None, "news_read", 1, t(3)).await.unwrap();
    fx.service.record_score(&req(), None, 7, 5, t(4)).await.unwrap();
    fx.service.record_score(&req(), None, 7, 5, t(6)).await.unwrap();

    let progress = fx.service.progress_report(&req(), None, t(7)).await.unwrap();
    assert_eq!(progress.streak.active_days, 4);
    assert_eq!(progress.streak.best_streak, 3);
    assert_eq!(progress.streak.current_streak, 1);
    assert_eq!(progress.cycle.total_weeks, 1);
}
