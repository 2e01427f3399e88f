mod common;

use chrono::{Duration, TimeZone, Utc};

use common::{Failure, FakeCalendar, FakeCredential, Op, parse_instant, reconciler};
use matchcal_core::{BatchState, EventCandidate, MatchCalError, ReconcileOptions, RemoteEvent};

fn fixture(title: &str, start: &str) -> EventCandidate {
    EventCandidate::new(title, start)
}

fn existing(id: &str, summary: &str, day: u32, hour: u32) -> RemoteEvent {
    let start = Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap();
    RemoteEvent::new(id, summary, start, start + Duration::hours(2))
}

#[tokio::test]
async fn empty_batch_makes_no_remote_calls() {
    let calendar = FakeCalendar::empty();
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler.reconcile(Vec::new()).await.unwrap();

    assert_eq!(result.inserted, 0);
    assert_eq!(result.deleted, 0);
    assert!(result.errors.is_empty());
    assert!(calendar.calls().is_empty());
    assert_eq!(reconciler.state(), BatchState::Done);
}

#[tokio::test]
async fn missing_credential_stops_before_any_call() {
    let calendar = FakeCalendar::empty();
    let reconciler = reconciler(
        calendar.clone(),
        FakeCredential::unconfigured(),
        ReconcileOptions::default(),
    );

    let err = reconciler
        .reconcile(vec![fixture("A vs B", "2024-09-21T18:30")])
        .await
        .unwrap_err();

    assert!(matches!(err, MatchCalError::ConfigurationMissing(_)));
    assert!(calendar.calls().is_empty());
    assert_eq!(reconciler.state(), BatchState::Aborted);
}

#[tokio::test]
async fn empty_window_inserts_everything() {
    let calendar = FakeCalendar::empty();
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![
            fixture("A vs B", "2024-09-20T19:15"),
            fixture("C vs D", "2024-09-21T18:30"),
            fixture("E vs F", "2024-09-22T15:00"),
        ])
        .await
        .unwrap();

    assert_eq!(result.inserted, 3);
    assert_eq!(result.deleted, 0);
    assert!(result.errors.is_empty());
    assert_eq!(calendar.calls().iter().filter(|op| **op == Op::List).count(), 1);
}

#[tokio::test]
async fn matching_events_are_replaced() {
    let calendar = FakeCalendar::with_events(vec![
        existing("old-1", "Team A vs Team B", 20, 10),
        existing("old-2", "Team C vs Team D", 20, 17),
        existing("old-3", "Team A vs Team B", 27, 17),
    ]);
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![fixture("team a vs. team b", "2024-09-20T19:15")])
        .await
        .unwrap();

    assert_eq!(result.deleted, 1);
    assert_eq!(result.inserted, 1);
    assert_eq!(calendar.deleted(), vec!["old-1"]);

    let remaining: Vec<_> = calendar.events().into_iter().map(|e| e.id).collect();
    assert_eq!(remaining, vec!["old-2", "old-3", "new-1"]);
}

#[tokio::test]
async fn running_twice_leaves_one_event_per_fixture() {
    let calendar = FakeCalendar::empty();
    let batch = || {
        vec![
            fixture("A vs B", "2024-09-20T19:15"),
            fixture("C vs D", "2024-09-21T18:30"),
        ]
    };

    let first = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());
    first.reconcile(batch()).await.unwrap();

    let second = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());
    let result = second.reconcile(batch()).await.unwrap();

    assert_eq!(result.deleted, 2);
    assert_eq!(result.inserted, 2);
    assert_eq!(calendar.events().len(), 2);
}

#[tokio::test]
async fn malformed_candidates_are_dropped_in_order() {
    let calendar = FakeCalendar::empty();
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![
            fixture("A vs B", "next saturday"),
            fixture("C vs D", "2024-09-21T18:30"),
            fixture("", "2024-09-22T18:30"),
        ])
        .await
        .unwrap();

    assert_eq!(result.inserted, 1);
    let titles: Vec<_> = result.errors.iter().map(|e| e.candidate_title.as_str()).collect();
    assert_eq!(titles, vec!["A vs B", ""]);
    assert!(result.errors[0].message.contains("next saturday"));
}

#[tokio::test]
async fn all_malformed_batch_makes_no_remote_calls() {
    let calendar = FakeCalendar::empty();
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![fixture("A vs B", "soon")])
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(calendar.calls().is_empty());
}

#[tokio::test]
async fn failed_listing_aborts_the_batch() {
    let calendar = FakeCalendar::empty();
    calendar.fail(Op::List, Failure::Transport, 1);
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let err = reconciler
        .reconcile(vec![fixture("A vs B", "2024-09-21T18:30")])
        .await
        .unwrap_err();

    assert!(matches!(err, MatchCalError::Fetch(_)), "got {err:?}");
    assert!(calendar.inserted().is_empty());
    assert_eq!(reconciler.state(), BatchState::Aborted);
}

#[tokio::test]
async fn rate_limit_recovered_by_retry_records_no_error() {
    let calendar = FakeCalendar::empty();
    calendar.fail(Op::Insert, Failure::RateLimit, 1);
    let credential = FakeCredential::valid();
    let reconciler = reconciler(calendar.clone(), credential.clone(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![fixture("A vs B", "2024-09-21T18:30")])
        .await
        .unwrap();

    assert_eq!(result.inserted, 1);
    assert!(result.errors.is_empty());
    assert_eq!(credential.refreshes(), 1);
    assert_eq!(calendar.tokens().last().map(String::as_str), Some("token-1"));
}

#[tokio::test]
async fn repeated_rate_limit_is_one_error_and_the_batch_continues() {
    let calendar = FakeCalendar::empty();
    calendar.fail_for(Op::Insert, Some("A vs B"), Failure::RateLimit, 2);
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![
            fixture("A vs B", "2024-09-21T18:30"),
            fixture("C vs D", "2024-09-22T18:30"),
        ])
        .await
        .unwrap();

    assert_eq!(result.inserted, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].candidate_title, "A vs B");
    assert_eq!(calendar.inserted()[0].summary, "C vs D");
}

#[tokio::test]
async fn failed_delete_does_not_block_insert() {
    let calendar = FakeCalendar::with_events(vec![existing("old-1", "A vs B", 21, 10)]);
    calendar.fail(Op::Delete, Failure::Transport, 1);
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![fixture("A vs B", "2024-09-21T18:30")])
        .await
        .unwrap();

    assert_eq!(result.deleted, 0);
    assert_eq!(result.inserted, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("old-1"));
}

#[tokio::test]
async fn unrecoverable_auth_is_recorded_per_candidate() {
    let calendar = FakeCalendar::empty();
    calendar.fail_for(Op::Insert, Some("A vs B"), Failure::AuthExpired, 1);
    let reconciler = reconciler(
        calendar.clone(),
        FakeCredential::unrefreshable(),
        ReconcileOptions::default(),
    );

    let result = reconciler
        .reconcile(vec![
            fixture("A vs B", "2024-09-21T18:30"),
            fixture("C vs D", "2024-09-22T18:30"),
        ])
        .await
        .unwrap();

    assert_eq!(result.inserted, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("Authorization expired"));
}

#[tokio::test]
async fn missing_end_is_start_plus_ninety_minutes() {
    let calendar = FakeCalendar::empty();
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), ReconcileOptions::default());

    reconciler
        .reconcile(vec![fixture("A vs B", "2024-09-21T18:30")])
        .await
        .unwrap();

    let body = &calendar.inserted()[0];
    assert_eq!(body.start.date_time, "2024-09-21T18:30:00+02:00");
    assert_eq!(body.end.date_time, "2024-09-21T20:00:00+02:00");
    assert_eq!(
        parse_instant(&body.end.date_time) - parse_instant(&body.start.date_time),
        Duration::minutes(90)
    );
}

#[tokio::test]
async fn proactive_refresh_follows_insert_count() {
    let calendar = FakeCalendar::empty();
    let credential = FakeCredential::valid();
    let reconciler = reconciler(calendar.clone(), credential.clone(), ReconcileOptions::default());

    let batch = (1..=7)
        .map(|day| fixture(&format!("Team {day} vs Team X"), &format!("2024-10-0{day}T18:00")))
        .collect();
    let result = reconciler.reconcile(batch).await.unwrap();

    assert_eq!(result.inserted, 7);
    assert_eq!(credential.refreshes(), 2);
    assert_eq!(reconciler.state(), BatchState::Done);
}

#[tokio::test]
async fn proactive_refresh_follows_delete_count() {
    let stale = (0..11)
        .map(|hour| existing(&format!("old-{hour}"), "A vs B", 21, hour))
        .collect();
    let calendar = FakeCalendar::with_events(stale);
    let credential = FakeCredential::valid();
    let reconciler = reconciler(calendar.clone(), credential.clone(), ReconcileOptions::default());

    let result = reconciler
        .reconcile(vec![fixture("A vs B", "2024-09-21T18:30")])
        .await
        .unwrap();

    assert_eq!(result.deleted, 11);
    assert_eq!(result.inserted, 1);
    assert!(result.errors.is_empty());
    // The eleventh delete starts on a refreshed token; one insert never does.
    assert_eq!(credential.refreshes(), 1);
}

#[tokio::test]
async fn concurrent_duplicates_delete_each_match_once() {
    let calendar = FakeCalendar::with_events(vec![existing("old-1", "A vs B", 21, 10)]);
    let options = ReconcileOptions {
        concurrency: 4,
        ..ReconcileOptions::default()
    };
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), options);

    let result = reconciler
        .reconcile(vec![
            fixture("A vs B", "2024-09-21T18:30"),
            fixture("a vs. b", "2024-09-21T20:30"),
            fixture("C vs D", "2024-09-22T18:30"),
        ])
        .await
        .unwrap();

    assert_eq!(result.deleted, 1);
    assert_eq!(result.inserted, 3);
    assert!(result.errors.is_empty());
    assert_eq!(calendar.deleted(), vec!["old-1"]);
}

#[tokio::test]
async fn concurrent_batch_reports_errors_in_input_order() {
    let calendar = FakeCalendar::empty();
    calendar.fail_for(Op::Insert, Some("C vs D"), Failure::Transport, 1);
    calendar.fail_for(Op::Insert, Some("A vs B"), Failure::Transport, 1);
    let options = ReconcileOptions {
        concurrency: 3,
        ..ReconcileOptions::default()
    };
    let reconciler = reconciler(calendar.clone(), FakeCredential::valid(), options);

    let result = reconciler
        .reconcile(vec![
            fixture("A vs B", "2024-09-21T18:30"),
            fixture("B vs C", "bogus"),
            fixture("C vs D", "2024-09-22T18:30"),
        ])
        .await
        .unwrap();

    let titles: Vec<_> = result.errors.iter().map(|e| e.candidate_title.as_str()).collect();
    assert_eq!(titles, vec!["A vs B", "B vs C", "C vs D"]);
}
