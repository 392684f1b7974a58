//! Migration and incremental replication against a real on-disk registry and
//! a recording transport.

mod common;

use std::collections::HashMap;

use common::{channel, pin, sender, FakePins, Harness, GUILD, WEBHOOK};
use pins_core::{ChannelId, ChannelInfo, ChannelKind, GuildId, GuildRegistry, MessageId};
use pins_sync::{IgnoreReason, IncrementalOutcome, ReplicateError};

fn pins_in(entries: Vec<(u64, Vec<pins_core::SourceMessage>)>) -> FakePins {
    FakePins {
        pins: entries
            .into_iter()
            .map(|(id, msgs)| (ChannelId(id), msgs))
            .collect::<HashMap<_, _>>(),
        ..FakePins::default()
    }
}

// ---------------------------------------------------------------------------
// 1. Migrate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn migrate_orders_pins_across_channels_by_timestamp() {
    let h = Harness::configured();
    let pins = pins_in(vec![
        (1, vec![pin(3, 1, 300), pin(1, 1, 100)]),
        (2, vec![pin(2, 2, 200)]),
    ]);

    let report = h
        .replicator
        .migrate(GUILD, &[channel(1, false), channel(2, false)], &pins, &sender())
        .await
        .expect("migrate");

    assert_eq!(report.delivered, 3);
    assert_eq!(h.transport.delivered_ids(), vec![1, 2, 3]);
    assert_eq!(h.committed_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn migrate_twice_delivers_nothing_the_second_time() {
    let h = Harness::configured();
    let pins = pins_in(vec![(1, vec![pin(1, 1, 100), pin(2, 1, 200)])]);
    let channels = [channel(1, false)];

    h.replicator
        .migrate(GUILD, &channels, &pins, &sender())
        .await
        .expect("first");
    let before = std::fs::read_to_string(
        pins_core::registry::guild_path_at(h.home.path(), GUILD),
    )
    .expect("read");

    let report = h
        .replicator
        .migrate(GUILD, &channels, &pins, &sender())
        .await
        .expect("second");

    assert_eq!(report.delivered, 0);
    assert_eq!(h.transport.delivered_ids(), vec![1, 2]);
    let after = std::fs::read_to_string(
        pins_core::registry::guild_path_at(h.home.path(), GUILD),
    )
    .expect("read");
    assert_eq!(before, after, "state must be unchanged");
}

#[tokio::test]
async fn migrate_skips_nsfw_channels_unless_opted_in() {
    let h = Harness::configured();
    let pins = pins_in(vec![
        (1, vec![pin(1, 1, 100)]),
        (2, vec![pin(2, 2, 200)]),
    ]);
    let channels = [channel(1, false), channel(2, true)];

    h.replicator
        .migrate(GUILD, &channels, &pins, &sender())
        .await
        .expect("migrate");
    assert_eq!(h.transport.delivered_ids(), vec![1]);
    assert_eq!(*pins.asked.lock().unwrap(), vec![ChannelId(1)]);

    h.registry.set_include_nsfw(GUILD, true).expect("configure");
    h.replicator
        .migrate(GUILD, &channels, &pins, &sender())
        .await
        .expect("migrate");
    assert_eq!(h.transport.delivered_ids(), vec![1, 2]);
}

#[tokio::test]
async fn migrate_ignores_non_text_and_foreign_channels() {
    let h = Harness::configured();
    let voice = ChannelInfo {
        kind: ChannelKind::Voice,
        ..channel(2, false)
    };
    let foreign = ChannelInfo {
        guild_id: GuildId(999),
        ..channel(3, false)
    };
    let pins = pins_in(vec![
        (1, vec![pin(1, 1, 100)]),
        (2, vec![pin(2, 2, 200)]),
        (3, vec![pin(3, 3, 300)]),
    ]);

    let plan = h
        .replicator
        .plan_migration(GUILD, &[channel(1, false), voice, foreign], &pins)
        .await
        .expect("plan");
    assert_eq!(plan.channel_count(), 1);
    assert_eq!(plan.message_count(), 1);
}

#[tokio::test]
async fn migrate_without_config_is_not_configured() {
    let h = Harness::empty();
    let err = h
        .replicator
        .migrate(GUILD, &[channel(1, false)], &FakePins::default(), &sender())
        .await
        .unwrap_err();
    assert!(matches!(err, ReplicateError::NotConfigured { .. }), "got: {err}");
}

#[tokio::test]
async fn migrate_without_endpoint_is_unavailable() {
    let h = Harness::configured();
    h.directory.unregister(WEBHOOK);
    let err = h
        .replicator
        .migrate(GUILD, &[channel(1, false)], &FakePins::default(), &sender())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ReplicateError::EndpointUnavailable { .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn delivery_failure_stops_run_commits_prefix_and_retry_resumes() {
    let h = Harness::configured();
    let pins = pins_in(vec![(
        1,
        vec![pin(1, 1, 100), pin(2, 1, 200), pin(3, 1, 300), pin(4, 1, 400)],
    )]);
    let channels = [channel(1, false)];

    h.transport.fail_after(2);
    let err = h
        .replicator
        .migrate(GUILD, &channels, &pins, &sender())
        .await
        .unwrap_err();
    match err {
        ReplicateError::Delivery { message, .. } => assert_eq!(message, MessageId(3)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.transport.delivered_ids(), vec![1, 2]);
    assert_eq!(h.committed_ids(), vec![1, 2]);

    h.transport.heal();
    let report = h
        .replicator
        .migrate(GUILD, &channels, &pins, &sender())
        .await
        .expect("retry");
    assert_eq!(report.delivered, 2);
    assert_eq!(h.transport.delivered_ids(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn vanished_webhook_is_marked_unresolved() {
    let h = Harness::configured();
    let pins = pins_in(vec![(1, vec![pin(1, 1, 100)])]);
    *h.transport.endpoint_gone.lock().unwrap() = true;
    h.transport.fail_after(0);

    let err = h
        .replicator
        .migrate(GUILD, &[channel(1, false)], &pins, &sender())
        .await
        .unwrap_err();
    assert!(matches!(err, ReplicateError::Delivery { .. }));
    assert!(h.directory.resolve(WEBHOOK).is_none());
}

// ---------------------------------------------------------------------------
// 2. Incremental
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incremental_delivers_new_pins_oldest_first() {
    let h = Harness::configured();
    // Discord lists pins newest first.
    let changed = vec![pin(3, 1, 300), pin(2, 1, 200), pin(1, 1, 100)];

    let outcome = h
        .replicator
        .on_pins_changed(GUILD, &channel(1, false), changed, &sender())
        .await
        .expect("incremental");

    assert!(matches!(
        outcome,
        IncrementalOutcome::Replicated(report) if report.delivered == 3
    ));
    assert_eq!(h.transport.delivered_ids(), vec![1, 2, 3]);
    assert_eq!(h.committed_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn incremental_only_sends_the_newly_pinned_message() {
    let h = Harness::configured();
    h.replicator
        .on_pins_changed(GUILD, &channel(1, false), vec![pin(1, 1, 100)], &sender())
        .await
        .expect("first");

    h.replicator
        .on_pins_changed(
            GUILD,
            &channel(1, false),
            vec![pin(2, 1, 200), pin(1, 1, 100)],
            &sender(),
        )
        .await
        .expect("second");

    assert_eq!(h.transport.delivered_ids(), vec![1, 2]);
}

#[tokio::test]
async fn incremental_respects_nsfw_flag() {
    let h = Harness::configured();
    let outcome = h
        .replicator
        .on_pins_changed(GUILD, &channel(7, true), vec![pin(1, 7, 100)], &sender())
        .await
        .expect("incremental");
    assert_eq!(
        outcome,
        IncrementalOutcome::Ignored(IgnoreReason::IneligibleChannel)
    );
    assert!(h.transport.delivered_ids().is_empty());

    h.registry.set_include_nsfw(GUILD, true).expect("configure");
    h.replicator
        .on_pins_changed(GUILD, &channel(7, true), vec![pin(1, 7, 100)], &sender())
        .await
        .expect("incremental");
    assert_eq!(h.transport.delivered_ids(), vec![1]);
}

#[tokio::test]
async fn incremental_is_silent_for_unconfigured_guild_and_missing_endpoint() {
    let h = Harness::empty();
    let outcome = h
        .replicator
        .on_pins_changed(GUILD, &channel(1, false), vec![pin(1, 1, 100)], &sender())
        .await
        .expect("ignored");
    assert_eq!(outcome, IncrementalOutcome::Ignored(IgnoreReason::NotConfigured));

    let h = Harness::configured();
    h.directory.unregister(WEBHOOK);
    let outcome = h
        .replicator
        .on_pins_changed(GUILD, &channel(1, false), vec![pin(1, 1, 100)], &sender())
        .await
        .expect("ignored");
    assert_eq!(
        outcome,
        IncrementalOutcome::Ignored(IgnoreReason::EndpointUnavailable)
    );
    assert!(h.transport.delivered_ids().is_empty());
}

#[tokio::test]
async fn incremental_ignores_channel_from_another_guild() {
    let h = Harness::configured();
    let foreign = ChannelInfo {
        guild_id: GuildId(2),
        ..channel(1, false)
    };
    let outcome = h
        .replicator
        .on_pins_changed(GUILD, &foreign, vec![pin(1, 1, 100)], &sender())
        .await
        .expect("ignored");
    assert_eq!(outcome, IncrementalOutcome::Ignored(IgnoreReason::ForeignChannel));
}

// ---------------------------------------------------------------------------
// 3. Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_triggers_for_one_guild_deliver_each_pin_once() {
    let h = Harness::configured();
    let changed = vec![pin(3, 1, 300), pin(2, 1, 200), pin(1, 1, 100)];

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let replicator = h.replicator.clone();
        let changed = changed.clone();
        tasks.push(tokio::spawn(async move {
            replicator
                .on_pins_changed(GUILD, &channel(1, false), changed, &sender())
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("incremental");
    }

    assert_eq!(h.transport.delivered_ids(), vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn event_during_migration_waits_for_the_plan() {
    let h = Harness::configured();
    let pins = pins_in(vec![(1, vec![pin(1, 1, 100), pin(2, 1, 200)])]);

    let plan = h
        .replicator
        .plan_migration(GUILD, &[channel(1, false)], &pins)
        .await
        .expect("plan");

    let event = {
        let replicator = h.replicator.clone();
        tokio::spawn(async move {
            replicator
                .on_pins_changed(
                    GUILD,
                    &channel(1, false),
                    vec![pin(2, 1, 200), pin(1, 1, 100)],
                    &sender(),
                )
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!event.is_finished(), "event must wait for the migration lock");

    h.replicator.execute(plan, &sender()).await.expect("execute");
    let outcome = event.await.expect("join").expect("incremental");

    assert!(matches!(
        outcome,
        IncrementalOutcome::Replicated(report) if report.delivered == 0
    ));
    assert_eq!(h.transport.delivered_ids(), vec![1, 2]);
}
