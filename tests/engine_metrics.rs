mod common;

use std::collections::HashSet;

use metrics_util::debugging::DebuggingRecorder;

use murmur::cache::FeedIdentity;
use murmur::domain::types::{TweetId, UserId};

#[tokio::test]
async fn engine_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let world = common::world();
    let engine = common::engine_for(&world, "ada", 2);
    let session = common::ada();

    // Fetch + optimistic like
    let all = engine.subscribe(FeedIdentity::all());
    engine
        .fetch_more(&session, all.handle())
        .await
        .expect("page should load");
    engine
        .toggle_like(&session, &TweetId::from("t3"))
        .await
        .expect("like should succeed");

    // Reconcile: liked elsewhere before the local toggle
    world
        .toggle_like(&UserId::from("ada"), &TweetId::from("t2"))
        .await
        .expect("out-of-band like");
    engine
        .toggle_like(&session, &TweetId::from("t2"))
        .await
        .expect("toggle should succeed");

    // Revert
    world.set_offline(true);
    let _ = engine.toggle_like(&session, &TweetId::from("t3")).await;
    world.set_offline(false);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "murmur_fetch_page_ms",
        "murmur_patch_applied_total",
        "murmur_mutation_reconciled_total",
        "murmur_mutation_reverted_total",
        "murmur_live_views",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
