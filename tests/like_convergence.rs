//! Generated LIKE_TOGGLE sequences against scripted server answers.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use murmur::application::backend::{BackendError, LikeOutcome};
use murmur::application::engine::FeedEngine;
use murmur::application::pagination::Page;
use murmur::cache::FeedIdentity;
use murmur::domain::types::TweetId;

use common::ScriptedBackend;

#[derive(Debug, Clone, Copy)]
enum Answer {
    Added(bool),
    Failed,
}

impl Answer {
    fn reply(self) -> Result<LikeOutcome, BackendError> {
        match self {
            Answer::Added(added_like) => Ok(LikeOutcome { added_like }),
            Answer::Failed => Err(BackendError::Unavailable("offline".to_string())),
        }
    }
}

fn answer() -> impl Strategy<Value = Answer> {
    prop_oneof![
        3 => any::<bool>().prop_map(Answer::Added),
        1 => Just(Answer::Failed),
    ]
}

/// Expected copy after one answer: the authoritative delta on top of the
/// pre-mutation state, or the pre-mutation state itself on failure.
fn settle(state: (u64, bool), answer: Answer) -> (u64, bool) {
    match answer {
        Answer::Added(added) => {
            let delta = if added { 1 } else { -1 };
            (state.0.saturating_add_signed(delta), added)
        }
        Answer::Failed => state,
    }
}

/// Toggle t1 once per answer while two views hold their own copy of it;
/// returns both copies after every step.
fn drive(first: (u64, bool), second: (u64, bool), answers: &[Answer]) -> Vec<[(u64, bool); 2]> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let backend = Arc::new(ScriptedBackend::with_pages(vec![
            Ok(Page::new(vec![common::tweet("t1", first.0, first.1)], None)),
            Ok(Page::new(vec![common::tweet("t1", second.0, second.1)], None)),
        ]));
        let engine = FeedEngine::new(backend.clone(), &common::config(10));
        let session = common::ada();
        let views = [
            engine.subscribe(FeedIdentity::all()),
            engine.subscribe(FeedIdentity::profile("grace")),
        ];
        for view in &views {
            engine
                .fetch_more(&session, view.handle())
                .await
                .expect("page should load");
        }

        let t1 = TweetId::from("t1");
        let mut trace = Vec::with_capacity(answers.len());
        for answer in answers {
            backend.likes.lock().await.push_back(answer.reply());
            let result = engine.toggle_like(&session, &t1).await;
            assert_eq!(result.is_ok(), !matches!(answer, Answer::Failed));
            trace.push(views.each_ref().map(|view| {
                let projection = view.projection();
                let tweet = projection.get(&t1).expect("t1 stays loaded");
                (tweet.like_count, tweet.liked_by_viewer)
            }));
        }
        trace
    })
}

proptest! {
    #[test]
    fn every_view_settles_on_the_server_answer(
        first in (0u64..4, any::<bool>()),
        second in (0u64..4, any::<bool>()),
        answers in prop::collection::vec(answer(), 1..16),
    ) {
        let trace = drive(first, second, &answers);

        let mut expected = [first, second];
        for (step, (answer, observed)) in answers.iter().zip(&trace).enumerate() {
            expected = expected.map(|state| settle(state, *answer));
            prop_assert_eq!(*observed, expected, "step {} answered {:?}", step, answer);
            for (count, _) in observed {
                // A wrapped subtraction would show up as a huge count.
                prop_assert!(*count <= 4 + answers.len() as u64);
            }
        }
    }

    #[test]
    fn a_consistent_server_is_matched_exactly(
        start in (0u64..4, any::<bool>()),
        failures in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        // The server flips its state on every delivered toggle.
        let mut server = start;
        let mut answers = Vec::with_capacity(failures.len());
        let mut truth = Vec::with_capacity(failures.len());
        for failed in failures {
            if failed {
                answers.push(Answer::Failed);
            } else {
                server = settle(server, Answer::Added(!server.1));
                answers.push(Answer::Added(server.1));
            }
            truth.push(server);
        }

        let trace = drive(start, start, &answers);
        for (observed, server) in trace.iter().zip(&truth) {
            prop_assert_eq!(*observed, [*server, *server]);
        }
    }
}
