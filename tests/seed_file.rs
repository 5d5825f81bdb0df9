mod common;

use std::io::Write;
use std::sync::Arc;

use murmur::application::engine::FeedEngine;
use murmur::application::session::Session;
use murmur::cache::{CacheConfig, FeedIdentity};
use murmur::infra::error::InfraError;
use murmur::infra::memory::{InMemoryBackend, SeedData};

#[tokio::test]
async fn seed_file_loads_into_a_browsable_world() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(common::SEED.as_bytes()).expect("write seed");

    let seed = SeedData::load(file.path()).await.expect("seed should load");
    assert_eq!(seed.users.len(), 5);
    assert_eq!(seed.tweets.len(), 3);

    let world = Arc::new(InMemoryBackend::from_seed(seed).expect("seed should apply"));
    let engine = FeedEngine::new(Arc::new(world.client(None)), &CacheConfig::default());
    let view = engine.subscribe(FeedIdentity::profile("grace"));
    engine
        .fetch_more(&Session::anonymous(), view.handle())
        .await
        .expect("page should load");
    assert_eq!(view.projection().len(), 2);
}

#[tokio::test]
async fn missing_seed_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = SeedData::load(&dir.path().join("absent.toml"))
        .await
        .expect_err("missing file");
    assert!(matches!(err, InfraError::Io(_)));
}

#[test]
fn seed_with_unknown_author_is_rejected() {
    let seed = SeedData::from_toml(
        r#"
        [[tweets]]
        id = "t1"
        author = "ghost"
        content = "boo"
        created_at = "2026-01-01T00:00:00Z"
        "#,
    )
    .expect("seed should parse");
    assert!(InMemoryBackend::from_seed(seed).is_err());

    let err = SeedData::from_toml("users = 3").expect_err("bad shape");
    assert!(matches!(err, InfraError::Configuration { .. }));
}

#[test]
fn demo_world_is_consistent() {
    assert!(InMemoryBackend::from_seed(SeedData::demo()).is_ok());
}
