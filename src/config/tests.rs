use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert!(settings.backend.base_url.is_none());
    assert_eq!(settings.backend.request_timeout, Duration::from_secs(10));
    assert_eq!(settings.feed.page_size.get(), DEFAULT_PAGE_SIZE);
    assert_eq!(settings.feed.tweet_limit.get(), DEFAULT_TWEET_LIMIT);
    assert_eq!(settings.dev_server.listen_addr.port(), DEFAULT_LISTEN_PORT);
    assert!(settings.session.viewer_id.is_none());
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.feed.page_size = Some(20);
    raw.session.viewer_id = Some("file-user".to_string());
    raw.logging.level = Some("info".to_string());

    raw.apply_client_overrides(&ClientOverrides {
        page_size: Some(5),
        viewer: Some("u1".to_string()),
        ..Default::default()
    });
    raw.apply_logging_overrides(&LoggingOverrides {
        log_level: Some("debug".to_string()),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.feed.page_size.get(), 5);
    assert_eq!(settings.session.viewer_id.as_deref(), Some("u1"));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.feed.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero page size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "feed.page_size",
            ..
        }
    ));
}

#[test]
fn backend_url_must_be_http() {
    let mut raw = RawSettings::default();
    raw.backend.base_url = Some("ftp://example.com".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.backend.base_url = Some("http://127.0.0.1:3400".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.backend.base_url.map(|url| url.to_string()),
        Some("http://127.0.0.1:3400/".to_string())
    );
}

#[test]
fn blank_viewer_means_anonymous() {
    let mut raw = RawSettings::default();
    raw.session.viewer_id = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.session.viewer_id.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_logging_overrides(&LoggingOverrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn serve_overrides_listen_address() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeArgs {
        listen: Some("0.0.0.0:9000".parse().expect("addr")),
        seed_file: Some(PathBuf::from("seed.toml")),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.dev_server.listen_addr.to_string(), "0.0.0.0:9000");
    assert_eq!(
        settings.dev_server.seed_file,
        Some(PathBuf::from("seed.toml"))
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["murmur"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_feed_command() {
    let args = CliArgs::parse_from([
        "murmur",
        "feed",
        "--scope",
        "profile",
        "--user",
        "u2",
        "--pages",
        "3",
        "--viewer",
        "u1",
        "--log-level",
        "warn",
    ]);

    assert_eq!(args.logging.log_level.as_deref(), Some("warn"));
    match args.command.expect("feed command") {
        Command::Feed(feed) => {
            assert_eq!(feed.scope, ScopeArg::Profile);
            assert_eq!(feed.user.as_deref(), Some("u2"));
            assert_eq!(feed.pages, 3);
            assert_eq!(feed.client.viewer.as_deref(), Some("u1"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_post_command() {
    let args = CliArgs::parse_from([
        "murmur",
        "post",
        "--backend-url",
        "http://localhost:3400",
        "hello world",
    ]);

    match args.command.expect("post command") {
        Command::Post(post) => {
            assert_eq!(post.content, "hello world");
            assert_eq!(
                post.client.backend_url.as_deref(),
                Some("http://localhost:3400")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
