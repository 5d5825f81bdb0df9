use std::{process, sync::Arc};

use murmur::{
    application::{
        backend::FeedBackend,
        engine::{FeedEngine, FetchOutcome},
        error::AppError,
        session::Session,
    },
    cache::{CacheConfig, FeedIdentity, FeedSubscription},
    config::{self, Command, ScopeArg, Settings},
    domain::{
        entities::{Profile, Tweet, Viewer},
        types::{TweetId, UserId},
    },
    infra::{
        error::InfraError,
        http::{self, DevServerState},
        http_backend::HttpBackend,
        memory::{InMemoryBackend, SeedData},
        telemetry,
    },
};
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(&settings).await,
        Command::Feed(args) => {
            let client = Client::connect(&settings).await?;
            let identity = match (args.scope, args.user) {
                (ScopeArg::All, _) => FeedIdentity::all(),
                (ScopeArg::Following, _) => FeedIdentity::following(),
                (ScopeArg::Profile, Some(user)) => FeedIdentity::profile(user),
                (ScopeArg::Profile, None) => {
                    return Err(AppError::validation("--scope profile requires --user"));
                }
            };
            client.show_feed(identity, args.pages).await
        }
        Command::Like(args) => {
            let client = Client::connect(&settings).await?;
            client.like(TweetId::new(args.tweet_id)).await
        }
        Command::Follow(args) => {
            let client = Client::connect(&settings).await?;
            client.follow(UserId::new(args.user_id)).await
        }
        Command::Post(args) => {
            let client = Client::connect(&settings).await?;
            client.post(&args.content).await
        }
        Command::Profile(args) => {
            let client = Client::connect(&settings).await?;
            client.profile(UserId::new(args.user_id)).await
        }
    }
}

async fn load_seed(settings: &Settings) -> Result<SeedData, AppError> {
    match settings.dev_server.seed_file.as_deref() {
        Some(path) => {
            info!(path = %path.display(), "Loading seed file");
            Ok(SeedData::load(path).await?)
        }
        None => Ok(SeedData::demo()),
    }
}

async fn run_serve(settings: &Settings) -> Result<(), AppError> {
    let seed = load_seed(settings).await?;
    let backend = InMemoryBackend::from_seed(seed)
        .map_err(|err| AppError::validation(format!("inconsistent seed data: {err}")))?;
    let state = DevServerState {
        backend: Arc::new(backend),
    };

    let listener = TcpListener::bind(settings.dev_server.listen_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    http::serve(listener, state).await?;
    Ok(())
}

/// One client session driving the feed engine.
struct Client {
    engine: FeedEngine,
    session: Session,
}

impl Client {
    async fn connect(settings: &Settings) -> Result<Self, AppError> {
        let viewer_id = settings.session.viewer_id.clone().map(UserId::new);
        let backend: Arc<dyn FeedBackend> = match settings.backend.base_url.as_ref() {
            Some(base_url) => {
                info!(%base_url, "Using HTTP backend");
                Arc::new(HttpBackend::new(
                    base_url,
                    settings.backend.request_timeout,
                    viewer_id.as_ref(),
                )?)
            }
            None => {
                info!("No backend url configured; using the demo store");
                let store = InMemoryBackend::from_seed(SeedData::demo())
                    .map_err(|err| AppError::unexpected(err.to_string()))?;
                Arc::new(Arc::new(store).client(viewer_id.clone()))
            }
        };

        let session = match viewer_id {
            Some(id) => {
                let viewer = match backend.get_profile(&id).await {
                    Ok(profile) => Viewer {
                        id: profile.id,
                        display_name: profile.display_name,
                        image: profile.image,
                    },
                    Err(err) => {
                        warn!(viewer = %id, error = %err, "Viewer profile unavailable");
                        Viewer::new(id.clone(), id.to_string())
                    }
                };
                Session::authenticated(viewer)
            }
            None => Session::anonymous(),
        };

        let engine = FeedEngine::new(backend, &CacheConfig::from(&settings.feed));
        Ok(Self { engine, session })
    }

    async fn load(&self, identity: FeedIdentity) -> Result<FeedSubscription, AppError> {
        let subscription = self.engine.subscribe(identity);
        self.engine
            .fetch_more(&self.session, subscription.handle())
            .await?;
        Ok(subscription)
    }

    async fn show_feed(&self, identity: FeedIdentity, pages: u32) -> Result<(), AppError> {
        let subscription = self.engine.subscribe(identity);
        for _ in 0..pages.max(1) {
            match self
                .engine
                .fetch_more(&self.session, subscription.handle())
                .await?
            {
                FetchOutcome::Appended { has_more: true, .. } => continue,
                _ => break,
            }
        }

        let projection = subscription.projection();
        for tweet in projection.tweets() {
            print_tweet(tweet);
        }
        if projection.has_more() {
            println!("-- more available --");
        }
        Ok(())
    }

    async fn like(&self, tweet_id: TweetId) -> Result<(), AppError> {
        let subscription = self.load(FeedIdentity::all()).await?;
        let outcome = self.engine.toggle_like(&self.session, &tweet_id).await?;
        println!(
            "{} {tweet_id} ({:?})",
            if outcome.added { "liked" } else { "unliked" },
            outcome.resolution
        );
        if let Some(tweet) = subscription.projection().get(&tweet_id) {
            print_tweet(tweet);
        }
        Ok(())
    }

    async fn follow(&self, user_id: UserId) -> Result<(), AppError> {
        let subscription = self.engine.subscribe(FeedIdentity::profile(user_id.clone()));
        self.engine.load_profile(subscription.handle()).await?;
        let outcome = self.engine.toggle_follow(&self.session, &user_id).await?;
        println!(
            "{} {user_id} ({:?})",
            if outcome.added { "followed" } else { "unfollowed" },
            outcome.resolution
        );
        if let Some(profile) = subscription.profile() {
            print_profile(&profile);
        }
        Ok(())
    }

    async fn post(&self, content: &str) -> Result<(), AppError> {
        let subscription = self.load(FeedIdentity::all()).await?;
        let outcome = self.engine.create_tweet(&self.session, content).await?;
        println!("posted {}", outcome.tweet.id);
        if let Some(head) = subscription.projection().tweets().next() {
            print_tweet(head);
        }
        Ok(())
    }

    async fn profile(&self, user_id: UserId) -> Result<(), AppError> {
        let subscription = self.load(FeedIdentity::profile(user_id)).await?;
        let profile = self.engine.load_profile(subscription.handle()).await?;
        print_profile(&profile);
        for tweet in subscription.projection().tweets() {
            print_tweet(tweet);
        }
        Ok(())
    }
}

fn print_tweet(tweet: &Tweet) {
    println!(
        "{id:<12} {author:<10} {likes:>3}{heart} {content}",
        id = tweet.id,
        author = tweet.author.display_name,
        likes = tweet.like_count,
        heart = if tweet.liked_by_viewer { "*" } else { " " },
        content = tweet.content,
    );
}

fn print_profile(profile: &Profile) {
    println!(
        "{} ({}): {} tweets, {} followers, {} following{}",
        profile.display_name,
        profile.id,
        profile.tweets_count,
        profile.followers_count,
        profile.follows_count,
        if profile.is_following {
            ", followed by you"
        } else {
            ""
        },
    );
}
