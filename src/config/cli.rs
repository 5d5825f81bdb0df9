use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the murmur binary.
#[derive(Debug, Parser)]
#[command(name = "murmur", version, about = "Feed cache client and development server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MURMUR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the development HTTP server backed by the in-memory store.
    Serve(ServeArgs),
    /// Subscribe to a feed and page through it.
    Feed(FeedArgs),
    /// Toggle the viewer's like on a tweet.
    Like(LikeArgs),
    /// Toggle whether the viewer follows a user.
    Follow(FollowArgs),
    /// Post a tweet as the viewer.
    Post(PostArgs),
    /// Show a user's profile header.
    Profile(ProfileArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Override the listen address.
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Seed the store from a TOML file.
    #[arg(long = "seed", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub seed_file: Option<PathBuf>,
}

/// Options shared by every client command.
#[derive(Debug, Args, Default, Clone)]
pub struct ClientOverrides {
    /// Backend base URL; the built-in demo store is used when absent.
    #[arg(long = "backend-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub backend_url: Option<String>,

    /// Act as this user.
    #[arg(long = "viewer", value_name = "USER_ID")]
    pub viewer: Option<String>,

    /// Override the page size.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    All,
    Following,
    Profile,
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    #[command(flatten)]
    pub client: ClientOverrides,

    /// Which feed to show.
    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    pub scope: ScopeArg,

    /// Profile owner, required with `--scope profile`.
    #[arg(long = "user", value_name = "USER_ID")]
    pub user: Option<String>,

    /// Number of pages to fetch.
    #[arg(long, default_value_t = 1)]
    pub pages: u32,
}

#[derive(Debug, Args, Clone)]
pub struct LikeArgs {
    #[command(flatten)]
    pub client: ClientOverrides,

    #[arg(value_name = "TWEET_ID")]
    pub tweet_id: String,
}

#[derive(Debug, Args, Clone)]
pub struct FollowArgs {
    #[command(flatten)]
    pub client: ClientOverrides,

    #[arg(value_name = "USER_ID")]
    pub user_id: String,
}

#[derive(Debug, Args, Clone)]
pub struct PostArgs {
    #[command(flatten)]
    pub client: ClientOverrides,

    #[arg(value_name = "CONTENT")]
    pub content: String,
}

#[derive(Debug, Args, Clone)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub client: ClientOverrides,

    #[arg(value_name = "USER_ID")]
    pub user_id: String,
}

impl Command {
    /// Client options of the command, `None` for `serve`.
    pub fn client_overrides(&self) -> Option<&ClientOverrides> {
        match self {
            Command::Serve(_) => None,
            Command::Feed(args) => Some(&args.client),
            Command::Like(args) => Some(&args.client),
            Command::Follow(args) => Some(&args.client),
            Command::Post(args) => Some(&args.client),
            Command::Profile(args) => Some(&args.client),
        }
    }
}
