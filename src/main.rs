use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use gator::commands::{self, Context};

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Command-line RSS feed aggregator")]
struct Cli {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// Delete all users, feeds, follows and posts
    Reset,
    /// List users
    Users,
    /// Add a feed and follow it
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List every feed
    Feeds,
    /// Follow an existing feed by URL
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from followed feeds
    Browse {
        /// Number of posts (minimum 2)
        limit: Option<u32>,
    },
    /// Fetch feeds forever, one every INTERVAL (e.g. 30s, 1m, 1h 30m)
    Agg {
        #[arg(value_parser = humantime::parse_duration)]
        interval: Duration,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => gator::config::default_path()?,
    };
    let mut ctx = Context::load(config_path).await?;

    match cli.command {
        Command::Register { name } => commands::register(&mut ctx, &name).await,
        Command::Login { name } => commands::login(&mut ctx, &name).await,
        Command::Reset => commands::reset(&mut ctx).await,
        Command::Users => commands::users(&ctx).await,
        Command::AddFeed { name, url } => commands::add_feed(&ctx, &name, &url).await,
        Command::Feeds => commands::feeds(&ctx).await,
        Command::Follow { url } => commands::follow(&ctx, &url).await,
        Command::Following => commands::following(&ctx).await,
        Command::Unfollow { url } => commands::unfollow(&ctx, &url).await,
        Command::Browse { limit } => commands::browse(&ctx, limit).await,
        Command::Agg { interval } => commands::agg(&ctx, interval).await,
    }
}
