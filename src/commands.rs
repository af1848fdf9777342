//! Subcommand handlers.
//!
//! Each handler takes the [`Context`] built in `main`, prints its result to
//! stdout and returns `anyhow::Result` so failures reach the user with
//! context attached.

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::feed::Fetcher;
use crate::scheduler::Scheduler;
use crate::storage::{Database, DatabaseError, User};
use crate::util::validate_feed_url;

/// Minimum and default number of posts shown by `browse`
pub const BROWSE_MIN_LIMIT: u32 = 2;

/// Process state shared by every command
pub struct Context {
    pub db: Database,
    pub config: Config,
    pub config_path: PathBuf,
}

impl Context {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    /// Read the config at `config_path` and open the database it names.
    pub async fn load(config_path: PathBuf) -> Result<Self> {
        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        if let Some(parent) = config
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }

        let db_path = config
            .database_path
            .to_str()
            .context("Database path is not valid UTF-8")?;
        let db = Database::open(db_path).await?;

        Ok(Self::new(db, config, config_path))
    }

    /// The user named by `current_user_name`, for commands that need one.
    async fn current_user(&self) -> Result<User> {
        let Some(name) = self.config.current_user_name.as_deref() else {
            bail!("Not logged in. Run `gator register <name>` or `gator login <name>` first");
        };

        self.db
            .get_user_by_name(name)
            .await?
            .with_context(|| format!("Current user '{name}' no longer exists. Log in again"))
    }

    fn set_current_user(&mut self, name: &str) -> Result<()> {
        self.config.current_user_name = Some(name.to_string());
        self.config
            .save(&self.config_path)
            .with_context(|| format!("Failed to save config to {}", self.config_path.display()))
    }
}

/// Stored feed URLs are in `url::Url` normal form; match user input the same way.
fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    url::Url::parse(trimmed)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

fn require_name<'a>(name: &'a str, what: &str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        bail!("{what} cannot be empty");
    }
    Ok(name)
}

// ============================================================================
// Users
// ============================================================================

pub async fn register(ctx: &mut Context, name: &str) -> Result<()> {
    let name = require_name(name, "User name")?;

    let user = match ctx.db.create_user(name, Utc::now()).await {
        Ok(user) => user,
        Err(DatabaseError::AlreadyExists(_)) => bail!("User '{name}' already exists"),
        Err(e) => return Err(e.into()),
    };
    ctx.set_current_user(&user.name)?;

    tracing::debug!(user = %user.name, id = %user.id, "Registered user");
    println!("User created: {}", user.name);
    println!("  ID:      {}", user.id);
    println!("  Created: {}", user.created_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

pub async fn login(ctx: &mut Context, name: &str) -> Result<()> {
    let name = require_name(name, "User name")?;

    let Some(user) = ctx.db.get_user_by_name(name).await? else {
        bail!("User '{name}' does not exist");
    };
    ctx.set_current_user(&user.name)?;

    println!("Logged in as {}", user.name);
    Ok(())
}

/// Delete every user. Feeds, follows and posts go with them.
pub async fn reset(ctx: &mut Context) -> Result<()> {
    let removed = ctx.db.delete_all_users().await?;
    tracing::info!(users = removed, "Database reset");
    println!("Database reset successfully ({removed} users removed)");
    Ok(())
}

pub async fn users(ctx: &Context) -> Result<()> {
    let current = ctx.config.current_user_name.as_deref();
    for user in ctx.db.list_users().await? {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

// ============================================================================
// Feeds and follows
// ============================================================================

/// Add a feed owned by the current user and follow it.
pub async fn add_feed(ctx: &Context, name: &str, url: &str) -> Result<()> {
    let user = ctx.current_user().await?;
    let name = require_name(name, "Feed name")?;
    let url = validate_feed_url(url, ctx.config.allow_private_hosts)?;

    let now = Utc::now();
    let feed = match ctx.db.create_feed(name, url.as_str(), user.id, now).await {
        Ok(feed) => feed,
        Err(DatabaseError::AlreadyExists(_)) => {
            bail!("A feed with URL {url} already exists. Use `gator follow {url}`")
        }
        Err(e) => return Err(e.into()),
    };
    ctx.db.create_feed_follow(user.id, feed.id, now).await?;

    tracing::info!(feed = %feed.name, url = %feed.url, "Added feed");
    println!("Feed added: {}", feed.name);
    println!("  ID:  {}", feed.id);
    println!("  URL: {}", feed.url);
    println!("{} now follows {}", user.name, feed.name);
    Ok(())
}

pub async fn feeds(ctx: &Context) -> Result<()> {
    let feeds = ctx.db.list_feeds().await?;
    if feeds.is_empty() {
        println!("No feeds yet. Add one with `gator addfeed <name> <url>`");
        return Ok(());
    }

    for entry in feeds {
        println!("* {}", entry.feed.name);
        println!("  URL:        {}", entry.feed.url);
        println!("  Created by: {}", entry.user_name);
    }
    Ok(())
}

pub async fn follow(ctx: &Context, url: &str) -> Result<()> {
    let user = ctx.current_user().await?;
    let url = normalize_url(url);
    let Some(feed) = ctx.db.get_feed_by_url(&url).await? else {
        bail!("No feed with URL {url}. Add it with `gator addfeed <name> {url}`");
    };

    let follow = match ctx.db.create_feed_follow(user.id, feed.id, Utc::now()).await {
        Ok(follow) => follow,
        Err(DatabaseError::AlreadyExists(_)) => bail!("Already following {}", feed.name),
        Err(e) => return Err(e.into()),
    };

    println!("{} now follows {}", follow.user_name, follow.feed_name);
    Ok(())
}

pub async fn following(ctx: &Context) -> Result<()> {
    let user = ctx.current_user().await?;
    let follows = ctx.db.get_feed_follows_for_user(user.id).await?;
    if follows.is_empty() {
        println!("{} is not following any feeds", user.name);
        return Ok(());
    }

    for follow in follows {
        println!("* {}", follow.feed_name);
    }
    Ok(())
}

pub async fn unfollow(ctx: &Context, url: &str) -> Result<()> {
    let user = ctx.current_user().await?;
    let url = normalize_url(url);
    let Some(feed) = ctx.db.get_feed_by_url(&url).await? else {
        bail!("No feed with URL {url}");
    };

    if !ctx.db.delete_feed_follow(user.id, feed.id).await? {
        bail!("{} is not following {}", user.name, feed.name);
    }

    println!("{} unfollowed {}", user.name, feed.name);
    Ok(())
}

// ============================================================================
// Posts
// ============================================================================

/// Effective `browse` limit: unset means the minimum, smaller values are raised to it.
pub fn browse_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(BROWSE_MIN_LIMIT).max(BROWSE_MIN_LIMIT)
}

pub async fn browse(ctx: &Context, limit: Option<u32>) -> Result<()> {
    let user = ctx.current_user().await?;
    let posts = ctx.db.get_posts_for_user(user.id, browse_limit(limit)).await?;

    if posts.is_empty() {
        println!("No posts yet. Run `gator agg <interval>` to collect some");
        return Ok(());
    }

    for post in posts {
        let published = post
            .published_at
            .map(|dt| dt.format("%a %b %d %Y").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        println!("{} - {}", published, post.title.as_deref().unwrap_or("(untitled)"));
        println!("    {}", post.url);
        if let Some(description) = post.description.as_deref() {
            println!("    {}", description);
        }
        println!();
    }
    Ok(())
}

// ============================================================================
// Aggregation
// ============================================================================

/// Run the scheduler every `interval` until the process is killed.
pub async fn agg(ctx: &Context, interval: Duration) -> Result<()> {
    if interval.is_zero() {
        bail!("Interval must be greater than zero");
    }

    let fetcher = Fetcher::new(ctx.config.fetcher_config()).context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(ctx.db.clone(), fetcher);

    println!("Collecting feeds every {}", humantime::format_duration(interval));
    scheduler.run(interval).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn context(name: &str) -> Context {
        let dir = std::env::temp_dir().join(format!("gator_commands_test_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        let db = Database::open(":memory:").await.unwrap();
        Context::new(db, Config::default(), dir.join("config.toml"))
    }

    #[tokio::test]
    async fn test_register_sets_and_persists_current_user() {
        let mut ctx = context("register").await;

        register(&mut ctx, "kahya").await.unwrap();
        assert_eq!(ctx.config.current_user_name.as_deref(), Some("kahya"));

        let saved = Config::load(&ctx.config_path).unwrap();
        assert_eq!(saved.current_user_name.as_deref(), Some("kahya"));

        let err = register(&mut ctx, "kahya").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_login_requires_existing_user() {
        let mut ctx = context("login").await;

        assert!(login(&mut ctx, "ghost").await.is_err());
        assert_eq!(ctx.config.current_user_name, None);

        register(&mut ctx, "holgith").await.unwrap();
        register(&mut ctx, "kahya").await.unwrap();
        login(&mut ctx, "holgith").await.unwrap();
        assert_eq!(ctx.config.current_user_name.as_deref(), Some("holgith"));
    }

    #[tokio::test]
    async fn test_logged_in_commands_fail_without_user() {
        let ctx = context("not_logged_in").await;

        let err = add_feed(&ctx, "Blog", "https://blog.example.com/rss")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
        assert!(following(&ctx).await.is_err());
        assert!(browse(&ctx, None).await.is_err());
    }

    #[tokio::test]
    async fn test_add_feed_follows_it() {
        let mut ctx = context("addfeed").await;
        register(&mut ctx, "lane").await.unwrap();

        add_feed(&ctx, "Lanes Blog", "https://www.wagslane.dev/index.xml")
            .await
            .unwrap();

        let user = ctx.db.get_user_by_name("lane").await.unwrap().unwrap();
        let follows = ctx.db.get_feed_follows_for_user(user.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_name, "Lanes Blog");
    }

    #[tokio::test]
    async fn test_add_feed_rejects_private_hosts_by_default() {
        let mut ctx = context("addfeed_private").await;
        register(&mut ctx, "lane").await.unwrap();

        assert!(add_feed(&ctx, "Local", "http://127.0.0.1:8080/rss").await.is_err());
        assert!(add_feed(&ctx, "Ftp", "ftp://example.com/rss").await.is_err());
        assert!(ctx.db.list_feeds().await.unwrap().is_empty());

        ctx.config.allow_private_hosts = true;
        add_feed(&ctx, "Local", "http://127.0.0.1:8080/rss").await.unwrap();
    }

    #[tokio::test]
    async fn test_follow_unfollow_cycle() {
        let mut ctx = context("follow").await;
        register(&mut ctx, "owner").await.unwrap();
        add_feed(&ctx, "Boot.dev", "https://blog.boot.dev/index.xml")
            .await
            .unwrap();

        register(&mut ctx, "reader").await.unwrap();
        assert!(follow(&ctx, "https://unknown.example.com/rss").await.is_err());

        follow(&ctx, "https://blog.boot.dev/index.xml").await.unwrap();
        let err = follow(&ctx, "https://blog.boot.dev/index.xml").await.unwrap_err();
        assert!(err.to_string().contains("Already following"));

        unfollow(&ctx, "https://blog.boot.dev/index.xml").await.unwrap();
        assert!(unfollow(&ctx, "https://blog.boot.dev/index.xml").await.is_err());
    }

    #[tokio::test]
    async fn test_follow_matches_normalized_url() {
        let mut ctx = context("follow_normalized").await;
        register(&mut ctx, "owner").await.unwrap();
        // Stored as https://example.com/
        add_feed(&ctx, "Bare", "https://example.com").await.unwrap();

        register(&mut ctx, "reader").await.unwrap();
        follow(&ctx, "  https://example.com ").await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_removes_everything() {
        let mut ctx = context("reset").await;
        register(&mut ctx, "lane").await.unwrap();
        add_feed(&ctx, "Blog", "https://blog.example.com/rss").await.unwrap();

        reset(&mut ctx).await.unwrap();
        assert!(ctx.db.list_users().await.unwrap().is_empty());
        assert!(ctx.db.list_feeds().await.unwrap().is_empty());
    }

    #[test]
    fn test_browse_limit() {
        assert_eq!(browse_limit(None), 2);
        assert_eq!(browse_limit(Some(0)), 2);
        assert_eq!(browse_limit(Some(1)), 2);
        assert_eq!(browse_limit(Some(10)), 10);
    }

    #[tokio::test]
    async fn test_agg_rejects_zero_interval() {
        let ctx = context("agg_zero").await;
        assert!(agg(&ctx, Duration::ZERO).await.is_err());
    }
}
