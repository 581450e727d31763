use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rivulet::commands;
use rivulet::config::Config;
use rivulet::session::Session;
use rivulet::storage::Database;

/// Get the config directory path (~/.config/rivulet/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("rivulet"))
}

#[derive(Parser, Debug)]
#[command(
    name = "rivulet",
    about = "Poll RSS feeds round-robin and collect posts"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the session to an existing user
    Login { name: String },
    /// Delete all users, feeds, follows and posts
    Reset,
    /// List users
    Users,
    /// Run the poll scheduler until stopped
    Agg {
        /// Poll interval, e.g. "30s" or "1m"
        interval: String,
        /// Stop on the first pipeline error instead of logging and continuing
        #[arg(long)]
        fail_fast: bool,
    },
    /// Register a feed and follow it
    Addfeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an already-registered feed by url
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show recent posts from followed feeds
    Browse {
        #[arg(value_parser = clap::value_parser!(i64).range(1..), default_value_t = 2)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }
    let config_path = config_dir.join("config.toml");
    let mut config = Config::load(&config_path).context("Failed to load configuration")?;

    let db_path = config.database_path.clone().unwrap_or_else(|| {
        config_dir
            .join("rivulet.db")
            .to_string_lossy()
            .into_owned()
    });
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // Resolve the session identity once; gated commands consume it
    let session = Session::resolve(&db, &config).await?;

    match args.command {
        Command::Register { name } => {
            commands::register(&db, &mut config, &config_path, &name).await?
        }
        Command::Login { name } => commands::login(&db, &mut config, &config_path, &name).await?,
        Command::Reset => commands::reset(&db).await?,
        Command::Users => commands::users(&db, &config).await?,
        Command::Agg {
            interval,
            fail_fast,
        } => commands::aggregate(&db, &interval, fail_fast).await?,
        Command::Addfeed { name, url } => {
            let user = session.require()?;
            commands::add_feed(&db, &user, &name, &url).await?
        }
        Command::Feeds => commands::feeds(&db).await?,
        Command::Follow { url } => {
            let user = session.require()?;
            commands::follow(&db, &user, &url).await?
        }
        Command::Following => {
            let user = session.require()?;
            commands::following(&db, &user).await?
        }
        Command::Unfollow { url } => {
            let user = session.require()?;
            commands::unfollow(&db, &user, &url).await?
        }
        Command::Browse { limit } => {
            let user = session.require()?;
            commands::browse(&db, &user, limit).await?
        }
    }

    Ok(())
}
