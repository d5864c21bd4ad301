use anyhow::Context;
use async_trait::async_trait;
use background_service::{BackgroundService, BrowserHost};
use clap::{Parser, Subcommand};
use database::Database;
use feed_extractor::{DocumentSource, FeedExtractor, FeedRun};
use feedlens_core::{AppConfig, AuthError, CoreError, Request, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use x_client::{Cookie, CookieSource, TabEventHub, TabHost, TabId};

#[derive(Debug, Parser)]
#[command(name = "feedlens", version, about = "Bias, sentiment and toxicity profile of a social feed")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "FEEDLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `storage.database_url`
    #[arg(long, env = "FEEDLENS_DATABASE_URL")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run saved feed snapshots through the extractor, classifier and aggregator
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Page URL the snapshots were taken from
        #[arg(long, default_value = "https://x.com/home")]
        url: String,
    },
    /// Print the current stats report
    Stats,
    /// Reset all counters and the seen-post history
    Reset,
    /// Show the delegated-login session
    LoginStatus,
    /// Remove the delegated-login session
    Logout,
}

/// No browsing contexts are available from the command line.
struct Headless;

#[async_trait]
impl TabHost for Headless {
    async fn open_tab(&self, _url: &str) -> Result<TabId, CoreError> {
        Err(AuthError::TabFailed {
            reason: "no browser available".to_string(),
        }
        .into())
    }

    async fn close_tab(&self, _tab_id: TabId) -> Result<(), CoreError> {
        Ok(())
    }
}

#[async_trait]
impl CookieSource for Headless {
    async fn cookies_for(&self, _domain: &str) -> Result<Vec<Cookie>, CoreError> {
        Ok(Vec::new())
    }
}

/// A saved page snapshot.
struct SnapshotFile(String);

#[async_trait]
impl DocumentSource for SnapshotFile {
    async fn snapshot(&self) -> Result<String, CoreError> {
        Ok(self.0.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "feedlens=info,background_service=info,feed_extractor=info,llm_interface=info,x_client=info",
            )
        }))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(url) = cli.database {
        config.storage.database_url = url;
    }

    tracing::info!("Starting FeedLens");

    let store: Arc<dyn Store> = Arc::new(
        Database::open(config.storage.database_url.clone())
            .await
            .context("failed to open store")?,
    );
    let service = Arc::new(BackgroundService::new(
        &config,
        Arc::clone(&store),
        BrowserHost {
            tabs: Arc::new(Headless),
            hub: TabEventHub::new(),
            cookies: Arc::new(Headless),
        },
    )?);
    service.init().await?;

    match cli.command {
        Command::Analyze { files, url } => {
            let extractor =
                FeedExtractor::new(config.extractor.clone(), Arc::clone(&store), service.clone(), &url)?;
            extractor.load_persisted().await?;

            for file in files {
                let html = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let source = SnapshotFile(html);

                loop {
                    match extractor.analyze_feed(&source).await? {
                        FeedRun::Forwarded { count } if count > 0 => continue,
                        run => {
                            tracing::debug!("{}: {:?}", file.display(), run);
                            break;
                        }
                    }
                }
            }

            service.wait_idle().await;
            print_json(&service.aggregator().report().await?)?;
        }
        Command::Stats => print_json(&service.aggregator().report().await?)?,
        Command::Reset => {
            let extractor =
                FeedExtractor::new(config.extractor.clone(), Arc::clone(&store), service.clone(), "")?;
            extractor.reset().await?;
            println!("Statistics reset");
        }
        Command::LoginStatus => print_json(&service.handle(Request::GetTwitterAuthStatus).await)?,
        Command::Logout => print_json(&service.handle(Request::LogoutTwitter).await)?,
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
