use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use otodom_scout::error::CrawlResult;
use otodom_scout::export;
use otodom_scout::observer::TracingObserver;
use otodom_scout::scrapers::types::MAX_PAGES_RANGE;
use otodom_scout::scrapers::{ChromeSession, FetchSettings, HttpSession, PageSession, SiteConfig};
use otodom_scout::{CrawlReport, Pipeline, RunStatus, StopSignal};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Headless Chrome, renders JavaScript
    Chrome,
    /// Plain HTTP, server-rendered HTML only
    Http,
}

#[derive(Debug, Parser)]
#[command(name = "otodom-scout", about = "Collect occupancy of otodom investment listings")]
struct Cli {
    /// Max result pages to scan
    #[arg(short = 'n', long, default_value_t = 10, value_parser = max_pages_parser())]
    max_pages: u32,

    #[arg(long, value_enum, default_value_t = Backend::Chrome)]
    backend: Backend,

    /// Show the Chrome window instead of running headless
    #[arg(long, default_value_t = false)]
    show: bool,

    /// Spreadsheet to write
    #[arg(short, long, default_value = "otodom_listings.xlsx")]
    output: PathBuf,

    /// Also dump the records as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Upper bound for loading one page
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    fetch_timeout_secs: u64,

    /// Tries per page before the run is abandoned
    #[arg(long, value_name = "N", default_value_t = 1)]
    attempts: u32,
}

fn max_pages_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(i64::from(*MAX_PAGES_RANGE.start())..=i64::from(*MAX_PAGES_RANGE.end()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!("🏡 Otodom Property Scraper");
    info!("==========================");

    let settings = FetchSettings {
        fetch_timeout: Duration::from_secs(cli.fetch_timeout_secs),
        attempts: cli.attempts.max(1),
        ..FetchSettings::default()
    };

    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current page");
            ctrl_c.raise();
        }
    });

    let headless = !cli.show;
    let report = match cli.backend {
        Backend::Chrome => {
            crawl(|| ChromeSession::launch(headless, settings.fetch_timeout), settings, stop, cli.max_pages).await
        }
        Backend::Http => crawl(|| HttpSession::new(settings.fetch_timeout), settings, stop, cli.max_pages).await,
    };

    let bytes = export::to_xlsx(&report.records)?;
    tokio::fs::write(&cli.output, bytes)
        .await
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    info!("💾 Saved {} rows to {}", report.records.len(), cli.output.display());

    if let Some(path) = &cli.json {
        let json = export::to_json(&report.records)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("💾 Saved records to {}", path.display());
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Cancelled => {
            warn!("Run was stopped; the export holds partial results");
            Ok(())
        }
        RunStatus::Failed(e) => bail!("run failed while {}: {}", report.phase, e),
    }
}

async fn crawl<S, F>(open: F, settings: FetchSettings, stop: StopSignal, max_pages: u32) -> CrawlReport
where
    S: PageSession,
    F: FnOnce() -> CrawlResult<S>,
{
    info!("Scanning up to {} page(s)", max_pages);

    let mut observer = TracingObserver::new();
    Pipeline::new(SiteConfig::default(), settings)
        .with_stop_signal(stop)
        .run(open, max_pages, &mut observer)
        .await
}
