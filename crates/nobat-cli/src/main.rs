use std::path::PathBuf;

use clap::{Parser, Subcommand};

use nobat_core::{load_app_config, ScrapeConfig};
use nobat_scraper::controller::{Controller, StartOutcome};
use nobat_scraper::discover::harvest_profile_links;
use nobat_scraper::extract::extract_record;

mod fixture;

use fixture::FixtureBrowser;

#[derive(Debug, Parser)]
#[command(name = "nobat-cli")]
#[command(about = "Offline driver for the nobat.ir doctor-directory scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a full scrape against saved fixture pages.
    Run {
        /// Directory of saved HTML pages, one file per URL.
        #[arg(long, default_value = "fixtures")]
        fixtures: PathBuf,
        /// Listing-page URL to start from.
        #[arg(long)]
        listing: String,
        /// Directory receiving the CSV export and state.json.
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Inter-visit delay override in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Retry budget override per profile.
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Extract one saved profile page and print the record as JSON.
    Extract {
        file: PathBuf,
        /// URL recorded on the output record.
        #[arg(long, default_value = "https://nobat.ir/dr/unknown")]
        url: String,
    },
    /// Harvest profile links from one saved listing page.
    Discover {
        file: PathBuf,
        /// Host links are locked to.
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let app = load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&app.log_level)),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            fixtures,
            listing,
            out,
            delay_ms,
            max_retries,
        } => {
            let browser = FixtureBrowser::new(fixtures, out, app.target_host.clone())?;
            browser.open_listing(&listing)?;

            let config = ScrapeConfig {
                delay_ms: delay_ms.unwrap_or(app.delay_ms),
                max_retries: max_retries.unwrap_or(app.max_retries),
                ..ScrapeConfig::default()
            }
            .sanitized();

            let controller = Controller::new(browser, app);
            match controller.start(Some(config)).await {
                StartOutcome::Started => {
                    controller.wait_until_idle().await;
                    let status = controller.status();
                    println!("{}", status.message);
                    println!(
                        "processed {} of {} ({} errors)",
                        status.counts.processed,
                        status.counts.total,
                        status.errors.len()
                    );
                    for entry in &status.errors {
                        eprintln!("  {}: {}", entry.url, entry.message);
                    }
                }
                StartOutcome::NoLinks => println!("no profile links on the listing page"),
                StartOutcome::AlreadyRunning => anyhow::bail!("a run is already active"),
                StartOutcome::Error(message) => anyhow::bail!(message),
            }
        }
        Commands::Extract { file, url } => {
            let html = std::fs::read_to_string(&file)?;
            let record = extract_record(&html, &url, false);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Discover { file, host } => {
            let html = std::fs::read_to_string(&file)?;
            let host = host.unwrap_or(app.target_host);
            for link in harvest_profile_links(&html, &host) {
                println!("{link}");
            }
        }
    }

    Ok(())
}
