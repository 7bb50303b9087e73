use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ufo_spider::config::{CrawlConfig, load_config};
use ufo_spider::export::ExportFormat;
use ufo_spider::pipeline::{CrawlOptions, run_crawl};

#[derive(Parser, Debug)]
#[command(name = "ufo-spider", about = "Crawls the NUFORC report archive into a table")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Crawl {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Validate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CrawlConfig::default(),
    };

    match cli.command {
        Commands::Crawl { out, format, json } => {
            let report = run_crawl(&CrawlOptions {
                config,
                out_path: out,
                format,
            })
            .await?;

            info!(
                listing_pages = report.listing_pages,
                rows = report.listing_rows,
                unlinked = report.unlinked_rows,
                duplicates = report.duplicate_requests,
                detail_pages = report.detail_pages,
                failures = report.fetch_failures,
                exported = report.exported_rows,
                output = ?report.output,
                "crawl summary"
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Validate => {
            config.validate()?;
            println!("OK: {}", config.archive.root_url);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
