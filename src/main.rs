use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mediascrape::batch;
use mediascrape::browser::ChromeSession;
use mediascrape::config::Config;
use mediascrape::models::{BatchReport, Target};
use mediascrape::orchestrator::Orchestrator;
use std::path::PathBuf;
use tracing::{info, info_span, warn};

#[derive(Parser)]
#[command(name = "mediascrape")]
#[command(about = "Scrape images and videos from dynamic pages with a headless browser")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output root directory (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cookie JSON file for authenticated drill-down targets
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a configured site and download its images
    Site {
        /// Site key (e.g. "vogue", "alamour", "ins_tag")
        site: String,
        /// Search keyword
        keyword: String,
        /// Number of files to download
        #[arg(short = 'n', long, default_value = "10")]
        quota: usize,
    },
    /// Download every post of a profile
    Profile {
        /// Profile page URL
        url: String,
        /// Number of posts to visit
        #[arg(short = 'n', long, default_value = "10")]
        quota: usize,
    },
    /// Download the posts returned for a search keyword
    Search {
        keyword: String,
        /// Number of posts to visit
        #[arg(short = 'n', long, default_value = "10")]
        quota: usize,
    },
    /// Run every target listed in a TOML batch file
    Batch {
        file: PathBuf,
        /// Quota for entries that do not set one
        #[arg(short = 'n', long, default_value = "10")]
        quota: usize,
    },
    /// List the known sites
    Sites,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let mut config = Config::load(&cli.config)?;
    if let Some(output) = &cli.output {
        config.storage.output_root = output.clone();
    }
    if let Some(cookies) = &cli.cookies {
        config.cookies.path = Some(cookies.clone());
    }
    if cli.headed {
        config.navigation.headless = false;
    }
    let root = config.storage.output_root.clone();

    let targets = match cli.command {
        Commands::Sites => {
            list_sites(&config);
            return Ok(());
        }
        Commands::Site { site, keyword, quota } => vec![Target::site(site, keyword, quota, &root)?],
        Commands::Profile { url, quota } => vec![Target::profile(url, quota, &root)?],
        Commands::Search { keyword, quota } => vec![Target::search(keyword, quota, &root)?],
        Commands::Batch { file, quota } => batch::load_targets(&file, quota, &root)?,
    };
    if targets.is_empty() {
        warn!("Nothing to do");
        return Ok(());
    }

    let browser = ChromeSession::launch(&config.navigation, &config.download.user_agent).await?;
    let report = {
        let orchestrator = Orchestrator::new(config, &browser, info_span!("mediascrape"));
        orchestrator.run_batch(&targets).await
    };
    if let Err(e) = browser.close().await {
        warn!(error = %e, "Browser did not shut down cleanly");
    }

    print_summary(&report);

    let failed = report.failed_targets();
    if failed > 0 {
        bail!("{} of {} target(s) failed", failed, report.runs.len());
    }
    info!(
        succeeded = report.total_succeeded(),
        attempted = report.total_attempted(),
        "All targets done"
    );
    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("mediascrape={}", level))
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();

    Ok(())
}

fn list_sites(config: &Config) {
    let mut sites: Vec<_> = config.all_sites().into_iter().collect();
    sites.sort_by(|a, b| a.0.cmp(&b.0));

    println!("{:<15} {:<10} {:<25} {}", "Key", "Extractor", "Name", "Search URL");
    println!("{}", "-".repeat(90));
    for (key, site) in sites {
        println!(
            "{:<15} {:<10} {:<25} {}",
            key,
            format!("{:?}", site.extractor).to_lowercase(),
            site.name,
            site.url_template
        );
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    println!(
        "{:<40} {:<8} {:<8} {:<8} {:<8} {:<8}",
        "Target", "Found", "Saved", "Skipped", "Failed", "Posts"
    );
    println!("{}", "-".repeat(84));
    for (target, run) in &report.runs {
        match run {
            Ok(run) => {
                println!(
                    "{:<40} {:<8} {:<8} {:<8} {:<8} {:<8}",
                    truncate(target, 40),
                    run.unique,
                    run.succeeded,
                    run.skipped,
                    run.failed,
                    format!("{}/{}", run.posts_succeeded, run.posts_attempted),
                );
                if let Some(diagnostic) = &run.diagnostic {
                    println!("  nothing extracted, page saved to {}", diagnostic.display());
                }
            }
            Err(e) => println!("{:<40} error: {}", truncate(target, 40), e),
        }
    }
    println!("{}", "-".repeat(84));
    println!(
        "Downloaded {} of {} attempted file(s)",
        report.total_succeeded(),
        report.total_attempted()
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
