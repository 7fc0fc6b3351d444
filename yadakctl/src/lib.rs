use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use yadak_core::{
    load_config, CdpDriver, DailyScheduler, ScrapeError, ScrapeRunner, ScrapeStats, SiteId,
    YadakConfig,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] yadak_core::ConfigError),
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unknown site: {0}")]
    UnknownSite(String),
    #[error("{failed} of {total} sites failed")]
    PartialFailure { failed: usize, total: usize },
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Vehicle parts price scraper control interface", long_about = None)]
pub struct Cli {
    /// Path to the main yadak.toml
    #[arg(long, default_value = "configs/yadak.toml")]
    pub config: PathBuf,
    /// Override the configured headless setting
    #[arg(long)]
    pub headless: Option<bool>,
    /// Override the configured output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape a single site
    Run {
        /// Site to scrape (isaco, ikcopart, stopyadak)
        site: String,
    },
    /// Scrape every configured site sequentially
    RunAll,
    /// Stay resident and scrape all sites at the configured daily time
    Schedule,
    /// List the supported sites
    Sites,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Sites = cli.command {
        let listing = SiteListing::new();
        render(&listing, cli.format)?;
        return Ok(());
    }

    let config = load_effective_config(&cli)?;
    let driver = Arc::new(CdpDriver::new(config.browser.clone()));
    let runner = ScrapeRunner::new(config.clone(), driver);

    match &cli.command {
        Commands::Run { site } => {
            let site: SiteId = site
                .parse()
                .map_err(|_| AppError::UnknownSite(site.clone()))?;
            let stats = runner.run_site(site).await?;
            render(&stats, cli.format)?;
        }
        Commands::RunAll => {
            let report = run_all(&runner).await;
            render(&report, cli.format)?;
            let failed = report.failed_count();
            if failed > 0 {
                return Err(AppError::PartialFailure {
                    failed,
                    total: report.sites.len(),
                });
            }
        }
        Commands::Schedule => {
            let scheduler = DailyScheduler::new(&config.schedule);
            let runner_ref = &runner;
            let format = cli.format;
            scheduler
                .run(move || async move {
                    let report = run_all(runner_ref).await;
                    if let Err(err) = render(&report, format) {
                        tracing::error!(error = %err, "failed to render run report");
                    }
                })
                .await;
        }
        Commands::Sites | Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn load_effective_config(cli: &Cli) -> Result<YadakConfig> {
    let mut config = load_config(&cli.config)?;
    if let Some(headless) = cli.headless {
        config.browser.headless = headless;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.to_string_lossy().into_owned();
    }
    Ok(config)
}

async fn run_all(runner: &ScrapeRunner) -> RunReport {
    let results = runner.run_all().await;
    let sites = results
        .into_iter()
        .map(|(site, result)| match result {
            Ok(stats) => SiteOutcome {
                site: site.to_string(),
                stats: Some(stats),
                error: None,
            },
            Err(err) => SiteOutcome {
                site: site.to_string(),
                stats: None,
                error: Some(err.to_string()),
            },
        })
        .collect();
    RunReport { sites }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub sites: Vec<SiteOutcome>,
}

impl RunReport {
    fn failed_count(&self) -> usize {
        self.sites.iter().filter(|s| s.error.is_some()).count()
    }
}

#[derive(Debug, Serialize)]
pub struct SiteOutcome {
    pub site: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ScrapeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DisplayFallback for ScrapeStats {
    fn display(&self) -> String {
        let engine = self.engine.as_deref().unwrap_or("-");
        let csv = self
            .csv_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<no rows>".to_string());
        format!(
            "{site} | engine={engine} | rows={rows} | csv={csv} | {secs}s",
            site = self.site,
            rows = self.rows,
            secs = self.duration_secs,
        )
    }
}

impl DisplayFallback for RunReport {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for outcome in &self.sites {
            match (&outcome.stats, &outcome.error) {
                (Some(stats), _) => lines.push(stats.display()),
                (None, Some(err)) => lines.push(format!("{} | FAILED: {err}", outcome.site)),
                (None, None) => lines.push(format!("{} | no result", outcome.site)),
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct SiteListing {
    pub sites: Vec<SiteInfo>,
}

#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub description: String,
}

impl SiteListing {
    fn new() -> Self {
        let sites = SiteId::ALL
            .iter()
            .map(|site| SiteInfo {
                name: site.to_string(),
                description: site.description().to_string(),
            })
            .collect();
        Self { sites }
    }
}

impl DisplayFallback for SiteListing {
    fn display(&self) -> String {
        self.sites
            .iter()
            .map(|site| format!("{} — {}", site.name, site.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
