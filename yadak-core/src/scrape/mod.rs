mod dom;
mod ikcopart;
mod isaco;
mod record;
mod stopyadak;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::browser::{
    AcquirerConfig, BrowserAcquirer, BrowserError, EngineDriver, StealthProfile,
};
use crate::config::YadakConfig;
use crate::output::{current_date_string, CsvExporter, ExportError};

pub use record::{dedup_and_sort, normalize_price, PartRecord};

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteId {
    Isaco,
    Ikcopart,
    Stopyadak,
}

impl SiteId {
    pub const ALL: [SiteId; 3] = [SiteId::Isaco, SiteId::Ikcopart, SiteId::Stopyadak];

    pub fn description(&self) -> &'static str {
        match self {
            SiteId::Isaco => "Isaco.ir vehicle parts and prices (7200+ rows)",
            SiteId::Ikcopart => "ikcopart.com vehicle parts and prices",
            SiteId::Stopyadak => "stopyadak.com Saipa vehicle parts and prices",
        }
    }

    fn csv_prefix(&self) -> &'static str {
        match self {
            SiteId::Isaco => isaco::PREFIX,
            SiteId::Ikcopart => ikcopart::PREFIX,
            SiteId::Stopyadak => stopyadak::PREFIX,
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SiteId::Isaco => "isaco",
            SiteId::Ikcopart => "ikcopart",
            SiteId::Stopyadak => "stopyadak",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for SiteId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "isaco" => Ok(SiteId::Isaco),
            "ikcopart" | "ikco" => Ok(SiteId::Ikcopart),
            "stopyadak" | "saipa" | "sapia" => Ok(SiteId::Stopyadak),
            other => Err(format!("unknown site: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ScrapeStats {
    pub site: String,
    pub engine: Option<String>,
    pub rows: usize,
    pub csv_path: Option<PathBuf>,
    pub duration_secs: u64,
}

/// Runs site scrapes end to end: acquire a verified session, extract,
/// export, and release the session on every exit path.
pub struct ScrapeRunner {
    acquirer: BrowserAcquirer,
    exporter: CsvExporter,
    config: YadakConfig,
}

impl ScrapeRunner {
    pub fn new(config: YadakConfig, driver: Arc<dyn EngineDriver>) -> Self {
        let profile = StealthProfile::from_config(&config.stealth);
        let acquirer_config = AcquirerConfig::from_config(&config.browser);
        let acquirer = BrowserAcquirer::new(driver, profile, acquirer_config);
        let exporter = CsvExporter::new(&config.output);
        Self {
            acquirer,
            exporter,
            config,
        }
    }

    pub async fn run_site(&self, site: SiteId) -> ScrapeResult<ScrapeStats> {
        let start = Instant::now();
        let date = current_date_string();
        let url = self.start_url(site);

        // No session means no scrape for this site; the acquirer has
        // already tried every engine.
        let mut acquired = self.acquirer.acquire(url).await?;
        let engine = acquired.engine;
        let nav_timeout = Duration::from_millis(self.config.browser.navigation_timeout_ms);

        let extraction = match site {
            SiteId::Isaco => {
                isaco::scrape(acquired.session.as_mut(), &self.config.sites, nav_timeout, &date)
                    .await
            }
            SiteId::Ikcopart => {
                ikcopart::scrape(acquired.session.as_mut(), &self.config.sites, nav_timeout, &date)
                    .await
            }
            SiteId::Stopyadak => {
                stopyadak::scrape(
                    acquired.session.as_mut(),
                    &self.config.sites,
                    &self.config.retry,
                    nav_timeout,
                    &date,
                )
                .await
            }
        };
        // Release the engine before reporting the outcome, even when
        // extraction failed.
        acquired.close().await;
        // Reported row counts match the CSV, not the raw extraction.
        let records = dedup_and_sort(extraction?);

        let rows = records.len();
        let csv_path = self.exporter.save(records, site.csv_prefix(), &date)?;
        let stats = ScrapeStats {
            site: site.to_string(),
            engine: Some(engine.to_string()),
            rows,
            csv_path,
            duration_secs: start.elapsed().as_secs(),
        };
        info!(
            site = %stats.site,
            engine = %engine,
            rows = stats.rows,
            duration = stats.duration_secs,
            "site scrape finished"
        );
        Ok(stats)
    }

    /// Runs every site sequentially. A failed site is logged and does not
    /// stop the rest of the run.
    pub async fn run_all(&self) -> Vec<(SiteId, ScrapeResult<ScrapeStats>)> {
        let mut results = Vec::with_capacity(SiteId::ALL.len());
        for site in SiteId::ALL {
            let result = self.run_site(site).await;
            if let Err(err) = &result {
                warn!(site = %site, error = %err, "site scrape failed");
            }
            results.push((site, result));
        }
        results
    }

    fn start_url(&self, site: SiteId) -> &str {
        match site {
            SiteId::Isaco => &self.config.sites.isaco_url,
            SiteId::Ikcopart => &self.config.sites.ikcopart_url,
            SiteId::Stopyadak => &self.config.sites.stopyadak_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_names_round_trip() {
        for site in SiteId::ALL {
            let parsed: SiteId = site.to_string().parse().unwrap();
            assert_eq!(parsed, site);
        }
    }

    #[test]
    fn site_aliases_parse() {
        assert_eq!("saipa".parse::<SiteId>().unwrap(), SiteId::Stopyadak);
        assert_eq!("ikco".parse::<SiteId>().unwrap(), SiteId::Ikcopart);
        assert!("amazon".parse::<SiteId>().is_err());
    }
}
