pub mod browser;
pub mod config;
pub mod error;
pub mod output;
pub mod schedule;
pub mod scrape;

pub use browser::{
    AcquiredSession, AcquirerConfig, BlockHeuristics, BlockSignal, BrowserAcquirer,
    BrowserEngineId, BrowserError, BrowserResult, CdpDriver, EngineDriver, EngineSession,
    StealthProfile,
};
pub use config::{load_config, YadakConfig};
pub use error::{ConfigError, Result};
pub use output::{current_date_string, CsvExporter, ExportError};
pub use schedule::{next_run_after, DailyScheduler};
pub use scrape::{PartRecord, ScrapeError, ScrapeResult, ScrapeRunner, ScrapeStats, SiteId};
