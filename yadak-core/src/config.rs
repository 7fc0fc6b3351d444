use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::browser::BrowserEngineId;
use crate::error::{ConfigError, Result};

/// Top-level configuration, loaded from a single `yadak.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct YadakConfig {
    pub browser: BrowserSection,
    pub stealth: StealthSection,
    pub sites: SitesSection,
    pub output: OutputSection,
    pub schedule: ScheduleSection,
    pub retry: RetrySection,
}

impl YadakConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: YadakConfig = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.browser.engine_fallback.is_empty() {
            return Err(ConfigError::Invalid(
                "browser.engine_fallback must list at least one engine".to_string(),
            ));
        }
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "schedule time {:02}:{:02} is out of range",
                self.schedule.hour, self.schedule.minute
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    /// Engines tried in order until one survives block verification.
    pub engine_fallback: Vec<BrowserEngineId>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub navigation_timeout_ms: u64,
    /// Randomized pause before first navigation, in milliseconds.
    pub human_delay_ms: [u64; 2],
    pub block_title_markers: Vec<String>,
    pub block_body_markers: Vec<String>,
    pub min_body_length: usize,
    pub executables: ExecutablesSection,
}

/// Optional per-engine executable overrides. When unset, well-known
/// install locations and PATH are searched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutablesSection {
    pub chromium: Option<String>,
    pub chrome: Option<String>,
    pub edge: Option<String>,
}

impl ExecutablesSection {
    pub fn for_engine(&self, engine: BrowserEngineId) -> Option<&str> {
        match engine {
            BrowserEngineId::Chromium => self.chromium.as_deref(),
            BrowserEngineId::Chrome => self.chrome.as_deref(),
            BrowserEngineId::Edge => self.edge.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StealthSection {
    pub user_agent: String,
    pub viewport: [u32; 2],
    pub locale: String,
    pub languages: Vec<String>,
    pub accept_language: Option<String>,
    pub bypass_csp: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SitesSection {
    pub isaco_url: String,
    pub ikcopart_url: String,
    pub stopyadak_url: String,
    /// Pause between scroll bursts while waiting for lazy content.
    pub scroll_wait_ms: u64,
    pub selector_timeout_ms: u64,
    /// Pause between Isaco detail pages.
    pub card_delay_ms: u64,
    /// Upper bound on IKCO pagination, in case the pager is misread.
    pub max_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    pub output_dir: String,
    pub backup_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    pub hour: u32,
    pub minute: u32,
}

/// Bounded retry of the navigation + selector-wait step on a site that
/// loads unreliably. Independent of engine fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    pub max_attempts: usize,
    pub delay_seconds: u64,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<YadakConfig> {
    YadakConfig::from_path(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
