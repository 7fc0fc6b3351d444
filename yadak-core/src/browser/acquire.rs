use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::driver::{EngineDriver, EngineSession};
use super::engine::BrowserEngineId;
use super::error::{BrowserError, BrowserResult};
use super::stealth::StealthProfile;

/// Block-page verification heuristics. Deliberately ad-hoc: title marker,
/// body phrase, or a suspiciously short body. A legitimately short page
/// will be misclassified; the next engine gets its chance anyway.
#[derive(Debug, Clone)]
pub struct BlockHeuristics {
    pub title_markers: Vec<String>,
    pub body_markers: Vec<String>,
    pub min_body_length: usize,
}

impl Default for BlockHeuristics {
    fn default() -> Self {
        Self {
            title_markers: vec!["cloudflare".to_string(), "just a moment".to_string()],
            body_markers: vec!["checking your browser".to_string()],
            min_body_length: 1000,
        }
    }
}

impl BlockHeuristics {
    pub fn from_config(section: &BrowserSection) -> Self {
        Self {
            title_markers: section.block_title_markers.clone(),
            body_markers: section.block_body_markers.clone(),
            min_body_length: section.min_body_length,
        }
    }

    /// Title markers fire regardless of body content; the body length
    /// check runs last.
    pub fn inspect(&self, title: &str, body: &str) -> BlockSignal {
        let title_lower = title.to_lowercase();
        for marker in &self.title_markers {
            if title_lower.contains(&marker.to_lowercase()) {
                return BlockSignal::TitleMarker(marker.clone());
            }
        }
        let body_lower = body.to_lowercase();
        for marker in &self.body_markers {
            if body_lower.contains(&marker.to_lowercase()) {
                return BlockSignal::BodyMarker(marker.clone());
            }
        }
        if body.len() < self.min_body_length {
            return BlockSignal::ThinBody(body.len());
        }
        BlockSignal::Clean
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSignal {
    Clean,
    TitleMarker(String),
    BodyMarker(String),
    ThinBody(usize),
}

impl BlockSignal {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, BlockSignal::Clean)
    }
}

impl fmt::Display for BlockSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSignal::Clean => f.write_str("clean"),
            BlockSignal::TitleMarker(marker) => write!(f, "title contains '{marker}'"),
            BlockSignal::BodyMarker(marker) => write!(f, "body contains '{marker}'"),
            BlockSignal::ThinBody(len) => write!(f, "body length {len} below threshold"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    pub fallback: Vec<BrowserEngineId>,
    pub navigation_timeout: Duration,
    pub human_delay_ms: (u64, u64),
    pub heuristics: BlockHeuristics,
}

impl AcquirerConfig {
    pub fn from_config(section: &BrowserSection) -> Self {
        Self {
            fallback: section.engine_fallback.clone(),
            navigation_timeout: Duration::from_millis(section.navigation_timeout_ms),
            human_delay_ms: (section.human_delay_ms[0], section.human_delay_ms[1]),
            heuristics: BlockHeuristics::from_config(section),
        }
    }
}

/// A verified session handed to the caller, who owns it exclusively and
/// is responsible for closing it on every exit path.
pub struct AcquiredSession {
    pub engine: BrowserEngineId,
    pub session: Box<dyn EngineSession>,
}

impl fmt::Debug for AcquiredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredSession")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl AcquiredSession {
    pub async fn close(mut self) {
        if let Err(err) = self.session.close().await {
            debug!(engine = %self.engine, error = %err, "session close reported error");
        }
    }
}

/// Tries each configured engine in priority order until one produces a
/// session that survives block verification. Timeouts, launch failures,
/// and detected blocks all mean the same thing: next engine. Only list
/// exhaustion surfaces to the caller.
pub struct BrowserAcquirer {
    driver: Arc<dyn EngineDriver>,
    profile: StealthProfile,
    config: AcquirerConfig,
}

impl BrowserAcquirer {
    pub fn new(driver: Arc<dyn EngineDriver>, profile: StealthProfile, config: AcquirerConfig) -> Self {
        Self {
            driver,
            profile,
            config,
        }
    }

    pub async fn acquire(&self, url: &str) -> BrowserResult<AcquiredSession> {
        if self.config.fallback.is_empty() {
            return Err(BrowserError::Configuration(
                "engine fallback list is empty".to_string(),
            ));
        }
        for engine in &self.config.fallback {
            info!(engine = %engine, url, "trying engine with stealth profile");
            match self.attempt(*engine, url).await {
                Ok(session) => {
                    info!(engine = %engine, url, "engine passed block verification");
                    return Ok(AcquiredSession {
                        engine: *engine,
                        session,
                    });
                }
                Err(err) => {
                    warn!(engine = %engine, url, error = %err, "engine attempt failed, falling back");
                }
            }
        }
        Err(BrowserError::ExhaustedFallback(url.to_string()))
    }

    async fn attempt(
        &self,
        engine: BrowserEngineId,
        url: &str,
    ) -> BrowserResult<Box<dyn EngineSession>> {
        let mut session = self.driver.launch(engine, &self.profile).await?;
        match self.verify(session.as_mut(), url).await {
            Ok(()) => Ok(session),
            Err(err) => {
                // A broken engine must never block trying the next one.
                if let Err(close_err) = session.close().await {
                    debug!(engine = %engine, error = %close_err, "close failed after failed attempt");
                }
                Err(err)
            }
        }
    }

    async fn verify(&self, session: &mut dyn EngineSession, url: &str) -> BrowserResult<()> {
        session.idle(self.config.human_delay_ms).await?;
        session.navigate(url, self.config.navigation_timeout).await?;
        let title = session.title().await?;
        let body = session.body_text().await?;
        let signal = self.config.heuristics.inspect(&title, &body);
        if signal.is_blocked() {
            return Err(BrowserError::BlockDetected(signal));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_body() -> String {
        "part listing ".repeat(200)
    }

    #[test]
    fn title_marker_fires_regardless_of_body() {
        let heuristics = BlockHeuristics::default();
        let signal = heuristics.inspect("Just a moment...", &long_body());
        assert_eq!(signal, BlockSignal::TitleMarker("just a moment".into()));
        assert!(signal.is_blocked());
    }

    #[test]
    fn body_marker_fires_on_challenge_phrase() {
        let heuristics = BlockHeuristics::default();
        let mut body = long_body();
        body.push_str("Checking your browser before accessing");
        let signal = heuristics.inspect("Shop", &body);
        assert_eq!(
            signal,
            BlockSignal::BodyMarker("checking your browser".into())
        );
    }

    #[test]
    fn thin_body_fires_without_title_match() {
        let heuristics = BlockHeuristics::default();
        let signal = heuristics.inspect("Shop", "almost nothing here");
        assert!(matches!(signal, BlockSignal::ThinBody(len) if len < 1000));
    }

    #[test]
    fn clean_page_passes() {
        let heuristics = BlockHeuristics::default();
        assert_eq!(heuristics.inspect("Shop", &long_body()), BlockSignal::Clean);
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        let heuristics = BlockHeuristics {
            title_markers: vec!["Cloudflare".into()],
            ..BlockHeuristics::default()
        };
        let signal = heuristics.inspect("cloudflare verification", &long_body());
        assert!(signal.is_blocked());
    }
}
