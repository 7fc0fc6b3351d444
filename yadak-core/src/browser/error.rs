use thiserror::Error;

use super::acquire::BlockSignal;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("engine launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("block page detected: {0}")]
    BlockDetected(BlockSignal),
    #[error("all engines exhausted for {0}")]
    ExhaustedFallback(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}
