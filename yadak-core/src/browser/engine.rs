use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{BrowserError, BrowserResult};

/// One supported browser engine. The driver stack speaks CDP, so the
/// closed set covers the Chromium family; fallback order comes from the
/// configured list, not from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineId {
    Chromium,
    Chrome,
    Edge,
}

impl BrowserEngineId {
    /// Well-known install locations and PATH names, probed in order when
    /// no explicit executable override is configured.
    pub fn executable_candidates(&self) -> &'static [&'static str] {
        match self {
            BrowserEngineId::Chromium => &[
                "chromium",
                "chromium-browser",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
            ],
            BrowserEngineId::Chrome => &[
                "google-chrome",
                "google-chrome-stable",
                "/usr/bin/google-chrome",
                "/opt/google/chrome/chrome",
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            ],
            BrowserEngineId::Edge => &[
                "microsoft-edge",
                "microsoft-edge-stable",
                "/usr/bin/microsoft-edge",
                "/opt/microsoft/msedge/msedge",
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            ],
        }
    }

    /// Resolves the executable for this engine. An override is taken
    /// verbatim; otherwise candidates are checked on disk and on PATH.
    /// A missing binary is a launch failure, which triggers fallback.
    pub fn resolve_executable(&self, override_path: Option<&str>) -> BrowserResult<PathBuf> {
        if let Some(path) = override_path {
            return Ok(PathBuf::from(path));
        }
        for candidate in self.executable_candidates() {
            let path = Path::new(candidate);
            if path.is_absolute() {
                if path.exists() {
                    return Ok(path.to_path_buf());
                }
            } else if let Ok(found) = which::which(candidate) {
                return Ok(found);
            }
        }
        Err(BrowserError::Launch(format!(
            "no executable found for engine {self}"
        )))
    }
}

impl fmt::Display for BrowserEngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BrowserEngineId::Chromium => "chromium",
            BrowserEngineId::Chrome => "chrome",
            BrowserEngineId::Edge => "edge",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for BrowserEngineId {
    type Err = BrowserError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "chromium" => Ok(BrowserEngineId::Chromium),
            "chrome" | "google-chrome" => Ok(BrowserEngineId::Chrome),
            "edge" | "msedge" => Ok(BrowserEngineId::Edge),
            other => Err(BrowserError::Configuration(format!(
                "invalid browser engine: {other}"
            ))),
        }
    }
}
