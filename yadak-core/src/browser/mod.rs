mod acquire;
mod driver;
mod engine;
mod error;
mod stealth;

pub use acquire::{AcquiredSession, AcquirerConfig, BlockHeuristics, BlockSignal, BrowserAcquirer};
pub use driver::{CdpDriver, EngineDriver, EngineSession};
pub use engine::BrowserEngineId;
pub use error::{BrowserError, BrowserResult};
pub use stealth::StealthProfile;
