use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::browser::{BrowserResult, EngineSession};

/// Scrolls to the bottom until the page height stays unchanged for three
/// rounds, which is how lazy loaders signal they are done.
pub(super) async fn scroll_until_stable(
    session: &mut dyn EngineSession,
    scroll_wait_ms: u64,
) -> BrowserResult<()> {
    let mut prev_height = -1.0f64;
    let mut stable_rounds = 0u32;
    while stable_rounds < 3 {
        session
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        sleep(Duration::from_millis(scroll_wait_ms)).await;
        let height = session
            .evaluate("document.body.scrollHeight")
            .await?
            .as_f64()
            .unwrap_or_default();
        if (height - prev_height).abs() < f64::EPSILON {
            stable_rounds += 1;
        } else {
            stable_rounds = 0;
        }
        prev_height = height;
        debug!(height, stable_rounds, "scrolling for lazy content");
    }
    Ok(())
}
