use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::{BrowserResult, EngineSession};
use crate::config::{RetrySection, SitesSection};

use super::dom::scroll_until_stable;
use super::record::{normalize_price, PartRecord};

pub const PREFIX: &str = "sapia_stopyadak";

const PART_NAME_SELECTOR: &str = ".ti-pr";
const PRICE_SELECTOR: &str = ".p-tx-num";

const EXTRACT_PAIRS: &str = r#"
(() => {
    const names = Array.from(document.querySelectorAll('.ti-pr'))
        .map(el => (el.innerText || '').trim());
    const prices = Array.from(document.querySelectorAll('.p-tx-num'))
        .map(el => (el.innerText || '').trim());
    const rows = [];
    const count = Math.min(names.length, prices.length);
    for (let i = 0; i < count; i++) {
        rows.push({ name: names[i], price: prices[i] });
    }
    return rows;
})()
"#;

#[derive(Debug, Deserialize)]
struct RawPair {
    name: String,
    price: String,
}

/// Scrapes the Stopyadak new-products listing: load with bounded retry,
/// scroll until lazy loading settles, pair names with prices 1:1.
/// Navigation runs under the long browser timeout; selector waits get the
/// shorter one.
pub async fn scrape(
    session: &mut dyn EngineSession,
    sites: &SitesSection,
    retry: &RetrySection,
    nav_timeout: Duration,
    date: &str,
) -> BrowserResult<Vec<PartRecord>> {
    let url = &sites.stopyadak_url;
    let selector_timeout = Duration::from_millis(sites.selector_timeout_ms.max(1));

    load_with_retry(session, url, nav_timeout, selector_timeout, retry).await?;
    scroll_until_stable(session, sites.scroll_wait_ms).await?;

    let payload = session.evaluate(EXTRACT_PAIRS).await?;
    let records = records_from_pairs(payload, url, date);
    info!(rows = records.len(), url, "stopyadak extraction finished");
    Ok(records)
}

/// The listing page loads unreliably; retry the navigation and selector
/// waits a bounded number of times before giving up.
async fn load_with_retry(
    session: &mut dyn EngineSession,
    url: &str,
    nav_timeout: Duration,
    selector_timeout: Duration,
    retry: &RetrySection,
) -> BrowserResult<()> {
    let attempts = retry.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        let result = async {
            session.navigate(url, nav_timeout).await?;
            session
                .wait_for_selector(PART_NAME_SELECTOR, selector_timeout)
                .await?;
            session
                .wait_for_selector(PRICE_SELECTOR, selector_timeout)
                .await
        }
        .await;
        match result {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(attempt, attempts, url, error = %err, "stopyadak load failed");
                last_err = Some(err);
                if attempt < attempts {
                    sleep(Duration::from_secs(retry.delay_seconds)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        crate::browser::BrowserError::Unexpected("retry loop made no attempts".to_string())
    }))
}

fn records_from_pairs(payload: serde_json::Value, url: &str, date: &str) -> Vec<PartRecord> {
    let pairs: Vec<RawPair> = match serde_json::from_value(payload) {
        Ok(pairs) => pairs,
        Err(err) => {
            warn!(error = %err, "failed to decode stopyadak rows");
            return Vec::new();
        }
    };
    pairs
        .into_iter()
        .filter_map(|pair| {
            let name = pair.name.trim().to_string();
            let price = normalize_price(&pair.price);
            if name.is_empty() || price.is_empty() {
                return None;
            }
            Some(PartRecord {
                part_number: None,
                part_name: name,
                brand: None,
                price,
                source_url: url.to_string(),
                scrape_date: date.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pairs_become_records_with_clean_prices() {
        let payload = json!([
            { "name": "لنت ترمز جلو", "price": "۲٬۵۰۰٬۰۰۰ ریال" },
            { "name": "فیلتر روغن", "price": "350,000" },
        ]);
        let records = records_from_pairs(payload, "https://stopyadak.com/x", "2026-08-27");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].price, "2500000");
        assert_eq!(records[1].price, "350000");
        assert_eq!(records[0].scrape_date, "2026-08-27");
    }

    #[test]
    fn rows_without_name_or_price_are_skipped() {
        let payload = json!([
            { "name": "", "price": "100" },
            { "name": "واشر", "price": "تماس" },
            { "name": "واشر سرسیلندر", "price": "9000" },
        ]);
        let records = records_from_pairs(payload, "https://stopyadak.com/x", "2026-08-27");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].part_name, "واشر سرسیلندر");
    }

    #[test]
    fn malformed_payload_yields_no_records() {
        let records = records_from_pairs(json!("nonsense"), "u", "d");
        assert!(records.is_empty());
    }

    #[derive(Default)]
    struct RecordingSession {
        navigations: Vec<Duration>,
        selector_waits: Vec<Duration>,
    }

    #[async_trait::async_trait(?Send)]
    impl EngineSession for RecordingSession {
        async fn navigate(&mut self, _url: &str, timeout: Duration) -> BrowserResult<()> {
            self.navigations.push(timeout);
            Ok(())
        }

        async fn title(&mut self) -> BrowserResult<String> {
            Ok(String::new())
        }

        async fn body_text(&mut self) -> BrowserResult<String> {
            Ok(String::new())
        }

        async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value> {
            if script.contains("scrollTo") {
                return Ok(serde_json::Value::Null);
            }
            if script.contains("scrollHeight") {
                return Ok(json!(500.0));
            }
            Ok(json!([]))
        }

        async fn click(&mut self, _selector: &str) -> BrowserResult<()> {
            Ok(())
        }

        async fn wait_for_selector(
            &mut self,
            _selector: &str,
            timeout: Duration,
        ) -> BrowserResult<()> {
            self.selector_waits.push(timeout);
            Ok(())
        }

        async fn idle(&mut self, _range_ms: (u64, u64)) -> BrowserResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> BrowserResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn navigation_gets_the_long_timeout_and_selectors_the_short_one() {
        let mut session = RecordingSession::default();
        let sites = SitesSection {
            isaco_url: "https://www.isaco.ir".into(),
            ikcopart_url: "https://ikcopart.com/shop/".into(),
            stopyadak_url: "https://stopyadak.com/Products/NewProducts".into(),
            scroll_wait_ms: 0,
            selector_timeout_ms: 30_000,
            card_delay_ms: 0,
            max_pages: 1,
        };
        let retry = RetrySection {
            max_attempts: 1,
            delay_seconds: 0,
        };
        let nav_timeout = Duration::from_millis(90_000);

        let records = scrape(&mut session, &sites, &retry, nav_timeout, "2026-08-27")
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(session.navigations, vec![nav_timeout]);
        assert!(!session.selector_waits.is_empty());
        assert!(session
            .selector_waits
            .iter()
            .all(|t| *t == Duration::from_millis(30_000)));
    }
}
