use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::browser::{BrowserResult, EngineSession};
use crate::config::SitesSection;

use super::dom::scroll_until_stable;
use super::record::{normalize_price, PartRecord};

pub const PREFIX: &str = "ikcopart";

/// Highest page number visible in the WooCommerce pager, or 1.
const TOTAL_PAGES: &str = r#"
(() => {
    let max = 1;
    document.querySelectorAll('.page-numbers a.page-numbers').forEach(a => {
        const n = parseInt((a.innerText || '').trim(), 10);
        if (!isNaN(n) && n > max) {
            max = n;
        }
    });
    return max;
})()
"#;

const EXTRACT_PAIRS: &str = r#"
(() => {
    const names = Array.from(document.querySelectorAll('.wd-entities-title'))
        .map(el => (el.innerText || '').trim());
    const prices = Array.from(document.querySelectorAll('.woocommerce-Price-amount.amount bdi'))
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

/// Scrapes the IKCO Part shop page by page. Each page gets the same
/// scroll-until-stable treatment before extraction.
pub async fn scrape(
    session: &mut dyn EngineSession,
    sites: &SitesSection,
    nav_timeout: Duration,
    date: &str,
) -> BrowserResult<Vec<PartRecord>> {
    session.navigate(&sites.ikcopart_url, nav_timeout).await?;

    let total_pages = session
        .evaluate(TOTAL_PAGES)
        .await?
        .as_u64()
        .unwrap_or(1)
        .clamp(1, sites.max_pages.max(1) as u64) as u32;
    info!(total_pages, "ikcopart pagination detected");

    let mut all_records = Vec::new();
    for page in 1..=total_pages {
        let url = page_url(&sites.ikcopart_url, page);
        if page > 1 {
            session.navigate(&url, nav_timeout).await?;
        }
        info!(page, total_pages, url = %url, "scraping ikcopart page");

        scroll_until_stable(session, sites.scroll_wait_ms).await?;

        let payload = session.evaluate(EXTRACT_PAIRS).await?;
        let mut records = records_from_pairs(payload, &url, date);
        all_records.append(&mut records);
    }
    Ok(all_records)
}

fn page_url(base: &str, page: u32) -> String {
    if page <= 1 {
        base.to_string()
    } else {
        format!("{base}?paged={page}")
    }
}

fn records_from_pairs(payload: serde_json::Value, url: &str, date: &str) -> Vec<PartRecord> {
    let pairs: Vec<RawPair> = match serde_json::from_value(payload) {
        Ok(pairs) => pairs,
        Err(err) => {
            warn!(error = %err, "failed to decode ikcopart rows");
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
    fn first_page_uses_base_url() {
        assert_eq!(
            page_url("https://ikcopart.com/shop/", 1),
            "https://ikcopart.com/shop/"
        );
    }

    #[test]
    fn later_pages_append_paged_query() {
        assert_eq!(
            page_url("https://ikcopart.com/shop/", 3),
            "https://ikcopart.com/shop/?paged=3"
        );
    }

    #[test]
    fn woocommerce_prices_are_normalized() {
        let payload = json!([
            { "name": "سپر جلو پژو ۲۰۶", "price": "۱۲٬۰۰۰٬۰۰۰ تومان" }
        ]);
        let records = records_from_pairs(payload, "https://ikcopart.com/shop/", "2026-08-27");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, "12000000");
    }
}
