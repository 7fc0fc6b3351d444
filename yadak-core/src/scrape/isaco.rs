use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::browser::{BrowserResult, EngineSession};
use crate::config::SitesSection;

use super::record::{normalize_price, PartRecord};

pub const PREFIX: &str = "isaco";

const CARD_SELECTOR: &str = "div.Parts_partsItem__josVI";
const SHOW_PRICE_BTN: &str = ".MuiButton-containedPrimary";
const TABLE_ROW: &str = "tr.PartsDetails_rowOfTable__vm_Zw";

/// Absolute detail-page links, one per product card.
const COLLECT_CARD_LINKS: &str = r#"
(() => {
    const links = [];
    document.querySelectorAll('div.Parts_partsItem__josVI a[href]').forEach(a => {
        try {
            links.push(new URL(a.getAttribute('href'), location.href).href);
        } catch (_) {}
    });
    return links;
})()
"#;

/// Price-table rows on a detail page: part number, name, brand, price.
const EXTRACT_TABLE_ROWS: &str = r#"
(() => {
    const rows = [];
    document.querySelectorAll('tr.PartsDetails_rowOfTable__vm_Zw').forEach(tr => {
        const tds = tr.querySelectorAll('td');
        if (tds.length >= 4) {
            rows.push({
                part_number: (tds[0].innerText || '').trim(),
                name: (tds[1].innerText || '').trim(),
                brand: (tds[2].innerText || '').trim(),
                price: (tds[3].innerText || '').trim(),
            });
        }
    });
    return rows;
})()
"#;

#[derive(Debug, Deserialize)]
struct RawRow {
    part_number: String,
    name: String,
    brand: String,
    price: String,
}

/// Scrapes Isaco: open the parts catalogue, collect every card's detail
/// link, then walk the detail pages sequentially, revealing the price
/// table on each before extracting its rows.
pub async fn scrape(
    session: &mut dyn EngineSession,
    sites: &SitesSection,
    nav_timeout: Duration,
    date: &str,
) -> BrowserResult<Vec<PartRecord>> {
    let timeout = Duration::from_millis(sites.selector_timeout_ms.max(1));
    session.navigate(&sites.isaco_url, nav_timeout).await?;
    session.wait_for_selector(CARD_SELECTOR, timeout).await?;

    let links: Vec<String> = serde_json::from_value(session.evaluate(COLLECT_CARD_LINKS).await?)
        .unwrap_or_default();
    info!(cards = links.len(), "found isaco product cards");

    let mut all_records = Vec::new();
    let total = links.len();
    for (idx, link) in links.iter().enumerate() {
        match scrape_detail(session, link, nav_timeout, timeout, date).await {
            Ok(mut records) => {
                info!(card = idx + 1, total, rows = records.len(), url = %link, "card extracted");
                all_records.append(&mut records);
            }
            Err(err) => {
                warn!(card = idx + 1, total, url = %link, error = %err, "card failed, skipping");
            }
        }
        // Be gentle between detail pages.
        session.idle((sites.card_delay_ms, sites.card_delay_ms)).await?;
    }
    Ok(all_records)
}

async fn scrape_detail(
    session: &mut dyn EngineSession,
    url: &str,
    nav_timeout: Duration,
    timeout: Duration,
    date: &str,
) -> BrowserResult<Vec<PartRecord>> {
    session.navigate(url, nav_timeout).await?;
    session.wait_for_selector(SHOW_PRICE_BTN, timeout).await?;
    session.click(SHOW_PRICE_BTN).await?;
    session.wait_for_selector(TABLE_ROW, timeout).await?;
    let payload = session.evaluate(EXTRACT_TABLE_ROWS).await?;
    Ok(records_from_rows(payload, url, date))
}

fn records_from_rows(payload: serde_json::Value, url: &str, date: &str) -> Vec<PartRecord> {
    let rows: Vec<RawRow> = match serde_json::from_value(payload) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(error = %err, "failed to decode isaco table rows");
            return Vec::new();
        }
    };
    rows.into_iter()
        .filter_map(|row| {
            let name = row.name.trim().to_string();
            let price = normalize_price(&row.price);
            if name.is_empty() || price.is_empty() {
                return None;
            }
            Some(PartRecord {
                part_number: Some(row.part_number).filter(|s| !s.is_empty()),
                part_name: name,
                brand: Some(row.brand).filter(|s| !s.is_empty()),
                price,
                source_url: url.to_string(),
                scrape_date: date.to_string(),
            })
        })
        .collect()
}
