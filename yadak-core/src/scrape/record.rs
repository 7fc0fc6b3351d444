use std::collections::HashSet;

use serde::Serialize;

/// One extracted part row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartRecord {
    pub part_number: Option<String>,
    pub part_name: String,
    pub brand: Option<String>,
    pub price: String,
    pub source_url: String,
    pub scrape_date: String,
}

/// Strips a raw price down to digits. Persian and Arabic-Indic digits are
/// folded to ASCII; separators, currency words, and whitespace drop out.
pub fn normalize_price(raw: &str) -> String {
    raw.chars()
        .filter_map(|ch| match ch {
            '0'..='9' => Some(ch),
            // Extended Arabic-Indic (Persian) digits.
            '\u{06F0}'..='\u{06F9}' => {
                char::from_u32('0' as u32 + (ch as u32 - 0x06F0))
            }
            // Arabic-Indic digits.
            '\u{0660}'..='\u{0669}' => {
                char::from_u32('0' as u32 + (ch as u32 - 0x0660))
            }
            _ => None,
        })
        .collect()
}

/// Drops exact duplicates (keeping first occurrence) and sorts by part
/// name, then price, for stable CSV output.
pub fn dedup_and_sort(records: Vec<PartRecord>) -> Vec<PartRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<PartRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect();
    unique.sort_by(|a, b| {
        a.part_name
            .cmp(&b.part_name)
            .then_with(|| a.price.cmp(&b.price))
    });
    unique
}
