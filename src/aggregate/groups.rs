use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_STATUS;
use crate::normalize::brand_label_or_unknown;
use crate::types::TicketRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandCount {
    pub brand: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

/// Tickets per normalized brand label, most frequent first.
///
/// Ties keep the order in which brands were first encountered.
pub fn group_by_brand(records: &[TicketRecord]) -> Vec<BrandCount> {
    rank(records.iter().map(|record| brand_label_or_unknown(record.brand.as_deref())))
        .into_iter()
        .map(|(brand, count)| BrandCount { brand, count })
        .collect()
}

/// The `limit` most frequent brands
pub fn top_brands(records: &[TicketRecord], limit: usize) -> Vec<BrandCount> {
    let mut brands = group_by_brand(records);
    brands.truncate(limit);
    brands
}

/// Tickets per status, independent of any timestamp
pub fn count_by_status(records: &[TicketRecord]) -> Vec<StatusCount> {
    rank(records.iter().map(|record| status_key(record.status.as_deref())))
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

/// Status grouping key: trimmed and lowercased
pub fn status_key(status: Option<&str>) -> String {
    match status.map(str::trim) {
        Some(status) if !status.is_empty() => status.to_lowercase(),
        _ => UNKNOWN_STATUS.to_string(),
    }
}

fn rank(labels: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for label in labels {
        match positions.get(&label) {
            Some(&index) => counts[index].1 += 1,
            None => {
                positions.insert(label.clone(), counts.len());
                counts.push((label, 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
