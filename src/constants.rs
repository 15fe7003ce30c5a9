//! Shared constants for timestamp normalization, storage and the dashboard

/// Canonical, timezone-naive format written to the ticket store
pub const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of a day bucket key
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Short label shown under a day bucket in the trend chart
pub const DAY_LABEL_FORMAT: &str = "%b %-d";

/// Format used for date cells in the ticket table
pub const TABLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Earliest calendar year a parsed timestamp may carry
pub const MIN_PLAUSIBLE_YEAR: i32 = 2000;

/// How many years past the current one a parsed timestamp may reach
pub const MAX_YEARS_AHEAD: i32 = 2;

/// Text shown wherever a date or grouping value is missing or unparseable
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Status key used when a ticket carries no status
pub const UNKNOWN_STATUS: &str = "unknown";

/// Number of brands shown in the dashboard ranking by default
pub const DEFAULT_TOP_BRANDS: usize = 8;

/// Domain segments kept lowercase when they trail a brand label
pub const BRAND_DOMAIN_SUFFIXES: &[&str] = &["com", "net", "org", "io", "co", "au", "nz", "uk"];

/// English month names and abbreviations, resolved case-insensitively
pub const MONTH_NAMES: &[(&str, u32)] = &[
    ("jan", 1),
    ("january", 1),
    ("feb", 2),
    ("february", 2),
    ("mar", 3),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("may", 5),
    ("jun", 6),
    ("june", 6),
    ("jul", 7),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("oct", 10),
    ("october", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

/// Resolve an English month name or abbreviation to its number
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_lowercase();
    MONTH_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == lower)
        .map(|(_, month)| *month)
}
