//! Normalization of noisy upstream fields: timestamps and brand names.

pub mod brand;
pub mod dates;

pub use brand::{brand_label_or_unknown, normalize_brand_label};
pub use dates::{
    clean_raw_timestamp, display_instant, is_iso_utc, parse_timestamp, storage_timestamp,
    to_display_instant, to_storage_timestamp, DayBucketKey, NormalizedInstant, ParseStrategy,
    Precision, StorageTimestamp,
};
