//! Capacity accounting for the document store.

use serde::{Deserialize, Serialize};

/// Default ceiling: 5 MiB, the usual browser local-storage quota.
pub const DEFAULT_CAPACITY: u64 = 5 * 1024 * 1024;

const WARNING_PERCENT: f64 = 60.0;
const DANGER_PERCENT: f64 = 80.0;

/// Byte cost of one entry: key plus stored JSON text.
pub(crate) fn entry_cost(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// Storage pressure bucket shown next to the usage figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Normal,
    Warning,
    Danger,
}

/// Current usage of a document store.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocStoreUsage {
    pub used_bytes: u64,
    pub max_bytes: u64,
    pub percentage: f64,
}

impl DocStoreUsage {
    pub fn new(used_bytes: u64, max_bytes: u64) -> Self {
        let percentage = if max_bytes == 0 {
            100.0
        } else {
            used_bytes as f64 / max_bytes as f64 * 100.0
        };
        Self {
            used_bytes,
            max_bytes,
            percentage,
        }
    }

    /// `Warning` above 60%, `Danger` above 80%.
    pub fn level(&self) -> UsageLevel {
        if self.percentage > DANGER_PERCENT {
            UsageLevel::Danger
        } else if self.percentage > WARNING_PERCENT {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        }
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.max_bytes.saturating_sub(self.used_bytes)
    }
}

/// Human-readable size: `512 B`, `1.5 KB`, `3.60 MB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.2} MB", b / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_thresholds() {
        assert_eq!(DocStoreUsage::new(50, 100).level(), UsageLevel::Normal);
        assert_eq!(DocStoreUsage::new(60, 100).level(), UsageLevel::Normal);
        assert_eq!(DocStoreUsage::new(61, 100).level(), UsageLevel::Warning);
        assert_eq!(DocStoreUsage::new(80, 100).level(), UsageLevel::Warning);
        assert_eq!(DocStoreUsage::new(81, 100).level(), UsageLevel::Danger);
    }

    #[test]
    fn zero_capacity_is_full() {
        let usage = DocStoreUsage::new(0, 0);
        assert_eq!(usage.level(), UsageLevel::Danger);
        assert_eq!(usage.remaining_bytes(), 0);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(DEFAULT_CAPACITY), "5.00 MB");
    }

    #[test]
    fn entry_cost_counts_key_and_value() {
        assert_eq!(entry_cost("editor_mode", "true"), 15);
    }
}
