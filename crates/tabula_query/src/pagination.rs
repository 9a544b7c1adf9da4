//! Offset/limit normalization and page metadata.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use tabula_error::{ConfigError, QueryError, QueryErrorKind, QueryResult};
use tracing::debug;

/// Limits applied to list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size used when the request gives none (or an unusable one)
    default_limit: u64,
    /// Upper bound on the page size
    max_limit: u64,
    /// Offset used when the request gives none
    default_offset: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 1000,
            default_offset: 0,
        }
    }
}

impl PaginationConfig {
    /// Creates a validated configuration.
    pub fn new(default_limit: u64, max_limit: u64, default_offset: u64) -> Result<Self, ConfigError> {
        let config = Self {
            default_limit,
            max_limit,
            default_offset,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::new("pagination.default_limit must be positive"));
        }
        if self.max_limit < self.default_limit {
            return Err(ConfigError::new(format!(
                "pagination.max_limit ({}) is below default_limit ({})",
                self.max_limit, self.default_limit
            )));
        }
        Ok(())
    }
}

/// A normalized `offset`/`limit` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct PageRequest {
    /// Rows skipped
    offset: u64,
    /// Page size, always in `1..=max_limit`
    limit: u64,
}

impl PageRequest {
    /// Builds a window from raw request strings.
    ///
    /// Missing, non-numeric or negative values fall back to the defaults; a
    /// zero limit does too. Limits above the maximum are clamped, even when
    /// they overflow `u64`. An overflowing offset stays out of range.
    pub fn from_params(offset: Option<&str>, limit: Option<&str>, config: &PaginationConfig) -> Self {
        let offset = match parse_count(offset) {
            Count::Value(offset) => offset,
            // Still a valid number, so it must fail the range check later.
            Count::Overflow => u64::MAX,
            Count::Unusable => config.default_offset,
        };
        let limit = match parse_count(limit) {
            Count::Value(0) | Count::Unusable => config.default_limit,
            Count::Value(limit) if limit <= config.max_limit => limit,
            Count::Value(_) | Count::Overflow => {
                debug!(max = config.max_limit, "Clamping page size");
                config.max_limit
            }
        };
        Self { offset, limit }
    }

    /// Builds a window from already numeric values, applying the same rules.
    pub fn new(offset: u64, limit: u64, config: &PaginationConfig) -> Self {
        let limit = match limit {
            0 => config.default_limit,
            l => l.min(config.max_limit),
        };
        Self { offset, limit }
    }

    /// Window of exactly one row, for primary key lookups.
    pub fn single() -> Self {
        Self { offset: 0, limit: 1 }
    }

    /// Derives page metadata from the number of matching rows.
    ///
    /// # Errors
    ///
    /// Returns [`QueryErrorKind::OffsetOutOfRange`] when the offset lies
    /// beyond the last row.
    pub fn page_info(&self, total_rows: u64) -> QueryResult<PageInfo> {
        if self.offset > total_rows {
            return Err(QueryError::new(QueryErrorKind::OffsetOutOfRange {
                offset: self.offset,
                total: total_rows,
            }));
        }
        Ok(PageInfo {
            total_rows,
            page: self.offset / self.limit + 1,
            page_size: self.limit,
            is_first_page: self.offset == 0,
            is_last_page: self.offset.saturating_add(self.limit) >= total_rows,
        })
    }
}

/// Outcome of reading one pagination parameter.
enum Count {
    Value(u64),
    /// All digits, but past `u64::MAX`
    Overflow,
    Unusable,
}

fn parse_count(raw: Option<&str>) -> Count {
    let Some(raw) = raw.map(str::trim) else {
        return Count::Unusable;
    };
    match raw.parse::<u64>() {
        Ok(n) => Count::Value(n),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
            debug!(value = raw, "Pagination value overflows");
            Count::Overflow
        }
        Err(_) => {
            if raw.starts_with('-') {
                debug!(value = raw, "Ignoring negative pagination value");
            } else if !raw.is_empty() {
                debug!(value = raw, "Ignoring non-numeric pagination value");
            }
            Count::Unusable
        }
    }
}

/// Page metadata returned with every list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Rows matching the filter, ignoring the window
    pub total_rows: u64,
    /// 1-based page number, `offset / limit + 1`
    pub page: u64,
    /// Effective page size
    pub page_size: u64,
    /// `offset == 0`
    pub is_first_page: bool,
    /// `offset + limit >= total_rows`
    pub is_last_page: bool,
}
