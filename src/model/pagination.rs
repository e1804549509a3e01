//! Validated pagination parameters.

use crate::error::{Error, Result};

/// Largest page size a client may request.
pub const MAX_LIMIT: i64 = 100;

/// A 1-indexed page request. Construction rejects `page < 1`, `limit < 1`
/// and `limit > MAX_LIMIT`, so the offset is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    limit: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Result<Self> {
        if page < 1 {
            return Err(Error::validation(format!(
                "`page` must be a positive integer, got {}",
                page
            )));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(Error::validation(format!(
                "`limit` must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            )));
        }
        Ok(Self { page, limit })
    }

    /// Parse optional query-string values, falling back to the given defaults
    /// only when a parameter is absent. Present but unparsable values are
    /// rejected.
    pub fn parse(
        page: Option<&str>,
        limit: Option<&str>,
        default_page: i64,
        default_limit: i64,
    ) -> Result<Self> {
        let page = parse_param("page", page, default_page)?;
        let limit = parse_param("limit", limit, default_limit)?;
        Self::new(page, limit)
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    /// SQL LIMIT
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// SQL OFFSET
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_param(name: &str, value: Option<&str>, default: i64) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            Error::validation(format!("`{}` must be an integer, got {:?}", name, raw))
        }),
    }
}
