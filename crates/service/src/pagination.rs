//! Pagination utilities for service layer
//!
//! Provides a simple `Pagination` struct, sort order and page metadata.

use serde::Serialize;

/// Largest row offset a page may start at (Postgres `OFFSET` is a bigint).
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Pagination parameters
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    /// 1-based page index
    pub page: u64,
    /// items per page
    pub per_page: u64,
}

impl Pagination {
    /// Clamp to sane defaults; returns the 0-based page index and page size.
    ///
    /// The index is capped so `index * per_page` never exceeds [`MAX_OFFSET`];
    /// pages past the end simply come back empty.
    pub fn normalize(self) -> (u64, u64) {
        let per_page = self.per_page.clamp(1, 100);
        let idx = self.page.saturating_sub(1).min(MAX_OFFSET / per_page);
        (idx, per_page)
    }

    pub fn from_query(page: Option<u64>, per_page: Option<u64>) -> Self {
        let d = Self::default();
        let (idx, per) = Self { page: page.unwrap_or(d.page), per_page: per_page.unwrap_or(d.per_page) }.normalize();
        Self { page: idx + 1, per_page: per }
    }
}

impl Default for Pagination {
    fn default() -> Self { Self { page: 1, per_page: 10 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` (case-insensitive) sorts descending.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, p: Pagination) -> Self {
        let total_pages = if p.per_page == 0 { 0 } else { total.div_ceil(p.per_page) };
        Self { total, page: p.page, per_page: p.per_page, total_pages }
    }
}
