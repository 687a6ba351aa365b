//! Pagination utilities
//!
//! Search uses 1-indexed pages; the dish listing uses raw limit/offset for
//! backward-compatible consumers. Both clamp the limit.

use serde::Serialize;

/// Default page size for search and listings
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page size a client may request
pub const MAX_LIMIT: i64 = 100;

/// Sanitized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub limit: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Pagination metadata returned to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// Clamp a requested limit into `1..=max`, using `default` when absent
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

/// Calculate pagination from the requested page and limit
///
/// # Examples
/// ```
/// use pairing_server::pagination::calculate_pagination;
///
/// let p = calculate_pagination(Some(3), Some(20));
/// assert_eq!(p.offset, 40);
///
/// // Out-of-range values are clamped
/// let p = calculate_pagination(Some(0), Some(1000));
/// assert_eq!(p.page, 1);
/// assert_eq!(p.limit, 100);
/// ```
pub fn calculate_pagination(page: Option<i64>, limit: Option<i64>) -> Pagination {
    let page = page.unwrap_or(1).max(1);
    let limit = clamp_limit(limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = (page - 1).saturating_mul(limit);

    Pagination {
        page,
        limit,
        offset,
    }
}

impl Pagination {
    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            page: self.page,
            limit: self.limit,
            total,
        }
    }
}
