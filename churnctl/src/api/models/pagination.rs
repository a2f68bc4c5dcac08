//! Pagination types.
//!
//! Two flavors are used: offset-based `skip`/`limit` for admin list endpoints,
//! and page-based pagination for the prediction history view (fixed page size,
//! out-of-range pages resolved rather than rejected).

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Fixed page size for the prediction history view.
pub const HISTORY_PER_PAGE: i64 = 10;

/// Standard pagination parameters for admin API list endpoints.
///
/// The fields deserialize via `DisplayFromStr`: this struct is flattened into
/// query structs, and serde_urlencoded buffers flattened values as strings.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the skip value, defaulting to 0 if not specified.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total_count: i64,
    /// Number of items skipped
    pub skip: i64,
    /// Maximum items returned per page
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }
}

/// Resolve a requested history page against the match count.
///
/// Out-of-range requests never fail: page < 1 behaves as page 1, a page past
/// the end resolves to the last valid page when there are matches, and zero
/// matches resolves to page 1 of 1.
pub fn resolve_page(requested: i64, total_count: i64, per_page: i64) -> (i64, i64) {
    let total_pages = if total_count > 0 {
        (total_count + per_page - 1) / per_page
    } else {
        1
    };
    let page = requested.clamp(1, total_pages);
    (page, total_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_encoded_values_deserialize() {
        // Flattened query values arrive as strings
        let p: Pagination = serde_json::from_value(serde_json::json!({"skip": "10", "limit": "5"})).unwrap();
        assert_eq!(p.skip(), 10);
        assert_eq!(p.limit(), 5);

        let p: Pagination = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(p.skip(), 0);
        assert_eq!(p.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn limit_and_skip_clamping() {
        let p = Pagination {
            skip: Some(-10),
            limit: Some(0),
        };
        assert_eq!(p.skip(), 0);
        assert_eq!(p.limit(), 1);

        let p = Pagination {
            skip: None,
            limit: Some(1000),
        };
        assert_eq!(p.skip(), 0);
        assert_eq!(p.limit(), MAX_LIMIT);

        let p = Pagination::default();
        assert_eq!(p.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn page_below_one_resolves_to_first() {
        assert_eq!(resolve_page(0, 25, 10), (1, 3));
        assert_eq!(resolve_page(-3, 25, 10), (1, 3));
    }

    #[test]
    fn page_past_end_resolves_to_last() {
        assert_eq!(resolve_page(99, 25, 10), (3, 3));
        assert_eq!(resolve_page(3, 30, 10), (3, 3));
        assert_eq!(resolve_page(4, 30, 10), (3, 3));
    }

    #[test]
    fn zero_matches_resolves_to_page_one() {
        assert_eq!(resolve_page(1, 0, 10), (1, 1));
        assert_eq!(resolve_page(7, 0, 10), (1, 1));
    }

    #[test]
    fn exact_multiples_and_remainders() {
        assert_eq!(resolve_page(1, 10, 10), (1, 1));
        assert_eq!(resolve_page(2, 11, 10), (2, 2));
        assert_eq!(resolve_page(2, 20, 10), (2, 2));
    }
}
