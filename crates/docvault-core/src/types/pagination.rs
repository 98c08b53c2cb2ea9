//! Pagination types for tenant-scoped list queries.

use serde::{Deserialize, Serialize};

/// Default page size.
const DEFAULT_PAGE_SIZE: u64 = 25;
/// Maximum page size.
const MAX_PAGE_SIZE: u64 = 100;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-based).
    #[serde(default = "default_page")]
    pub page: u64,
    /// Number of items per page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl PageRequest {
    /// Create a new page request, clamping out-of-range values.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Page number, never below 1.
    pub fn number(&self) -> u64 {
        self.page.max(1)
    }

    /// Page size within `1..=MAX_PAGE_SIZE`, whatever the raw field holds.
    pub fn size(&self) -> u64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        let offset = (self.number() - 1).saturating_mul(self.size());
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    /// SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.size() as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Current page number (1-based).
    pub page: u64,
    /// Number of items per page.
    pub page_size: u64,
    /// Total number of items across all pages.
    pub total_items: u64,
    /// Total number of pages.
    pub total_pages: u64,
    /// Whether there is a next page.
    pub has_next: bool,
    /// Whether there is a previous page.
    pub has_previous: bool,
}

impl<T> PageResponse<T> {
    /// Build a response for `request` from one page of items and the total count.
    pub fn new(items: Vec<T>, request: &PageRequest, total_items: u64) -> Self {
        let page = request.number();
        let page_size = request.size();
        let total_pages = total_items.div_ceil(page_size).max(1);
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}
