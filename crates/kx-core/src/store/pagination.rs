//! Offset pagination for incident queries.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// 1-indexed page request. Values are clamped on construction so handlers
/// never have to re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Builds from optional query parameters, falling back to defaults.
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self::new(
            page.unwrap_or(1),
            per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) as usize).saturating_mul(self.per_page as usize)
    }

    pub fn limit(&self) -> usize {
        self.per_page as usize
    }

    pub fn total_pages(&self, total_items: u64) -> u32 {
        if total_items == 0 {
            return 1;
        }
        total_items.div_ceil(self.per_page as u64) as u32
    }
}

/// One page of results plus the numbers needed to render pager controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages(total),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_out_of_range_values() {
        let p = Pagination::new(0, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);

        let p = Pagination::new(3, 10_000);
        assert_eq!(p.page, 3);
        assert_eq!(p.per_page, MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_and_limit() {
        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
        assert_eq!(Pagination::default().offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up_and_handles_empty() {
        let p = Pagination::new(1, 50);
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(50), 1);
        assert_eq!(p.total_pages(51), 2);
        assert_eq!(p.total_pages(101), 3);
    }

    #[test]
    fn paginated_result_pager_flags() {
        let p = Pagination::new(1, 2);
        let result = PaginatedResult::new(vec![1, 2], 5, &p);
        assert_eq!(result.total_pages, 3);
        assert!(result.has_next_page());

        let last = PaginatedResult::new(vec![5], 5, &Pagination::new(3, 2));
        assert!(!last.has_next_page());
    }
}
