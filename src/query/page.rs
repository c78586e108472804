use serde::{Deserialize, Serialize};

use crate::config;

/// `page`/`per_page`/`sort`/`order` query parameters shared by every list
/// endpoint. Sort columns are checked against a per-resource whitelist in
/// [`crate::query::SelectQuery::order`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Requested page size, clamped to the configured maximum.
    pub fn per_page(&self) -> i64 {
        let pagination = &config::config().pagination;
        self.per_page
            .unwrap_or(pagination.default_per_page)
            .clamp(1, pagination.max_per_page)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

/// Standard list envelope: items plus page/per_page/total bookkeeping.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            page: Some(0),
            per_page: Some(-5),
            ..Default::default()
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 1);

        let params = PageParams {
            page: Some(3),
            per_page: Some(10),
            ..Default::default()
        };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn per_page_never_exceeds_configured_max() {
        let params = PageParams {
            page: None,
            per_page: Some(1_000_000),
            ..Default::default()
        };
        assert!(params.per_page() <= crate::config::config().pagination.max_per_page);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Paginated<i32> = Paginated::new(vec![], 1, 25, 0);
        assert_eq!(page.total_pages, 0);

        let page: Paginated<i32> = Paginated::new(vec![], 1, 25, 26);
        assert_eq!(page.total_pages, 2);

        let page: Paginated<i32> = Paginated::new(vec![], 1, 25, 50);
        assert_eq!(page.total_pages, 2);
    }
}
