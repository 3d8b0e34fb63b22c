use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// A 1-based page request. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Lenient parsing of query-string values: missing, zero or non-numeric
    /// input falls back to the defaults.
    pub fn from_query(page: Option<&str>, per_page: Option<&str>) -> Self {
        let parse = |value: Option<&str>| {
            value
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|parsed| *parsed > 0)
        };
        Self::new(
            parse(page).unwrap_or(1),
            parse(per_page).unwrap_or(DEFAULT_PER_PAGE),
        )
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Cut one page out of an already ordered result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let data = items
            .into_iter()
            .skip(self.offset())
            .take(self.per_page)
            .collect();
        Page {
            data,
            pagination: Pagination {
                page: self.page,
                per_page: self.per_page,
                total,
                total_pages: total.div_ceil(self.per_page),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
