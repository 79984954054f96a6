//! Dashboard query over job records: filters, ordering and pagination.

use serde::{Deserialize, Serialize};

use crate::job::{JobRecord, JobStatus};

/// Records per dashboard page.
pub const PAGE_SIZE: u32 = 10;

/// Filter + page selection for listing job records.
///
/// Results are always ordered by priority (descending), then creation time
/// (descending), then id (descending) as a tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub priority: Option<i32>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            page: 1,
            per_page: PAGE_SIZE,
        }
    }
}

impl JobQuery {
    pub fn new(status: Option<JobStatus>, priority: Option<i32>, page: Option<u32>) -> Self {
        Self {
            status,
            priority,
            page: page.unwrap_or(1).max(1),
            per_page: PAGE_SIZE,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }

    /// Whether a record passes the filters.
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.status.is_none_or(|s| record.status == s)
            && self.priority.is_none_or(|p| record.priority == p)
    }

    /// Dashboard ordering: priority desc, created_at desc, id desc.
    pub fn sort(records: &mut [JobRecord]) {
        records.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of matching records across all pages.
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, query: &JobQuery) -> Self {
        Self {
            items,
            total,
            page: query.page,
            per_page: query.per_page,
        }
    }

    /// Last page number (at least 1, even with no results).
    pub fn last_page(&self) -> u32 {
        if self.total == 0 || self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.last_page()
    }
}
