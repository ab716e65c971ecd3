use crate::enums::{Algorithm, TaskStatus};
use crate::task::TaskRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Selection criteria shared by record listing and statistics.
/// Every bound is optional; date bounds are inclusive and apply to `created_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub algorithm: Option<Algorithm>,
    pub status: Option<TaskStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn matches(&self, task: &TaskRecord) -> bool {
        self.algorithm.is_none_or(|a| task.algorithm == a)
            && self.status.is_none_or(|s| task.status == s)
            && self.created_from.is_none_or(|from| task.created_at >= from)
            && self.created_to.is_none_or(|to| task.created_at <= to)
    }
}

/// A validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            records,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total.div_ceil(u64::from(request.page_size.max(1))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest { page: 1, page_size: 20 };
        assert_eq!(Page::<()>::new(vec![], 0, request).total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], 20, request).total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], 21, request).total_pages, 2);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest { page: 1, page_size: 10 }.offset(), 0);
        assert_eq!(PageRequest { page: 3, page_size: 10 }.offset(), 20);
    }
}
