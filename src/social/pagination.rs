use serde::{Deserialize, Serialize};

use crate::config::FeedConfig;
use crate::error::{AppError, AppResult};

/// Offset pagination: page 1 covers `[0, page_size)`, page N covers
/// `[(N-1)*page_size, N*page_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> AppResult<Self> {
        if page == 0 {
            return Err(AppError::BadRequest("page must be at least 1".into()));
        }
        if page_size == 0 {
            return Err(AppError::BadRequest("page_size must be at least 1".into()));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// Query-string form of a page request. `pageSize` is accepted for
/// clients written against the camelCase API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
}

impl PageParams {
    pub fn resolve(&self, feed: &FeedConfig) -> AppResult<PageRequest> {
        let page = self.page.unwrap_or(1);
        let page_size = self
            .page_size
            .unwrap_or(feed.default_page_size)
            .min(feed.max_page_size);
        PageRequest::new(page, page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    /// Total matching items across all pages.
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(req: PageRequest) -> Self {
        Self {
            page: req.page,
            page_size: req.page_size,
            count: 0,
            results: Vec::new(),
        }
    }

    pub fn new(req: PageRequest, count: i64, results: Vec<T>) -> Self {
        Self {
            page: req.page,
            page_size: req.page_size,
            count,
            results,
        }
    }
}
