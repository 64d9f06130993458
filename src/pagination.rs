//! Page parameters and paged results for list endpoints.

use crate::app_config::LimitsConfig;
use crate::error::AtlasError;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, QuerySelect, Select};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageParams {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// One-based page number and a page size clamped to the configured maximum.
    pub fn resolve(&self, limits: &LimitsConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(limits.page_size)
            .clamp(1, limits.max_page_size.max(1));
        (page, page_size)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Rows to skip before `page`. Pages far past the end saturate instead of
/// overflowing and simply come back empty. Databases bind OFFSET as a signed
/// 64-bit integer.
fn offset(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1)
        .saturating_mul(page_size)
        .min(i64::MAX as u64)
}

/// Count the rows matched by `select`, then fetch the requested page.
pub async fn fetch_page<C, E>(
    db: &C,
    select: Select<E>,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<E::Model>, AtlasError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Sync,
{
    let (page, page_size) = params.resolve(limits);
    let count = select.clone().count(db).await?;
    let results = select
        .offset(offset(page, page_size))
        .limit(page_size)
        .all(db)
        .await?;

    Ok(Page {
        count,
        page,
        page_size,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_limits() {
        let limits = LimitsConfig::default();
        assert_eq!(PageParams::default().resolve(&limits), (1, 50));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let limits = LimitsConfig::default();
        assert_eq!(PageParams::new(0, 10_000).resolve(&limits), (1, 500));
        assert_eq!(PageParams::new(3, 0).resolve(&limits), (3, 1));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let limits = LimitsConfig::default();
        let (page, page_size) = PageParams::new(u64::MAX, 10_000).resolve(&limits);
        assert_eq!(offset(page, page_size), i64::MAX as u64);
        assert_eq!(offset(1, page_size), 0);
        assert_eq!(offset(3, 50), 100);
    }

    #[test]
    fn test_map_keeps_counts() {
        let page = Page {
            count: 7,
            page: 2,
            page_size: 3,
            results: vec![1, 2, 3],
        };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.count, 7);
        assert_eq!(mapped.results, vec![10, 20, 30]);
    }
}
