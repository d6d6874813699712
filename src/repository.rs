use crate::domain::{Record, SourcePlatform};
use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// The platform exposes a reliable record count; pages are enumerated
    /// up to `ceil(total / page_size)`.
    Counted,
    /// No count endpoint; paging continues until a short or empty page.
    OpenEnded,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Record>,
    pub has_more: bool,
}

pub trait RepositoryClient: Send + Sync {
    fn platform(&self) -> SourcePlatform;

    fn pagination(&self) -> Pagination;

    /// Only meaningful for `Pagination::Counted` platforms.
    fn total_pages(&self, query: &str, page_size: u64) -> Result<u64, HarvestError>;

    fn search_page(&self, query: &str, page: u64, page_size: u64) -> Result<Page, HarvestError>;
}
