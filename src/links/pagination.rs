use serde::Serialize;

/// Links shown per vault page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Window into a user's link list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number, as requested (not clamped to `total_pages`)
    pub number: u64,
    pub offset: usize,
    pub limit: usize,
    /// Never less than 1, even for an empty list
    pub total_pages: u64,
}

impl Page {
    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

/// Computes the offset/limit window for `page` and the total page count.
///
/// Page numbers below 1 are treated as 1. Pages past the end are kept as-is
/// and produce an empty window.
pub fn paginate(total_count: usize, page: u64, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let number = page.max(1);

    let offset = usize::try_from(number - 1)
        .unwrap_or(usize::MAX)
        .saturating_mul(page_size);
    let total_pages = (total_count as u64).div_ceil(page_size as u64).max(1);

    Page {
        number,
        offset,
        limit: page_size,
        total_pages,
    }
}

/// Parses the `page` query value; anything that is not a positive integer
/// falls back to 1.
pub fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}
