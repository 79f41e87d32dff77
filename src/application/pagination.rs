//! Page-number pagination shared by every post listing.
//!
//! Listings are sliced into fixed-size pages addressed by a 1-based `page`
//! query parameter. Requests outside the valid range clamp to the first or
//! last page instead of failing, and an empty listing still has one page.

use serde::Serialize;

/// Posts shown per listing page.
pub const POSTS_PER_PAGE: u32 = 10;

/// Page slice resolved against a known row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: u32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(POSTS_PER_PAGE)
    }
}

impl Paginator {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn num_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.per_page)).max(1)
    }

    /// Resolve the raw `page` parameter against `total` rows.
    pub fn window(&self, total: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(total);
        let number = match parse_page_param(requested) {
            RequestedPage::First => 1,
            RequestedPage::Last => num_pages,
            RequestedPage::Number(n) => n.clamp(1, num_pages),
        };

        PageWindow {
            number,
            num_pages,
            total,
            limit: self.per_page,
            offset: (number - 1) * u64::from(self.per_page),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestedPage {
    First,
    Last,
    Number(u64),
}

fn parse_page_param(raw: Option<&str>) -> RequestedPage {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return RequestedPage::First;
    };

    match raw.parse::<i64>() {
        Ok(value) if value < 1 => RequestedPage::First,
        Ok(value) => RequestedPage::Number(value as u64),
        // A numeric value too large for i64 is still past the last page.
        Err(_) if raw.bytes().all(|b| b.is_ascii_digit()) => RequestedPage::Last,
        Err(_) => RequestedPage::First,
    }
}

/// One page of a listing together with its window.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }

    pub fn has_previous(&self) -> bool {
        self.window.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.window.number < self.window.num_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            window: self.window,
        }
    }
}
