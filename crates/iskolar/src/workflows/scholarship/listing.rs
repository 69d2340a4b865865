//! Filtering, ordering, and paging for the administrator's application table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationRecord, ApplicationStatus};

pub const DEFAULT_PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum StatusFilter {
    #[default]
    All,
    Only(ApplicationStatus),
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            other => ApplicationStatus::parse(other).map(Self::Only),
        }
    }

    fn matches(self, status: ApplicationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

/// Search, date range, and status criteria. Empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub submitted_from: Option<NaiveDate>,
    #[serde(default)]
    pub submitted_to: Option<NaiveDate>,
    #[serde(default)]
    pub status: StatusFilter,
}

impl ApplicationFilter {
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        self.matches_search(record) && self.matches_dates(record) && self.status.matches(record.status)
    }

    fn matches_search(&self, record: &ApplicationRecord) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => needle.to_lowercase(),
            _ => return true,
        };
        let applicant = &record.applicant;
        let haystack = format!(
            "{} {} {} {}",
            applicant.first_name, applicant.last_name, applicant.barangay, applicant.school
        )
        .to_lowercase();
        haystack.contains(&needle)
    }

    /// Inclusive on both ends, compared on the UTC calendar date.
    fn matches_dates(&self, record: &ApplicationRecord) -> bool {
        let submitted = record.submitted_at.date_naive();
        self.submitted_from.map_or(true, |from| submitted >= from)
            && self.submitted_to.map_or(true, |to| submitted <= to)
    }
}

/// Applies the filter and orders by submission time, newest first.
/// Records with equal timestamps keep their input order.
pub fn filter_and_sort<'a>(
    records: &'a [ApplicationRecord],
    filter: &ApplicationFilter,
) -> Vec<&'a ApplicationRecord> {
    let mut selected: Vec<&ApplicationRecord> =
        records.iter().filter(|record| filter.matches(record)).collect();
    selected.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    selected
}

/// One page of results along with the navigation figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Slices `items` to the requested 1-based page, clamped into range.
/// A page size of zero is treated as one.
pub fn paginate<T>(items: Vec<T>, requested_page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let page = requested_page.clamp(1, total_pages.max(1));
    let start = (page - 1) * page_size;

    let items = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
        has_next: page < total_pages,
        has_previous: page > 1,
    }
}
