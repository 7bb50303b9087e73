use serde::Serialize;
use std::path::PathBuf;
use url::Url;

pub const UNKNOWN: &str = "Unknown";
pub const NO_IMAGE: &str = "No";

/// A link discovered on one page together with the context that the page
/// carries forward to the stage that will handle it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowRequest<C> {
    pub url: Url,
    pub context: C,
}

impl<C> FollowRequest<C> {
    pub fn new(url: Url, context: C) -> Self {
        Self { url, context }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodContext {
    pub period_label: String,
}

impl PeriodContext {
    pub fn new(period_label: impl Into<String>) -> Self {
        Self {
            period_label: period_label.into(),
        }
    }

    pub fn merge_row(&self, row: ListingRow) -> ListingContext {
        ListingContext {
            period: self.clone(),
            row,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub report_date: String,
    pub posted_date: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub shape: String,
    pub duration: String,
    pub summary: String,
    pub image_flag: String,
    pub detail_link: String,
}

impl ListingRow {
    pub fn has_link(&self) -> bool {
        self.detail_link != UNKNOWN
    }
}

impl Default for ListingRow {
    fn default() -> Self {
        Self {
            report_date: UNKNOWN.to_string(),
            posted_date: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            state: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            shape: UNKNOWN.to_string(),
            duration: UNKNOWN.to_string(),
            summary: UNKNOWN.to_string(),
            image_flag: NO_IMAGE.to_string(),
            detail_link: UNKNOWN.to_string(),
        }
    }
}

/// Everything known about one report once its listing row has been read.
///
/// Only [`PeriodContext::merge_row`] builds this, and only
/// [`ListingContext::complete`] consumes it, so the inherited fields can
/// never be dropped or rewritten on the way to a [`CompletedRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingContext {
    period: PeriodContext,
    row: ListingRow,
}

impl ListingContext {
    pub fn period(&self) -> &PeriodContext {
        &self.period
    }

    pub fn row(&self) -> &ListingRow {
        &self.row
    }

    pub fn complete(self, free_text: String) -> CompletedRecord {
        CompletedRecord {
            listing: self,
            free_text,
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let row = &self.row;
        vec![
            ("period_label", self.period.period_label.as_str()),
            ("report_date", row.report_date.as_str()),
            ("posted_date", row.posted_date.as_str()),
            ("city", row.city.as_str()),
            ("state", row.state.as_str()),
            ("country", row.country.as_str()),
            ("shape", row.shape.as_str()),
            ("duration", row.duration.as_str()),
            ("summary", row.summary.as_str()),
            ("image_flag", row.image_flag.as_str()),
            ("detail_link", row.detail_link.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRecord {
    listing: ListingContext,
    free_text: String,
}

impl CompletedRecord {
    pub fn period_label(&self) -> &str {
        &self.listing.period.period_label
    }

    pub fn row(&self) -> &ListingRow {
        &self.listing.row
    }

    pub fn free_text(&self) -> &str {
        &self.free_text
    }

    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = self.listing.fields();
        fields.push(("free_text", self.free_text.as_str()));
        fields
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub index_pages: usize,
    pub listing_pages: usize,
    pub listing_rows: usize,
    pub unlinked_rows: usize,
    pub duplicate_requests: usize,
    pub detail_pages: usize,
    pub records: usize,
    pub fetch_failures: usize,
    pub task_failures: usize,
    pub exported_rows: usize,
    pub output: Option<PathBuf>,
}
