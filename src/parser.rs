use crate::config::{ColumnConfig, SelectorConfig};
use crate::extract::{attr_or, joined_text, own_text, parse_selector, text_or};
use crate::model::{ListingRow, NO_IMAGE, UNKNOWN};
use anyhow::{Context, Result};
use scraper::{Html, Selector};

/// Selectors for the three archive page kinds, compiled once per crawl.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    index_link: Selector,
    listing_row: Selector,
    row_link: Selector,
    city: Selector,
    state: Selector,
    country: Selector,
    shape: Selector,
    duration: Selector,
    summary: Selector,
    posted: Selector,
    image: Selector,
    detail_text: Selector,
}

impl PageSelectors {
    pub fn from_config(selectors: &SelectorConfig, columns: &ColumnConfig) -> Result<Self> {
        Ok(Self {
            index_link: parse_selector(&selectors.index_link).context("selectors.index_link")?,
            listing_row: parse_selector(&selectors.listing_row)
                .context("selectors.listing_row")?,
            row_link: parse_selector(&selectors.row_link).context("selectors.row_link")?,
            city: cell_selector(columns.city)?,
            state: cell_selector(columns.state)?,
            country: cell_selector(columns.country)?,
            shape: cell_selector(columns.shape)?,
            duration: cell_selector(columns.duration)?,
            summary: cell_selector(columns.summary)?,
            posted: cell_selector(columns.posted)?,
            image: cell_selector(columns.image)?,
            detail_text: parse_selector(&selectors.detail_text)
                .context("selectors.detail_text")?,
        })
    }
}

fn cell_selector(position: usize) -> Result<Selector> {
    parse_selector(&format!("td:nth-child({position})"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLink {
    pub href: String,
    pub label: String,
}

pub fn parse_index(selectors: &PageSelectors, html: &str) -> Vec<PeriodLink> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    root.select(&selectors.index_link)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.to_string();
            let label = own_text(anchor).unwrap_or_else(|| UNKNOWN.to_string());
            Some(PeriodLink { href, label })
        })
        .collect()
}

pub fn parse_listing(selectors: &PageSelectors, html: &str) -> Vec<ListingRow> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    root.select(&selectors.listing_row)
        .map(|row| ListingRow {
            report_date: text_or(row, &selectors.row_link, UNKNOWN),
            posted_date: text_or(row, &selectors.posted, UNKNOWN),
            city: text_or(row, &selectors.city, UNKNOWN),
            state: text_or(row, &selectors.state, UNKNOWN),
            country: text_or(row, &selectors.country, UNKNOWN),
            shape: text_or(row, &selectors.shape, UNKNOWN),
            duration: text_or(row, &selectors.duration, UNKNOWN),
            summary: text_or(row, &selectors.summary, UNKNOWN),
            image_flag: text_or(row, &selectors.image, NO_IMAGE),
            detail_link: attr_or(row, &selectors.row_link, "href", UNKNOWN),
        })
        .collect()
}

pub fn parse_detail(selectors: &PageSelectors, html: &str) -> String {
    let doc = Html::parse_document(html);
    joined_text(doc.root_element(), &selectors.detail_text)
}
