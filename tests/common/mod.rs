#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use ufo_spider::aggregate::Aggregator;
use ufo_spider::config::CrawlConfig;
use ufo_spider::fetch::StaticFetcher;
use ufo_spider::model::{CompletedRecord, CrawlReport};
use ufo_spider::pipeline::Pipeline;

pub const ROOT: &str = "https://archive.test/webreports/ndxevent.html";
pub const BASE: &str = "https://archive.test/webreports/";

pub fn page_url(relative: &str) -> String {
    format!("{BASE}{relative}")
}

pub fn test_config() -> CrawlConfig {
    let mut config = CrawlConfig::default();
    config.archive.root_url = ROOT.to_string();
    config.archive.link_base = BASE.to_string();
    config.fetch.max_concurrent_requests = 8;
    config.fetch.max_requests_per_domain = 4;
    config
}

pub fn index_page(periods: &[(&str, &str)]) -> String {
    let rows: String = periods
        .iter()
        .map(|(href, label)| {
            format!(r#"<tr valign="TOP"><td><a href="{href}">{label}</a></td><td>3</td></tr>"#)
        })
        .collect();
    format!(
        "<html><body><table><thead><tr><th>Month</th><th>Reports</th></tr></thead>\
         <tbody>{rows}</tbody></table></body></html>"
    )
}

/// One listing table row. `cells` are columns 2..=9: city, state, country,
/// shape, duration, summary, posted, image. Empty strings give empty cells.
pub struct Row<'a> {
    pub link: Option<&'a str>,
    pub date: &'a str,
    pub cells: [&'a str; 8],
}

impl<'a> Row<'a> {
    pub fn linked(link: &'a str, date: &'a str, cells: [&'a str; 8]) -> Self {
        Self {
            link: Some(link),
            date,
            cells,
        }
    }
}

pub fn listing_page(rows: &[Row<'_>]) -> String {
    let body: String = rows
        .iter()
        .map(|row| {
            let first = match row.link {
                Some(href) => format!(r#"<td><a href="{href}">{}</a></td>"#, row.date),
                None => format!("<td>{}</td>", row.date),
            };
            let rest: String = row
                .cells
                .iter()
                .map(|cell| format!("<td>{cell}</td>"))
                .collect();
            format!("<tr>{first}{rest}</tr>")
        })
        .collect();
    format!(
        "<html><body><table><thead><tr><th>Date / Time</th><th>City</th></tr></thead>\
         <tbody>{body}</tbody></table></body></html>"
    )
}

pub fn detail_page(narrative: &str) -> String {
    format!(
        "<html><body><table><tbody>\
         <tr><td><font>Occurred : 1/1/2024 21:00</font></td></tr>\
         <tr><td><font>{narrative}</font></td></tr>\
         </tbody></table></body></html>"
    )
}

pub async fn crawl(fetcher: StaticFetcher) -> Result<(CrawlReport, Vec<CompletedRecord>)> {
    let config = test_config();
    let aggregator = Arc::new(Aggregator::new());
    let pipeline = Pipeline::from_config(fetcher, &config, Arc::clone(&aggregator))?;
    let mut report = pipeline.run(config.root_url()?).await;
    let records = aggregator.drain();
    report.records = records.len();
    Ok((report, records))
}
