use crate::export::ExportFormat;
use crate::parser::PageSelectors;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlConfig {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<()> {
        self.root_url()?;
        if self.archive.link_base.trim().is_empty() {
            bail!("archive.link_base must not be empty");
        }
        if self.fetch.max_concurrent_requests == 0 {
            bail!("fetch.max_concurrent_requests must be at least 1");
        }
        if self.fetch.max_requests_per_domain == 0 {
            bail!("fetch.max_requests_per_domain must be at least 1");
        }
        self.columns.validate()?;
        PageSelectors::from_config(&self.selectors, &self.columns)?;
        Ok(())
    }

    pub fn root_url(&self) -> Result<Url> {
        Url::parse(&self.archive.root_url)
            .with_context(|| format!("invalid archive.root_url {}", self.archive.root_url))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_root_url")]
    pub root_url: String,
    #[serde(default = "default_link_base")]
    pub link_base: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root_url: default_root_url(),
            link_base: default_link_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_max_requests_per_domain")]
    pub max_requests_per_domain: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u8,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_requests_per_domain: default_max_requests_per_domain(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_index_link")]
    pub index_link: String,
    #[serde(default = "default_listing_row")]
    pub listing_row: String,
    #[serde(default = "default_row_link")]
    pub row_link: String,
    #[serde(default = "default_detail_text")]
    pub detail_text: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            index_link: default_index_link(),
            listing_row: default_listing_row(),
            row_link: default_row_link(),
            detail_text: default_detail_text(),
        }
    }
}

/// 1-based `td` positions of the listing table columns.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_city_column")]
    pub city: usize,
    #[serde(default = "default_state_column")]
    pub state: usize,
    #[serde(default = "default_country_column")]
    pub country: usize,
    #[serde(default = "default_shape_column")]
    pub shape: usize,
    #[serde(default = "default_duration_column")]
    pub duration: usize,
    #[serde(default = "default_summary_column")]
    pub summary: usize,
    #[serde(default = "default_posted_column")]
    pub posted: usize,
    #[serde(default = "default_image_column")]
    pub image: usize,
}

impl ColumnConfig {
    fn validate(&self) -> Result<()> {
        let positions = [
            ("city", self.city),
            ("state", self.state),
            ("country", self.country),
            ("shape", self.shape),
            ("duration", self.duration),
            ("summary", self.summary),
            ("posted", self.posted),
            ("image", self.image),
        ];
        for (name, position) in positions {
            if position == 0 {
                bail!("columns.{name} is 1-based and must not be 0");
            }
        }
        Ok(())
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            city: default_city_column(),
            state: default_state_column(),
            country: default_country_column(),
            shape: default_shape_column(),
            duration: default_duration_column(),
            summary: default_summary_column(),
            posted: default_posted_column(),
            image: default_image_column(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub format: ExportFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: ExportFormat::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<CrawlConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read crawl config: {}", path.display()))?;
    let config: CrawlConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid crawl config {}", path.display()))?;
    Ok(config)
}

fn default_root_url() -> String {
    "https://nuforc.org/webreports/ndxevent.html".to_string()
}

fn default_link_base() -> String {
    "https://nuforc.org/webreports/".to_string()
}

fn default_max_concurrent_requests() -> usize {
    600
}

fn default_max_requests_per_domain() -> usize {
    40
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_retry_attempts() -> u8 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_index_link() -> String {
    r#"tr[valign*="TOP"] > td > a"#.to_string()
}

fn default_listing_row() -> String {
    "tbody tr".to_string()
}

fn default_row_link() -> String {
    "td a".to_string()
}

fn default_detail_text() -> String {
    "tbody tr:nth-child(2) td font".to_string()
}

fn default_city_column() -> usize {
    2
}

fn default_state_column() -> usize {
    3
}

fn default_country_column() -> usize {
    4
}

fn default_shape_column() -> usize {
    5
}

fn default_duration_column() -> usize {
    6
}

fn default_summary_column() -> usize {
    7
}

fn default_posted_column() -> usize {
    8
}

fn default_image_column() -> usize {
    9
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/nuforc_reports.csv")
}
