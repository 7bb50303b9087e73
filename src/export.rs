use crate::model::CompletedRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const COLUMNS: [&str; 12] = [
    "period_label",
    "report_date",
    "posted_date",
    "city",
    "state",
    "country",
    "shape",
    "duration",
    "image_flag",
    "detail_link",
    "summary",
    "free_text",
];

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Csv,
    JsonLines,
}

/// One output row. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReportRow {
    pub period_label: String,
    pub report_date: String,
    pub posted_date: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub shape: String,
    pub duration: String,
    pub image_flag: String,
    pub detail_link: String,
    pub summary: String,
    pub free_text: String,
}

impl ReportRow {
    fn from_record(record: CompletedRecord, link_base: &str) -> Self {
        let row = record.row();
        Self {
            period_label: record.period_label().to_string(),
            report_date: row.report_date.clone(),
            posted_date: row.posted_date.clone(),
            city: row.city.clone(),
            state: row.state.clone(),
            country: row.country.clone(),
            shape: row.shape.clone(),
            duration: row.duration.clone(),
            image_flag: row.image_flag.clone(),
            detail_link: format!("{link_base}{}", row.detail_link),
            summary: row.summary.clone(),
            free_text: record.free_text().to_string(),
        }
    }

    fn values(&self) -> [&str; 12] {
        [
            self.period_label.as_str(),
            self.report_date.as_str(),
            self.posted_date.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.country.as_str(),
            self.shape.as_str(),
            self.duration.as_str(),
            self.image_flag.as_str(),
            self.detail_link.as_str(),
            self.summary.as_str(),
            self.free_text.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportDataset {
    rows: Vec<ReportRow>,
}

impl ReportDataset {
    pub fn from_records(records: Vec<CompletedRecord>, link_base: &str) -> Self {
        Self {
            rows: records
                .into_iter()
                .map(|record| ReportRow::from_record(record, link_base))
                .collect(),
        }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the whole table or nothing: rows go to a sibling `.partial`
    /// file that is renamed over `path` only after a successful flush.
    pub fn write(&self, path: &Path, format: ExportFormat) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output dir {}", parent.display()))?;
        }

        let partial = partial_path(path);
        let file = File::create(&partial)
            .with_context(|| format!("failed to create {}", partial.display()))?;

        let written = match format {
            ExportFormat::Csv => self.write_csv(file),
            ExportFormat::JsonLines => self.write_json_lines(file),
        };
        if let Err(err) = written {
            let _ = std::fs::remove_file(&partial);
            return Err(err).with_context(|| format!("failed to write {}", partial.display()));
        }

        if let Err(err) = std::fs::rename(&partial, path) {
            let _ = std::fs::remove_file(&partial);
            return Err(err).with_context(|| {
                format!(
                    "failed to move {} into place at {}",
                    partial.display(),
                    path.display()
                )
            });
        }

        info!(
            file = %path.display(),
            rows = self.rows.len(),
            format = ?format,
            "dataset written"
        );
        Ok(())
    }

    fn write_csv(&self, file: File) -> Result<()> {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(COLUMNS)?;
        for row in &self.rows {
            writer.write_record(row.values())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_json_lines(&self, file: File) -> Result<()> {
        let mut writer = BufWriter::new(file);
        for row in &self.rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
