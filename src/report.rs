use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{QuoteStyle, Writer, WriterBuilder};

use crate::model::ClaimRecord;
use crate::util::ensure_directory;

pub const REPORT_HEADER: [&str; 15] = [
    "Score",
    "Author A",
    "Author B",
    "Review URL A",
    "Review URL B",
    "Text Fragments A",
    "Text Fragments B",
    "Entities A",
    "Entities B",
    "Keywords A",
    "Keywords B",
    "Citations A",
    "Citations B",
    "URI A",
    "URI B",
];

pub trait ReportSink {
    fn begin(&mut self) -> Result<()>;

    fn write_pair(&mut self, score: f64, left: &ClaimRecord, right: &ClaimRecord) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReport;

impl ReportSink for NoopReport {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_pair(&mut self, _score: f64, _left: &ClaimRecord, _right: &ClaimRecord) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct CsvReport<W: Write> {
    writer: Writer<W>,
    rows_written: usize,
}

impl CsvReport<File> {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_directory(parent)?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create report file: {}", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> CsvReport<W> {
    pub fn new(inner: W) -> Self {
        let writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .from_writer(inner);
        Self {
            writer,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to flush report writer: {}", err.error()))
    }
}

impl<W: Write> ReportSink for CsvReport<W> {
    fn begin(&mut self) -> Result<()> {
        self.writer
            .write_record(REPORT_HEADER)
            .context("failed to write report header")
    }

    fn write_pair(&mut self, score: f64, left: &ClaimRecord, right: &ClaimRecord) -> Result<()> {
        let row = [
            score.to_string(),
            escape_quotes(&left.author),
            escape_quotes(&right.author),
            escape_quotes(left.review_url.as_deref().unwrap_or("")),
            escape_quotes(right.review_url.as_deref().unwrap_or("")),
            escape_quotes(left.headline()),
            escape_quotes(right.headline()),
            join_escaped(&left.entities),
            join_escaped(&right.entities),
            join_escaped(&left.keywords),
            join_escaped(&right.keywords),
            join_escaped(&left.links),
            join_escaped(&right.links),
            escape_quotes(&left.id),
            escape_quotes(&right.id),
        ];
        self.writer
            .write_record(&row)
            .with_context(|| format!("failed to write report row for {} / {}", left.id, right.id))?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush report")
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "''")
}

fn join_escaped(values: &[String]) -> String {
    escape_quotes(&values.join(","))
}
