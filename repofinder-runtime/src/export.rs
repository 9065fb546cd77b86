//! Result export
//!
//! Three files per run, named after the organization slug:
//! - `repository_data_<slug>.json`: one document with run metadata and the
//!   full nested records
//! - `repository_data_<slug>.csv`: one flat row per record, with a header
//! - `repository_data_<slug>.jsonl`: the same rows as JSON lines
//!
//! Partial runs insert `.partial` before the extension. Each file is written
//! to a temporary sibling and renamed into place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use repofinder_core::{
    ActivityWindow, FlatRecord, MetricKind, MetricSpec, OrgIdentity, ScoredRecord,
};

use crate::{PipelineError, RunReport, RunSummary, ScoringContext};

pub const OUTPUT_PREFIX: &str = "repository_data_";

/// Nested export document
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<&'a str>,
    pub identity: &'a OrgIdentity,
    pub window: &'a ActivityWindow,
    pub weights: Vec<(MetricKind, MetricSpec)>,
    pub summary: RunSummary,
    pub records: &'a [ScoredRecord],
}

/// Files written by an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub jsonl: PathBuf,
}

pub struct Exporter {
    dir: PathBuf,
    slug: String,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>, identity: &OrgIdentity) -> Self {
        Self {
            dir: dir.into(),
            slug: identity.slug(),
        }
    }

    pub fn paths(&self, partial: bool) -> ExportPaths {
        let base = format!("{}{}", OUTPUT_PREFIX, self.slug);
        let suffix = if partial { ".partial" } else { "" };
        ExportPaths {
            json: self.dir.join(format!("{}{}.json", base, suffix)),
            csv: self.dir.join(format!("{}{}.csv", base, suffix)),
            jsonl: self.dir.join(format!("{}{}.jsonl", base, suffix)),
        }
    }

    /// Write every export file for a run report
    pub fn write(
        &self,
        report: &RunReport,
        context: &ScoringContext,
    ) -> Result<ExportPaths, PipelineError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Export {
            path: self.dir.clone(),
            source,
        })?;

        let paths = self.paths(report.is_partial());

        let document = ExportDocument {
            run_id: report.run_id,
            started_at: report.started_at,
            generated_at: Utc::now(),
            partial: report.is_partial(),
            aborted: report.aborted.as_deref(),
            identity: context.identity(),
            window: context.window(),
            weights: context.weights().iter().collect(),
            summary: report.summary,
            records: &report.records,
        };
        let json = serde_json::to_vec_pretty(&document)?;
        write_atomic(&paths.json, &json)?;

        let rows: Vec<FlatRecord> = report.records.iter().map(ScoredRecord::flatten).collect();
        write_atomic(&paths.csv, &csv_rows(&rows)?)?;

        let mut lines = Vec::new();
        for row in &rows {
            serde_json::to_writer(&mut lines, row)?;
            lines.push(b'\n');
        }
        write_atomic(&paths.jsonl, &lines)?;

        info!(
            "💾 Wrote {} records to {}",
            report.records.len(),
            paths.json.display()
        );
        Ok(paths)
    }
}

/// Header plus one line per row; an empty run still gets the header
fn csv_rows(rows: &[FlatRecord]) -> Result<Vec<u8>, PipelineError> {
    if rows.is_empty() {
        return Ok(format!("{}\n", FlatRecord::COLUMNS.join(",")).into_bytes());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Csv(csv::Error::from(e.into_error())))
}

/// Write through a temporary file in the same directory, then rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let io_err = |source: std::io::Error| PipelineError::Export {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use repofinder_core::{
        Candidate, ClassificationSettings, IdentityAttribute, Query, RepoId, RepoMetadata,
        RepoSignals, SearchField, WeightTable,
    };

    fn context() -> ScoringContext {
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        ScoringContext::new(
            OrgIdentity::new("UC Santa Cruz").with_acronym("UCSC"),
            ClassificationSettings::default().build_classifier().unwrap(),
            WeightTable::default(),
            ActivityWindow::months_before(end, 6).unwrap(),
        )
        .unwrap()
    }

    fn report(ctx: &ScoringContext, names: &[&str]) -> RunReport {
        let records = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let meta = RepoMetadata::new(RepoId::new("ucsc", name))
                    .with_topics(&["ucsc", "genomics"]);
                let mut candidate = Candidate::new(
                    meta.clone(),
                    Query {
                        text: "topic:ucsc".into(),
                        origin: IdentityAttribute::Acronym,
                        field: SearchField::Topics,
                    },
                    i as u64,
                );
                ctx.score(&mut candidate, &RepoSignals::new(meta))
            })
            .collect::<Vec<_>>();
        RunReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            summary: RunSummary {
                discovered: records.len(),
                scored: records.len(),
                ..RunSummary::default()
            },
            records,
            interrupted: false,
            aborted: None,
        }
    }

    #[test]
    fn test_paths() {
        let exporter = Exporter::new("/out", &OrgIdentity::new("UC Santa Cruz").with_acronym("UCSC"));
        assert_eq!(
            exporter.paths(false).json,
            PathBuf::from("/out/repository_data_UCSC.json")
        );
        assert_eq!(
            exporter.paths(false).csv,
            PathBuf::from("/out/repository_data_UCSC.csv")
        );
        assert_eq!(
            exporter.paths(true).jsonl,
            PathBuf::from("/out/repository_data_UCSC.partial.jsonl")
        );
    }

    #[test]
    fn test_write_full_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();
        let report = report(&ctx, &["alpha", "beta"]);

        let paths = Exporter::new(dir.path(), ctx.identity()).write(&report, &ctx).unwrap();

        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.json).unwrap()).unwrap();
        assert_eq!(doc["partial"], false);
        assert_eq!(doc["summary"]["scored"], 2);
        assert_eq!(doc["records"].as_array().unwrap().len(), 2);
        assert_eq!(doc["records"][0]["id"], "ucsc/alpha");
        assert_eq!(doc["identity"]["acronym"], "UCSC");

        let rows = std::fs::read_to_string(&paths.jsonl).unwrap();
        let rows: Vec<serde_json::Value> = rows
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1]["topics"].as_str().unwrap().contains("; "));

        let mut table = csv::Reader::from_path(&paths.csv).unwrap();
        let headers: Vec<String> = table.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, FlatRecord::COLUMNS.to_vec());
        let csv_rows: Vec<FlatRecord> = table.deserialize::<FlatRecord>().map(|r| r.unwrap()).collect();
        assert_eq!(csv_rows.len(), 2);
        assert_eq!(csv_rows[0].repository, "ucsc/alpha");
        assert_eq!(csv_rows[1].topics, "ucsc; genomics");
        assert_eq!(csv_rows[0].average_time_to_close_days, None);
        assert_eq!(csv_rows[0], report.records[0].flatten());

        // No temporary files left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 3);
    }

    #[test]
    fn test_empty_run_writes_csv_header() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();
        let report = report(&ctx, &[]);

        let paths = Exporter::new(dir.path(), ctx.identity()).write(&report, &ctx).unwrap();
        let text = std::fs::read_to_string(&paths.csv).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("repository,html_url,"));
        assert!(std::fs::read_to_string(&paths.jsonl).unwrap().is_empty());
    }

    #[test]
    fn test_partial_run_uses_partial_names() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();
        let mut report = report(&ctx, &["alpha"]);
        report.interrupted = true;

        let paths = Exporter::new(dir.path(), ctx.identity()).write(&report, &ctx).unwrap();
        assert!(paths.json.ends_with("repository_data_UCSC.partial.json"));
        assert!(paths.csv.ends_with("repository_data_UCSC.partial.csv"));
        assert!(paths.csv.exists());

        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.json).unwrap()).unwrap();
        assert_eq!(doc["partial"], true);
        assert_eq!(doc["records"].as_array().unwrap().len(), 1);
    }
}
