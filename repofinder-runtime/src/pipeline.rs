//! Run coordinator
//!
//! Discovery runs first and produces the candidate list. Candidates are then
//! extracted and scored by a bounded pool of workers; each worker owns its
//! candidate until the finished record is handed back. A shutdown signal
//! stops the run and keeps the records already completed.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use repofinder_agents::{AgentError, Discovery, DiscoveryConfig, SignalExtractor};
use repofinder_core::{build_queries, ExtractionSettings, ScoredRecord};
use repofinder_github::SharedHost;

use crate::{PipelineError, ScoringContext};

/// Pipeline configuration
pub struct PipelineConfig {
    /// Hosting service client
    pub host: SharedHost,
    /// Shared scoring configuration
    pub context: Arc<ScoringContext>,
    /// Worker and fetch limits
    pub extraction: ExtractionSettings,
    /// Maximum candidates to admit
    pub limit: Option<usize>,
}

/// Per-run outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Records in discovery order
    pub records: Vec<ScoredRecord>,
    pub summary: RunSummary,
    /// Stopped by the shutdown signal
    pub interrupted: bool,
    /// Reason the run was aborted early
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            records: Vec::new(),
            summary: RunSummary::default(),
            interrupted: false,
            aborted: None,
        }
    }

    /// Records cover only part of the candidates
    pub fn is_partial(&self) -> bool {
        self.interrupted || self.aborted.is_some()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Pipeline {
    host: SharedHost,
    context: Arc<ScoringContext>,
    extraction: ExtractionSettings,
    limit: Option<usize>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            host: config.host,
            context: config.context,
            extraction: config.extraction,
            limit: config.limit,
        }
    }

    pub fn context(&self) -> &ScoringContext {
        &self.context
    }

    /// Run discovery, extraction and scoring until done or `shutdown`
    /// resolves.
    ///
    /// Configuration problems and an unreachable search API are errors.
    /// Interruption and mid-run aborts still return the completed records,
    /// flagged in the report.
    pub async fn run<F>(&self, shutdown: F) -> Result<RunReport, PipelineError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut report = RunReport::new();

        let queries = build_queries(self.context.identity());
        info!("Run {} started with {} queries", report.run_id, queries.len());

        let discovery = Discovery::new(
            self.host.clone(),
            DiscoveryConfig::from_settings(&self.extraction, self.limit),
        );
        let discovered = tokio::select! {
            result = discovery.run(&queries) => result?,
            _ = &mut shutdown => {
                warn!("Interrupted during discovery");
                report.interrupted = true;
                return Ok(report);
            }
        };
        report.summary.discovered = discovered.candidates.len();

        let extractor = SignalExtractor::new(
            self.host.clone(),
            self.context.identity().clone(),
            *self.context.window(),
            &self.extraction,
        );
        let extractor = &extractor;
        let context = &self.context;
        let total = discovered.candidates.len();

        info!(
            "⚙️  Extracting {} candidates with {} workers",
            total,
            self.extraction.concurrency
        );

        let results = stream::iter(discovered.candidates)
            .map(|mut candidate| async move {
                let signals = extractor.extract(&candidate).await?;
                let record = context.score(&mut candidate, &signals);
                Ok::<_, AgentError>((candidate.sequence, record))
            })
            .buffer_unordered(self.extraction.concurrency.max(1));
        tokio::pin!(results);

        let mut completed: Vec<(u64, ScoredRecord)> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Interrupted after {} scored records", completed.len());
                    report.interrupted = true;
                    break;
                }
                next = results.next() => match next {
                    None => break,
                    Some(Ok((sequence, record))) => {
                        info!(
                            "[{}/{}] {} confidence {:.1} activity {:.1}",
                            completed.len() + 1,
                            total,
                            record.id,
                            record.confidence_score,
                            record.activity_score
                        );
                        report.summary.scored += 1;
                        completed.push((sequence, record));
                    }
                    Some(Err(AgentError::Skipped { id, reason })) => {
                        warn!("Skipping {}: {}", id, reason);
                        report.summary.skipped += 1;
                    }
                    Some(Err(e)) if e.is_fatal() => {
                        error!("Aborting run: {}", e);
                        report.aborted = Some(e.to_string());
                        break;
                    }
                    Some(Err(e)) => {
                        error!("{}", e);
                        report.summary.failed += 1;
                    }
                }
            }
        }

        completed.sort_by_key(|(sequence, _)| *sequence);
        report.records = completed.into_iter().map(|(_, record)| record).collect();

        info!(
            "Run {} finished: {} scored, {} skipped, {} failed",
            report.run_id, report.summary.scored, report.summary.skipped, report.summary.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use repofinder_agents::testing::{MockFailure, MockHost, MockRepo};
    use repofinder_core::{
        ActivityWindow, ClassificationSettings, OrgIdentity, RepoId, RepoMetadata, WeightTable,
    };
    use tokio::sync::oneshot;

    fn identity() -> OrgIdentity {
        OrgIdentity::new("UC Santa Cruz").with_acronym("UCSC")
    }

    fn context() -> Arc<ScoringContext> {
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        Arc::new(
            ScoringContext::new(
                identity(),
                ClassificationSettings::default().build_classifier().unwrap(),
                WeightTable::default(),
                ActivityWindow::months_before(end, 6).unwrap(),
            )
            .unwrap(),
        )
    }

    fn meta(name: &str) -> RepoMetadata {
        RepoMetadata::new(RepoId::new("ucsc", name)).with_description("A UCSC project")
    }

    fn first_query() -> String {
        build_queries(&identity())[0].text.clone()
    }

    fn pipeline(host: MockHost, concurrency: usize) -> Pipeline {
        Pipeline::new(PipelineConfig {
            host: Arc::new(host),
            context: context(),
            extraction: ExtractionSettings {
                concurrency,
                ..ExtractionSettings::default()
            },
            limit: None,
        })
    }

    #[tokio::test]
    async fn test_run_counts_outcomes() {
        let host = MockHost::new()
            .with_search(
                &first_query(),
                vec![vec![meta("good"), meta("deleted"), meta("flaky"), meta("also-good")]],
            )
            .with_repo(MockRepo::new(meta("good")).with_readme("Built at UC Santa Cruz"))
            .with_repo(MockRepo::new(meta("flaky")).failing("repository", MockFailure::Transient))
            .with_repo(MockRepo::new(meta("also-good")));

        let report = pipeline(host, 3)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            report.summary,
            RunSummary {
                discovered: 4,
                scored: 2,
                skipped: 1,
                failed: 1,
            }
        );
        assert!(!report.is_partial());
        let names: Vec<_> = report.records.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, vec!["good", "also-good"]);
    }

    #[tokio::test]
    async fn test_search_unavailable_is_error() {
        let mut host = MockHost::new();
        for q in build_queries(&identity()) {
            host = host.with_failing_query(&q.text, MockFailure::Transient);
        }
        let result = pipeline(host, 1).run(std::future::pending()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Agent(AgentError::SearchUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_mid_run_keeps_completed() {
        let host = MockHost::new()
            .with_search(&first_query(), vec![vec![meta("a"), meta("b"), meta("c")]])
            .with_repo(MockRepo::new(meta("a")))
            .with_repo(MockRepo::new(meta("b")).failing("readme", MockFailure::Unauthorized))
            .with_repo(MockRepo::new(meta("c")));

        let report = pipeline(host, 1)
            .run(std::future::pending())
            .await
            .unwrap();

        assert!(report.aborted.is_some());
        assert!(report.is_partial());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].id.name, "a");
    }

    #[tokio::test]
    async fn test_interrupt_keeps_exactly_completed_records() {
        let (reached_tx, reached_rx) = oneshot::channel();
        let host = MockHost::new()
            .with_search(
                &first_query(),
                vec![vec![meta("one"), meta("two"), meta("three"), meta("four")]],
            )
            .with_repo(MockRepo::new(meta("one")))
            .with_repo(MockRepo::new(meta("two")))
            .with_repo(MockRepo::new(meta("three")))
            .with_repo(MockRepo::new(meta("four")))
            .park_on(RepoId::new("ucsc", "three"), reached_tx);

        let shutdown = async {
            let _ = reached_rx.await;
        };
        let report = pipeline(host, 1).run(shutdown).await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.summary.scored, 2);
        let names: Vec<_> = report.records.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_limit_caps_candidates() {
        let host = MockHost::new()
            .with_search(&first_query(), vec![vec![meta("a"), meta("b"), meta("c")]])
            .with_repo(MockRepo::new(meta("a")))
            .with_repo(MockRepo::new(meta("b")))
            .with_repo(MockRepo::new(meta("c")));

        let pipeline = Pipeline::new(PipelineConfig {
            host: Arc::new(host),
            context: context(),
            extraction: ExtractionSettings::default(),
            limit: Some(2),
        });
        let report = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(report.summary.discovered, 2);
        assert_eq!(report.records.len(), 2);
    }
}
