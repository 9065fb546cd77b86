//! Candidate discovery
//!
//! Runs every identity query against repository search and folds the results
//! into one candidate per repository. A repository returned by several
//! queries is reinforced rather than duplicated, so its association score
//! ends up as the number of distinct queries that found it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use repofinder_core::{Candidate, ExtractionSettings, Query, RepoId, RepoMetadata};
use repofinder_github::{ApiError, SharedHost};

use crate::AgentError;

/// Discovery limits
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Stop admitting new candidates at this many
    pub limit: Option<usize>,
    /// Pages fetched per query
    pub max_pages: u32,
    /// Queries in flight at once
    pub concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            limit: None,
            max_pages: 10,
            concurrency: 1,
        }
    }
}

impl DiscoveryConfig {
    pub fn from_settings(settings: &ExtractionSettings, limit: Option<usize>) -> Self {
        Self {
            limit,
            max_pages: settings.max_search_pages.max(1) as u32,
            concurrency: settings.search_concurrency.max(1),
        }
    }
}

/// Outcome of folding one search result into the candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Reinforced,
    /// Already matched by this query
    Unchanged,
    /// New repository turned away because the limit is reached
    Rejected,
}

/// What discovery produced
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Candidates in first-seen order
    pub candidates: Vec<Candidate>,
    pub queries_run: usize,
    pub queries_failed: usize,
}

/// Concurrent candidate set keyed by repository
pub struct Discovery {
    host: SharedHost,
    config: DiscoveryConfig,
    candidates: DashMap<RepoId, Candidate>,
    admitted: AtomicUsize,
}

impl Discovery {
    pub fn new(host: SharedHost, config: DiscoveryConfig) -> Self {
        Self {
            host,
            config,
            candidates: DashMap::new(),
            admitted: AtomicUsize::new(0),
        }
    }

    pub fn is_full(&self) -> bool {
        self.config
            .limit
            .is_some_and(|limit| self.admitted.load(Ordering::SeqCst) >= limit)
    }

    /// Insert a new candidate or add `query` to an existing one
    pub fn upsert(&self, metadata: RepoMetadata, query: &Query) -> Upsert {
        match self.candidates.entry(metadata.id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get_mut().reinforce(query.clone()) {
                    Upsert::Reinforced
                } else {
                    Upsert::Unchanged
                }
            }
            Entry::Vacant(slot) => {
                let limit = self.config.limit;
                let ticket = self
                    .admitted
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match limit {
                        Some(l) if n >= l => None,
                        _ => Some(n + 1),
                    });
                match ticket {
                    Ok(sequence) => {
                        slot.insert(Candidate::new(metadata, query.clone(), sequence as u64));
                        Upsert::Inserted
                    }
                    Err(_) => Upsert::Rejected,
                }
            }
        }
    }

    /// Run one query; an error on the first page fails the query, a later
    /// page error just ends it
    async fn run_query(&self, query: &Query) -> Result<usize, ApiError> {
        let mut page = 1u32;
        let mut inserted = 0usize;

        loop {
            let result = match self.host.search_repositories(&query.text, page).await {
                Ok(result) => result,
                Err(e) if page == 1 || e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Query '{}' stopped at page {}: {}", query.text, page, e);
                    break;
                }
            };

            for metadata in result.items {
                if self.upsert(metadata, query) == Upsert::Inserted {
                    inserted += 1;
                }
            }

            if !result.has_next || self.is_full() || page >= self.config.max_pages {
                break;
            }
            page += 1;
        }

        debug!("Query '{}' added {} new candidates", query.text, inserted);
        Ok(inserted)
    }

    /// Run all queries and return the candidates in first-seen order
    pub async fn run(self, queries: &[Query]) -> Result<DiscoveryReport, AgentError> {
        if queries.is_empty() {
            return Err(AgentError::NoQueries);
        }

        info!("🔎 Running {} search queries", queries.len());

        let this = &self;
        let outcomes: Vec<Result<usize, ApiError>> = stream::iter(queries)
            .map(|query| async move {
                let outcome = this.run_query(query).await;
                if let Err(e) = &outcome {
                    warn!("Query '{}' failed: {}", query.text, e);
                }
                outcome
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut failed = 0usize;
        let mut last_error = None;
        for outcome in outcomes {
            if let Err(e) = outcome {
                if e.is_fatal() {
                    return Err(AgentError::Fatal(e));
                }
                failed += 1;
                last_error = Some(e.to_string());
            }
        }

        if failed == queries.len() {
            return Err(AgentError::SearchUnavailable {
                attempted: queries.len(),
                last: last_error.unwrap_or_default(),
            });
        }

        let mut candidates: Vec<Candidate> =
            self.candidates.into_iter().map(|(_, candidate)| candidate).collect();
        candidates.sort_by_key(|c| c.sequence);

        info!(
            "Discovered {} candidates ({} of {} queries failed)",
            candidates.len(),
            failed,
            queries.len()
        );

        Ok(DiscoveryReport {
            candidates,
            queries_run: queries.len(),
            queries_failed: failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFailure, MockHost};
    use repofinder_core::{build_queries, OrgIdentity};
    use std::sync::Arc;

    fn meta(owner: &str, name: &str) -> RepoMetadata {
        RepoMetadata::new(RepoId::new(owner, name))
    }

    fn identity() -> OrgIdentity {
        OrgIdentity::new("UC Santa Cruz").with_acronym("UCSC")
    }

    #[tokio::test]
    async fn test_upsert_reinforces_instead_of_duplicating() {
        let queries = build_queries(&identity());
        let host = MockHost::new()
            .with_search(&queries[0].text, vec![vec![meta("a", "one"), meta("b", "two")]])
            .with_search(&queries[3].text, vec![vec![meta("b", "two"), meta("c", "three")]]);

        let report = Discovery::new(Arc::new(host), DiscoveryConfig::default())
            .run(&queries)
            .await
            .unwrap();

        assert_eq!(report.candidates.len(), 3);
        let names: Vec<_> = report.candidates.iter().map(|c| c.id.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);

        let two = &report.candidates[1];
        assert_eq!(two.association_score(), 2);
        assert_eq!(two.association_score(), two.matched_queries.len());
        assert_eq!(report.candidates[0].association_score(), 1);
    }

    #[tokio::test]
    async fn test_association_is_order_independent() {
        let queries = build_queries(&identity());
        let host = || {
            MockHost::new()
                .with_search(&queries[0].text, vec![vec![meta("a", "x")]])
                .with_search(&queries[1].text, vec![vec![meta("a", "x")]])
                .with_search(&queries[3].text, vec![vec![meta("a", "x")]])
        };

        let forward = Discovery::new(Arc::new(host()), DiscoveryConfig::default())
            .run(&queries)
            .await
            .unwrap();
        let reversed: Vec<Query> = queries.iter().rev().cloned().collect();
        let backward = Discovery::new(
            Arc::new(host()),
            DiscoveryConfig {
                concurrency: 4,
                ..DiscoveryConfig::default()
            },
        )
        .run(&reversed)
        .await
        .unwrap();

        assert_eq!(forward.candidates[0].association_score(), 3);
        assert_eq!(
            forward.candidates[0].matched_queries,
            backward.candidates[0].matched_queries
        );
    }

    #[tokio::test]
    async fn test_limit_stops_admission_but_not_reinforcement() {
        let queries = build_queries(&identity());
        let host = MockHost::new()
            .with_search(
                &queries[0].text,
                vec![vec![meta("a", "1"), meta("a", "2")], vec![meta("a", "3")]],
            )
            .with_search(&queries[1].text, vec![vec![meta("a", "2"), meta("a", "4")]]);
        let host = Arc::new(host);

        let config = DiscoveryConfig {
            limit: Some(2),
            ..DiscoveryConfig::default()
        };
        let report = Discovery::new(host.clone(), config).run(&queries).await.unwrap();

        let names: Vec<_> = report.candidates.iter().map(|c| c.id.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2"]);
        assert_eq!(report.candidates[1].association_score(), 2);
        // Second page of the first query is never requested
        assert_eq!(host.search_calls(), queries.len());
    }

    #[tokio::test]
    async fn test_single_failing_query_is_skipped() {
        let queries = build_queries(&identity());
        let host = MockHost::new()
            .with_failing_query(&queries[0].text, MockFailure::Transient)
            .with_search(&queries[1].text, vec![vec![meta("a", "x")]]);

        let report = Discovery::new(Arc::new(host), DiscoveryConfig::default())
            .run(&queries)
            .await
            .unwrap();
        assert_eq!(report.queries_failed, 1);
        assert_eq!(report.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_all_queries_failing_is_fatal() {
        let identity = OrgIdentity::new("Nowhere U");
        let queries = build_queries(&identity);
        let mut host = MockHost::new();
        for q in &queries {
            host = host.with_failing_query(&q.text, MockFailure::Transient);
        }

        let err = Discovery::new(Arc::new(host), DiscoveryConfig::default())
            .run(&queries)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SearchUnavailable { attempted, .. } if attempted == queries.len()));
    }

    #[tokio::test]
    async fn test_unauthorized_aborts() {
        let queries = build_queries(&identity());
        let host = MockHost::new()
            .with_failing_query(&queries[2].text, MockFailure::Unauthorized)
            .with_search(&queries[0].text, vec![vec![meta("a", "x")]]);

        let err = Discovery::new(Arc::new(host), DiscoveryConfig::default())
            .run(&queries)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Fatal(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_no_queries() {
        let err = Discovery::new(Arc::new(MockHost::new()), DiscoveryConfig::default())
            .run(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NoQueries));
    }
}
