//! Signal extraction for one candidate
//!
//! The repository is re-fetched first; that snapshot is what gets scored,
//! and an error there decides whether the candidate is skipped (gone or
//! closed to us) or failed. Everything else is secondary: a secondary
//! signal that cannot be fetched is recorded as absent and contributes
//! nothing downstream.

use std::sync::Arc;
use tracing::{debug, warn};

use repofinder_core::{
    ActivityWindow, Candidate, DocumentationFlags, ExtractionSettings, OrgIdentity, RepoSignals,
};
use repofinder_github::{ApiResult, SharedHost};

use crate::{ActivityCollector, AgentError, ContributorCollector};

/// Gathers [`RepoSignals`] for candidates
pub struct SignalExtractor {
    host: SharedHost,
    contributors: ContributorCollector,
    activity: ActivityCollector,
    max_participants: usize,
}

impl SignalExtractor {
    pub fn new(
        host: SharedHost,
        identity: Arc<OrgIdentity>,
        window: ActivityWindow,
        settings: &ExtractionSettings,
    ) -> Self {
        Self {
            contributors: ContributorCollector::new(
                host.clone(),
                identity,
                settings.max_contributors,
                settings.max_user_repos,
            ),
            activity: ActivityCollector::new(host.clone(), window)
                .with_review_limit(settings.max_reviewed_pulls),
            max_participants: settings.max_participants,
            host,
        }
    }

    pub fn contributors(&self) -> &ContributorCollector {
        &self.contributors
    }

    fn absorb<T>(
        signals: &mut RepoSignals,
        signal: &str,
        result: ApiResult<T>,
    ) -> Result<Option<T>, AgentError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(AgentError::Fatal(e)),
            Err(e) => {
                warn!("{} unavailable for {}: {}", signal, signals.metadata.id, e);
                signals.mark_absent(signal);
                Ok(None)
            }
        }
    }

    pub async fn extract(&self, candidate: &Candidate) -> Result<RepoSignals, AgentError> {
        let id = &candidate.id;
        let metadata = self
            .host
            .repository(id)
            .await
            .map_err(|e| AgentError::for_candidate(id, e))?;

        let mut signals = RepoSignals::new(metadata);
        let owner_login = signals.metadata.id.owner.clone();
        let owner_kind = signals.metadata.owner_kind;

        let (readme, root_files, languages, owner, contributors, activity) = tokio::join!(
            self.host.readme(id),
            self.host.root_files(id),
            self.host.languages(id),
            self.host.owner_profile(&owner_login, owner_kind),
            self.contributors.collect(id),
            self.activity.collect(&signals.metadata),
        );

        match Self::absorb(&mut signals, "readme", readme)? {
            Some(Some(text)) => signals.readme = Some(text),
            Some(None) => signals.mark_absent("readme"),
            None => {}
        }

        if let Some(files) = Self::absorb(&mut signals, "root_files", root_files)? {
            signals.documentation = DocumentationFlags::from_file_names(&files);
            signals.root_files = files;
        }
        if signals.readme.is_some() {
            signals.documentation.readme = true;
        }

        if let Some(languages) = Self::absorb(&mut signals, "languages", languages)? {
            signals.languages = languages;
        }
        if let Some(owner) = Self::absorb(&mut signals, "owner", owner)? {
            signals.owner = Some(owner);
        }
        if let Some(contributors) = Self::absorb(&mut signals, "contributors", contributors)? {
            signals.contributors = contributors;
        }

        let activity = activity.map_err(AgentError::Fatal)?;
        for signal in &activity.absent {
            signals.mark_absent(signal);
        }
        signals.activity = activity.counts;
        signals.issues = activity.issues;
        signals.pulls = activity.pulls;
        signals.last_commit = activity.last_commit.or(signals.metadata.pushed_at);

        if !activity.issue_commenters.is_empty() {
            let external = self
                .contributors
                .external(&activity.issue_commenters, self.max_participants)
                .await;
            if let Some(external) = Self::absorb(&mut signals, "participants", external)? {
                signals.issues.external_participants = external;
            }
        }

        debug!(
            "Extracted {}: {} contributors, {} absent signals",
            id,
            signals.contributors.len(),
            signals.absent.len()
        );
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFailure, MockHost, MockRepo};
    use chrono::{TimeZone, Utc};
    use repofinder_github::{CommentEvent, IssueEvent};
    use repofinder_core::{
        ContributorProfile, IdentityAttribute, OwnerKind, OwnerProfile, Query, RepoId, RepoMetadata,
        SearchField,
    };

    fn window() -> ActivityWindow {
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        ActivityWindow::months_before(end, 6).unwrap()
    }

    fn candidate(meta: &RepoMetadata) -> Candidate {
        let query = Query {
            text: "\"UCSC\" in:name,description,readme".into(),
            origin: IdentityAttribute::Acronym,
            field: SearchField::Text,
        };
        Candidate::new(meta.clone(), query, 0)
    }

    fn extractor(host: MockHost) -> SignalExtractor {
        let identity = Arc::new(OrgIdentity::new("UC Santa Cruz").with_acronym("UCSC"));
        SignalExtractor::new(Arc::new(host), identity, window(), &ExtractionSettings::default())
    }

    fn comment(author: &str, issue: u64) -> CommentEvent {
        CommentEvent {
            author: Some(author.to_string()),
            issue_number: Some(issue),
        }
    }

    fn lab_meta() -> RepoMetadata {
        RepoMetadata::new(RepoId::new("ucsc-lab", "genome-tools"))
            .with_description("Genome tools from UCSC")
            .with_owner_kind(OwnerKind::Organization)
    }

    #[tokio::test]
    async fn test_extract_full_signals() {
        let meta = lab_meta();
        let host = MockHost::new()
            .with_repo(
                MockRepo::new(meta.clone())
                    .with_readme("# Genome tools\nBuilt at UC Santa Cruz")
                    .with_files(&["README.md", "CITATION.cff", "CONTRIBUTING.md", "src"])
                    .with_language("Python", 750)
                    .with_language("C", 250)
                    .with_contributor("alice", 12),
            )
            .with_owner(OwnerProfile::Organization {
                login: "ucsc-lab".into(),
                name: Some("UCSC Genomics Lab".into()),
                description: None,
                blog: None,
                email: None,
                location: Some("Santa Cruz, CA".into()),
            })
            .with_user(ContributorProfile::new("alice"), vec![]);

        let signals = extractor(host).extract(&candidate(&meta)).await.unwrap();

        assert!(signals.readme.is_some());
        assert!(signals.documentation.readme);
        assert!(signals.documentation.citation);
        assert!(signals.documentation.contributing);
        assert!(!signals.documentation.funding);
        assert_eq!(signals.main_language().as_deref(), Some("Python"));
        assert!(matches!(signals.owner, Some(OwnerProfile::Organization { .. })));
        assert_eq!(signals.contributors.len(), 1);
        assert!(signals.absent.is_empty());
    }

    #[tokio::test]
    async fn test_external_issue_participants() {
        let meta = lab_meta();
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let host = MockHost::new()
            .with_repo(
                MockRepo::new(meta.clone())
                    .with_issues(vec![IssueEvent {
                        number: 8,
                        title: "Segfault on large input".into(),
                        created_at: created,
                        closed_at: None,
                    }])
                    .with_comments(vec![
                        comment("ucsc-lab", 8),
                        comment("slug", 8),
                        comment("otter", 8),
                        comment("ghost", 8),
                    ]),
            )
            .with_user(ContributorProfile::new("slug").with_email("slug@ucsc.edu"), vec![])
            .with_user(ContributorProfile::new("otter").with_company("Monterey Bay Aquarium"), vec![])
            .with_user(ContributorProfile::new("ghost"), vec![]);

        let identity = Arc::new(
            OrgIdentity::new("UC Santa Cruz")
                .with_acronym("UCSC")
                .with_email_domain("ucsc.edu"),
        );
        let extractor =
            SignalExtractor::new(Arc::new(host), identity, window(), &ExtractionSettings::default());
        let signals = extractor.extract(&candidate(&meta)).await.unwrap();

        assert_eq!(signals.issues.total_issues, 1);
        assert_eq!(signals.issues.open_issues, 1);
        assert_eq!(signals.issues.external_participants, vec!["ghost", "otter"]);
        assert!(!signals.absent.contains(&"participants".to_string()));
    }

    #[tokio::test]
    async fn test_missing_secondary_signals_are_absent() {
        let meta = lab_meta();
        let host = MockHost::new().with_repo(
            MockRepo::new(meta.clone())
                .failing("languages", MockFailure::Transient)
                .failing("contributors", MockFailure::Forbidden),
        );

        let signals = extractor(host).extract(&candidate(&meta)).await.unwrap();
        assert!(signals.absent.contains(&"readme".to_string()));
        assert!(signals.absent.contains(&"languages".to_string()));
        assert!(signals.absent.contains(&"contributors".to_string()));
        // No owner profile registered with the mock
        assert!(signals.absent.contains(&"owner".to_string()));
        assert!(signals.owner.is_none());
    }

    #[tokio::test]
    async fn test_deleted_repository_is_skipped() {
        let meta = lab_meta();
        let err = extractor(MockHost::new())
            .extract(&candidate(&meta))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_transient_primary_failure_fails_candidate() {
        let meta = lab_meta();
        let host = MockHost::new()
            .with_repo(MockRepo::new(meta.clone()).failing("repository", MockFailure::Transient));
        let err = extractor(host).extract(&candidate(&meta)).await.unwrap_err();
        assert!(matches!(err, AgentError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_secondary_is_fatal() {
        let meta = lab_meta();
        let host = MockHost::new()
            .with_repo(MockRepo::new(meta.clone()).failing("readme", MockFailure::Unauthorized));
        let err = extractor(host).extract(&candidate(&meta)).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
