//! Scored records
//!
//! A [`ScoredRecord`] is the merged output for one candidate. [`FlatRecord`]
//! is its single-row view for line-oriented export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    ActivityResult, Candidate, ConfidenceResult, ContributorProfile, DocumentationFlags,
    DomainClassification, EvidenceMap, IssueAnalysis, MetricKind, MetricSample, OwnerKind,
    ProjectType, ProjectTypeResult, PullAnalysis, Query, RepoId, RepoSignals, SignalSource,
    UNKNOWN_LABEL,
};

/// Contributor details kept in the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorSummary {
    pub username: String,
    pub status: String,
    pub affiliation: String,
    pub email: Option<String>,
    pub contributions: u64,
}

impl From<&ContributorProfile> for ContributorSummary {
    fn from(profile: &ContributorProfile) -> Self {
        Self {
            username: profile.username.clone(),
            status: profile.status.clone(),
            affiliation: profile.affiliation.clone(),
            email: profile.email.clone(),
            contributions: profile.contributions,
        }
    }
}

/// Everything known and computed about one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: RepoId,
    pub html_url: String,
    pub description: Option<String>,
    pub topics: Vec<String>,
    pub owner_kind: OwnerKind,

    pub matched_queries: Vec<Query>,
    pub association_score: usize,

    pub confidence_score: f64,
    pub confidence_points: u32,
    pub confidence_matches: EvidenceMap,

    pub activity_score: f64,
    pub activity_metrics: Vec<MetricSample>,
    pub issue_analysis: IssueAnalysis,
    pub pull_analysis: PullAnalysis,

    pub classification: DomainClassification,
    pub is_scientific: bool,
    pub project_type: ProjectType,
    pub project_type_scores: BTreeMap<ProjectType, usize>,
    pub project_type_matches: BTreeMap<ProjectType, Vec<String>>,

    pub license: Option<String>,
    pub main_language: Option<String>,
    pub language_percentages: BTreeMap<String, f64>,
    pub documentation: DocumentationFlags,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub last_commit: Option<DateTime<Utc>>,

    pub contributors_count: usize,
    pub contributors: Vec<ContributorSummary>,
    pub lead_institution: String,
    /// Contributors affiliated with someone other than the organization
    pub external_impact: usize,

    pub absent_signals: Vec<String>,
}

/// Inputs merged into a record
pub struct RecordParts<'a> {
    pub candidate: &'a Candidate,
    pub signals: &'a RepoSignals,
    pub confidence: &'a ConfidenceResult,
    pub activity: ActivityResult,
    pub classification: DomainClassification,
    pub project: ProjectTypeResult,
    pub is_scientific: bool,
    pub organization_name: &'a str,
}

impl ScoredRecord {
    pub fn assemble(parts: RecordParts<'_>) -> Self {
        let RecordParts {
            candidate,
            signals,
            confidence,
            activity,
            classification,
            project,
            is_scientific,
            organization_name,
        } = parts;
        let meta = &signals.metadata;

        Self {
            id: candidate.id.clone(),
            html_url: meta.html_url.clone(),
            description: meta.description.clone(),
            topics: meta.topics.clone(),
            owner_kind: meta.owner_kind,
            matched_queries: candidate.matched_queries.iter().cloned().collect(),
            association_score: candidate.association_score(),
            confidence_score: confidence.score,
            confidence_points: confidence.points,
            confidence_matches: confidence.evidence.clone(),
            activity_score: activity.score,
            activity_metrics: activity.samples,
            issue_analysis: signals.issues.clone(),
            pull_analysis: signals.pulls.clone(),
            classification,
            is_scientific,
            project_type: project.project_type,
            project_type_scores: project.scores,
            project_type_matches: project.matches,
            license: meta.license.clone(),
            main_language: signals.main_language(),
            language_percentages: signals.language_percentages(),
            documentation: signals.documentation,
            stars: meta.stars,
            forks: meta.forks,
            watchers: meta.watchers,
            open_issues: meta.open_issues,
            last_commit: signals.last_commit,
            contributors_count: signals.contributors.len(),
            contributors: signals.contributors.iter().map(ContributorSummary::from).collect(),
            lead_institution: lead_institution(&signals.contributors),
            external_impact: external_impact(&signals.contributors, organization_name),
            absent_signals: signals.absent.clone(),
        }
    }

    /// Single-row view for tabular export
    pub fn flatten(&self) -> FlatRecord {
        let activity = |metric: MetricKind| {
            self.activity_metrics
                .iter()
                .find(|s| s.metric == metric)
                .map(|s| s.raw_value)
                .unwrap_or(0.0)
        };
        FlatRecord {
            repository: self.id.full_name(),
            html_url: self.html_url.clone(),
            description: self.description.clone().unwrap_or_default(),
            topics: join(&self.topics),
            association_score: self.association_score,
            matched_queries: join(self.matched_queries.iter().map(|q| q.text.as_str())),
            confidence_score: round2(self.confidence_score),
            confidence_points: self.confidence_points,
            confidence_sources: join(self.confidence_matches.iter().map(|(source, evidence)| {
                format!("{}={}", serde_source(source), evidence.len())
            })),
            activity_score: round2(self.activity_score),
            commits: activity(MetricKind::Commits),
            active_contributors: activity(MetricKind::ActiveContributors),
            issues_opened: activity(MetricKind::IssuesOpened),
            issues_closed: activity(MetricKind::IssuesClosed),
            avg_issue_close_hours: round2(activity(MetricKind::AvgIssueCloseTime)),
            prs_opened: activity(MetricKind::PrsOpened),
            prs_merged: activity(MetricKind::PrsMerged),
            avg_pr_merge_hours: round2(activity(MetricKind::AvgPrMergeTime)),
            releases: activity(MetricKind::Releases),
            downloads: activity(MetricKind::Downloads),
            total_issues: self.issue_analysis.total_issues,
            closed_issues: self.issue_analysis.closed_issues,
            average_time_to_close_days: round_opt(self.issue_analysis.average_time_to_close),
            issue_update_frequency_days: round_opt(self.issue_analysis.issue_update_frequency),
            external_participants: join(&self.issue_analysis.external_participants),
            total_prs: self.pull_analysis.total_prs,
            open_prs: self.pull_analysis.open_prs,
            closed_prs: self.pull_analysis.closed_prs,
            average_time_to_merge_days: round_opt(self.pull_analysis.average_time_to_merge),
            pr_update_frequency_days: round_opt(self.pull_analysis.pr_update_frequency),
            average_time_to_first_review_days: round_opt(self.pull_analysis.average_time_to_first_review),
            review_to_merge_percentage: round_opt(self.pull_analysis.review_to_merge_percentage),
            domain: self.classification.domain.clone(),
            field: self.classification.field.clone(),
            subfield: self.classification.subfield.clone(),
            topic: self.classification.topic.clone(),
            matched_keywords: join(self.classification.matched_keywords.iter().map(|k| k.keyword.as_str())),
            is_scientific: self.is_scientific,
            project_type: self.project_type.to_string(),
            license: self.license.clone().unwrap_or_default(),
            main_language: self.main_language.clone().unwrap_or_default(),
            stars: self.stars,
            forks: self.forks,
            watchers: self.watchers,
            open_issues: self.open_issues,
            has_readme: self.documentation.readme,
            has_code_of_conduct: self.documentation.code_of_conduct,
            has_citation: self.documentation.citation,
            has_contributing: self.documentation.contributing,
            has_governance: self.documentation.governance,
            has_funding: self.documentation.funding,
            last_commit: self.last_commit.map(|t| t.to_rfc3339()).unwrap_or_default(),
            contributors_count: self.contributors_count,
            lead_institution: self.lead_institution.clone(),
            external_impact: self.external_impact,
        }
    }
}

/// Flat, scalar-only view of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub repository: String,
    pub html_url: String,
    pub description: String,
    pub topics: String,
    pub association_score: usize,
    pub matched_queries: String,
    pub confidence_score: f64,
    pub confidence_points: u32,
    pub confidence_sources: String,
    pub activity_score: f64,
    pub commits: f64,
    pub active_contributors: f64,
    pub issues_opened: f64,
    pub issues_closed: f64,
    pub avg_issue_close_hours: f64,
    pub prs_opened: f64,
    pub prs_merged: f64,
    pub avg_pr_merge_hours: f64,
    pub releases: f64,
    pub downloads: f64,
    pub total_issues: u64,
    pub closed_issues: u64,
    /// Empty when nothing to average
    pub average_time_to_close_days: Option<f64>,
    pub issue_update_frequency_days: Option<f64>,
    pub external_participants: String,
    pub total_prs: u64,
    pub open_prs: u64,
    pub closed_prs: u64,
    pub average_time_to_merge_days: Option<f64>,
    pub pr_update_frequency_days: Option<f64>,
    pub average_time_to_first_review_days: Option<f64>,
    pub review_to_merge_percentage: Option<f64>,
    pub domain: String,
    pub field: String,
    pub subfield: String,
    pub topic: String,
    pub matched_keywords: String,
    pub is_scientific: bool,
    pub project_type: String,
    pub license: String,
    pub main_language: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub has_readme: bool,
    pub has_code_of_conduct: bool,
    pub has_citation: bool,
    pub has_contributing: bool,
    pub has_governance: bool,
    pub has_funding: bool,
    pub last_commit: String,
    pub contributors_count: usize,
    pub lead_institution: String,
    pub external_impact: usize,
}

impl FlatRecord {
    /// Column names in serialization order
    pub const COLUMNS: [&'static str; 55] = [
        "repository", "html_url", "description", "topics", "association_score",
        "matched_queries", "confidence_score", "confidence_points", "confidence_sources",
        "activity_score", "commits", "active_contributors", "issues_opened", "issues_closed",
        "avg_issue_close_hours", "prs_opened", "prs_merged", "avg_pr_merge_hours", "releases",
        "downloads", "total_issues", "closed_issues", "average_time_to_close_days",
        "issue_update_frequency_days", "external_participants", "total_prs", "open_prs",
        "closed_prs", "average_time_to_merge_days", "pr_update_frequency_days",
        "average_time_to_first_review_days", "review_to_merge_percentage", "domain", "field",
        "subfield", "topic", "matched_keywords", "is_scientific", "project_type", "license",
        "main_language", "stars", "forks", "watchers", "open_issues", "has_readme",
        "has_code_of_conduct", "has_citation", "has_contributing", "has_governance",
        "has_funding", "last_commit", "contributors_count", "lead_institution",
        "external_impact",
    ];
}

/// Most common known contributor affiliation; ties go to the first seen
pub fn lead_institution(contributors: &[ContributorProfile]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for c in contributors {
        if c.affiliation == UNKNOWN_LABEL || c.affiliation.trim().is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(a, _)| *a == c.affiliation) {
            Some((_, n)) => *n += 1,
            None => counts.push((&c.affiliation, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (affiliation, n) in counts {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((affiliation, n));
        }
    }
    best.map(|(a, _)| a.to_string())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

/// Contributors whose affiliation is anything but the organization,
/// `Unknown` included
pub fn external_impact(contributors: &[ContributorProfile], organization_name: &str) -> usize {
    let org = organization_name.trim().to_lowercase();
    contributors
        .iter()
        .filter(|c| c.affiliation.trim().to_lowercase() != org)
        .count()
}

fn serde_source(source: &SignalSource) -> String {
    serde_json::to_value(source)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| format!("{:?}", source))
}

fn join<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round_opt(v: Option<f64>) -> Option<f64> {
    v.map(round2)
}
