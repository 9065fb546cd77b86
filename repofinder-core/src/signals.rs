//! Signals gathered about a candidate repository
//!
//! The extractor emits one flat [`RepoSignals`] bag per candidate. Anything
//! that could not be fetched is left empty and recorded in `absent`, so the
//! scorers treat it as contributing nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ActivityCounts, IssueAnalysis, OrgIdentity, PullAnalysis, UNKNOWN_LABEL};

/// Stable `owner/name` repository identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse `owner/name`
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.full_name()
    }
}

impl TryFrom<String> for RepoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RepoId::parse(&value).ok_or_else(|| format!("invalid repository id: {}", value))
    }
}

/// Account type of a repository owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OwnerKind {
    #[default]
    User,
    Organization,
}

/// Repository metadata as returned by search or a direct lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub id: RepoId,
    pub html_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub owner_kind: OwnerKind,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub license: Option<String>,
    pub language: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

impl RepoMetadata {
    /// Minimal metadata for a repository id
    pub fn new(id: RepoId) -> Self {
        Self {
            html_url: format!("https://github.com/{}", id),
            id,
            description: None,
            topics: Vec::new(),
            owner_kind: OwnerKind::User,
            stars: 0,
            forks: 0,
            watchers: 0,
            open_issues: 0,
            license: None,
            language: None,
            created_at: None,
            pushed_at: None,
            fork: false,
            archived: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_owner_kind(mut self, kind: OwnerKind) -> Self {
        self.owner_kind = kind;
        self
    }
}

/// Profile of the account that owns the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OwnerProfile {
    User {
        login: String,
        name: Option<String>,
        bio: Option<String>,
        company: Option<String>,
    },
    Organization {
        login: String,
        name: Option<String>,
        description: Option<String>,
        blog: Option<String>,
        email: Option<String>,
        location: Option<String>,
    },
}

impl OwnerProfile {
    pub fn login(&self) -> &str {
        match self {
            OwnerProfile::User { login, .. } | OwnerProfile::Organization { login, .. } => login,
        }
    }
}

/// Brief view of another repository owned by a contributor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoBrief {
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl RepoBrief {
    /// Name, description and topics joined for matching
    pub fn text(&self) -> String {
        let mut parts = vec![self.full_name.clone()];
        if let Some(d) = &self.description {
            parts.push(d.clone());
        }
        parts.extend(self.topics.iter().cloned());
        parts.join(" ")
    }
}

/// A contributor to a candidate repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorProfile {
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Commits attributed by the contributor listing
    pub contributions: u64,
    /// Other repositories the contributor owns
    #[serde(default)]
    pub repositories: Vec<RepoBrief>,
    /// Faculty/Student/Researcher or Unknown
    pub status: String,
    /// Best guess at the contributor's institution
    pub affiliation: String,
}

const STATUS_KEYWORDS: &[&str] = &["student", "faculty", "professor", "researcher"];

impl ContributorProfile {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            name: None,
            bio: None,
            email: None,
            company: None,
            location: None,
            contributions: 0,
            repositories: Vec::new(),
            status: UNKNOWN_LABEL.to_string(),
            affiliation: UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn with_bio(mut self, bio: &str) -> Self {
        self.bio = Some(bio.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }

    pub fn with_repository(mut self, repo: RepoBrief) -> Self {
        self.repositories.push(repo);
        self
    }

    /// Fill in derived status and affiliation against an identity
    pub fn annotate(&mut self, identity: &OrgIdentity) {
        self.status = self.derive_status();
        self.affiliation = self.derive_affiliation(identity);
    }

    fn derive_status(&self) -> String {
        let bio = self.bio.as_deref().unwrap_or_default().to_lowercase();
        if STATUS_KEYWORDS.iter().any(|k| bio.contains(k)) {
            "Faculty/Student/Researcher".to_string()
        } else {
            UNKNOWN_LABEL.to_string()
        }
    }

    fn derive_affiliation(&self, identity: &OrgIdentity) -> String {
        let domain = identity.email_domain.trim().to_lowercase();
        let email = self.email.as_deref().unwrap_or_default().to_lowercase();
        if !domain.is_empty() && email.contains(&domain) && !identity.name.trim().is_empty() {
            return identity.name.trim().to_string();
        }

        let company = self.company.as_deref().unwrap_or_default().trim();
        let name = identity.name.trim().to_lowercase();
        if !company.is_empty() {
            if !name.is_empty() && company.to_lowercase().contains(&name) {
                return identity.name.trim().to_string();
            }
            return company.trim_start_matches('@').to_string();
        }

        UNKNOWN_LABEL.to_string()
    }
}

/// Which community and metadata files the repository root carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationFlags {
    pub readme: bool,
    pub code_of_conduct: bool,
    pub citation: bool,
    pub contributing: bool,
    pub governance: bool,
    pub funding: bool,
}

impl DocumentationFlags {
    /// Derive flags from the file names found at the repository root
    pub fn from_file_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut flags = Self::default();
        for name in names {
            let lower = name.as_ref().to_lowercase();
            let stem = lower.split('.').next().unwrap_or_default();
            match stem {
                "readme" => flags.readme = true,
                "code_of_conduct" | "code-of-conduct" => flags.code_of_conduct = true,
                "contributing" => flags.contributing = true,
                "governance" => flags.governance = true,
                _ => {}
            }
            if lower == "citation.cff" {
                flags.citation = true;
            }
            if lower == "funding.yml" || lower == "funding.yaml" || lower == "funding.json" {
                flags.funding = true;
            }
        }
        flags
    }
}

/// Everything the extractor learned about one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSignals {
    pub metadata: RepoMetadata,
    pub readme: Option<String>,
    pub owner: Option<OwnerProfile>,
    #[serde(default)]
    pub contributors: Vec<ContributorProfile>,
    pub documentation: DocumentationFlags,
    #[serde(default)]
    pub root_files: Vec<String>,
    /// Language name to bytes of code
    #[serde(default)]
    pub languages: BTreeMap<String, u64>,
    pub last_commit: Option<DateTime<Utc>>,
    pub activity: ActivityCounts,
    #[serde(default)]
    pub issues: IssueAnalysis,
    #[serde(default)]
    pub pulls: PullAnalysis,
    /// Names of signals that could not be fetched
    #[serde(default)]
    pub absent: Vec<String>,
}

impl RepoSignals {
    pub fn new(metadata: RepoMetadata) -> Self {
        Self {
            metadata,
            readme: None,
            owner: None,
            contributors: Vec::new(),
            documentation: DocumentationFlags::default(),
            root_files: Vec::new(),
            languages: BTreeMap::new(),
            last_commit: None,
            activity: ActivityCounts::default(),
            issues: IssueAnalysis::default(),
            pulls: PullAnalysis::default(),
            absent: Vec::new(),
        }
    }

    /// Record a signal as absent
    pub fn mark_absent(&mut self, signal: &str) {
        if !self.absent.iter().any(|s| s == signal) {
            self.absent.push(signal.to_string());
        }
    }

    /// Text the classifier matches against: name, description, README, topics
    pub fn corpus(&self) -> String {
        let mut parts = vec![self.metadata.id.name.replace(['-', '_'], " ")];
        if let Some(d) = &self.metadata.description {
            parts.push(d.clone());
        }
        if let Some(r) = &self.readme {
            parts.push(r.clone());
        }
        parts.extend(self.metadata.topics.iter().map(|t| t.replace('-', " ")));
        parts.join("\n")
    }

    /// Most used language by bytes, falling back to the repository's own
    pub fn main_language(&self) -> Option<String> {
        self.languages
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(lang, _)| lang.clone())
            .or_else(|| self.metadata.language.clone())
    }

    /// Language share in percent, rounded to two decimals
    pub fn language_percentages(&self) -> BTreeMap<String, f64> {
        let total: u64 = self.languages.values().sum();
        if total == 0 {
            return BTreeMap::new();
        }
        self.languages
            .iter()
            .map(|(lang, bytes)| {
                let pct = (*bytes as f64 / total as f64) * 100.0;
                (lang.clone(), (pct * 100.0).round() / 100.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_parse() {
        let id = RepoId::parse("ucsc/slug-lab").unwrap();
        assert_eq!(id.owner, "ucsc");
        assert_eq!(id.to_string(), "ucsc/slug-lab");
        assert!(RepoId::parse("noslash").is_none());
        assert!(RepoId::parse("a/b/c").is_none());
        assert!(RepoId::parse("/b").is_none());
    }

    #[test]
    fn test_repo_id_serde() {
        let id = RepoId::new("ucsc", "slug-lab");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ucsc/slug-lab\"");
        let back: RepoId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_documentation_flags() {
        let flags = DocumentationFlags::from_file_names(&[
            "README.md",
            "CODE_OF_CONDUCT.md",
            "CITATION.cff",
            "src",
            "FUNDING.yml",
        ]);
        assert!(flags.readme);
        assert!(flags.code_of_conduct);
        assert!(flags.citation);
        assert!(flags.funding);
        assert!(!flags.contributing);
        assert!(!flags.governance);
    }

    #[test]
    fn test_contributor_annotation() {
        let identity = OrgIdentity::new("Slug University").with_email_domain("slug.edu");

        let mut by_email = ContributorProfile::new("a")
            .with_email("a@cs.slug.edu")
            .with_bio("PhD student");
        by_email.annotate(&identity);
        assert_eq!(by_email.affiliation, "Slug University");
        assert_eq!(by_email.status, "Faculty/Student/Researcher");

        let mut by_company = ContributorProfile::new("b").with_company("@acme");
        by_company.annotate(&identity);
        assert_eq!(by_company.affiliation, "acme");
        assert_eq!(by_company.status, UNKNOWN_LABEL);

        let mut nothing = ContributorProfile::new("c");
        nothing.annotate(&identity);
        assert_eq!(nothing.affiliation, UNKNOWN_LABEL);
    }

    #[test]
    fn test_language_breakdown() {
        let mut signals = RepoSignals::new(RepoMetadata::new(RepoId::new("o", "r")));
        assert!(signals.main_language().is_none());

        signals.languages.insert("Rust".into(), 300);
        signals.languages.insert("Python".into(), 100);
        assert_eq!(signals.main_language().as_deref(), Some("Rust"));

        let pct = signals.language_percentages();
        assert_eq!(pct["Rust"], 75.0);
        assert_eq!(pct["Python"], 25.0);
    }

    #[test]
    fn test_mark_absent_once() {
        let mut signals = RepoSignals::new(RepoMetadata::new(RepoId::new("o", "r")));
        signals.mark_absent("readme");
        signals.mark_absent("readme");
        assert_eq!(signals.absent, vec!["readme"]);
    }
}
