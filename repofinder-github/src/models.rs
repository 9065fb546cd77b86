//! GitHub payloads and the API-level records built from them

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use repofinder_core::{
    ContributorProfile, OwnerKind, OwnerProfile, RepoBrief, RepoId, RepoMetadata,
};

/// One page of repository search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total_count: u64,
    pub items: Vec<RepoMetadata>,
    pub has_next: bool,
}

/// Entry of a contributor listing
#[derive(Debug, Clone, PartialEq)]
pub struct ContributorRef {
    pub login: String,
    pub contributions: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueEvent {
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullEvent {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Conversation or review comment
#[derive(Debug, Clone, PartialEq)]
pub struct CommentEvent {
    pub author: Option<String>,
    /// Issue or pull request the comment belongs to, from its `issue_url`
    pub issue_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewEvent {
    pub author: Option<String>,
    /// Pending reviews have no submission time
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseEvent {
    pub published_at: Option<DateTime<Utc>>,
    pub downloads: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateBucket {
    pub limit: u64,
    pub remaining: u64,
    pub reset: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitStatus {
    pub core: RateBucket,
    pub search: RateBucket,
}

// Wire formats

#[derive(Debug, Deserialize)]
pub(crate) struct SearchWire {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<RepoWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerWire {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LicenseWire {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepoWire {
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub owner: OwnerWire,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub watchers_count: u64,
    /// Only present on direct lookups; the real watcher count
    pub subscribers_count: Option<u64>,
    #[serde(default)]
    pub open_issues_count: u64,
    pub license: Option<LicenseWire>,
    pub language: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

impl RepoWire {
    pub fn into_metadata(self) -> Option<RepoMetadata> {
        let id = RepoId::parse(&self.full_name)?;
        let license = self.license.and_then(|l| {
            l.spdx_id
                .filter(|s| !s.is_empty() && s != "NOASSERTION")
                .or(l.name)
        });
        Some(RepoMetadata {
            id,
            html_url: self.html_url,
            description: self.description.filter(|d| !d.trim().is_empty()),
            topics: self.topics,
            owner_kind: owner_kind(&self.owner.kind),
            stars: self.stargazers_count,
            forks: self.forks_count,
            watchers: self.subscribers_count.unwrap_or(self.watchers_count),
            open_issues: self.open_issues_count,
            license,
            language: self.language,
            created_at: self.created_at,
            pushed_at: self.pushed_at,
            fork: self.fork,
            archived: self.archived,
        })
    }

    pub fn into_brief(self) -> RepoBrief {
        RepoBrief {
            full_name: self.full_name,
            description: self.description,
            topics: self.topics,
        }
    }
}

pub(crate) fn owner_kind(kind: &str) -> OwnerKind {
    if kind.eq_ignore_ascii_case("organization") {
        OwnerKind::Organization
    } else {
        OwnerKind::User
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserWire {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
}

impl UserWire {
    pub fn into_owner(self) -> OwnerProfile {
        OwnerProfile::User {
            login: self.login,
            name: non_empty(self.name),
            bio: non_empty(self.bio),
            company: non_empty(self.company),
        }
    }

    pub fn into_contributor(self) -> ContributorProfile {
        let mut profile = ContributorProfile::new(&self.login);
        profile.name = non_empty(self.name);
        profile.bio = non_empty(self.bio);
        profile.email = non_empty(self.email);
        profile.company = non_empty(self.company);
        profile.location = non_empty(self.location);
        profile
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrgWire {
    pub login: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub blog: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
}

impl OrgWire {
    pub fn into_owner(self) -> OwnerProfile {
        OwnerProfile::Organization {
            login: self.login,
            name: non_empty(self.name),
            description: non_empty(self.description),
            blog: non_empty(self.blog),
            email: non_empty(self.email),
            location: non_empty(self.location),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContributorWire {
    pub login: Option<String>,
    #[serde(default)]
    pub contributions: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ContributorWire {
    /// Anonymous and bot entries have no profile worth fetching
    pub fn into_ref(self) -> Option<ContributorRef> {
        if self.kind.eq_ignore_ascii_case("bot") {
            return None;
        }
        let login = self.login.filter(|l| !l.is_empty())?;
        Some(ContributorRef {
            login,
            contributions: self.contributions,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentWire {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginWire {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitAuthorWire {
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetailWire {
    pub author: Option<CommitAuthorWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitWire {
    pub author: Option<LoginWire>,
    pub commit: CommitDetailWire,
}

impl From<CommitWire> for CommitEvent {
    fn from(wire: CommitWire) -> Self {
        Self {
            author: wire.author.map(|a| a.login),
            date: wire.commit.author.and_then(|a| a.date),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueWire {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Present when the issue is a pull request
    pub pull_request: Option<serde_json::Value>,
}

impl From<IssueWire> for IssueEvent {
    fn from(wire: IssueWire) -> Self {
        Self {
            number: wire.number,
            title: wire.title,
            created_at: wire.created_at,
            closed_at: wire.closed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullWire {
    #[serde(default)]
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<PullWire> for PullEvent {
    fn from(wire: PullWire) -> Self {
        Self {
            number: wire.number,
            created_at: wire.created_at,
            closed_at: wire.closed_at,
            merged_at: wire.merged_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentWire {
    pub user: Option<LoginWire>,
    pub issue_url: Option<String>,
}

impl From<CommentWire> for CommentEvent {
    fn from(wire: CommentWire) -> Self {
        Self {
            author: wire.user.map(|u| u.login),
            issue_number: wire
                .issue_url
                .as_deref()
                .and_then(|url| url.rsplit('/').next())
                .and_then(|n| n.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewWire {
    pub user: Option<LoginWire>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<ReviewWire> for ReviewEvent {
    fn from(wire: ReviewWire) -> Self {
        Self {
            author: wire.user.map(|u| u.login),
            submitted_at: wire.submitted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssetWire {
    #[serde(default)]
    pub download_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseWire {
    #[serde(default)]
    pub draft: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<AssetWire>,
}

impl From<ReleaseWire> for ReleaseEvent {
    fn from(wire: ReleaseWire) -> Self {
        Self {
            published_at: wire.published_at,
            downloads: wire.assets.iter().map(|a| a.download_count).sum(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BucketWire {
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
}

impl From<BucketWire> for RateBucket {
    fn from(wire: BucketWire) -> Self {
        Self {
            limit: wire.limit,
            remaining: wire.remaining,
            reset: DateTime::from_timestamp(wire.reset, 0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourcesWire {
    pub core: BucketWire,
    pub search: BucketWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitWire {
    pub resources: ResourcesWire,
}

pub(crate) type LanguagesWire = BTreeMap<String, u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_mapping() {
        let wire: RepoWire = serde_json::from_value(serde_json::json!({
            "full_name": "ucsc-lab/genome-tools",
            "html_url": "https://github.com/ucsc-lab/genome-tools",
            "description": "Tools for genome assembly",
            "topics": ["genomics", "ucsc"],
            "owner": {"login": "ucsc-lab", "type": "Organization"},
            "stargazers_count": 42,
            "forks_count": 7,
            "watchers_count": 42,
            "subscribers_count": 5,
            "open_issues_count": 3,
            "license": {"spdx_id": "NOASSERTION", "name": "Other"},
            "language": "Python",
            "created_at": "2020-01-01T00:00:00Z",
            "pushed_at": "2024-05-01T12:00:00Z",
            "fork": false,
            "archived": false
        }))
        .unwrap();

        let meta = wire.into_metadata().unwrap();
        assert_eq!(meta.id, RepoId::new("ucsc-lab", "genome-tools"));
        assert_eq!(meta.owner_kind, OwnerKind::Organization);
        assert_eq!(meta.watchers, 5);
        assert_eq!(meta.license.as_deref(), Some("Other"));
        assert_eq!(meta.topics.len(), 2);
    }

    #[test]
    fn test_contributor_filters_bots() {
        let bot = ContributorWire {
            login: Some("dependabot[bot]".into()),
            contributions: 40,
            kind: "Bot".into(),
        };
        assert!(bot.into_ref().is_none());

        let anonymous = ContributorWire {
            login: None,
            contributions: 2,
            kind: "Anonymous".into(),
        };
        assert!(anonymous.into_ref().is_none());
    }

    #[test]
    fn test_release_downloads() {
        let wire: ReleaseWire = serde_json::from_value(serde_json::json!({
            "draft": false,
            "created_at": "2024-03-01T00:00:00Z",
            "published_at": "2024-03-02T00:00:00Z",
            "assets": [{"download_count": 10}, {"download_count": 5}]
        }))
        .unwrap();
        let event = ReleaseEvent::from(wire);
        assert_eq!(event.downloads, 15);
        assert!(event.published_at.is_some());
    }

    #[test]
    fn test_comment_issue_number() {
        let wire: CommentWire = serde_json::from_value(serde_json::json!({
            "user": {"login": "slug"},
            "issue_url": "https://api.github.com/repos/ucsc/a/issues/42"
        }))
        .unwrap();
        let event = CommentEvent::from(wire);
        assert_eq!(event.author.as_deref(), Some("slug"));
        assert_eq!(event.issue_number, Some(42));

        let review_comment: CommentWire =
            serde_json::from_value(serde_json::json!({"user": null})).unwrap();
        let event = CommentEvent::from(review_comment);
        assert!(event.author.is_none());
        assert!(event.issue_number.is_none());
    }

    #[test]
    fn test_blank_profile_fields_dropped() {
        let user = UserWire {
            login: "alice".into(),
            name: Some("  ".into()),
            bio: Some("PhD student at UCSC".into()),
            company: None,
            email: Some("".into()),
            location: None,
        };
        let profile = user.into_contributor();
        assert!(profile.name.is_none());
        assert!(profile.email.is_none());
        assert_eq!(profile.bio.as_deref(), Some("PhD student at UCSC"));
    }
}
