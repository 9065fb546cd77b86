//! The source-hosting API seam
//!
//! Pipeline stages depend on [`HostApi`] rather than on the HTTP client, so
//! they can be driven by an in-memory host in tests.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use repofinder_core::{ActivityWindow, ContributorProfile, OwnerKind, OwnerProfile, RepoBrief, RepoId, RepoMetadata};

use crate::models::*;
use crate::{ApiError, ApiResult, GitHubClient, RAW_ACCEPT};

/// Operations the finder needs from a hosting service
#[async_trait]
pub trait HostApi: Send + Sync {
    /// One page (1-based) of repository search results
    async fn search_repositories(&self, query: &str, page: u32) -> ApiResult<SearchPage>;

    async fn repository(&self, id: &RepoId) -> ApiResult<RepoMetadata>;

    /// README text, `None` when the repository has none
    async fn readme(&self, id: &RepoId) -> ApiResult<Option<String>>;

    /// Names of files and directories at the repository root
    async fn root_files(&self, id: &RepoId) -> ApiResult<Vec<String>>;

    /// Bytes of code per language
    async fn languages(&self, id: &RepoId) -> ApiResult<BTreeMap<String, u64>>;

    async fn owner_profile(&self, login: &str, kind: OwnerKind) -> ApiResult<OwnerProfile>;

    /// Contributors in descending contribution order
    async fn contributors(&self, id: &RepoId, limit: usize) -> ApiResult<Vec<ContributorRef>>;

    /// Public profile of a user, without repositories
    async fn user(&self, login: &str) -> ApiResult<ContributorProfile>;

    /// Repositories owned by a user, most recently updated first
    async fn user_repositories(&self, login: &str, limit: usize) -> ApiResult<Vec<RepoBrief>>;

    async fn commits(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<CommitEvent>>;

    /// Issues (not pull requests) updated since the window start
    async fn issues(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<IssueEvent>>;

    /// Pull requests updated since the window start
    async fn pulls(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<PullEvent>>;

    /// Releases created since the window start
    async fn releases(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<ReleaseEvent>>;

    /// Issue and review comments posted since the window start
    async fn comments(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<CommentEvent>>;

    /// Reviews submitted on one pull request
    async fn pull_reviews(&self, id: &RepoId, number: u64) -> ApiResult<Vec<ReviewEvent>>;

    async fn rate_limit(&self) -> ApiResult<RateLimitStatus>;
}

/// Host shared across workers
pub type SharedHost = Arc<dyn HostApi>;

fn iso(t: DateTime<Utc>) -> String {
    urlencoding::encode(&t.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}

impl GitHubClient {
    fn repo_url(&self, id: &RepoId, suffix: &str) -> String {
        self.url(&format!("/repos/{}/{}{}", id.owner, id.name, suffix))
    }

    fn per_page(&self) -> u32 {
        self.config().per_page
    }
}

#[async_trait]
impl HostApi for GitHubClient {
    async fn search_repositories(&self, query: &str, page: u32) -> ApiResult<SearchPage> {
        let url = self.url(&format!(
            "/search/repositories?q={}&per_page={}&page={}",
            urlencoding::encode(query),
            self.per_page(),
            page.max(1)
        ));
        let response = self.send(&url, crate::JSON_ACCEPT).await?;
        let has_next = crate::next_link(response.headers()).is_some();
        let body = response.text().await.map_err(|e| ApiError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let wire: SearchWire = serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let items: Vec<RepoMetadata> = wire
            .items
            .into_iter()
            .filter_map(RepoWire::into_metadata)
            .collect();
        debug!("Search '{}' page {} returned {} items", query, page, items.len());

        Ok(SearchPage {
            total_count: wire.total_count,
            items,
            has_next,
        })
    }

    async fn repository(&self, id: &RepoId) -> ApiResult<RepoMetadata> {
        let url = self.repo_url(id, "");
        let wire: RepoWire = self.get_json(&url).await?;
        wire.into_metadata().ok_or_else(|| ApiError::Decode {
            url,
            message: "malformed full_name".to_string(),
        })
    }

    async fn readme(&self, id: &RepoId) -> ApiResult<Option<String>> {
        match self.get_text(&self.repo_url(id, "/readme"), RAW_ACCEPT).await {
            Ok(text) => Ok(Some(text)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn root_files(&self, id: &RepoId) -> ApiResult<Vec<String>> {
        match self
            .get_json::<Vec<ContentWire>>(&self.repo_url(id, "/contents/"))
            .await
        {
            Ok(entries) => Ok(entries.into_iter().map(|e| e.name).collect()),
            // Empty repositories report their contents as missing
            Err(ApiError::NotFound(_)) | Err(ApiError::Conflict(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn languages(&self, id: &RepoId) -> ApiResult<BTreeMap<String, u64>> {
        self.get_json::<LanguagesWire>(&self.repo_url(id, "/languages"))
            .await
    }

    async fn owner_profile(&self, login: &str, kind: OwnerKind) -> ApiResult<OwnerProfile> {
        match kind {
            OwnerKind::Organization => {
                let wire: OrgWire = self.get_json(&self.url(&format!("/orgs/{}", login))).await?;
                Ok(wire.into_owner())
            }
            OwnerKind::User => {
                let wire: UserWire = self.get_json(&self.url(&format!("/users/{}", login))).await?;
                Ok(wire.into_owner())
            }
        }
    }

    async fn contributors(&self, id: &RepoId, limit: usize) -> ApiResult<Vec<ContributorRef>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = self.repo_url(id, &format!("/contributors?per_page={}", self.per_page()));
        let wire: Vec<ContributorWire> = match self.paginate(&url, Some(limit), |_| false).await {
            Ok(wire) => wire,
            Err(ApiError::Conflict(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(wire.into_iter().filter_map(ContributorWire::into_ref).collect())
    }

    async fn user(&self, login: &str) -> ApiResult<ContributorProfile> {
        let wire: UserWire = self.get_json(&self.url(&format!("/users/{}", login))).await?;
        Ok(wire.into_contributor())
    }

    async fn user_repositories(&self, login: &str, limit: usize) -> ApiResult<Vec<RepoBrief>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = self.url(&format!(
            "/users/{}/repos?sort=updated&per_page={}",
            login,
            self.per_page()
        ));
        let wire: Vec<RepoWire> = self.paginate(&url, Some(limit), |_| false).await?;
        Ok(wire.into_iter().map(RepoWire::into_brief).collect())
    }

    async fn commits(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<CommitEvent>> {
        let url = self.repo_url(
            id,
            &format!(
                "/commits?since={}&until={}&per_page={}",
                iso(window.start),
                iso(window.end),
                self.per_page()
            ),
        );
        match self.paginate::<CommitWire, _>(&url, None, |_| false).await {
            Ok(wire) => Ok(wire.into_iter().map(CommitEvent::from).collect()),
            Err(ApiError::Conflict(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn issues(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<IssueEvent>> {
        let url = self.repo_url(
            id,
            &format!(
                "/issues?state=all&since={}&per_page={}",
                iso(window.start),
                self.per_page()
            ),
        );
        let wire: Vec<IssueWire> = self.paginate(&url, None, |_| false).await?;
        Ok(wire
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(IssueEvent::from)
            .collect())
    }

    async fn pulls(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<PullEvent>> {
        let url = self.repo_url(
            id,
            &format!(
                "/pulls?state=all&sort=updated&direction=desc&per_page={}",
                self.per_page()
            ),
        );
        let start = window.start;
        let wire: Vec<PullWire> = self
            .paginate(&url, None, |p: &PullWire| p.updated_at < start)
            .await?;
        Ok(wire.into_iter().map(PullEvent::from).collect())
    }

    async fn releases(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<ReleaseEvent>> {
        let url = self.repo_url(id, &format!("/releases?per_page={}", self.per_page()));
        let start = window.start;
        let wire: Vec<ReleaseWire> = self
            .paginate(&url, None, |r: &ReleaseWire| {
                r.created_at.is_some_and(|t| t < start)
            })
            .await?;
        Ok(wire
            .into_iter()
            .filter(|r| !r.draft)
            .map(ReleaseEvent::from)
            .collect())
    }

    async fn comments(&self, id: &RepoId, window: &ActivityWindow) -> ApiResult<Vec<CommentEvent>> {
        let since = iso(window.start);
        let mut events = Vec::new();
        for kind in ["issues", "pulls"] {
            let url = self.repo_url(
                id,
                &format!("/{}/comments?since={}&per_page={}", kind, since, self.per_page()),
            );
            let wire: Vec<CommentWire> = self.paginate(&url, None, |_| false).await?;
            events.extend(wire.into_iter().map(CommentEvent::from));
        }
        Ok(events)
    }

    async fn pull_reviews(&self, id: &RepoId, number: u64) -> ApiResult<Vec<ReviewEvent>> {
        let url = self.repo_url(
            id,
            &format!("/pulls/{}/reviews?per_page={}", number, self.per_page()),
        );
        let wire: Vec<ReviewWire> = self.paginate(&url, None, |_| false).await?;
        Ok(wire.into_iter().map(ReviewEvent::from).collect())
    }

    async fn rate_limit(&self) -> ApiResult<RateLimitStatus> {
        let wire: RateLimitWire = self.get_json(&self.url("/rate_limit")).await?;
        Ok(RateLimitStatus {
            core: wire.resources.core.into(),
            search: wire.resources.search.into(),
        })
    }
}
