//! In-memory [`HostApi`] for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

use repofinder_core::{
    ActivityWindow, ContributorProfile, OwnerKind, OwnerProfile, RepoBrief, RepoId, RepoMetadata,
};
use repofinder_github::{
    ApiError, ApiResult, CommentEvent, CommitEvent, ContributorRef, HostApi, IssueEvent,
    PullEvent, RateBucket, RateLimitStatus, ReleaseEvent, ReviewEvent, SearchPage,
};

/// Error a mock endpoint should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Forbidden,
    Unauthorized,
    Transient,
}

impl MockFailure {
    fn error(self, what: &str) -> ApiError {
        match self {
            MockFailure::NotFound => ApiError::NotFound(what.to_string()),
            MockFailure::Forbidden => ApiError::Forbidden(what.to_string()),
            MockFailure::Unauthorized => ApiError::Unauthorized,
            MockFailure::Transient => ApiError::MaxRetries {
                attempts: 4,
                url: what.to_string(),
                last: "status 502".to_string(),
            },
        }
    }
}

/// Everything the mock knows about one repository
#[derive(Debug, Clone)]
pub struct MockRepo {
    pub metadata: RepoMetadata,
    pub readme: Option<String>,
    pub root_files: Vec<String>,
    pub languages: BTreeMap<String, u64>,
    pub contributors: Vec<ContributorRef>,
    pub commits: Vec<CommitEvent>,
    pub issues: Vec<IssueEvent>,
    pub pulls: Vec<PullEvent>,
    pub releases: Vec<ReleaseEvent>,
    pub comments: Vec<CommentEvent>,
    /// Pull request number to its reviews
    pub reviews: HashMap<u64, Vec<ReviewEvent>>,
    /// Signals whose endpoint fails
    pub failures: HashMap<&'static str, MockFailure>,
}

impl MockRepo {
    pub fn new(metadata: RepoMetadata) -> Self {
        Self {
            metadata,
            readme: None,
            root_files: Vec::new(),
            languages: BTreeMap::new(),
            contributors: Vec::new(),
            commits: Vec::new(),
            issues: Vec::new(),
            pulls: Vec::new(),
            releases: Vec::new(),
            comments: Vec::new(),
            reviews: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn with_readme(mut self, readme: &str) -> Self {
        self.readme = Some(readme.to_string());
        self
    }

    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.root_files = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_language(mut self, language: &str, bytes: u64) -> Self {
        self.languages.insert(language.to_string(), bytes);
        self
    }

    pub fn with_contributor(mut self, login: &str, contributions: u64) -> Self {
        self.contributors.push(ContributorRef {
            login: login.to_string(),
            contributions,
        });
        self
    }

    pub fn with_commits(mut self, commits: Vec<CommitEvent>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_issues(mut self, issues: Vec<IssueEvent>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_pulls(mut self, pulls: Vec<PullEvent>) -> Self {
        self.pulls = pulls;
        self
    }

    pub fn with_releases(mut self, releases: Vec<ReleaseEvent>) -> Self {
        self.releases = releases;
        self
    }

    pub fn with_comments(mut self, comments: Vec<CommentEvent>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_reviews(mut self, number: u64, reviews: Vec<ReviewEvent>) -> Self {
        self.reviews.insert(number, reviews);
        self
    }

    /// Make one endpoint fail: "repository", "readme", "root_files",
    /// "languages", "contributors", "commits", "issues", "pulls",
    /// "releases", "comments" or "reviews"
    pub fn failing(mut self, signal: &'static str, failure: MockFailure) -> Self {
        self.failures.insert(signal, failure);
        self
    }

    fn check(&self, signal: &str) -> ApiResult<()> {
        match self.failures.get(signal) {
            Some(failure) => Err(failure.error(&format!("{}:{}", self.metadata.id, signal))),
            None => Ok(()),
        }
    }
}

/// Scripted hosting service
#[derive(Default)]
pub struct MockHost {
    /// Query text to result pages
    search: HashMap<String, Vec<Vec<RepoMetadata>>>,
    failing_queries: HashMap<String, MockFailure>,
    repos: HashMap<RepoId, MockRepo>,
    owners: HashMap<String, OwnerProfile>,
    users: HashMap<String, (ContributorProfile, Vec<RepoBrief>)>,
    failing_users: HashSet<String>,
    /// Repository whose lookup parks forever after signalling
    park: Mutex<Option<(RepoId, oneshot::Sender<()>)>>,
    search_calls: AtomicUsize,
    user_calls: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, pages: Vec<Vec<RepoMetadata>>) -> Self {
        self.search.insert(query.to_string(), pages);
        self
    }

    pub fn with_failing_query(mut self, query: &str, failure: MockFailure) -> Self {
        self.failing_queries.insert(query.to_string(), failure);
        self
    }

    pub fn with_repo(mut self, repo: MockRepo) -> Self {
        self.repos.insert(repo.metadata.id.clone(), repo);
        self
    }

    pub fn with_owner(mut self, owner: OwnerProfile) -> Self {
        self.owners.insert(owner.login().to_string(), owner);
        self
    }

    pub fn with_user(mut self, profile: ContributorProfile, repos: Vec<RepoBrief>) -> Self {
        self.users.insert(profile.username.clone(), (profile, repos));
        self
    }

    pub fn with_failing_user(mut self, login: &str) -> Self {
        self.failing_users.insert(login.to_string());
        self
    }

    /// Signal `reached` and never return when `id` is looked up
    pub fn park_on(self, id: RepoId, reached: oneshot::Sender<()>) -> Self {
        *self.park.lock() = Some((id, reached));
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    fn repo(&self, id: &RepoId, signal: &str) -> ApiResult<&MockRepo> {
        let repo = self
            .repos
            .get(id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        repo.check(signal)?;
        Ok(repo)
    }
}

#[async_trait]
impl HostApi for MockHost {
    async fn search_repositories(&self, query: &str, page: u32) -> ApiResult<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failing_queries.get(query) {
            return Err(failure.error(query));
        }
        let pages = self.search.get(query).cloned().unwrap_or_default();
        let index = page.max(1) as usize - 1;
        let items = pages.get(index).cloned().unwrap_or_default();
        Ok(SearchPage {
            total_count: pages.iter().map(|p| p.len() as u64).sum(),
            items,
            has_next: index + 1 < pages.len(),
        })
    }

    async fn repository(&self, id: &RepoId) -> ApiResult<RepoMetadata> {
        let parked = {
            let mut park = self.park.lock();
            if park.as_ref().is_some_and(|(target, _)| target == id) {
                park.take()
            } else {
                None
            }
        };
        if let Some((_, reached)) = parked {
            let _ = reached.send(());
            std::future::pending::<()>().await;
        }
        Ok(self.repo(id, "repository")?.metadata.clone())
    }

    async fn readme(&self, id: &RepoId) -> ApiResult<Option<String>> {
        Ok(self.repo(id, "readme")?.readme.clone())
    }

    async fn root_files(&self, id: &RepoId) -> ApiResult<Vec<String>> {
        Ok(self.repo(id, "root_files")?.root_files.clone())
    }

    async fn languages(&self, id: &RepoId) -> ApiResult<BTreeMap<String, u64>> {
        Ok(self.repo(id, "languages")?.languages.clone())
    }

    async fn owner_profile(&self, login: &str, _kind: OwnerKind) -> ApiResult<OwnerProfile> {
        self.owners
            .get(login)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(login.to_string()))
    }

    async fn contributors(&self, id: &RepoId, limit: usize) -> ApiResult<Vec<ContributorRef>> {
        let repo = self.repo(id, "contributors")?;
        Ok(repo.contributors.iter().take(limit).cloned().collect())
    }

    async fn user(&self, login: &str) -> ApiResult<ContributorProfile> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_users.contains(login) {
            return Err(MockFailure::Transient.error(login));
        }
        self.users
            .get(login)
            .map(|(profile, _)| profile.clone())
            .ok_or_else(|| ApiError::NotFound(login.to_string()))
    }

    async fn user_repositories(&self, login: &str, limit: usize) -> ApiResult<Vec<RepoBrief>> {
        Ok(self
            .users
            .get(login)
            .map(|(_, repos)| repos.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn commits(&self, id: &RepoId, _window: &ActivityWindow) -> ApiResult<Vec<CommitEvent>> {
        Ok(self.repo(id, "commits")?.commits.clone())
    }

    async fn issues(&self, id: &RepoId, _window: &ActivityWindow) -> ApiResult<Vec<IssueEvent>> {
        Ok(self.repo(id, "issues")?.issues.clone())
    }

    async fn pulls(&self, id: &RepoId, _window: &ActivityWindow) -> ApiResult<Vec<PullEvent>> {
        Ok(self.repo(id, "pulls")?.pulls.clone())
    }

    async fn releases(&self, id: &RepoId, _window: &ActivityWindow) -> ApiResult<Vec<ReleaseEvent>> {
        Ok(self.repo(id, "releases")?.releases.clone())
    }

    async fn comments(&self, id: &RepoId, _window: &ActivityWindow) -> ApiResult<Vec<CommentEvent>> {
        Ok(self.repo(id, "comments")?.comments.clone())
    }

    async fn pull_reviews(&self, id: &RepoId, number: u64) -> ApiResult<Vec<ReviewEvent>> {
        let repo = self.repo(id, "reviews")?;
        Ok(repo.reviews.get(&number).cloned().unwrap_or_default())
    }

    async fn rate_limit(&self) -> ApiResult<RateLimitStatus> {
        let bucket = RateBucket {
            limit: 5000,
            remaining: 5000,
            reset: None,
        };
        Ok(RateLimitStatus {
            core: bucket,
            search: RateBucket {
                limit: 30,
                remaining: 30,
                reset: None,
            },
        })
    }
}
