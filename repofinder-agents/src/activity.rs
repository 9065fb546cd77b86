//! Activity collection over the scoring window
//!
//! Fetches the event listings for a repository and reduces them to the raw
//! [`ActivityCounts`] the activity scorer normalizes, plus the descriptive
//! issue and pull request analyses. Each listing is independent; one that
//! cannot be fetched is reported as absent and its counts stay zero.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use repofinder_core::{
    days_between, mean, mean_gap_days, ActivityCounts, ActivityWindow, IssueAnalysis,
    PullAnalysis, RepoMetadata,
};
use repofinder_github::{
    ApiError, ApiResult, CommentEvent, CommitEvent, IssueEvent, PullEvent, ReleaseEvent,
    ReviewEvent, SharedHost,
};

/// Review listings fetched at once for one repository
const REVIEW_CONCURRENCY: usize = 4;

/// Pull requests whose reviews are fetched unless configured otherwise
pub const DEFAULT_REVIEWED_PULLS: usize = 100;

/// Counts plus what could not be gathered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityReport {
    pub counts: ActivityCounts,
    /// Newest commit seen in the window
    pub last_commit: Option<DateTime<Utc>>,
    pub issues: IssueAnalysis,
    pub pulls: PullAnalysis,
    /// Distinct commenters on the listed issues, owner excluded
    pub issue_commenters: Vec<String>,
    pub absent: Vec<&'static str>,
}

/// (commits, distinct authors, newest commit)
pub fn tally_commits(commits: &[CommitEvent], window: &ActivityWindow) -> (u64, u64, Option<DateTime<Utc>>) {
    let in_window: Vec<&CommitEvent> = commits
        .iter()
        .filter(|c| c.date.map_or(true, |d| window.contains(d)))
        .collect();
    let authors: HashSet<&str> = in_window.iter().filter_map(|c| c.author.as_deref()).collect();
    let newest = in_window.iter().filter_map(|c| c.date).max();
    (in_window.len() as u64, authors.len() as u64, newest)
}

fn mean_hours(durations: &[chrono::Duration]) -> Option<f64> {
    if durations.is_empty() {
        return None;
    }
    let total: f64 = durations.iter().map(|d| d.num_seconds() as f64 / 3600.0).sum();
    Some(total / durations.len() as f64)
}

/// (opened, closed, mean hours to close) for issues in the window
pub fn tally_issues(issues: &[IssueEvent], window: &ActivityWindow) -> (u64, u64, Option<f64>) {
    let opened = issues.iter().filter(|i| window.contains(i.created_at)).count() as u64;
    let durations: Vec<chrono::Duration> = issues
        .iter()
        .filter_map(|i| i.closed_at.filter(|c| window.contains(*c)).map(|c| c - i.created_at))
        .collect();
    (opened, durations.len() as u64, mean_hours(&durations))
}

/// (opened, merged, mean hours to merge) for pull requests in the window
pub fn tally_pulls(pulls: &[PullEvent], window: &ActivityWindow) -> (u64, u64, Option<f64>) {
    let opened = pulls.iter().filter(|p| window.contains(p.created_at)).count() as u64;
    let durations: Vec<chrono::Duration> = pulls
        .iter()
        .filter_map(|p| p.merged_at.filter(|m| window.contains(*m)).map(|m| m - p.created_at))
        .collect();
    (opened, durations.len() as u64, mean_hours(&durations))
}

/// (releases published, downloads of their assets) in the window
pub fn tally_releases(releases: &[ReleaseEvent], window: &ActivityWindow) -> (u64, u64) {
    releases
        .iter()
        .filter(|r| r.published_at.is_some_and(|p| window.contains(p)))
        .fold((0, 0), |(count, downloads), r| (count + 1, downloads + r.downloads))
}

/// Totals, time to close and opening cadence of the listed issues.
/// External participants are resolved by the extractor.
pub fn analyze_issues(issues: &[IssueEvent]) -> IssueAnalysis {
    let close_days: Vec<f64> = issues
        .iter()
        .filter_map(|i| i.closed_at.map(|c| days_between(i.created_at, c)))
        .collect();
    IssueAnalysis {
        total_issues: issues.len() as u64,
        open_issues: issues.iter().filter(|i| i.closed_at.is_none()).count() as u64,
        closed_issues: close_days.len() as u64,
        average_time_to_close: mean(&close_days),
        issue_update_frequency: mean_gap_days(issues.iter().map(|i| i.created_at)),
        external_participants: Vec::new(),
    }
}

/// Totals, merge and review timings of the listed pull requests. Only pull
/// requests present in `reviews` count toward the review figures.
pub fn analyze_pulls(pulls: &[PullEvent], reviews: &HashMap<u64, Vec<ReviewEvent>>) -> PullAnalysis {
    let merge_days: Vec<f64> = pulls
        .iter()
        .filter_map(|p| p.merged_at.map(|m| days_between(p.created_at, m)))
        .collect();

    let mut reviewed = 0u64;
    let mut reviewed_and_merged = 0u64;
    let mut first_review_days = Vec::new();
    for pull in pulls {
        let Some(pull_reviews) = reviews.get(&pull.number).filter(|r| !r.is_empty()) else {
            continue;
        };
        reviewed += 1;
        if pull.merged_at.is_some() {
            reviewed_and_merged += 1;
        }
        if let Some(first) = pull_reviews.iter().filter_map(|r| r.submitted_at).min() {
            first_review_days.push(days_between(pull.created_at, first));
        }
    }

    PullAnalysis {
        total_prs: pulls.len() as u64,
        open_prs: pulls.iter().filter(|p| p.closed_at.is_none()).count() as u64,
        closed_prs: pulls.iter().filter(|p| p.closed_at.is_some()).count() as u64,
        average_time_to_merge: mean(&merge_days),
        pr_update_frequency: mean_gap_days(pulls.iter().map(|p| p.created_at)),
        average_time_to_first_review: mean(&first_review_days),
        review_to_merge_percentage: (reviewed > 0)
            .then(|| reviewed_and_merged as f64 / reviewed as f64 * 100.0),
    }
}

/// Distinct commenters on `issues`, sorted, without `owner`
pub fn issue_commenters(comments: &[CommentEvent], issues: &[IssueEvent], owner: &str) -> Vec<String> {
    let numbers: HashSet<u64> = issues.iter().map(|i| i.number).collect();
    comments
        .iter()
        .filter(|c| c.issue_number.is_some_and(|n| numbers.contains(&n)))
        .filter_map(|c| c.author.as_deref())
        .filter(|author| *author != owner)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct ActivityCollector {
    host: SharedHost,
    window: ActivityWindow,
    max_reviewed_pulls: usize,
}

impl ActivityCollector {
    pub fn new(host: SharedHost, window: ActivityWindow) -> Self {
        Self {
            host,
            window,
            max_reviewed_pulls: DEFAULT_REVIEWED_PULLS,
        }
    }

    /// Cap the pull requests whose reviews are fetched
    pub fn with_review_limit(mut self, limit: usize) -> Self {
        self.max_reviewed_pulls = limit;
        self
    }

    pub fn window(&self) -> &ActivityWindow {
        &self.window
    }

    fn absorb<T>(
        &self,
        report: &mut ActivityReport,
        metadata: &RepoMetadata,
        signal: &'static str,
        result: ApiResult<T>,
    ) -> Result<Option<T>, ApiError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{} unavailable for {}: {}", signal, metadata.id, e);
                report.absent.push(signal);
                Ok(None)
            }
        }
    }

    /// Reviews of the first `max_reviewed_pulls` pull requests (the listing
    /// is newest first). A pull request whose reviews cannot be fetched is
    /// left out and `reviews` is reported absent.
    async fn reviews(
        &self,
        report: &mut ActivityReport,
        metadata: &RepoMetadata,
        pulls: &[PullEvent],
    ) -> Result<HashMap<u64, Vec<ReviewEvent>>, ApiError> {
        let fetched: Vec<(u64, ApiResult<Vec<ReviewEvent>>)> = stream::iter(
            pulls.iter().take(self.max_reviewed_pulls).map(|p| p.number),
        )
        .map(|number| async move { (number, self.host.pull_reviews(&metadata.id, number).await) })
        .buffered(REVIEW_CONCURRENCY)
        .collect()
        .await;

        let mut reviews = HashMap::new();
        let mut missing = 0usize;
        for (number, result) in fetched {
            match result {
                Ok(events) => {
                    reviews.insert(number, events);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("Reviews of {}#{} unavailable: {}", metadata.id, number, e);
                    missing += 1;
                }
            }
        }
        if missing > 0 {
            warn!("reviews unavailable for {} pull requests of {}", missing, metadata.id);
            report.absent.push("reviews");
        }
        Ok(reviews)
    }

    /// Gather every activity input; fails only on fatal errors
    pub async fn collect(&self, metadata: &RepoMetadata) -> Result<ActivityReport, ApiError> {
        let id = &metadata.id;
        let window = &self.window;

        let (commits, issues, pulls, releases, comments) = tokio::join!(
            self.host.commits(id, window),
            self.host.issues(id, window),
            self.host.pulls(id, window),
            self.host.releases(id, window),
            self.host.comments(id, window),
        );

        let mut report = ActivityReport::default();
        let mut counts = ActivityCounts {
            star_growth: metadata.stars,
            fork_growth: metadata.forks,
            ..ActivityCounts::default()
        };

        if let Some(commits) = self.absorb(&mut report, metadata, "commits", commits)? {
            let (total, authors, newest) = tally_commits(&commits, window);
            counts.commits = total;
            counts.active_contributors = authors;
            report.last_commit = newest;
        }
        let issues = self.absorb(&mut report, metadata, "issues", issues)?;
        if let Some(issues) = &issues {
            let (opened, closed, avg) = tally_issues(issues, window);
            counts.issues_opened = opened;
            counts.issues_closed = closed;
            counts.avg_issue_close_hours = avg;
            report.issues = analyze_issues(issues);
        }
        if let Some(pulls) = self.absorb(&mut report, metadata, "pulls", pulls)? {
            let (opened, merged, avg) = tally_pulls(&pulls, window);
            counts.prs_opened = opened;
            counts.prs_merged = merged;
            counts.avg_pr_merge_hours = avg;
            let reviews = self.reviews(&mut report, metadata, &pulls).await?;
            report.pulls = analyze_pulls(&pulls, &reviews);
        }
        if let Some(releases) = self.absorb(&mut report, metadata, "releases", releases)? {
            let (count, downloads) = tally_releases(&releases, window);
            counts.releases = count;
            counts.downloads = downloads;
        }
        if let Some(comments) = self.absorb(&mut report, metadata, "comments", comments)? {
            counts.discussion = comments.len() as u64;
            if let Some(issues) = &issues {
                report.issue_commenters = issue_commenters(&comments, issues, &id.owner);
            }
        }

        report.counts = counts;
        Ok(report)
    }
}
