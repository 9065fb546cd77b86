//! Windowed activity scoring
//!
//! Each metric is normalized against a ceiling, multiplied by its weight
//! (a percentage) and summed. The final score is clamped to `[1, 100]` so a
//! scored repository never reads as zero.
//!
//! The built-in weights total 105 and are used as they are; the clamp caps a
//! repository at every ceiling to 100. Custom weights must total 100.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ConfigError, ConfigResult, DAYS_PER_MONTH, MAX_SCORE, MIN_ACTIVITY_SCORE};

/// Allowed deviation of the weight total from 100
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Whether a larger raw value means more activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// The engagement metrics collected per repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Commits,
    ActiveContributors,
    IssuesOpened,
    IssuesClosed,
    AvgIssueCloseTime,
    PrsOpened,
    PrsMerged,
    AvgPrMergeTime,
    StarGrowth,
    ForkGrowth,
    Releases,
    Downloads,
    Discussion,
}

impl MetricKind {
    pub const ALL: [MetricKind; 13] = [
        MetricKind::Commits,
        MetricKind::ActiveContributors,
        MetricKind::IssuesOpened,
        MetricKind::IssuesClosed,
        MetricKind::AvgIssueCloseTime,
        MetricKind::PrsOpened,
        MetricKind::PrsMerged,
        MetricKind::AvgPrMergeTime,
        MetricKind::StarGrowth,
        MetricKind::ForkGrowth,
        MetricKind::Releases,
        MetricKind::Downloads,
        MetricKind::Discussion,
    ];

    /// Key used in configuration files and output
    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Commits => "commits",
            MetricKind::ActiveContributors => "active_contributors",
            MetricKind::IssuesOpened => "issues_opened",
            MetricKind::IssuesClosed => "issues_closed",
            MetricKind::AvgIssueCloseTime => "avg_issue_close_time",
            MetricKind::PrsOpened => "prs_opened",
            MetricKind::PrsMerged => "prs_merged",
            MetricKind::AvgPrMergeTime => "avg_pr_merge_time",
            MetricKind::StarGrowth => "star_growth",
            MetricKind::ForkGrowth => "fork_growth",
            MetricKind::Releases => "releases",
            MetricKind::Downloads => "downloads",
            MetricKind::Discussion => "discussion",
        }
    }

    /// Human-readable name for prompts
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Commits => "Commits",
            MetricKind::ActiveContributors => "Active contributors",
            MetricKind::IssuesOpened => "Issues opened",
            MetricKind::IssuesClosed => "Issues closed",
            MetricKind::AvgIssueCloseTime => "Average issue close time (hours)",
            MetricKind::PrsOpened => "Pull requests opened",
            MetricKind::PrsMerged => "Pull requests merged",
            MetricKind::AvgPrMergeTime => "Average PR merge time (hours)",
            MetricKind::StarGrowth => "Star growth",
            MetricKind::ForkGrowth => "Fork growth",
            MetricKind::Releases => "Releases",
            MetricKind::Downloads => "Release downloads",
            MetricKind::Discussion => "Discussion activity",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    pub fn direction(&self) -> Direction {
        match self {
            MetricKind::AvgIssueCloseTime | MetricKind::AvgPrMergeTime => Direction::LowerIsBetter,
            _ => Direction::HigherIsBetter,
        }
    }

    pub fn default_ceiling(&self) -> f64 {
        match self {
            MetricKind::Commits => 500.0,
            MetricKind::ActiveContributors => 50.0,
            MetricKind::IssuesOpened => 100.0,
            MetricKind::IssuesClosed => 100.0,
            MetricKind::AvgIssueCloseTime => 24.0,
            MetricKind::PrsOpened => 100.0,
            MetricKind::PrsMerged => 100.0,
            MetricKind::AvgPrMergeTime => 24.0,
            MetricKind::StarGrowth => 1000.0,
            MetricKind::ForkGrowth => 500.0,
            MetricKind::Releases => 20.0,
            MetricKind::Downloads => 10000.0,
            MetricKind::Discussion => 500.0,
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            MetricKind::Commits => 20.0,
            MetricKind::ActiveContributors => 15.0,
            MetricKind::IssuesOpened => 10.0,
            MetricKind::IssuesClosed => 10.0,
            MetricKind::AvgIssueCloseTime => 5.0,
            MetricKind::PrsOpened => 10.0,
            MetricKind::PrsMerged => 10.0,
            MetricKind::AvgPrMergeTime => 5.0,
            MetricKind::StarGrowth => 5.0,
            MetricKind::ForkGrowth => 5.0,
            MetricKind::Releases => 5.0,
            MetricKind::Downloads => 5.0,
            MetricKind::Discussion => 0.0,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Time range activity is measured over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ActivityWindow {
    /// Window of `months` (30-day) months ending at `end`
    pub fn months_before(end: DateTime<Utc>, months: u32) -> ConfigResult<Self> {
        if months == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        let start = end - Duration::days(i64::from(months) * DAYS_PER_MONTH);
        Ok(Self { start, end })
    }

    /// Window of `months` ending now
    pub fn last_months(months: u32) -> ConfigResult<Self> {
        Self::months_before(Utc::now(), months)
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Raw activity figures gathered for one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub commits: u64,
    pub active_contributors: u64,
    pub issues_opened: u64,
    pub issues_closed: u64,
    /// None when no issue was closed in the window
    pub avg_issue_close_hours: Option<f64>,
    pub prs_opened: u64,
    pub prs_merged: u64,
    /// None when no pull request was merged in the window
    pub avg_pr_merge_hours: Option<f64>,
    pub star_growth: u64,
    pub fork_growth: u64,
    pub releases: u64,
    pub downloads: u64,
    pub discussion: u64,
}

impl ActivityCounts {
    /// Raw value for a metric; None only for averages with no events
    pub fn raw(&self, metric: MetricKind) -> Option<f64> {
        match metric {
            MetricKind::Commits => Some(self.commits as f64),
            MetricKind::ActiveContributors => Some(self.active_contributors as f64),
            MetricKind::IssuesOpened => Some(self.issues_opened as f64),
            MetricKind::IssuesClosed => Some(self.issues_closed as f64),
            MetricKind::AvgIssueCloseTime => self.avg_issue_close_hours,
            MetricKind::PrsOpened => Some(self.prs_opened as f64),
            MetricKind::PrsMerged => Some(self.prs_merged as f64),
            MetricKind::AvgPrMergeTime => self.avg_pr_merge_hours,
            MetricKind::StarGrowth => Some(self.star_growth as f64),
            MetricKind::ForkGrowth => Some(self.fork_growth as f64),
            MetricKind::Releases => Some(self.releases as f64),
            MetricKind::Downloads => Some(self.downloads as f64),
            MetricKind::Discussion => Some(self.discussion as f64),
        }
    }
}

/// Ceiling and weight for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub ceiling: f64,
    /// Percentage of the final score
    pub weight: f64,
}

/// Validated ceilings and weights for every metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTable {
    specs: BTreeMap<MetricKind, MetricSpec>,
    /// Weights are the built-in defaults, exempt from the total check
    builtin: bool,
}

impl Default for WeightTable {
    fn default() -> Self {
        let specs = MetricKind::ALL
            .into_iter()
            .map(|m| {
                (
                    m,
                    MetricSpec {
                        ceiling: m.default_ceiling(),
                        weight: m.default_weight(),
                    },
                )
            })
            .collect();
        Self {
            specs,
            builtin: true,
        }
    }
}

impl WeightTable {
    /// Build a table from explicit specs; missing metrics get weight 0 and
    /// their default ceiling
    pub fn new(specs: BTreeMap<MetricKind, MetricSpec>) -> ConfigResult<Self> {
        let mut table = Self::default();
        for spec in table.specs.values_mut() {
            spec.weight = 0.0;
        }
        table.builtin = false;
        table.specs.extend(specs);
        table.validate()?;
        Ok(table)
    }

    /// Apply keyed overrides. A non-empty `weights` map replaces every
    /// weight (unlisted metrics get 0); `ceilings` override individually.
    pub fn with_overrides(
        &self,
        weights: &BTreeMap<String, f64>,
        ceilings: &BTreeMap<String, f64>,
    ) -> ConfigResult<Self> {
        let mut table = self.clone();

        if !weights.is_empty() {
            table.builtin = false;
            for spec in table.specs.values_mut() {
                spec.weight = 0.0;
            }
            for (key, weight) in weights {
                let metric = MetricKind::from_key(key)
                    .ok_or_else(|| ConfigError::UnknownMetric(key.clone()))?;
                if let Some(spec) = table.specs.get_mut(&metric) {
                    spec.weight = *weight;
                }
            }
        }

        for (key, ceiling) in ceilings {
            let metric =
                MetricKind::from_key(key).ok_or_else(|| ConfigError::UnknownMetric(key.clone()))?;
            if let Some(spec) = table.specs.get_mut(&metric) {
                spec.ceiling = *ceiling;
            }
        }

        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (metric, spec) in &self.specs {
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    metric: metric.key().to_string(),
                    value: spec.weight,
                });
            }
            if !spec.ceiling.is_finite() || spec.ceiling < 0.0 {
                return Err(ConfigError::InvalidCeiling {
                    metric: metric.key().to_string(),
                    value: spec.ceiling,
                });
            }
        }
        let total = self.total_weight();
        if !self.builtin && (total - 100.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum(total));
        }
        Ok(())
    }

    /// Weights are the built-in defaults
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn total_weight(&self) -> f64 {
        self.specs.values().map(|s| s.weight).sum()
    }

    pub fn spec(&self, metric: MetricKind) -> MetricSpec {
        self.specs.get(&metric).copied().unwrap_or(MetricSpec {
            ceiling: metric.default_ceiling(),
            weight: 0.0,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, MetricSpec)> + '_ {
        self.specs.iter().map(|(m, s)| (*m, *s))
    }
}

/// One metric's contribution to the activity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: MetricKind,
    pub raw_value: f64,
    pub ceiling_value: f64,
    pub weight: f64,
    /// False when an average had no underlying events
    pub observed: bool,
    pub normalized: f64,
    pub weighted: f64,
}

impl MetricSample {
    pub fn new(metric: MetricKind, raw: Option<f64>, spec: MetricSpec) -> Self {
        let observed = raw.is_some();
        let raw_value = sanitize(raw.unwrap_or(0.0));
        let normalized = if observed {
            normalize(metric.direction(), raw_value, spec.ceiling)
        } else {
            0.0
        };
        Self {
            metric,
            raw_value,
            ceiling_value: spec.ceiling,
            weight: spec.weight,
            observed,
            normalized,
            weighted: normalized * spec.weight / 100.0,
        }
    }
}

/// Normalize a raw value to 0-100 against its ceiling
///
/// A zero ceiling is already met by any value and normalizes to 100.
pub fn normalize(direction: Direction, raw: f64, ceiling: f64) -> f64 {
    let raw = sanitize(raw);
    if ceiling <= 0.0 {
        return MAX_SCORE;
    }
    let fraction = match direction {
        Direction::HigherIsBetter => (raw / ceiling).min(1.0),
        Direction::LowerIsBetter => ((ceiling - raw) / ceiling).max(0.0),
    };
    fraction * 100.0
}

fn sanitize(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Outcome of scoring one repository's activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub score: f64,
    /// Sum before clamping
    pub weighted_sum: f64,
    pub samples: Vec<MetricSample>,
}

/// Scores raw activity counts against a validated weight table
#[derive(Debug, Clone, Default)]
pub struct ActivityScorer {
    table: WeightTable,
}

impl ActivityScorer {
    pub fn new(table: WeightTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &WeightTable {
        &self.table
    }

    pub fn score(&self, counts: &ActivityCounts) -> ActivityResult {
        let samples: Vec<MetricSample> = self
            .table
            .iter()
            .map(|(metric, spec)| MetricSample::new(metric, counts.raw(metric), spec))
            .collect();
        let weighted_sum: f64 = samples.iter().map(|s| s.weighted).sum();
        ActivityResult {
            score: weighted_sum.clamp(MIN_ACTIVITY_SCORE, MAX_SCORE),
            weighted_sum,
            samples,
        }
    }
}
