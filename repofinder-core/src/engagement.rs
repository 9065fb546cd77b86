//! Issue and pull request handling figures
//!
//! Unlike [`crate::ActivityCounts`], these are descriptive only; they are
//! reported on the record and never feed a score. Durations are in days.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    pub total_issues: u64,
    pub open_issues: u64,
    pub closed_issues: u64,
    /// Mean days from opening to closing
    pub average_time_to_close: Option<f64>,
    /// Mean days between consecutive issue openings
    pub issue_update_frequency: Option<f64>,
    /// Issue commenters not affiliated with the organization, sorted
    #[serde(default)]
    pub external_participants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullAnalysis {
    pub total_prs: u64,
    pub open_prs: u64,
    pub closed_prs: u64,
    /// Mean days from opening to merge
    pub average_time_to_merge: Option<f64>,
    /// Mean days between consecutive pull request openings
    pub pr_update_frequency: Option<f64>,
    /// Mean days from opening to the first submitted review
    pub average_time_to_first_review: Option<f64>,
    /// Share of reviewed pull requests that were merged
    pub review_to_merge_percentage: Option<f64>,
}

pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean gap in days between consecutive dates; None below two dates
pub fn mean_gap_days<I>(dates: I) -> Option<f64>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut dates: Vec<DateTime<Utc>> = dates.into_iter().collect();
    dates.sort();
    let gaps: Vec<f64> = dates.windows(2).map(|w| days_between(w[0], w[1])).collect();
    mean(&gaps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_mean_gap_sorts_first() {
        assert_eq!(mean_gap_days([day(10), day(1), day(4)]), Some(4.5));
        assert_eq!(mean_gap_days([day(1)]), None);
        assert_eq!(mean_gap_days(Vec::new()), None);
    }

    #[test]
    fn test_days_between() {
        let start = day(1);
        assert_eq!(days_between(start, start + chrono::Duration::hours(36)), 1.5);
        assert_eq!(mean(&[]), None);
    }
}
