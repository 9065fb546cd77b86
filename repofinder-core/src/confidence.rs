//! Confidence rubric
//!
//! Maps the evidence found in a candidate's signals to points and normalizes
//! the total against [`MAX_CONFIDENCE_POINTS`]. The same identifier matching
//! in two sources is counted in both.

use serde::{Deserialize, Serialize};

use crate::{
    Evidence, EvidenceMap, IdentifierSet, OrgIdentity, OwnerProfile, RepoSignals, SignalSource,
    MAX_CONFIDENCE_POINTS, MAX_SCORE,
};

/// Points awarded per matched identifier, by source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceRubric {
    pub repo_text: u32,
    pub topics: u32,
    pub readme: u32,
    pub owner_bio: u32,
    pub owner_organization: u32,
    pub contributor_email: u32,
    pub contributor_bio: u32,
    pub contributor_repo: u32,
}

impl Default for ConfidenceRubric {
    fn default() -> Self {
        Self {
            repo_text: 20,
            topics: 20,
            readme: 20,
            owner_bio: 20,
            owner_organization: 30,
            contributor_email: 15,
            contributor_bio: 10,
            contributor_repo: 5,
        }
    }
}

impl ConfidenceRubric {
    pub fn points(&self, source: SignalSource) -> u32 {
        match source {
            SignalSource::RepoText => self.repo_text,
            SignalSource::Topics => self.topics,
            SignalSource::Readme => self.readme,
            SignalSource::OwnerBio => self.owner_bio,
            SignalSource::OwnerOrganization => self.owner_organization,
            SignalSource::ContributorEmail => self.contributor_email,
            SignalSource::ContributorBio => self.contributor_bio,
            SignalSource::ContributorRepos => self.contributor_repo,
        }
    }
}

/// Outcome of applying the rubric to one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub points: u32,
    pub score: f64,
    pub evidence: EvidenceMap,
}

impl ConfidenceResult {
    fn add(&mut self, evidence: Evidence) {
        self.points += evidence.points;
        self.evidence.entry(evidence.source).or_default().push(evidence);
    }
}

/// Normalize a point total to a 0-100 percentage
pub fn confidence_score(points: u32) -> f64 {
    (points as f64 / MAX_CONFIDENCE_POINTS * 100.0).clamp(0.0, MAX_SCORE)
}

/// Applies the rubric for one organization identity
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    identifiers: IdentifierSet,
    email_domain: Option<String>,
    rubric: ConfidenceRubric,
}

impl ConfidenceScorer {
    pub fn new(identity: &OrgIdentity) -> Self {
        let domain = identity.email_domain.trim().to_lowercase();
        Self {
            identifiers: IdentifierSet::new(identity),
            email_domain: (!domain.is_empty()).then_some(domain),
            rubric: ConfidenceRubric::default(),
        }
    }

    pub fn with_rubric(mut self, rubric: ConfidenceRubric) -> Self {
        self.rubric = rubric;
        self
    }

    /// Score a candidate's signals
    pub fn score(&self, signals: &RepoSignals) -> ConfidenceResult {
        let mut result = ConfidenceResult::default();
        let meta = &signals.metadata;

        let repo_text = format!(
            "{} {}",
            meta.id.name.replace(['-', '_'], " "),
            meta.description.as_deref().unwrap_or_default()
        );
        self.match_text(&mut result, SignalSource::RepoText, &repo_text);
        self.match_text(&mut result, SignalSource::Topics, &meta.topics.join(" "));

        if let Some(readme) = &signals.readme {
            self.match_text(&mut result, SignalSource::Readme, readme);
        }

        match &signals.owner {
            Some(OwnerProfile::User { bio: Some(bio), .. }) => {
                self.match_text(&mut result, SignalSource::OwnerBio, bio);
            }
            Some(OwnerProfile::Organization {
                name,
                description,
                blog,
                email,
                location,
                ..
            }) => {
                let fields: Vec<&str> = [name, description, blog, email, location]
                    .into_iter()
                    .filter_map(|f| f.as_deref())
                    .collect();
                self.match_text(&mut result, SignalSource::OwnerOrganization, &fields.join("\n"));
            }
            _ => {}
        }

        let own_name = meta.id.full_name().to_lowercase();
        for contributor in &signals.contributors {
            if let (Some(domain), Some(email)) = (&self.email_domain, &contributor.email) {
                if email.to_lowercase().contains(domain.as_str()) {
                    result.add(self.evidence(
                        SignalSource::ContributorEmail,
                        domain,
                        &format!("{} <{}>", contributor.username, email),
                    ));
                }
            }

            if let Some(bio) = &contributor.bio {
                if let Some((identifier, _)) = self.identifiers.find_all(bio).into_iter().next() {
                    result.add(self.evidence(
                        SignalSource::ContributorBio,
                        &identifier,
                        &contributor.username,
                    ));
                }
            }

            for repo in &contributor.repositories {
                if repo.full_name.to_lowercase() == own_name {
                    continue;
                }
                if let Some((identifier, _)) = self.identifiers.find_all(&repo.text()).into_iter().next() {
                    result.add(self.evidence(
                        SignalSource::ContributorRepos,
                        &identifier,
                        &repo.full_name,
                    ));
                }
            }
        }

        result.score = confidence_score(result.points);
        result
    }

    fn match_text(&self, result: &mut ConfidenceResult, source: SignalSource, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        for (identifier, snippet) in self.identifiers.find_all(text) {
            result.add(self.evidence(source, &identifier, &snippet));
        }
    }

    fn evidence(&self, source: SignalSource, identifier: &str, matched: &str) -> Evidence {
        Evidence {
            source,
            identifier: identifier.to_string(),
            matched_text: matched.to_string(),
            points: self.rubric.points(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContributorProfile, OwnerKind, RepoBrief, RepoId, RepoMetadata};

    fn identity() -> OrgIdentity {
        OrgIdentity::new("Slug University").with_email_domain("slug.edu")
    }

    fn bare_signals() -> RepoSignals {
        RepoSignals::new(RepoMetadata::new(RepoId::new("someone", "tools")))
    }

    #[test]
    fn test_no_match_scores_zero() {
        let scorer = ConfidenceScorer::new(&identity());
        let result = scorer.score(&bare_signals());
        assert_eq!(result.points, 0);
        assert_eq!(result.score, 0.0);
        assert!(result.evidence.is_empty());
    }

    #[test]
    fn test_rubric_scenario() {
        let mut signals = RepoSignals::new(
            RepoMetadata::new(RepoId::new("slug-labs", "slug-university-tools"))
                .with_owner_kind(OwnerKind::Organization),
        );
        signals.readme = Some("Maintained by Slug University students.".to_string());
        signals.owner = Some(OwnerProfile::Organization {
            login: "slug-labs".to_string(),
            name: Some("Slug Labs".to_string()),
            description: None,
            blog: None,
            email: Some("info@slug.edu".to_string()),
            location: None,
        });
        signals.contributors = vec![
            ContributorProfile::new("ana").with_email("ana@slug.edu"),
            ContributorProfile::new("ben").with_email("ben@slug.edu"),
        ];

        let result = ConfidenceScorer::new(&identity()).score(&signals);
        assert_eq!(result.points, 100);
        assert_eq!(result.score, 20.0);
        assert_eq!(result.evidence[&SignalSource::RepoText].len(), 1);
        assert_eq!(result.evidence[&SignalSource::Readme].len(), 1);
        assert_eq!(result.evidence[&SignalSource::OwnerOrganization][0].identifier, "slug.edu");
        assert_eq!(result.evidence[&SignalSource::ContributorEmail].len(), 2);
    }

    #[test]
    fn test_same_identifier_counts_per_source() {
        let mut signals = bare_signals();
        signals.metadata.description = Some("Slug University code".to_string());
        signals.metadata.topics = vec!["slug university".to_string()];
        let result = ConfidenceScorer::new(&identity()).score(&signals);
        assert_eq!(result.points, 40);
    }

    #[test]
    fn test_repeated_identifier_in_one_source_counts_once() {
        let mut signals = bare_signals();
        signals.metadata.description = Some("Slug University code, built at Slug University".to_string());
        let result = ConfidenceScorer::new(&identity()).score(&signals);
        assert_eq!(result.points, 20);
    }

    #[test]
    fn test_user_owner_bio() {
        let mut signals = bare_signals();
        signals.owner = Some(OwnerProfile::User {
            login: "someone".to_string(),
            name: None,
            bio: Some("Research engineer, slug.edu".to_string()),
            company: None,
        });
        let result = ConfidenceScorer::new(&identity()).score(&signals);
        assert_eq!(result.points, 20);
        assert!(result.evidence.contains_key(&SignalSource::OwnerBio));
    }

    #[test]
    fn test_contributor_bio_and_repos() {
        let mut signals = bare_signals();
        signals.contributors = vec![ContributorProfile::new("ana")
            .with_bio("PhD at Slug University")
            .with_repository(RepoBrief {
                full_name: "ana/slug-university-thesis".to_string(),
                description: Some("thesis for slug university".to_string()),
                topics: vec![],
            })
            .with_repository(RepoBrief {
                full_name: "ana/dotfiles".to_string(),
                description: None,
                topics: vec![],
            })
            .with_repository(RepoBrief {
                full_name: "someone/tools".to_string(),
                description: Some("Slug University".to_string()),
                topics: vec![],
            })];

        let result = ConfidenceScorer::new(&identity()).score(&signals);
        // bio 10 + one affiliated repo 5; the candidate itself is not counted
        assert_eq!(result.points, 15);
        assert_eq!(result.evidence[&SignalSource::ContributorRepos][0].matched_text, "ana/slug-university-thesis");
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(confidence_score(0), 0.0);
        assert_eq!(confidence_score(250), 50.0);
        assert_eq!(confidence_score(500), 100.0);
        assert_eq!(confidence_score(10_000), 100.0);
        assert_eq!(confidence_score(u32::MAX), 100.0);
    }
}
