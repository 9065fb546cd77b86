//! Discovered candidate repositories
//!
//! A candidate is created on its first query match and reinforced by every
//! later query that also returns it. Association is the number of distinct
//! queries that matched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ConfidenceResult, EvidenceMap, Query, RepoId, RepoMetadata};

/// One repository found during discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: RepoId,
    pub metadata: RepoMetadata,
    pub matched_queries: BTreeSet<Query>,
    /// First-seen order across the run
    pub sequence: u64,
    pub confidence_points: u32,
    pub evidence: EvidenceMap,
}

impl Candidate {
    pub fn new(metadata: RepoMetadata, query: Query, sequence: u64) -> Self {
        let mut matched_queries = BTreeSet::new();
        matched_queries.insert(query);
        Self {
            id: metadata.id.clone(),
            metadata,
            matched_queries,
            sequence,
            confidence_points: 0,
            evidence: EvidenceMap::new(),
        }
    }

    /// Record another matching query; false if it had already matched
    pub fn reinforce(&mut self, query: Query) -> bool {
        self.matched_queries.insert(query)
    }

    pub fn association_score(&self) -> usize {
        self.matched_queries.len()
    }

    /// Fold a confidence result into the accumulators
    pub fn apply_confidence(&mut self, result: &ConfidenceResult) {
        self.confidence_points = result.points;
        self.evidence = result.evidence.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdentityAttribute, SearchField};

    fn query(text: &str) -> Query {
        Query {
            text: text.to_string(),
            origin: IdentityAttribute::Name,
            field: SearchField::Text,
        }
    }

    #[test]
    fn test_reinforce_tracks_association() {
        let meta = RepoMetadata::new(RepoId::new("o", "r"));
        let mut candidate = Candidate::new(meta, query("a"), 0);
        assert_eq!(candidate.association_score(), 1);

        assert!(candidate.reinforce(query("b")));
        assert!(!candidate.reinforce(query("a")));
        assert_eq!(candidate.association_score(), 2);
        assert_eq!(candidate.association_score(), candidate.matched_queries.len());
    }
}
