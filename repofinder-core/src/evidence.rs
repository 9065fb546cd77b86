//! Identity evidence found in repository signals
//!
//! Identifiers are matched case-insensitively as substrings. Each match keeps
//! a short snippet of the surrounding text so a reader can audit the score.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::OrgIdentity;

/// Characters of context kept on each side of a match
const SNIPPET_RADIUS: usize = 40;

/// Where a piece of evidence was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Repository name or description
    RepoText,
    /// Repository topics
    Topics,
    /// README content
    Readme,
    /// Owner is a user and their bio matched
    OwnerBio,
    /// Owner is an organization and one of its fields matched
    OwnerOrganization,
    /// A contributor's email is on the organization's domain
    ContributorEmail,
    /// A contributor's bio mentions the organization
    ContributorBio,
    /// A contributor owns other repositories mentioning the organization
    ContributorRepos,
}

/// One matched identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: SignalSource,
    /// Identifier that matched (lowercased)
    pub identifier: String,
    /// What matched: a text snippet, a contributor or a repository name
    pub matched_text: String,
    pub points: u32,
}

/// Evidence grouped by source
pub type EvidenceMap = BTreeMap<SignalSource, Vec<Evidence>>;

/// Precompiled case-insensitive matchers for an identity's identifiers
#[derive(Debug, Clone)]
pub struct IdentifierSet {
    matchers: Vec<(String, Regex)>,
}

impl IdentifierSet {
    pub fn new(identity: &OrgIdentity) -> Self {
        Self::from_identifiers(identity.identifiers())
    }

    pub fn from_identifiers<I: IntoIterator<Item = String>>(identifiers: I) -> Self {
        let matchers = identifiers
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .filter_map(|id| {
                RegexBuilder::new(&regex::escape(&id))
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (id, re))
            })
            .collect();
        Self { matchers }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Identifiers found in `text`, each once, with a context snippet
    pub fn find_all(&self, text: &str) -> Vec<(String, String)> {
        self.matchers
            .iter()
            .filter_map(|(id, re)| {
                re.find(text)
                    .map(|m| (id.clone(), snippet(text, m.start(), m.end())))
            })
            .collect()
    }

    /// Whether any identifier occurs in `text`
    pub fn any_in(&self, text: &str) -> bool {
        self.matchers.iter().any(|(_, re)| re.is_match(text))
    }
}

/// Whitespace-normalized text around a byte range
pub fn snippet(text: &str, start: usize, end: usize) -> String {
    let before: usize = text[..start]
        .chars()
        .rev()
        .take(SNIPPET_RADIUS)
        .map(char::len_utf8)
        .sum();
    let after: usize = text[end..]
        .chars()
        .take(SNIPPET_RADIUS)
        .map(char::len_utf8)
        .sum();
    normalize_whitespace(&text[start - before..end + after])
}

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_case_insensitive() {
        let ids = IdentifierSet::from_identifiers(["ucsc".to_string(), "slug lab".to_string()]);
        let found = ids.find_all("Built at the UCSC Slug Lab.");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "ucsc");
        assert!(found[0].1.contains("UCSC"));
    }

    #[test]
    fn test_each_identifier_once() {
        let ids = IdentifierSet::from_identifiers(["ucsc".to_string()]);
        assert_eq!(ids.find_all("ucsc ucsc ucsc").len(), 1);
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        let ids = IdentifierSet::from_identifiers(["ucsc.edu".to_string()]);
        assert!(ids.any_in("mail me at x@ucsc.edu"));
        assert!(!ids.any_in("ucscXedu"));
    }

    #[test]
    fn test_snippet_multibyte() {
        let text = format!("{}ucsc{}", "é".repeat(60), "ü".repeat(60));
        let start = text.find("ucsc").unwrap();
        let s = snippet(&text, start, start + 4);
        assert_eq!(s.chars().count(), 84);
    }

    #[test]
    fn test_blank_identifiers_skipped() {
        let ids = IdentifierSet::from_identifiers(["  ".to_string()]);
        assert!(ids.is_empty());
    }
}
